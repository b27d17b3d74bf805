//! Reactive-time algebra: a per-scope frozen clock whose passage is modelled
//! as a shrinking half-open validity interval, plus the instant/duration
//! types used to query it.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::error::ReactiveError;
use crate::scheduler;
use crate::scope::{Key, Scope};
use crate::variable::Variable;

/// The resolution below which two instants are considered identical by the
/// interval algebra.
pub const CLOCK_RESOLUTION: Duration = Duration::from_nanos(1);

/// A reactive instant: a wall-clock time captured once and compared against
/// with interval-tightening semantics rather than repeated polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReactiveInstant(SystemTime);

impl ReactiveInstant {
	/// Captures the current wall-clock time.
	pub fn now() -> Self {
		Self(SystemTime::now())
	}

	/// The wall-clock time this instant represents.
	pub fn system_time(self) -> SystemTime {
		self.0
	}
}

impl std::ops::Add<Duration> for ReactiveInstant {
	type Output = ReactiveInstant;
	fn add(self, rhs: Duration) -> ReactiveInstant {
		ReactiveInstant(self.0 + rhs)
	}
}

impl std::ops::Sub<Duration> for ReactiveInstant {
	type Output = ReactiveInstant;
	fn sub(self, rhs: Duration) -> ReactiveInstant {
		ReactiveInstant(self.0 - rhs)
	}
}

/// The (growing or shrinking) difference between two [`ReactiveInstant`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReactiveDuration(Duration);

impl ReactiveDuration {
	/// The duration between `earlier` and `later`. Panics if `earlier` is
	/// after `later`, mirroring [`SystemTime::duration_since`].
	pub fn between(earlier: ReactiveInstant, later: ReactiveInstant) -> Self {
		Self(
			later
				.0
				.duration_since(earlier.0)
				.expect("`earlier` must not be after `later`"),
		)
	}

	/// The underlying [`Duration`].
	pub fn duration(self) -> Duration {
		self.0
	}
}

/// A half-open `[lower, upper)` bound on wall-clock time, with `None`
/// standing for an unbounded end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
	lower: Option<SystemTime>,
	upper: Option<SystemTime>,
}

impl Interval {
	/// The interval `(-∞, +∞)`.
	pub const fn unbounded() -> Self {
		Self {
			lower: None,
			upper: None,
		}
	}

	/// The interval's lower bound, if any.
	pub fn lower(&self) -> Option<SystemTime> {
		self.lower
	}

	/// The interval's upper bound, if any.
	pub fn upper(&self) -> Option<SystemTime> {
		self.upper
	}

	/// Whether `t` falls within `[lower, upper)`.
	pub fn contains(&self, t: SystemTime) -> bool {
		self.lower.map_or(true, |lower| t >= lower) && self.upper.map_or(true, |upper| t < upper)
	}

	fn tighten_upper(&mut self, bound: SystemTime) -> bool {
		if self.upper.map_or(true, |current| bound < current) {
			self.upper = Some(bound);
			true
		} else {
			false
		}
	}

	fn tighten_lower(&mut self, bound: SystemTime) -> bool {
		if self.lower.map_or(true, |current| bound > current) {
			self.lower = Some(bound);
			true
		} else {
			false
		}
	}
}

const CLOCK_FREEZE_KEY: Key = Key(u64::MAX);

/// A clock frozen into a [`Scope`]: every read of `now` inside the same
/// scope returns the identical instant. Comparisons against a wall time
/// tighten the clock's validity interval instead of re-sampling the system
/// clock; once the interval lapses, the scheduler invalidates this clock.
pub struct Clock {
	now: ReactiveInstant,
	interval: Mutex<Interval>,
	/// Carries a monotonically increasing token; writing to it is how this
	/// clock delivers an invalidation to everything that read `now` from it.
	ring_variable: Arc<Variable<u64>>,
	ring_counter: AtomicU64,
	self_weak: std::sync::Weak<Clock>,
}

impl Clock {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new_cyclic(|weak| Self {
			now: ReactiveInstant::now(),
			interval: Mutex::new(Interval::unbounded()),
			ring_variable: Variable::new(0),
			ring_counter: AtomicU64::new(0),
			self_weak: weak.clone(),
		})
	}

	fn strong_self(&self) -> Arc<Clock> {
		self.self_weak
			.upgrade()
			.expect("a Clock always has at least one strong reference while `&self` is live")
	}

	/// Returns the clock frozen into `scope`, creating (and registering)
	/// one on first use.
	pub fn in_scope(scope: &Scope) -> Arc<Self> {
		scope.freeze(CLOCK_FREEZE_KEY, Clock::new)
	}

	/// The instant this clock froze at construction. Reading this also
	/// records a dependency on this clock's internal variable, via the
	/// active scope, so a caller that reacts to `now()` re-runs when the
	/// clock rings.
	pub fn now(&self) -> ReactiveInstant {
		self.ring_variable.read();
		self.now
	}

	/// The clock's current validity interval.
	pub fn interval(&self) -> Interval {
		*self.interval.lock()
	}

	/// Compares the clock's frozen `now` against `t`, tightening the
	/// validity interval to the smallest half-open sub-interval consistent
	/// with the observed ordering, and returns the ordering of `now`
	/// relative to `t`.
	pub fn compare(&self, t: SystemTime) -> Ordering {
		let now = self.now.system_time();
		let ordering = now.cmp(&t);
		let old = *self.interval.lock();
		let mut changed = false;
		{
			let mut interval = self.interval.lock();
			match ordering {
				Ordering::Less => changed |= interval.tighten_upper(t),
				Ordering::Greater => {
					changed |= interval.tighten_lower(t + CLOCK_RESOLUTION);
				}
				Ordering::Equal => {
					changed |= interval.tighten_upper(t);
					changed |= interval.tighten_lower(t + CLOCK_RESOLUTION);
				}
			}
		}
		if changed {
			let new = *self.interval.lock();
			scheduler::monitor(self.strong_self(), old, new);
		}
		ordering
	}

	/// Whether the clock's frozen `now` is strictly before `t`.
	pub fn before(&self, t: SystemTime) -> bool {
		self.compare(t) == Ordering::Less
	}

	/// Whether the clock's frozen `now` is strictly after `t`.
	pub fn after(&self, t: SystemTime) -> bool {
		self.compare(t) == Ordering::Greater
	}

	/// Whether the clock's frozen `now` equals `t`.
	pub fn equal(&self, t: SystemTime) -> bool {
		self.compare(t) == Ordering::Equal
	}

	/// Truncates the frozen `now` to the start of the `unit`-sized window it
	/// falls in, tightening the interval to that window.
	///
	/// Fails with [`ReactiveError::InvalidArgument`] if `unit` is zero.
	pub fn truncated_to(&self, unit: Duration) -> Result<ReactiveInstant, ReactiveError> {
		if unit == Duration::ZERO {
			return Err(ReactiveError::invalid_argument(
				"truncation unit must be positive",
			));
		}
		let now = self.now.system_time();
		let since_epoch = now
			.duration_since(std::time::UNIX_EPOCH)
			.unwrap_or(Duration::ZERO);
		let unit_nanos = unit.as_nanos().max(1);
		let since_nanos = since_epoch.as_nanos();
		let truncated_nanos = (since_nanos / unit_nanos) * unit_nanos;
		let trunc = std::time::UNIX_EPOCH + Duration::from_nanos(truncated_nanos as u64);

		let old = *self.interval.lock();
		let mut changed = false;
		{
			let mut interval = self.interval.lock();
			changed |= interval.tighten_lower(trunc);
			changed |= interval.tighten_upper(trunc + unit);
		}
		if changed {
			let new = *self.interval.lock();
			scheduler::monitor(self.strong_self(), old, new);
		}
		Ok(ReactiveInstant(trunc))
	}

	/// Publishes a fresh token into this clock's internal variable,
	/// advancing its version and firing any subscribed triggers. Called by
	/// the scheduler when this clock's interval lapses.
	pub(crate) fn ring(&self) {
		let token = self.ring_counter.fetch_add(1, AtomicOrdering::Relaxed) + 1;
		#[cfg(feature = "tracing-logging")]
		tracing::trace!(token, "clock ring");
		self.ring_variable.write(crate::value::ValueBundle::ready(token));
	}

	/// The internal ring variable's version, exposed for scheduler tests
	/// that check a clock was (or was not) rung.
	#[cfg(test)]
	pub(crate) fn ring_version(&self) -> u64 {
		self.ring_variable.version()
	}
}
