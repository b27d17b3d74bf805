//! The singleton alarm scheduler: a background timer thread that wakes
//! [`Clock`]s whose validity interval has lapsed.

use std::collections::BTreeMap;
use std::sync::{Arc, Once, Weak};
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

use crate::clock::{Clock, Interval};

/// Scheduler wake-ups never wait longer than this, which bounds how far a
/// backward or forward wall-clock jump can delay an overdue alarm.
const POLL_CAP: Duration = Duration::from_secs(1);

/// Once the index holds at least twice as many weak entries as it did after
/// the last purge, a purge sweep removes entries whose clock has been
/// dropped.
const PURGE_GROWTH_FACTOR: usize = 2;

struct Inner {
	index: BTreeMap<SystemTime, Vec<Weak<Clock>>>,
	indexed_count: usize,
	last_purge_count: usize,
	last_tick: SystemTime,
	next_wake: Option<SystemTime>,
}

impl Inner {
	fn new() -> Self {
		Self {
			index: BTreeMap::new(),
			indexed_count: 0,
			last_purge_count: 0,
			last_tick: SystemTime::now(),
			next_wake: None,
		}
	}
}

struct Scheduler {
	state: Mutex<Inner>,
	condvar: Condvar,
	thread_started: Once,
}

static SCHEDULER: Lazy<Scheduler> = Lazy::new(|| Scheduler {
	state: Mutex::new(Inner::new()),
	condvar: Condvar::new(),
	thread_started: Once::new(),
});

fn ensure_thread_started() {
	SCHEDULER.thread_started.call_once(|| {
		std::thread::Builder::new()
			.name("reactive-core-scheduler".into())
			.spawn(scheduler_loop)
			.expect("failed to spawn the alarm scheduler thread");
	});
}

fn scheduler_loop() {
	loop {
		let mut inner = SCHEDULER.state.lock();
		tick_locked(&mut inner);
		replan_locked(&mut inner);
		let wait_duration = inner
			.next_wake
			.map(|target| {
				target
					.duration_since(SystemTime::now())
					.unwrap_or(Duration::ZERO)
			})
			.unwrap_or(POLL_CAP)
			.min(POLL_CAP);
		SCHEDULER.condvar.wait_for(&mut inner, wait_duration);
	}
}

/// Registers `clock`'s new interval with the scheduler, removing any entries
/// that indexed its previous interval. Rings `clock` immediately, instead of
/// indexing it, if the current wall time already falls outside `new`.
pub(crate) fn monitor(clock: Arc<Clock>, old: Interval, new: Interval) {
	ensure_thread_started();

	let mut inner = SCHEDULER.state.lock();
	tick_locked(&mut inner);
	remove_entries(&mut inner, old, &clock);

	let now = SystemTime::now();
	if !new.contains(now) {
		drop(inner);
		#[cfg(feature = "tracing-logging")]
		tracing::trace!("clock interval already lapsed at monitor time, ringing immediately");
		clock.ring();
		return;
	}

	add_entries(&mut inner, new, &clock);
	replan_locked(&mut inner);
	drop(inner);
	SCHEDULER.condvar.notify_one();
}

fn remove_entries(inner: &mut Inner, interval: Interval, clock: &Arc<Clock>) {
	let target = Arc::downgrade(clock);
	for bound in [interval.lower(), interval.upper()].into_iter().flatten() {
		if let Some(entries) = inner.index.get_mut(&bound) {
			entries.retain(|weak| !Weak::ptr_eq(weak, &target));
			if entries.is_empty() {
				inner.index.remove(&bound);
			}
		}
	}
}

fn add_entries(inner: &mut Inner, interval: Interval, clock: &Arc<Clock>) {
	for bound in [interval.lower(), interval.upper()].into_iter().flatten() {
		inner
			.index
			.entry(bound)
			.or_default()
			.push(Arc::downgrade(clock));
		inner.indexed_count += 1;
	}
	maybe_purge(inner);
}

/// Reads the current wall time and rings every indexed alarm whose bound
/// lies between the last observed wall time and now, in whichever direction
/// the wall clock moved (it may step backward).
fn tick_locked(inner: &mut Inner) {
	let fresh = SystemTime::now();
	let prev = inner.last_tick;

	let (low, high) = if fresh >= prev { (prev, fresh) } else { (fresh, prev) };

	let due_keys: Vec<SystemTime> = inner.index.range(low..=high).map(|(k, _)| *k).collect();
	let mut to_ring: Vec<Arc<Clock>> = Vec::new();
	for key in due_keys {
		if let Some(weaks) = inner.index.remove(&key) {
			for weak in weaks {
				if let Some(clock) = weak.upgrade() {
					if !to_ring.iter().any(|existing| Arc::ptr_eq(existing, &clock)) {
						to_ring.push(clock);
					}
				}
			}
		}
	}

	inner.last_tick = fresh;

	if !to_ring.is_empty() {
		#[cfg(feature = "tracing-logging")]
		tracing::trace!(count = to_ring.len(), "scheduler tick ringing alarms");
		for clock in to_ring {
			clock.ring();
		}
	}
}

fn replan_locked(inner: &mut Inner) {
	let now = inner.last_tick;
	let earliest = inner.index.range((std::ops::Bound::Excluded(now), std::ops::Bound::Unbounded)).next().map(|(k, _)| *k);
	inner.next_wake = earliest;
}

fn maybe_purge(inner: &mut Inner) {
	if inner.indexed_count < inner.last_purge_count.saturating_mul(PURGE_GROWTH_FACTOR).max(16) {
		return;
	}
	let mut remaining = 0usize;
	inner.index.retain(|_, weaks| {
		weaks.retain(|weak| weak.strong_count() > 0);
		remaining += weaks.len();
		!weaks.is_empty()
	});
	#[cfg(feature = "tracing-logging")]
	tracing::trace!(remaining, "scheduler index purged");
	inner.indexed_count = remaining;
	inner.last_purge_count = remaining;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn replan_picks_the_earliest_bound_strictly_after_last_tick() {
		let mut inner = Inner::new();
		let base = inner.last_tick;
		inner.index.insert(base, Vec::new());
		inner
			.index
			.insert(base + Duration::from_secs(5), Vec::new());
		inner
			.index
			.insert(base + Duration::from_secs(1), Vec::new());

		replan_locked(&mut inner);

		assert_eq!(inner.next_wake, Some(base + Duration::from_secs(1)));
	}

	#[test]
	fn tick_rings_every_due_alarm_exactly_once_even_if_indexed_twice() {
		let mut inner = Inner::new();
		let clock = Clock::new();
		let weak = Arc::downgrade(&clock);

		let due = inner.last_tick;
		inner.index.insert(due, vec![weak.clone(), weak]);

		tick_locked(&mut inner);

		assert!(inner.index.is_empty());
		// Ringing twice in one tick would have advanced the clock's internal
		// variable version by 2; a single ring advances it by exactly 1.
		assert_eq!(clock.ring_version(), 2);
	}

	#[test]
	fn purge_drops_entries_whose_clock_was_collected() {
		let mut inner = Inner::new();
		{
			let clock = Clock::new();
			inner
				.index
				.insert(inner.last_tick, vec![Arc::downgrade(&clock)]);
			// `maybe_purge` only sweeps once the index has grown enough
			// since the last purge; force that condition directly rather
			// than indexing sixteen real clocks.
			inner.indexed_count = 16;
		}
		// `clock` is now dropped; only a dangling weak remains indexed.
		maybe_purge(&mut inner);
		assert!(inner.index.is_empty());
		assert_eq!(inner.indexed_count, 0);
	}
}
