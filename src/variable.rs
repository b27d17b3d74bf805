//! The mutable reactive cell: [`Variable`].

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::scope::Scope;
use crate::trigger::Trigger;
use crate::value::{EqualityMode, ValueBundle};

/// Type-erased view of a [`Variable`], used by [`Scope`] to record
/// dependencies without naming every payload type, and by [`Trigger`] to
/// recheck versions at arm time.
pub trait WatchedVariable: Send + Sync {
	/// The variable's current version, without recording a dependency.
	fn current_version(&self) -> u64;
	/// A stable identity for this variable, used as a dependency-map key.
	fn variable_id(&self) -> usize;
	/// Adds `trigger` to this variable's subscriber set. Idempotent.
	fn subscribe(&self, trigger: Weak<Trigger>);
	/// Removes `trigger` from this variable's subscriber set. Idempotent.
	fn unsubscribe(&self, trigger: &Weak<Trigger>);
}

struct VariableState<T> {
	bundle: ValueBundle<T>,
	version: u64,
	subscribers: Vec<Weak<Trigger>>,
	keepalive: Option<Arc<dyn Any + Send + Sync>>,
}

type Comparator<T> = dyn Fn(&ValueBundle<T>, &ValueBundle<T>) -> bool + Send + Sync;

/// A mutable reactive cell holding a [`ValueBundle`], a monotonically
/// increasing version, and a weak set of subscribed [`Trigger`]s.
///
/// Two `Variable`s are only ever equal by identity: there is intentionally no
/// [`PartialEq`] impl.
pub struct Variable<T> {
	state: Mutex<VariableState<T>>,
	version_hint: AtomicU64,
	equality_mode: EqualityMode,
	compare: Box<Comparator<T>>,
	self_weak: Weak<Variable<T>>,
}

impl<T> Variable<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn with_compare(
		initial: ValueBundle<T>,
		equality_mode: EqualityMode,
		compare: impl Fn(&ValueBundle<T>, &ValueBundle<T>) -> bool + Send + Sync + 'static,
	) -> Arc<Self> {
		Arc::new_cyclic(|weak| Self {
			state: Mutex::new(VariableState {
				bundle: initial,
				version: 1,
				subscribers: Vec::new(),
				keepalive: None,
			}),
			version_hint: AtomicU64::new(1),
			equality_mode,
			compare: Box::new(compare),
			self_weak: weak.clone(),
		})
	}

	/// Creates a variable holding `value`, compared by content on writes.
	pub fn new(value: T) -> Arc<Self>
	where
		T: PartialEq,
	{
		Self::with_compare(ValueBundle::ready(value), EqualityMode::Full, |a, b| {
			a.equals_full(b)
		})
	}

	/// Creates a variable with no payload, marked blocking, compared by
	/// content on writes.
	pub fn empty() -> Arc<Self>
	where
		T: PartialEq,
	{
		Self::with_compare(
			ValueBundle::empty_blocking(),
			EqualityMode::Full,
			|a, b| a.equals_full(b),
		)
	}

	/// Creates a variable holding `value`, compared by payload/exception
	/// identity on writes. Requires the payload to support
	/// [`RefIdentity`](crate::value::RefIdentity) (for example `Arc<U>`).
	pub fn new_ref_equality(value: T) -> Arc<Self>
	where
		T: crate::value::RefIdentity,
	{
		Self::with_compare(
			ValueBundle::ready(value),
			EqualityMode::Reference,
			|a, b| a.equals_ref(b),
		)
	}

	/// Reads the current bundle. If a scope is active on this worker, the
	/// read is recorded into that scope's dependency map under this
	/// variable's current version.
	pub fn read(&self) -> ValueBundle<T> {
		let (bundle, version) = {
			let state = self.state.lock();
			(state.bundle.clone(), state.version)
		};
		if let Some(scope) = Scope::current() {
			if let Some(strong) = self.self_weak.upgrade() {
				let watched: Arc<dyn WatchedVariable> = strong;
				scope.watch(watched, version);
			}
		}
		bundle
	}

	/// Writes `new_bundle`. If it compares equal to the current bundle under
	/// this variable's equality mode, this is a no-op. Otherwise the version
	/// advances, the subscriber set is swapped for a fresh empty one, and
	/// every previously subscribed trigger is fired outside the lock.
	pub fn write(&self, new_bundle: ValueBundle<T>) {
		let fired = {
			let mut state = self.state.lock();
			if (self.compare)(&state.bundle, &new_bundle) {
				return;
			}
			state.bundle = new_bundle;
			state.version += 1;
			self.version_hint.store(state.version, Ordering::Release);
			std::mem::take(&mut state.subscribers)
		};
		#[cfg(feature = "tracing-logging")]
		tracing::trace!(
			variable = self as *const Self as usize,
			fired = fired.len(),
			"variable write fired triggers"
		);
		for weak in fired {
			if let Some(trigger) = weak.upgrade() {
				trigger.fire();
			}
		}
	}

	/// The current version, without recording a dependency.
	pub fn version(&self) -> u64 {
		self.version_hint.load(Ordering::Acquire)
	}

	/// The equality mode this variable was constructed with.
	pub fn equality_mode(&self) -> EqualityMode {
		self.equality_mode
	}

	/// Installs (or replaces) a strong reference from this variable to
	/// `target`, anchoring it against collection for as long as this
	/// variable is reachable.
	pub fn keepalive(&self, target: Arc<dyn Any + Send + Sync>) {
		self.state.lock().keepalive = Some(target);
	}
}

impl<T> WatchedVariable for Variable<T>
where
	T: Send + Sync,
{
	fn current_version(&self) -> u64 {
		self.version_hint.load(Ordering::Acquire)
	}

	fn variable_id(&self) -> usize {
		self as *const Self as usize
	}

	fn subscribe(&self, trigger: Weak<Trigger>) {
		let mut state = self.state.lock();
		if !state
			.subscribers
			.iter()
			.any(|existing| Weak::ptr_eq(existing, &trigger))
		{
			state.subscribers.push(trigger);
		}
	}

	fn unsubscribe(&self, trigger: &Weak<Trigger>) {
		let mut state = self.state.lock();
		state
			.subscribers
			.retain(|existing| !Weak::ptr_eq(existing, trigger));
	}
}
