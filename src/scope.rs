//! Per-computation dependency record, blocking flag, and freeze/pin tables.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding;
use crate::variable::WatchedVariable;

/// A key into a [`Scope`]'s freeze or pin table.
///
/// Freeze and pin tables are simple `Key -> Box<dyn Any>` caches; callers
/// that need identity-sensitive caching should store an `Arc` as the cached
/// value so pointer identity is preserved across lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub u64);

type CacheMap = HashMap<Key, Box<dyn Any + Send + Sync>>;

/// A record of every variable a computation observed, plus its blocking
/// state and its freeze/pin caches.
pub struct Scope {
	dependencies: Mutex<HashMap<usize, (Arc<dyn WatchedVariable>, u64)>>,
	blocking: AtomicBool,
	freezes: Mutex<CacheMap>,
	pins: Arc<Mutex<CacheMap>>,
}

impl Scope {
	/// Creates a fresh scope with an empty dependency set and a new pin
	/// chain.
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			dependencies: Mutex::new(HashMap::new()),
			blocking: AtomicBool::new(false),
			freezes: Mutex::new(HashMap::new()),
			pins: Arc::new(Mutex::new(HashMap::new())),
		})
	}

	/// Creates a fresh scope that continues `previous`'s pin chain, as
	/// happens when `previous` ended in a blocking state and this scope is
	/// its re-run. Freezes never carry over; pins do.
	pub fn chained_from(previous: &Scope) -> Arc<Self> {
		Arc::new(Self {
			dependencies: Mutex::new(HashMap::new()),
			blocking: AtomicBool::new(false),
			freezes: Mutex::new(HashMap::new()),
			pins: Arc::clone(&previous.pins),
		})
	}

	/// Records `variable` at `version` into this scope's dependency map,
	/// keeping the smaller version on repeat calls for the same variable.
	pub fn watch(&self, variable: Arc<dyn WatchedVariable>, version: u64) {
		let mut dependencies = self.dependencies.lock();
		dependencies
			.entry(variable.variable_id())
			.and_modify(|(_, recorded)| {
				if version < *recorded {
					*recorded = version;
				}
			})
			.or_insert((variable, version));
	}

	/// Sets the blocking flag.
	pub fn block(&self) {
		self.blocking.store(true, Ordering::Release);
	}

	/// Returns whether the blocking flag is set.
	pub fn blocked(&self) -> bool {
		self.blocking.load(Ordering::Acquire)
	}

	/// Runs `producer` the first time `key` is requested in this scope's
	/// lifetime, and returns the cached result on every later call.
	pub fn freeze<T, F>(&self, key: Key, producer: F) -> T
	where
		T: Clone + Send + Sync + 'static,
		F: FnOnce() -> T,
	{
		let mut freezes = self.freezes.lock();
		if let Some(cached) = freezes.get(&key) {
			return cached
				.downcast_ref::<T>()
				.expect("freeze key reused with a different type")
				.clone();
		}
		let value = producer();
		freezes.insert(key, Box::new(value.clone()));
		value
	}

	/// Like [`Self::freeze`], but the backing storage is shared across a
	/// chain of scopes linked by [`Self::chained_from`], so the cached value
	/// survives a blocking-triggered re-run.
	pub fn pin<T, F>(&self, key: Key, producer: F) -> T
	where
		T: Clone + Send + Sync + 'static,
		F: FnOnce() -> T,
	{
		let mut pins = self.pins.lock();
		if let Some(cached) = pins.get(&key) {
			return cached
				.downcast_ref::<T>()
				.expect("pin key reused with a different type")
				.clone();
		}
		let value = producer();
		pins.insert(key, Box::new(value.clone()));
		value
	}

	/// A snapshot of this scope's dependency set, for arming a trigger.
	pub(crate) fn dependencies_snapshot(&self) -> Vec<(Arc<dyn WatchedVariable>, u64)> {
		self.dependencies.lock().values().cloned().collect()
	}

	/// Returns the scope on top of the current worker's stack, if any.
	pub fn current() -> Option<Arc<Scope>> {
		binding::current()
	}

	/// Pushes `scope` onto the current worker's stack and returns an RAII
	/// guard that pops it again on drop.
	pub fn enter(scope: &Arc<Scope>) -> ScopeGuard {
		binding::push(Arc::clone(scope));
		ScopeGuard {
			scope: Arc::clone(scope),
		}
	}
}

/// RAII guard returned by [`Scope::enter`]; pops the scope on drop.
pub struct ScopeGuard {
	scope: Arc<Scope>,
}

impl Drop for ScopeGuard {
	fn drop(&mut self) {
		binding::pop(&self.scope);
	}
}
