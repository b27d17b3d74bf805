//! The one-shot armable notifier: [`Trigger`].

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::ReactiveError;
use crate::scope::Scope;
use crate::variable::WatchedVariable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerState {
	Idle,
	Armed,
	Fired,
	Closed,
}

struct TriggerInner {
	state: TriggerState,
	watched: Vec<Arc<dyn WatchedVariable>>,
}

/// A one-shot subscription: armed against a [`Scope`]'s recorded
/// dependencies, it fires its callback exactly once, the first time any of
/// those dependencies' versions advance (or immediately, at arm time, if one
/// already had).
pub struct Trigger {
	inner: Mutex<TriggerInner>,
	callback: Mutex<Option<Box<dyn FnOnce() + Send>>>,
	self_weak: Weak<Trigger>,
}

impl Trigger {
	/// Creates a new, unarmed trigger wrapping `callback`.
	pub fn new(callback: impl FnOnce() + Send + 'static) -> Arc<Self> {
		Arc::new_cyclic(|weak| Self {
			inner: Mutex::new(TriggerInner {
				state: TriggerState::Idle,
				watched: Vec::new(),
			}),
			callback: Mutex::new(Some(Box::new(callback))),
			self_weak: weak.clone(),
		})
	}

	/// Subscribes this trigger to every variable recorded in `scope`'s
	/// dependency map, then checks each for a version mismatch. If any
	/// variable has already advanced past the recorded version, the callback
	/// fires synchronously, before this call returns; the subscriptions are
	/// left in place (best-effort) rather than torn down, since `fire`
	/// already transitions the trigger to `Fired` and `close` or the next
	/// write on each still-subscribed variable will remove them.
	///
	/// Fails with [`ReactiveError::IllegalState`] if this trigger is not
	/// currently `Idle`.
	pub fn arm(&self, scope: &Scope) -> Result<(), ReactiveError> {
		{
			let mut inner = self.inner.lock();
			if inner.state != TriggerState::Idle {
				return Err(ReactiveError::illegal_state(
					"Trigger::arm called on a trigger that is not Idle",
				));
			}
			inner.state = TriggerState::Armed;
		}

		let dependencies = scope.dependencies_snapshot();
		let mut watched = Vec::with_capacity(dependencies.len());
		let mut stale = false;
		for (variable, recorded_version) in dependencies {
			variable.subscribe(self.self_weak.clone());
			if variable.current_version() > recorded_version {
				stale = true;
			}
			watched.push(variable);
		}

		self.inner.lock().watched = watched;

		if stale {
			self.fire();
		}
		Ok(())
	}

	/// Fires this trigger: idempotent. Transitions to `Fired` and runs the
	/// callback exactly once; later calls (including ones raised by a
	/// variable write this call itself may cause, through the callback) are
	/// no-ops. Does not unsubscribe — a firing variable has already removed
	/// this trigger via its subscriber-set swap; any other still-subscribed
	/// variables are cleaned up by [`Self::close`] or by their own next
	/// write.
	pub fn fire(&self) {
		let callback = {
			let mut inner = self.inner.lock();
			if matches!(inner.state, TriggerState::Fired | TriggerState::Closed) {
				return;
			}
			inner.state = TriggerState::Fired;
			self.callback.lock().take()
		};
		if let Some(callback) = callback {
			#[cfg(feature = "tracing-logging")]
			tracing::trace!("trigger fired");
			callback();
		}
	}

	/// Unsubscribes from every remaining watched variable and transitions to
	/// `Closed`. The callback never runs after this returns, even if it had
	/// not fired yet.
	pub fn close(&self) {
		let watched = {
			let mut inner = self.inner.lock();
			inner.state = TriggerState::Closed;
			std::mem::take(&mut inner.watched)
		};
		self.callback.lock().take();
		for variable in watched {
			variable.unsubscribe(&self.self_weak);
		}
	}

	/// Whether this trigger has fired.
	pub fn fired(&self) -> bool {
		self.inner.lock().state == TriggerState::Fired
	}
}
