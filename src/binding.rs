//! The thread-local stack of active [`Scope`]s.
//!
//! Each worker thread has its own stack; nested reactive computations (for
//! instance a computed signal reading another computed signal) push and pop
//! their scope around the body that performs the reads.

use std::cell::RefCell;
use std::sync::Arc;

use crate::scope::Scope;

thread_local! {
	static SCOPE_STACK: RefCell<Vec<Arc<Scope>>> = const { RefCell::new(Vec::new()) };
}

/// Returns the scope on top of this worker's stack, if any.
pub fn current() -> Option<Arc<Scope>> {
	SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Pushes `scope` onto this worker's stack. Re-entering the same scope while
/// it is already on the stack is tolerated.
pub fn push(scope: Arc<Scope>) {
	SCOPE_STACK.with(|stack| stack.borrow_mut().push(scope));
}

/// Removes the most recent entry matching `scope` from this worker's stack.
///
/// Tolerates out-of-order pops (when a computation ends explicitly rather
/// than through a scoped lifetime): the stack is searched from the top for
/// the first identity match, rather than requiring `scope` to be the literal
/// top entry. Popping a scope that is not present is a silent no-op.
pub fn pop(scope: &Arc<Scope>) {
	SCOPE_STACK.with(|stack| {
		let mut stack = stack.borrow_mut();
		if let Some(index) = stack
			.iter()
			.rposition(|candidate| Arc::ptr_eq(candidate, scope))
		{
			stack.remove(index);
		}
	});
}

/// Returns the number of scopes currently on this worker's stack. Exposed for
/// tests that check `enter`/`leave` balance.
#[cfg(test)]
pub(crate) fn depth() -> usize {
	SCOPE_STACK.with(|stack| stack.borrow().len())
}
