//! Error types surfaced by the reactive core.
//!
//! The core never panics on caller-reachable misuse; it reports it through
//! [`ReactiveError`] instead. The only other error type, [`AsyncCompletionError`],
//! wraps an exception stored in a [`ValueBundle`](crate::value::ValueBundle) when
//! that bundle is unwrapped.

use std::error::Error;
use std::fmt;

/// Errors produced by misuse of the core API surface.
#[derive(Debug)]
pub enum ReactiveError {
	/// An argument did not satisfy a documented precondition.
	InvalidArgument {
		/// Human-readable description of the violated precondition.
		message: String,
	},
	/// An operation was attempted while the receiver was in a state that
	/// does not support it.
	IllegalState {
		/// Human-readable description of the offending state.
		message: String,
	},
}

impl fmt::Display for ReactiveError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidArgument { message } => write!(f, "invalid argument: {message}"),
			Self::IllegalState { message } => write!(f, "illegal state: {message}"),
		}
	}
}

impl Error for ReactiveError {}

impl ReactiveError {
	pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
		Self::InvalidArgument {
			message: message.into(),
		}
	}

	pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
		Self::IllegalState {
			message: message.into(),
		}
	}
}

/// Wraps an exception that was stored in a value bundle and is being
/// re-raised because the bundle was unwrapped.
#[derive(Debug)]
pub struct AsyncCompletionError {
	source: Box<dyn Error + Send + Sync + 'static>,
}

impl AsyncCompletionError {
	pub(crate) fn new(source: Box<dyn Error + Send + Sync + 'static>) -> Self {
		Self { source }
	}
}

impl fmt::Display for AsyncCompletionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "propagated exception: {}", self.source)
	}
}

impl Error for AsyncCompletionError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(&*self.source)
	}
}
