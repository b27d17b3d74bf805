//! The immutable value bundle stored by every [`Variable`](crate::variable::Variable).

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::error::AsyncCompletionError;
use crate::scope::Scope;

/// How two [`ValueBundle`]s (or the payloads/exceptions they carry) are compared
/// to decide whether a [`Variable`](crate::variable::Variable) write actually
/// changes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityMode {
	/// Compare payload and exception by content.
	Full,
	/// Compare payload and exception by identity.
	Reference,
}

impl Default for EqualityMode {
	fn default() -> Self {
		Self::Full
	}
}

/// Reference-identity comparison, used for [`EqualityMode::Reference`].
///
/// Only meaningful for reference-counted payloads: two handles compare equal
/// iff they point at the same allocation.
pub trait RefIdentity {
	/// Returns whether `self` and `other` refer to the same allocation.
	fn ref_eq(&self, other: &Self) -> bool;
}

impl<U: ?Sized> RefIdentity for Arc<U> {
	fn ref_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(self, other)
	}
}

/// An immutable triple of `result`, `exception` and `blocking`, as stored by a
/// [`Variable`](crate::variable::Variable).
///
/// The exception, if present, is kept behind an [`Arc`] so that bundles remain
/// cheaply cloneable and so [`EqualityMode::Reference`] can compare exceptions
/// by identity.
pub struct ValueBundle<T> {
	result: Option<T>,
	exception: Option<Arc<dyn Error + Send + Sync + 'static>>,
	blocking: bool,
}

impl<T> Clone for ValueBundle<T>
where
	T: Clone,
{
	fn clone(&self) -> Self {
		Self {
			result: self.result.clone(),
			exception: self.exception.clone(),
			blocking: self.blocking,
		}
	}
}

impl<T> fmt::Debug for ValueBundle<T>
where
	T: fmt::Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ValueBundle")
			.field("result", &self.result)
			.field("exception", &self.exception.as_ref().map(|e| e.to_string()))
			.field("blocking", &self.blocking)
			.finish()
	}
}

impl<T> ValueBundle<T> {
	/// A bundle carrying a ready, non-blocking payload.
	pub fn ready(result: T) -> Self {
		Self {
			result: Some(result),
			exception: None,
			blocking: false,
		}
	}

	/// A bundle with no payload and no exception, marked blocking.
	pub fn empty_blocking() -> Self {
		Self {
			result: None,
			exception: None,
			blocking: true,
		}
	}

	/// A bundle carrying a propagated exception instead of a payload.
	pub fn failed(exception: Arc<dyn Error + Send + Sync + 'static>) -> Self {
		Self {
			result: None,
			exception: Some(exception),
			blocking: false,
		}
	}

	/// Returns a bundle equal to `self` but with `blocking` set.
	#[must_use]
	pub fn with_blocking(mut self, blocking: bool) -> Self {
		self.blocking = blocking;
		self
	}

	/// The payload, if any.
	pub fn result(&self) -> Option<&T> {
		self.result.as_ref()
	}

	/// The propagated exception, if any.
	pub fn exception(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
		self.exception.as_deref()
	}

	/// Whether this bundle represents a not-yet-ready value.
	pub fn blocking(&self) -> bool {
		self.blocking
	}

	/// Content equality: payloads compare with [`PartialEq`], exceptions
	/// compare by their full `Display` cause chain, and `blocking` must match.
	pub fn equals_full(&self, other: &Self) -> bool
	where
		T: PartialEq,
	{
		self.blocking == other.blocking
			&& self.result == other.result
			&& exception_chains_equal(self.exception.as_deref(), other.exception.as_deref())
	}

	/// Unwraps this bundle inside `scope`: propagates `blocking` into the
	/// scope and, if an exception is present, returns it wrapped as an
	/// [`AsyncCompletionError`] instead of the payload.
	pub fn unwrap_in(&self, scope: &Scope) -> Result<Option<&T>, AsyncCompletionError>
	where
		T: Clone,
	{
		if self.blocking {
			scope.block();
		}
		if let Some(exception) = &self.exception {
			return Err(AsyncCompletionError::new(Box::new(DisplayError(
				exception.to_string(),
			))));
		}
		Ok(self.result.as_ref())
	}
}

impl<T> ValueBundle<T>
where
	T: RefIdentity,
{
	/// Identity equality: payload and exception compare by reference, and
	/// `blocking` must match.
	pub fn equals_ref(&self, other: &Self) -> bool {
		self.blocking == other.blocking
			&& match (&self.result, &other.result) {
				(Some(a), Some(b)) => a.ref_eq(b),
				(None, None) => true,
				_ => false,
			}
			&& match (&self.exception, &other.exception) {
				(Some(a), Some(b)) => Arc::ptr_eq(a, b),
				(None, None) => true,
				_ => false,
			}
	}
}

fn exception_chains_equal(
	a: Option<&(dyn Error + Send + Sync + 'static)>,
	b: Option<&(dyn Error + Send + Sync + 'static)>,
) -> bool {
	match (a, b) {
		(None, None) => true,
		(Some(a), Some(b)) => chain_string(a) == chain_string(b),
		_ => false,
	}
}

fn chain_string(err: &(dyn Error + 'static)) -> String {
	let mut out = err.to_string();
	let mut cursor = err.source();
	while let Some(source) = cursor {
		out.push_str(" <- ");
		out.push_str(&source.to_string());
		cursor = source.source();
	}
	out
}

#[derive(Debug)]
struct DisplayError(String);

impl fmt::Display for DisplayError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Error for DisplayError {}
