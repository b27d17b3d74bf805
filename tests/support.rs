use std::fmt::Debug;
use std::sync::{Mutex, Once};

/// Installs a `tracing` subscriber once per test binary, so the `trace`-level
/// events emitted by the scheduler and the variable write path are visible
/// with `--nocapture` instead of silently dropped by the default no-op
/// subscriber. Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
	static INIT: Once = Once::new();
	INIT.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_test_writer()
			.try_init();
	});
}

/// Records events pushed from callbacks and asserts on their exact order.
pub struct Recorder<T> {
	events: Mutex<Vec<T>>,
}

impl<T: Debug + PartialEq> Recorder<T> {
	pub fn new() -> Self {
		Self {
			events: Mutex::new(Vec::new()),
		}
	}

	pub fn push(&self, event: T) {
		self.events.lock().unwrap().push(event);
	}

	#[track_caller]
	pub fn expect<const N: usize>(&self, expected: [T; N]) {
		let mut events = self.events.lock().unwrap();
		let actual = std::mem::take(&mut *events);
		assert_eq!(actual, expected);
	}
}
