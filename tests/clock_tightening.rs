mod support;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use reactive_core::{Clock, Scope, Trigger};
use support::Recorder;

#[test]
fn comparisons_tighten_the_validity_interval() {
	let scope = Scope::new();
	let clock = {
		let _entered = Scope::enter(&scope);
		Clock::in_scope(&scope)
	};

	let now = clock.now().system_time();
	assert_eq!(clock.interval(), reactive_core::Interval::unbounded());

	assert_eq!(clock.compare(now + Duration::from_secs(5)), Ordering::Less);
	assert_eq!(clock.interval().upper(), Some(now + Duration::from_secs(5)));
	assert_eq!(clock.interval().lower(), None);

	assert_eq!(clock.compare(now - Duration::from_secs(2)), Ordering::Greater);
	assert_eq!(
		clock.interval().lower(),
		Some(now - Duration::from_secs(2) + reactive_core::CLOCK_RESOLUTION)
	);
	assert_eq!(clock.interval().upper(), Some(now + Duration::from_secs(5)));
}

#[test]
fn comparing_against_the_frozen_instant_itself_forces_an_immediate_ring() {
	support::init_tracing();
	let v = Arc::new(Recorder::new());

	let scope = Scope::new();
	let clock = {
		let _entered = Scope::enter(&scope);
		Clock::in_scope(&scope)
	};
	let now = clock.now().system_time();

	let sub_scope = Scope::new();
	{
		let _entered = Scope::enter(&sub_scope);
		// Record a dependency on the clock's internal invalidation variable.
		clock.now();
	}
	let trigger = {
		let v = Arc::clone(&v);
		Trigger::new(move || v.push("rung"))
	};
	trigger.arm(&sub_scope).unwrap();

	// `T == now` tightens both ends: upper becomes `now`, lower becomes
	// `now + epsilon`, which is already an empty interval, so the clock must
	// ring synchronously instead of registering with the scheduler.
	assert_eq!(clock.compare(now), Ordering::Equal);

	v.expect(["rung"]);
	assert!(trigger.fired());
}

#[test]
fn truncation_yields_a_window_containing_the_frozen_instant() {
	let scope = Scope::new();
	let clock = {
		let _entered = Scope::enter(&scope);
		Clock::in_scope(&scope)
	};
	let now = clock.now().system_time();

	let unit = Duration::from_secs(60);
	let truncated = clock.truncated_to(unit).unwrap();

	assert!(truncated.system_time() <= now);
	let interval = clock.interval();
	assert!(interval.contains(now));
	assert_eq!(
		interval.upper(),
		Some(truncated.system_time() + unit)
	);
}

#[test]
fn truncating_to_a_zero_unit_is_an_invalid_argument() {
	let scope = Scope::new();
	let clock = {
		let _entered = Scope::enter(&scope);
		Clock::in_scope(&scope)
	};

	assert!(clock.truncated_to(Duration::ZERO).is_err());
}
