mod support;

use std::sync::Arc;

use reactive_core::{Scope, Trigger, Variable, ValueBundle};
use support::Recorder;

#[test]
fn a_write_that_compares_equal_does_not_fire_or_bump_version() {
	let v = Arc::new(Recorder::new());

	let x = Variable::new(5);
	let scope = Scope::new();
	{
		let _entered = Scope::enter(&scope);
		x.read();
	}

	let trigger = {
		let v = Arc::clone(&v);
		Trigger::new(move || v.push("fired"))
	};
	trigger.arm(&scope).unwrap();

	x.write(ValueBundle::ready(5));

	v.expect([]);
	assert_eq!(x.version(), 1);
	assert!(!trigger.fired());
}
