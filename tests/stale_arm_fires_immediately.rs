mod support;

use std::sync::Arc;

use reactive_core::{Scope, Trigger, Variable, ValueBundle};
use support::Recorder;

#[test]
fn arming_against_an_already_stale_scope_fires_synchronously() {
	let v = Arc::new(Recorder::new());

	let x = Variable::new(1);
	let scope = Scope::new();
	{
		let _entered = Scope::enter(&scope);
		x.read();
	}

	// The variable moves on before the trigger is ever armed.
	x.write(ValueBundle::ready(2));

	let trigger = {
		let v = Arc::clone(&v);
		Trigger::new(move || v.push("fired"))
	};
	trigger.arm(&scope).unwrap();

	// `arm` must have already run the callback before returning.
	v.expect(["fired"]);
	assert!(trigger.fired());
}

#[test]
fn arming_twice_is_an_illegal_state() {
	let x = Variable::new(1);
	let scope = Scope::new();
	{
		let _entered = Scope::enter(&scope);
		x.read();
	}

	let trigger = Trigger::new(|| {});
	trigger.arm(&scope).unwrap();
	assert!(trigger.arm(&scope).is_err());
}
