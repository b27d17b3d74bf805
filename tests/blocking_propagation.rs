use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use reactive_core::{Key, Scope, Variable};

#[test]
fn reading_a_blocking_bundle_marks_the_scope_blocked() {
	let x: Arc<Variable<i32>> = Variable::empty();

	let scope = Scope::new();
	let bundle = {
		let _entered = Scope::enter(&scope);
		x.read()
	};

	assert!(!scope.blocked());
	bundle.unwrap_in(&scope).unwrap();
	assert!(scope.blocked());
}

#[test]
fn pin_runs_its_producer_once_across_a_chain_but_freeze_does_not_carry_over() {
	let runs = Arc::new(AtomicU32::new(0));
	let key = Key(1);

	let first = Scope::new();
	let first_value = {
		let runs = Arc::clone(&runs);
		first.pin(key, move || {
			runs.fetch_add(1, Ordering::SeqCst);
			42
		})
	};
	let first_value_again = {
		let runs = Arc::clone(&runs);
		first.pin(key, move || {
			runs.fetch_add(1, Ordering::SeqCst);
			99
		})
	};
	assert_eq!(first_value, 42);
	assert_eq!(first_value_again, 42);
	assert_eq!(runs.load(Ordering::SeqCst), 1);

	// A scope chained from `first` (as happens when `first` ended blocking and
	// is re-run) shares the pin table, so the producer still does not re-run.
	let second = Scope::chained_from(&first);
	let second_value = {
		let runs = Arc::clone(&runs);
		second.pin(key, move || {
			runs.fetch_add(1, Ordering::SeqCst);
			7
		})
	};
	assert_eq!(second_value, 42);
	assert_eq!(runs.load(Ordering::SeqCst), 1);

	// An unrelated scope has its own pin table.
	let unrelated = Scope::new();
	let unrelated_value = unrelated.pin(key, || 1000);
	assert_eq!(unrelated_value, 1000);

	// Freezes, unlike pins, never carry over even within the same chain.
	let freeze_runs = Arc::new(AtomicU32::new(0));
	let freeze_value = {
		let freeze_runs = Arc::clone(&freeze_runs);
		first.freeze(key, move || {
			freeze_runs.fetch_add(1, Ordering::SeqCst);
			"frozen"
		})
	};
	let second_freeze_value = {
		let freeze_runs = Arc::clone(&freeze_runs);
		second.freeze(key, move || {
			freeze_runs.fetch_add(1, Ordering::SeqCst);
			"frozen-again"
		})
	};
	assert_eq!(freeze_value, "frozen");
	assert_eq!(second_freeze_value, "frozen-again");
	assert_eq!(freeze_runs.load(Ordering::SeqCst), 2);
}
