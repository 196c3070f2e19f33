use std::{
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	thread,
};

use proptest::prelude::*;
use tributary::{Disposable, Event, Lifetime, NoError, Observer, Signal};

#[path = "../../streambed/tests/_validator.rs"]
mod _validator;
use _validator::Validator;

#[test]
fn multicasts_in_registration_order() {
	static V: Validator<(&str, Event<i32, NoError>)> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _a = signal.observe(Observer::new(|event| V.push(("a", event))));
	let _b = signal.observe(Observer::new(|event| V.push(("b", event))));
	V.expect([]);

	input.send_next(1);
	V.expect([("a", Event::Next(1)), ("b", Event::Next(1))]);

	input.send_completed();
	V.expect([("a", Event::Completed), ("b", Event::Completed)]);
}

#[test]
fn terminates_at_most_once() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let (signal, input) = Signal::<i32, &str>::pipe();
	let _observation = signal.observe(Observer::new(|event| V.push(event)));

	input.send_next(1);
	input.send_completed();
	input.send_failed("late");
	input.send_next(2);
	input.send_interrupted();

	V.expect([Event::Next(1), Event::Completed]);
	assert!(signal.has_terminated());
}

#[test]
fn late_observers_are_rejected() {
	static V: Validator<Event<i32, NoError>> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	input.send_completed();

	assert!(signal
		.observe(Observer::new(|event| V.push(event)))
		.is_none());
	V.expect([]);
}

#[test]
fn observing_during_a_lifetime_replays_termination() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let (signal, input) = Signal::<i32, &str>::pipe();
	input.send_failed("broken");

	let (lifetime, _token) = Lifetime::make();
	signal.observe_during(&lifetime, Observer::new(|event| V.push(event)));
	V.expect([Event::Failed("broken")]);
}

#[test]
fn observing_during_a_lifetime_detaches_when_it_ends() {
	static V: Validator<Event<i32, NoError>> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let (lifetime, token) = Lifetime::make();
	signal.observe_during(&lifetime, Observer::new(|event| V.push(event)));

	input.send_next(1);
	token.end();
	input.send_next(2);
	V.expect([Event::Next(1)]);
}

#[test]
fn disposing_an_observation_detaches_only_that_observer() {
	static V: Validator<(&str, i32)> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let a = signal
		.observe_values(|value| V.push(("a", value)))
		.expect("alive");
	let _b = signal.observe_values(|value| V.push(("b", value)));

	input.send_next(1);
	a.dispose();
	a.dispose();
	input.send_next(2);
	V.expect([("a", 1), ("b", 1), ("b", 2)]);
}

#[test]
fn observers_may_send_into_their_own_signal() {
	static V: Validator<(&str, Event<i32, NoError>)> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _a = signal.observe(Observer::new({
		let input = input.clone();
		move |event| {
			V.push(("a", event));
			if event == Event::Next(1) {
				input.send_next(2);
			}
		}
	}));
	let _b = signal.observe(Observer::new(|event| V.push(("b", event))));

	input.send_next(1);
	V.expect([
		("a", Event::Next(1)),
		("a", Event::Next(2)),
		("b", Event::Next(2)),
		("b", Event::Next(1)),
	]);

	input.send_completed();
	V.expect([("a", Event::Completed), ("b", Event::Completed)]);
}

#[test]
fn reentrant_termination_stops_the_current_delivery() {
	static V: Validator<(&str, Event<i32, NoError>)> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _a = signal.observe(Observer::new({
		let input = input.clone();
		move |event| {
			V.push(("a", event));
			if event == Event::Next(1) {
				input.send_completed();
			}
		}
	}));
	let _b = signal.observe(Observer::new(|event| V.push(("b", event))));

	input.send_next(1);
	V.expect([
		("a", Event::Next(1)),
		("a", Event::Completed),
		("b", Event::Completed),
	]);

	input.send_next(2);
	V.expect([]);
}

#[test]
fn generator_lifetime_ends_on_termination() {
	static V: Validator<&str> = Validator::new();

	let mut input = None;
	let signal = Signal::<i32, NoError>::new(|observer, lifetime| {
		let _ = lifetime.observe_ended(|| V.push("ended"));
		input = Some(observer);
	});
	let input = input.expect("set by the generator");
	V.expect([]);

	input.send_completed();
	V.expect(["ended"]);
	drop(signal);
}

#[test]
fn abandoned_signals_interrupt_their_observers() {
	static V: Validator<Event<i32, NoError>> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _observation = signal.observe(Observer::new(|event| V.push(event)));

	drop(signal);
	input.send_next(1);
	V.expect([Event::Next(1)]);

	drop(input);
	V.expect([Event::Interrupted]);
}

#[test]
fn take_during_completes_when_the_lifetime_ends() {
	static V: Validator<Event<i32, NoError>> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let (lifetime, token) = Lifetime::make();
	let _observation = signal
		.take_during(&lifetime)
		.observe(Observer::new(|event| V.push(event)));

	input.send_next(1);
	token.end();
	input.send_next(2);
	V.expect([Event::Next(1), Event::Completed]);
}

#[test]
fn empty_and_never() {
	static V: Validator<Event<i32, NoError>> = Validator::new();

	let empty = Signal::<i32, NoError>::empty();
	assert!(empty.has_terminated());
	let (lifetime, _token) = Lifetime::make();
	empty.observe_during(&lifetime, Observer::new(|event| V.push(event)));
	V.expect([Event::Interrupted]);

	let never = Signal::<i32, NoError>::never();
	let _observation = never.observe(Observer::new(|event| V.push(event)));
	assert!(!never.has_terminated());
	V.expect([]);
}

#[test]
fn concurrent_sends_are_serialized() {
	const THREADS: usize = 4;
	const PER_THREAD: usize = 250;

	let (signal, input) = Signal::<usize, NoError>::pipe();
	let delivering = Arc::new(AtomicBool::new(false));
	let received = Arc::new(AtomicUsize::new(0));

	let _observation = signal.observe_values({
		let (delivering, received) = (Arc::clone(&delivering), Arc::clone(&received));
		move |_| {
			assert!(
				!delivering.swap(true, Ordering::SeqCst),
				"overlapping deliveries"
			);
			received.fetch_add(1, Ordering::SeqCst);
			delivering.store(false, Ordering::SeqCst);
		}
	});

	thread::scope(|scope| {
		for _ in 0..THREADS {
			let input = input.clone();
			scope.spawn(move || {
				for i in 0..PER_THREAD {
					input.send_next(i);
				}
			});
		}
	});

	assert_eq!(received.load(Ordering::SeqCst), THREADS * PER_THREAD);
}

#[derive(Debug, Clone)]
enum Op {
	Next(u8),
	Fail(u8),
	Complete,
	Interrupt,
}

impl Op {
	fn into_event(self) -> Event<u8, u8> {
		match self {
			Op::Next(value) => Event::Next(value),
			Op::Fail(error) => Event::Failed(error),
			Op::Complete => Event::Completed,
			Op::Interrupt => Event::Interrupted,
		}
	}
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		4 => any::<u8>().prop_map(Op::Next),
		1 => any::<u8>().prop_map(Op::Fail),
		1 => Just(Op::Complete),
		1 => Just(Op::Interrupt),
	]
}

proptest! {
	#[test]
	fn observers_see_a_well_formed_prefix(ops in prop::collection::vec(op(), 0..32)) {
		let (signal, input) = Signal::<u8, u8>::pipe();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let _observation = signal.observe(Observer::new({
			let seen = Arc::clone(&seen);
			move |event| seen.lock().unwrap().push(event)
		}));

		let sent: Vec<Event<u8, u8>> = ops.into_iter().map(Op::into_event).collect();
		for event in &sent {
			input.send(*event);
		}

		let expected: Vec<Event<u8, u8>> = match sent.iter().position(Event::is_terminating) {
			Some(index) => sent[..=index].to_vec(),
			None => sent.clone(),
		};
		prop_assert_eq!(&*seen.lock().unwrap(), &expected);
		prop_assert_eq!(signal.has_terminated(), expected.last().is_some_and(Event::is_terminating));
	}
}
