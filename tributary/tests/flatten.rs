use tributary::{Event, FlattenStrategy, NoError, Observer, Signal, SignalProducer};

#[path = "../../streambed/tests/_validator.rs"]
mod _validator;
use _validator::Validator;

type Producer = SignalProducer<i32, &'static str>;

fn pipes() -> (Signal<Producer, &'static str>, Observer<Producer, &'static str>) {
	Signal::pipe()
}

/// A producer that never sends anything and records `name` once its execution ends.
fn parked(name: &'static str, ended: &'static Validator<&'static str>) -> Producer {
	SignalProducer::new(move |observer, lifetime| {
		let _ = lifetime.observe_ended(move || {
			drop(observer);
			ended.push(name);
		});
	})
}

#[test]
fn merge_interleaves_and_waits_for_everything() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let (outer, outer_input) = pipes();
	let (a, a_input) = Signal::<i32, &str>::pipe();
	let (b, b_input) = Signal::<i32, &str>::pipe();
	let _observation = outer
		.flatten(FlattenStrategy::Merge)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(SignalProducer::from_signal(a));
	outer_input.send_next(SignalProducer::from_signal(b));
	a_input.send_next(1);
	b_input.send_next(2);
	a_input.send_next(3);
	V.expect([Event::Next(1), Event::Next(2), Event::Next(3)]);

	outer_input.send_completed();
	a_input.send_completed();
	V.expect([]);

	b_input.send_completed();
	V.expect([Event::Completed]);
}

#[test]
fn merge_forwards_inner_failure() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let (outer, outer_input) = pipes();
	let (a, a_input) = Signal::<i32, &str>::pipe();
	let _observation = outer
		.flatten(FlattenStrategy::Merge)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(SignalProducer::from_signal(a));
	outer_input.send_next(SignalProducer::failed("inner"));
	V.expect([Event::Failed("inner")]);

	a_input.send_next(1);
	V.expect([]);
}

#[test]
fn merge_failure_ends_the_other_inners() {
	static V: Validator<Event<i32, &str>> = Validator::new();
	static ENDED: Validator<&str> = Validator::new();

	let (outer, outer_input) = pipes();
	let _observation = outer
		.flatten(FlattenStrategy::Merge)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(parked("a", &ENDED));
	outer_input.send_next(parked("b", &ENDED));
	ENDED.expect([]);

	outer_input.send_next(SignalProducer::failed("inner"));
	V.expect([Event::Failed("inner")]);
	ENDED.expect_unordered(["a", "b"]);
}

#[test]
fn concat_runs_one_inner_at_a_time() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let (outer, outer_input) = pipes();
	let (a, a_input) = Signal::<i32, &str>::pipe();
	let (b, b_input) = Signal::<i32, &str>::pipe();
	let _observation = outer
		.flatten(FlattenStrategy::Concat)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(SignalProducer::from_signal(a));
	outer_input.send_next(SignalProducer::from_signal(b));

	// Not started yet, so this is lost.
	b_input.send_next(10);
	a_input.send_next(1);
	V.expect([Event::Next(1)]);

	a_input.send_completed();
	b_input.send_next(2);
	V.expect([Event::Next(2)]);

	b_input.send_completed();
	V.expect([]);

	outer_input.send_completed();
	V.expect([Event::Completed]);
}

#[test]
fn concat_outer_failure_ends_the_active_inner() {
	static V: Validator<Event<i32, &str>> = Validator::new();
	static ENDED: Validator<&str> = Validator::new();

	let (outer, outer_input) = pipes();
	let _observation = outer
		.flatten(FlattenStrategy::Concat)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(parked("a", &ENDED));
	outer_input.send_next(parked("queued", &ENDED));
	ENDED.expect([]);

	outer_input.send_failed("outer");
	V.expect([Event::Failed("outer")]);
	ENDED.expect(["a"]);
}

#[test]
fn concat_inner_failure_drops_the_queue() {
	static V: Validator<Event<i32, &str>> = Validator::new();
	static ENDED: Validator<&str> = Validator::new();

	let (outer, outer_input) = pipes();
	let (a, a_input) = Signal::<i32, &str>::pipe();
	let _observation = outer
		.flatten(FlattenStrategy::Concat)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(SignalProducer::from_signal(a));
	outer_input.send_next(parked("queued", &ENDED));
	a_input.send_failed("inner");
	V.expect([Event::Failed("inner")]);
	ENDED.expect([]);

	outer_input.send_next(parked("late", &ENDED));
	ENDED.expect([]);
}

#[test]
fn concat_of_cold_producers_keeps_order() {
	let nested = SignalProducer::<Producer, &str>::from_values([
		SignalProducer::from_values([1, 2]),
		SignalProducer::empty(),
		SignalProducer::from_values([3]),
	]);

	assert_eq!(
		nested.flatten(FlattenStrategy::Concat).collect().single(),
		Ok(vec![1, 2, 3])
	);
}

#[test]
fn latest_switches_to_the_newest_inner() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let (outer, outer_input) = pipes();
	let (a, a_input) = Signal::<i32, &str>::pipe();
	let (b, b_input) = Signal::<i32, &str>::pipe();
	let _observation = outer
		.flatten(FlattenStrategy::Latest)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(SignalProducer::from_signal(a));
	a_input.send_next(1);
	outer_input.send_next(SignalProducer::from_signal(b));
	a_input.send_next(2);
	b_input.send_next(3);
	V.expect([Event::Next(1), Event::Next(3)]);

	outer_input.send_completed();
	V.expect([]);

	b_input.send_completed();
	V.expect([Event::Completed]);
}

#[test]
fn inner_interruption_counts_as_completion() {
	let nested = SignalProducer::<Producer, &str>::from_values([
		SignalProducer::from_values([1]),
		SignalProducer::new(|observer, _| observer.send_interrupted()),
		SignalProducer::from_values([2]),
	]);

	for strategy in [
		FlattenStrategy::Merge,
		FlattenStrategy::Concat,
		FlattenStrategy::Latest,
	] {
		assert_eq!(
			nested.flatten(strategy).collect().single(),
			Ok(vec![1, 2]),
			"{strategy:?}"
		);
	}
}

#[test]
fn flat_map_with_synchronous_inners() {
	let expanded = SignalProducer::<i32, NoError>::from_values([1, 2, 3])
		.flat_map(FlattenStrategy::Merge, |x| {
			SignalProducer::from_values([x, x * 10])
		});

	assert_eq!(expanded.collect().single(), Ok(vec![1, 10, 2, 20, 3, 30]));
}

#[test]
fn outer_interruption_interrupts_the_result() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let (outer, outer_input) = pipes();
	let _observation = outer
		.flatten(FlattenStrategy::Merge)
		.observe(Observer::new(|event| V.push(event)));

	outer_input.send_next(SignalProducer::never());
	outer_input.send_interrupted();
	V.expect([Event::Interrupted]);
}
