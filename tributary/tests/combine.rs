use tributary::{Event, NoError, Observer, Signal, SignalProducer};

#[path = "../../streambed/tests/_validator.rs"]
mod _validator;
use _validator::Validator;

#[test]
fn combine_latest_waits_for_every_source() {
	static V: Validator<Event<(i32, &str), NoError>> = Validator::new();

	let (numbers, numbers_input) = Signal::<i32, NoError>::pipe();
	let (names, names_input) = Signal::<&str, NoError>::pipe();
	let _observation = numbers
		.combine_latest(&names)
		.observe(Observer::new(|event| V.push(event)));

	numbers_input.send_next(1);
	V.expect([]);

	names_input.send_next("x");
	V.expect([Event::Next((1, "x"))]);

	numbers_input.send_next(2);
	numbers_input.send_completed();
	V.expect([Event::Next((2, "x"))]);

	names_input.send_next("y");
	V.expect([Event::Next((2, "y"))]);

	names_input.send_completed();
	V.expect([Event::Completed]);
}

#[test]
fn combine_latest_completes_early_without_a_value() {
	static V: Validator<Event<(i32, i32), NoError>> = Validator::new();

	let (a, a_input) = Signal::<i32, NoError>::pipe();
	let (b, b_input) = Signal::<i32, NoError>::pipe();
	let _observation = a
		.combine_latest(&b)
		.observe(Observer::new(|event| V.push(event)));

	a_input.send_next(1);
	b_input.send_completed();
	V.expect([Event::Completed]);
}

#[test]
fn combine_latest_forwards_failure() {
	static V: Validator<Event<Vec<i32>, &str>> = Validator::new();

	let (a, a_input) = Signal::<i32, &str>::pipe();
	let (b, b_input) = Signal::<i32, &str>::pipe();
	let _observation = Signal::combine_latest_all([a, b])
		.observe(Observer::new(|event| V.push(event)));

	a_input.send_next(1);
	b_input.send_next(2);
	a_input.send_failed("broken");
	b_input.send_next(3);
	V.expect([Event::Next(vec![1, 2]), Event::Failed("broken")]);
}

#[test]
fn zip_pairs_by_index() {
	static V: Validator<Event<(i32, &str), NoError>> = Validator::new();

	let (numbers, numbers_input) = Signal::<i32, NoError>::pipe();
	let (names, names_input) = Signal::<&str, NoError>::pipe();
	let _observation = numbers
		.zip(&names)
		.observe(Observer::new(|event| V.push(event)));

	numbers_input.send_next(1);
	numbers_input.send_next(2);
	V.expect([]);

	names_input.send_next("a");
	V.expect([Event::Next((1, "a"))]);

	// 2 is still queued, so this doesn't complete the result yet.
	numbers_input.send_completed();
	V.expect([]);

	names_input.send_next("b");
	V.expect([Event::Next((2, "b")), Event::Completed]);
}

#[test]
fn producers_combine_per_start() {
	let zipped = SignalProducer::<i32, NoError>::zip_all([
		SignalProducer::from_values([1, 2, 3]),
		SignalProducer::from_values([10, 20]),
	]);
	assert_eq!(zipped.collect().single(), Ok(vec![vec![1, 10], vec![2, 20]]));

	let combined = SignalProducer::<i32, NoError>::combine_latest_all([
		SignalProducer::value(1),
		SignalProducer::value(2),
	]);
	assert_eq!(combined.single(), Ok(vec![1, 2]));

	let paired = SignalProducer::<i32, NoError>::value(1).zip(&SignalProducer::value('a'));
	assert_eq!(paired.single(), Ok((1, 'a')));
	assert_eq!(paired.single(), Ok((1, 'a')));
}

#[test]
fn combining_nothing_completes_immediately() {
	let combined = SignalProducer::<i32, NoError>::combine_latest_all([]);
	assert_eq!(combined.collect().single(), Ok(Vec::<Vec<i32>>::new()));

	let zipped = SignalProducer::<i32, NoError>::zip_all([]);
	assert_eq!(zipped.collect().single(), Ok(Vec::<Vec<i32>>::new()));
}
