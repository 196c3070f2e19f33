#![cfg(feature = "test_scheduler")]

use std::time::Duration;

use tributary::{
	scheduler::{DateScheduler, ImmediateScheduler, TestScheduler, Timestamp},
	Event, NoError, Observer, Signal, SignalProducer,
};

#[path = "../../streambed/tests/_validator.rs"]
mod _validator;
use _validator::Validator;

fn secs(secs: u64) -> Duration {
	Duration::from_secs(secs)
}

#[test]
fn timeout_fires_when_the_source_is_too_slow() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let scheduler = TestScheduler::new();
	let (signal, input) = Signal::<i32, &str>::pipe();
	let _observation = signal
		.timeout(secs(5), "timed out", scheduler.clone())
		.observe(Observer::new(|event| V.push(event)));

	input.send_next(1);
	scheduler.advance_by(secs(4));
	V.expect([Event::Next(1)]);

	scheduler.advance_by(secs(1));
	V.expect([Event::Failed("timed out")]);

	input.send_next(2);
	V.expect([]);
}

#[test]
fn timeout_is_cancelled_when_the_source_terminates() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let scheduler = TestScheduler::new();
	let _execution = SignalProducer::<i32, &str>::value(1)
		.timeout(secs(5), "timed out", scheduler.clone())
		.start(Observer::new(|event| V.push(event)));
	V.expect([Event::Next(1), Event::Completed]);

	assert_eq!(scheduler.pending_count(), 0);
	scheduler.run();
	V.expect([]);
}

#[test]
fn each_start_gets_its_own_timeout() {
	static V: Validator<(u64, Event<i32, &str>)> = Validator::new();

	let scheduler = TestScheduler::new();
	let slow = SignalProducer::<i32, &str>::never().timeout(secs(5), "timed out", scheduler.clone());

	let _first = slow.start(Observer::new(|event| V.push((1, event))));
	scheduler.advance_by(secs(3));
	let _second = slow.start(Observer::new(|event| V.push((2, event))));

	scheduler.advance_by(secs(2));
	V.expect([(1, Event::Failed("timed out"))]);

	scheduler.advance_by(secs(3));
	V.expect([(2, Event::Failed("timed out"))]);
}

#[test]
fn delay_shifts_values_and_completion() {
	static V: Validator<(Timestamp, Event<i32, NoError>)> = Validator::new();

	let scheduler = TestScheduler::new();
	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _observation = signal.delay(secs(2), scheduler.clone()).observe(Observer::new({
		let scheduler = scheduler.clone();
		move |event| V.push((scheduler.current_date(), event))
	}));

	input.send_next(1);
	scheduler.advance_by(secs(1));
	input.send_next(2);
	input.send_completed();
	V.expect([]);

	scheduler.run();
	V.expect([
		(Timestamp::from_duration(secs(2)), Event::Next(1)),
		(Timestamp::from_duration(secs(3)), Event::Next(2)),
		(Timestamp::from_duration(secs(3)), Event::Completed),
	]);
}

#[test]
fn delay_forwards_interruption_without_waiting() {
	static V: Validator<Event<i32, NoError>> = Validator::new();

	let scheduler = TestScheduler::new();
	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _observation = signal
		.delay(secs(10), scheduler.clone())
		.observe(Observer::new(|event| V.push(event)));

	input.send_next(1);
	input.send_interrupted();
	scheduler.advance();
	V.expect([Event::Interrupted]);
}

#[test]
fn throttle_keeps_the_latest_value_per_interval() {
	static V: Validator<(Timestamp, Event<i32, NoError>)> = Validator::new();

	let scheduler = TestScheduler::new();
	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _observation = signal.throttle(secs(1), scheduler.clone()).observe(Observer::new({
		let scheduler = scheduler.clone();
		move |event| V.push((scheduler.current_date(), event))
	}));

	input.send_next(1);
	scheduler.advance();
	V.expect([(Timestamp::ZERO, Event::Next(1))]);

	input.send_next(2);
	input.send_next(3);
	scheduler.advance();
	V.expect([]);

	scheduler.advance_by(secs(2));
	V.expect([(Timestamp::from_duration(secs(1)), Event::Next(3))]);

	let now = scheduler.current_date();
	input.send_next(4);
	input.send_next(5);
	input.send_completed();
	V.expect([(now, Event::Next(5)), (now, Event::Completed)]);
	assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn throttle_discards_the_waiting_value_on_failure() {
	static V: Validator<Event<i32, &str>> = Validator::new();

	let scheduler = TestScheduler::new();
	let (signal, input) = Signal::<i32, &str>::pipe();
	let _observation = signal
		.throttle(secs(1), scheduler.clone())
		.observe(Observer::new(|event| V.push(event)));

	input.send_next(1);
	input.send_failed("broken");
	scheduler.run();
	V.expect([Event::Failed("broken")]);
}

#[test]
fn throttle_starts_over_per_execution() {
	let scheduler = TestScheduler::new();
	let throttled =
		SignalProducer::<i32, NoError>::from_values([1, 2, 3]).throttle(secs(1), scheduler.clone());

	assert_eq!(throttled.collect().single(), Ok(vec![3]));
	assert_eq!(throttled.collect().single(), Ok(vec![3]));
}

#[test]
fn observe_on_defers_until_the_scheduler_runs() {
	static V: Validator<Event<i32, NoError>> = Validator::new();

	let scheduler = TestScheduler::new();
	let _execution = SignalProducer::<i32, NoError>::from_values([1, 2])
		.observe_on(scheduler.clone())
		.start(Observer::new(|event| V.push(event)));
	V.expect([]);

	scheduler.advance();
	V.expect([Event::Next(1), Event::Next(2), Event::Completed]);
}

#[test]
fn start_on_an_immediate_scheduler() {
	assert_eq!(
		SignalProducer::<i32, NoError>::value(1)
			.start_on(ImmediateScheduler)
			.single(),
		Ok(1)
	);
}

#[test]
fn timer_ticks_at_each_interval() {
	static V: Validator<Timestamp> = Validator::new();

	let scheduler = TestScheduler::new();
	let execution = SignalProducer::<Timestamp, NoError>::timer(secs(1), scheduler.clone())
		.take(3)
		.start_with_values(|date| V.push(date));

	scheduler.advance_by(Duration::from_millis(2500));
	V.expect([
		Timestamp::from_duration(secs(1)),
		Timestamp::from_duration(secs(2)),
	]);

	scheduler.advance_by(secs(10));
	V.expect([Timestamp::from_duration(secs(3))]);
	assert_eq!(scheduler.pending_count(), 0);
	drop(execution);
}
