#![cfg(feature = "test_scheduler")]

use std::{sync::Arc, time::Duration};

use streambed::{
	scheduler::{DateScheduler, Scheduler, TestScheduler, Timestamp},
	Disposable,
};

use _validator::Validator;

fn at(secs: u64) -> Timestamp {
	Timestamp::from_duration(Duration::from_secs(secs))
}

#[test]
fn advances_in_date_order() {
	static V: Validator<&str> = Validator::new();

	let scheduler = TestScheduler::new();
	let _late = scheduler.schedule_after(at(15), Box::new(|| V.push("15")));
	let _early = scheduler.schedule_after(at(5), Box::new(|| V.push("5")));
	V.expect([]);

	scheduler.advance_by(Duration::from_secs(10));
	V.expect(["5"]);
	assert_eq!(scheduler.current_date(), at(10));

	scheduler.advance_by(Duration::from_secs(10));
	V.expect(["15"]);
	assert_eq!(scheduler.current_date(), at(20));
}

#[test]
fn run_drains_regardless_of_registration_order() {
	static V: Validator<u64> = Validator::new();

	let scheduler = TestScheduler::new();
	for secs in [30, 10, 20, 10] {
		let _ = scheduler.schedule_after(at(secs), Box::new(move || V.push(secs)));
	}

	scheduler.run();
	V.expect([10, 10, 20, 30]);
	assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn actions_see_their_scheduled_date() {
	static V: Validator<Timestamp> = Validator::new();

	let scheduler = TestScheduler::new();
	let _ = scheduler.schedule_after(at(3), {
		let scheduler = scheduler.clone();
		Box::new(move || V.push(scheduler.current_date()))
	});

	scheduler.advance_to(at(7));
	V.expect([at(3)]);
	assert_eq!(scheduler.current_date(), at(7));
}

#[test]
fn immediate_actions_wait_for_advance() {
	static V: Validator<&str> = Validator::new();

	let scheduler = TestScheduler::new();
	let _ = scheduler.schedule(Box::new(|| V.push("a")));
	let _ = scheduler.schedule(Box::new(|| V.push("b")));
	V.expect([]);

	scheduler.advance();
	V.expect(["a", "b"]);
}

#[test]
fn nested_scheduling_runs_within_the_same_advance() {
	static V: Validator<&str> = Validator::new();

	let scheduler = TestScheduler::new();
	let _ = scheduler.schedule_after(at(1), {
		let scheduler = scheduler.clone();
		Box::new(move || {
			V.push("outer");
			let _ = scheduler.schedule_after_delay(
				Duration::from_secs(1),
				Box::new(|| V.push("inner")),
			);
		})
	});

	scheduler.advance_by(Duration::from_secs(5));
	V.expect(["outer", "inner"]);
}

#[test]
fn disposal_cancels() {
	static V: Validator<&str> = Validator::new();

	let scheduler = TestScheduler::new();
	let cancelled = scheduler
		.schedule_after(at(1), Box::new(|| V.push("cancelled")))
		.expect("always cancellable");
	let _kept = scheduler.schedule_after(at(2), Box::new(|| V.push("kept")));

	cancelled.dispose();
	assert_eq!(scheduler.pending_count(), 1);
	scheduler.run();
	V.expect(["kept"]);
}

#[test]
fn repeating() {
	static V: Validator<Timestamp> = Validator::new();

	let scheduler = TestScheduler::new();
	let repeating = scheduler
		.schedule_repeating(
			at(1),
			Duration::from_secs(2),
			Duration::ZERO,
			Arc::new({
				let scheduler = scheduler.clone();
				move || V.push(scheduler.current_date())
			}),
		)
		.expect("always cancellable");

	scheduler.advance_to(at(6));
	V.expect([at(1), at(3), at(5)]);

	repeating.dispose();
	scheduler.advance_to(at(20));
	V.expect([]);
	assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn rewind_keeps_pending_dates() {
	static V: Validator<&str> = Validator::new();

	let scheduler = TestScheduler::with_start_date(at(10));
	let _ = scheduler.schedule_after_delay(Duration::from_secs(5), Box::new(|| V.push("15")));

	scheduler.rewind_by(Duration::from_secs(10));
	assert_eq!(scheduler.current_date(), at(0));

	scheduler.advance_by(Duration::from_secs(10));
	V.expect([]);
	scheduler.advance_by(Duration::from_secs(5));
	V.expect(["15"]);
}

#[test]
#[should_panic = "into the past"]
fn advancing_backwards_panics() {
	let scheduler = TestScheduler::with_start_date(at(10));
	scheduler.advance_to(at(5));
}
