use tributary::{NoError, Signal, SignalProducer};
use tributary_extra::{delta, delta_signal};

#[path = "../../streambed/tests/_validator.rs"]
mod _validator;
use _validator::Validator;

#[test]
fn delta_test() {
	static V: Validator<i32> = Validator::new();

	let (signal, input) = Signal::<i32, NoError>::pipe();
	let _observation = delta_signal::<i32, i32, NoError>(signal).observe_values(|delta| V.push(delta));
	V.expect([]);

	for n in [1, 2, 3, 3, 4, 5, 5, 5, 6, 6, 6, 7, 7, 7, 7, 8, 9, 9, 0] {
		input.send_next(n);
	}
	V.expect([0, 1, 1, 0, 1, 1, 0, 0, 1, 0, 0, 1, 0, 0, 0, 1, 1, 0, -9]);
}

#[test]
fn each_execution_starts_from_zero() {
	let deltas = delta::<i64, i64, NoError>(SignalProducer::from_values([10, 15, 5]));

	assert_eq!(deltas.collect().single(), Ok(vec![0, 5, -10]));
	assert_eq!(deltas.collect().single(), Ok(vec![0, 5, -10]));
}
