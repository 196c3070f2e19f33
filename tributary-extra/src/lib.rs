#![warn(clippy::pedantic)]
#![warn(missing_docs)]
//! Combinators derived from [`tributary`]'s operators.
//!
//! Each takes its source by value so that it composes with [`pipe`]:
//!
//! ```
//! use tributary::{NoError, SignalProducer};
//! use tributary_extra::{dedupe, pipe, sparse_tally};
//!
//! let tallied = pipe((
//! 	SignalProducer::<i32, NoError>::from_values([1, 1, 2, 2, 3]),
//! 	dedupe,
//! 	sparse_tally::<_, i32, _>,
//! ));
//! assert_eq!(tallied.collect().single(), Ok(vec![1, 3, 6]));
//! ```

use std::ops::{AddAssign, Sub};

use num_traits::Zero;
use tributary::{Payload, Signal, SignalProducer};

/// Skips values equal to the previous one.
pub fn dedupe<T: Payload + PartialEq, E: Payload>(
	source: SignalProducer<T, E>,
) -> SignalProducer<T, E> {
	source.skip_repeats()
}

/// [`dedupe`] for a running [`Signal`].
pub fn dedupe_signal<T: Payload + PartialEq, E: Payload>(source: Signal<T, E>) -> Signal<T, E> {
	source.skip_repeats()
}

/// Forwards the difference of each value to the one before it.
///
/// The first value of each execution results in [`Zero::zero()`].
pub fn delta<V: Payload, T: Payload + Zero, E: Payload>(
	source: SignalProducer<V, E>,
) -> SignalProducer<T, E>
where
	for<'b> &'b V: Sub<Output = T>,
{
	source
		.scan((None::<V>, T::zero()), |(previous, _), next| {
			let delta = previous.map_or_else(T::zero, |previous| &next - &previous);
			(Some(next), delta)
		})
		.map(|(_, delta)| delta)
}

/// [`delta`] for a running [`Signal`].
pub fn delta_signal<V: Payload, T: Payload + Zero, E: Payload>(
	source: Signal<V, E>,
) -> Signal<T, E>
where
	for<'b> &'b V: Sub<Output = T>,
{
	source
		.scan((None::<V>, T::zero()), |(previous, _), next| {
			let delta = previous.map_or_else(T::zero, |previous| &next - &previous);
			(Some(next), delta)
		})
		.map(|(_, delta)| delta)
}

/// Forwards the running sum after each value.
pub fn sparse_tally<V: Payload, T: Payload + Zero + AddAssign<V>, E: Payload>(
	source: SignalProducer<V, E>,
) -> SignalProducer<T, E> {
	source.scan(T::zero(), |mut tally, value| {
		tally += value;
		tally
	})
}

/// Like [`sparse_tally`], but starts each execution by sending [`Zero::zero()`].
pub fn eager_tally<V: Payload, T: Payload + Zero + AddAssign<V>, E: Payload>(
	source: SignalProducer<V, E>,
) -> SignalProducer<T, E> {
	SignalProducer::value(T::zero()).concat(&sparse_tally(source))
}

/// Forwards the contents of [`Some`] values and skips [`None`]s.
pub fn flatten_some<T: Payload, E: Payload>(
	source: SignalProducer<Option<T>, E>,
) -> SignalProducer<T, E> {
	source.filter_map(|value| value)
}

/// Feeds the first element of `pipe` through each of the following functions, in order.
///
/// See the [crate-level documentation](`crate`) for an example.
pub fn pipe<P: IntoPipe>(pipe: P) -> P::Pipe {
	pipe.into_pipe()
}

/// Tuples of a value followed by up to five functions, each accepting the previous one's output.
pub trait IntoPipe: Sized {
	/// The output of the last function.
	type Pipe;

	/// Runs the pipeline.
	fn into_pipe(self) -> Self::Pipe;
}

impl<T0> IntoPipe for (T0,) {
	type Pipe = T0;

	fn into_pipe(self) -> Self::Pipe {
		self.0
	}
}

impl<T0, T1, F1: FnOnce(T0) -> T1> IntoPipe for (T0, F1) {
	type Pipe = T1;

	fn into_pipe(self) -> Self::Pipe {
		(self.1)(self.0)
	}
}

impl<T0, T1, T2, F1, F2> IntoPipe for (T0, F1, F2)
where
	F1: FnOnce(T0) -> T1,
	F2: FnOnce(T1) -> T2,
{
	type Pipe = T2;

	fn into_pipe(self) -> Self::Pipe {
		let (value, f1, f2) = self;
		f2(f1(value))
	}
}

impl<T0, T1, T2, T3, F1, F2, F3> IntoPipe for (T0, F1, F2, F3)
where
	F1: FnOnce(T0) -> T1,
	F2: FnOnce(T1) -> T2,
	F3: FnOnce(T2) -> T3,
{
	type Pipe = T3;

	fn into_pipe(self) -> Self::Pipe {
		let (value, f1, f2, f3) = self;
		f3(f2(f1(value)))
	}
}

impl<T0, T1, T2, T3, T4, F1, F2, F3, F4> IntoPipe for (T0, F1, F2, F3, F4)
where
	F1: FnOnce(T0) -> T1,
	F2: FnOnce(T1) -> T2,
	F3: FnOnce(T2) -> T3,
	F4: FnOnce(T3) -> T4,
{
	type Pipe = T4;

	fn into_pipe(self) -> Self::Pipe {
		let (value, f1, f2, f3, f4) = self;
		f4(f3(f2(f1(value))))
	}
}

impl<T0, T1, T2, T3, T4, T5, F1, F2, F3, F4, F5> IntoPipe for (T0, F1, F2, F3, F4, F5)
where
	F1: FnOnce(T0) -> T1,
	F2: FnOnce(T1) -> T2,
	F3: FnOnce(T2) -> T3,
	F4: FnOnce(T3) -> T4,
	F5: FnOnce(T4) -> T5,
{
	type Pipe = T5;

	fn into_pipe(self) -> Self::Pipe {
		let (value, f1, f2, f3, f4, f5) = self;
		f5(f4(f3(f2(f1(value)))))
	}
}
