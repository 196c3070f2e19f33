//! Transformations of single streams.
//!
//! Each operator is defined on [`Signal`], where it derives a new signal that observes the
//! original for as long as the derived one lives, and lifted onto [`SignalProducer`], where it
//! applies to every execution separately.
//!
//! Per-observation state lives in [`Atomic`]s. Deliveries of one signal are serialized, so the
//! state is only ever contended by disposal, and user closures never run under its lock.

use std::{collections::VecDeque, sync::Arc};

use streambed::{Atomic, Lifetime};

use crate::{Event, NoError, Observer, Payload, Signal, SignalProducer};

impl<T: Payload, E: Payload> Signal<T, E> {
	/// Maps each value with `transform`.
	pub fn map<U: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(T) -> U,
	) -> Signal<U, E> {
		self.derive(move |input, _| {
			Observer::new(move |event: Event<T, E>| input.send(event.map(&transform)))
		})
	}

	/// Maps a failure with `transform`.
	pub fn map_error<F: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(E) -> F,
	) -> Signal<T, F> {
		self.derive(move |input, _| {
			Observer::new(move |event: Event<T, E>| input.send(event.map_error(&transform)))
		})
	}

	/// Forwards only the values that satisfy `predicate`.
	#[must_use]
	pub fn filter(&self, predicate: impl 'static + Send + Sync + Fn(&T) -> bool) -> Self {
		self.derive(move |input, _| {
			Observer::new(move |event| match event {
				Event::Next(value) if !predicate(&value) => (),
				event => input.send(event),
			})
		})
	}

	/// Maps each value with `transform`, forwarding only the [`Some`] results.
	pub fn filter_map<U: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(T) -> Option<U>,
	) -> Signal<U, E> {
		self.derive(move |input, _| {
			Observer::new(move |event: Event<T, E>| match event {
				Event::Next(value) => {
					if let Some(value) = transform(value) {
						input.send_next(value);
					}
				}
				Event::Failed(error) => input.send_failed(error),
				Event::Completed => input.send_completed(),
				Event::Interrupted => input.send_interrupted(),
			})
		})
	}

	/// Combines each value into an accumulator, starting at `initial`, and forwards every
	/// intermediate accumulator.
	pub fn scan<U: Payload>(
		&self,
		initial: U,
		combine: impl 'static + Send + Sync + Fn(U, T) -> U,
	) -> Signal<U, E> {
		self.derive(move |input, _| {
			let accumulator = Atomic::new(initial);
			Observer::new(move |event: Event<T, E>| match event {
				Event::Next(value) => {
					let next = combine(accumulator.get(), value);
					accumulator.set(next.clone());
					input.send_next(next);
				}
				Event::Failed(error) => input.send_failed(error),
				Event::Completed => input.send_completed(),
				Event::Interrupted => input.send_interrupted(),
			})
		})
	}

	/// Like [`.scan(…)`](`Signal::scan`), but forwards only the final accumulator once `self` completes.
	pub fn reduce<U: Payload>(
		&self,
		initial: U,
		combine: impl 'static + Send + Sync + Fn(U, T) -> U,
	) -> Signal<U, E> {
		self.derive(move |input, _| {
			let accumulator = Atomic::new(Some(initial));
			Observer::new(move |event: Event<T, E>| match event {
				Event::Next(value) => {
					if let Some(current) = accumulator.swap(None) {
						accumulator.set(Some(combine(current, value)));
					}
				}
				Event::Failed(error) => input.send_failed(error),
				Event::Completed => {
					if let Some(result) = accumulator.swap(None) {
						input.send_next(result);
					}
					input.send_completed();
				}
				Event::Interrupted => input.send_interrupted(),
			})
		})
	}

	/// Forwards all values as one [`Vec`] once `self` completes.
	pub fn collect(&self) -> Signal<Vec<T>, E> {
		self.reduce(Vec::new(), |mut values, value| {
			values.push(value);
			values
		})
	}

	/// Forwards the first `count` values, then completes.
	///
	/// `take(0)` completes right away.
	#[must_use]
	pub fn take(&self, count: usize) -> Self {
		self.derive(move |input: Observer<T, E>, _| {
			if count == 0 {
				input.send_completed();
				return Observer::ignoring();
			}

			let remaining = Atomic::new(count);
			Observer::new(move |event| match event {
				Event::Next(value) => {
					let last = remaining.modify(|remaining| {
						*remaining = remaining.saturating_sub(1);
						*remaining == 0
					});
					input.send_next(value);
					if last {
						input.send_completed();
					}
				}
				event => input.send(event),
			})
		})
	}

	/// Forwards values while `predicate` holds, then completes.
	#[must_use]
	pub fn take_while(&self, predicate: impl 'static + Send + Sync + Fn(&T) -> bool) -> Self {
		self.derive(move |input, _| {
			Observer::new(move |event| match event {
				Event::Next(value) if !predicate(&value) => input.send_completed(),
				event => input.send(event),
			})
		})
	}

	/// Skips the first `count` values.
	#[must_use]
	pub fn skip(&self, count: usize) -> Self {
		self.derive(move |input, _| {
			let remaining = Atomic::new(count);
			Observer::new(move |event| match event {
				Event::Next(value) => {
					let skip = remaining.modify(|remaining| match remaining {
						0 => false,
						n => {
							*n -= 1;
							true
						}
					});
					if !skip {
						input.send_next(value);
					}
				}
				event => input.send(event),
			})
		})
	}

	/// Skips values while `predicate` holds, then forwards everything.
	#[must_use]
	pub fn skip_while(&self, predicate: impl 'static + Send + Sync + Fn(&T) -> bool) -> Self {
		self.derive(move |input, _| {
			let skipping = Atomic::new(true);
			Observer::new(move |event| match event {
				Event::Next(value) => {
					if skipping.get() && predicate(&value) {
						return;
					}
					skipping.set(false);
					input.send_next(value);
				}
				event => input.send(event),
			})
		})
	}

	/// Skips values that are equivalent to the previous one according to `equivalent`.
	#[must_use]
	pub fn skip_repeats_by(
		&self,
		equivalent: impl 'static + Send + Sync + Fn(&T, &T) -> bool,
	) -> Self {
		self.derive(move |input, _| {
			let previous = Atomic::new(None::<T>);
			Observer::new(move |event| match event {
				Event::Next(value) => {
					let repeated = previous
						.get()
						.is_some_and(|previous| equivalent(&previous, &value));
					if !repeated {
						previous.set(Some(value.clone()));
						input.send_next(value);
					}
				}
				event => input.send(event),
			})
		})
	}

	/// Skips values that are equal to the previous one.
	#[must_use]
	pub fn skip_repeats(&self) -> Self
	where
		T: PartialEq,
	{
		self.skip_repeats_by(T::eq)
	}

	/// Forwards each value paired with the one before it.
	///
	/// Iff `initial` is [`None`], the first value is only remembered.
	pub fn combine_previous(&self, initial: Option<T>) -> Signal<(T, T), E> {
		self.derive(move |input, _| {
			let previous = Atomic::new(initial);
			Observer::new(move |event: Event<T, E>| match event {
				Event::Next(value) => {
					if let Some(previous) = previous.swap(Some(value.clone())) {
						input.send_next((previous, value));
					}
				}
				Event::Failed(error) => input.send_failed(error),
				Event::Completed => input.send_completed(),
				Event::Interrupted => input.send_interrupted(),
			})
		})
	}

	/// Forwards events until `trigger` sends a value or completes, then completes.
	#[must_use]
	pub fn take_until<U: Payload, F: Payload>(&self, trigger: &Signal<U, F>) -> Self {
		self.derive(|input: Observer<T, E>, lifetime| {
			trigger.observe_during(
				lifetime,
				Observer::new({
					let input = input.clone();
					move |event| match event {
						Event::Next(_) | Event::Completed => input.send_completed(),
						Event::Failed(_) | Event::Interrupted => (),
					}
				}),
			);
			input
		})
	}

	/// Forwards events from `self` until `replacement` sends its first event,
	/// then forwards only the events of `replacement`.
	#[must_use]
	pub fn take_until_replacement(&self, replacement: &Self) -> Self {
		self.derive(|input: Observer<T, E>, lifetime| {
			let replaced = Arc::new(Atomic::new(false));
			replacement.observe_during(
				lifetime,
				Observer::new({
					let (input, replaced) = (input.clone(), Arc::clone(&replaced));
					move |event| {
						replaced.set(true);
						input.send(event);
					}
				}),
			);
			Observer::new(move |event| {
				if !replaced.get() {
					input.send(event);
				}
			})
		})
	}

	/// Forwards the latest value of `self` whenever `sampler` sends a value.
	///
	/// Samples taken before `self` sent any value are dropped.
	/// Completes once both `self` and `sampler` have completed.
	/// An interruption of either interrupts the result.
	#[must_use]
	pub fn sample_on(&self, sampler: &Signal<(), NoError>) -> Self {
		self.derive(|input: Observer<T, E>, lifetime| {
			let sample = Arc::new(Sample {
				input,
				latest: Atomic::new(None),
				running: Atomic::new(2),
			});
			sampler.observe_during(
				lifetime,
				Observer::new({
					let sample = Arc::clone(&sample);
					move |event: Event<(), NoError>| match event {
						Event::Next(()) => {
							if let Some(value) = sample.latest.get() {
								sample.input.send_next(value);
							}
						}
						Event::Failed(never) => match never {},
						Event::Completed => sample.complete_one(),
						Event::Interrupted => sample.input.send_interrupted(),
					}
				}),
			);
			Observer::new(move |event| match event {
				Event::Next(value) => sample.latest.set(Some(value)),
				Event::Failed(error) => sample.input.send_failed(error),
				Event::Completed => sample.complete_one(),
				Event::Interrupted => sample.input.send_interrupted(),
			})
		})
	}

	/// Forwards the last `count` values once `self` completes, then completes.
	///
	/// Values are buffered until then. A failure discards them.
	#[must_use]
	pub fn take_last(&self, count: usize) -> Self {
		self.derive(move |input: Observer<T, E>, _| {
			let buffer = Atomic::new(VecDeque::new());
			Observer::new(move |event| match event {
				Event::Next(value) => buffer.modify(|buffer| {
					if count == 0 {
						return;
					}
					if buffer.len() == count {
						buffer.pop_front();
					}
					buffer.push_back(value);
				}),
				Event::Completed => {
					for value in buffer.swap(VecDeque::new()) {
						input.send_next(value);
					}
					input.send_completed();
				}
				event => input.send(event),
			})
		})
	}

	/// Maps each value with `transform`, failing with the error of the first [`Err`] result.
	pub fn try_map<U: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(T) -> Result<U, E>,
	) -> Signal<U, E> {
		self.derive(move |input, _| {
			Observer::new(move |event: Event<T, E>| match event {
				Event::Next(value) => match transform(value) {
					Ok(value) => input.send_next(value),
					Err(error) => input.send_failed(error),
				},
				Event::Failed(error) => input.send_failed(error),
				Event::Completed => input.send_completed(),
				Event::Interrupted => input.send_interrupted(),
			})
		})
	}

	/// Calls `action` with each event before forwarding it.
	#[must_use]
	pub fn on_event(&self, action: impl 'static + Send + Sync + Fn(&Event<T, E>)) -> Self {
		self.derive(move |input, _| {
			Observer::new(move |event| {
				action(&event);
				input.send(event);
			})
		})
	}

	/// Forwards every event as a value. After a terminating event, completes.
	pub fn materialize(&self) -> Signal<Event<T, E>, NoError> {
		self.derive(|input, _| {
			Observer::new(move |event: Event<T, E>| {
				let terminating = event.is_terminating();
				input.send_next(event);
				if terminating {
					input.send_completed();
				}
			})
		})
	}
}

impl<T: Payload, E: Payload> Signal<Event<T, E>, NoError> {
	/// Translates values that are events back into events. The inverse of [`.materialize()`](`Signal::materialize`).
	pub fn dematerialize(&self) -> Signal<T, E> {
		self.derive(|input, _| {
			Observer::new(move |event: Event<Event<T, E>, NoError>| match event {
				Event::Next(event) => input.send(event),
				Event::Failed(never) => match never {},
				Event::Completed => input.send_completed(),
				Event::Interrupted => input.send_interrupted(),
			})
		})
	}
}

impl<T: Payload, E: Payload> SignalProducer<T, E> {
	/// Lifted [`Signal::map`].
	pub fn map<U: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(T) -> U,
	) -> SignalProducer<U, E> {
		let transform = Arc::new(transform);
		self.lift(move |signal| {
			let transform = Arc::clone(&transform);
			signal.map(move |value| transform(value))
		})
	}

	/// Lifted [`Signal::map_error`].
	pub fn map_error<F: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(E) -> F,
	) -> SignalProducer<T, F> {
		let transform = Arc::new(transform);
		self.lift(move |signal| {
			let transform = Arc::clone(&transform);
			signal.map_error(move |error| transform(error))
		})
	}

	/// Lifted [`Signal::filter`].
	#[must_use]
	pub fn filter(&self, predicate: impl 'static + Send + Sync + Fn(&T) -> bool) -> Self {
		let predicate = Arc::new(predicate);
		self.lift(move |signal| {
			let predicate = Arc::clone(&predicate);
			signal.filter(move |value| predicate(value))
		})
	}

	/// Lifted [`Signal::filter_map`].
	pub fn filter_map<U: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(T) -> Option<U>,
	) -> SignalProducer<U, E> {
		let transform = Arc::new(transform);
		self.lift(move |signal| {
			let transform = Arc::clone(&transform);
			signal.filter_map(move |value| transform(value))
		})
	}

	/// Lifted [`Signal::scan`]. Every execution starts over from `initial`.
	pub fn scan<U: Payload>(
		&self,
		initial: U,
		combine: impl 'static + Send + Sync + Fn(U, T) -> U,
	) -> SignalProducer<U, E> {
		let combine = Arc::new(combine);
		self.lift(move |signal| {
			let combine = Arc::clone(&combine);
			signal.scan(initial.clone(), move |accumulator, value| combine(accumulator, value))
		})
	}

	/// Lifted [`Signal::reduce`]. Every execution starts over from `initial`.
	pub fn reduce<U: Payload>(
		&self,
		initial: U,
		combine: impl 'static + Send + Sync + Fn(U, T) -> U,
	) -> SignalProducer<U, E> {
		let combine = Arc::new(combine);
		self.lift(move |signal| {
			let combine = Arc::clone(&combine);
			signal.reduce(initial.clone(), move |accumulator, value| combine(accumulator, value))
		})
	}

	/// Lifted [`Signal::collect`].
	pub fn collect(&self) -> SignalProducer<Vec<T>, E> {
		self.lift(|signal| signal.collect())
	}

	/// Lifted [`Signal::take`]. The execution is interrupted once enough values arrived.
	#[must_use]
	pub fn take(&self, count: usize) -> Self {
		self.lift(move |signal| signal.take(count))
	}

	/// Lifted [`Signal::take_while`].
	#[must_use]
	pub fn take_while(&self, predicate: impl 'static + Send + Sync + Fn(&T) -> bool) -> Self {
		let predicate = Arc::new(predicate);
		self.lift(move |signal| {
			let predicate = Arc::clone(&predicate);
			signal.take_while(move |value| predicate(value))
		})
	}

	/// Lifted [`Signal::skip`].
	#[must_use]
	pub fn skip(&self, count: usize) -> Self {
		self.lift(move |signal| signal.skip(count))
	}

	/// Lifted [`Signal::skip_while`].
	#[must_use]
	pub fn skip_while(&self, predicate: impl 'static + Send + Sync + Fn(&T) -> bool) -> Self {
		let predicate = Arc::new(predicate);
		self.lift(move |signal| {
			let predicate = Arc::clone(&predicate);
			signal.skip_while(move |value| predicate(value))
		})
	}

	/// Lifted [`Signal::skip_repeats_by`].
	#[must_use]
	pub fn skip_repeats_by(
		&self,
		equivalent: impl 'static + Send + Sync + Fn(&T, &T) -> bool,
	) -> Self {
		let equivalent = Arc::new(equivalent);
		self.lift(move |signal| {
			let equivalent = Arc::clone(&equivalent);
			signal.skip_repeats_by(move |a, b| equivalent(a, b))
		})
	}

	/// Lifted [`Signal::skip_repeats`].
	#[must_use]
	pub fn skip_repeats(&self) -> Self
	where
		T: PartialEq,
	{
		self.lift(|signal| signal.skip_repeats())
	}

	/// Lifted [`Signal::combine_previous`].
	pub fn combine_previous(&self, initial: Option<T>) -> SignalProducer<(T, T), E> {
		self.lift(move |signal| signal.combine_previous(initial.clone()))
	}

	/// Like [`Signal::take_until`], with `trigger` started once per execution.
	#[must_use]
	pub fn take_until<U: Payload, F: Payload>(&self, trigger: &SignalProducer<U, F>) -> Self {
		let source = self.clone();
		let trigger = trigger.clone();
		Self::new(move |observer, lifetime| {
			trigger.start_with_signal(|trigger, interrupter| {
				let _ = lifetime.add(interrupter);
				source.start_with_signal(|signal, interrupter| {
					signal.take_until(&trigger).observe_during(lifetime, observer);
					let _ = lifetime.add(interrupter);
				});
			});
		})
	}

	/// Like [`Signal::sample_on`], with `sampler` started once per execution.
	#[must_use]
	pub fn sample_on(&self, sampler: &SignalProducer<(), NoError>) -> Self {
		let source = self.clone();
		let sampler = sampler.clone();
		Self::new(move |observer, lifetime| {
			sampler.start_with_signal(|sampler, interrupter| {
				let _ = lifetime.add(interrupter);
				source.start_with_signal(|signal, interrupter| {
					signal.sample_on(&sampler).observe_during(lifetime, observer);
					let _ = lifetime.add(interrupter);
				});
			});
		})
	}

	/// Lifted [`Signal::take_last`].
	#[must_use]
	pub fn take_last(&self, count: usize) -> Self {
		self.lift(move |signal| signal.take_last(count))
	}

	/// Lifted [`Signal::try_map`].
	pub fn try_map<U: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(T) -> Result<U, E>,
	) -> SignalProducer<U, E> {
		let transform = Arc::new(transform);
		self.lift(move |signal| {
			let transform = Arc::clone(&transform);
			signal.try_map(move |value| transform(value))
		})
	}

	/// Like [`Signal::take_until_replacement`], with `replacement` started once per execution.
	#[must_use]
	pub fn take_until_replacement(&self, replacement: &Self) -> Self {
		self.lift2(replacement, |signal, replacement| {
			signal.take_until_replacement(&replacement)
		})
	}

	/// Lifted [`Signal::take_during`].
	#[must_use]
	pub fn take_during(&self, lifetime: &Lifetime) -> Self {
		let lifetime = lifetime.clone();
		self.lift(move |signal| signal.take_during(&lifetime))
	}

	/// Lifted [`Signal::on_event`].
	#[must_use]
	pub fn on_event(&self, action: impl 'static + Send + Sync + Fn(&Event<T, E>)) -> Self {
		let action = Arc::new(action);
		self.lift(move |signal| {
			let action = Arc::clone(&action);
			signal.on_event(move |event| action(event))
		})
	}

	/// Lifted [`Signal::materialize`].
	pub fn materialize(&self) -> SignalProducer<Event<T, E>, NoError> {
		self.lift(|signal| signal.materialize())
	}
}

impl<T: Payload, E: Payload> SignalProducer<Event<T, E>, NoError> {
	/// Lifted [`Signal::dematerialize`].
	pub fn dematerialize(&self) -> SignalProducer<T, E> {
		self.lift(|signal| signal.dematerialize())
	}
}

struct Sample<T: Payload, E: Payload> {
	input: Observer<T, E>,
	latest: Atomic<Option<T>>,
	/// Of `self` and the sampler.
	running: Atomic<u8>,
}

impl<T: Payload, E: Payload> Sample<T, E> {
	fn complete_one(&self) {
		let done = self.running.modify(|running| {
			*running -= 1;
			*running == 0
		});
		if done {
			self.input.send_completed();
		}
	}
}
