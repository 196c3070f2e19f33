//! Operators that combine several streams into one.

use std::{collections::VecDeque, sync::Arc};

use streambed::{AnyDisposable, Atomic};

use crate::{Event, Observer, Payload, Signal, SignalProducer};

struct CombineState<T> {
	latest: Vec<Option<T>>,
	completed: Vec<bool>,
}

struct ZipState<T> {
	queues: Vec<VecDeque<T>>,
	completed: Vec<bool>,
}

impl<T> ZipState<T> {
	/// Iff a completed source has nothing left to pair, no further tuple can be formed.
	fn is_exhausted(&self) -> bool {
		self.queues
			.iter()
			.zip(&self.completed)
			.any(|(queue, &completed)| completed && queue.is_empty())
	}
}

impl<T: Payload, E: Payload> Signal<T, E> {
	/// Combines the latest values of `signals`.
	///
	/// The first combined value is sent once every source has sent at least one value.
	/// After that, each value of any source sends the updated combination.
	///
	/// # Logic
	///
	/// The result completes once all sources completed, or right away when a source completes
	/// without ever having sent a value. Failure and interruption of any source are forwarded.
	///
	/// Combining no signals at all completes immediately.
	pub fn combine_latest_all(signals: impl IntoIterator<Item = Self>) -> Signal<Vec<T>, E> {
		let signals: Vec<Self> = signals.into_iter().collect();
		Signal::new(|input, lifetime| {
			if signals.is_empty() {
				input.send_completed();
				return;
			}

			let state = Arc::new(Atomic::new(CombineState {
				latest: vec![None; signals.len()],
				completed: vec![false; signals.len()],
			}));

			for (index, signal) in signals.iter().enumerate() {
				let state = Arc::clone(&state);
				let input = input.clone();
				signal.observe_during(
					lifetime,
					Observer::new(move |event| match event {
						Event::Next(value) => {
							let combined = state.modify(|state| {
								state.latest[index] = Some(value);
								state.latest.iter().cloned().collect::<Option<Vec<T>>>()
							});
							if let Some(combined) = combined {
								input.send_next(combined);
							}
						}
						Event::Failed(error) => input.send_failed(error),
						Event::Completed => {
							let done = state.modify(|state| {
								state.completed[index] = true;
								state.latest[index].is_none() || state.completed.iter().all(|&c| c)
							});
							if done {
								input.send_completed();
							}
						}
						Event::Interrupted => input.send_interrupted(),
					}),
				);
			}
		})
	}

	/// Pairs up the values of `signals` by index: the *n*th combined value consists of the
	/// *n*th value of each source.
	///
	/// # Logic
	///
	/// Values are queued per source until every other source has sent its counterpart.
	/// The result completes as soon as a completed source has no queued values left.
	/// Failure and interruption of any source are forwarded.
	///
	/// Zipping no signals at all completes immediately.
	pub fn zip_all(signals: impl IntoIterator<Item = Self>) -> Signal<Vec<T>, E> {
		let signals: Vec<Self> = signals.into_iter().collect();
		Signal::new(|input, lifetime| {
			if signals.is_empty() {
				input.send_completed();
				return;
			}

			let state = Arc::new(Atomic::new(ZipState {
				queues: vec![VecDeque::new(); signals.len()],
				completed: vec![false; signals.len()],
			}));

			for (index, signal) in signals.iter().enumerate() {
				let state = Arc::clone(&state);
				let input = input.clone();
				signal.observe_during(
					lifetime,
					Observer::new(move |event| match event {
						Event::Next(value) => {
							let (zipped, exhausted) = state.modify(|state| {
								state.queues[index].push_back(value);
								let ready = state.queues.iter().all(|queue| !queue.is_empty());
								let zipped = ready.then(|| {
									state
										.queues
										.iter_mut()
										.filter_map(VecDeque::pop_front)
										.collect::<Vec<T>>()
								});
								(zipped, state.is_exhausted())
							});
							if let Some(zipped) = zipped {
								input.send_next(zipped);
							}
							if exhausted {
								input.send_completed();
							}
						}
						Event::Failed(error) => input.send_failed(error),
						Event::Completed => {
							let exhausted = state.modify(|state| {
								state.completed[index] = true;
								state.is_exhausted()
							});
							if exhausted {
								input.send_completed();
							}
						}
						Event::Interrupted => input.send_interrupted(),
					}),
				);
			}
		})
	}

	/// Combines the latest values of `self` and `other` into pairs.
	/// See [`Signal::combine_latest_all`].
	pub fn combine_latest<U: Payload>(&self, other: &Signal<U, E>) -> Signal<(T, U), E> {
		Signal::combine_latest_all(Self::sides(self, other)).filter_map(Self::unsides)
	}

	/// Pairs up the values of `self` and `other` by index. See [`Signal::zip_all`].
	pub fn zip<U: Payload>(&self, other: &Signal<U, E>) -> Signal<(T, U), E> {
		Signal::zip_all(Self::sides(self, other)).filter_map(Self::unsides)
	}

	/// Lifts both signals into one value type, each side filling its own slot.
	fn sides<U: Payload>(
		left: &Self,
		right: &Signal<U, E>,
	) -> [Signal<(Option<T>, Option<U>), E>; 2] {
		[
			left.map(|value| (Some(value), None)),
			right.map(|value| (None, Some(value))),
		]
	}

	fn unsides<U: Payload>(combined: Vec<(Option<T>, Option<U>)>) -> Option<(T, U)> {
		let mut combined = combined.into_iter();
		let (left, _) = combined.next()?;
		let (_, right) = combined.next()?;
		Some((left?, right?))
	}
}

impl<T: Payload, E: Payload> SignalProducer<T, E> {
	/// Starts each of `producers` per start and combines their latest values.
	/// See [`Signal::combine_latest_all`].
	pub fn combine_latest_all(
		producers: impl IntoIterator<Item = Self>,
	) -> SignalProducer<Vec<T>, E> {
		Self::start_all_with(producers, |signals| Signal::combine_latest_all(signals))
	}

	/// Starts each of `producers` per start and pairs up their values by index.
	/// See [`Signal::zip_all`].
	pub fn zip_all(producers: impl IntoIterator<Item = Self>) -> SignalProducer<Vec<T>, E> {
		Self::start_all_with(producers, |signals| Signal::zip_all(signals))
	}

	/// Lifted [`Signal::combine_latest`].
	pub fn combine_latest<U: Payload>(
		&self,
		other: &SignalProducer<U, E>,
	) -> SignalProducer<(T, U), E> {
		self.lift2(other, |left, right| left.combine_latest(&right))
	}

	/// Lifted [`Signal::zip`].
	pub fn zip<U: Payload>(&self, other: &SignalProducer<U, E>) -> SignalProducer<(T, U), E> {
		self.lift2(other, |left, right| left.zip(&right))
	}

	fn start_all_with<U: Payload>(
		producers: impl IntoIterator<Item = Self>,
		combine: impl 'static + Send + Sync + Fn(Vec<Signal<T, E>>) -> Signal<U, E>,
	) -> SignalProducer<U, E> {
		let producers: Arc<[Self]> = producers.into_iter().collect();
		SignalProducer::new(move |observer, lifetime| {
			Self::start_all(
				&producers,
				Vec::with_capacity(producers.len()),
				Vec::with_capacity(producers.len()),
				|signals, interrupters| {
					combine(signals).observe_during(lifetime, observer);
					for interrupter in interrupters {
						let _ = lifetime.add(interrupter);
					}
				},
			);
		})
	}

	/// Creates a signal from each of `producers` in turn, hands all of them to `setup`,
	/// then runs the start handlers in reverse order.
	fn start_all<R>(
		producers: &[Self],
		mut signals: Vec<Signal<T, E>>,
		mut interrupters: Vec<AnyDisposable>,
		setup: impl FnOnce(Vec<Signal<T, E>>, Vec<AnyDisposable>) -> R,
	) -> R {
		match producers.split_first() {
			None => setup(signals, interrupters),
			Some((first, rest)) => first.start_with_signal(move |signal, interrupter| {
				signals.push(signal);
				interrupters.push(interrupter);
				Self::start_all(rest, signals, interrupters, setup)
			}),
		}
	}
}
