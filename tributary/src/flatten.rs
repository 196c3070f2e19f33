//! Flattening streams of producers into a single stream.

use std::{collections::VecDeque, sync::Arc};

use streambed::{AnyDisposable, Atomic, Lifetime, SerialDisposable};

use crate::{Event, Observer, Payload, Signal, SignalProducer};

/// Describes how a stream of inner producers is flattened into a stream of values.
///
/// In every strategy, a failure of the outer stream or any inner execution is forwarded right
/// away and interrupts every other active execution. An inner interruption counts as that
/// inner execution completing. An outer interruption interrupts the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlattenStrategy {
	/// Starts each inner producer as soon as it arrives, forwarding all values interleaved.
	///
	/// Completes once the outer stream and every inner execution have completed.
	Merge,

	/// Starts inner producers one at a time, in arrival order. Later ones wait in a queue.
	///
	/// Completes once the outer stream and the last inner execution have completed.
	Concat,

	/// Starts each inner producer as soon as it arrives, interrupting the previous inner execution.
	///
	/// Completes once the outer stream and the current inner execution have completed.
	Latest,
}

impl<T: Payload, E: Payload> Signal<SignalProducer<T, E>, E> {
	/// Flattens the inner producers according to `strategy`.
	pub fn flatten(&self, strategy: FlattenStrategy) -> Signal<T, E> {
		self.derive(|input, lifetime| match strategy {
			FlattenStrategy::Merge => Merge::observer(input, lifetime),
			FlattenStrategy::Concat => Concat::observer(input, lifetime),
			FlattenStrategy::Latest => Latest::observer(input, lifetime),
		})
	}
}

impl<T: Payload, E: Payload> SignalProducer<SignalProducer<T, E>, E> {
	/// Lifted [`Signal::flatten`].
	pub fn flatten(&self, strategy: FlattenStrategy) -> SignalProducer<T, E> {
		self.lift(move |signal| signal.flatten(strategy))
	}
}

impl<T: Payload, E: Payload> Signal<T, E> {
	/// Maps each value to a producer, then flattens those according to `strategy`.
	pub fn flat_map<U: Payload>(
		&self,
		strategy: FlattenStrategy,
		transform: impl 'static + Send + Sync + Fn(T) -> SignalProducer<U, E>,
	) -> Signal<U, E> {
		self.map(transform).flatten(strategy)
	}
}

impl<T: Payload, E: Payload> SignalProducer<T, E> {
	/// Lifted [`Signal::flat_map`].
	pub fn flat_map<U: Payload>(
		&self,
		strategy: FlattenStrategy,
		transform: impl 'static + Send + Sync + Fn(T) -> SignalProducer<U, E>,
	) -> SignalProducer<U, E> {
		self.map(transform).flatten(strategy)
	}
}

struct Merge<T: Payload, E: Payload> {
	input: Observer<T, E>,
	lifetime: Lifetime,
	/// Active inner executions, plus one while the outer stream is active.
	active: Atomic<usize>,
}

impl<T: Payload, E: Payload> Merge<T, E> {
	fn observer(input: Observer<T, E>, lifetime: &Lifetime) -> Observer<SignalProducer<T, E>, E> {
		let this = Arc::new(Self {
			input,
			lifetime: lifetime.clone(),
			active: Atomic::new(1),
		});

		Observer::new(move |event: Event<SignalProducer<T, E>, E>| match event {
			Event::Next(producer) => {
				this.active.modify(|active| *active += 1);
				producer.start_during(&this.lifetime, this.inner_observer());
			}
			Event::Failed(error) => this.input.send_failed(error),
			Event::Completed => this.release(),
			Event::Interrupted => this.input.send_interrupted(),
		})
	}

	fn inner_observer(self: &Arc<Self>) -> Observer<T, E> {
		let this = Arc::clone(self);
		Observer::new(move |event| match event {
			Event::Next(value) => this.input.send_next(value),
			Event::Failed(error) => this.input.send_failed(error),
			Event::Completed | Event::Interrupted => this.release(),
		})
	}

	fn release(&self) {
		let done = self.active.modify(|active| {
			*active -= 1;
			*active == 0
		});
		if done {
			self.input.send_completed();
		}
	}
}

struct Concat<T: Payload, E: Payload> {
	input: Observer<T, E>,
	lifetime: Lifetime,
	state: Atomic<ConcatState<T, E>>,
}

struct ConcatState<T: Payload, E: Payload> {
	queue: VecDeque<SignalProducer<T, E>>,
	inner_active: bool,
	outer_completed: bool,
}

impl<T: Payload, E: Payload> Concat<T, E> {
	fn observer(input: Observer<T, E>, lifetime: &Lifetime) -> Observer<SignalProducer<T, E>, E> {
		let this = Arc::new(Self {
			input,
			lifetime: lifetime.clone(),
			state: Atomic::new(ConcatState {
				queue: VecDeque::new(),
				inner_active: false,
				outer_completed: false,
			}),
		});

		Observer::new(move |event: Event<SignalProducer<T, E>, E>| match event {
			Event::Next(producer) => {
				let start_now = this.state.modify(|state| {
					if state.inner_active {
						state.queue.push_back(producer);
						None
					} else {
						state.inner_active = true;
						Some(producer)
					}
				});
				if let Some(producer) = start_now {
					this.start(&producer);
				}
			}
			Event::Failed(error) => this.input.send_failed(error),
			Event::Completed => {
				let done = this.state.modify(|state| {
					state.outer_completed = true;
					!state.inner_active
				});
				if done {
					this.input.send_completed();
				}
			}
			Event::Interrupted => this.input.send_interrupted(),
		})
	}

	fn start(self: &Arc<Self>, producer: &SignalProducer<T, E>) {
		let this = Arc::clone(self);
		producer.start_during(
			&self.lifetime,
			Observer::new(move |event| match event {
				Event::Next(value) => this.input.send_next(value),
				Event::Failed(error) => this.input.send_failed(error),
				Event::Completed | Event::Interrupted => this.advance(),
			}),
		);
	}

	/// Starts the next queued producer, or completes iff there's nothing left to wait for.
	fn advance(self: &Arc<Self>) {
		enum Next<T: Payload, E: Payload> {
			Start(SignalProducer<T, E>),
			Complete,
			Idle,
		}

		let next = self.state.modify(|state| match state.queue.pop_front() {
			Some(producer) => Next::Start(producer),
			None => {
				state.inner_active = false;
				if state.outer_completed {
					Next::Complete
				} else {
					Next::Idle
				}
			}
		});

		match next {
			Next::Start(producer) => self.start(&producer),
			Next::Complete => self.input.send_completed(),
			Next::Idle => (),
		}
	}
}

struct Latest<T: Payload, E: Payload> {
	input: Observer<T, E>,
	/// Ends the current inner execution's lifetime when replaced or disposed.
	current: SerialDisposable,
	state: Atomic<LatestState>,
}

struct LatestState {
	generation: u64,
	inner_active: bool,
	outer_completed: bool,
}

impl<T: Payload, E: Payload> Latest<T, E> {
	fn observer(input: Observer<T, E>, lifetime: &Lifetime) -> Observer<SignalProducer<T, E>, E> {
		let current = SerialDisposable::default();
		let _ = lifetime.add(current.clone());
		let this = Arc::new(Self {
			input,
			current,
			state: Atomic::new(LatestState {
				generation: 0,
				inner_active: false,
				outer_completed: false,
			}),
		});

		Observer::new(move |event: Event<SignalProducer<T, E>, E>| match event {
			Event::Next(producer) => this.switch_to(&producer),
			Event::Failed(error) => this.input.send_failed(error),
			Event::Completed => {
				let done = this.state.modify(|state| {
					state.outer_completed = true;
					!state.inner_active
				});
				if done {
					this.input.send_completed();
				}
			}
			Event::Interrupted => this.input.send_interrupted(),
		})
	}

	fn switch_to(self: &Arc<Self>, producer: &SignalProducer<T, E>) {
		let generation = self.state.modify(|state| {
			state.generation += 1;
			state.inner_active = true;
			state.generation
		});

		// Replacing disposes the previous inner execution before the next one starts.
		let (lifetime, token) = Lifetime::make();
		self.current
			.set_inner(Some(AnyDisposable::from_action(move || token.end())));

		let this = Arc::clone(self);
		producer.start_during(
			&lifetime,
			Observer::new(move |event| {
				if this.state.with_value(|state| state.generation) != generation {
					return;
				}
				match event {
					Event::Next(value) => this.input.send_next(value),
					Event::Failed(error) => this.input.send_failed(error),
					Event::Completed | Event::Interrupted => {
						let done = this.state.modify(|state| {
							if state.generation != generation {
								return false;
							}
							state.inner_active = false;
							state.outer_completed
						});
						if done {
							this.input.send_completed();
						}
					}
				}
			}),
		);
	}
}
