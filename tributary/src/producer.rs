//! Cold, restartable event streams.

use std::{
	fmt::{self, Debug, Formatter},
	sync::Arc,
	time::Duration,
};

use parking_lot::{Condvar, Mutex};
use streambed::{
	scheduler::{DateScheduler, Scheduler, Timestamp},
	AnyDisposable, Atomic, Disposable, Lifetime,
};

use crate::{Event, FlattenStrategy, Observer, Payload, Signal, WaitError};

type StartHandler<T, E> = dyn 'static + Send + Sync + Fn(Observer<T, E>, &Lifetime);

/// A recipe for [`Signal`]s, parameterized like them by value type `T` and failure type `E`.
///
/// Producers are *cold*: nothing happens until one is started, and every start runs the stored
/// start handler again, with a fresh [`Signal`], a fresh input [`Observer`] and a fresh
/// [`Lifetime`]. Executions share no state with each other unless the start handler itself
/// captured some.
///
/// Cheaply [`Clone`]able.
pub struct SignalProducer<T: Payload, E: Payload> {
	start_handler: Arc<StartHandler<T, E>>,
}

impl<T: Payload, E: Payload> Clone for SignalProducer<T, E> {
	fn clone(&self) -> Self {
		Self {
			start_handler: Arc::clone(&self.start_handler),
		}
	}
}

impl<T: Payload, E: Payload> Debug for SignalProducer<T, E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("SignalProducer").finish_non_exhaustive()
	}
}

impl<T: Payload, E: Payload> SignalProducer<T, E> {
	/// Creates a producer that runs `start_handler` once per start.
	///
	/// `start_handler` receives the input of the started [`Signal`] and that execution's
	/// [`Lifetime`]. The lifetime ends when the execution terminates or is interrupted, at which
	/// point work **should** stop and temporary resources **should** be released.
	pub fn new(start_handler: impl 'static + Send + Sync + Fn(Observer<T, E>, &Lifetime)) -> Self {
		Self {
			start_handler: Arc::new(start_handler),
		}
	}

	/// A producer that sends `value` and then completes.
	pub fn value(value: T) -> Self {
		Self::new(move |observer, _| {
			observer.send_next(value.clone());
			observer.send_completed();
		})
	}

	/// A producer that fails with `error` right away.
	pub fn failed(error: E) -> Self {
		Self::new(move |observer, _| observer.send_failed(error.clone()))
	}

	/// A producer that either sends the [`Ok`] value and completes, or fails with the [`Err`].
	pub fn from_result(result: Result<T, E>) -> Self {
		match result {
			Ok(value) => Self::value(value),
			Err(error) => Self::failed(error),
		}
	}

	/// A producer that sends each of `values` in order and then completes.
	pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
		let values: Arc<[T]> = values.into_iter().collect();
		Self::new(move |observer, lifetime| {
			for value in values.iter() {
				if lifetime.has_ended() {
					return;
				}
				observer.send_next(value.clone());
			}
			observer.send_completed();
		})
	}

	/// A producer that completes right away without sending any values.
	#[must_use]
	pub fn empty() -> Self {
		Self::new(|observer, _| observer.send_completed())
	}

	/// A producer whose executions never send any events.
	///
	/// They still end once interrupted.
	#[must_use]
	pub fn never() -> Self {
		Self::new(|observer, lifetime| {
			let _ = lifetime.observe_ended(move || drop(observer));
		})
	}

	/// A producer that forwards the events of the already-running `signal` to each start.
	///
	/// Executions started after `signal` terminated are interrupted right away.
	pub fn from_signal(signal: Signal<T, E>) -> Self {
		Self::new(move |observer, lifetime| match signal.observe(observer.clone()) {
			Some(observation) => {
				let _ = lifetime.add(observation);
			}
			None => observer.send_interrupted(),
		})
	}

	/// Creates a [`Signal`] from the producer and hands it to `setup` before anything is sent,
	/// then runs the start handler.
	///
	/// `setup` also receives a disposable that interrupts this execution.
	///
	/// **Returns** whatever `setup` returned.
	///
	/// # Logic
	///
	/// An execution whose signal is neither observed nor retained once `setup` and the start
	/// handler have returned is interrupted right away.
	pub fn start_with_signal<R>(&self, setup: impl FnOnce(Signal<T, E>, AnyDisposable) -> R) -> R {
		let (signal, input, lifetime) = Signal::make();

		let interrupter = AnyDisposable::from_action({
			let input = input.clone();
			let lifetime = lifetime.clone();
			move || {
				if !lifetime.has_ended() {
					input.send_interrupted();
				}
			}
		});
		let _ = lifetime.add(interrupter.clone());

		let keep_alive = signal.clone();
		let result = setup(signal, interrupter);
		if !lifetime.has_ended() {
			(self.start_handler)(input, &lifetime);
		}
		drop(keep_alive);

		result
	}

	/// Starts an execution whose events are sent to `observer`.
	///
	/// **Returns** a disposable that interrupts the execution.
	/// Dropping it does **not** interrupt anything.
	pub fn start(&self, observer: Observer<T, E>) -> AnyDisposable {
		self.start_with_signal(|signal, interrupter| {
			let _ = signal.observe(observer);
			interrupter
		})
	}

	/// Starts an execution that's interrupted when `lifetime` ends, forwarding events into `observer`.
	pub(crate) fn start_during(&self, lifetime: &Lifetime, observer: Observer<T, E>) {
		self.start_with_signal(|signal, interrupter| {
			let observation = signal.observe(observer);
			let registration = lifetime.observe_ended(move || {
				// Detach first, so the interruption isn't forwarded.
				if let Some(observation) = observation {
					observation.dispose();
				}
				interrupter.dispose();
			});

			// Long-lived lifetimes would otherwise accumulate one registration per finished execution.
			let _ = signal.observe(Observer::new(move |event| {
				if event.is_terminating() {
					registration.remove();
				}
			}));
		});
	}

	/// Starts an execution, calling `action` with each value.
	pub fn start_with_values(&self, action: impl 'static + Send + Sync + Fn(T)) -> AnyDisposable {
		self.start(Observer::new(move |event| {
			if let Event::Next(value) = event {
				action(value);
			}
		}))
	}

	/// Starts an execution, calling `action` iff it completes.
	pub fn start_with_completed(&self, action: impl 'static + Send + Sync + Fn()) -> AnyDisposable {
		self.start(Observer::new(move |event| {
			if let Event::Completed = event {
				action();
			}
		}))
	}

	/// Starts an execution, calling `action` iff it fails.
	pub fn start_with_failed(&self, action: impl 'static + Send + Sync + Fn(E)) -> AnyDisposable {
		self.start(Observer::new(move |event| {
			if let Event::Failed(error) = event {
				action(error);
			}
		}))
	}

	/// Starts an execution, calling `action` iff it's interrupted.
	pub fn start_with_interrupted(
		&self,
		action: impl 'static + Send + Sync + Fn(),
	) -> AnyDisposable {
		self.start(Observer::new(move |event| {
			if let Event::Interrupted = event {
				action();
			}
		}))
	}

	/// Starts an execution, calling `action` with each value as [`Ok`] and a failure as [`Err`].
	pub fn start_with_result(
		&self,
		action: impl 'static + Send + Sync + Fn(Result<T, E>),
	) -> AnyDisposable {
		self.start(Observer::new(move |event| match event {
			Event::Next(value) => action(Ok(value)),
			Event::Failed(error) => action(Err(error)),
			Event::Completed | Event::Interrupted => (),
		}))
	}

	/// Applies a [`Signal`] operator to every execution of the producer.
	///
	/// `transform` runs once per start, so operator state is never shared between executions.
	pub fn lift<U: Payload, F: Payload>(
		&self,
		transform: impl 'static + Send + Sync + Fn(Signal<T, E>) -> Signal<U, F>,
	) -> SignalProducer<U, F> {
		let source = self.clone();
		SignalProducer::new(move |observer, lifetime| {
			source.start_with_signal(|signal, interrupter| {
				transform(signal).observe_during(lifetime, observer);
				let _ = lifetime.add(interrupter);
			});
		})
	}

	/// Applies a binary [`Signal`] operator to every pair of executions of `self` and `other`.
	pub fn lift2<U: Payload, V: Payload, F: Payload>(
		&self,
		other: &SignalProducer<U, E>,
		transform: impl 'static + Send + Sync + Fn(Signal<T, E>, Signal<U, E>) -> Signal<V, F>,
	) -> SignalProducer<V, F> {
		let (source, other) = (self.clone(), other.clone());
		SignalProducer::new(move |observer, lifetime| {
			source.start_with_signal(|left, left_interrupter| {
				other.start_with_signal(|right, right_interrupter| {
					transform(left, right).observe_during(lifetime, observer);
					let _ = lifetime.add(left_interrupter);
					let _ = lifetime.add(right_interrupter);
				});
			});
		})
	}

	/// Runs the start handler on `scheduler` instead of the thread that starts the producer.
	pub fn start_on(&self, scheduler: impl 'static + Scheduler) -> Self {
		let source = self.clone();
		let scheduler = Arc::new(scheduler);
		Self::new(move |observer, lifetime| {
			let scheduled = scheduler.schedule(Box::new({
				let source = source.clone();
				let lifetime = lifetime.clone();
				move || {
					if !lifetime.has_ended() {
						source.start_during(&lifetime, observer);
					}
				}
			}));
			if let Some(scheduled) = scheduled {
				let _ = lifetime.add(scheduled);
			}
		})
	}

	/// Calls `action` right before each start.
	pub fn on_started(&self, action: impl 'static + Send + Sync + Fn()) -> Self {
		let source = self.clone();
		Self::new(move |observer, lifetime| {
			action();
			source.start_during(lifetime, observer);
		})
	}

	/// Calls `action` once each execution has terminated or was interrupted.
	pub fn on_disposed(&self, action: impl 'static + Send + Sync + Fn()) -> Self {
		let source = self.clone();
		let action = Arc::new(action);
		Self::new(move |observer, lifetime| {
			let action = Arc::clone(&action);
			let _ = lifetime.observe_ended(move || action());
			source.start_during(lifetime, observer);
		})
	}

	/// Starts a replacement produced by `handler` upon failure, forwarding its events instead.
	pub fn flat_map_error<F: Payload>(
		&self,
		handler: impl 'static + Send + Sync + Fn(E) -> SignalProducer<T, F>,
	) -> SignalProducer<T, F> {
		let source = self.clone();
		let handler = Arc::new(handler);
		SignalProducer::new(move |observer, lifetime| {
			let replacement_lifetime = lifetime.clone();
			let handler = Arc::clone(&handler);
			source.start_during(
				lifetime,
				Observer::new(move |event| match event {
					Event::Next(value) => observer.send_next(value),
					Event::Failed(error) => {
						handler(error).start_during(&replacement_lifetime, observer.clone());
					}
					Event::Completed => observer.send_completed(),
					Event::Interrupted => observer.send_interrupted(),
				}),
			);
		})
	}

	/// Restarts the producer after each failure, up to `count` additional times.
	///
	/// Completion and interruption are never retried.
	/// Once the budget is exhausted, the last failure is forwarded.
	#[must_use]
	///
	/// # Logic
	///
	/// Restarts happen in a loop on the thread that started the producer (or that delivered an
	/// asynchronous failure), so large budgets don't grow the stack.
	pub fn retry(&self, count: usize) -> Self {
		if count == 0 {
			return self.clone();
		}
		let source = self.clone();
		Self::new(move |observer, lifetime| {
			Arc::new(Retry {
				source: source.clone(),
				observer,
				lifetime: lifetime.clone(),
				remaining: Atomic::new(count),
				phase: Atomic::new(RetryPhase::Starting),
			})
			.run();
		})
	}

	/// Waits for `self` to complete, discarding its values, then forwards the events of `replacement`.
	///
	/// Failure and interruption of `self` are forwarded.
	pub fn then<U: Payload>(&self, replacement: SignalProducer<U, E>) -> SignalProducer<U, E> {
		let source = self.clone();
		SignalProducer::new(move |observer, lifetime| {
			let replacement = replacement.clone();
			let replacement_lifetime = lifetime.clone();
			source.start_during(
				lifetime,
				Observer::new(move |event| match event {
					Event::Next(_) => (),
					Event::Failed(error) => observer.send_failed(error),
					Event::Completed => {
						replacement.start_during(&replacement_lifetime, observer.clone());
					}
					Event::Interrupted => observer.send_interrupted(),
				}),
			);
		})
	}

	/// Forwards the values of `self`, and once it completes, those of `next`.
	#[must_use]
	pub fn concat(&self, next: &Self) -> Self {
		SignalProducer::<_, E>::from_values([self.clone(), next.clone()]).flatten(FlattenStrategy::Concat)
	}

	/// Runs the producer `count` times in a row, each after the previous one completed.
	///
	/// `repeat(0)` completes right away.
	#[must_use]
	pub fn repeat(&self, count: usize) -> Self {
		SignalProducer::<_, E>::from_values(std::iter::repeat(self.clone()).take(count))
			.flatten(FlattenStrategy::Concat)
	}

	/// Starts the producer and blocks until it terminates.
	///
	/// # Errors
	///
	/// Iff the producer fails or is interrupted.
	pub fn wait(&self) -> Result<(), WaitError<E>> {
		self.block_on(|_, _| ()).map(drop)
	}

	/// Starts the producer and blocks until its first value or termination.
	///
	/// The execution is interrupted after the first value.
	///
	/// # Errors
	///
	/// Iff the producer fails, is interrupted, or completes without sending a value.
	pub fn first(&self) -> Result<T, WaitError<E>> {
		self.take(1)
			.block_on(|values, value| values.push(value))?
			.pop()
			.ok_or(WaitError::NoValue)
	}

	/// Starts the producer and blocks until it terminates.
	///
	/// # Errors
	///
	/// Iff the producer fails, is interrupted, or completes without sending a value.
	pub fn last(&self) -> Result<T, WaitError<E>> {
		self.block_on(|values, value| {
			values.clear();
			values.push(value);
		})?
		.pop()
		.ok_or(WaitError::NoValue)
	}

	/// Starts the producer and blocks until it terminates, expecting exactly one value.
	///
	/// The execution is interrupted as soon as a second value arrives.
	///
	/// # Errors
	///
	/// Iff the producer fails, is interrupted, or completes with any number of values other than one.
	pub fn single(&self) -> Result<T, WaitError<E>> {
		let mut values = self
			.take(2)
			.block_on(|values, value| values.push(value))?;
		match values.len() {
			0 => Err(WaitError::NoValue),
			1 => values.pop().ok_or(WaitError::NoValue),
			_ => Err(WaitError::MultipleValues),
		}
	}

	fn block_on(
		&self,
		collect: impl 'static + Send + Sync + Fn(&mut Vec<T>, T),
	) -> Result<Vec<T>, WaitError<E>> {
		struct Waiting<T, E> {
			values: Vec<T>,
			outcome: Option<Result<(), WaitError<E>>>,
		}

		let shared = Arc::new((
			Mutex::new(Waiting {
				values: Vec::new(),
				outcome: None,
			}),
			Condvar::new(),
		));

		let execution = self.start(Observer::new({
			let shared = Arc::clone(&shared);
			move |event| {
				let (waiting, condvar) = &*shared;
				let mut waiting = waiting.lock();
				let outcome = match event {
					Event::Next(value) => {
						collect(&mut waiting.values, value);
						return;
					}
					Event::Failed(error) => Err(WaitError::Failed(error)),
					Event::Completed => Ok(()),
					Event::Interrupted => Err(WaitError::Interrupted),
				};
				waiting.outcome = Some(outcome);
				condvar.notify_all();
			}
		}));

		let (waiting, condvar) = &*shared;
		let mut waiting = waiting.lock();
		let outcome = loop {
			if let Some(outcome) = waiting.outcome.take() {
				break outcome;
			}
			condvar.wait(&mut waiting);
		};
		let values = std::mem::take(&mut waiting.values);
		drop(waiting);
		drop(execution);

		outcome.map(|()| values)
	}
}

/// One execution of [`SignalProducer::retry`].
struct Retry<T: Payload, E: Payload> {
	source: SignalProducer<T, E>,
	observer: Observer<T, E>,
	lifetime: Lifetime,
	remaining: Atomic<usize>,
	phase: Atomic<RetryPhase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryPhase {
	/// An attempt's start handler is running.
	Starting,
	/// The running start handler's attempt failed and should be restarted once it returns.
	Restart,
	/// An attempt is running asynchronously.
	Idle,
}

impl<T: Payload, E: Payload> Retry<T, E> {
	fn run(self: &Arc<Self>) {
		loop {
			self.phase.set(RetryPhase::Starting);
			if self.lifetime.has_ended() {
				return;
			}

			let this = Arc::clone(self);
			self.source.start_during(
				&self.lifetime,
				Observer::new(move |event: Event<T, E>| match event {
					Event::Failed(error) => this.failed(error),
					event => this.observer.send(event),
				}),
			);

			let restart = self.phase.modify(|phase| {
				let restart = *phase == RetryPhase::Restart;
				*phase = if restart {
					RetryPhase::Starting
				} else {
					RetryPhase::Idle
				};
				restart
			});
			if !restart {
				return;
			}
		}
	}

	fn failed(self: &Arc<Self>, error: E) {
		let budgeted = self.remaining.modify(|remaining| match remaining.checked_sub(1) {
			Some(rest) => {
				*remaining = rest;
				true
			}
			None => false,
		});
		if !budgeted {
			return self.observer.send_failed(error);
		}

		let restart_now = self.phase.modify(|phase| match phase {
			RetryPhase::Starting => {
				*phase = RetryPhase::Restart;
				false
			}
			RetryPhase::Restart | RetryPhase::Idle => true,
		});
		if restart_now {
			self.run();
		}
	}
}

impl<E: Payload> SignalProducer<Timestamp, E> {
	/// A producer that sends the scheduler's current date every `interval`, starting one
	/// `interval` after each start. It never completes on its own.
	///
	/// # Panics
	///
	/// When started, iff `interval` is zero.
	pub fn timer(interval: Duration, scheduler: impl 'static + DateScheduler) -> Self {
		let scheduler = Arc::new(scheduler);
		Self::new(move |observer, lifetime| {
			let repeating = scheduler.schedule_repeating(
				scheduler.current_date() + interval,
				interval,
				Duration::ZERO,
				Arc::new({
					let scheduler = Arc::clone(&scheduler);
					move || observer.send_next(scheduler.current_date())
				}),
			);
			if let Some(repeating) = repeating {
				let _ = lifetime.add(repeating);
			}
		})
	}
}
