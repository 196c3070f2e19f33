//! Operators that move events across schedulers or in time.

use std::{sync::Arc, time::Duration};

use streambed::{
	scheduler::{DateScheduler, Scheduler, Timestamp},
	Atomic, SerialDisposable,
};
use tracing::trace;

use crate::{Event, Observer, Payload, Signal, SignalProducer};

impl<T: Payload, E: Payload> Signal<T, E> {
	/// Forwards every event through `scheduler`.
	///
	/// Events keep their order iff `scheduler` runs actions in the order they were scheduled,
	/// which every [`Scheduler`] **must** do for actions scheduled from one thread.
	#[must_use]
	pub fn observe_on(&self, scheduler: impl 'static + Scheduler) -> Self {
		self.derive(move |input, _| {
			Observer::new(move |event| {
				let input = input.clone();
				// Cancellation isn't needed: A terminated signal ignores late events.
				drop(scheduler.schedule(Box::new(move || input.send(event))));
			})
		})
	}

	/// Delays values and completion by `interval` on `scheduler`.
	///
	/// Failure and interruption are forwarded through `scheduler` without delay.
	#[must_use]
	pub fn delay(&self, interval: Duration, scheduler: impl 'static + DateScheduler) -> Self {
		self.derive(move |input, _| {
			Observer::new(move |event: Event<T, E>| {
				let delayed = matches!(event, Event::Next(_) | Event::Completed);
				let input = input.clone();
				let send = Box::new(move || input.send(event));
				let scheduled = if delayed {
					scheduler.schedule_after(scheduler.current_date() + interval, send)
				} else {
					scheduler.schedule(send)
				};
				drop(scheduled);
			})
		})
	}

	/// Forwards values on `scheduler` so that at least `interval` passes between any two of them.
	///
	/// Of the values that arrive while waiting, only the latest is forwarded.
	/// Completion forwards the waiting value right away, then completes.
	/// Failure and interruption discard it.
	#[must_use]
	pub fn throttle(&self, interval: Duration, scheduler: impl 'static + DateScheduler) -> Self {
		self.derive(move |input: Observer<T, E>, lifetime| {
			let throttle = Arc::new(Throttle {
				input,
				interval,
				scheduler,
				state: Atomic::new(ThrottleState {
					previous: None,
					pending: None,
				}),
				scheduled: SerialDisposable::default(),
			});
			let _ = lifetime.add(throttle.scheduled.clone());

			Observer::new(move |event| match event {
				Event::Next(value) => throttle.next(value),
				Event::Completed => {
					throttle.flush();
					throttle.input.send_completed();
				}
				event => {
					throttle.state.modify(|state| state.pending = None);
					throttle.input.send(event);
				}
			})
		})
	}

	/// Fails with `error` iff `self` hasn't terminated after `interval` on `scheduler`.
	///
	/// The source's observation is disposed when the timeout fires,
	/// and the timer is cancelled when the source terminates first.
	#[must_use]
	pub fn timeout(
		&self,
		interval: Duration,
		error: E,
		scheduler: impl 'static + DateScheduler,
	) -> Self {
		self.derive(move |input: Observer<T, E>, lifetime| {
			let timer = scheduler.schedule_after(
				scheduler.current_date() + interval,
				Box::new({
					let input = input.clone();
					move || {
						trace!("Timed out.");
						input.send_failed(error);
					}
				}),
			);
			if let Some(timer) = timer {
				let _ = lifetime.add(timer);
			}
			input
		})
	}
}

impl<T: Payload, E: Payload> SignalProducer<T, E> {
	/// Lifted [`Signal::observe_on`].
	#[must_use]
	pub fn observe_on(&self, scheduler: impl 'static + Scheduler) -> Self {
		let scheduler = Arc::new(scheduler);
		self.lift(move |signal| signal.observe_on(Arc::clone(&scheduler)))
	}

	/// Lifted [`Signal::delay`].
	#[must_use]
	pub fn delay(&self, interval: Duration, scheduler: impl 'static + DateScheduler) -> Self {
		let scheduler = Arc::new(scheduler);
		self.lift(move |signal| signal.delay(interval, Arc::clone(&scheduler)))
	}

	/// Lifted [`Signal::throttle`].
	#[must_use]
	pub fn throttle(&self, interval: Duration, scheduler: impl 'static + DateScheduler) -> Self {
		let scheduler = Arc::new(scheduler);
		self.lift(move |signal| signal.throttle(interval, Arc::clone(&scheduler)))
	}

	/// Lifted [`Signal::timeout`]. The timer starts anew with each execution.
	#[must_use]
	pub fn timeout(
		&self,
		interval: Duration,
		error: E,
		scheduler: impl 'static + DateScheduler,
	) -> Self {
		let scheduler = Arc::new(scheduler);
		self.lift(move |signal| signal.timeout(interval, error.clone(), Arc::clone(&scheduler)))
	}
}

struct Throttle<T: Payload, E: Payload, S: DateScheduler> {
	input: Observer<T, E>,
	interval: Duration,
	scheduler: S,
	state: Atomic<ThrottleState<T>>,
	scheduled: SerialDisposable,
}

struct ThrottleState<T> {
	/// When the last value was or will be forwarded.
	previous: Option<Timestamp>,
	pending: Option<T>,
}

impl<T: Payload, E: Payload, S: 'static + DateScheduler> Throttle<T, E, S> {
	fn next(self: &Arc<Self>, value: T) {
		let now = self.scheduler.current_date();
		let date = self.state.modify(|state| {
			if state.pending.replace(value).is_some() {
				// Already scheduled.
				return None;
			}
			let date = match state.previous {
				Some(previous) if now < previous + self.interval => previous + self.interval,
				_ => now,
			};
			state.previous = Some(date);
			Some(date)
		});

		if let Some(date) = date {
			let this = Arc::clone(self);
			let scheduled = self
				.scheduler
				.schedule_after(date, Box::new(move || this.flush()));
			self.scheduled.set_inner(scheduled);
		}
	}

	fn flush(&self) {
		if let Some(value) = self.state.modify(|state| state.pending.take()) {
			self.input.send_next(value);
		}
	}
}
