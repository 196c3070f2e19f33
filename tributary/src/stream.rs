//! Bridges into `async` code.
//!
//! [`EventStream`] implements [`Stream`], so signals and producers can be consumed with
//! [`StreamExt`](`futures_lite::StreamExt`) from any executor.

use std::{
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};

use futures_channel::mpsc::{self, UnboundedReceiver};
use futures_lite::{Stream, StreamExt};
use pin_project::pin_project;
use streambed::{AnyDisposable, Lifetime, ScopedDisposable};

use crate::{Event, Observer, Payload, Signal, SignalProducer, WaitError};

/// A [`Stream`] of the [`Event`]s of one observation.
///
/// The stream ends after yielding a terminating event.
/// Dropping it before then ends the observation (and for producers, interrupts the execution).
///
/// Events are queued without bound while the stream isn't polled.
#[must_use = "Streams do nothing unless polled."]
#[pin_project]
pub struct EventStream<T: Payload, E: Payload> {
	#[pin]
	receiver: UnboundedReceiver<Event<T, E>>,
	observation: Option<ScopedDisposable<AnyDisposable>>,
	finished: bool,
}

impl<T: Payload, E: Payload> EventStream<T, E> {
	fn channel() -> (Observer<T, E>, UnboundedReceiver<Event<T, E>>) {
		let (sender, receiver) = mpsc::unbounded();
		let observer = Observer::new(move |event| {
			// The stream may have been dropped already, in which case the event is moot.
			let _ = sender.unbounded_send(event);
		});
		(observer, receiver)
	}
}

impl<T: Payload, E: Payload> Stream for EventStream<T, E> {
	type Item = Event<T, E>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.project();
		if *this.finished {
			return Poll::Ready(None);
		}

		match this.receiver.poll_next(cx) {
			Poll::Ready(Some(event)) => {
				if event.is_terminating() {
					*this.finished = true;
					drop(this.observation.take());
				}
				Poll::Ready(Some(event))
			}
			Poll::Ready(None) => {
				*this.finished = true;
				Poll::Ready(None)
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<T: Payload, E: Payload> Signal<T, E> {
	/// Observes the signal as a [`Stream`] of events.
	///
	/// Iff the signal has already terminated, the stream yields only that terminating event.
	pub fn events(&self) -> EventStream<T, E> {
		let (observer, receiver) = EventStream::channel();
		let (lifetime, token) = Lifetime::make();
		self.observe_during(&lifetime, observer);
		EventStream {
			receiver,
			observation: Some(ScopedDisposable::new(AnyDisposable::from_action(move || {
				token.end();
			}))),
			finished: false,
		}
	}
}

impl<T: Payload, E: Payload> SignalProducer<T, E> {
	/// Starts the producer and yields its events as a [`Stream`].
	pub fn events(&self) -> EventStream<T, E> {
		let (observer, receiver) = EventStream::channel();
		let interrupter = self.start(observer);
		EventStream {
			receiver,
			observation: Some(ScopedDisposable::new(interrupter)),
			finished: false,
		}
	}

	/// Starts the producer and resolves to its first value.
	///
	/// The execution is interrupted once the first value arrives, or when the future is dropped.
	///
	/// # Errors
	///
	/// Like [`.first()`](`SignalProducer::first`).
	pub fn first_async(&self) -> impl 'static + Send + Future<Output = Result<T, WaitError<E>>> {
		let events = self.take(1).events();
		async move {
			match collect_values(events).await?.into_iter().next() {
				Some(value) => Ok(value),
				None => Err(WaitError::NoValue),
			}
		}
	}

	/// Starts the producer and resolves to its last value once it completes.
	///
	/// # Errors
	///
	/// Like [`.last()`](`SignalProducer::last`).
	pub fn last_async(&self) -> impl 'static + Send + Future<Output = Result<T, WaitError<E>>> {
		let events = self.events();
		async move {
			match collect_values(events).await?.pop() {
				Some(value) => Ok(value),
				None => Err(WaitError::NoValue),
			}
		}
	}

	/// Starts the producer and resolves once it completes, discarding its values.
	///
	/// # Errors
	///
	/// Like [`.wait()`](`SignalProducer::wait`).
	pub fn wait_async(&self) -> impl 'static + Send + Future<Output = Result<(), WaitError<E>>> {
		let events = self.filter(|_| false).events();
		async move { collect_values(events).await.map(drop) }
	}
}

async fn collect_values<T: Payload, E: Payload>(
	mut events: EventStream<T, E>,
) -> Result<Vec<T>, WaitError<E>> {
	let mut values = Vec::new();
	while let Some(event) = events.next().await {
		match event {
			Event::Next(value) => values.push(value),
			Event::Failed(error) => return Err(WaitError::Failed(error)),
			Event::Completed => return Ok(values),
			Event::Interrupted => return Err(WaitError::Interrupted),
		}
	}
	// Only reachable if the stream was abandoned without a terminating event.
	Err(WaitError::Interrupted)
}
