//! Event sinks.

use std::{
	fmt::{self, Debug, Formatter},
	sync::Arc,
};

use crate::Event;

/// A cheaply [`Clone`]able receiver of [`Event`]s.
///
/// Observers are handed to [`Signal::observe`](`crate::Signal::observe`) to consume events,
/// and are handed *out* by [`Signal::new`](`crate::Signal::new`) and [`Signal::pipe`](`crate::Signal::pipe`)
/// as the signal's input side.
pub struct Observer<T, E>(Arc<dyn 'static + Send + Sync + Fn(Event<T, E>)>);

impl<T, E> Observer<T, E> {
	/// Creates an observer that hands each event to `action`.
	pub fn new(action: impl 'static + Send + Sync + Fn(Event<T, E>)) -> Self {
		Self(Arc::new(action))
	}

	/// An observer that discards every event.
	#[must_use]
	pub fn ignoring() -> Self
	where
		T: 'static,
		E: 'static,
	{
		Self::new(|_| ())
	}

	/// Puts `event` into the observer.
	pub fn send(&self, event: Event<T, E>) {
		(self.0)(event);
	}

	/// Puts a [`Next`](`Event::Next`) event into the observer.
	pub fn send_next(&self, value: T) {
		self.send(Event::Next(value));
	}

	/// Puts a [`Failed`](`Event::Failed`) event into the observer.
	pub fn send_failed(&self, error: E) {
		self.send(Event::Failed(error));
	}

	/// Puts a [`Completed`](`Event::Completed`) event into the observer.
	pub fn send_completed(&self) {
		self.send(Event::Completed);
	}

	/// Puts an [`Interrupted`](`Event::Interrupted`) event into the observer.
	pub fn send_interrupted(&self) {
		self.send(Event::Interrupted);
	}
}

impl<T, E> Clone for Observer<T, E> {
	fn clone(&self) -> Self {
		Self(Arc::clone(&self.0))
	}
}

impl<T, E> Debug for Observer<T, E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Observer").finish_non_exhaustive()
	}
}
