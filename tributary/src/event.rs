//! The closed set of signal events.

use std::{
	convert::Infallible,
	fmt::{self, Display, Formatter},
};

/// The error type of streams that can't fail.
pub type NoError = Infallible;

/// Represents a signal event.
///
/// Signals **must** conform to the grammar
/// `Next* (Failed | Completed | Interrupted)?`.
///
/// [`Failed`](`Event::Failed`), [`Completed`](`Event::Completed`) and
/// [`Interrupted`](`Event::Interrupted`) are *terminating*: nothing follows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event<T, E> {
	/// A value provided by the signal.
	Next(T),

	/// The signal terminated because of an error.
	Failed(E),

	/// The signal successfully terminated.
	Completed,

	/// Event production on the signal has been interrupted.
	/// No further events will be received.
	Interrupted,
}

impl<T, E> Event<T, E> {
	/// Whether `self` is a terminating event.
	#[must_use]
	pub fn is_terminating(&self) -> bool {
		match self {
			Event::Next(_) => false,
			Event::Failed(_) | Event::Completed | Event::Interrupted => true,
		}
	}

	/// Whether `self` is [`Failed`](`Event::Failed`) or [`Completed`](`Event::Completed`).
	///
	/// Unlike [`.is_terminating()`](`Event::is_terminating`), this excludes interruption.
	#[must_use]
	pub fn is_completed(&self) -> bool {
		matches!(self, Event::Failed(_) | Event::Completed)
	}

	/// Lifts the given function over the event's value.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U, E> {
		match self {
			Event::Next(value) => Event::Next(f(value)),
			Event::Failed(error) => Event::Failed(error),
			Event::Completed => Event::Completed,
			Event::Interrupted => Event::Interrupted,
		}
	}

	/// Lifts the given function over the event's error.
	pub fn map_error<F>(self, f: impl FnOnce(E) -> F) -> Event<T, F> {
		match self {
			Event::Next(value) => Event::Next(value),
			Event::Failed(error) => Event::Failed(f(error)),
			Event::Completed => Event::Completed,
			Event::Interrupted => Event::Interrupted,
		}
	}

	/// Borrows the value of a [`Next`](`Event::Next`) event.
	#[must_use]
	pub fn value(&self) -> Option<&T> {
		match self {
			Event::Next(value) => Some(value),
			_ => None,
		}
	}

	/// Borrows the error of a [`Failed`](`Event::Failed`) event.
	#[must_use]
	pub fn error(&self) -> Option<&E> {
		match self {
			Event::Failed(error) => Some(error),
			_ => None,
		}
	}

	/// Unwraps the value of a [`Next`](`Event::Next`) event.
	#[must_use]
	pub fn into_value(self) -> Option<T> {
		match self {
			Event::Next(value) => Some(value),
			_ => None,
		}
	}

	/// Unwraps the error of a [`Failed`](`Event::Failed`) event.
	#[must_use]
	pub fn into_error(self) -> Option<E> {
		match self {
			Event::Failed(error) => Some(error),
			_ => None,
		}
	}
}

impl<T: Display, E: Display> Display for Event<T, E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Event::Next(value) => write!(f, "NEXT {value}"),
			Event::Failed(error) => write!(f, "FAILED {error}"),
			Event::Completed => f.write_str("COMPLETED"),
			Event::Interrupted => f.write_str("INTERRUPTED"),
		}
	}
}
