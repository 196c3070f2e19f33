use thiserror::Error;

/// Why a blocking accessor like [`SignalProducer::single`](`crate::SignalProducer::single`)
/// couldn't produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError<E> {
	/// The producer failed.
	#[error("the producer failed")]
	Failed(E),

	/// The producer was interrupted before it could complete.
	#[error("the producer was interrupted")]
	Interrupted,

	/// The producer completed without sending a value.
	#[error("the producer completed without sending a value")]
	NoValue,

	/// The producer sent more than one value where exactly one was expected.
	#[error("the producer sent more than one value")]
	MultipleValues,
}

impl<E> WaitError<E> {
	/// The error the producer failed with, if any.
	pub fn into_failure(self) -> Option<E> {
		match self {
			WaitError::Failed(error) => Some(error),
			WaitError::Interrupted | WaitError::NoValue | WaitError::MultipleValues => None,
		}
	}
}
