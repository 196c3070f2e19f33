use crate::AnyDisposable;

use super::{Action, Scheduler};

/// A scheduler that performs all work synchronously, on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
	/// Runs `action` before returning. Nothing is left to cancel, so this always returns [`None`].
	fn schedule(&self, action: Action) -> Option<AnyDisposable> {
		action();
		None
	}
}
