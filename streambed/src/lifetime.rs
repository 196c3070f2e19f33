//! Explicit teardown scopes.
//!
//! A [`Lifetime`] is handed out to dependents, which register teardown work against it.
//! The matching [`LifetimeToken`] stays with the owner, and ending or dropping it ends the lifetime.

use std::fmt::{self, Debug, Formatter};

use crate::{CompositeDisposable, Disposable, DisposableHandle};

/// Represents the lifetime of some owner, and provides a hook to observe when it ends.
///
/// Cheaply [`Clone`]able. All clones observe the same end.
#[derive(Clone)]
pub struct Lifetime {
	disposables: CompositeDisposable,
}

/// Ends the associated [`Lifetime`] when [ended](`LifetimeToken::end`) or dropped.
#[must_use = "Dropping a `LifetimeToken` ends its `Lifetime` immediately."]
pub struct LifetimeToken {
	disposables: CompositeDisposable,
}

impl Lifetime {
	/// Creates a [`Lifetime`] together with the [`LifetimeToken`] that controls it.
	pub fn make() -> (Lifetime, LifetimeToken) {
		let disposables = CompositeDisposable::new();
		(
			Lifetime {
				disposables: disposables.clone(),
			},
			LifetimeToken { disposables },
		)
	}

	/// A [`Lifetime`] that has already ended.
	#[must_use]
	pub fn empty() -> Self {
		let (lifetime, token) = Self::make();
		token.end();
		lifetime
	}

	/// Whether the lifetime has ended.
	#[must_use]
	pub fn has_ended(&self) -> bool {
		self.disposables.is_disposed()
	}

	/// Runs `action` when the lifetime ends.
	///
	/// Iff the lifetime has already ended, `action` runs immediately.
	pub fn observe_ended(&self, action: impl 'static + Send + FnOnce()) -> DisposableHandle {
		self.disposables.add_action(action)
	}

	/// Disposes `disposable` when the lifetime ends.
	///
	/// Iff the lifetime has already ended, `disposable` is disposed immediately.
	pub fn add(&self, disposable: impl 'static + Disposable) -> DisposableHandle {
		self.disposables.add(disposable)
	}
}

impl Debug for Lifetime {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Lifetime")
			.field("has_ended", &self.has_ended())
			.finish_non_exhaustive()
	}
}

impl LifetimeToken {
	/// Ends the lifetime now.
	pub fn end(self) {
		// Implicit drop.
	}

	/// Creates another [`Lifetime`] handle for this token.
	pub fn lifetime(&self) -> Lifetime {
		Lifetime {
			disposables: self.disposables.clone(),
		}
	}
}

impl Drop for LifetimeToken {
	fn drop(&mut self) {
		self.disposables.dispose();
	}
}

impl Debug for LifetimeToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("LifetimeToken").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	};

	use super::Lifetime;

	#[test]
	fn ends_when_token_drops() {
		let ended = Arc::new(AtomicBool::new(false));
		let (lifetime, token) = Lifetime::make();
		let _ = lifetime.observe_ended({
			let ended = Arc::clone(&ended);
			move || ended.store(true, Ordering::SeqCst)
		});

		assert!(!lifetime.has_ended());
		drop(token);
		assert!(lifetime.has_ended());
		assert!(ended.load(Ordering::SeqCst));
	}

	#[test]
	fn empty_runs_observers_immediately() {
		let ended = Arc::new(AtomicBool::new(false));
		let lifetime = Lifetime::empty();
		let _ = lifetime.observe_ended({
			let ended = Arc::clone(&ended);
			move || ended.store(true, Ordering::SeqCst)
		});
		assert!(ended.load(Ordering::SeqCst));
	}
}
