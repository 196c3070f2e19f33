//! [`Atomic`] is a value protected by a mutual-exclusion lock.

use std::fmt::{self, Debug, Formatter};

use parking_lot::Mutex;

/// An atomic variable.
///
/// All operations are linearizable with respect to each other.
///
/// # Threading
///
/// The lock is **not** reentrant: calling any method of an [`Atomic`] from within a closure
/// passed to [`.modify`](`Atomic::modify`) or [`.with_value`](`Atomic::with_value`) on the
/// same instance deadlocks.
/// Keep the closures short and free of callbacks into user code.
#[derive(Default)]
pub struct Atomic<T> {
	value: Mutex<T>,
}

impl<T> Atomic<T> {
	/// Initializes the variable with the given initial value.
	pub const fn new(value: T) -> Self {
		Self {
			value: Mutex::new(value),
		}
	}

	/// Atomically reads a clone of the current value.
	#[must_use]
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.value.lock().clone()
	}

	/// Atomically replaces the current value. The old one is dropped outside the lock.
	pub fn set(&self, value: T) {
		drop(self.swap(value));
	}

	/// Atomically replaces the contents of the variable.
	///
	/// **Returns** the old value.
	pub fn swap(&self, value: T) -> T {
		std::mem::replace(&mut *self.value.lock(), value)
	}

	/// Atomically modifies the variable.
	///
	/// **Returns** the result of `action`.
	pub fn modify<R>(&self, action: impl FnOnce(&mut T) -> R) -> R {
		action(&mut self.value.lock())
	}

	/// Atomically performs an arbitrary action using the current value of the variable.
	///
	/// **Returns** the result of `action`.
	pub fn with_value<R>(&self, action: impl FnOnce(&T) -> R) -> R {
		action(&self.value.lock())
	}

	/// Provides access to the value without locking, since `self` is exclusive.
	pub fn get_mut(&mut self) -> &mut T {
		self.value.get_mut()
	}

	/// Consumes the [`Atomic`], returning the wrapped value.
	pub fn into_inner(self) -> T {
		self.value.into_inner()
	}
}

impl<T: Debug> Debug for Atomic<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.value.try_lock() {
			Some(value) => f.debug_tuple("Atomic").field(&*value).finish(),
			None => f.debug_tuple("Atomic").field(&"<locked>").finish(),
		}
	}
}

impl<T> From<T> for Atomic<T> {
	fn from(value: T) -> Self {
		Self::new(value)
	}
}

#[cfg(test)]
mod tests {
	use std::{sync::Arc, thread};

	use super::Atomic;

	#[test]
	fn swap_returns_previous() {
		let atomic = Atomic::new(1);
		assert_eq!(atomic.swap(2), 1);
		assert_eq!(atomic.get(), 2);
	}

	#[test]
	fn modify_returns_closure_result() {
		let atomic = Atomic::new(vec![1, 2]);
		let len = atomic.modify(|v| {
			v.push(3);
			v.len()
		});
		assert_eq!(len, 3);
		assert_eq!(atomic.with_value(|v| v.iter().sum::<i32>()), 6);
	}

	#[test]
	fn concurrent_increments_are_not_lost() {
		let atomic = Arc::new(Atomic::new(0_u32));
		let threads: Vec<_> = (0..8)
			.map(|_| {
				let atomic = Arc::clone(&atomic);
				thread::spawn(move || {
					for _ in 0..1000 {
						atomic.modify(|n| *n += 1);
					}
				})
			})
			.collect();
		for thread in threads {
			thread.join().unwrap();
		}
		assert_eq!(atomic.get(), 8000);
	}
}
