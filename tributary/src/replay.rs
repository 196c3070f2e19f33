//! Multicasting with replay of recent values.

use std::{cell::RefCell, collections::VecDeque, sync::Arc};

use parking_lot::ReentrantMutex;
use streambed::{AnyDisposable, Atomic, Bag, ScopedDisposable};
use tracing::debug;

use crate::{Event, Observer, Payload, SignalProducer};

struct ReplayState<T, E> {
	capacity: usize,
	values: VecDeque<T>,
	/// Never evicted once set.
	terminal: Option<Event<T, E>>,
	observers: Bag<Observer<T, E>>,
}

/// Reentrant, since observers **may** send into the buffer while it delivers to them.
/// The [`RefCell`] is never borrowed across callbacks.
type SharedReplay<T, E> = Arc<ReentrantMutex<RefCell<ReplayState<T, E>>>>;

impl<T: Payload, E: Payload> ReplayState<T, E> {
	fn push(&mut self, value: T) {
		if self.capacity == 0 {
			return;
		}
		if self.values.len() == self.capacity {
			self.values.pop_front();
		}
		self.values.push_back(value);
	}
}

fn send_to_buffer<T: Payload, E: Payload>(shared: &SharedReplay<T, E>, event: Event<T, E>) {
	let lock = shared.lock();
	let observers: Vec<Observer<T, E>> = {
		let mut state = lock.borrow_mut();
		if state.terminal.is_some() {
			debug!("Ignored an event sent into a terminated buffer.");
			return;
		}
		if event.is_terminating() {
			state.terminal = Some(event.clone());
			state.observers.drain().collect()
		} else {
			if let Event::Next(value) = &event {
				state.push(value.clone());
			}
			state.observers.iter().cloned().collect()
		}
	};

	// Still holding the lock, so new subscribers can't miss or see twice what's delivered here.
	for observer in observers {
		observer.send(event.clone());
	}
}

impl<T: Payload, E: Payload> SignalProducer<T, E> {
	/// Creates a multicasting buffer that keeps the latest `capacity` values sent into it.
	///
	/// **Returns** a producer and the observer that feeds it. Each start of the producer first
	/// receives the buffered values, oldest first, and then live events as they're sent.
	///
	/// # Logic
	///
	/// When the buffer is full, the oldest value is evicted to make room for the next.
	/// A terminating event is kept regardless of `capacity`, and replayed after the buffered
	/// values to every later start. Events sent after it are ignored.
	///
	/// With a `capacity` of zero, only live events and the terminating event are forwarded.
	#[must_use]
	pub fn buffer(capacity: usize) -> (Self, Observer<T, E>) {
		let shared: SharedReplay<T, E> = Arc::new(ReentrantMutex::new(RefCell::new(ReplayState {
			capacity,
			values: VecDeque::new(),
			terminal: None,
			observers: Bag::new(),
		})));

		let input = Observer::new({
			let shared = Arc::clone(&shared);
			move |event| send_to_buffer(&shared, event)
		});

		let producer = Self::new(move |observer, lifetime| {
			let lock = shared.lock();
			let (values, terminal) = {
				let state = lock.borrow();
				(state.values.clone(), state.terminal.clone())
			};

			for value in values {
				observer.send_next(value);
			}
			if let Some(terminal) = terminal {
				observer.send(terminal);
				return;
			}
			if lifetime.has_ended() {
				return;
			}

			let token = lock.borrow_mut().observers.insert(observer);
			drop(lock);

			let shared = Arc::downgrade(&shared);
			let _ = lifetime.observe_ended(move || {
				if let Some(shared) = shared.upgrade() {
					let lock = shared.lock();
					let removed = lock.borrow_mut().observers.remove(token);
					drop(lock);
					drop(removed);
				}
			});
		});

		(producer, input)
	}

	/// Starts `self` once, on the first start of the returned producer, and multicasts its
	/// events to every start of the returned producer, replaying up to `capacity` of the latest
	/// values to each. See [`SignalProducer::buffer`].
	///
	/// The underlying execution is interrupted once every clone of the returned producer has
	/// been dropped.
	#[must_use]
	pub fn replay_lazily(&self, capacity: usize) -> Self {
		let (replayed, input) = Self::buffer(capacity);
		let source = self.clone();
		let started = Atomic::new(false);
		let connection = Atomic::new(None::<ScopedDisposable<AnyDisposable>>);

		Self::new(move |observer, lifetime| {
			replayed.start_during(lifetime, observer);
			if !started.swap(true) {
				let interrupter = source.start(input.clone());
				connection.set(Some(ScopedDisposable::new(interrupter)));
			}
		})
	}
}
