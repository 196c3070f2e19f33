use std::{
	fmt::{self, Debug, Formatter},
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{Arc, Weak},
	thread,
	time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::{AnyDisposable, SerialDisposable};

use super::{Action, ActionQueue, DateScheduler, RepeatingAction, Scheduler, Timestamp};

/// A scheduler backed by a dedicated worker thread that runs actions one at a time.
///
/// Cheaply [`Clone`]able. The worker thread exits once every handle has been dropped.
/// Actions that are still pending at that point are dropped without running.
#[derive(Clone)]
pub struct QueueScheduler(Arc<QueueHandle>);

struct QueueHandle {
	shared: Arc<QueueShared>,
}

struct QueueShared {
	name: String,
	epoch: Instant,
	state: Mutex<QueueState>,
	condvar: Condvar,
}

#[derive(Default)]
struct QueueState {
	queue: ActionQueue,
	shut_down: bool,
}

impl QueueScheduler {
	/// Creates a scheduler with a generic worker thread name.
	///
	/// # Panics
	///
	/// Iff the worker thread can't be spawned.
	#[must_use]
	pub fn new() -> Self {
		Self::with_name("tributary-queue")
	}

	/// Creates a scheduler whose worker thread is called `name`.
	///
	/// # Panics
	///
	/// Iff the worker thread can't be spawned.
	#[must_use]
	pub fn with_name(name: impl Into<String>) -> Self {
		let shared = Arc::new(QueueShared {
			name: name.into(),
			epoch: Instant::now(),
			state: Mutex::new(QueueState::default()),
			condvar: Condvar::new(),
		});

		thread::Builder::new()
			.name(shared.name.clone())
			.spawn({
				let shared = Arc::clone(&shared);
				move || shared.run()
			})
			.expect("Failed to spawn the `QueueScheduler` worker thread.");

		Self(Arc::new(QueueHandle { shared }))
	}

	/// The worker thread's name.
	#[must_use]
	pub fn name(&self) -> &str {
		&self.0.shared.name
	}

	fn enqueue(&self, date: Timestamp, action: Action) -> AnyDisposable {
		let key = {
			let mut state = self.0.shared.state.lock();
			let key = state.queue.push(date, action);
			self.0.shared.condvar.notify_one();
			key
		};

		let shared = Arc::downgrade(&self.0.shared);
		AnyDisposable::from_action(move || {
			if let Some(shared) = shared.upgrade() {
				let cancelled = shared.state.lock().queue.cancel(key);
				drop(cancelled);
			}
		})
	}

	fn repeat(
		handle: &Weak<QueueHandle>,
		date: Timestamp,
		interval: Duration,
		serial: &SerialDisposable,
		action: RepeatingAction,
	) {
		let Some(handle) = handle.upgrade() else {
			return;
		};
		let this = Self(handle);

		let next = {
			let handle = Arc::downgrade(&this.0);
			let serial = serial.clone();
			Box::new(move || {
				action();
				Self::repeat(&handle, date + interval, interval, &serial, action);
			})
		};
		serial.set_inner(Some(this.enqueue(date, next)));
	}
}

impl Default for QueueScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for QueueScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("QueueScheduler")
			.field("name", &self.0.shared.name)
			.field("pending", &self.0.shared.state.lock().queue.len())
			.finish()
	}
}

impl Drop for QueueHandle {
	fn drop(&mut self) {
		self.shared.state.lock().shut_down = true;
		self.shared.condvar.notify_all();
	}
}

impl QueueShared {
	fn now(&self) -> Timestamp {
		Timestamp::from_duration(self.epoch.elapsed())
	}

	fn run(&self) {
		debug!(name = %self.name, "`QueueScheduler` worker started.");
		while let Some(action) = self.next_action() {
			if catch_unwind(AssertUnwindSafe(action)).is_err() {
				warn!(name = %self.name, "An action scheduled on a `QueueScheduler` panicked.");
			}
		}
		debug!(name = %self.name, "`QueueScheduler` worker stopped.");
	}

	/// Blocks until an action is due. [`None`] iff the scheduler was shut down.
	fn next_action(&self) -> Option<Action> {
		let mut state = self.state.lock();
		loop {
			if state.shut_down {
				let pending = std::mem::take(&mut state.queue);
				drop(state);
				drop(pending);
				return None;
			}

			let now = self.now();
			if let Some((_, action)) = state.queue.pop_due(now) {
				return Some(action);
			}

			match state.queue.next_date() {
				Some(date) => {
					let _ = self
						.condvar
						.wait_for(&mut state, date.saturating_duration_since(now));
				}
				None => self.condvar.wait(&mut state),
			}
		}
	}
}

impl Scheduler for QueueScheduler {
	fn schedule(&self, action: Action) -> Option<AnyDisposable> {
		Some(self.enqueue(self.current_date(), action))
	}
}

impl DateScheduler for QueueScheduler {
	fn current_date(&self) -> Timestamp {
		self.0.shared.now()
	}

	fn schedule_after(&self, date: Timestamp, action: Action) -> Option<AnyDisposable> {
		Some(self.enqueue(date, action))
	}

	fn schedule_repeating(
		&self,
		date: Timestamp,
		interval: Duration,
		_leeway: Duration,
		action: RepeatingAction,
	) -> Option<AnyDisposable> {
		assert!(!interval.is_zero(), "Repetition interval must not be zero.");
		let serial = SerialDisposable::default();
		Self::repeat(&Arc::downgrade(&self.0), date, interval, &serial, action);
		Some(AnyDisposable::new(serial))
	}
}
