use std::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
	sync::{Arc, Weak},
	time::Duration,
};

use parking_lot::ReentrantMutex;
use tracing::trace;

use crate::{AnyDisposable, SerialDisposable};

use super::{Action, ActionQueue, DateScheduler, RepeatingAction, Scheduler, Timestamp};

/// A scheduler that implements virtualized time, for use in testing.
///
/// Nothing runs until the clock is moved with [`.advance()`](`TestScheduler::advance`),
/// [`.advance_by(…)`](`TestScheduler::advance_by`), [`.advance_to(…)`](`TestScheduler::advance_to`)
/// or [`.run()`](`TestScheduler::run`). Those run the due actions synchronously, in date order,
/// on the calling thread.
///
/// Cheaply [`Clone`]able. All clones share one clock.
///
/// # Threading
///
/// Advancing holds a reentrant lock for its whole duration, so actions **may** schedule further
/// actions or advance the clock themselves. Other threads that try to schedule while the clock
/// is being advanced block until it's done.
#[derive(Clone)]
pub struct TestScheduler(Arc<ReentrantMutex<RefCell<TestSchedulerState>>>);

#[derive(Debug)]
struct TestSchedulerState {
	current_date: Timestamp,
	queue: ActionQueue,
}

impl TestScheduler {
	/// Creates a scheduler whose clock starts at [`Timestamp::ZERO`].
	#[must_use]
	pub fn new() -> Self {
		Self::with_start_date(Timestamp::ZERO)
	}

	/// Creates a scheduler whose clock starts at `start_date`.
	#[must_use]
	pub fn with_start_date(start_date: Timestamp) -> Self {
		Self(Arc::new(ReentrantMutex::new(RefCell::new(
			TestSchedulerState {
				current_date: start_date,
				queue: ActionQueue::default(),
			},
		))))
	}

	/// The number of actions that have been scheduled but not yet run or cancelled.
	#[must_use]
	pub fn pending_count(&self) -> usize {
		self.0.lock().borrow().queue.len()
	}

	/// Advances the virtualized clock by an extremely tiny interval, dequeuing
	/// and executing any actions along the way.
	///
	/// This is intended to be used as a way to execute actions that have been
	/// scheduled to run as soon as possible.
	pub fn advance(&self) {
		self.advance_by(Duration::from_nanos(1));
	}

	/// Advances the virtualized clock by `interval`, dequeuing and executing any actions along the way.
	pub fn advance_by(&self, interval: Duration) {
		let lock = self.0.lock();
		let target = lock.borrow().current_date + interval;
		self.advance_to(target);
	}

	/// Advances the virtualized clock to `date`, dequeuing and executing any actions up until that point.
	///
	/// While each action runs, [`.current_date()`](`DateScheduler::current_date`) reports the date it was scheduled for.
	///
	/// # Panics
	///
	/// Iff `date` is earlier than the current date.
	pub fn advance_to(&self, date: Timestamp) {
		let lock = self.0.lock();
		assert!(
			lock.borrow().current_date <= date,
			"Can't advance a `TestScheduler` into the past. (Use `.rewind_by(…)` instead.)"
		);
		trace!(?date, "Advancing `TestScheduler`.");

		loop {
			let due = {
				let mut state = lock.borrow_mut();
				state.queue.pop_due(date).map(|(scheduled, action)| {
					state.current_date = scheduled;
					action
				})
			};
			match due {
				Some(action) => action(),
				None => break,
			}
		}

		lock.borrow_mut().current_date = date;
	}

	/// Dequeues and executes all scheduled actions, leaving the clock at [`Timestamp::DISTANT_FUTURE`].
	pub fn run(&self) {
		self.advance_to(Timestamp::DISTANT_FUTURE);
	}

	/// Rewinds the virtualized clock by `interval`, as if the system clock had been changed.
	///
	/// Pending actions keep their dates. The clock saturates at [`Timestamp::ZERO`].
	pub fn rewind_by(&self, interval: Duration) {
		let lock = self.0.lock();
		let mut state = lock.borrow_mut();
		state.current_date = state.current_date - interval;
	}

	fn enqueue(&self, date: Timestamp, action: Action) -> AnyDisposable {
		let key = self.0.lock().borrow_mut().queue.push(date, action);
		let weak = Arc::downgrade(&self.0);
		AnyDisposable::from_action(move || {
			if let Some(strong) = weak.upgrade() {
				let lock = strong.lock();
				let cancelled = lock.borrow_mut().queue.cancel(key);
				drop(cancelled);
			}
		})
	}

	fn repeat(
		weak: &Weak<ReentrantMutex<RefCell<TestSchedulerState>>>,
		date: Timestamp,
		interval: Duration,
		serial: &SerialDisposable,
		action: RepeatingAction,
	) {
		let Some(strong) = weak.upgrade() else {
			return;
		};
		let this = Self(strong);

		let next = {
			let weak = weak.clone();
			let serial = serial.clone();
			Box::new(move || {
				action();
				Self::repeat(&weak, date + interval, interval, &serial, action);
			})
		};
		serial.set_inner(Some(this.enqueue(date, next)));
	}
}

impl Default for TestScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for TestScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let lock = self.0.lock();
		let state = lock.try_borrow();
		f.debug_tuple("TestScheduler").field(&state).finish()
	}
}

impl Scheduler for TestScheduler {
	/// Enqueues `action` at the current virtual date.
	/// It runs on the next [`.advance()`](`TestScheduler::advance`) (or any other advancement).
	fn schedule(&self, action: Action) -> Option<AnyDisposable> {
		Some(self.enqueue(self.current_date(), action))
	}
}

impl DateScheduler for TestScheduler {
	fn current_date(&self) -> Timestamp {
		self.0.lock().borrow().current_date
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
