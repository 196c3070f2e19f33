//! Execution contexts.
//!
//! Schedulers are always passed explicitly. There is no ambient "main" scheduler.
//!
//! - [`ImmediateScheduler`] runs actions synchronously on the calling thread.
//! - [`QueueScheduler`] runs actions serially on a dedicated worker thread, honoring dates.
//! - [`TestScheduler`] runs actions in virtual time, advanced manually by tests.

use std::{
	collections::BTreeMap,
	fmt::{self, Debug, Formatter},
	ops::{Add, Sub},
	sync::Arc,
	time::Duration,
};

use crate::AnyDisposable;

mod immediate;
pub use immediate::ImmediateScheduler;

#[cfg(feature = "queue_scheduler")]
mod queue;
#[cfg(feature = "queue_scheduler")]
pub use queue::QueueScheduler;

#[cfg(feature = "test_scheduler")]
mod virtual_time;
#[cfg(feature = "test_scheduler")]
pub use virtual_time::TestScheduler;

/// A one-shot unit of work.
pub type Action = Box<dyn 'static + Send + FnOnce()>;

/// A unit of work that can run any number of times.
pub type RepeatingAction = Arc<dyn 'static + Send + Sync + Fn()>;

/// A point in time, measured from a scheduler-specific epoch.
///
/// Real-time schedulers measure from their creation. Virtual-time schedulers start at [`Timestamp::ZERO`]
/// unless configured otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
	/// The epoch.
	pub const ZERO: Self = Self(Duration::ZERO);

	/// A date after any date that can be reached by adding realistic intervals.
	pub const DISTANT_FUTURE: Self = Self(Duration::MAX);

	/// The [`Timestamp`] `duration` after the epoch.
	#[must_use]
	pub const fn from_duration(duration: Duration) -> Self {
		Self(duration)
	}

	/// The time since the epoch.
	#[must_use]
	pub const fn as_duration(self) -> Duration {
		self.0
	}

	/// The time elapsed from `earlier` to `self`, or [`Duration::ZERO`] iff `earlier` is later.
	#[must_use]
	pub fn saturating_duration_since(self, earlier: Self) -> Duration {
		self.0.saturating_sub(earlier.0)
	}
}

/// Saturates at [`Timestamp::DISTANT_FUTURE`].
impl Add<Duration> for Timestamp {
	type Output = Self;

	fn add(self, rhs: Duration) -> Self::Output {
		Self(self.0.saturating_add(rhs))
	}
}

/// Saturates at [`Timestamp::ZERO`].
impl Sub<Duration> for Timestamp {
	type Output = Self;

	fn sub(self, rhs: Duration) -> Self::Output {
		Self(self.0.saturating_sub(rhs))
	}
}

/// Represents a serial queue of work items.
///
/// # Logic
///
/// Actions scheduled from the same thread **must** run in the order they were scheduled.
pub trait Scheduler: Send + Sync {
	/// Enqueues an action on the scheduler.
	///
	/// When the work is executed depends on the scheduler in use.
	///
	/// **Returns** a disposable that can be used to cancel the work before it begins, where supported.
	fn schedule(&self, action: Action) -> Option<AnyDisposable>;
}

/// A particular kind of scheduler that supports enqueuing actions at future dates.
///
/// # Logic
///
/// Actions **must** run in ascending date order, ties broken by scheduling order.
pub trait DateScheduler: Scheduler {
	/// The current date, as the scheduler understands it.
	fn current_date(&self) -> Timestamp;

	/// Schedules an action for execution at or after the given date.
	///
	/// **Returns** a disposable that can be used to cancel the work before it begins, where supported.
	fn schedule_after(&self, date: Timestamp, action: Action) -> Option<AnyDisposable>;

	/// Schedules an action for execution `delay` after [`.current_date()`](`DateScheduler::current_date`).
	fn schedule_after_delay(&self, delay: Duration, action: Action) -> Option<AnyDisposable> {
		self.schedule_after(self.current_date() + delay, action)
	}

	/// Schedules a recurring action at the given interval, beginning at the given date.
	///
	/// `leeway` is a hint of how much the scheduler may defer each repetition.
	///
	/// # Panics
	///
	/// Iff `interval` is zero.
	fn schedule_repeating(
		&self,
		date: Timestamp,
		interval: Duration,
		leeway: Duration,
		action: RepeatingAction,
	) -> Option<AnyDisposable>;
}

impl<S: ?Sized + Scheduler> Scheduler for Arc<S> {
	fn schedule(&self, action: Action) -> Option<AnyDisposable> {
		(**self).schedule(action)
	}
}

impl<S: ?Sized + DateScheduler> DateScheduler for Arc<S> {
	fn current_date(&self) -> Timestamp {
		(**self).current_date()
	}

	fn schedule_after(&self, date: Timestamp, action: Action) -> Option<AnyDisposable> {
		(**self).schedule_after(date, action)
	}

	fn schedule_repeating(
		&self,
		date: Timestamp,
		interval: Duration,
		leeway: Duration,
		action: RepeatingAction,
	) -> Option<AnyDisposable> {
		(**self).schedule_repeating(date, interval, leeway, action)
	}
}

/// Pending actions, ordered by date and then by insertion.
#[cfg_attr(
	not(any(feature = "queue_scheduler", feature = "test_scheduler")),
	allow(dead_code)
)]
#[derive(Default)]
struct ActionQueue {
	pending: BTreeMap<ActionKey, Action>,
	next_sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ActionKey {
	date: Timestamp,
	sequence: u64,
}

#[cfg_attr(
	not(any(feature = "queue_scheduler", feature = "test_scheduler")),
	allow(dead_code)
)]
impl ActionQueue {
	fn push(&mut self, date: Timestamp, action: Action) -> ActionKey {
		let key = ActionKey {
			date,
			sequence: self.next_sequence,
		};
		self.next_sequence += 1;
		self.pending.insert(key, action);
		key
	}

	fn cancel(&mut self, key: ActionKey) -> Option<Action> {
		self.pending.remove(&key)
	}

	fn next_date(&self) -> Option<Timestamp> {
		self.pending.keys().next().map(|key| key.date)
	}

	/// Removes the earliest action iff it's due at or before `now`.
	fn pop_due(&mut self, now: Timestamp) -> Option<(Timestamp, Action)> {
		if self.next_date()? > now {
			return None;
		}
		self.pending
			.pop_first()
			.map(|(ActionKey { date, .. }, action)| (date, action))
	}

	fn len(&self) -> usize {
		self.pending.len()
	}
}

impl Debug for ActionQueue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.pending.keys()).finish()
	}
}
