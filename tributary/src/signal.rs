//! Hot, multicast event streams.

use std::{
	fmt::{self, Debug, Formatter},
	mem,
	sync::Arc,
};

use parking_lot::{Mutex, ReentrantMutex};
use streambed::{AnyDisposable, Bag, Lifetime, LifetimeToken, RemovalToken};
use tracing::{debug, trace};

use crate::{Event, Observer, Payload};

/// A push-driven stream that sends [`Event`]s over time, parameterized by the type of values
/// being sent (`T`) and the type of failure that can occur (`E`).
///
/// Signals are *hot*: the generator passed to [`Signal::new`] runs right away, whether or not
/// anyone is observing. Observers only see events sent after they were attached.
///
/// # Logic
///
/// Events are delivered one at a time. The first terminating event wins, is delivered to every
/// observer attached at that point, and then releases all observers along with the generator's
/// [`Lifetime`]. Terminating events sent after that are ignored.
///
/// A signal is kept alive by its handles *and* by its observers. Once neither is left, it's
/// interrupted silently and its generator's [`Lifetime`] ends. Iff instead every handle *and*
/// every input [`Observer`] is dropped while observers remain, those observers receive
/// [`Interrupted`](`Event::Interrupted`).
///
/// # Threading
///
/// Disposing an observation from another thread while an event is in flight **may** still let
/// that one event reach the observer. No further events are delivered after that.
pub struct Signal<T: Payload, E: Payload> {
	core: Arc<SignalCore<T, E>>,
}

struct SignalCore<T, E> {
	/// Serializes deliveries.
	delivery: ReentrantMutex<()>,
	state: Mutex<CoreState<T, E>>,
}

struct CoreState<T, E> {
	handles: usize,
	status: Status<T, E>,
}

enum Status<T, E> {
	Alive {
		observers: Bag<Observer<T, E>>,
		generator: LifetimeToken,
	},
	/// Remembers the terminating event for [`Signal::observe_during`].
	Terminated(Event<T, E>),
}

impl<T, E> CoreState<T, E> {
	/// Moves to [`Status::Terminated`] iff still alive.
	///
	/// **Returns** the released observers and the generator's [`LifetimeToken`],
	/// which **should** be dropped outside the lock.
	fn terminate(&mut self, event: Event<T, E>) -> Option<(Bag<Observer<T, E>>, LifetimeToken)> {
		match mem::replace(&mut self.status, Status::Terminated(event)) {
			Status::Alive {
				observers,
				generator,
			} => Some((observers, generator)),
			terminated @ Status::Terminated(_) => {
				self.status = terminated;
				None
			}
		}
	}

	/// Terminates the signal iff nothing can observe it anymore.
	fn release_if_unused(&mut self) -> Option<LifetimeToken> {
		let unused = self.handles == 0
			&& matches!(&self.status, Status::Alive { observers, .. } if observers.is_empty());
		if !unused {
			return None;
		}

		trace!("Interrupting a `Signal` without handles or observers.");
		self.terminate(Event::Interrupted)
			.map(|(_, generator)| generator)
	}
}

impl<T: Payload, E: Payload> SignalCore<T, E> {
	fn send(&self, event: Event<T, E>) {
		let _delivery = self.delivery.lock();

		if event.is_terminating() {
			let terminated = self.state.lock().terminate(event.clone());
			let Some((observers, generator)) = terminated else {
				debug!("Ignored a terminating event sent to a `Signal` that has already terminated.");
				return;
			};

			for observer in observers {
				observer.send(event.clone());
			}
			generator.end();
		} else {
			let observers: Vec<Observer<T, E>> = match &self.state.lock().status {
				Status::Alive { observers, .. } => observers.iter().cloned().collect(),
				Status::Terminated(_) => return,
			};

			for observer in observers {
				// An earlier observer may have terminated the signal reentrantly.
				if matches!(self.state.lock().status, Status::Terminated(_)) {
					break;
				}
				observer.send(event.clone());
			}
		}
	}
}

impl<T, E> Drop for SignalCore<T, E> {
	fn drop(&mut self) {
		if let Some((observers, generator)) = self.state.get_mut().terminate(Event::Interrupted) {
			trace!("Interrupting an abandoned `Signal`.");
			for observer in observers {
				observer.send(Event::Interrupted);
			}
			generator.end();
		}
	}
}

impl<T: Payload, E: Payload> Signal<T, E> {
	/// Creates the signal core together with its input.
	pub(crate) fn make() -> (Self, Observer<T, E>, Lifetime) {
		let (lifetime, generator) = Lifetime::make();
		let core = Arc::new(SignalCore {
			delivery: ReentrantMutex::new(()),
			state: Mutex::new(CoreState {
				handles: 1,
				status: Status::Alive {
					observers: Bag::new(),
					generator,
				},
			}),
		});
		let input = Observer::new({
			let core = Arc::clone(&core);
			move |event| core.send(event)
		});
		(Self { core }, input, lifetime)
	}

	/// Creates a signal and immediately runs `generator`.
	///
	/// `generator` receives the signal's input, into which events **should** be sent according
	/// to the [`Event`] grammar, and a [`Lifetime`] that ends as soon as the signal terminates.
	/// Work started by the generator **should** be tied to that lifetime.
	pub fn new(generator: impl FnOnce(Observer<T, E>, &Lifetime)) -> Self {
		let (signal, input, lifetime) = Self::make();
		generator(input, &lifetime);
		signal
	}

	/// Creates a signal that can be controlled by sending events to the returned [`Observer`].
	///
	/// Dropping every handle to the signal **and** every clone of the input interrupts the
	/// signal's remaining observers.
	#[must_use]
	pub fn pipe() -> (Self, Observer<T, E>) {
		let (signal, input, _) = Self::make();
		(signal, input)
	}

	/// A signal that never sends any events to its observers.
	#[must_use]
	pub fn never() -> Self {
		Self::new(|input, lifetime| {
			// Parked until the signal is released.
			let _ = lifetime.observe_ended(move || drop(input));
		})
	}

	/// A signal that is already [`Interrupted`](`Event::Interrupted`) when created.
	#[must_use]
	pub fn empty() -> Self {
		Self::new(|input, _| input.send_interrupted())
	}

	/// Whether the signal has terminated.
	#[must_use]
	pub fn has_terminated(&self) -> bool {
		matches!(self.core.state.lock().status, Status::Terminated(_))
	}

	/// Observes the signal with `observer`.
	///
	/// **Returns** a disposable that detaches `observer` again,
	/// or [`None`] iff the signal has already terminated. In that case, `observer` is not invoked.
	pub fn observe(&self, observer: Observer<T, E>) -> Option<AnyDisposable> {
		let token = match &mut self.core.state.lock().status {
			Status::Alive { observers, .. } => observers.insert(observer),
			Status::Terminated(_) => return None,
		};

		Some(self.detach(token))
	}

	/// A disposable that removes the observer registered under `token`.
	fn detach(&self, token: RemovalToken) -> AnyDisposable {
		let core = Arc::downgrade(&self.core);
		AnyDisposable::from_action(move || {
			let Some(core) = core.upgrade() else {
				return;
			};
			let (removed, generator) = {
				let mut state = core.state.lock();
				let removed = match &mut state.status {
					Status::Alive { observers, .. } => observers.remove(token),
					Status::Terminated(_) => None,
				};
				(removed, state.release_if_unused())
			};
			drop(removed);
			drop(generator);
		})
	}

	/// Observes [`Next`](`Event::Next`) values only.
	pub fn observe_values(
		&self,
		action: impl 'static + Send + Sync + Fn(T),
	) -> Option<AnyDisposable> {
		self.observe(Observer::new(move |event| {
			if let Event::Next(value) = event {
				action(value);
			}
		}))
	}

	/// Observes [`Failed`](`Event::Failed`) only.
	pub fn observe_failed(
		&self,
		action: impl 'static + Send + Sync + Fn(E),
	) -> Option<AnyDisposable> {
		self.observe(Observer::new(move |event| {
			if let Event::Failed(error) = event {
				action(error);
			}
		}))
	}

	/// Observes [`Completed`](`Event::Completed`) only.
	pub fn observe_completed(
		&self,
		action: impl 'static + Send + Sync + Fn(),
	) -> Option<AnyDisposable> {
		self.observe(Observer::new(move |event| {
			if let Event::Completed = event {
				action();
			}
		}))
	}

	/// Observes [`Interrupted`](`Event::Interrupted`) only.
	pub fn observe_interrupted(
		&self,
		action: impl 'static + Send + Sync + Fn(),
	) -> Option<AnyDisposable> {
		self.observe(Observer::new(move |event| {
			if let Event::Interrupted = event {
				action();
			}
		}))
	}

	/// Observes values as [`Ok`] and failure as [`Err`]. Other terminating events are skipped.
	pub fn observe_result(
		&self,
		action: impl 'static + Send + Sync + Fn(Result<T, E>),
	) -> Option<AnyDisposable> {
		self.observe(Observer::new(move |event| match event {
			Event::Next(value) => action(Ok(value)),
			Event::Failed(error) => action(Err(error)),
			Event::Completed | Event::Interrupted => (),
		}))
	}

	/// Observes the signal with `observer` until `lifetime` ends.
	///
	/// The observation is attached to `lifetime`. It keeps `self` alive like any other observer,
	/// so `self` is still interrupted iff its inputs and handles are all dropped.
	///
	/// Unlike with [`.observe(…)`](`Signal::observe`), iff the signal has already terminated,
	/// `observer` receives the terminating event right away. This keeps operator chains
	/// well-formed even when an operator terminates its output during construction.
	pub fn observe_during(&self, lifetime: &Lifetime, observer: Observer<T, E>) {
		let observation = {
			let mut state = self.core.state.lock();
			match &mut state.status {
				Status::Alive { observers, .. } => Ok(observers.insert(observer)),
				Status::Terminated(event) => Err((observer, event.clone())),
			}
		};

		match observation {
			Ok(token) => {
				let _ = lifetime.add(self.detach(token));
			}
			Err((observer, event)) => observer.send(event),
		}
	}

	/// Derives a signal whose generator observes `self` for as long as the derived signal lives.
	///
	/// `make_observer` receives the derived signal's input.
	pub(crate) fn derive<U: Payload, F: Payload>(
		&self,
		make_observer: impl FnOnce(Observer<U, F>, &Lifetime) -> Observer<T, E>,
	) -> Signal<U, F> {
		Signal::new(|input, lifetime| {
			let observer = make_observer(input, lifetime);
			self.observe_during(lifetime, observer);
		})
	}

	/// Forwards events from `self` until `lifetime` ends, then [completes](`Event::Completed`).
	#[must_use]
	pub fn take_during(&self, lifetime: &Lifetime) -> Self {
		let lifetime = lifetime.clone();
		self.derive(move |input: Observer<T, E>, own| {
			let handle = lifetime.observe_ended({
				let input = input.clone();
				move || input.send_completed()
			});
			let _ = own.observe_ended(move || handle.remove());
			input
		})
	}
}

impl<T: Payload, E: Payload> Clone for Signal<T, E> {
	fn clone(&self) -> Self {
		self.core.state.lock().handles += 1;
		Self {
			core: Arc::clone(&self.core),
		}
	}
}

impl<T: Payload, E: Payload> Drop for Signal<T, E> {
	fn drop(&mut self) {
		let generator = {
			let mut state = self.core.state.lock();
			state.handles -= 1;
			state.release_if_unused()
		};
		drop(generator);
	}
}

impl<T: Payload, E: Payload> Debug for Signal<T, E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.core.state.lock();
		let mut debug = f.debug_struct("Signal");
		match &state.status {
			Status::Alive { observers, .. } => debug.field("observers", &observers.len()),
			Status::Terminated(_) => debug.field("terminated", &true),
		};
		debug.finish_non_exhaustive()
	}
}
