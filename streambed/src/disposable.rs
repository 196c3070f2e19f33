//! Cancellation and resource release.
//!
//! Every disposable has exactly two states, *active* and *disposed*, and [`Disposable::dispose`]
//! moves it from the former to the latter exactly once. Further calls are no-ops.
//!
//! All concrete disposables here are cheaply [`Clone`]able handles to shared state, so that one
//! clone can be kept for cancellation while another is handed to a [`CompositeDisposable`].

use std::{
	fmt::{self, Debug, Formatter},
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Weak,
	},
};

use tracing::warn;

use crate::{Atomic, Bag, RemovalToken};

/// Represents something that can be "disposed", usually associated with freeing
/// resources or canceling work.
///
/// # Logic
///
/// [`.dispose()`](`Disposable::dispose`) **must** be idempotent and callable from any thread.
/// Once it returns, [`.is_disposed()`](`Disposable::is_disposed`) **must** return `true`.
pub trait Disposable: Send + Sync {
	/// Whether this disposable has been disposed already.
	fn is_disposed(&self) -> bool;

	/// Disposes of the resource or cancels the work. Idempotent.
	fn dispose(&self);

	/// Type-erases `self`.
	///
	/// [`AnyDisposable`] overrides this to avoid wrapping itself again.
	fn into_any(self) -> AnyDisposable
	where
		Self: 'static + Sized,
	{
		AnyDisposable(Arc::new(self))
	}
}

impl<D: ?Sized + Disposable> Disposable for Arc<D> {
	fn is_disposed(&self) -> bool {
		(**self).is_disposed()
	}

	fn dispose(&self) {
		(**self).dispose();
	}
}

impl<D: ?Sized + Disposable> Disposable for Box<D> {
	fn is_disposed(&self) -> bool {
		(**self).is_disposed()
	}

	fn dispose(&self) {
		(**self).dispose();
	}
}

/// A type-erased, cheaply cloneable [`Disposable`].
#[derive(Clone)]
pub struct AnyDisposable(Arc<dyn Disposable>);

impl AnyDisposable {
	/// Type-erases `disposable`.
	pub fn new(disposable: impl 'static + Disposable) -> Self {
		disposable.into_any()
	}

	/// Shorthand for an [`ActionDisposable`] running `action`.
	pub fn from_action(action: impl 'static + Send + FnOnce()) -> Self {
		ActionDisposable::new(action).into_any()
	}
}

impl Disposable for AnyDisposable {
	fn is_disposed(&self) -> bool {
		self.0.is_disposed()
	}

	fn dispose(&self) {
		self.0.dispose();
	}

	fn into_any(self) -> AnyDisposable {
		self
	}
}

impl Debug for AnyDisposable {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("AnyDisposable")
			.field("is_disposed", &self.is_disposed())
			.finish_non_exhaustive()
	}
}

/// A disposable that only flips [`is_disposed`](`Disposable::is_disposed`) upon disposal,
/// and performs no other work.
#[derive(Debug, Clone, Default)]
pub struct SimpleDisposable(Arc<AtomicBool>);

impl SimpleDisposable {
	/// Creates an active [`SimpleDisposable`].
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

impl Disposable for SimpleDisposable {
	fn is_disposed(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}

	fn dispose(&self) {
		self.0.store(true, Ordering::Release);
	}
}

type BoxedAction = Box<dyn 'static + Send + FnOnce()>;

/// A disposable that will run an action upon disposal.
///
/// The action runs at most once, outside of any lock, and is dropped afterwards.
#[derive(Clone)]
pub struct ActionDisposable(Arc<Atomic<Option<BoxedAction>>>);

impl ActionDisposable {
	/// Initializes the disposable to run the given action upon disposal.
	pub fn new(action: impl 'static + Send + FnOnce()) -> Self {
		Self(Arc::new(Atomic::new(Some(Box::new(action)))))
	}
}

impl Disposable for ActionDisposable {
	fn is_disposed(&self) -> bool {
		self.0.with_value(Option::is_none)
	}

	fn dispose(&self) {
		if let Some(action) = self.0.swap(None) {
			action();
		}
	}
}

impl Debug for ActionDisposable {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActionDisposable")
			.field("is_disposed", &self.is_disposed())
			.finish_non_exhaustive()
	}
}

/// A disposable that will dispose of any number of other disposables.
///
/// Disposables added after the composite was disposed are disposed immediately.
#[derive(Clone, Default)]
pub struct CompositeDisposable(Arc<CompositeState>);

struct CompositeState {
	/// [`None`] once disposed.
	disposables: Atomic<Option<Bag<AnyDisposable>>>,
}

impl Default for CompositeState {
	fn default() -> Self {
		Self {
			disposables: Atomic::new(Some(Bag::new())),
		}
	}
}

impl CompositeDisposable {
	/// Creates an empty, active [`CompositeDisposable`].
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an active [`CompositeDisposable`] containing the given disposables.
	pub fn with_disposables<D: 'static + Disposable>(disposables: impl IntoIterator<Item = D>) -> Self {
		let bag = disposables.into_iter().map(Disposable::into_any).collect();
		Self(Arc::new(CompositeState {
			disposables: Atomic::new(Some(bag)),
		}))
	}

	/// Adds the given disposable to the composite.
	///
	/// **Returns** a handle which can be used to opaquely remove the disposable later (if desired).
	/// Iff the composite is already disposed, `disposable` is disposed right away and the
	/// returned handle is inert.
	pub fn add(&self, disposable: impl 'static + Disposable) -> DisposableHandle {
		let disposable = disposable.into_any();
		let token = self.0.disposables.modify(|disposables| {
			disposables
				.as_mut()
				.map(|bag| bag.insert(disposable.clone()))
		});

		match token {
			Some(token) => DisposableHandle {
				token: Atomic::new(Some(token)),
				composite: Arc::downgrade(&self.0),
			},
			None => {
				disposable.dispose();
				DisposableHandle::inert()
			}
		}
	}

	/// Adds an [`ActionDisposable`] running `action` to the composite.
	pub fn add_action(&self, action: impl 'static + Send + FnOnce()) -> DisposableHandle {
		self.add(ActionDisposable::new(action))
	}

	/// The number of disposables currently held.
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.disposables.with_value(|d| d.as_ref().map_or(0, Bag::len))
	}

	/// Whether no disposables are currently held.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Disposable for CompositeDisposable {
	fn is_disposed(&self) -> bool {
		self.0.disposables.with_value(Option::is_none)
	}

	fn dispose(&self) {
		let Some(disposables) = self.0.disposables.swap(None) else {
			return;
		};

		for disposable in disposables {
			if catch_unwind(AssertUnwindSafe(|| disposable.dispose())).is_err() {
				warn!("A disposable panicked while its `CompositeDisposable` was disposed. Continuing with the rest.");
			}
		}
	}
}

impl Debug for CompositeDisposable {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("CompositeDisposable")
			.field("is_disposed", &self.is_disposed())
			.field("len", &self.len())
			.finish()
	}
}

/// Represents a handle to a disposable previously added to a [`CompositeDisposable`].
///
/// Dropping the handle does **not** remove the disposable.
pub struct DisposableHandle {
	token: Atomic<Option<RemovalToken>>,
	composite: Weak<CompositeState>,
}

impl DisposableHandle {
	/// A handle that refers to nothing. [`.remove()`](`DisposableHandle::remove`) is a no-op.
	#[must_use]
	pub fn inert() -> Self {
		Self {
			token: Atomic::new(None),
			composite: Weak::new(),
		}
	}

	/// Removes the pointed-to disposable from its [`CompositeDisposable`] *without* disposing it.
	///
	/// This is useful to minimize memory growth, by removing disposables that are no longer needed.
	/// Idempotent.
	pub fn remove(&self) {
		let Some(token) = self.token.swap(None) else {
			return;
		};
		if let Some(composite) = self.composite.upgrade() {
			let removed = composite
				.disposables
				.modify(|disposables| disposables.as_mut().and_then(|bag| bag.remove(token)));
			// Dropped outside the lock, since dropping may release arbitrary resources.
			drop(removed);
		}
	}
}

impl Debug for DisposableHandle {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("DisposableHandle")
			.field("attached", &self.token.with_value(Option::is_some))
			.finish_non_exhaustive()
	}
}

/// A disposable that will optionally dispose of another disposable.
///
/// Whenever the inner disposable is assigned (even to the same value!),
/// the previous one is disposed.
#[derive(Clone, Default)]
pub struct SerialDisposable(Arc<Atomic<SerialState>>);

#[derive(Default)]
struct SerialState {
	inner: Option<AnyDisposable>,
	disposed: bool,
}

impl SerialDisposable {
	/// Initializes the receiver to dispose of `inner` when the [`SerialDisposable`] is disposed.
	#[must_use]
	pub fn new(inner: Option<AnyDisposable>) -> Self {
		let this = Self::default();
		this.set_inner(inner);
		this
	}

	/// The current inner disposable, if any.
	#[must_use]
	pub fn inner(&self) -> Option<AnyDisposable> {
		self.0.with_value(|state| state.inner.clone())
	}

	/// Replaces the inner disposable, disposing the previous one unconditionally.
	///
	/// Iff `self` is already disposed, `inner` is disposed immediately, too.
	pub fn set_inner(&self, inner: Option<AnyDisposable>) {
		let (previous, disposed) = self.0.modify(|state| {
			if state.disposed {
				(None, true)
			} else {
				(std::mem::replace(&mut state.inner, inner.clone()), false)
			}
		});

		if let Some(previous) = previous {
			dispose_replaced(&previous);
		}
		if disposed {
			if let Some(inner) = inner {
				dispose_replaced(&inner);
			}
		}
	}
}

/// Disposes a replaced inner disposable, logging a panic instead of unwinding into the caller.
fn dispose_replaced(disposable: &AnyDisposable) {
	if catch_unwind(AssertUnwindSafe(|| disposable.dispose())).is_err() {
		warn!("A disposable panicked while it was replaced in a `SerialDisposable`. Continuing.");
	}
}

impl Disposable for SerialDisposable {
	fn is_disposed(&self) -> bool {
		self.0.with_value(|state| state.disposed)
	}

	fn dispose(&self) {
		let inner = self.0.modify(|state| {
			state.disposed = true;
			state.inner.take()
		});
		if let Some(inner) = inner {
			inner.dispose();
		}
	}
}

impl Debug for SerialDisposable {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		self.0.with_value(|state| {
			f.debug_struct("SerialDisposable")
				.field("inner", &state.inner)
				.field("disposed", &state.disposed)
				.finish()
		})
	}
}

/// A disposable that, when dropped, will automatically dispose of another disposable.
///
/// This ties the wrapped disposable to the ownership of whatever holds the [`ScopedDisposable`].
#[must_use = "A `ScopedDisposable` disposes its contents when dropped."]
pub struct ScopedDisposable<D: Disposable> {
	inner: Option<D>,
}

impl<D: Disposable> ScopedDisposable<D> {
	/// Initializes the receiver to dispose of `inner` when dropped.
	pub fn new(inner: D) -> Self {
		Self { inner: Some(inner) }
	}

	/// The wrapped disposable.
	pub fn inner(&self) -> &D {
		self.inner.as_ref().expect("only taken in `into_inner` and `drop`")
	}

	/// Defuses the [`ScopedDisposable`], returning the wrapped disposable without disposing it.
	#[must_use]
	pub fn into_inner(mut self) -> D {
		self.inner.take().expect("only taken in `into_inner` and `drop`")
	}
}

impl<D: Disposable> Disposable for ScopedDisposable<D> {
	fn is_disposed(&self) -> bool {
		self.inner().is_disposed()
	}

	fn dispose(&self) {
		self.inner().dispose();
	}
}

impl<D: Disposable> Drop for ScopedDisposable<D> {
	fn drop(&mut self) {
		if let Some(inner) = self.inner.take() {
			inner.dispose();
		}
	}
}

impl<D: Disposable + Debug> Debug for ScopedDisposable<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ScopedDisposable").field(&self.inner).finish()
	}
}
