#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Every [`Signal`] serializes its own deliveries, so an [`Observer`] never runs concurrently
//! with itself for events from the same signal. Deliveries of *distinct* signals are not
//! serialized with respect to each other.
//!
//! Delivery holds a reentrant lock, so an observer **may** send further events into the signal
//! that is currently calling it. Those are delivered recursively, before the outer event reaches
//! the remaining observers.
//!
//! Two signals whose observers send into each other from different threads **can** deadlock.

pub mod event;
pub mod flatten;
pub mod observer;
pub mod producer;
pub mod signal;
pub mod stream;

mod combine;
mod error;
mod operators;
mod replay;
mod time;

pub use event::{Event, NoError};
pub use error::WaitError;
pub use flatten::FlattenStrategy;
pub use observer::Observer;
pub use producer::SignalProducer;
pub use signal::Signal;
pub use stream::EventStream;

pub use streambed::{
	scheduler, AnyDisposable, CompositeDisposable, Disposable, DisposableHandle, Lifetime,
	LifetimeToken, ScopedDisposable, SerialDisposable,
};

/// Shorthand for the bounds of values and errors that can travel through a [`Signal`].
///
/// Events are multicast, so payloads are cloned once per observer.
/// They also cross threads freely, and may be retained by producers between starts.
pub trait Payload: 'static + Send + Sync + Clone {}
impl<T: 'static + Send + Sync + Clone> Payload for T {}

#[doc = include_str!("../README.md")]
mod readme {}
