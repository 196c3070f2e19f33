#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Every type in this crate is [`Send`] and [`Sync`] where its contents allow it,
//! but *none* of the locks here are reentrant unless documented otherwise.
//! Calling back into an [`Atomic`] from within one of its own closures **will** deadlock.

pub mod atomic;
pub mod bag;
pub mod disposable;
pub mod lifetime;
pub mod scheduler;

pub use atomic::Atomic;
pub use bag::{Bag, RemovalToken};
pub use disposable::{
	ActionDisposable, AnyDisposable, CompositeDisposable, Disposable, DisposableHandle,
	ScopedDisposable, SerialDisposable, SimpleDisposable,
};
pub use lifetime::{Lifetime, LifetimeToken};

#[doc = include_str!("../README.md")]
mod readme {}
