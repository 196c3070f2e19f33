//! An unordered, non-unique collection addressed through single-use [`RemovalToken`]s.

use std::{
	fmt::{self, Debug, Formatter},
	vec,
};

/// A uniquely identifying token for removing a value that was inserted into a [`Bag`].
///
/// Tokens are consumed by [`Bag::remove`], so a token can't be used twice.
/// A token whose value was already taken out by other means (e.g. [`Bag::drain`]) is *stale*,
/// and removing with it is a no-op.
#[must_use = "Without its token, a value can only be removed by draining the whole bag."]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RemovalToken {
	identifier: u64,
}

/// An unordered, non-unique collection of values of type `T`.
///
/// Iteration order is insertion order, but callers **should not** rely on this.
pub struct Bag<T> {
	elements: Vec<BagElement<T>>,
	next_identifier: u64,
	wrapped: bool,
}

struct BagElement<T> {
	value: T,
	identifier: u64,
}

impl<T> Default for Bag<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Bag<T> {
	/// Creates an empty [`Bag`].
	#[must_use]
	pub const fn new() -> Self {
		Self {
			elements: Vec::new(),
			next_identifier: 0,
			wrapped: false,
		}
	}

	/// Inserts `value` into `self`.
	///
	/// **Returns** a token that can later be passed to [`.remove`](`Bag::remove`).
	///
	/// # Panics
	///
	/// In debug builds, iff the identifier space wrapped around and collided with a live element.
	/// (That would take 2⁶⁴ insertions while one of the earliest values is still present.)
	pub fn insert(&mut self, value: T) -> RemovalToken {
		let identifier = self.next_identifier;
		if self.wrapped {
			debug_assert!(
				self.elements.iter().all(|e| e.identifier != identifier),
				"`Bag` identifier collision after wrap-around."
			);
		}

		let (next, overflowed) = identifier.overflowing_add(1);
		self.next_identifier = next;
		self.wrapped |= overflowed;

		self.elements.push(BagElement { value, identifier });
		RemovalToken { identifier }
	}

	/// Removes a value, given the token returned from [`.insert`](`Bag::insert`).
	///
	/// **Returns** the removed value, or [`None`] iff the token is stale.
	pub fn remove(&mut self, token: RemovalToken) -> Option<T> {
		// Removal is more likely for recent values than old ones.
		let index = self
			.elements
			.iter()
			.rposition(|e| e.identifier == token.identifier)?;
		Some(self.elements.remove(index).value)
	}

	/// The number of values currently in the [`Bag`].
	#[must_use]
	pub fn len(&self) -> usize {
		self.elements.len()
	}

	/// Whether the [`Bag`] is empty.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}

	/// Iterates over the live values.
	///
	/// The iterator borrows `self`, so the registry can't change underneath it.
	/// Callers that need to run callbacks **should** clone a snapshot instead.
	pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = &T> {
		self.elements.iter().map(|e| &e.value)
	}

	/// Removes all values, invalidating every outstanding [`RemovalToken`].
	pub fn drain(&mut self) -> impl '_ + ExactSizeIterator<Item = T> {
		self.elements.drain(..).map(|e| e.value)
	}
}

/// Owning iterator over the values of a [`Bag`].
pub struct IntoIter<T>(vec::IntoIter<BagElement<T>>);

impl<T> Iterator for IntoIter<T> {
	type Item = T;

	fn next(&mut self) -> Option<Self::Item> {
		self.0.next().map(|e| e.value)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.0.size_hint()
	}
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> IntoIterator for Bag<T> {
	type Item = T;
	type IntoIter = IntoIter<T>;

	fn into_iter(self) -> Self::IntoIter {
		IntoIter(self.elements.into_iter())
	}
}

impl<T> FromIterator<T> for Bag<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		let mut bag = Self::new();
		for value in iter {
			let _ = bag.insert(value);
		}
		bag
	}
}

impl<T: Debug> Debug for Bag<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}
