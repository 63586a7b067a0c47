//! Common contract for the mergeable queues
//!
//! - [`MergeableQueue`]: insert, peek, extract, update-key and merge, shared by
//!   the binomial, Fibonacci and pairing variants
//! - [`Handle`]: the per-variant token returned by `insert` that identifies one
//!   stored element, even when several elements hold equal values
//! - [`QueueError`]: the three ways an operation can fail

use crate::ordering::Direction;
use crate::storage::Relocation;
use std::fmt;
use std::hash::Hash;

/// Error type for queue operations
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueError {
    /// `peek` or `extract` on a queue with no elements
    #[error("queue is empty")]
    EmptyQueue,
    /// The handle does not name an element currently held by this queue
    #[error("element not found (extracted, merged away, or from another queue)")]
    KeyNotFound,
    /// The new key is less extreme than the current one for this direction
    #[error("new key moves away from the front of the queue")]
    InvalidDirection,
}

/// Result alias used throughout the crate
pub type Result<T, E = QueueError> = std::result::Result<T, E>;

pub(crate) mod sealed {
    use crate::storage::RawHandle;

    pub trait Sealed {
        fn raw(&self) -> RawHandle;
        fn from_raw(raw: RawHandle) -> Self;
    }
}

/// A handle to an element in a queue, used for `update_key` and `get`
///
/// Handles are cheap to copy and compare by identity, not by value. A handle
/// stays valid until its element is extracted or its queue is merged into
/// another one (see [`Relocation`]).
pub trait Handle: Copy + Eq + Hash + fmt::Debug + sealed::Sealed {}

/// Mergeable priority queue
///
/// Every variant is constructed with a [`Direction`]; the "extreme" element is
/// the minimum for [`Direction::Ascending`] and the maximum for
/// [`Direction::Descending`]. Mutating calls either complete with all
/// structural invariants restored or fail before touching the structure.
///
/// # Example
///
/// ```rust
/// use mergeable_queues::{Direction, FibonacciQueue, MergeableQueue, QueueError};
///
/// let mut queue = FibonacciQueue::with_direction(Direction::Descending);
/// let low = queue.insert(3);
/// queue.insert(7);
///
/// queue.update_key(&low, 9).unwrap();
/// assert_eq!(queue.peek(), Ok(&9));
/// assert_eq!(queue.update_key(&low, 1), Err(QueueError::InvalidDirection));
/// ```
pub trait MergeableQueue<T: Ord>: Sized {
    /// The handle type for this queue
    type Handle: Handle;

    /// Iterator over every held value, in unspecified order
    type Iter<'a>: Iterator<Item = &'a T>
    where
        Self: 'a,
        T: 'a;

    /// Creates an empty queue extracting in the given direction
    fn with_direction(direction: Direction) -> Self;

    /// Creates an empty min-queue
    fn new() -> Self {
        Self::with_direction(Direction::Ascending)
    }

    /// The direction this queue was built with
    fn direction(&self) -> Direction;

    /// Number of held values, duplicates counted individually
    fn len(&self) -> usize;

    /// True if the queue holds no values
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a value, returning a handle to it
    fn insert(&mut self, value: T) -> Self::Handle;

    /// The extreme value, without removing it
    ///
    /// # Errors
    /// [`QueueError::EmptyQueue`] if the queue is empty.
    fn peek(&self) -> Result<&T>;

    /// Removes and returns the extreme value
    ///
    /// # Errors
    /// [`QueueError::EmptyQueue`] if the queue is empty.
    fn extract(&mut self) -> Result<T>;

    /// Replaces the value behind `handle` with a value at least as extreme
    ///
    /// # Errors
    /// - [`QueueError::KeyNotFound`] if the handle is stale or foreign
    /// - [`QueueError::InvalidDirection`] if `new_value` is less extreme than
    ///   the current value; the queue is left unchanged
    fn update_key(&mut self, handle: &Self::Handle, new_value: T) -> Result<()>;

    /// The value currently behind `handle`, if it is still held
    fn get(&self, handle: &Self::Handle) -> Option<&T>;

    /// Moves every element of `other` into this queue
    ///
    /// The returned [`Relocation`] translates `other`'s handles.
    fn merge(&mut self, other: Self) -> Relocation<Self::Handle>;

    /// Iterates over every held value in unspecified order
    fn iter(&self) -> Self::Iter<'_>;

    /// Extracts every value, front first
    fn drain_sorted(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        while let Ok(value) = self.extract() {
            out.push(value);
        }
        out
    }
}

/// Implements the handle boilerplate for a queue's public handle type
macro_rules! queue_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name($crate::storage::RawHandle);

        impl $crate::traits::sealed::Sealed for $name {
            fn raw(&self) -> $crate::storage::RawHandle {
                self.0
            }

            fn from_raw(raw: $crate::storage::RawHandle) -> Self {
                $name(raw)
            }
        }

        impl $crate::traits::Handle for $name {}
    };
}

pub(crate) use queue_handle;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(QueueError::EmptyQueue.to_string(), "queue is empty");
        assert!(QueueError::KeyNotFound.to_string().contains("not found"));
        assert!(QueueError::InvalidDirection
            .to_string()
            .contains("away from the front"));
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<QueueError>();
    }
}
