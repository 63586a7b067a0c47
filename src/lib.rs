//! Mergeable Priority Queues for Rust
//!
//! This crate provides three addressable, mergeable priority queues that share
//! one contract, [`MergeableQueue`]. Each queue is built with a [`Direction`]
//! and serves as a min-queue or a max-queue from the same code.
//!
//! # Features
//!
//! - **Binomial Queue**: O(log n) insert, extract, update_key and merge; eager restructuring
//! - **Fibonacci Queue**: O(1) amortized insert, update_key and merge; O(log n) amortized extract
//! - **Pairing Queue**: O(1) insert and merge; O(log n) amortized extract; o(log n) amortized update_key
//! - **Indexed Queue**: any of the above, addressable by value instead of by handle
//!
//! `insert` returns a handle naming the element, so `update_key` works even
//! when several elements hold equal values. `update_key` only moves a value
//! toward the front (decrease-key for a min-queue, increase-key for a
//! max-queue).
//!
//! # Example
//!
//! ```rust
//! use mergeable_queues::fibonacci::FibonacciQueue;
//! use mergeable_queues::MergeableQueue;
//!
//! let mut queue = FibonacciQueue::new();
//! let handle1 = queue.insert(5);
//! let _handle2 = queue.insert(3);
//! queue.update_key(&handle1, 1).unwrap();
//! assert_eq!(queue.peek(), Ok(&1));
//! ```

pub mod binomial;
pub mod fibonacci;
pub mod index;
pub mod ordering;
pub mod pairing;
mod storage;
pub mod traits;

// Re-export the main types for convenience
pub use binomial::{BinomialHandle, BinomialQueue};
pub use fibonacci::{FibonacciHandle, FibonacciQueue};
pub use index::IndexedQueue;
pub use ordering::{Direction, OrderingPolicy, ParseDirectionError};
pub use pairing::{PairingHandle, PairingQueue};
pub use storage::Relocation;
pub use traits::{Handle, MergeableQueue, QueueError, Result};
