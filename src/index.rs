//! Value-addressed wrapper over any mergeable queue
//!
//! [`IndexedQueue`] keeps a map from each held value to the handles of the
//! nodes that currently hold it, so callers that only know a value (not the
//! handle `insert` returned) can still update its key. Equal values are
//! distinct occurrences; `update_key` always picks the oldest live one.
//!
//! # Example
//!
//! ```rust
//! use mergeable_queues::index::IndexedQueue;
//! use mergeable_queues::binomial::BinomialQueue;
//!
//! let mut queue: IndexedQueue<i32, BinomialQueue<i32>> = IndexedQueue::new();
//! queue.insert(5);
//! queue.insert(8);
//! queue.insert(8);
//!
//! queue.update_key(&8, 1).unwrap();
//! assert_eq!(queue.count_of(&8), 1);
//! assert_eq!(queue.extract(), Ok(1));
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ordering::Direction;
use crate::traits::{MergeableQueue, QueueError, Result};

/// A mergeable queue whose elements can be addressed by value
///
/// # Type Parameters
/// - `T`: The value type; hashed to find the nodes holding a value
/// - `Q`: The underlying queue (e.g. `FibonacciQueue<T>`)
pub struct IndexedQueue<T, Q>
where
    T: Ord + Hash + Clone,
    Q: MergeableQueue<T>,
{
    queue: Q,
    index: FxHashMap<T, Vec<Q::Handle>>,
}

impl<T, Q> IndexedQueue<T, Q>
where
    T: Ord + Hash + Clone,
    Q: MergeableQueue<T>,
{
    /// Creates an empty min-queue
    pub fn new() -> Self {
        Self::with_direction(Direction::Ascending)
    }

    /// Creates an empty queue extracting in the given direction
    pub fn with_direction(direction: Direction) -> Self {
        Self {
            queue: Q::with_direction(direction),
            index: FxHashMap::default(),
        }
    }

    /// Extraction direction of the wrapped queue
    pub fn direction(&self) -> Direction {
        self.queue.direction()
    }

    /// Number of elements held
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if no elements are held
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The wrapped queue, for inspection
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Inserts a value and records its node under that value
    pub fn insert(&mut self, value: T) -> Q::Handle {
        let handle = self.queue.insert(value.clone());
        self.index.entry(value).or_default().push(handle);
        handle
    }

    /// The extreme value, or [`QueueError::EmptyQueue`]
    pub fn peek(&self) -> Result<&T> {
        self.queue.peek()
    }

    /// Removes the extreme value and forgets the node that held it
    pub fn extract(&mut self) -> Result<T> {
        let value = self.queue.extract()?;
        self.forget_extracted(&value);
        Ok(value)
    }

    /// Replaces one occurrence of `old` with `new`
    ///
    /// # Errors
    /// - [`QueueError::KeyNotFound`] if no element holds `old`
    /// - [`QueueError::InvalidDirection`] if `new` is less extreme than `old`;
    ///   neither the queue nor the index changes
    pub fn update_key(&mut self, old: &T, new: T) -> Result<()> {
        let handle = *self
            .index
            .get(old)
            .and_then(|handles| handles.first())
            .ok_or(QueueError::KeyNotFound)?;

        self.queue.update_key(&handle, new.clone())?;

        self.remove_handle(old, 0);
        self.index.entry(new).or_default().push(handle);
        Ok(())
    }

    /// True if at least one element holds `value`
    pub fn contains(&self, value: &T) -> bool {
        self.index.contains_key(value)
    }

    /// Number of elements holding `value`
    pub fn count_of(&self, value: &T) -> usize {
        self.index.get(value).map_or(0, Vec::len)
    }

    /// Handles of the elements holding `value`, oldest first
    pub fn handles_of(&self, value: &T) -> &[Q::Handle] {
        self.index.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Moves every element of `other` into this queue, carrying its index
    /// entries across
    pub fn merge(&mut self, other: Self) {
        let IndexedQueue { queue, index } = other;
        let relocation = self.queue.merge(queue);
        for (value, handles) in index {
            self.index
                .entry(value)
                .or_default()
                .extend(handles.iter().filter_map(|h| relocation.translate(h)));
        }
    }

    pub fn iter(&self) -> Q::Iter<'_> {
        self.queue.iter()
    }

    /// Checks that the index names exactly the live elements
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut indexed = 0;
        for (value, handles) in &self.index {
            if handles.is_empty() {
                return Err("empty handle list left in the index".to_owned());
            }
            for handle in handles {
                match self.queue.get(handle) {
                    Some(held) if held == value => indexed += 1,
                    Some(_) => return Err(format!("{handle:?} holds a different value")),
                    None => return Err(format!("{handle:?} is stale")),
                }
            }
        }
        if indexed != self.queue.len() {
            return Err(format!(
                "index names {indexed} elements but the queue holds {}",
                self.queue.len()
            ));
        }
        Ok(())
    }

    /// Drops the handle whose element was just extracted
    ///
    /// Exactly one handle filed under `value` stops resolving.
    fn forget_extracted(&mut self, value: &T) {
        let position = self.index.get(value).and_then(|handles| {
            handles
                .iter()
                .position(|h| self.queue.get(h).is_none())
        });
        match position {
            Some(position) => self.remove_handle(value, position),
            None => log::warn!("extracted value had no stale handle in the index"),
        }
    }

    fn remove_handle(&mut self, value: &T, position: usize) {
        if let Some(handles) = self.index.get_mut(value) {
            handles.remove(position);
            if handles.is_empty() {
                self.index.remove(value);
            }
        }
    }
}

impl<T, Q> Default for IndexedQueue<T, Q>
where
    T: Ord + Hash + Clone,
    Q: MergeableQueue<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Q> Extend<T> for IndexedQueue<T, Q>
where
    T: Ord + Hash + Clone,
    Q: MergeableQueue<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, Q> FromIterator<T> for IndexedQueue<T, Q>
where
    T: Ord + Hash + Clone,
    Q: MergeableQueue<T>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binomial::BinomialQueue;
    use crate::fibonacci::FibonacciQueue;
    use crate::pairing::PairingQueue;

    fn exercise<Q: MergeableQueue<i32>>() {
        let mut queue: IndexedQueue<i32, Q> = [7, 4, 7, 9, 7].into_iter().collect();
        assert_eq!(queue.count_of(&7), 3);
        assert!(queue.validate().is_ok());

        queue.update_key(&7, 2).unwrap();
        assert_eq!(queue.count_of(&7), 2);
        assert_eq!(queue.count_of(&2), 1);
        assert!(queue.validate().is_ok());

        assert_eq!(queue.extract(), Ok(2));
        assert!(!queue.contains(&2));
        assert_eq!(queue.extract(), Ok(4));
        assert_eq!(queue.extract(), Ok(7));
        assert_eq!(queue.count_of(&7), 1);
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_index_over_every_queue() {
        exercise::<BinomialQueue<i32>>();
        exercise::<FibonacciQueue<i32>>();
        exercise::<PairingQueue<i32>>();
    }

    #[test]
    fn test_update_missing_value() {
        let mut queue: IndexedQueue<i32, PairingQueue<i32>> = IndexedQueue::new();
        queue.insert(1);
        assert_eq!(queue.update_key(&5, 0), Err(QueueError::KeyNotFound));
    }

    #[test]
    fn test_rejected_update_leaves_index() {
        let mut queue: IndexedQueue<i32, FibonacciQueue<i32>> = IndexedQueue::new();
        queue.insert(3);
        assert_eq!(queue.update_key(&3, 10), Err(QueueError::InvalidDirection));
        assert_eq!(queue.count_of(&3), 1);
        assert!(!queue.contains(&10));
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_binomial_bubble_keeps_index() {
        // bubbling swaps values between nodes; handles must follow values
        let mut queue: IndexedQueue<i32, BinomialQueue<i32>> = (1..=8).collect();
        queue.update_key(&8, 0).unwrap();
        assert!(queue.validate().is_ok());
        assert_eq!(queue.peek(), Ok(&0));

        queue.update_key(&7, -1).unwrap();
        assert!(queue.validate().is_ok());
        assert_eq!(queue.extract(), Ok(-1));
        assert_eq!(queue.extract(), Ok(0));
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_merge_carries_index() {
        let mut a: IndexedQueue<i32, FibonacciQueue<i32>> = [5, 6].into_iter().collect();
        let b: IndexedQueue<i32, FibonacciQueue<i32>> = [6, 9].into_iter().collect();

        a.merge(b);
        assert_eq!(a.len(), 4);
        assert_eq!(a.count_of(&6), 2);
        assert!(a.validate().is_ok());

        a.update_key(&9, 1).unwrap();
        assert_eq!(a.peek(), Ok(&1));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_accessors_follow_queue() {
        let mut queue: IndexedQueue<i32, BinomialQueue<i32>> =
            IndexedQueue::with_direction(Direction::Descending);
        assert_eq!(queue.direction(), Direction::Descending);
        assert!(queue.is_empty());
        assert_eq!(queue.peek(), Err(QueueError::EmptyQueue));

        queue.extend([2, 6]);
        assert_eq!(queue.len(), 2);
        assert!(!queue.is_empty());
        assert_eq!(queue.peek(), Ok(&6));
    }

    #[test]
    fn test_descending_index() {
        let mut queue: IndexedQueue<i32, PairingQueue<i32>> =
            IndexedQueue::with_direction(Direction::Descending);
        queue.extend([1, 5, 3]);
        queue.update_key(&1, 10).unwrap();
        assert_eq!(queue.extract(), Ok(10));
        assert_eq!(queue.extract(), Ok(5));
    }
}
