//! Binomial Queue implementation
//!
//! A binomial queue is a collection of binomial trees with:
//! - O(log n) insert, peek and extract
//! - O(log n) update_key
//! - O(log n) merge
//!
//! # Algorithm Overview
//!
//! The forest is a list of heap-ordered binomial trees sorted by strictly
//! increasing degree, so there is at most one tree of each degree. This is
//! the binary representation of `len`: a tree of degree k holds exactly 2ᵏ
//! values.
//!
//! Every mutation restores that shape eagerly:
//! - **Insert**: a single-node tree is merged into the forest by degree, then melded
//! - **Extract**: the extreme root is detached; its children, already sorted by
//!   degree, form a second forest that is merged back and melded
//! - **Update-key**: bubble up by swapping values with the parent (no cutting)
//! - **Merge**: merge both forests by degree and meld
//!
//! **Meld** walks the sorted forest linking adjacent trees of equal degree. When
//! three trees in a row share a degree, the first is left alone and the next two
//! are linked, which keeps the list sorted and ends with unique degrees.
//!
//! Bubble-up moves values, not nodes. Each value carries its handle slot with
//! it, so handles keep following their values across swaps.

use crate::ordering::{Direction, OrderingPolicy};
use crate::storage::{self, KeyMap, NodeArena, NodeKey, QueueId, RawHandle, Relocation};
use crate::traits::{queue_handle, MergeableQueue, QueueError, Result};
use std::mem;

queue_handle! {
    /// Handle to an element in a [`BinomialQueue`]
    ///
    /// The handle follows its value while update-key bubbles values through
    /// the tree.
    BinomialHandle
}

/// Internal node structure for the binomial queue
///
/// A node of degree k has exactly k children whose degrees are 0, 1, ..., k-1,
/// stored in that order.
struct Node<T> {
    value: T,
    /// Handle slot currently naming `value`
    entry: NodeKey,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

impl<T> Node<T> {
    fn degree(&self) -> usize {
        self.children.len()
    }
}

/// Binomial Queue
///
/// # Example
///
/// ```rust
/// use mergeable_queues::binomial::BinomialQueue;
/// use mergeable_queues::MergeableQueue;
///
/// let mut queue = BinomialQueue::new();
/// for v in [5, 3, 8, 1] {
///     queue.insert(v);
/// }
/// assert_eq!(queue.peek(), Ok(&1));
/// assert_eq!(queue.root_degrees(), vec![2]);
/// ```
pub struct BinomialQueue<T> {
    nodes: NodeArena<Node<T>>,
    /// Handle slot -> node currently holding that slot's value
    entries: NodeArena<NodeKey>,
    /// Tree roots, strictly increasing degree
    roots: Vec<NodeKey>,
    policy: OrderingPolicy,
    id: QueueId,
}

impl<T: Ord> MergeableQueue<T> for BinomialQueue<T> {
    type Handle = BinomialHandle;
    type Iter<'a> = Iter<'a, T> where Self: 'a, T: 'a;

    fn with_direction(direction: Direction) -> Self {
        Self {
            nodes: NodeArena::default(),
            entries: NodeArena::default(),
            roots: Vec::new(),
            policy: OrderingPolicy::new(direction),
            id: QueueId::fresh(),
        }
    }

    fn direction(&self) -> Direction {
        self.policy.direction()
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Inserts a new value
    ///
    /// **Time Complexity**: O(log n) worst-case, like incrementing a binary counter
    fn insert(&mut self, value: T) -> Self::Handle {
        let (node, entry) = self.alloc(value);
        let roots = mem::take(&mut self.roots);
        self.roots = self.merge_sorted_forests(roots, vec![node]);
        self.meld();
        self.handle(entry)
    }

    /// Scans the O(log n) roots for the extreme
    fn peek(&self) -> Result<&T> {
        let idx = self.extreme_root().ok_or(QueueError::EmptyQueue)?;
        Ok(&self.nodes[self.roots[idx]].value)
    }

    /// Removes and returns the extreme value
    ///
    /// **Time Complexity**: O(log n) worst-case
    ///
    /// When the root of a Bₖ tree is removed, its children are B₀ ... Bₖ₋₁,
    /// already a valid degree-sorted forest.
    fn extract(&mut self) -> Result<T> {
        let idx = self.extreme_root().ok_or(QueueError::EmptyQueue)?;
        let root = self.roots.remove(idx);
        let node = self.nodes.take(root);
        self.entries.take(node.entry);

        for &child in &node.children {
            self.nodes[child].parent = None;
        }
        let roots = mem::take(&mut self.roots);
        self.roots = self.merge_sorted_forests(roots, node.children);
        self.meld();

        Ok(node.value)
    }

    /// Replaces a value and bubbles it toward its root
    ///
    /// **Time Complexity**: O(log n) worst-case, the height of a binomial tree
    fn update_key(&mut self, handle: &Self::Handle, new_value: T) -> Result<()> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        if self.policy.precedes(&self.nodes[node].value, &new_value) {
            log::debug!("binomial update_key rejected: new key is less extreme");
            return Err(QueueError::InvalidDirection);
        }

        self.nodes[node].value = new_value;
        self.bubble_up(node);
        Ok(())
    }

    fn get(&self, handle: &Self::Handle) -> Option<&T> {
        self.resolve(handle).map(|node| &self.nodes[node].value)
    }

    /// Merges another queue into this one
    ///
    /// **Time Complexity**: O(log n). The donor's arena segments are taken
    /// over whole, so its nodes and handle slots keep their keys.
    fn merge(&mut self, other: Self) -> Relocation<Self::Handle> {
        if other.policy != self.policy {
            return self.adopt_values(other);
        }

        let BinomialQueue {
            nodes,
            entries,
            roots,
            id,
            ..
        } = other;

        let carried = nodes.len();
        self.nodes.absorb(nodes);
        self.entries.absorb(entries);
        log::trace!(
            "binomial merge took {carried} nodes; {} segments held",
            self.nodes.segment_count()
        );

        let own_roots = mem::take(&mut self.roots);
        self.roots = self.merge_sorted_forests(own_roots, roots);
        self.meld();

        Relocation::retagged(id, self.id, carried)
    }

    fn iter(&self) -> Self::Iter<'_> {
        Iter {
            inner: self.nodes.values(),
        }
    }
}

impl<T: Ord> BinomialQueue<T> {
    /// Degrees of the forest's trees, in forest order
    ///
    /// The list is strictly increasing and mirrors the set bits of `len`.
    pub fn root_degrees(&self) -> Vec<usize> {
        self.roots.iter().map(|&r| self.nodes[r].degree()).collect()
    }

    /// Checks every structural invariant, reporting the first violation
    ///
    /// - forest degrees strictly increase
    /// - every tree is binomial: the i-th child of a node has degree i
    /// - parent links match child lists
    /// - heap-order holds for the configured direction
    /// - handle slots and nodes point at each other
    /// - every node is reachable from a root
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut prev_degree = None;
        let mut reached = 0;
        for &root in &self.roots {
            let node = &self.nodes[root];
            if node.parent.is_some() {
                return Err(format!("root {root:?} has a parent"));
            }
            if prev_degree.map_or(false, |d| d >= node.degree()) {
                return Err(format!(
                    "forest degrees not strictly increasing at degree {}",
                    node.degree()
                ));
            }
            prev_degree = Some(node.degree());
            reached += self.validate_tree(root)?;
        }

        if reached != self.nodes.len() {
            return Err(format!(
                "reached {reached} nodes from the roots but {} are stored",
                self.nodes.len()
            ));
        }
        if self.entries.len() != self.nodes.len() {
            return Err("handle slot count differs from node count".to_owned());
        }
        for key in self.nodes.keys() {
            let entry = self.nodes[key].entry;
            if self.entries.get(entry) != Some(&key) {
                return Err(format!("node {key:?} and its handle slot disagree"));
            }
        }
        Ok(())
    }

    fn validate_tree(&self, key: NodeKey) -> std::result::Result<usize, String> {
        let node = &self.nodes[key];
        let mut count = 1;
        for (i, &child) in node.children.iter().enumerate() {
            let child_node = &self.nodes[child];
            if child_node.parent != Some(key) {
                return Err(format!("child {child:?} does not point back to {key:?}"));
            }
            if child_node.degree() != i {
                return Err(format!(
                    "child {i} of {key:?} has degree {}, not binomial",
                    child_node.degree()
                ));
            }
            if self.policy.precedes(&child_node.value, &node.value) {
                return Err(format!("heap-order violated between {key:?} and {child:?}"));
            }
            count += self.validate_tree(child)?;
        }
        Ok(count)
    }

    fn handle(&self, entry: NodeKey) -> BinomialHandle {
        BinomialHandle(RawHandle {
            owner: self.id,
            key: entry,
        })
    }

    fn resolve(&self, handle: &BinomialHandle) -> Option<NodeKey> {
        if handle.0.owner != self.id {
            return None;
        }
        self.entries.get(handle.0.key).copied()
    }

    /// Allocates a detached single-node tree and its handle slot
    fn alloc(&mut self, value: T) -> (NodeKey, NodeKey) {
        let node = self.nodes.insert(Node {
            value,
            entry: NodeKey::default(),
            parent: None,
            children: Vec::new(),
        });
        let entry = self.entries.insert(node);
        self.nodes[node].entry = entry;
        (node, entry)
    }

    /// Index into `roots` of the extreme root; the first one on ties
    fn extreme_root(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &root) in self.roots.iter().enumerate() {
            let better = match best {
                None => true,
                Some(b) => self
                    .policy
                    .precedes(&self.nodes[root].value, &self.nodes[self.roots[b]].value),
            };
            if better {
                best = Some(i);
            }
        }
        best
    }

    /// Merges two degree-sorted forests into one degree-sorted list
    ///
    /// Degrees may repeat (at most three times in a row after the two inputs
    /// and a carry); [`meld`](Self::meld) removes the repeats.
    fn merge_sorted_forests(&self, a: Vec<NodeKey>, b: Vec<NodeKey>) -> Vec<NodeKey> {
        if a.is_empty() {
            return b;
        }
        if b.is_empty() {
            return a;
        }

        let mut merged = Vec::with_capacity(a.len() + b.len());
        let mut a = a.into_iter().peekable();
        let mut b = b.into_iter().peekable();
        loop {
            let take_a = match (a.peek(), b.peek()) {
                (Some(&x), Some(&y)) => self.nodes[x].degree() <= self.nodes[y].degree(),
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_a { a.next() } else { b.next() };
            merged.extend(next);
        }
        merged
    }

    /// Links equal-degree neighbours until every degree is unique
    ///
    /// One pass over the degree-sorted roots, building the result list as it
    /// goes. `current` is the tree still open for linking.
    fn meld(&mut self) {
        let roots = mem::take(&mut self.roots);
        let mut melded = Vec::with_capacity(roots.len());
        let mut pending = roots.into_iter().peekable();
        let Some(mut current) = pending.next() else {
            return;
        };

        while let Some(next) = pending.next() {
            let degree = self.nodes[current].degree();
            let third_matches = pending
                .peek()
                .map_or(false, |&r| self.nodes[r].degree() == degree);

            if self.nodes[next].degree() != degree || third_matches {
                melded.push(current);
                current = next;
            } else {
                current = self.link(current, next);
            }
        }
        melded.push(current);
        self.roots = melded;
    }

    /// Links two trees of equal degree k into one tree of degree k+1
    ///
    /// The less extreme root becomes the last child of the other, which keeps
    /// child lists sorted by degree. `a` wins ties.
    fn link(&mut self, a: NodeKey, b: NodeKey) -> NodeKey {
        let (parent, child) = if self.policy.precedes(&self.nodes[b].value, &self.nodes[a].value) {
            (b, a)
        } else {
            (a, b)
        };
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        parent
    }

    /// Swaps values upward while the node outranks its parent
    fn bubble_up(&mut self, node: NodeKey) {
        let mut current = node;
        while let Some(parent) = self.nodes[current].parent {
            if !self
                .policy
                .precedes(&self.nodes[current].value, &self.nodes[parent].value)
            {
                break;
            }

            let swapped = self.nodes.with_pair(current, parent, |lower, upper| {
                mem::swap(&mut lower.value, &mut upper.value);
                mem::swap(&mut lower.entry, &mut upper.entry);
            });
            if !swapped {
                break;
            }
            let lower_entry = self.nodes[current].entry;
            let upper_entry = self.nodes[parent].entry;
            self.entries[lower_entry] = current;
            self.entries[upper_entry] = parent;

            current = parent;
        }
    }

    /// Merges a queue of the opposite direction by re-inserting its values
    fn adopt_values(&mut self, other: Self) -> Relocation<BinomialHandle> {
        log::warn!(
            "merging a {} binomial queue into a {} one; re-inserting {} values",
            other.direction(),
            self.direction(),
            other.len()
        );
        let BinomialQueue { nodes, id, .. } = other;
        let mut map = KeyMap::default();
        for (_, node) in nodes.into_entries() {
            let old_entry = node.entry;
            let handle = self.insert(node.value);
            map.insert(old_entry, handle.0.key);
        }
        Relocation::remapped(id, self.id, map)
    }
}

impl<T: Ord> Default for BinomialQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> Extend<T> for BinomialQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for BinomialQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<'a, T: Ord> IntoIterator for &'a BinomialQueue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the values of a [`BinomialQueue`], in no particular order
pub struct Iter<'a, T> {
    inner: storage::Values<'a, Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| &node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_scenario() {
        let mut queue = BinomialQueue::new();
        let handles: Vec<_> = [5, 3, 8, 1].into_iter().map(|v| queue.insert(v)).collect();
        assert_eq!(queue.peek(), Ok(&1));

        assert_eq!(queue.extract(), Ok(1));
        assert_eq!(queue.peek(), Ok(&3));

        queue.update_key(&handles[2], 0).unwrap();
        assert_eq!(queue.peek(), Ok(&0));
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_degrees_follow_binary_representation() {
        let mut queue = BinomialQueue::new();
        for i in 0..13 {
            queue.insert(i);
            assert!(queue.validate().is_ok());
        }
        // 13 = 0b1101
        assert_eq!(queue.root_degrees(), vec![0, 2, 3]);

        queue.extract().unwrap();
        // 12 = 0b1100
        assert_eq!(queue.root_degrees(), vec![2, 3]);
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_handle_follows_value_through_bubble_up() {
        let mut queue = BinomialQueue::new();
        let handles: Vec<_> = (0..16).map(|i| queue.insert(i * 10)).collect();
        assert_eq!(queue.root_degrees(), vec![4]);

        // 150 sits deepest; pull it to the front
        queue.update_key(&handles[15], -1).unwrap();
        assert!(queue.validate().is_ok());
        assert_eq!(queue.peek(), Ok(&-1));

        for (i, h) in handles.iter().enumerate().take(15) {
            assert_eq!(queue.get(h), Some(&(i as i32 * 10)));
        }
        assert_eq!(queue.get(&handles[15]), Some(&-1));
    }

    #[test]
    fn test_update_key_rejects_wrong_direction() {
        let mut queue = BinomialQueue::new();
        let h = queue.insert(5);
        queue.insert(7);

        assert_eq!(queue.update_key(&h, 6), Err(QueueError::InvalidDirection));
        assert_eq!(queue.get(&h), Some(&5));
        assert_eq!(queue.update_key(&h, 5), Ok(()));
    }

    #[test]
    fn test_stale_handle() {
        let mut queue = BinomialQueue::new();
        let h = queue.insert(1);
        queue.extract().unwrap();
        queue.insert(2);

        assert_eq!(queue.get(&h), None);
        assert_eq!(queue.update_key(&h, 0), Err(QueueError::KeyNotFound));
    }

    #[test]
    fn test_max_direction() {
        let mut queue = BinomialQueue::with_direction(Direction::Descending);
        queue.extend([4, 9, 1, 7]);
        assert_eq!(queue.drain_sorted(), vec![9, 7, 4, 1]);
    }

    #[test]
    fn test_merge_translates_handles() {
        let mut a: BinomialQueue<i32> = (0..5).collect();
        let mut b = BinomialQueue::new();
        let hb: Vec<_> = (10..17).map(|v| b.insert(v)).collect();

        let relocation = a.merge(b);
        assert_eq!(a.len(), 12);
        assert_eq!(relocation.len(), 7);
        assert!(a.validate().is_ok());

        let h = relocation.translate(&hb[6]).unwrap();
        assert_eq!(a.get(&h), Some(&16));
        a.update_key(&h, -5).unwrap();
        assert_eq!(a.extract(), Ok(-5));
    }

    #[test]
    fn test_merge_takes_nodes_without_moving_them() {
        let mut a: BinomialQueue<i32> = (0..3).collect();
        let mut b = BinomialQueue::new();
        let hb: Vec<_> = (0..20_000).map(|v| b.insert(v + 10)).collect();

        let relocation = a.merge(b);
        assert!(relocation.is_retag());
        assert_eq!(relocation.len(), 20_000);
        // one segment per side for nodes, whatever the donor's size
        assert_eq!(a.nodes.segment_count(), 2);
        assert_eq!(a.entries.segment_count(), 2);

        let h = relocation.translate(&hb[19_999]).unwrap();
        assert_eq!(h.0.key, hb[19_999].0.key);
        assert_eq!(a.get(&h), Some(&20_009));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_meld_skips_first_of_three_equal_degrees() {
        // forests [0, 1] and [0, 1]: the carry makes three B1 trees in a row
        let mut a: BinomialQueue<i32> = (0..3).collect();
        let b: BinomialQueue<i32> = (10..13).collect();
        assert_eq!(a.root_degrees(), vec![0, 1]);

        a.merge(b);
        assert_eq!(a.root_degrees(), vec![1, 2]);
        assert!(a.validate().is_ok());
        assert_eq!(a.drain_sorted(), vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_merge_opposite_direction() {
        let mut a: BinomialQueue<i32> = [3, 1].into_iter().collect();
        let mut b = BinomialQueue::with_direction(Direction::Descending);
        let h = b.insert(2);
        b.insert(0);

        let relocation = a.merge(b);
        assert!(a.validate().is_ok());
        assert_eq!(a.get(&relocation.translate(&h).unwrap()), Some(&2));
        assert_eq!(a.drain_sorted(), vec![0, 1, 2, 3]);
    }
}
