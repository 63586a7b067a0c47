//! Pairing Queue implementation
//!
//! A pairing queue is a single heap-ordered multi-way tree with:
//! - O(1) worst-case insert, peek and merge
//! - O(log n) amortized extract
//! - O(log n) amortized update_key (o(log n) is conjectured)
//!
//! The pairing queue is simpler than the Fibonacci queue and keeps no degree
//! bound at all; its amortized cost comes entirely from the order in which
//! extract pairs up the orphaned children.
//!
//! # Child lists
//!
//! Children form a doubly linked sibling chain. `prev` points at the previous
//! sibling, except on the first child, where it points at the parent; the
//! `head` flag tells which of the two it is, so a node can be spliced out and
//! its parent repaired in O(1).

use crate::ordering::{Direction, OrderingPolicy};
use crate::storage::{self, KeyMap, NodeArena, NodeKey, QueueId, RawHandle, Relocation};
use crate::traits::{queue_handle, MergeableQueue, QueueError, Result};

queue_handle! {
    /// Handle to an element in a [`PairingQueue`]
    PairingHandle
}

struct Node<T> {
    value: T,
    child: Option<NodeKey>,
    next: Option<NodeKey>,
    /// Previous sibling, or the parent when `head` is set
    prev: Option<NodeKey>,
    /// First in its parent's child list
    head: bool,
}

/// Pairing Queue
///
/// # Example
///
/// ```rust
/// use mergeable_queues::pairing::PairingQueue;
/// use mergeable_queues::MergeableQueue;
///
/// let mut queue = PairingQueue::new();
/// let handle = queue.insert(5);
/// queue.insert(3);
/// queue.update_key(&handle, 1).unwrap();
/// assert_eq!(queue.peek(), Ok(&1));
/// ```
pub struct PairingQueue<T> {
    nodes: NodeArena<Node<T>>,
    root: Option<NodeKey>,
    policy: OrderingPolicy,
    id: QueueId,
}

impl<T: Ord> MergeableQueue<T> for PairingQueue<T> {
    type Handle = PairingHandle;
    type Iter<'a> = Iter<'a, T> where Self: 'a, T: 'a;

    fn with_direction(direction: Direction) -> Self {
        Self {
            nodes: NodeArena::default(),
            root: None,
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

    fn insert(&mut self, value: T) -> Self::Handle {
        let node = self.nodes.insert(Node {
            value,
            child: None,
            next: None,
            prev: None,
            head: false,
        });
        self.root = Some(match self.root {
            None => node,
            Some(root) => self.meld(root, node),
        });
        self.handle(node)
    }

    fn peek(&self) -> Result<&T> {
        let root = self.root.ok_or(QueueError::EmptyQueue)?;
        Ok(&self.nodes[root].value)
    }

    /// Removes the root and pairs its children back into one tree
    fn extract(&mut self) -> Result<T> {
        let root = self.root.ok_or(QueueError::EmptyQueue)?;
        let node = self.nodes.take(root);
        self.root = node.child.map(|first| self.combine_siblings(first));
        Ok(node.value)
    }

    /// Replaces a value, then cuts the node's subtree and melds it with the root
    fn update_key(&mut self, handle: &Self::Handle, new_value: T) -> Result<()> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        if self.policy.precedes(&self.nodes[node].value, &new_value) {
            log::debug!("pairing update_key rejected: new key is less extreme");
            return Err(QueueError::InvalidDirection);
        }

        self.nodes[node].value = new_value;

        match self.root {
            Some(root) if root != node => {
                self.detach(node);
                self.root = Some(self.meld(root, node));
            }
            _ => {}
        }
        Ok(())
    }

    fn get(&self, handle: &Self::Handle) -> Option<&T> {
        self.resolve(handle).map(|node| &self.nodes[node].value)
    }

    /// Melds the two roots in O(1)
    ///
    /// The donor's arena segments are taken over whole, so its nodes keep
    /// their keys; that costs O(min(segment counts)), never O(donor size).
    fn merge(&mut self, other: Self) -> Relocation<Self::Handle> {
        if other.policy != self.policy {
            return self.adopt_values(other);
        }

        let PairingQueue { nodes, root, id, .. } = other;
        let carried = nodes.len();
        self.nodes.absorb(nodes);
        log::trace!(
            "pairing merge took {carried} nodes; {} segments held",
            self.nodes.segment_count()
        );

        if let Some(other_root) = root {
            self.root = Some(match self.root {
                None => other_root,
                Some(own_root) => self.meld(own_root, other_root),
            });
        }
        Relocation::retagged(id, self.id, carried)
    }

    fn iter(&self) -> Self::Iter<'_> {
        Iter {
            inner: self.nodes.values(),
        }
    }
}

impl<T: Ord> PairingQueue<T> {
    /// True if the element is the root
    pub fn is_root(&self, handle: &PairingHandle) -> Result<bool> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        Ok(self.root == Some(node))
    }

    /// Number of children of the root
    ///
    /// This is the length of the sibling list the next extract has to pair.
    pub fn root_degree(&self) -> usize {
        let mut degree = 0;
        let mut current = self.root.and_then(|r| self.nodes[r].child);
        while let Some(c) = current {
            degree += 1;
            current = self.nodes[c].next;
        }
        degree
    }

    /// Checks every structural invariant, reporting the first violation
    ///
    /// - the root has no siblings and no parent
    /// - a first child has `head` set and `prev` pointing at its parent
    /// - any other child has `head` clear and `prev` pointing at its left
    ///   sibling
    /// - heap-order holds for the configured direction
    /// - every node is reachable from the root
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some(root) = self.root else {
            return if self.nodes.len() == 0 {
                Ok(())
            } else {
                Err(format!("no root but {} nodes stored", self.nodes.len()))
            };
        };

        let node = &self.nodes[root];
        if node.prev.is_some() || node.next.is_some() || node.head {
            return Err("root is linked into a sibling list".to_owned());
        }

        let mut reached = 0;
        let mut stack = vec![root];
        while let Some(parent) = stack.pop() {
            reached += 1;
            if reached > self.nodes.len() {
                return Err("cycle in the tree".to_owned());
            }

            let mut expected_prev = parent;
            let mut current = self.nodes[parent].child;
            let mut first = true;
            while let Some(child) = current {
                let child_node = self
                    .nodes
                    .get(child)
                    .ok_or_else(|| format!("link to missing node {child:?}"))?;
                if child_node.head != first {
                    return Err(format!("{child:?} has the wrong head flag"));
                }
                if child_node.prev != Some(expected_prev) {
                    return Err(format!("{child:?} has a broken back link"));
                }
                if self
                    .policy
                    .precedes(&child_node.value, &self.nodes[parent].value)
                {
                    return Err(format!("heap-order violated between {parent:?} and {child:?}"));
                }
                stack.push(child);
                expected_prev = child;
                first = false;
                current = child_node.next;
            }
        }

        if reached != self.nodes.len() {
            return Err(format!(
                "reached {reached} nodes from the root but {} are stored",
                self.nodes.len()
            ));
        }
        Ok(())
    }

    fn handle(&self, node: NodeKey) -> PairingHandle {
        PairingHandle(RawHandle {
            owner: self.id,
            key: node,
        })
    }

    fn resolve(&self, handle: &PairingHandle) -> Option<NodeKey> {
        let raw = handle.0;
        (raw.owner == self.id && self.nodes.contains(raw.key)).then_some(raw.key)
    }

    /// Makes the less extreme of two detached trees the first child of the
    /// other, returning the new root; `a` wins ties
    fn meld(&mut self, a: NodeKey, b: NodeKey) -> NodeKey {
        let (parent, child) = if self.policy.precedes(&self.nodes[b].value, &self.nodes[a].value) {
            (b, a)
        } else {
            (a, b)
        };

        let old_first = self.nodes[parent].child;
        if let Some(first) = old_first {
            let first_node = &mut self.nodes[first];
            first_node.prev = Some(child);
            first_node.head = false;
        }

        let child_node = &mut self.nodes[child];
        child_node.next = old_first;
        child_node.prev = Some(parent);
        child_node.head = true;

        self.nodes[parent].child = Some(child);
        parent
    }

    /// Splices a node (with its subtree) out of its sibling list
    fn detach(&mut self, node: NodeKey) {
        let Node {
            prev, next, head, ..
        } = self.nodes[node];

        if let Some(prev) = prev {
            if head {
                self.nodes[prev].child = next;
            } else {
                self.nodes[prev].next = next;
            }
        }
        if let Some(next) = next {
            let next_node = &mut self.nodes[next];
            next_node.prev = prev;
            next_node.head = head;
        }

        let detached = &mut self.nodes[node];
        detached.prev = None;
        detached.next = None;
        detached.head = false;
    }

    /// Two-pass pairing of a sibling list into a single tree
    ///
    /// Pass one melds adjacent pairs left to right, halving the number of
    /// trees. Pass two folds the results right to left. A single left-to-right
    /// fold instead would allow O(n) extracts on adversarial input.
    fn combine_siblings(&mut self, first: NodeKey) -> NodeKey {
        let mut pairs = Vec::new();
        let mut current = Some(first);

        while let Some(a) = current {
            let Some(b) = self.take_next(a) else {
                pairs.push(a);
                break;
            };
            current = self.take_next(b);
            pairs.push(self.meld(a, b));
        }

        let mut result = pairs.pop().unwrap_or(first);
        while let Some(tree) = pairs.pop() {
            result = self.meld(tree, result);
        }
        result
    }

    /// Clears a node's sibling links, returning its former right sibling
    fn take_next(&mut self, node: NodeKey) -> Option<NodeKey> {
        let n = &mut self.nodes[node];
        n.prev = None;
        n.head = false;
        n.next.take()
    }

    /// Merges a queue of the opposite direction by re-inserting its values
    fn adopt_values(&mut self, other: Self) -> Relocation<PairingHandle> {
        log::warn!(
            "merging a {} pairing queue into a {} one; re-inserting {} values",
            other.direction(),
            self.direction(),
            other.len()
        );
        let PairingQueue { nodes, id, .. } = other;
        let mut map = KeyMap::default();
        for (old, node) in nodes.into_entries() {
            let handle = self.insert(node.value);
            map.insert(old, handle.0.key);
        }
        Relocation::remapped(id, self.id, map)
    }
}

impl<T: Ord> Default for PairingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> Extend<T> for PairingQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for PairingQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<'a, T: Ord> IntoIterator for &'a PairingQueue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the values of a [`PairingQueue`], in no particular order
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
    fn test_basic_operations() {
        let mut queue = PairingQueue::new();
        assert!(queue.is_empty());

        queue.insert(5);
        queue.insert(3);
        queue.insert(7);

        assert_eq!(queue.peek(), Ok(&3));
        assert_eq!(queue.root_degree(), 2);

        assert_eq!(queue.extract(), Ok(3));
        assert_eq!(queue.peek(), Ok(&5));
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_update_key() {
        let mut queue = PairingQueue::new();
        let h1 = queue.insert(10);
        let _h2 = queue.insert(20);
        let h3 = queue.insert(30);

        assert_eq!(queue.peek(), Ok(&10));

        queue.update_key(&h3, 5).unwrap();
        assert_eq!(queue.peek(), Ok(&5));
        assert_eq!(queue.is_root(&h3), Ok(true));
        assert_eq!(queue.is_root(&h1), Ok(false));
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_update_key_of_middle_sibling() {
        let mut queue = PairingQueue::new();
        queue.insert(0);
        let handles: Vec<_> = (1..=4).map(|v| queue.insert(v * 10)).collect();
        // root 0 with children 40, 30, 20, 10
        assert_eq!(queue.root_degree(), 4);

        queue.update_key(&handles[1], 15).unwrap();
        assert!(queue.validate().is_ok());
        assert_eq!(queue.root_degree(), 4);

        // first child (40) and last child (10)
        queue.update_key(&handles[3], 35).unwrap();
        queue.update_key(&handles[0], 1).unwrap();
        assert!(queue.validate().is_ok());
        assert_eq!(queue.drain_sorted(), vec![0, 1, 15, 30, 35]);
    }

    #[test]
    fn test_update_key_moves_subtree() {
        let mut queue: PairingQueue<i32> = (0..8).collect();
        queue.extract().unwrap();
        let h = queue.insert(100);
        queue.extract().unwrap();

        queue.update_key(&h, -1).unwrap();
        assert!(queue.validate().is_ok());
        assert_eq!(queue.peek(), Ok(&-1));
        assert_eq!(queue.len(), 7);
    }

    #[test]
    fn test_merge() {
        let mut queue1: PairingQueue<i32> = [5, 10].into_iter().collect();
        let mut queue2 = PairingQueue::new();
        queue2.insert(3);
        let h = queue2.insert(7);

        let relocation = queue1.merge(queue2);
        assert_eq!(queue1.peek(), Ok(&3));
        assert!(queue1.validate().is_ok());

        let h = relocation.translate(&h).unwrap();
        queue1.update_key(&h, 2).unwrap();
        assert_eq!(queue1.drain_sorted(), vec![2, 3, 5, 10]);
    }

    #[test]
    fn test_merge_chain_keeps_segments_bounded() {
        let mut total = PairingQueue::new();
        let mut tracked = Vec::new();
        for batch in 0..64 {
            let mut part: PairingQueue<i32> = (0..100).map(|v| batch * 1000 + v).collect();
            let h = part.insert(batch * 1000 + 999);
            let relocation = total.merge(part);
            assert!(relocation.is_retag());
            let h2 = relocation.translate(&h).unwrap();
            assert_eq!(h2.0.key, h.0.key);
            tracked.push(h2);
        }
        assert_eq!(total.len(), 64 * 101);
        assert_eq!(total.nodes.segment_count(), 65);

        // draining a donor's nodes releases its segment
        while total.len() > 64 * 101 - 202 {
            total.extract().unwrap();
        }
        assert_eq!(total.nodes.segment_count(), 63);
        assert_eq!(total.get(&tracked[63]), Some(&63_999));
        assert!(total.validate().is_ok());
    }

    #[test]
    fn test_descending() {
        let mut queue = PairingQueue::with_direction(Direction::Descending);
        queue.extend([3, 9, 4, 1, 9]);
        assert_eq!(queue.drain_sorted(), vec![9, 9, 4, 3, 1]);
    }
}
