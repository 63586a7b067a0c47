//! Fibonacci Queue implementation
//!
//! A Fibonacci queue is a data structure for priority queue operations with:
//! - O(1) amortized insert, peek and merge
//! - O(1) amortized update_key (O(log n) when cascading cuts are counted)
//! - O(log n) amortized extract
//!
//! The structure consists of a collection of heap-ordered trees. Roots are
//! linked in a circular doubly linked list, and so are the children of every
//! node, which makes splicing a whole list in or out O(1). The queue tracks the
//! extreme root.
//!
//! # Laziness
//!
//! Insert and merge only splice into the root ring. All the tidying happens in
//! extract, which consolidates the roots by degree until every root degree is
//! unique. Update-key cuts a node loose when it outranks its parent; a node
//! that loses a second child while not a root is cut as well (cascading cut).
//! The marks recording "lost one child" keep every degree O(log n).

use crate::ordering::{Direction, OrderingPolicy};
use crate::storage::{self, KeyMap, NodeArena, NodeKey, QueueId, RawHandle, Relocation};
use crate::traits::{queue_handle, MergeableQueue, QueueError, Result};
use smallvec::SmallVec;

queue_handle! {
    /// Handle to an element in a [`FibonacciQueue`]
    FibonacciHandle
}

struct Node<T> {
    value: T,
    parent: Option<NodeKey>,
    /// Any one child; the rest are reached through its ring
    child: Option<NodeKey>,
    left: NodeKey,
    right: NodeKey,
    degree: usize,
    /// Lost a child since it last became a child itself
    marked: bool,
}

/// Fibonacci Queue
///
/// # Example
///
/// ```rust
/// use mergeable_queues::fibonacci::FibonacciQueue;
/// use mergeable_queues::MergeableQueue;
///
/// let mut queue = FibonacciQueue::new();
/// let handle = queue.insert(5);
/// queue.insert(3);
/// queue.update_key(&handle, 1).unwrap();
/// assert_eq!(queue.peek(), Ok(&1));
/// ```
pub struct FibonacciQueue<T> {
    nodes: NodeArena<Node<T>>,
    /// Extreme root; entry point of the root ring
    top: Option<NodeKey>,
    policy: OrderingPolicy,
    id: QueueId,
}

impl<T: Ord> MergeableQueue<T> for FibonacciQueue<T> {
    type Handle = FibonacciHandle;
    type Iter<'a> = Iter<'a, T> where Self: 'a, T: 'a;

    fn with_direction(direction: Direction) -> Self {
        Self {
            nodes: NodeArena::default(),
            top: None,
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

    /// Splices a single-node tree into the root ring
    fn insert(&mut self, value: T) -> Self::Handle {
        let node = self.nodes.insert_with_key(|key| Node {
            value,
            parent: None,
            child: None,
            left: key,
            right: key,
            degree: 0,
            marked: false,
        });
        self.add_root(node);
        self.handle(node)
    }

    fn peek(&self) -> Result<&T> {
        let top = self.top.ok_or(QueueError::EmptyQueue)?;
        Ok(&self.nodes[top].value)
    }

    /// Removes and returns the extreme value
    ///
    /// **Algorithm**:
    /// 1. Splice the extreme root's children into the root ring, clearing
    ///    their parent links and marks
    /// 2. Unlink the extreme root
    /// 3. Consolidate: link roots of equal degree until all degrees differ,
    ///    then pick the new extreme among the survivors
    fn extract(&mut self) -> Result<T> {
        let top = self.top.ok_or(QueueError::EmptyQueue)?;

        if let Some(child) = self.nodes[top].child.take() {
            for c in self.ring(child) {
                let node = &mut self.nodes[c];
                node.parent = None;
                node.marked = false;
            }
            self.splice(top, child);
            self.nodes[top].degree = 0;
        }

        let next = self.nodes[top].right;
        self.unlink(top);
        let node = self.nodes.take(top);

        if next == top {
            self.top = None;
        } else {
            self.top = Some(next);
            self.consolidate(next);
        }
        Ok(node.value)
    }

    /// Replaces a value, cutting the node loose if it now outranks its parent
    ///
    /// A cut node's former parent is marked; if it was already marked it is
    /// cut too, and so on up the tree (cascading cut).
    fn update_key(&mut self, handle: &Self::Handle, new_value: T) -> Result<()> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        if self.policy.precedes(&self.nodes[node].value, &new_value) {
            log::debug!("fibonacci update_key rejected: new key is less extreme");
            return Err(QueueError::InvalidDirection);
        }

        self.nodes[node].value = new_value;

        if let Some(parent) = self.nodes[node].parent {
            if self
                .policy
                .precedes(&self.nodes[node].value, &self.nodes[parent].value)
            {
                self.cut(node, parent);
                self.cascading_cut(parent);
            }
        }

        if self.nodes[node].parent.is_none() {
            self.refresh_top(node);
        }
        Ok(())
    }

    fn get(&self, handle: &Self::Handle) -> Option<&T> {
        self.resolve(handle).map(|node| &self.nodes[node].value)
    }

    /// Splices the other queue's root ring into this one
    ///
    /// **Time Complexity**: O(1) for the splice. The donor's arena segments
    /// are taken over whole, in O(min(segment counts)) independent of how
    /// many nodes they hold, so its nodes keep their keys and links.
    fn merge(&mut self, other: Self) -> Relocation<Self::Handle> {
        if other.policy != self.policy {
            return self.adopt_values(other);
        }

        let FibonacciQueue { nodes, top, id, .. } = other;
        let carried = nodes.len();
        self.nodes.absorb(nodes);
        log::trace!(
            "fibonacci merge took {carried} nodes; {} segments held",
            self.nodes.segment_count()
        );

        if let Some(other_top) = top {
            match self.top {
                None => self.top = Some(other_top),
                Some(own_top) => {
                    self.splice(own_top, other_top);
                    self.refresh_top(other_top);
                }
            }
        }
        Relocation::retagged(id, self.id, carried)
    }

    fn iter(&self) -> Self::Iter<'_> {
        Iter {
            inner: self.nodes.values(),
        }
    }
}

impl<T: Ord> FibonacciQueue<T> {
    /// True if the element is a tree root
    pub fn is_root(&self, handle: &FibonacciHandle) -> Result<bool> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        Ok(self.nodes[node].parent.is_none())
    }

    /// True if the element has lost a child since it last became a child
    pub fn is_marked(&self, handle: &FibonacciHandle) -> Result<bool> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        Ok(self.nodes[node].marked)
    }

    /// Number of children of the element
    pub fn degree(&self, handle: &FibonacciHandle) -> Result<usize> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        Ok(self.nodes[node].degree)
    }

    /// The element's parent, or `None` for a root
    pub fn parent(&self, handle: &FibonacciHandle) -> Result<Option<FibonacciHandle>> {
        let node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        Ok(self.nodes[node].parent.map(|p| self.handle(p)))
    }

    /// Distance from the element to its tree's root
    pub fn depth(&self, handle: &FibonacciHandle) -> Result<usize> {
        let mut node = self.resolve(handle).ok_or(QueueError::KeyNotFound)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[node].parent {
            node = parent;
            depth += 1;
        }
        Ok(depth)
    }

    /// Number of trees in the root ring
    pub fn root_count(&self) -> usize {
        self.top.map_or(0, |top| self.ring(top).len())
    }

    /// Checks every structural invariant, reporting the first violation
    ///
    /// - ring links are symmetric
    /// - roots have no parent and are unmarked; the tracked top is extreme
    /// - every child points back to its parent, and `degree` equals the
    ///   length of the child ring
    /// - heap-order holds for the configured direction
    /// - every node is reachable from the root ring
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some(top) = self.top else {
            return if self.nodes.len() == 0 {
                Ok(())
            } else {
                Err(format!("no top but {} nodes stored", self.nodes.len()))
            };
        };

        let roots = self.checked_ring(top)?;
        let mut reached = 0;
        for &root in &roots {
            let node = &self.nodes[root];
            if node.parent.is_some() {
                return Err(format!("root {root:?} has a parent"));
            }
            if node.marked {
                return Err(format!("root {root:?} is marked"));
            }
            if self.policy.precedes(&node.value, &self.nodes[top].value) {
                return Err(format!("root {root:?} outranks the tracked top"));
            }
            reached += self.validate_tree(root)?;
        }

        if reached != self.nodes.len() {
            return Err(format!(
                "reached {reached} nodes from the roots but {} are stored",
                self.nodes.len()
            ));
        }
        Ok(())
    }

    fn validate_tree(&self, key: NodeKey) -> std::result::Result<usize, String> {
        let node = &self.nodes[key];
        let children = match node.child {
            Some(child) => self.checked_ring(child)?,
            None => Vec::new(),
        };
        if children.len() != node.degree {
            return Err(format!(
                "{key:?} has degree {} but {} children",
                node.degree,
                children.len()
            ));
        }

        let mut count = 1;
        for child in children {
            let child_node = &self.nodes[child];
            if child_node.parent != Some(key) {
                return Err(format!("child {child:?} does not point back to {key:?}"));
            }
            if self.policy.precedes(&child_node.value, &node.value) {
                return Err(format!("heap-order violated between {key:?} and {child:?}"));
            }
            count += self.validate_tree(child)?;
        }
        Ok(count)
    }

    /// Collects a ring, checking `left`/`right` symmetry on the way
    fn checked_ring(&self, start: NodeKey) -> std::result::Result<Vec<NodeKey>, String> {
        let mut keys = Vec::new();
        let mut current = start;
        loop {
            if !self.nodes.contains(current) {
                return Err(format!("ring link to missing node {current:?}"));
            }
            let right = self.nodes[current].right;
            if self.nodes.get(right).map(|n| n.left) != Some(current) {
                return Err(format!("ring links of {current:?} are not symmetric"));
            }
            keys.push(current);
            if keys.len() > self.nodes.len() {
                return Err("ring does not close".to_owned());
            }
            current = right;
            if current == start {
                return Ok(keys);
            }
        }
    }

    fn handle(&self, node: NodeKey) -> FibonacciHandle {
        FibonacciHandle(RawHandle {
            owner: self.id,
            key: node,
        })
    }

    fn resolve(&self, handle: &FibonacciHandle) -> Option<NodeKey> {
        let raw = handle.0;
        (raw.owner == self.id && self.nodes.contains(raw.key)).then_some(raw.key)
    }

    /// Keys of the ring containing `start`, beginning with `start`
    fn ring(&self, start: NodeKey) -> Vec<NodeKey> {
        let mut keys = vec![start];
        let mut current = self.nodes[start].right;
        while current != start {
            keys.push(current);
            current = self.nodes[current].right;
        }
        keys
    }

    /// Joins the rings containing `a` and `b` into one ring
    ///
    /// The `b` ring is inserted right after `a`.
    fn splice(&mut self, a: NodeKey, b: NodeKey) {
        let a_right = self.nodes[a].right;
        let b_left = self.nodes[b].left;
        self.nodes[a].right = b;
        self.nodes[b].left = a;
        self.nodes[b_left].right = a_right;
        self.nodes[a_right].left = b_left;
    }

    /// Removes a node from its ring, leaving it a ring of one
    fn unlink(&mut self, key: NodeKey) {
        let left = self.nodes[key].left;
        let right = self.nodes[key].right;
        self.nodes[left].right = right;
        self.nodes[right].left = left;
        self.nodes[key].left = key;
        self.nodes[key].right = key;
    }

    /// Adds a detached single-ring tree to the root ring
    fn add_root(&mut self, node: NodeKey) {
        match self.top {
            None => self.top = Some(node),
            Some(top) => {
                self.splice(top, node);
                self.refresh_top(node);
            }
        }
    }

    /// Makes `root` the tracked top if it outranks the current one
    fn refresh_top(&mut self, root: NodeKey) {
        let replace = match self.top {
            None => true,
            Some(top) => self
                .policy
                .precedes(&self.nodes[root].value, &self.nodes[top].value),
        };
        if replace {
            self.top = Some(root);
        }
    }

    /// Links roots of equal degree until every degree is unique
    fn consolidate(&mut self, start: NodeKey) {
        let roots = self.ring(start);
        let root_count = roots.len();
        let mut by_degree: SmallVec<[Option<NodeKey>; 32]> = SmallVec::new();

        for root in roots {
            let mut tree = root;
            loop {
                let degree = self.nodes[tree].degree;
                if degree >= by_degree.len() {
                    by_degree.resize(degree + 1, None);
                }
                match by_degree[degree].take() {
                    None => {
                        by_degree[degree] = Some(tree);
                        break;
                    }
                    Some(other) => tree = self.link(tree, other),
                }
            }
        }

        self.top = None;
        let mut survivors = 0;
        for root in by_degree.into_iter().flatten() {
            survivors += 1;
            self.refresh_top(root);
        }
        log::trace!("fibonacci consolidate: {root_count} roots -> {survivors}");
    }

    /// Makes the less extreme of two roots a child of the other
    ///
    /// Both are in the root ring and have the same degree; `a` wins ties.
    fn link(&mut self, a: NodeKey, b: NodeKey) -> NodeKey {
        let (parent, child) = if self.policy.precedes(&self.nodes[b].value, &self.nodes[a].value) {
            (b, a)
        } else {
            (a, b)
        };

        self.unlink(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[child].marked = false;
        match self.nodes[parent].child {
            None => self.nodes[parent].child = Some(child),
            Some(first) => self.splice(first, child),
        }
        self.nodes[parent].degree += 1;
        parent
    }

    /// Moves `node` from `parent`'s child ring to the root ring
    fn cut(&mut self, node: NodeKey, parent: NodeKey) {
        if self.nodes[parent].child == Some(node) {
            let sibling = self.nodes[node].right;
            self.nodes[parent].child = (sibling != node).then_some(sibling);
        }
        self.unlink(node);
        self.nodes[parent].degree -= 1;

        let cut = &mut self.nodes[node];
        cut.parent = None;
        cut.marked = false;
        if let Some(top) = self.top {
            self.splice(top, node);
        }
    }

    /// Marks `node` after it lost a child, cutting it if it was already marked
    fn cascading_cut(&mut self, node: NodeKey) {
        let mut current = node;
        let mut cascaded = 0;
        while let Some(parent) = self.nodes[current].parent {
            if !self.nodes[current].marked {
                self.nodes[current].marked = true;
                break;
            }
            self.cut(current, parent);
            cascaded += 1;
            current = parent;
        }
        if cascaded > 0 {
            log::trace!("fibonacci cascading cut moved {cascaded} ancestors to the root ring");
        }
    }

    /// Merges a queue of the opposite direction by re-inserting its values
    fn adopt_values(&mut self, other: Self) -> Relocation<FibonacciHandle> {
        log::warn!(
            "merging a {} fibonacci queue into a {} one; re-inserting {} values",
            other.direction(),
            self.direction(),
            other.len()
        );
        let FibonacciQueue { nodes, id, .. } = other;
        let mut map = KeyMap::default();
        for (old, node) in nodes.into_entries() {
            let handle = self.insert(node.value);
            map.insert(old, handle.0.key);
        }
        Relocation::remapped(id, self.id, map)
    }
}

impl<T: Ord> Default for FibonacciQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> Extend<T> for FibonacciQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for FibonacciQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<'a, T: Ord> IntoIterator for &'a FibonacciQueue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the values of a [`FibonacciQueue`], in no particular order
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
        let mut queue = FibonacciQueue::new();
        assert_eq!(queue.peek(), Err(QueueError::EmptyQueue));

        queue.insert(5);
        queue.insert(3);
        queue.insert(7);
        assert_eq!(queue.peek(), Ok(&3));
        assert_eq!(queue.root_count(), 3);

        assert_eq!(queue.extract(), Ok(3));
        assert_eq!(queue.peek(), Ok(&5));
        assert_eq!(queue.root_count(), 1);
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_consolidate_leaves_unique_degrees() {
        let mut queue: FibonacciQueue<i32> = (1..=16).collect();
        assert_eq!(queue.root_count(), 16);

        assert_eq!(queue.extract(), Ok(1));
        assert!(queue.validate().is_ok());
        // 15 = 8 + 4 + 2 + 1
        assert_eq!(queue.root_count(), 4);
    }

    #[test]
    fn test_update_key_on_root() {
        let mut queue = FibonacciQueue::new();
        queue.insert(10);
        let h = queue.insert(20);

        queue.update_key(&h, 5).unwrap();
        assert_eq!(queue.peek(), Ok(&5));
        assert_eq!(queue.is_root(&h), Ok(true));
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_cut_marks_parent() {
        let mut queue = FibonacciQueue::new();
        let handles: Vec<_> = (0..5).map(|v| queue.insert(v)).collect();
        queue.extract().unwrap();
        // 4 nodes consolidate into a single B2 tree rooted at 1
        assert_eq!(queue.root_count(), 1);

        let grandchild = handles
            .iter()
            .skip(1)
            .find(|h| queue.depth(h) == Ok(2))
            .copied()
            .unwrap();
        let parent = queue.parent(&grandchild).unwrap().unwrap();

        queue.update_key(&grandchild, -1).unwrap();
        assert_eq!(queue.is_root(&grandchild), Ok(true));
        assert_eq!(queue.is_marked(&parent), Ok(true));
        assert_eq!(queue.degree(&parent), Ok(0));
        assert_eq!(queue.peek(), Ok(&-1));
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_update_without_violation_keeps_shape() {
        let mut queue = FibonacciQueue::new();
        let handles: Vec<_> = (0..5).map(|v| queue.insert(v * 10)).collect();
        queue.extract().unwrap();

        let leaf = handles
            .iter()
            .skip(1)
            .find(|h| queue.depth(h) == Ok(2))
            .copied()
            .unwrap();
        let parent = queue.parent(&leaf).unwrap().unwrap();
        let parent_value = *queue.get(&parent).unwrap();

        // still behind its parent: no cut
        queue.update_key(&leaf, parent_value).unwrap();
        assert_eq!(queue.depth(&leaf), Ok(2));
        assert_eq!(queue.is_marked(&parent), Ok(false));
    }

    #[test]
    fn test_wrong_direction_leaves_state() {
        let mut queue = FibonacciQueue::with_direction(Direction::Descending);
        let h = queue.insert(5);
        assert_eq!(queue.update_key(&h, 4), Err(QueueError::InvalidDirection));
        assert_eq!(queue.get(&h), Some(&5));
        queue.update_key(&h, 6).unwrap();
        assert_eq!(queue.peek(), Ok(&6));
    }

    #[test]
    fn test_merge() {
        let mut a: FibonacciQueue<i32> = [5, 10].into_iter().collect();
        let mut b = FibonacciQueue::new();
        let h = b.insert(7);
        b.insert(3);

        let relocation = a.merge(b);
        assert_eq!(a.len(), 4);
        assert_eq!(a.peek(), Ok(&3));
        assert!(a.validate().is_ok());

        let h = relocation.translate(&h).unwrap();
        assert_eq!(a.get(&h), Some(&7));
        assert_eq!(a.drain_sorted(), vec![3, 5, 7, 10]);
    }

    #[test]
    fn test_merge_takes_nodes_without_moving_them() {
        let mut a: FibonacciQueue<i32> = [5, 10].into_iter().collect();
        let mut b = FibonacciQueue::new();
        let hb: Vec<_> = (0..20_000).map(|v| b.insert(v + 1)).collect();
        // give the donor real trees, not just a ring of singletons
        b.insert(0);
        assert_eq!(b.extract(), Ok(0));

        let relocation = a.merge(b);
        assert!(relocation.is_retag());
        assert_eq!(relocation.len(), 20_000);
        assert_eq!(a.nodes.segment_count(), 2);

        let h = relocation.translate(&hb[12_345]).unwrap();
        assert_eq!(h.0.key, hb[12_345].0.key);
        assert_eq!(a.peek(), Ok(&1));
        a.update_key(&h, -1).unwrap();
        assert_eq!(a.extract(), Ok(-1));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut a = FibonacciQueue::new();
        let mut b = FibonacciQueue::new();
        a.insert(1);
        let hb = b.insert(2);

        assert_eq!(a.get(&hb), None);
        assert_eq!(a.update_key(&hb, 0), Err(QueueError::KeyNotFound));
    }
}
