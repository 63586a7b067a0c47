//! Segmented arena storage for queue nodes
//!
//! Every queue keeps its nodes in a [`NodeArena`]: a set of `slotmap`
//! segments, so the cyclic parent/child/sibling structure is expressed with
//! plain generational keys instead of mutual references. The tree shape owns
//! nothing; the arena owns every node and links are only used to find
//! neighbours.
//!
//! # Merging without moving nodes
//!
//! A [`NodeKey`] names a segment and a slot within it. Segment ids are
//! globally unique, so a key stays valid when its segment changes hands.
//! Merging two arenas hands the donor's segments over whole: no node is
//! moved and no link is rewritten, and the work depends on the number of
//! segments rather than the number of nodes. The smaller segment table is
//! always folded into the larger one, and segments are dropped as soon as
//! they empty out.
//!
//! # Handles
//!
//! A handle is a node key tagged with the [`QueueId`] of the queue that
//! issued it. Generational keys detect removed nodes; the queue tag rejects
//! keys that belong to a different queue. After a merge the donor's handles
//! only need a new tag, which [`Relocation`] provides.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use std::collections::hash_map;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::traits::Handle;

new_key_type! {
    /// Slot within one segment
    struct SlotKey;
}

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SEGMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a queue instance, used to tag its handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(u64);

impl QueueId {
    pub(crate) fn fresh() -> Self {
        QueueId(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one arena segment, unique across all queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
struct SegmentId(u64);

impl SegmentId {
    fn fresh() -> Self {
        SegmentId(NEXT_SEGMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Arena key for a queue node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeKey {
    segment: SegmentId,
    slot: SlotKey,
}

/// Old key to new key, for the merges that do have to re-insert values
pub(crate) type KeyMap = FxHashMap<NodeKey, NodeKey>;

/// Untyped handle shared by every queue's public handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle {
    pub(crate) owner: QueueId,
    pub(crate) key: NodeKey,
}

type Segment<N> = SlotMap<SlotKey, N>;

/// Segmented slot-map arena of nodes
#[derive(Debug)]
pub(crate) struct NodeArena<N> {
    /// Segment that receives new nodes; never dropped
    home: SegmentId,
    segments: FxHashMap<SegmentId, Segment<N>>,
    len: usize,
}

impl<N> Default for NodeArena<N> {
    fn default() -> Self {
        let home = SegmentId::fresh();
        let mut segments = FxHashMap::default();
        segments.insert(home, SlotMap::with_key());
        Self {
            home,
            segments,
            len: 0,
        }
    }
}

impl<N> NodeArena<N> {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Number of segments currently held
    pub(crate) fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn home_mut(&mut self) -> &mut Segment<N> {
        self.segments
            .entry(self.home)
            .or_insert_with(SlotMap::with_key)
    }

    pub(crate) fn insert(&mut self, node: N) -> NodeKey {
        self.insert_with_key(|_| node)
    }

    pub(crate) fn insert_with_key(&mut self, f: impl FnOnce(NodeKey) -> N) -> NodeKey {
        let segment = self.home;
        let slot = self
            .home_mut()
            .insert_with_key(|slot| f(NodeKey { segment, slot }));
        self.len += 1;
        NodeKey { segment, slot }
    }

    pub(crate) fn remove(&mut self, key: NodeKey) -> Option<N> {
        let segment = self.segments.get_mut(&key.segment)?;
        let node = segment.remove(key.slot)?;
        if segment.is_empty() && key.segment != self.home {
            self.segments.remove(&key.segment);
        }
        self.len -= 1;
        Some(node)
    }

    /// Removes a node known to be live
    ///
    /// # Panics
    /// If `key` does not name a live node, like indexing.
    pub(crate) fn take(&mut self, key: NodeKey) -> N {
        match self.remove(key) {
            Some(node) => node,
            None => panic!("no live node for {key:?}"),
        }
    }

    pub(crate) fn get(&self, key: NodeKey) -> Option<&N> {
        self.segments.get(&key.segment)?.get(key.slot)
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut N> {
        self.segments.get_mut(&key.segment)?.get_mut(key.slot)
    }

    pub(crate) fn contains(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// Runs `f` on two distinct live nodes at once
    ///
    /// Returns false, without calling `f`, if the keys are equal or either
    /// node is missing.
    pub(crate) fn with_pair(
        &mut self,
        a: NodeKey,
        b: NodeKey,
        f: impl FnOnce(&mut N, &mut N),
    ) -> bool {
        if a.segment == b.segment {
            let Some(segment) = self.segments.get_mut(&a.segment) else {
                return false;
            };
            return match segment.get_disjoint_mut([a.slot, b.slot]) {
                Some([x, y]) => {
                    f(x, y);
                    true
                }
                None => false,
            };
        }

        // two segments: lift one out of the table while both are borrowed
        let Some(mut other) = self.segments.remove(&b.segment) else {
            return false;
        };
        let done = match (self.get_mut(a), other.get_mut(b.slot)) {
            (Some(x), Some(y)) => {
                f(x, y);
                true
            }
            _ => false,
        };
        self.segments.insert(b.segment, other);
        done
    }

    pub(crate) fn values(&self) -> Values<'_, N> {
        Values {
            segments: self.segments.values(),
            current: None,
            remaining: self.len,
        }
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.segments.iter().flat_map(|(&segment, slots)| {
            slots.keys().map(move |slot| NodeKey { segment, slot })
        })
    }

    /// Takes over every segment of `other`; existing keys stay valid
    ///
    /// Costs O(min(segments)) hash-table moves, independent of how many
    /// nodes either side holds.
    pub(crate) fn absorb(&mut self, mut other: NodeArena<N>) {
        // only a home segment may be empty
        if other.segments.get(&other.home).map_or(false, |s| s.is_empty()) {
            other.segments.remove(&other.home);
        }
        if other.segments.len() > self.segments.len() {
            mem::swap(&mut self.segments, &mut other.segments);
        }
        self.segments.extend(other.segments.drain());
        self.len += other.len;
    }

    /// Consumes the arena, yielding every key with its node
    pub(crate) fn into_entries(self) -> impl Iterator<Item = (NodeKey, N)> {
        self.segments.into_iter().flat_map(|(segment, slots)| {
            slots
                .into_iter()
                .map(move |(slot, node)| (NodeKey { segment, slot }, node))
        })
    }
}

impl<N> Index<NodeKey> for NodeArena<N> {
    type Output = N;

    #[inline]
    fn index(&self, key: NodeKey) -> &N {
        match self.get(key) {
            Some(node) => node,
            None => panic!("no live node for {key:?}"),
        }
    }
}

impl<N> IndexMut<NodeKey> for NodeArena<N> {
    #[inline]
    fn index_mut(&mut self, key: NodeKey) -> &mut N {
        match self.get_mut(key) {
            Some(node) => node,
            None => panic!("no live node for {key:?}"),
        }
    }
}

/// Iterator over every node of a [`NodeArena`], segment by segment
pub(crate) struct Values<'a, N> {
    segments: hash_map::Values<'a, SegmentId, Segment<N>>,
    current: Option<slotmap::basic::Values<'a, SlotKey, N>>,
    remaining: usize,
}

impl<'a, N> Iterator for Values<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some(node);
            }
            self.current = Some(self.segments.next()?.values());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Translation of a donor queue's handles after a merge
///
/// Handles issued by the donor stop resolving once it has been merged away;
/// [`translate`](Relocation::translate) returns the equivalent handle in the
/// queue that absorbed it. A plain merge keeps every node where it is, so
/// translating only retags the handle.
///
/// # Example
///
/// ```rust
/// use mergeable_queues::{MergeableQueue, PairingQueue};
///
/// let mut a = PairingQueue::new();
/// a.insert(10);
/// let mut b = PairingQueue::new();
/// let h = b.insert(20);
///
/// let relocation = a.merge(b);
/// let h = relocation.translate(&h).unwrap();
/// a.update_key(&h, 1).unwrap();
/// assert_eq!(a.peek(), Ok(&1));
/// ```
pub struct Relocation<H> {
    from: QueueId,
    to: QueueId,
    /// `None` when the nodes kept their keys
    keys: Option<KeyMap>,
    carried: usize,
    _handle: PhantomData<H>,
}

impl<H: Handle> Relocation<H> {
    /// The donor's nodes now belong to the recipient under the same keys
    pub(crate) fn retagged(from: QueueId, to: QueueId, carried: usize) -> Self {
        Self {
            from,
            to,
            keys: None,
            carried,
            _handle: PhantomData,
        }
    }

    /// The donor's values were re-inserted under new keys
    pub(crate) fn remapped(from: QueueId, to: QueueId, keys: KeyMap) -> Self {
        Self {
            from,
            to,
            carried: keys.len(),
            keys: Some(keys),
            _handle: PhantomData,
        }
    }

    /// The recipient's handle for a handle issued by the donor
    ///
    /// Returns `None` for handles of other queues. A donor handle whose
    /// element had already been extracted translates to a handle that does
    /// not resolve, or to `None` after a re-inserting merge.
    pub fn translate(&self, handle: &H) -> Option<H> {
        let raw = handle.raw();
        if raw.owner != self.from {
            return None;
        }
        let key = match &self.keys {
            None => raw.key,
            Some(map) => *map.get(&raw.key)?,
        };
        Some(H::from_raw(RawHandle {
            owner: self.to,
            key,
        }))
    }

    /// Number of elements the donor carried over
    pub fn len(&self) -> usize {
        self.carried
    }

    /// True if the donor was empty
    pub fn is_empty(&self) -> bool {
        self.carried == 0
    }

    /// True if the donor's nodes kept their keys, so no node was moved
    pub fn is_retag(&self) -> bool {
        self.keys.is_none()
    }
}

impl<H> fmt::Debug for Relocation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relocation")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("carried", &self.carried)
            .field("retag", &self.keys.is_none())
            .finish()
    }
}
