//! Arena-backed search tree storage.
//!
//! Each `ArenaNode` owns its children in an `ArenaBuffer`: a fixed array of
//! lazily allocated batches, `LANES` nodes wide. Children are addressed by
//! `ChildIdx { batch, offset }` so the same coordinates index the parent's
//! `NodeScoresBuffer` columns. Nodes are never freed individually; dropping
//! the root drops the whole tree.
//!
//! All mutation goes through `&self`. Slots are reserved with an atomic
//! counter and filled through initialize-once cells, so shared-tree workers
//! can grow the same node without locks.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use super::intrinsics::LANES;
use super::scores::NodeScoresBuffer;
use crate::core::MAX_ACTIONS;

/// Batches per buffer. A node never has more children than registered actions.
pub const MAX_BATCHES: usize = MAX_ACTIONS / LANES;

/// Maximum number of nodes one buffer can hold.
pub const CAPACITY: usize = MAX_BATCHES * LANES;

/// Coordinates of a child within its parent's buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChildIdx {
    pub batch: u8,
    pub offset: u8,
}

impl ChildIdx {
    #[inline]
    #[must_use]
    pub const fn new(batch: usize, offset: usize) -> Self {
        Self {
            batch: batch as u8,
            offset: offset as u8,
        }
    }

    /// Coordinates of the `index`-th appended child.
    #[inline]
    #[must_use]
    pub const fn from_linear(index: usize) -> Self {
        Self::new(index / LANES, index % LANES)
    }

    /// Append order of this child.
    #[inline]
    #[must_use]
    pub const fn linear(self) -> usize {
        self.batch as usize * LANES + self.offset as usize
    }
}

impl fmt::Display for ChildIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.batch, self.offset)
    }
}

type Batch<T> = Box<[OnceLock<ArenaNode<T>>; LANES]>;

/// Append-only, batch-allocated child storage.
pub struct ArenaBuffer<T> {
    batches: [OnceLock<Batch<T>>; MAX_BATCHES],
    len: AtomicUsize,
}

impl<T> ArenaBuffer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: std::array::from_fn(|_| OnceLock::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of reserved slots.
    ///
    /// Under concurrent growth a reserved slot may not be filled yet; `get`
    /// returns `None` for it until it is.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve the next slot, allocating its batch if needed.
    ///
    /// Panics when the buffer is full.
    pub fn reserve(&self) -> ChildIdx {
        let index = self.len.fetch_add(1, Ordering::AcqRel);
        assert!(index < CAPACITY, "arena buffer capacity of {} nodes exceeded", CAPACITY);

        let idx = ChildIdx::from_linear(index);
        self.batches[idx.batch as usize].get_or_init(|| Box::new(std::array::from_fn(|_| OnceLock::new())));
        idx
    }

    /// Fill a reserved slot and return the stored node.
    fn fill(&self, idx: ChildIdx, node: ArenaNode<T>) -> &ArenaNode<T> {
        let batch = self.batches[idx.batch as usize].get_or_init(|| Box::new(std::array::from_fn(|_| OnceLock::new())));
        batch[idx.offset as usize].get_or_init(|| node)
    }

    /// Node at `idx`, if its slot has been filled.
    #[inline]
    #[must_use]
    pub fn get(&self, idx: ChildIdx) -> Option<&ArenaNode<T>> {
        self.batches
            .get(idx.batch as usize)?
            .get()?
            .get(idx.offset as usize)?
            .get()
    }

    /// Filled nodes in append order.
    pub fn iter(&self) -> impl Iterator<Item = &ArenaNode<T>> + '_ {
        (0..self.len().min(CAPACITY)).filter_map(move |i| self.get(ChildIdx::from_linear(i)))
    }
}

impl<T> Default for ArenaBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A search tree node: payload, children and the children's statistics.
pub struct ArenaNode<T> {
    pub state: T,
    pub children: ArenaBuffer<T>,
    pub child_scores: NodeScoresBuffer,
    /// Position in the parent's buffers. `None` at the root.
    pub child_idx: Option<ChildIdx>,
    pub depth: u16,
}

impl<T> ArenaNode<T> {
    /// Create a tree root.
    #[must_use]
    pub fn root(state: T) -> Self {
        Self::with_position(state, None, 0)
    }

    fn with_position(state: T, child_idx: Option<ChildIdx>, depth: u16) -> Self {
        Self {
            state,
            children: ArenaBuffer::new(),
            child_scores: NodeScoresBuffer::new(),
            child_idx,
            depth,
        }
    }

    /// Append a child and return its coordinates with a reference to it.
    ///
    /// The child's score slot exists before the child becomes visible.
    pub fn add_child(&self, state: T) -> (ChildIdx, &ArenaNode<T>) {
        let idx = self.children.reserve();
        self.child_scores.ensure(idx);
        let child = Self::with_position(state, Some(idx), self.depth + 1);
        (idx, self.children.fill(idx, child))
    }

    #[inline]
    #[must_use]
    pub fn child_at(&self, idx: ChildIdx) -> Option<&ArenaNode<T>> {
        self.children.get(idx)
    }

    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Number of nodes in this subtree, including this one.
    #[must_use]
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(ArenaNode::subtree_size).sum::<usize>()
    }

    /// Depth of the deepest node in this subtree.
    #[must_use]
    pub fn max_depth(&self) -> u16 {
        self.children.iter().map(ArenaNode::max_depth).max().unwrap_or(self.depth)
    }
}

impl<T: fmt::Debug> fmt::Debug for ArenaNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaNode")
            .field("state", &self.state)
            .field("child_idx", &self.child_idx)
            .field("depth", &self.depth)
            .field("children", &self.children.len())
            .finish()
    }
}
