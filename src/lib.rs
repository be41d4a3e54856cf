//! # rangetree-rs
//!
//! An index over disjoint half-open address ranges `[start, end)` answering
//! "which registered range contains this address?".
//!
//! The tree is a binary prefix trie keyed on the high-order bits shared by
//! each range's endpoints, so it is balanced by address width rather than by
//! range count: a lookup touches at most one node per address bit no matter
//! how many ranges are registered or in which order they arrived. For a given
//! set of ranges the tree shape is always the same.
//!
//! ## Example
//!
//! ```rust
//! use rangetree_rs::RangeTree;
//!
//! let mut tree: RangeTree<u32, &str> = RangeTree::new();
//! tree.insert(0x1000, 0x2000, "text").unwrap();
//! tree.insert(0x3000, 0x4000, "data").unwrap();
//!
//! assert_eq!(tree.lookup(0x1500).map(|leaf| *leaf.value()), Some("text"));
//! assert!(tree.lookup(0x2500).is_none());
//! assert!(tree.overlaps(0x1900, 0x3100));
//! ```
//!
//! The tree does no locking. Share it across threads behind a lock that
//! covers reads as well as writes.

#![forbid(unsafe_code)]

mod address;
mod config;
mod error;
mod iter;
mod mask;
mod node;
mod pool;

pub use address::Address;
pub use config::TreeConfig;
pub use error::RangeTreeError;
pub use iter::Iter;
pub use node::{Leaf, LeafHandle};

use smallvec::SmallVec;
use tracing::{debug, trace};

use node::{Node, NodeId, NodeKind};
use pool::{NodePool, PoolExhausted};

/// Location of a child pointer: the root, or one side of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Root,
    Child(NodeId, usize),
}

// =============================================================================
// RangeTree
// =============================================================================

/// Index of disjoint address ranges, each carrying a value.
///
/// Features:
/// - Lookup in O(address bits), independent of range count
/// - Canonical shape regardless of insertion order
/// - Split nodes allocated from a bounded pool, reclaimed on removal
/// - Stable, generation-checked leaf handles
#[derive(Clone)]
pub struct RangeTree<A, V> {
    pool: NodePool<A, V>,
    root: Option<NodeId>,
    leaves: usize,
    /// Count of nodes ever constructed. Diagnostic only; never read by traversal.
    next_ordinal: u64,
}

impl<A: Address, V> RangeTree<A, V> {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            pool: NodePool::new(config.initial_capacity, config.max_nodes),
            root: None,
            leaves: 0,
            next_ordinal: 0,
        }
    }

    /// Number of registered ranges.
    #[inline]
    pub fn len(&self) -> usize {
        self.leaves
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    /// Number of split nodes currently routing between subtrees.
    #[inline]
    pub fn split_count(&self) -> usize {
        self.pool.live() - self.leaves
    }

    /// Ordinal the next constructed node will receive.
    #[inline]
    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    /// Remove every range. Outstanding handles stop resolving.
    pub fn clear(&mut self) {
        self.pool.clear();
        self.root = None;
        self.leaves = 0;
    }

    pub fn get(&self, handle: LeafHandle) -> Option<&Leaf<A, V>> {
        self.pool.resolve(handle)?.as_leaf()
    }

    pub fn get_mut(&mut self, handle: LeafHandle) -> Option<&mut Leaf<A, V>> {
        self.pool.resolve_mut(handle)?.as_leaf_mut()
    }

    /// Whether `handle` still refers to a registered range.
    pub fn contains(&self, handle: LeafHandle) -> bool {
        self.get(handle).is_some()
    }

    #[inline]
    fn link(&self, link: Link) -> Option<NodeId> {
        match link {
            Link::Root => self.root,
            Link::Child(parent, side) => self.pool.get(parent).children[side],
        }
    }

    #[inline]
    fn set_link(&mut self, link: Link, target: Option<NodeId>) {
        match link {
            Link::Root => self.root = target,
            Link::Child(parent, side) => self.pool.get_mut(parent).children[side] = target,
        }
    }

    fn take_ordinal(&mut self) -> u64 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }

    fn out_of_memory(&self, err: PoolExhausted) -> RangeTreeError<A> {
        debug!(capacity = err.capacity, "range tree node pool exhausted");
        RangeTreeError::OutOfMemory {
            capacity: err.capacity,
        }
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl<A: Address, V> RangeTree<A, V> {
    /// The range containing `address`, if any.
    pub fn lookup(&self, address: A) -> Option<&Leaf<A, V>> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = self.pool.get(id);
            if let Some(leaf) = node.as_leaf() {
                if leaf.contains(address) {
                    return Some(leaf);
                }
            }
            if node.excludes(address) {
                return None;
            }
            current = node.child_for(address);
        }
        None
    }

    /// The range containing `address - 1`, i.e. the range ending at or
    /// spanning `address`.
    ///
    /// Suits return addresses just past a call. A range's own start does not
    /// match, and address zero never does.
    pub fn lookup_end_inclusive(&self, address: A) -> Option<&Leaf<A, V>> {
        let below = address.predecessor()?;
        self.lookup(below)
            .filter(|leaf| leaf.start <= address && address <= leaf.end)
    }

    /// Whether any registered range intersects `[start, end)`.
    pub fn overlaps(&self, start: A, end: A) -> bool {
        self.first_overlap(start, end).is_some()
    }

    fn first_overlap(&self, start: A, end: A) -> Option<&Leaf<A, V>> {
        self.first_overlap_counted(start, end, &mut 0)
    }

    /// Walk only subtrees whose address block meets `[start, end)`. With no
    /// overlap that is the two paths toward `start` and `end`.
    fn first_overlap_counted(&self, start: A, end: A, visited: &mut usize) -> Option<&Leaf<A, V>> {
        if end <= start {
            return None;
        }
        let mut stack: SmallVec<[NodeId; 32]> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            *visited += 1;
            let node = self.pool.get(id);
            if node.block_disjoint(start, end) {
                continue;
            }
            if let Some(leaf) = node.as_leaf() {
                if leaf.intersects(start, end) {
                    return Some(leaf);
                }
            }
            stack.extend(node.children.iter().flatten().copied());
        }
        None
    }

    /// Ranges in ascending order of start address.
    pub fn iter(&self) -> Iter<'_, A, V> {
        Iter::new(&self.pool, self.root, None)
    }

    /// Ranges intersecting `[start, end)`, in ascending order of start address.
    pub fn iter_range(&self, start: A, end: A) -> Iter<'_, A, V> {
        let root = if end <= start { None } else { self.root };
        Iter::new(&self.pool, root, Some((start, end)))
    }
}

// =============================================================================
// Insertion
// =============================================================================

impl<A: Address, V> RangeTree<A, V> {
    /// Register `[start, end)` with `value`.
    ///
    /// Fails without touching the tree if the range is empty, intersects a
    /// registered range, or the node pool is exhausted.
    pub fn insert(&mut self, start: A, end: A, value: V) -> Result<LeafHandle, RangeTreeError<A>> {
        if end <= start {
            debug!(start = ?start, end = ?end, "rejected empty range");
            return Err(RangeTreeError::InvalidRange { start, end });
        }
        if let Some(existing) = self.first_overlap(start, end) {
            let err = RangeTreeError::Overlap {
                start,
                end,
                existing_start: existing.start,
                existing_end: existing.end,
            };
            debug!(%err, "rejected overlapping range");
            return Err(err);
        }

        let handle = self.pool.next_handle();
        let ordinal = self.next_ordinal;
        let leaf = Leaf {
            handle,
            start,
            end,
            ordinal,
            value,
        };
        let id = self
            .pool
            .alloc(Node::leaf(leaf))
            .map_err(|err| self.out_of_memory(err))?;
        debug_assert_eq!(id, handle.node_id());
        self.take_ordinal();

        if let Err(err) = self.link_leaf(id) {
            self.pool.free(id);
            self.next_ordinal = ordinal;
            return Err(err);
        }
        self.leaves += 1;
        Ok(handle)
    }

    /// Hang the unlinked leaf `new` into the trie.
    ///
    /// Nothing is written to the tree until the final step, so an allocation
    /// failure leaves it untouched.
    fn link_leaf(&mut self, new: NodeId) -> Result<(), RangeTreeError<A>> {
        let mut inserting = new;
        let mut link = Link::Root;
        loop {
            let Some(occupant) = self.link(link) else {
                self.set_link(link, Some(inserting));
                return Ok(());
            };

            let ins = self.pool.get(inserting);
            let occ = self.pool.get(occupant);
            let (ins_key, ins_mask) = (ins.key(), ins.mask);
            let (occ_key, occ_mask) = (occ.key(), occ.mask);

            if mask::prefix_diverges(ins_key, occ_key, ins_mask & occ_mask) {
                let split = self.alloc_split(occupant, inserting)?;
                self.set_link(link, Some(split));
                return Ok(());
            }

            if ins_mask == occ_mask {
                // Two leaves at one position always overlap, which the
                // caller has ruled out; the occupant is a split point.
                debug_assert!(occ.is_split(), "leaf position already taken");
                debug_assert_eq!(inserting, new);
                let children = occ.children;
                self.pool.get_mut(inserting).children = children;
                self.set_link(link, Some(inserting));
                self.pool.free(occupant);
                trace!(split = occupant.0, leaf = inserting.0, "leaf took over split position");
                return Ok(());
            }

            if mask::is_wider(occ_mask, ins_mask) {
                link = Link::Child(occupant, mask::child_index(occ_mask, ins_key));
            } else {
                // The newcomer covers the occupant's region: take its slot
                // and carry it down one level.
                self.set_link(link, Some(inserting));
                link = Link::Child(inserting, mask::child_index(ins_mask, occ_key));
                inserting = occupant;
            }
        }
    }

    /// Allocate a split node over two subtrees whose prefixes diverge.
    fn alloc_split(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, RangeTreeError<A>> {
        let (a_key, b_key) = (self.pool.get(a).key(), self.pool.get(b).key());
        let node = if a_key < b_key {
            Node::split(a_key, b_key, a, b)
        } else {
            Node::split(b_key, a_key, b, a)
        };
        let mask = node.mask;
        let id = self
            .pool
            .alloc(node)
            .map_err(|err| self.out_of_memory(err))?;
        self.take_ordinal();
        trace!(split = id.0, mask = ?mask, "allocated split node");
        Ok(id)
    }
}

// =============================================================================
// Removal
// =============================================================================

impl<A: Address, V> RangeTree<A, V> {
    /// Unregister the range behind `handle`, returning its value.
    ///
    /// Returns `None` if the handle no longer refers to a registered range.
    pub fn remove(&mut self, handle: LeafHandle) -> Option<V> {
        let target = handle.node_id();
        let start = self.get(handle)?.start;

        let mut parent = None;
        let mut link = Link::Root;
        loop {
            let Some(id) = self.link(link) else {
                debug_assert!(false, "{handle} resolves but is not linked");
                return None;
            };
            if id == target {
                break;
            }
            let side = mask::child_index(self.pool.get(id).mask, start);
            parent = Some((link, id));
            link = Link::Child(id, side);
        }

        let (replacement, leaf) = self.detach_leaf(target);
        self.set_link(link, replacement);
        if let Some((parent_link, parent_id)) = parent {
            self.collapse_split(parent_link, parent_id);
        }
        self.leaves -= 1;
        Some(leaf.value)
    }

    /// Unregister every range intersecting `[start, end)`.
    ///
    /// Returns the removed leaves in ascending order of start address.
    pub fn remove_range(&mut self, start: A, end: A) -> Vec<Leaf<A, V>> {
        let mut removed = Vec::new();
        if end <= start {
            return removed;
        }
        if let Some(root) = self.root {
            self.root = self.remove_range_in(root, start, end, &mut removed);
        }
        self.leaves -= removed.len();
        removed.sort_unstable_by_key(|leaf| leaf.start);
        removed
    }

    /// Prune `[start, end)` from the subtree at `id`, returning its new root.
    fn remove_range_in(
        &mut self,
        id: NodeId,
        start: A,
        end: A,
        removed: &mut Vec<Leaf<A, V>>,
    ) -> Option<NodeId> {
        let node = self.pool.get(id);
        if node.block_disjoint(start, end) {
            return Some(id);
        }

        let children = node.children;
        for (side, child) in children.into_iter().enumerate() {
            if let Some(child) = child {
                let kept = self.remove_range_in(child, start, end, removed);
                self.pool.get_mut(id).children[side] = kept;
            }
        }

        let node = self.pool.get(id);
        if node.is_split() && node.child_count() < 2 {
            let only = node.children.into_iter().flatten().next();
            self.pool.free(id);
            trace!(split = id.0, "collapsed split node");
            return only;
        }
        if node.as_leaf().is_some_and(|leaf| leaf.intersects(start, end)) {
            let (replacement, leaf) = self.detach_leaf(id);
            removed.push(leaf);
            return replacement;
        }
        Some(id)
    }

    /// Take the leaf out of slot `id`, returning what should occupy its link.
    ///
    /// A leaf routing to two children leaves a split node behind in the same
    /// slot; the split sits at the leaf's own position so no allocation is
    /// needed.
    fn detach_leaf(&mut self, id: NodeId) -> (Option<NodeId>, Leaf<A, V>) {
        let children = self.pool.get(id).children;
        let (replacement, old) = match children {
            [Some(lo), Some(hi)] => {
                let (lo_key, hi_key) = (self.pool.get(lo).key(), self.pool.get(hi).key());
                let split = Node::split(lo_key, hi_key, lo, hi);
                debug_assert_eq!(split.mask, self.pool.get(id).mask);
                self.take_ordinal();
                trace!(slot = id.0, "leaf slot became split node");
                (Some(id), self.pool.replace(id, split))
            }
            [only, None] | [None, only] => (only, self.pool.free(id)),
        };
        match old.kind {
            NodeKind::Leaf(leaf) => (replacement, leaf),
            NodeKind::Split { .. } => unreachable!("detach_leaf on split node {}", id.0),
        }
    }

    /// Replace the split at `id` (held by `link`) with its child if it has fewer than two.
    fn collapse_split(&mut self, link: Link, id: NodeId) {
        let node = self.pool.get(id);
        if !node.is_split() || node.child_count() == 2 {
            return;
        }
        let only = node.children.into_iter().flatten().next();
        self.set_link(link, only);
        self.pool.free(id);
        trace!(split = id.0, "collapsed split node");
    }
}

impl<A: Address, V> Default for RangeTree<A, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Address, V: std::fmt::Debug> std::fmt::Debug for RangeTree<A, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|leaf| (leaf.range(), leaf.value())))
            .finish()
    }
}

impl<'a, A: Address, V> IntoIterator for &'a RangeTree<A, V> {
    type Item = &'a Leaf<A, V>;
    type IntoIter = Iter<'a, A, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


#[cfg(test)]
mod proptests;
