//! Tree nodes.
//!
//! Every node sits at a position in the binary trie given by its `mask` and
//! the address bits under that mask. Leaves carry a caller range; split
//! nodes exist only where two subtrees meet and no leaf occupies the spot.

use std::fmt;
use std::ops::Range;

use crate::address::Address;
use crate::mask;

/// Index of a slot in the node pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle to a leaf registered in a [`RangeTree`](crate::RangeTree).
///
/// Handles are generation-checked: once the leaf is removed, the handle
/// stops resolving even if its slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LeafHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl LeafHandle {
    #[inline]
    pub(crate) fn node_id(self) -> NodeId {
        NodeId(self.index)
    }
}

impl fmt::Display for LeafHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeafHandle(idx={}, gen={})", self.index, self.generation)
    }
}

/// A registered address range and its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf<A, V> {
    pub(crate) handle: LeafHandle,
    pub(crate) start: A,
    pub(crate) end: A,
    pub(crate) ordinal: u64,
    pub(crate) value: V,
}

impl<A: Address, V> Leaf<A, V> {
    /// Handle that resolves back to this leaf while it stays registered.
    #[inline]
    pub fn handle(&self) -> LeafHandle {
        self.handle
    }

    /// First address of the range.
    #[inline]
    pub fn start(&self) -> A {
        self.start
    }

    /// One past the last address of the range.
    #[inline]
    pub fn end(&self) -> A {
        self.end
    }

    #[inline]
    pub fn range(&self) -> Range<A> {
        self.start..self.end
    }

    /// Construction order of this leaf within its tree. Diagnostic only.
    #[inline]
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    #[inline]
    pub fn into_value(self) -> V {
        self.value
    }

    #[inline]
    pub fn contains(&self, address: A) -> bool {
        self.start <= address && address < self.end
    }

    /// Whether this range shares at least one address with `[start, end)`.
    #[inline]
    pub fn intersects(&self, start: A, end: A) -> bool {
        end > self.start && start < self.end
    }
}

#[derive(Clone, Debug)]
pub(crate) enum NodeKind<A, V> {
    Leaf(Leaf<A, V>),
    /// Routing node; `split_point` is the top address of its 0-side half.
    Split { split_point: A },
}

#[derive(Clone, Debug)]
pub(crate) struct Node<A, V> {
    pub(crate) mask: A,
    pub(crate) children: [Option<NodeId>; 2],
    pub(crate) kind: NodeKind<A, V>,
}

impl<A: Address, V> Node<A, V> {
    pub(crate) fn leaf(leaf: Leaf<A, V>) -> Self {
        Self {
            mask: mask::common_mask(leaf.start, leaf.end),
            children: [None, None],
            kind: NodeKind::Leaf(leaf),
        }
    }

    /// Split node joining `lo` and `hi`, whose keys must diverge.
    pub(crate) fn split(lo_key: A, hi_key: A, lo: NodeId, hi: NodeId) -> Self {
        debug_assert!(lo_key < hi_key);
        let mask = mask::common_mask(lo_key, hi_key);
        Self {
            mask,
            children: [Some(lo), Some(hi)],
            kind: NodeKind::Split {
                split_point: mask::split_point(lo_key, mask),
            },
        }
    }

    /// Address identifying this node's prefix: a leaf's start or a split point.
    #[inline]
    pub(crate) fn key(&self) -> A {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.start,
            NodeKind::Split { split_point } => *split_point,
        }
    }

    #[inline]
    pub(crate) fn as_leaf(&self) -> Option<&Leaf<A, V>> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Split { .. } => None,
        }
    }

    #[inline]
    pub(crate) fn as_leaf_mut(&mut self) -> Option<&mut Leaf<A, V>> {
        match &mut self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Split { .. } => None,
        }
    }

    #[inline]
    pub(crate) fn is_split(&self) -> bool {
        matches!(self.kind, NodeKind::Split { .. })
    }

    /// Whether `address` lies outside the region this node's prefix covers.
    #[inline]
    pub(crate) fn excludes(&self, address: A) -> bool {
        mask::prefix_diverges(address, self.key(), self.mask)
    }

    /// Whether `[start, end)` misses this node's address block, and so every
    /// range in its subtree.
    #[inline]
    pub(crate) fn block_disjoint(&self, start: A, end: A) -> bool {
        let key = self.key();
        end <= (key & self.mask) || start > (key | !self.mask)
    }

    #[inline]
    pub(crate) fn child_for(&self, address: A) -> Option<NodeId> {
        self.children[mask::child_index(self.mask, address)]
    }

    #[inline]
    pub(crate) fn child_count(&self) -> usize {
        self.children.iter().filter(|c| c.is_some()).count()
    }
}
