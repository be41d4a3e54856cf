//! In-order traversal.

use std::iter::FusedIterator;

use smallvec::SmallVec;

use crate::address::Address;
use crate::node::{Leaf, NodeId};
use crate::pool::NodePool;

#[derive(Clone, Copy)]
enum Visit {
    Descend(NodeId),
    Emit(NodeId),
}

/// Query window for a ranged walk.
#[derive(Clone, Copy)]
struct Window<A> {
    start: A,
    end: A,
}

/// Iterator over registered ranges in ascending order of start address.
///
/// Created by [`RangeTree::iter`](crate::RangeTree::iter) and
/// [`RangeTree::iter_range`](crate::RangeTree::iter_range). The tree stays
/// borrowed for the iterator's lifetime.
pub struct Iter<'a, A, V> {
    pool: &'a NodePool<A, V>,
    window: Option<Window<A>>,
    // child 0, then the node itself, then child 1
    stack: SmallVec<[Visit; 32]>,
}

impl<'a, A: Address, V> Iter<'a, A, V> {
    pub(crate) fn new(pool: &'a NodePool<A, V>, root: Option<NodeId>, range: Option<(A, A)>) -> Self {
        let window = range.map(|(start, end)| Window { start, end });
        Self {
            pool,
            window,
            stack: root.map(Visit::Descend).into_iter().collect(),
        }
    }
}

impl<'a, A: Address, V> Iterator for Iter<'a, A, V> {
    type Item = &'a Leaf<A, V>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(visit) = self.stack.pop() {
            match visit {
                Visit::Emit(id) => {
                    if let Some(leaf) = self.pool.get(id).as_leaf() {
                        return Some(leaf);
                    }
                }
                Visit::Descend(id) => {
                    let node = self.pool.get(id);
                    if let Some(w) = self.window {
                        if node.block_disjoint(w.start, w.end) {
                            continue;
                        }
                    }

                    if let Some(hi) = node.children[1] {
                        self.stack.push(Visit::Descend(hi));
                    }
                    if let Some(leaf) = node.as_leaf() {
                        let wanted = self.window.map_or(true, |w| leaf.intersects(w.start, w.end));
                        if wanted {
                            self.stack.push(Visit::Emit(id));
                        }
                    }
                    if let Some(lo) = node.children[0] {
                        self.stack.push(Visit::Descend(lo));
                    }
                }
            }
        }
        None
    }
}

impl<A: Address, V> FusedIterator for Iter<'_, A, V> {}

impl<A: Address, V> Clone for Iter<'_, A, V> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool,
            window: self.window,
            stack: self.stack.clone(),
        }
    }
}
