//! Node pool with a free list.
//!
//! Slots are reused after `free`; every reuse bumps the slot generation so
//! that a [`LeafHandle`] issued for the previous occupant stops resolving.

use crate::node::{LeafHandle, Node, NodeId};

/// Pool could not supply a slot. Carries the live node count at the time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PoolExhausted {
    pub(crate) capacity: usize,
}

#[derive(Clone, Debug)]
struct Slot<A, V> {
    generation: u32,
    node: Option<Node<A, V>>,
}

#[derive(Clone, Debug)]
pub(crate) struct NodePool<A, V> {
    slots: Vec<Slot<A, V>>,
    free: Vec<u32>,
    live: usize,
    max_nodes: Option<usize>,
}

impl<A, V> NodePool<A, V> {
    pub(crate) fn new(initial_capacity: usize, max_nodes: Option<usize>) -> Self {
        let reserve = max_nodes.map_or(initial_capacity, |max| initial_capacity.min(max));
        Self {
            slots: Vec::with_capacity(reserve),
            free: Vec::new(),
            live: 0,
            max_nodes,
        }
    }

    /// Number of live nodes.
    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Id the next `alloc` will hand out, together with its generation.
    pub(crate) fn next_handle(&self) -> LeafHandle {
        match self.free.last() {
            Some(&index) => LeafHandle {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => LeafHandle {
                index: self.slots.len() as u32,
                generation: 0,
            },
        }
    }

    pub(crate) fn alloc(&mut self, node: Node<A, V>) -> Result<NodeId, PoolExhausted> {
        let exhausted = PoolExhausted {
            capacity: self.live,
        };
        if self.max_nodes.is_some_and(|max| self.live >= max) {
            return Err(exhausted);
        }

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.node.is_none(), "free list holds a live slot");
                slot.node = Some(node);
                NodeId(index)
            }
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| exhausted)?;
                self.slots.try_reserve(1).map_err(|_| exhausted)?;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId(index)
            }
        };
        self.live += 1;
        Ok(id)
    }

    /// Release `id`, returning the node it held.
    pub(crate) fn free(&mut self, id: NodeId) -> Node<A, V> {
        let slot = &mut self.slots[id.index()];
        let node = slot.node.take();
        debug_assert!(node.is_some(), "double free of node slot {}", id.0);
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.0);
        self.live -= 1;
        match node {
            Some(node) => node,
            None => unreachable!("double free of node slot {}", id.0),
        }
    }

    /// Swap the node held by `id` for `node`, invalidating outstanding handles.
    pub(crate) fn replace(&mut self, id: NodeId, node: Node<A, V>) -> Node<A, V> {
        let slot = &mut self.slots[id.index()];
        slot.generation = slot.generation.wrapping_add(1);
        match slot.node.replace(node) {
            Some(old) => old,
            None => unreachable!("replace on free node slot {}", id.0),
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &Node<A, V> {
        match &self.slots[id.index()].node {
            Some(node) => node,
            None => unreachable!("dangling node id {}", id.0),
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<A, V> {
        match &mut self.slots[id.index()].node {
            Some(node) => node,
            None => unreachable!("dangling node id {}", id.0),
        }
    }

    /// Resolve a handle, or `None` if its generation has moved on.
    pub(crate) fn resolve(&self, handle: LeafHandle) -> Option<&Node<A, V>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub(crate) fn resolve_mut(&mut self, handle: LeafHandle) -> Option<&mut Node<A, V>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Drop every node. Generations survive so stale handles stay stale.
    pub(crate) fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        // Hand out low indices first.
        self.free.reverse();
        self.live = 0;
    }
}
