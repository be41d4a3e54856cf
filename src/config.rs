//! Tree configuration.

/// Configuration for a [`RangeTree`](crate::RangeTree).
///
/// Both leaves and split nodes live in the tree's node pool, so
/// `max_nodes` bounds the total of the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Number of node slots reserved up front.
    pub initial_capacity: usize,
    /// Upper bound on live nodes; `None` means limited only by the allocator.
    pub max_nodes: Option<usize>,
}

impl TreeConfig {
    /// Default number of node slots reserved up front.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

    /// Create a config with the default initial capacity and no node limit.
    pub fn new() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            max_nodes: None,
        }
    }

    /// Set the initial slot reservation.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Cap the pool at `max_nodes` live nodes.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}
