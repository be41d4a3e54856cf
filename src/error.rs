//! Error types returned by [`RangeTree`](crate::RangeTree) mutations.

use thiserror::Error;

use crate::address::Address;

/// Errors that can occur when inserting a range.
///
/// A failed insert leaves the tree exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeTreeError<A: Address> {
    /// The range is empty or inverted (`end <= start`).
    #[error("invalid range [{start:#x}, {end:#x}): end must be greater than start")]
    InvalidRange {
        /// Requested start.
        start: A,
        /// Requested end (exclusive).
        end: A,
    },

    /// The range intersects a range that is already registered.
    #[error(
        "range [{start:#x}, {end:#x}) overlaps registered range [{existing_start:#x}, {existing_end:#x})"
    )]
    Overlap {
        /// Requested start.
        start: A,
        /// Requested end (exclusive).
        end: A,
        /// Start of the conflicting registered range.
        existing_start: A,
        /// End of the conflicting registered range.
        existing_end: A,
    },

    /// The node pool could not supply another node.
    #[error("node pool exhausted: capacity {capacity} nodes")]
    OutOfMemory {
        /// Number of nodes the pool held when the allocation failed.
        capacity: usize,
    },
}

impl<A: Address> RangeTreeError<A> {
    /// Whether the caller passed a range that can never be inserted as-is.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidRange { .. } | Self::Overlap { .. })
    }
}
