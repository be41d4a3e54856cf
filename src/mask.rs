//! Prefix mask arithmetic.
//!
//! A mask has every bit above the highest differing bit of two addresses set
//! and every bit at or below it clear. The bit immediately below the mask
//! (the highest clear bit) selects which child subtree an address falls into.

use crate::address::Address;

/// Mask of the high-order bits shared by `start` and `end`.
///
/// Equal addresses share every bit, so the mask is all ones.
#[inline]
pub(crate) fn common_mask<A: Address>(start: A, end: A) -> A {
    let diff = start ^ end;
    let width = A::BITS - diff.leading_zeros();
    A::MAX.checked_shl(width).unwrap_or(A::ZERO)
}

/// The single bit just below `mask`.
#[inline]
pub(crate) fn child_bit<A: Address>(mask: A) -> A {
    // Never overflows: `!mask >> 1` always has its top bit clear.
    (!mask >> 1) + A::ONE
}

/// Child slot (`0` or `1`) that `address` descends into beneath a node with `mask`.
#[inline]
pub(crate) fn child_index<A: Address>(mask: A, address: A) -> usize {
    usize::from((address & child_bit(mask)) != A::ZERO)
}

/// Split point of the region `key & mask`: the top address of its 0-side half.
#[inline]
pub(crate) fn split_point<A: Address>(key: A, mask: A) -> A {
    (key & mask) | (!mask >> 1)
}

/// Whether `a` and `b` differ somewhere inside `mask`.
#[inline]
pub(crate) fn prefix_diverges<A: Address>(a: A, b: A, mask: A) -> bool {
    ((a ^ b) & mask) != A::ZERO
}

/// Whether `a` covers a strictly larger region of the address space than `b`.
#[inline]
pub(crate) fn is_wider<A: Address>(a: A, b: A) -> bool {
    // Fewer high ones means a wider region.
    a < b
}
