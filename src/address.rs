//! Word-sized unsigned address types.

use std::fmt;
use std::hash::Hash;
use std::ops::{Add, BitAnd, BitOr, BitXor, Not, Shr};

/// An unsigned machine-word address usable as a [`RangeTree`](crate::RangeTree) key.
///
/// Implemented for `u32`, `u64` and `usize`. Only the bit-level operations
/// the trie needs are exposed; arithmetic never wraps silently.
pub trait Address:
    Copy
    + Ord
    + Eq
    + Hash
    + fmt::Debug
    + fmt::LowerHex
    + Add<Output = Self>
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
    + Shr<u32, Output = Self>
    + Send
    + Sync
    + 'static
{
    /// All bits clear.
    const ZERO: Self;
    const ONE: Self;
    /// All bits set.
    const MAX: Self;
    /// Width of the address in bits.
    const BITS: u32;

    fn leading_zeros(self) -> u32;

    fn checked_shl(self, rhs: u32) -> Option<Self>;

    fn checked_sub(self, rhs: Self) -> Option<Self>;

    /// The address one below `self`, or `None` at zero.
    #[inline]
    fn predecessor(self) -> Option<Self> {
        self.checked_sub(Self::ONE)
    }
}

macro_rules! impl_address {
    ($($t:ty)*) => ($(
        impl Address for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const MAX: Self = <$t>::MAX;
            const BITS: u32 = <$t>::BITS;

            #[inline]
            fn leading_zeros(self) -> u32 {
                <$t>::leading_zeros(self)
            }

            #[inline]
            fn checked_shl(self, rhs: u32) -> Option<Self> {
                <$t>::checked_shl(self, rhs)
            }

            #[inline]
            fn checked_sub(self, rhs: Self) -> Option<Self> {
                <$t>::checked_sub(self, rhs)
            }
        }
    )*)
}

impl_address! { u32 u64 usize }
