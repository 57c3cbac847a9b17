//! # Virtual Addresses
//!
//! Callers never see arena offsets. Every allocation is identified by a
//! virtual address (VA); the VA plus a byte offset addresses memory inside
//! that allocation.

use std::fmt;
use std::ops::Add;

/// Opaque caller-facing handle for an allocated block.
///
/// Address `0` is reserved and never handed out. Adding a byte offset to a
/// VA produces an interior address that `read`/`write` resolve to the same
/// block as long as it stays inside the block's range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtualAddress(usize);

impl VirtualAddress {
    /// The reserved "no owner" address.
    pub const NULL: Self = Self(0);

    /// The first address handed out by a fresh manager.
    pub const FIRST: Self = Self(1);

    /// Wraps a raw address value.
    #[inline]
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw address value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Checks if this is the reserved null address.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the address `delta` bytes further on, or `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, delta: usize) -> Option<Self> {
        match self.0.checked_add(delta) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl Add<usize> for VirtualAddress {
    type Output = Self;

    /// Saturates instead of wrapping; a saturated address never resolves.
    fn add(self, delta: usize) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of bits needed to address an arena of `total_bytes`.
///
/// This is `ceil(log2(total_bytes))`, never less than one bit.
#[inline]
#[must_use]
pub const fn address_bits(total_bytes: usize) -> u32 {
    if total_bytes <= 2 {
        return 1;
    }
    usize::BITS - (total_bytes - 1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_bits() {
        assert_eq!(address_bits(1), 1);
        assert_eq!(address_bits(2), 1);
        assert_eq!(address_bits(3), 2);
        assert_eq!(address_bits(4), 2);
        assert_eq!(address_bits(5), 3);
        assert_eq!(address_bits(1000), 10);
        assert_eq!(address_bits(1024), 10);
        assert_eq!(address_bits(1025), 11);
        assert_eq!(address_bits(65536), 16);
    }

    #[test]
    fn test_va_arithmetic() {
        let va = VirtualAddress::new(7);
        assert_eq!((va + 3).get(), 10);
        assert_eq!(VirtualAddress::new(usize::MAX) + 1, VirtualAddress::new(usize::MAX));
        assert!(VirtualAddress::new(usize::MAX).checked_add(1).is_none());
        assert!(VirtualAddress::NULL.is_null());
        assert!(!VirtualAddress::FIRST.is_null());
    }
}
