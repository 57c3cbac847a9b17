//! # Block Headers
//!
//! Every block in the arena starts with a header of two unsigned fields,
//! each exactly `addrSize` bits wide:
//!
//! ```text
//! bit 0                    addrSize                 2*addrSize
//! ┌────────────────────────┬────────────────────────┬───────────┐
//! │ owner VA (0 = free)    │ payload size           │ padding   │
//! └────────────────────────┴────────────────────────┴───────────┘
//! ```
//!
//! The packed value is stored little-endian in `ceil(2*addrSize / 8)` bytes.
//! Packing goes through a `u128`, so arenas up to the full `usize` range
//! encode without depending on the host's native integer width.

use crate::error::{MemoryError, MemoryResult};

use super::address::{address_bits, VirtualAddress};

/// Ownership state of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Unowned space, available to the allocator.
    Free,
    /// Allocated to the caller holding this VA.
    Occupied(VirtualAddress),
}

/// Decoded block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockHeader {
    /// Whether the block is free or owned.
    pub state: BlockState,
    /// Payload size in bytes, excluding the header.
    pub size: usize,
}

impl BlockHeader {
    /// Creates a free block header.
    #[inline]
    #[must_use]
    pub const fn free(size: usize) -> Self {
        Self { state: BlockState::Free, size }
    }

    /// Creates a header for a block owned by `va`.
    #[inline]
    #[must_use]
    pub const fn occupied(va: VirtualAddress, size: usize) -> Self {
        Self { state: BlockState::Occupied(va), size }
    }

    /// Checks if the block is free.
    #[inline]
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.state, BlockState::Free)
    }

    /// Returns the owning VA, if any.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> Option<VirtualAddress> {
        match self.state {
            BlockState::Free => None,
            BlockState::Occupied(va) => Some(va),
        }
    }

    /// Returns the offset of `va` inside this block's range `[owner, owner + size)`.
    ///
    /// Free blocks own no addresses and always return `None`.
    #[inline]
    #[must_use]
    pub fn offset_of(&self, va: VirtualAddress) -> Option<usize> {
        let owner = self.owner()?;
        let offset = va.get().checked_sub(owner.get())?;
        (offset < self.size).then_some(offset)
    }

    /// Checks if `va` falls inside this block's range.
    #[inline]
    #[must_use]
    pub fn contains(&self, va: VirtualAddress) -> bool {
        self.offset_of(va).is_some()
    }
}

/// Packs and unpacks block headers for one arena's address width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderCodec {
    /// Width of each field in bits.
    bits: u32,
    /// Encoded header width in bytes.
    width: usize,
}

impl HeaderCodec {
    /// Widest supported field; two of them fill the `u128` packing word.
    pub const MAX_BITS: u32 = 64;

    /// Creates the codec for an arena of `total_bytes`.
    #[must_use]
    pub const fn for_arena(total_bytes: usize) -> Self {
        // `address_bits` yields 1..=usize::BITS, never more than MAX_BITS.
        Self::from_valid_bits(address_bits(total_bytes))
    }

    /// Creates a codec with `bits`-wide fields.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidParams`] unless `bits` is in `1..=MAX_BITS`.
    pub fn with_bits(bits: u32) -> MemoryResult<Self> {
        if bits == 0 || bits > Self::MAX_BITS {
            return Err(MemoryError::InvalidParams("header field width must be 1 to 64 bits"));
        }
        Ok(Self::from_valid_bits(bits))
    }

    const fn from_valid_bits(bits: u32) -> Self {
        Self {
            bits,
            width: (2 * bits).div_ceil(8) as usize,
        }
    }

    /// Width of each field in bits (`addrSize`).
    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Encoded header width in bytes.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Largest value either field can hold, `2^addrSize - 1`.
    #[inline]
    #[must_use]
    pub fn max_value(&self) -> usize {
        usize::try_from(self.mask()).unwrap_or(usize::MAX)
    }

    #[inline]
    const fn mask(&self) -> u128 {
        (1u128 << self.bits) - 1
    }

    /// Encodes `header` into the first `width()` bytes of `out`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::HeaderOverflow`] if a field does not fit in
    /// `addrSize` bits, and [`MemoryError::InvalidParams`] for an occupied
    /// header carrying the reserved null VA. Nothing is written on error.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than `width()`.
    pub fn encode(&self, header: BlockHeader, out: &mut [u8]) -> MemoryResult<()> {
        let owner = match header.state {
            BlockState::Free => 0,
            BlockState::Occupied(va) if va.is_null() => {
                return Err(MemoryError::InvalidParams("virtual address 0 is reserved for free blocks"));
            }
            BlockState::Occupied(va) => va.get(),
        };
        self.check_field("owner", owner)?;
        self.check_field("size", header.size)?;

        let packed = (owner as u128) | ((header.size as u128) << self.bits);
        out[..self.width].copy_from_slice(&packed.to_le_bytes()[..self.width]);
        Ok(())
    }

    /// Decodes a header from the first `width()` bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than `width()`.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> BlockHeader {
        let mut raw = [0u8; 16];
        raw[..self.width].copy_from_slice(&bytes[..self.width]);
        let packed = u128::from_le_bytes(raw);

        let mask = self.mask();
        let owner = (packed & mask) as usize;
        let size = ((packed >> self.bits) & mask) as usize;

        let state = if owner == 0 {
            BlockState::Free
        } else {
            BlockState::Occupied(VirtualAddress::new(owner))
        };
        BlockHeader { state, size }
    }

    fn check_field(&self, field: &'static str, value: usize) -> MemoryResult<()> {
        if (value as u128) > self.mask() {
            return Err(MemoryError::HeaderOverflow {
                field,
                value,
                bits: self.bits,
            });
        }
        Ok(())
    }
}
