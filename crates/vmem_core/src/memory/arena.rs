//! # Arena Storage
//!
//! The single contiguous byte buffer backing all managed memory.
//!
//! The arena is partitioned into blocks with no gaps and no overlaps:
//! each block's successor starts at `offset + header_size + size`, and the
//! last block ends exactly at the end of the buffer.

use std::ops::Range;

use crate::error::{MemoryError, MemoryResult};

use super::header::{BlockHeader, HeaderCodec};
use super::walker::BlockWalker;

/// Fixed-size byte arena holding the block chain.
///
/// All access goes through offsets into an owned buffer; every slice is
/// bounds-checked.
///
/// # Thread Safety
///
/// The arena is single-owner. Mutation requires `&mut self`.
pub struct Arena {
    /// The backing storage.
    bytes: Box<[u8]>,
    /// Header layout for this arena's address width.
    codec: HeaderCodec,
}

impl Arena {
    /// Creates an arena of `total_bytes` holding a single free block.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidParams`] if the arena cannot hold more
    /// than one header, and [`MemoryError::AllocationFailed`] if the buffer
    /// cannot be reserved.
    pub fn new(total_bytes: usize) -> MemoryResult<Self> {
        let codec = HeaderCodec::for_arena(total_bytes);
        if total_bytes <= codec.width() {
            return Err(MemoryError::InvalidParams("arena must be larger than one block header"));
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(total_bytes)
            .map_err(|_| MemoryError::AllocationFailed { bytes: total_bytes })?;
        storage.resize(total_bytes, 0);

        let mut arena = Self {
            bytes: storage.into_boxed_slice(),
            codec,
        };
        arena.write_header(0, BlockHeader::free(total_bytes - codec.width()))?;
        Ok(arena)
    }

    /// Total arena size in bytes.
    #[inline]
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Encoded header width in bytes.
    #[inline]
    #[must_use]
    pub const fn header_size(&self) -> usize {
        self.codec.width()
    }

    /// The header codec for this arena.
    #[inline]
    #[must_use]
    pub const fn codec(&self) -> &HeaderCodec {
        &self.codec
    }

    /// Largest payload a single block can ever hold.
    #[inline]
    #[must_use]
    pub fn usable_capacity(&self) -> usize {
        self.total_bytes() - self.header_size()
    }

    /// Reads the header of the block starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` does not leave room for a header.
    #[must_use]
    pub fn read_header(&self, offset: usize) -> BlockHeader {
        self.codec.decode(&self.bytes[offset..offset + self.header_size()])
    }

    /// Offset of the block that follows the block at `offset`.
    #[inline]
    #[must_use]
    pub const fn next_offset(&self, offset: usize, header: &BlockHeader) -> usize {
        offset + self.header_size() + header.size
    }

    /// Walks the block chain from the start of the arena.
    #[inline]
    #[must_use]
    pub fn walk(&self) -> BlockWalker<'_> {
        BlockWalker::new(self)
    }

    /// Borrows a byte range of the arena.
    #[inline]
    #[must_use]
    pub fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.bytes[range]
    }

    /// Writes a header at `offset`.
    pub(crate) fn write_header(&mut self, offset: usize, header: BlockHeader) -> MemoryResult<()> {
        let end = offset + self.header_size();
        self.codec.encode(header, &mut self.bytes[offset..end])
    }

    /// Mutably borrows a byte range of the arena.
    #[inline]
    pub(crate) fn bytes_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        &mut self.bytes[range]
    }

    /// Copies `len` bytes from `src` to `dst`; the ranges may overlap.
    #[inline]
    pub(crate) fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.bytes.copy_within(src..src + len, dst);
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("total_bytes", &self.total_bytes())
            .field("address_bits", &self.codec.bits())
            .field("header_size", &self.header_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_arena_is_one_free_block() {
        let arena = Arena::new(1000).unwrap();
        assert_eq!(arena.total_bytes(), 1000);
        assert_eq!(arena.header_size(), 3);
        assert_eq!(arena.read_header(0), BlockHeader::free(997));
        assert_eq!(arena.next_offset(0, &arena.read_header(0)), 1000);
    }

    #[test]
    fn test_arena_too_small() {
        assert!(matches!(Arena::new(0), Err(MemoryError::InvalidParams(_))));
        assert!(matches!(Arena::new(1), Err(MemoryError::InvalidParams(_))));
        let tiny = Arena::new(2).unwrap();
        assert_eq!(tiny.read_header(0), BlockHeader::free(1));
    }

    #[test]
    fn test_copy_within_overlapping() {
        let mut arena = Arena::new(64).unwrap();
        arena.bytes_mut(10..14).copy_from_slice(b"abcd");
        arena.copy_within(10, 8, 4);
        assert_eq!(arena.bytes(8..12), b"abcd");
    }
}
