//! # Block Traversal
//!
//! Walks the arena as a chain of contiguous blocks. There is no index: every
//! lookup is a linear scan from the start of the arena, O(number of blocks).

use super::address::VirtualAddress;
use super::arena::Arena;
use super::header::BlockHeader;

/// A block located in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    /// Physical offset of the block's header.
    pub offset: usize,
    /// Decoded header.
    pub header: BlockHeader,
}

/// Iterator over the blocks of an arena, in physical order.
#[derive(Clone, Debug)]
pub struct BlockWalker<'a> {
    arena: &'a Arena,
    cursor: usize,
}

impl<'a> BlockWalker<'a> {
    /// Creates a walker positioned at the first block.
    #[must_use]
    pub fn new(arena: &'a Arena) -> Self {
        Self { arena, cursor: 0 }
    }

    /// Finds the occupied block whose range `[owner, owner + size)` contains `va`.
    #[must_use]
    pub fn find_by_va(mut self, va: VirtualAddress) -> Option<Block> {
        self.find(|block| block.header.contains(va))
    }

    /// Finds the first free block that can hold `min_size` bytes plus a
    /// trailing remainder header.
    #[must_use]
    pub fn find_free(mut self, min_size: usize) -> Option<Block> {
        let needed = min_size.saturating_add(self.arena.header_size());
        self.find(|block| block.header.is_free() && block.header.size >= needed)
    }

    /// Finds the first free block of at least `min_size` bytes, whether or
    /// not it leaves room for a remainder header.
    #[must_use]
    pub fn find_tight_fit(mut self, min_size: usize) -> Option<Block> {
        self.find(|block| block.header.is_free() && block.header.size >= min_size)
    }

    /// Finds the block physically preceding the block at `offset`.
    ///
    /// Returns `None` for the first block or an offset that is not a block start.
    #[must_use]
    pub fn predecessor(self, offset: usize) -> Option<Block> {
        let mut previous = None;
        for block in self {
            if block.offset == offset {
                return previous;
            }
            if block.offset > offset {
                break;
            }
            previous = Some(block);
        }
        None
    }
}

impl Iterator for BlockWalker<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.cursor >= self.arena.total_bytes() {
            return None;
        }
        let block = Block {
            offset: self.cursor,
            header: self.arena.read_header(self.cursor),
        };
        self.cursor = self.arena.next_offset(block.offset, &block.header);
        Some(block)
    }
}
