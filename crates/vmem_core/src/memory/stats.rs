//! # Usage Statistics
//!
//! Read-only views over the arena: aggregate counters and a printable
//! block-by-block memory map.

use std::fmt;

use super::arena::Arena;
use super::walker::Block;

/// Aggregate arena statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Total arena size in bytes.
    pub total_bytes: usize,
    /// Address width in bits.
    pub address_bits: u32,
    /// Header width in bytes.
    pub header_size: usize,
    /// Number of blocks in the chain.
    pub block_count: usize,
    /// Number of occupied blocks.
    pub occupied_blocks: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Payload bytes held by occupied blocks.
    pub used_bytes: usize,
    /// Payload bytes held by free blocks.
    pub free_bytes: usize,
    /// Largest single free payload.
    pub largest_free_block: usize,
    /// Compaction passes run since the last init.
    pub compactions: u64,
}

impl MemoryStats {
    /// Collects statistics by walking `arena`.
    #[must_use]
    pub fn collect(arena: &Arena, compactions: u64) -> Self {
        let mut stats = Self {
            total_bytes: arena.total_bytes(),
            address_bits: arena.codec().bits(),
            header_size: arena.header_size(),
            compactions,
            ..Self::default()
        };

        for block in arena.walk() {
            stats.block_count += 1;
            if block.header.is_free() {
                stats.free_blocks += 1;
                stats.free_bytes += block.header.size;
                stats.largest_free_block = stats.largest_free_block.max(block.header.size);
            } else {
                stats.occupied_blocks += 1;
                stats.used_bytes += block.header.size;
            }
        }
        stats
    }

    /// Bytes spent on block headers.
    #[inline]
    #[must_use]
    pub const fn header_overhead(&self) -> usize {
        self.block_count * self.header_size
    }
}

/// Snapshot of the block chain, printable as a table.
///
/// ```text
/// === memory state === (header size is 3 bytes)
/// va       size(bytes)
/// 1        106
/// 0        888
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryMap {
    /// Header width in bytes.
    pub header_size: usize,
    /// Blocks in physical order.
    pub blocks: Vec<Block>,
}

impl MemoryMap {
    /// Captures the current block chain of `arena`.
    #[must_use]
    pub fn capture(arena: &Arena) -> Self {
        Self {
            header_size: arena.header_size(),
            blocks: arena.walk().collect(),
        }
    }
}

impl fmt::Display for MemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== memory state === (header size is {} bytes)", self.header_size)?;
        writeln!(f, "va\t size(bytes)")?;
        for block in &self.blocks {
            let owner = block.header.owner().map_or(0, |va| va.get());
            writeln!(f, "{owner}\t {}", block.header.size)?;
        }
        Ok(())
    }
}
