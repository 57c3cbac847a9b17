//! # Defragmentation
//!
//! Compacts the arena so that every occupied block sits contiguously at the
//! start, followed by at most one free block.
//!
//! ## Algorithm
//!
//! Two cursors walk the chain, `block` and `next` (its physical successor):
//!
//! ```text
//! block occupied            -> advance
//! block free, next occupied -> swap: occupied moves down, free moves up
//! block free, next free     -> merge next into block, stay put
//! ```
//!
//! A swap copies the occupied payload with a memmove, so overlapping source
//! and destination ranges are safe. Owners, sizes and payload bytes are
//! preserved; only physical offsets change. VA lookups are recomputed on
//! every access, so callers observe no difference.

use crate::error::MemoryResult;

use super::arena::Arena;
use super::header::{BlockHeader, BlockState};

/// Summary of one compaction pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Occupied blocks moved towards the start of the arena.
    pub blocks_moved: usize,
    /// Adjacent free blocks merged together.
    pub merges: usize,
    /// Payload size of the trailing free block, 0 if the arena is full.
    pub free_bytes: usize,
}

/// Compacts `arena` in place.
///
/// Each swap moves one occupied block down by the size of the free block in
/// front of it, so the pass is linear in blocks plus bytes moved.
pub(crate) fn compact(arena: &mut Arena) -> MemoryResult<CompactionReport> {
    let end = arena.total_bytes();
    let mut report = CompactionReport::default();

    let mut block = 0;
    let mut next = arena.next_offset(block, &arena.read_header(block));

    while next < end {
        let current = arena.read_header(block);
        let following = arena.read_header(next);

        match (current.state, following.state) {
            (BlockState::Occupied(_), _) => {
                block = next;
            }
            (BlockState::Free, BlockState::Occupied(va)) => {
                tracing::trace!("Compaction: moving va {} from {} to {}", va, next, block);
                swap_with_next(arena, block, current, next, following)?;
                report.blocks_moved += 1;
            }
            (BlockState::Free, BlockState::Free) => {
                tracing::trace!("Compaction: merging free blocks at {} and {}", block, next);
                let merged = current.size + arena.header_size() + following.size;
                arena.write_header(block, BlockHeader::free(merged))?;
                report.merges += 1;
            }
        }

        next = arena.next_offset(block, &arena.read_header(block));
    }

    let last = arena.read_header(block);
    if last.is_free() {
        report.free_bytes = last.size;
    }
    Ok(report)
}

/// Swaps a free block with the occupied block that follows it.
///
/// Afterwards the occupied block starts at `free_offset` and the free block
/// directly behind it. The pair occupies the same span as before.
fn swap_with_next(
    arena: &mut Arena,
    free_offset: usize,
    free: BlockHeader,
    occupied_offset: usize,
    occupied: BlockHeader,
) -> MemoryResult<()> {
    let header_size = arena.header_size();

    // Payload first: the relocated free header may land inside the source range.
    arena.copy_within(
        occupied_offset + header_size,
        free_offset + header_size,
        occupied.size,
    );
    arena.write_header(free_offset, occupied)?;
    arena.write_header(free_offset + header_size + occupied.size, free)?;
    Ok(())
}
