//! # Memory Manager
//!
//! The public allocator API: `init`, `alloc`, `free`, `read`, `write`.
//!
//! ## Address Assignment
//!
//! Virtual addresses come from a cursor over a virtual address space that
//! starts at 1. Each allocation takes the cursor and advances it by the
//! block's size, so the ranges `[va, va + size)` of different allocations
//! never overlap and an address is never handed out twice. The cursor must
//! fit in a header's owner field; once it does not, allocation fails with
//! [`MemoryError::AddressSpaceExhausted`].
//!
//! ## Error Behavior
//!
//! A failed call leaves the arena exactly as it was, with one exception:
//! if `alloc` compacted the arena before failing, the new layout stays.

use std::ops::Range;

use crate::config::ManagerConfig;
use crate::error::{MemoryError, MemoryResult};

use super::address::VirtualAddress;
use super::arena::Arena;
use super::defrag::{self, CompactionReport};
use super::header::BlockHeader;
use super::stats::{MemoryMap, MemoryStats};
use super::walker::{Block, BlockWalker};

/// Where a new allocation goes.
enum Placement {
    /// Carve the request from the block and leave a trailing free block.
    Split(Block),
    /// Take the whole block; the leftover is too small for a header.
    Fold(Block),
}

impl Placement {
    const fn block(&self) -> &Block {
        match self {
            Self::Split(block) | Self::Fold(block) => block,
        }
    }
}

/// Single-arena memory manager handing out virtual addresses.
///
/// # Thread Safety
///
/// This manager is NOT thread-safe. Every operation takes `&mut self` or
/// `&self` and runs to completion; concurrent callers must serialize access
/// themselves.
///
/// # Example
///
/// ```rust
/// use vmem_core::MemoryManager;
///
/// let mut memory = MemoryManager::new(1, 1000)?;
/// let va = memory.alloc(106)?;
/// memory.write(va + 2, b"qwerty")?;
/// assert_eq!(memory.read(va + 4, 4)?, b"erty");
/// memory.free(va)?;
/// # Ok::<(), vmem_core::MemoryError>(())
/// ```
#[derive(Debug)]
pub struct MemoryManager {
    /// The arena holding every block.
    arena: Arena,
    /// Next virtual address to hand out.
    next_va: VirtualAddress,
    /// Compact and retry when no free block fits.
    auto_compact: bool,
    /// Compaction passes since the last init.
    compactions: u64,
}

impl MemoryManager {
    /// Creates a manager with an arena of `page_count * page_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidParams`] for zero pages, zero page size,
    /// an overflowing product or an arena too small for one header, and
    /// [`MemoryError::AllocationFailed`] if the buffer cannot be reserved.
    pub fn new(page_count: usize, page_size: usize) -> MemoryResult<Self> {
        Ok(Self {
            arena: Self::build_arena(page_count, page_size)?,
            next_va: VirtualAddress::FIRST,
            auto_compact: true,
            compactions: 0,
        })
    }

    /// Creates a manager from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::new`].
    pub fn from_config(config: &ManagerConfig) -> MemoryResult<Self> {
        let mut manager = Self::new(config.page_count, config.page_size)?;
        manager.auto_compact = config.auto_compact;
        Ok(manager)
    }

    /// Re-initializes the manager with a fresh arena.
    ///
    /// All previous allocations are discarded and the VA counter restarts.
    /// On error the current arena is kept untouched.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::new`].
    pub fn init(&mut self, page_count: usize, page_size: usize) -> MemoryResult<()> {
        self.arena = Self::build_arena(page_count, page_size)?;
        self.next_va = VirtualAddress::FIRST;
        self.compactions = 0;
        Ok(())
    }

    fn build_arena(page_count: usize, page_size: usize) -> MemoryResult<Arena> {
        if page_count == 0 || page_size == 0 {
            return Err(MemoryError::InvalidParams("page count and page size must be positive"));
        }
        let total = page_count
            .checked_mul(page_size)
            .ok_or(MemoryError::InvalidParams("arena size overflows"))?;

        let arena = Arena::new(total)?;
        tracing::info!(
            "Arena initialized: {} bytes, {} address bits, {}-byte headers",
            total,
            arena.codec().bits(),
            arena.header_size()
        );
        Ok(arena)
    }

    /// Allocates `size` bytes and returns the block's virtual address.
    ///
    /// If no free block fits, the arena is compacted once and the search
    /// retried. A block whose leftover would be smaller than one header is
    /// handed out whole, so the recorded size may exceed `size`.
    ///
    /// # Address Budget
    ///
    /// VAs are never reused: each allocation advances the VA cursor by its
    /// recorded size. Over the lifetime of the manager (since the last
    /// `init`) allocations can therefore total at most `2^addrSize - 1`
    /// bytes, roughly the arena size, no matter how much is freed in
    /// between. Once the cursor passes that limit every `alloc` fails with
    /// [`MemoryError::AddressSpaceExhausted`] until the next `init`.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidParams`] if `size` is zero
    /// - [`MemoryError::OutOfMemory`] if no block fits, even after compaction
    /// - [`MemoryError::AddressSpaceExhausted`] if the VA no longer fits a header
    pub fn alloc(&mut self, size: usize) -> MemoryResult<VirtualAddress> {
        if size == 0 {
            return Err(MemoryError::InvalidParams("allocation size must be positive"));
        }
        let usable = self.arena.usable_capacity();
        if size > usable {
            tracing::debug!("Rejected allocation of {} bytes: capacity is {}", size, usable);
            return Err(MemoryError::OutOfMemory {
                requested: size,
                available: usable,
            });
        }

        let va = self.next_va;
        let limit = self.arena.codec().max_value();
        if va.get() > limit {
            return Err(MemoryError::AddressSpaceExhausted { next: va.get(), limit });
        }

        let placement = match self.placement(size) {
            Some(placement) => placement,
            None if self.auto_compact => {
                tracing::debug!("No free block fits {} bytes, compacting", size);
                self.compact()?;
                self.placement(size).ok_or_else(|| self.out_of_memory(size))?
            }
            None => return Err(self.out_of_memory(size)),
        };

        let block = *placement.block();
        let (allocated, kind) = match placement {
            Placement::Split(_) => (size, "split"),
            Placement::Fold(_) => (block.header.size, "fold"),
        };
        let cursor = va
            .checked_add(allocated)
            .ok_or(MemoryError::AddressSpaceExhausted { next: va.get(), limit })?;

        self.arena
            .write_header(block.offset, BlockHeader::occupied(va, allocated))?;
        if let Placement::Split(_) = placement {
            let header_size = self.arena.header_size();
            let leftover = block.header.size - size - header_size;
            self.arena
                .write_header(block.offset + header_size + size, BlockHeader::free(leftover))?;
        }
        self.next_va = cursor;

        tracing::debug!(
            "Allocated va {} ({} bytes) at offset {} ({})",
            va,
            allocated,
            block.offset,
            kind
        );
        Ok(va)
    }

    /// Frees the block containing `va` and merges it with free neighbours.
    ///
    /// Any address inside the allocation frees it, like `read` and `write`
    /// resolve it. The following neighbour is merged first, then the
    /// preceding one, so the backward lookup sees the final extent of the
    /// freed block.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidParams`] if `va` belongs to no allocation.
    pub fn free(&mut self, va: VirtualAddress) -> MemoryResult<()> {
        let block = self
            .arena
            .walk()
            .find_by_va(va)
            .ok_or(MemoryError::InvalidParams("address does not belong to any allocation"))?;

        self.arena
            .write_header(block.offset, BlockHeader::free(block.header.size))?;
        let merged_next = self.merge_with_next(block.offset)?;
        let merged_previous = self.merge_with_previous(block.offset)?;

        tracing::debug!(
            "Freed va {} at offset {} (merged next: {}, merged previous: {})",
            va,
            block.offset,
            merged_next,
            merged_previous
        );
        Ok(())
    }

    /// Absorbs the block after the free block at `offset` if it is free too.
    fn merge_with_next(&mut self, offset: usize) -> MemoryResult<bool> {
        let header = self.arena.read_header(offset);
        let next = self.arena.next_offset(offset, &header);
        if next >= self.arena.total_bytes() {
            return Ok(false);
        }
        let following = self.arena.read_header(next);
        if !following.is_free() {
            return Ok(false);
        }
        let merged = header.size + self.arena.header_size() + following.size;
        self.arena.write_header(offset, BlockHeader::free(merged))?;
        Ok(true)
    }

    /// Folds the free block at `offset` into its predecessor if that is free.
    fn merge_with_previous(&mut self, offset: usize) -> MemoryResult<bool> {
        match self.arena.walk().predecessor(offset) {
            Some(previous) if previous.header.is_free() => self.merge_with_next(previous.offset),
            _ => Ok(false),
        }
    }

    /// Reads `len` bytes starting at `va`.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidParams`] if `va` belongs to no allocation
    /// - [`MemoryError::OutOfBounds`] if the range runs past the block's end
    pub fn read(&self, va: VirtualAddress, len: usize) -> MemoryResult<Vec<u8>> {
        let range = self.resolve(va, len)?;
        Ok(self.arena.bytes(range).to_vec())
    }

    /// Fills `buf` with bytes starting at `va`.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::read`]; `buf` is untouched on error.
    pub fn read_into(&self, va: VirtualAddress, buf: &mut [u8]) -> MemoryResult<()> {
        let range = self.resolve(va, buf.len())?;
        buf.copy_from_slice(self.arena.bytes(range));
        Ok(())
    }

    /// Writes `data` starting at `va`.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidParams`] if `va` belongs to no allocation
    /// - [`MemoryError::OutOfBounds`] if the range runs past the block's end
    pub fn write(&mut self, va: VirtualAddress, data: &[u8]) -> MemoryResult<()> {
        let range = self.resolve(va, data.len())?;
        self.arena.bytes_mut(range).copy_from_slice(data);
        Ok(())
    }

    /// Translates `[va, va + len)` into an arena byte range.
    fn resolve(&self, va: VirtualAddress, len: usize) -> MemoryResult<Range<usize>> {
        const UNMAPPED: MemoryError = MemoryError::InvalidParams("address does not belong to any allocation");

        let block = self.arena.walk().find_by_va(va).ok_or(UNMAPPED)?;
        let offset = block.header.offset_of(va).ok_or(UNMAPPED)?;
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= block.header.size)
            .ok_or(MemoryError::OutOfBounds {
                va: va.get(),
                offset,
                len,
                size: block.header.size,
            })?;

        let payload = block.offset + self.arena.header_size();
        Ok(payload + offset..payload + end)
    }

    /// Compacts the arena: occupied blocks move to the start, free space
    /// coalesces into one trailing block.
    ///
    /// VAs, sizes and contents of all allocations are preserved.
    ///
    /// # Errors
    ///
    /// Propagates header encoding failures, which indicate a corrupted arena.
    pub fn compact(&mut self) -> MemoryResult<CompactionReport> {
        let report = defrag::compact(&mut self.arena)?;
        self.compactions += 1;
        tracing::debug!(
            "Compaction finished: {} blocks moved, {} merges, {} bytes free",
            report.blocks_moved,
            report.merges,
            report.free_bytes
        );
        Ok(report)
    }

    fn placement(&self, size: usize) -> Option<Placement> {
        self.arena
            .walk()
            .find_free(size)
            .map(Placement::Split)
            .or_else(|| self.arena.walk().find_tight_fit(size).map(Placement::Fold))
    }

    fn out_of_memory(&self, size: usize) -> MemoryError {
        let available = self
            .arena
            .walk()
            .filter(|block| block.header.is_free())
            .map(|block| block.header.size)
            .max()
            .unwrap_or(0);
        tracing::debug!("Out of memory: {} bytes requested, largest free block {}", size, available);
        MemoryError::OutOfMemory {
            requested: size,
            available,
        }
    }

    /// Iterates over the block chain in physical order.
    #[must_use]
    pub fn blocks(&self) -> BlockWalker<'_> {
        self.arena.walk()
    }

    /// Collects usage statistics.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        MemoryStats::collect(&self.arena, self.compactions)
    }

    /// Captures a printable snapshot of the block chain.
    #[must_use]
    pub fn memory_map(&self) -> MemoryMap {
        MemoryMap::capture(&self.arena)
    }

    /// The underlying arena.
    #[inline]
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Whether allocation compacts and retries on failure.
    #[inline]
    #[must_use]
    pub const fn auto_compact(&self) -> bool {
        self.auto_compact
    }

    /// Enables or disables compaction on allocation failure.
    #[inline]
    pub fn set_auto_compact(&mut self, enabled: bool) {
        self.auto_compact = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_validates_params() {
        assert!(matches!(MemoryManager::new(0, 1000), Err(MemoryError::InvalidParams(_))));
        assert!(matches!(MemoryManager::new(1, 0), Err(MemoryError::InvalidParams(_))));
        assert!(matches!(
            MemoryManager::new(usize::MAX, 2),
            Err(MemoryError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_first_va_is_one() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        assert_eq!(memory.alloc(106).unwrap(), VirtualAddress::FIRST);
    }

    #[test]
    fn test_va_ranges_do_not_overlap() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let a = memory.alloc(10).unwrap();
        let b = memory.alloc(20).unwrap();
        assert_eq!(b.get(), a.get() + 10);

        memory.write(a + 9, &[1]).unwrap();
        memory.write(b, &[2]).unwrap();
        assert_eq!(memory.read(a + 9, 1).unwrap(), vec![1]);
        assert_eq!(memory.read(b, 1).unwrap(), vec![2]);
    }

    #[test]
    fn test_alloc_splits_free_block() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let va = memory.alloc(106).unwrap();
        let blocks: Vec<_> = memory.blocks().map(|b| (b.offset, b.header)).collect();
        assert_eq!(
            blocks,
            vec![
                (0, BlockHeader::occupied(va, 106)),
                (109, BlockHeader::free(888)),
            ]
        );
    }

    #[test]
    fn test_alloc_folds_small_remainder() {
        // 997 free bytes, 3-byte headers: 995 leaves 2 bytes, too few for a header.
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let va = memory.alloc(995).unwrap();
        let blocks: Vec<_> = memory.blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].header, BlockHeader::occupied(va, 997));
    }

    #[test]
    fn test_alloc_exact_remainder_header() {
        // Leftover of exactly one header becomes an empty free block.
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        memory.alloc(994).unwrap();
        let blocks: Vec<_> = memory.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].header, BlockHeader::free(0));
    }

    #[test]
    fn test_alloc_rejects_zero_and_oversized() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        assert!(matches!(memory.alloc(0), Err(MemoryError::InvalidParams(_))));
        assert_eq!(
            memory.alloc(998),
            Err(MemoryError::OutOfMemory { requested: 998, available: 997 })
        );
        assert!(memory.alloc(997).is_ok());
    }

    #[test]
    fn test_free_by_interior_address() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let va = memory.alloc(50).unwrap();
        assert!(matches!(memory.free(va + 50), Err(MemoryError::InvalidParams(_))));
        assert!(matches!(memory.free(VirtualAddress::NULL), Err(MemoryError::InvalidParams(_))));

        memory.free(va + 3).unwrap();
        assert_eq!(memory.stats().occupied_blocks, 0);
        assert!(matches!(memory.free(va), Err(MemoryError::InvalidParams(_))));
        assert!(matches!(memory.free(va + 3), Err(MemoryError::InvalidParams(_))));
    }

    #[test]
    fn test_free_interior_address_merges_neighbours() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let a = memory.alloc(100).unwrap();
        let b = memory.alloc(100).unwrap();
        let c = memory.alloc(100).unwrap();
        let _d = memory.alloc(100).unwrap();

        memory.free(a + 99).unwrap();
        memory.free(c + 1).unwrap();
        memory.free(b + 42).unwrap();

        let blocks: Vec<_> = memory.blocks().map(|b| b.header).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], BlockHeader::free(306));
        assert!(!blocks[1].is_free());
        assert!(blocks[2].is_free());
    }

    #[test]
    fn test_free_merges_both_neighbours() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let a = memory.alloc(100).unwrap();
        let b = memory.alloc(100).unwrap();
        let c = memory.alloc(100).unwrap();
        let _d = memory.alloc(100).unwrap();

        memory.free(a).unwrap();
        memory.free(c).unwrap();
        assert_eq!(memory.stats().free_blocks, 3);

        memory.free(b).unwrap();
        let blocks: Vec<_> = memory.blocks().map(|b| b.header).collect();
        assert_eq!(blocks[0], BlockHeader::free(306));
        assert!(!blocks[1].is_free());
        assert!(blocks[2].is_free());
        assert_eq!(blocks.len(), 3);
    }

    #[test]
    fn test_read_write_bounds() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let va = memory.alloc(8).unwrap();

        memory.write(va, b"abcdefgh").unwrap();
        assert_eq!(
            memory.write(va + 1, b"abcdefgh"),
            Err(MemoryError::OutOfBounds { va: va.get() + 1, offset: 1, len: 8, size: 8 })
        );
        assert!(matches!(memory.read(va + 8, 0), Err(MemoryError::InvalidParams(_))));
        assert_eq!(memory.read(va + 7, 0).unwrap(), Vec::<u8>::new());

        let mut buf = [0u8; 3];
        memory.read_into(va + 5, &mut buf).unwrap();
        assert_eq!(&buf, b"fgh");
    }

    #[test]
    fn test_reinit_resets_state() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        memory.alloc(10).unwrap();
        memory.init(2, 512).unwrap();
        assert_eq!(memory.arena().total_bytes(), 1024);
        assert_eq!(memory.stats().block_count, 1);
        assert_eq!(memory.alloc(10).unwrap(), VirtualAddress::FIRST);
    }

    #[test]
    fn test_failed_reinit_keeps_arena() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        let va = memory.alloc(10).unwrap();
        memory.write(va, b"keep").unwrap();
        assert!(memory.init(0, 10).is_err());
        assert_eq!(memory.read(va, 4).unwrap(), b"keep");
    }

    #[test]
    fn test_address_space_exhaustion() {
        // 64-byte arena: 6-bit fields, VAs up to 63.
        let mut memory = MemoryManager::new(1, 64).unwrap();
        for _ in 0..3 {
            let va = memory.alloc(20).unwrap();
            memory.free(va).unwrap();
        }
        // Cursor is now 61; one more allocation of 20 pushes it past 63.
        let va = memory.alloc(20).unwrap();
        assert_eq!(va.get(), 61);
        memory.free(va).unwrap();
        assert_eq!(
            memory.alloc(1),
            Err(MemoryError::AddressSpaceExhausted { next: 81, limit: 63 })
        );
    }

    #[test]
    fn test_address_budget_on_empty_arena() {
        // 1000 bytes: 10-bit fields, VAs up to 1023.
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        for cycle in 0..11 {
            let va = memory.alloc(100).unwrap();
            assert_eq!(va.get(), 1 + cycle * 100);
            memory.free(va).unwrap();
        }

        let err = memory.alloc(100).unwrap_err();
        assert_eq!(err, MemoryError::AddressSpaceExhausted { next: 1101, limit: 1023 });
        assert_eq!(err.code(), -2);
        // The arena itself is empty; only the address budget is spent.
        assert_eq!(memory.stats().free_bytes, 997);

        memory.init(1, 1000).unwrap();
        assert_eq!(memory.alloc(100).unwrap(), VirtualAddress::FIRST);
    }

    #[test]
    fn test_no_auto_compact() {
        let mut memory = MemoryManager::new(1, 1000).unwrap();
        memory.set_auto_compact(false);
        let a = memory.alloc(300).unwrap();
        let _b = memory.alloc(300).unwrap();
        let c = memory.alloc(300).unwrap();
        memory.free(a).unwrap();
        memory.free(c).unwrap();

        assert!(matches!(memory.alloc(500), Err(MemoryError::OutOfMemory { .. })));
        assert_eq!(memory.stats().compactions, 0);

        memory.set_auto_compact(true);
        assert!(memory.alloc(500).is_ok());
        assert_eq!(memory.stats().compactions, 1);
    }
}
