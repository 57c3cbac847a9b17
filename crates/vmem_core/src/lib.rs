//! # VMEM Core
//!
//! User-space memory manager over a single pre-allocated arena:
//! - Callers get virtual addresses (VAs), never raw offsets
//! - Every block carries a bit-packed header sized to the arena's address width
//! - Fragmented free space is compacted on demand
//!
//! ## Architecture Rules
//!
//! 1. **One arena** - Allocated once at init, never grown
//! 2. **No gaps** - Blocks partition the arena exactly, header to header
//! 3. **No unsafe** - Every byte access is a bounds-checked slice
//!
//! ## Example
//!
//! ```rust
//! use vmem_core::{MemoryManager, MemoryError};
//!
//! let mut memory = MemoryManager::new(1, 1000)?;
//! let va = memory.alloc(64)?;
//! memory.write(va, b"hello")?;
//! assert_eq!(memory.read(va, 5)?, b"hello");
//! assert!(matches!(memory.read(va + 60, 8), Err(MemoryError::OutOfBounds { .. })));
//! # Ok::<(), MemoryError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;

pub use config::ManagerConfig;
pub use error::{MemoryError, MemoryResult};
pub use memory::{
    Block, BlockHeader, BlockState, BlockWalker, CompactionReport, HeaderCodec, MemoryManager,
    MemoryMap, MemoryStats, VirtualAddress,
};
