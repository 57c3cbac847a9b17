//! # Memory Management
//!
//! A single pre-allocated arena carved into blocks, addressed through
//! virtual addresses instead of raw offsets.
//!
//! ## Layering
//!
//! ```text
//! MemoryManager ──► BlockWalker ──► HeaderCodec ──► Arena bytes
//!       │
//!       └──────► Defragmenter (on allocation failure)
//! ```

mod address;
mod arena;
mod defrag;
mod header;
mod manager;
mod stats;
mod walker;

pub use address::{address_bits, VirtualAddress};
pub use arena::Arena;
pub use defrag::CompactionReport;
pub use header::{BlockHeader, BlockState, HeaderCodec};
pub use manager::MemoryManager;
pub use stats::{MemoryMap, MemoryStats};
pub use walker::{Block, BlockWalker};
