//! # Memory Manager Error Types
//!
//! All errors that can occur while managing the arena.

use thiserror::Error;

/// Errors that can occur in the memory manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Malformed or out-of-range caller input.
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    /// No region of sufficient size exists, even after compaction.
    #[error("out of memory: requested {requested} bytes, largest region holds {available}")]
    OutOfMemory {
        /// Bytes requested by the caller.
        requested: usize,
        /// Largest payload that could have been served.
        available: usize,
    },

    /// A read or write range exceeds the owning block.
    #[error("access outside block: va {va} + {len} bytes at offset {offset} exceeds block size {size}")]
    OutOfBounds {
        /// Virtual address the access started at.
        va: usize,
        /// Offset of `va` inside the block.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Declared payload size of the block.
        size: usize,
    },

    /// The arena buffer could not be obtained.
    #[error("failed to allocate arena of {bytes} bytes")]
    AllocationFailed {
        /// Requested arena size.
        bytes: usize,
    },

    /// The virtual address cursor no longer fits in a block header.
    #[error("virtual address space exhausted: next address {next} exceeds limit {limit}")]
    AddressSpaceExhausted {
        /// The address that would have been handed out.
        next: usize,
        /// Largest address the header can encode.
        limit: usize,
    },

    /// A header field does not fit in the arena's address width.
    #[error("header field `{field}` value {value} does not fit in {bits} bits")]
    HeaderOverflow {
        /// Field name (`owner` or `size`).
        field: &'static str,
        /// Offending value.
        value: usize,
        /// Field width in bits.
        bits: u32,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MemoryError {
    /// Returns the legacy integer status code for this error.
    ///
    /// `-1` means invalid parameters, `-2` means not enough memory or an
    /// access outside the block, and `1` is an unknown/internal failure.
    /// Success (`0`) is represented by `Ok`.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidParams(_) | Self::InvalidConfig(_) => -1,
            Self::OutOfMemory { .. } | Self::OutOfBounds { .. } | Self::AddressSpaceExhausted { .. } => -2,
            Self::AllocationFailed { .. } | Self::HeaderOverflow { .. } => 1,
        }
    }
}

/// Result type for memory manager operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
