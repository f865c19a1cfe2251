//! Memory management
//!
//! A fixed-size byte arena split into fixed-size pages. Allocation hands out
//! page sets as numbered blocks; there is no compaction and no partial
//! allocation.
//!
//! # Integration Points
//! - `malloc` / `free` / `meminfo` syscalls go straight to [`PageAllocator`]
//! - Blocks may be tagged with an owning pid for inspection

pub mod page_allocator;

pub use page_allocator::{Block, MemoryInfo, Page, PageAllocator, PageCounts};

use thiserror::Error;

/// Block identifier (monotonic, never reused)
pub type BlockId = u64;

/// Default arena size (1 MiB)
pub const DEFAULT_TOTAL_BYTES: usize = 1024 * 1024;

/// Default page size (4 KiB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Page allocator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Out of memory: need {needed} pages, {available} free")]
    OutOfMemory { needed: usize, available: usize },

    #[error("Unknown block: {block}")]
    UnknownBlock { block: BlockId },

    #[error("Access out of bounds: block {block}, offset {offset}, len {len}, capacity {capacity}")]
    OutOfBounds {
        block: BlockId,
        offset: usize,
        len: usize,
        capacity: usize,
    },
}

pub type Result<T> = core::result::Result<T, MemoryError>;
