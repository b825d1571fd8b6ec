/*!
 * Pool Types
 * Common types for the page pool allocator
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address type for memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Machine word size in bytes
pub const WORD: usize = std::mem::size_of::<usize>();

/// log2 of the word size, for deriving size classes by shifting
pub(crate) const WORD_POWER_2: u32 = WORD.trailing_zeros();

const _: () = assert!(1 << WORD_POWER_2 == WORD);

/// Configuration errors reported at pool construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("page size {page_size} does not exceed the page header ({header} bytes)")]
    PageTooSmall { page_size: usize, header: usize },

    #[error("page size {0} is not a power of two")]
    PageNotPowerOfTwo(usize),

    #[error("arena size {arena_size} is not a multiple of the page size {page_size} larger than it")]
    ArenaNotMultipleOfPages { arena_size: usize, page_size: usize },

    #[error("arena size {0} overflows the maximum allocation size")]
    ArenaTooLarge(usize),

    #[error("small request threshold {threshold} is not a nonzero multiple of the word size ({word} bytes)")]
    ThresholdNotWordMultiple { threshold: usize, word: usize },

    #[error("small request threshold {threshold} exceeds the usable page space ({usable} bytes)")]
    ThresholdTooLarge { threshold: usize, usable: usize },

    #[error("visited-flags mode requires a page size of 4096 or 8192, got {0}")]
    FlagsPageSize(usize),
}

/// Point-in-time allocator statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Payload bytes in live blocks, excluding header overhead
    pub total_memory_used: usize,
    /// Live arenas, counting the one currently being carved
    pub arena_count: usize,
    /// Total pages across all live arenas
    pub total_pages: usize,
    /// Pages sitting on arena free-page chains
    pub free_pages: usize,
    /// Never-touched pages remaining in the arena being carved
    pub uninitialized_pages: usize,
}
