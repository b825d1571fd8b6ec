/*!
 * Pool Configuration
 * Construction-time parameters for the page pool
 */

use crate::flags;
use crate::page::PAGE_HEADER_SIZE;
use crate::types::{ConfigError, WORD};
use serde::{Deserialize, Serialize};

/// How arena memory is acquired from the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcquireMode {
    /// Plain page-aligned arenas of the configured size
    #[default]
    Plain,
    /// Fully aligned arenas whose leading system page holds visited flags,
    /// one mark bit per two words of object space
    VisitedFlags,
}

/// Page pool configuration, fixed for the collection's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Bytes per arena; ignored in visited-flags mode, which fixes it
    pub arena_size: usize,
    /// Bytes per page; a power of two larger than the page header
    pub page_size: usize,
    /// Largest request serviceable by `malloc`, in bytes
    pub small_request_threshold: usize,
    /// Arena acquisition strategy
    pub acquire: AcquireMode,
}

impl PoolConfig {
    /// Plain-mode configuration with the given sizes
    pub fn new(arena_size: usize, page_size: usize, small_request_threshold: usize) -> Self {
        Self {
            arena_size,
            page_size,
            small_request_threshold,
            acquire: AcquireMode::Plain,
        }
    }

    /// Visited-flags configuration; the arena size is fixed by the mode
    pub fn with_visited_flags(page_size: usize, small_request_threshold: usize) -> Self {
        Self {
            arena_size: flags::ARENA_SIZE - flags::SYSTEM_PAGE_SIZE,
            page_size,
            small_request_threshold,
            acquire: AcquireMode::VisitedFlags,
        }
    }

    /// Arena size actually used, after the mode override
    pub(crate) fn effective_arena_size(&self) -> usize {
        match self.acquire {
            AcquireMode::Plain => self.arena_size,
            AcquireMode::VisitedFlags => flags::ARENA_SIZE - flags::SYSTEM_PAGE_SIZE,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::PageNotPowerOfTwo(self.page_size));
        }
        if self.page_size <= PAGE_HEADER_SIZE {
            return Err(ConfigError::PageTooSmall {
                page_size: self.page_size,
                header: PAGE_HEADER_SIZE,
            });
        }
        if self.small_request_threshold == 0 || self.small_request_threshold % WORD != 0 {
            return Err(ConfigError::ThresholdNotWordMultiple {
                threshold: self.small_request_threshold,
                word: WORD,
            });
        }
        let usable = self.page_size - PAGE_HEADER_SIZE;
        if self.small_request_threshold > usable {
            return Err(ConfigError::ThresholdTooLarge {
                threshold: self.small_request_threshold,
                usable,
            });
        }
        match self.acquire {
            AcquireMode::Plain => {
                if self.arena_size <= self.page_size || self.arena_size % self.page_size != 0 {
                    return Err(ConfigError::ArenaNotMultipleOfPages {
                        arena_size: self.arena_size,
                        page_size: self.page_size,
                    });
                }
                if self.arena_size > isize::MAX as usize {
                    return Err(ConfigError::ArenaTooLarge(self.arena_size));
                }
            }
            AcquireMode::VisitedFlags => {
                if self.page_size != 4096 && self.page_size != 8192 {
                    return Err(ConfigError::FlagsPageSize(self.page_size));
                }
            }
        }
        Ok(())
    }
}
