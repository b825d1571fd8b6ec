/*!
 * Page Pool Library
 * Size-class page allocator for the small objects of a tracing collector
 */

pub mod arena;
pub mod config;
pub mod flags;
pub mod page;
pub mod pool;
pub mod types;

mod raw;

// Re-exports
pub use arena::Arena;
pub use config::{AcquireMode, PoolConfig};
pub use page::start_of_page;
pub use pool::ArenaCollection;
pub use types::{Address, ConfigError, PoolStats, Size, WORD};
