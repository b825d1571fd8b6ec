/*!
 * Allocation Tests
 * Block placement, size classes, and configuration validation
 */

use pagepool::{ArenaCollection, ConfigError, PoolConfig, PoolStats};
use pretty_assertions::assert_eq;

fn pool() -> ArenaCollection {
    crate::init_logging();
    ArenaCollection::new(PoolConfig::new(8192, 512, 64)).unwrap()
}

#[test]
fn test_blocks_of_one_class_are_contiguous() {
    let mut pool = pool();
    let a = pool.malloc(24);
    let b = pool.malloc(24);
    let c = pool.malloc(24);

    assert_eq!(b, a + 24);
    assert_eq!(c, b + 24);
}

#[test]
fn test_each_size_class_gets_its_own_page() {
    let mut pool = pool();
    let a = pool.malloc(8);
    let b = pool.malloc(8);
    let c = pool.malloc(16);

    assert_eq!(b, a + 8);
    // The 16-byte class carved the arena's second page.
    assert_eq!(c, a + 512);
}

#[test]
fn test_page_capacity_accounts_for_the_header() {
    let mut pool = pool();

    // (512 - 32) / 16 = 30 blocks fit after the four-word header; the
    // 31st allocation has to open the next page.
    let first = pool.malloc(16);
    for _ in 1..30 {
        pool.malloc(16);
    }
    let next = pool.malloc(16);
    assert_eq!(next, first + 512);
}

#[test]
fn test_total_memory_used_sums_the_requests() {
    let mut pool = pool();
    for size in [8, 16, 24, 64] {
        pool.malloc(size);
    }
    assert_eq!(pool.total_memory_used(), 112);
}

#[test]
fn test_stats_reflect_carved_pages() {
    let mut pool = ArenaCollection::new(PoolConfig::new(4096, 512, 64)).unwrap();
    pool.malloc(16);
    pool.malloc(16);
    pool.malloc(8);

    assert_eq!(
        pool.stats(),
        PoolStats {
            total_memory_used: 40,
            arena_count: 1,
            total_pages: 8,
            free_pages: 0,
            uninitialized_pages: 6,
        }
    );
}

#[test]
fn test_second_arena_is_acquired_on_demand() {
    let mut pool = ArenaCollection::new(PoolConfig::new(2048, 512, 64)).unwrap();
    for size in [8, 16, 24, 32] {
        pool.malloc(size);
    }
    assert_eq!(pool.stats().arena_count, 1);

    // A fifth size class has no page left in the first arena.
    pool.malloc(40);
    assert_eq!(pool.stats().arena_count, 2);
}

#[test]
fn test_threshold_sized_requests_are_accepted() {
    let mut pool = pool();
    let a = pool.malloc(64);
    let b = pool.malloc(64);
    assert_eq!(b, a + 64);
    assert_eq!(pool.small_request_threshold(), 64);
    assert_eq!(pool.page_size(), 512);
}

#[test]
fn test_rejects_bad_configurations() {
    assert_eq!(
        ArenaCollection::new(PoolConfig::new(8192, 500, 64)).err(),
        Some(ConfigError::PageNotPowerOfTwo(500))
    );
    assert_eq!(
        ArenaCollection::new(PoolConfig::new(8192, 32, 64)).err(),
        Some(ConfigError::PageTooSmall {
            page_size: 32,
            header: 32,
        })
    );
    assert_eq!(
        ArenaCollection::new(PoolConfig::new(8192, 512, 60)).err(),
        Some(ConfigError::ThresholdNotWordMultiple {
            threshold: 60,
            word: 8,
        })
    );
    assert_eq!(
        ArenaCollection::new(PoolConfig::new(8192, 512, 512)).err(),
        Some(ConfigError::ThresholdTooLarge {
            threshold: 512,
            usable: 480,
        })
    );
    assert_eq!(
        ArenaCollection::new(PoolConfig::new(8000, 512, 64)).err(),
        Some(ConfigError::ArenaNotMultipleOfPages {
            arena_size: 8000,
            page_size: 512,
        })
    );
    assert_eq!(
        ArenaCollection::new(PoolConfig::new(512, 512, 64)).err(),
        Some(ConfigError::ArenaNotMultipleOfPages {
            arena_size: 512,
            page_size: 512,
        })
    );
    assert_eq!(
        ArenaCollection::new(PoolConfig::with_visited_flags(2048, 64)).err(),
        Some(ConfigError::FlagsPageSize(2048))
    );
}
