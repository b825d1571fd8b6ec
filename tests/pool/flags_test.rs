/*!
 * Visited Flags Tests
 * Sweeps driven by out-of-band mark bits instead of the oracle
 */

use pagepool::{flags, ArenaCollection, PoolConfig};
use pretty_assertions::assert_eq;

fn pool() -> ArenaCollection {
    ArenaCollection::new(PoolConfig::with_visited_flags(4096, 64)).unwrap()
}

#[test]
fn test_arena_alignment_and_first_page() {
    let mut pool = pool();
    let first = pool.malloc(16);
    let arena = pool.arenas().next().unwrap();

    assert_eq!(arena.base() % flags::ARENA_SIZE, 0);
    // The leading system page holds the flag words; object pages follow.
    assert_eq!(first, arena.base() + 4096 + 32);
    assert_eq!(arena.totalpages(), 127);
}

#[test]
fn test_wide_page_geometry() {
    let mut pool = ArenaCollection::new(PoolConfig::with_visited_flags(8192, 128)).unwrap();
    let first = pool.malloc(64);
    let arena = pool.arenas().next().unwrap();

    assert_eq!(first, arena.base() + 8192 + 32);
    assert_eq!(arena.totalpages(), 63);
}

#[test]
fn test_only_flagged_blocks_survive() {
    let mut pool = pool();
    let blocks: Vec<usize> = (0..10).map(|_| pool.malloc(32)).collect();
    for &addr in blocks.iter().step_by(2) {
        unsafe { flags::set_visited(addr) };
    }

    pool.mass_free(|_| false);
    assert_eq!(pool.total_memory_used(), 5 * 32);

    // The freed odd slots come back first, lowest address first.
    assert_eq!(pool.malloc(32), blocks[1]);
    assert_eq!(pool.malloc(32), blocks[3]);
}

#[test]
fn test_oracle_is_never_consulted() {
    let mut pool = pool();
    let a = pool.malloc(16);
    let b = pool.malloc(16);
    unsafe { flags::set_visited(b) };

    // The flag words decide everything; a call into the oracle is a bug.
    pool.mass_free(|_| panic!("oracle consulted in flags mode"));
    assert_eq!(pool.total_memory_used(), 16);
    assert_eq!(pool.malloc(16), a);
}

#[test]
fn test_flags_clear_as_the_sweep_reads_them() {
    let mut pool = pool();
    let a = pool.malloc(16);
    unsafe { flags::set_visited(a) };
    assert!(unsafe { flags::get_visited(a) });

    pool.mass_free(|_| false);
    assert_eq!(pool.total_memory_used(), 16);
    assert!(!unsafe { flags::get_visited(a) });

    // Without a fresh mark the survivor dies in the next sweep.
    pool.mass_free(|_| false);
    assert_eq!(pool.total_memory_used(), 0);
}

#[test]
fn test_sweep_spans_many_flag_words() {
    let mut pool = pool();

    // One flag word covers 64 blocks of 16 bytes, so 200 blocks make the
    // sweep fetch several words per page.
    let blocks: Vec<usize> = (0..200).map(|_| pool.malloc(16)).collect();
    let mut live = 0;
    for (i, &addr) in blocks.iter().enumerate() {
        if i % 7 == 0 {
            unsafe { flags::set_visited(addr) };
            live += 1;
        }
    }

    pool.mass_free(|_| false);
    assert_eq!(pool.total_memory_used(), live * 16);
}
