/*!
 * Page Pool
 *
 * Fixed-size-class page allocator backing a garbage-collected heap.
 *
 * ## Layout
 *
 * - **Blocks** (the allocation unit) are `size_class * WORD` bytes; every
 *   block in a page belongs to the same size class.
 * - **Pages** start with a four-word header and chain into per-class
 *   partial and full lists. Free blocks chain through their own first
 *   word, in ascending address order, ending at the page's uninitialized
 *   frontier.
 * - **Arenas** are aligned OS allocations carved into pages on demand.
 *   Each arena chains its own free pages; wholly free arenas are released
 *   back to the OS by the rehash that ends a sweep.
 *
 * ## Allocation
 *
 * `malloc` is O(1): pop the head block of the class's first partial page,
 * carving a new page from the current arena only when the class has none.
 * Arena selection takes the arena with the fewest free pages (bucket
 * index), so mostly-free arenas drain toward empty and can be released.
 *
 * ## Reclamation
 *
 * The mass-free sweep snapshots the page lists, then drains them class by
 * class under a page-visit budget, asking an external liveness oracle
 * which blocks may die. The sweep is resumable between page visits, so
 * the collector can bound its pause times; `malloc` stays legal between
 * increments.
 */

mod arenas;
mod malloc;
mod sweep;

use crate::arena::{Arena, ArenaId};
use crate::config::{AcquireMode, PoolConfig};
use crate::page::{PagePtr, PAGE_HEADER_SIZE};
use crate::types::{ConfigError, PoolStats, WORD};
use log::info;

/// Top-level allocator: arenas carved into pages carved into blocks
pub struct ArenaCollection {
    /// Effective arena size in bytes, after the mode override
    arena_size: usize,
    page_size: usize,
    small_request_threshold: usize,
    acquire: AcquireMode,

    /// Arena slab; a released arena leaves a reusable hole
    arenas: Vec<Option<Arena>>,
    free_arena_ids: Vec<ArenaId>,

    /// Arena currently being carved; never listed in `arenas_lists`
    current_arena: Option<ArenaId>,
    /// Bucket `i` chains the arenas with exactly `i` free pages
    arenas_lists: Vec<Option<ArenaId>>,
    /// Buckets `1..min_empty_nfreepages` are known to be empty
    min_empty_nfreepages: usize,
    /// Never-carved pages remaining at the tail of `current_arena`
    num_uninitialized_pages: usize,

    /// Per size class, the head of the has-room page chain; index 0 unused
    page_for_size: Vec<PagePtr>,
    /// Per size class, the head of the full page chain
    full_page_for_size: Vec<PagePtr>,
    /// Sweep snapshots of the two lists above
    old_page_for_size: Vec<PagePtr>,
    old_full_page_for_size: Vec<PagePtr>,
    /// Per size class, how many blocks fit in one page
    nblocks_for_size: Vec<usize>,

    /// Size class the resumable sweep drains next; None outside a sweep
    sweep_cursor: Option<usize>,

    /// Payload bytes in live blocks, excluding all header overhead
    total_memory_used: usize,
}

// The collection owns every buffer its internal addresses point into, so
// moving it to another thread moves the memory along with it.
unsafe impl Send for ArenaCollection {}

impl ArenaCollection {
    /// Create an empty collection from a validated configuration.
    pub fn new(config: PoolConfig) -> Result<ArenaCollection, ConfigError> {
        config.validate()?;
        let arena_size = config.effective_arena_size();
        let page_size = config.page_size;
        let length = config.small_request_threshold / WORD + 1;
        let mut nblocks_for_size = vec![0; length];
        for class in 1..length {
            nblocks_for_size[class] = (page_size - PAGE_HEADER_SIZE) / (WORD * class);
        }
        let max_pages_per_arena = arena_size / page_size;
        info!(
            "page pool initialized: arena_size={} page_size={} small_request_threshold={} ({} size classes, {} pages per arena)",
            arena_size,
            page_size,
            config.small_request_threshold,
            length - 1,
            max_pages_per_arena
        );
        Ok(ArenaCollection {
            arena_size,
            page_size,
            small_request_threshold: config.small_request_threshold,
            acquire: config.acquire,
            arenas: Vec::new(),
            free_arena_ids: Vec::new(),
            current_arena: None,
            arenas_lists: vec![None; max_pages_per_arena],
            min_empty_nfreepages: max_pages_per_arena,
            num_uninitialized_pages: 0,
            page_for_size: vec![PagePtr::NULL; length],
            full_page_for_size: vec![PagePtr::NULL; length],
            old_page_for_size: vec![PagePtr::NULL; length],
            old_full_page_for_size: vec![PagePtr::NULL; length],
            nblocks_for_size,
            sweep_cursor: None,
            total_memory_used: 0,
        })
    }

    /// Payload bytes currently allocated
    pub fn total_memory_used(&self) -> usize {
        self.total_memory_used
    }

    /// Largest size `malloc` accepts, in bytes
    pub fn small_request_threshold(&self) -> usize {
        self.small_request_threshold
    }

    /// Configured page size in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Enumerate all live arenas: the one being carved first, then every
    /// bucket in ascending free-page order, each chain head-first.
    pub fn arenas(&self) -> impl Iterator<Item = &Arena> {
        let current = self.current_arena.map(|id| self.arena(id));
        let listed = self.arenas_lists.iter().flat_map(move |&head| BucketIter {
            pool: self,
            next: head,
        });
        current.into_iter().chain(listed)
    }

    /// Point-in-time allocator statistics
    pub fn stats(&self) -> PoolStats {
        let mut arena_count = 0;
        let mut total_pages = 0;
        let mut free_pages = 0;
        for arena in self.arenas() {
            arena_count += 1;
            total_pages += arena.totalpages();
            free_pages += arena.nfreepages();
        }
        PoolStats {
            total_memory_used: self.total_memory_used,
            arena_count,
            total_pages,
            free_pages,
            uninitialized_pages: self.num_uninitialized_pages,
        }
    }

    pub(crate) fn arena(&self, id: ArenaId) -> &Arena {
        match self.arenas[id].as_ref() {
            Some(arena) => arena,
            None => unreachable!("dangling arena id {}", id),
        }
    }

    pub(crate) fn arena_mut(&mut self, id: ArenaId) -> &mut Arena {
        match self.arenas[id].as_mut() {
            Some(arena) => arena,
            None => unreachable!("dangling arena id {}", id),
        }
    }
}

struct BucketIter<'a> {
    pool: &'a ArenaCollection,
    next: Option<ArenaId>,
}

impl<'a> Iterator for BucketIter<'a> {
    type Item = &'a Arena;

    fn next(&mut self) -> Option<&'a Arena> {
        let id = self.next?;
        let arena = self.pool.arena(id);
        self.next = arena.nextarena;
        Some(arena)
    }
}

#[cfg(test)]
impl ArenaCollection {
    /// Count a page's uninitialized blocks by chasing the free chain to
    /// the frontier.
    pub(crate) fn nuninitialized(&self, page: PagePtr, size_class: usize) -> usize {
        let (mut freeblock, nfree) = {
            let hdr = unsafe { page.header() };
            (hdr.freeblock, hdr.nfree)
        };
        for _ in 0..nfree {
            freeblock = unsafe { crate::raw::read_link(freeblock) };
        }
        let block_size = size_class * WORD;
        let initialized = freeblock - page.addr() - PAGE_HEADER_SIZE;
        assert_eq!(initialized % block_size, 0, "page size class misspecified");
        self.nblocks_for_size[size_class] - initialized / block_size
    }
}
