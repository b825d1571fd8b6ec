/*!
 * Mass Free
 * Resumable reclamation sweep over every page of every size class
 */

use log::debug;

use super::ArenaCollection;
use crate::config::AcquireMode;
use crate::flags;
use crate::page::{PagePtr, PAGE_HEADER_SIZE};
use crate::raw;
use crate::types::{Address, WORD, WORD_POWER_2};

impl ArenaCollection {
    /// Sweep the whole pool in one go: every block for which
    /// `ok_to_free` answers true is freed, pages left with no live block
    /// go back to their arena, and arenas left with no used page go back
    /// to the system.
    ///
    /// With [`AcquireMode::VisitedFlags`] the oracle is never consulted;
    /// a block survives when its visited bit is set, and the sweep
    /// clears the bits as it reads them.
    pub fn mass_free<F>(&mut self, ok_to_free: F)
    where
        F: FnMut(Address) -> bool,
    {
        self.mass_free_prepare();
        let complete = self.mass_free_incremental(ok_to_free, usize::MAX);
        debug_assert!(complete, "unbounded mass free did not finish");
    }

    /// Start a sweep: detach every size class's page lists and reset the
    /// used-byte counter. Blocks allocated from here on are not visited
    /// by the sweep and are counted as live again.
    pub fn mass_free_prepare(&mut self) {
        debug_assert!(self.sweep_cursor.is_none(), "mass free already in progress");
        self.total_memory_used = 0;

        let top = self.small_request_threshold >> WORD_POWER_2;
        self.sweep_cursor = Some(top);
        for size_class in 1..=top {
            self.old_page_for_size[size_class] = self.page_for_size[size_class];
            self.old_full_page_for_size[size_class] = self.full_page_for_size[size_class];
            self.page_for_size[size_class] = PagePtr::NULL;
            self.full_page_for_size[size_class] = PagePtr::NULL;
        }
    }

    /// Continue a prepared sweep, visiting at most `max_pages` pages.
    /// Returns true once the sweep is finished; further calls are no-ops
    /// that also return true. A false return means more pages remain and
    /// the next call picks up exactly where this one stopped.
    pub fn mass_free_incremental<F>(&mut self, mut ok_to_free: F, max_pages: usize) -> bool
    where
        F: FnMut(Address) -> bool,
    {
        if let Some(mut size_class) = self.sweep_cursor {
            let mut budget = max_pages;
            while size_class >= 1 {
                budget = self.mass_free_in_pages(size_class, &mut ok_to_free, budget);
                if budget == 0 {
                    self.sweep_cursor = Some(size_class);
                    return false;
                }
                size_class -= 1;
            }
            self.sweep_cursor = None;

            // The sweep gave pages back to the arenas; refile them.
            self.rehash_arenas_lists();
            debug!(
                "mass free complete: {} bytes survive",
                self.total_memory_used
            );
        }
        true
    }

    /// Sweep one size class's detached pages, full pages first. Returns
    /// the budget left, with 0 meaning the class may be only partly done
    /// and the rest stays parked in the `old_` slots.
    fn mass_free_in_pages<F>(
        &mut self,
        size_class: usize,
        ok_to_free: &mut F,
        mut budget: usize,
    ) -> usize
    where
        F: FnMut(Address) -> bool,
    {
        let nblocks = self.nblocks_for_size[size_class];
        let block_size = size_class * WORD;
        let mut remaining_partial = self.page_for_size[size_class];
        let mut remaining_full = self.full_page_for_size[size_class];

        'steps: for step in 0..2 {
            let slot = if step == 0 {
                &mut self.old_full_page_for_size[size_class]
            } else {
                &mut self.old_page_for_size[size_class]
            };
            let mut page = std::mem::replace(slot, PagePtr::NULL);

            while !page.is_null() {
                let surviving = self.walk_page(page, block_size, ok_to_free);
                let hdr = unsafe { page.header() };
                let nextpage = hdr.nextpage;

                if surviving == nblocks {
                    // Still full; keep it off the allocation path.
                    debug_assert_eq!(step, 0, "a partial page became full while freeing");
                    hdr.nextpage = remaining_full;
                    remaining_full = page;
                } else if surviving > 0 {
                    hdr.nextpage = remaining_partial;
                    remaining_partial = page;
                } else {
                    // Nothing left alive; the page returns to its arena
                    // and can be recarved for any size class.
                    self.free_page(page);
                }

                page = nextpage;
                budget = budget.saturating_sub(1);
                if budget == 0 {
                    // Out of budget: park the unprocessed tail back in
                    // its old slot for the next call.
                    let slot = if step == 0 {
                        &mut self.old_full_page_for_size[size_class]
                    } else {
                        &mut self.old_page_for_size[size_class]
                    };
                    *slot = page;
                    break 'steps;
                }
            }
        }

        self.page_for_size[size_class] = remaining_partial;
        self.full_page_for_size[size_class] = remaining_full;
        budget
    }

    /// Visit every block of one page, free the dead ones, and return the
    /// number of survivors. Freed blocks are spliced into the page's
    /// free chain, which stays sorted by address with the uninitialized
    /// frontier at its tail.
    fn walk_page<F>(&mut self, page: PagePtr, block_size: usize, ok_to_free: &mut F) -> usize
    where
        F: FnMut(Address) -> bool,
    {
        let (mut freeblock, mut skip_free_blocks) = {
            let hdr = unsafe { page.header() };
            (hdr.freeblock, hdr.nfree)
        };
        // Where the current value of 'freeblock' was read from; a block
        // freed below is hooked in by overwriting that slot.
        let mut prevfreeblockat = page.freeblock_slot();
        let mut obj = page.addr() + PAGE_HEADER_SIZE;
        let mut surviving = 0;
        let mut freed = 0;

        // One fetched-and-cleared flag word and the last address it
        // covers, for AcquireMode::VisitedFlags.
        let mut vblock: u64 = 0;
        let mut vblocknext: Address = 0;

        loop {
            if obj == freeblock {
                if skip_free_blocks == 0 {
                    // The first uninitialized block, or the page end.
                    break;
                }
                // An already free block; its chain link stays as it is.
                skip_free_blocks -= 1;
                prevfreeblockat = obj;
                freeblock = unsafe { raw::read_link(obj) };
            } else {
                debug_assert!(freeblock > obj, "free blocks chained out of order");
                let dead = match self.acquire {
                    AcquireMode::Plain => ok_to_free(obj),
                    AcquireMode::VisitedFlags => {
                        if obj > vblocknext {
                            vblock = unsafe { flags::fetch_and_clear_64(obj) };
                            vblocknext = flags::limit_for_flag_word(obj);
                        }
                        (vblock & flags::flag_mask(obj)) == 0
                    }
                };
                if dead {
                    unsafe {
                        raw::poison(obj, block_size);
                        raw::write_link(prevfreeblockat, obj);
                        raw::write_link(obj, freeblock);
                    }
                    prevfreeblockat = obj;
                    freed += 1;
                } else {
                    surviving += 1;
                }
            }
            obj += block_size;
        }

        let hdr = unsafe { page.header() };
        hdr.nfree += freed;
        self.total_memory_used += surviving * block_size;
        surviving
    }

    /// Hand a whole page back to its arena's free-page chain.
    pub(super) fn free_page(&mut self, page: PagePtr) {
        let id = unsafe { page.header() }.arena;
        let addr = page.addr();
        unsafe { raw::poison(addr, self.page_size) };
        let head = self.arena(id).freepages;
        unsafe { raw::write_link(addr, head) };
        self.arena_mut(id).nfreepages += 1;
        self.arena_mut(id).freepages = addr;
    }
}
