/*!
 * Block Allocation
 * The malloc fast path and the page-carving slow path
 */

use super::ArenaCollection;
use crate::page::{PagePtr, PAGE_HEADER_SIZE};
use crate::raw;
use crate::types::{Address, WORD, WORD_POWER_2};

impl ArenaCollection {
    /// Allocate a block of exactly `size` bytes.
    ///
    /// `size` must be a nonzero multiple of the word size and at most
    /// `small_request_threshold`. The returned bytes are uninitialized and
    /// may contain leftovers from a prior block of the same size class.
    /// Aborts the process if a fresh arena is needed and the OS has no
    /// memory left.
    pub fn malloc(&mut self, size: usize) -> Address {
        debug_assert!(size > 0, "malloc: size is zero");
        debug_assert!(
            size <= self.small_request_threshold,
            "malloc: size too big"
        );
        debug_assert_eq!(size & (WORD - 1), 0, "malloc: size is not word aligned");
        self.total_memory_used += size;

        let size_class = size >> WORD_POWER_2;
        let mut page = self.page_for_size[size_class];
        if page.is_null() {
            page = self.allocate_new_page(size_class);
        }

        // The result is simply the head of the page's free chain.
        let hdr = unsafe { page.header() };
        let result = hdr.freeblock;
        if hdr.nfree > 0 {
            // A chained free block; its first word holds the next one.
            hdr.nfree -= 1;
            let next = unsafe { raw::read_link(result) };
            unsafe { raw::poison(result, WORD) };
            hdr.freeblock = next;
        } else {
            // The uninitialized frontier; advance it by one block.
            hdr.freeblock = result + size;
        }

        if hdr.freeblock - page.addr() > self.page_size - size {
            // That was the last free block: unlink the page from the
            // partial list and push it on the full list.
            self.page_for_size[size_class] = hdr.nextpage;
            hdr.nextpage = self.full_page_for_size[size_class];
            self.full_page_for_size[size_class] = page;
        }
        result
    }

    /// Carve a fresh page for `size_class` out of the current arena and
    /// install it as the class's partial-list head.
    pub(super) fn allocate_new_page(&mut self, size_class: usize) -> PagePtr {
        if self.current_arena.is_none() {
            self.allocate_new_arena();
        }
        let id = match self.current_arena {
            Some(id) => id,
            None => unreachable!("allocate_new_arena left no current arena"),
        };

        // The result is simply the head of the arena's free-page chain.
        let result = self.arena(id).freepages;
        debug_assert!(result >= self.arena(id).firstpage() && result < self.arena(id).end());
        let next = if self.arena(id).nfreepages > 0 {
            // A chained free page; its first word holds the next one.
            self.arena_mut(id).nfreepages -= 1;
            unsafe { raw::read_link(result) }
        } else {
            // The uninitialized frontier of the arena.
            debug_assert!(
                self.num_uninitialized_pages > 0,
                "fully allocated arena left as current"
            );
            self.num_uninitialized_pages -= 1;
            if self.num_uninitialized_pages > 0 {
                result + self.page_size
            } else {
                0
            }
        };
        self.arena_mut(id).freepages = next;
        if next == 0 {
            // That was the arena's last page: park it in bucket 0 until a
            // sweep gives it free pages again.
            debug_assert_eq!(
                self.arena(id).nfreepages, 0,
                "empty freepages chain with free pages accounted"
            );
            let head = self.arenas_lists[0];
            self.arena_mut(id).nextarena = head;
            self.arenas_lists[0] = Some(id);
            self.current_arena = None;
        }

        let page = PagePtr::from_addr(result);
        let hdr = unsafe { page.header() };
        hdr.arena = id;
        hdr.nfree = 0;
        hdr.freeblock = result + PAGE_HEADER_SIZE;
        hdr.nextpage = PagePtr::NULL;
        debug_assert!(
            self.page_for_size[size_class].is_null(),
            "allocate_new_page called with a page still waiting"
        );
        self.page_for_size[size_class] = page;
        page
    }
}
