/*!
 * Arena
 * One OS-level allocation subdivided into pages
 */

use crate::flags;
use crate::types::Address;
use log::debug;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Slab index identifying an arena within its collection
pub(crate) type ArenaId = usize;

/// An owned, aligned buffer of `totalpages` pages plus the bookkeeping the
/// collection needs to carve and reclaim them. The buffer is released when
/// the arena is dropped.
pub struct Arena {
    base: NonNull<u8>,
    layout: Layout,
    /// First usable page; in visited-flags mode the reserved table page
    /// (and any alignment padding) before it is skipped
    firstpage: Address,
    pub(crate) totalpages: usize,
    /// Pages currently on the `freepages` chain
    pub(crate) nfreepages: usize,
    /// Head of the free-page chain, threaded through the first word of
    /// each free page; 0 terminates. While the arena is being carved the
    /// chain tail holds the uninitialized frontier instead.
    pub(crate) freepages: Address,
    /// Next arena in the same `arenas_lists` bucket
    pub(crate) nextarena: Option<ArenaId>,
}

impl Arena {
    /// Acquire a plain arena: `arena_size` bytes aligned to `page_size`,
    /// uninitialized. Aborts the process if the OS refuses.
    pub(crate) fn acquire_plain(arena_size: usize, page_size: usize) -> Arena {
        let layout = match Layout::from_size_align(arena_size, page_size) {
            Ok(layout) => layout,
            Err(_) => unreachable!("arena layout rejected for a validated config"),
        };
        let ptr = unsafe { alloc::alloc(layout) };
        let base = match NonNull::new(ptr) {
            Some(base) => base,
            None => alloc::handle_alloc_error(layout),
        };
        let firstpage = base.as_ptr() as Address;
        let totalpages = arena_size / page_size;
        debug!(
            "acquired arena at 0x{:x}: {} pages of {} bytes",
            firstpage, totalpages, page_size
        );
        Arena {
            base,
            layout,
            firstpage,
            totalpages,
            nfreepages: 0,
            freepages: firstpage,
            nextarena: None,
        }
    }

    /// Acquire a visited-flags arena: `flags::ARENA_SIZE` bytes aligned to
    /// their own size, zeroed so the flag table starts clear, with the
    /// leading system page reserved for it. Aborts the process if the OS
    /// refuses.
    pub(crate) fn acquire_with_flags(page_size: usize) -> Arena {
        let layout = match Layout::from_size_align(flags::ARENA_SIZE, flags::ARENA_SIZE) {
            Ok(layout) => layout,
            Err(_) => unreachable!("flags arena layout is a constant power-of-two pair"),
        };
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let base = match NonNull::new(ptr) {
            Some(base) => base,
            None => alloc::handle_alloc_error(layout),
        };
        let base_addr = base.as_ptr() as Address;
        let firstpage = base_addr + page_size.max(flags::SYSTEM_PAGE_SIZE);
        let totalpages = (base_addr + flags::ARENA_SIZE - firstpage) / page_size;
        debug!(
            "acquired flags arena at 0x{:x}: {} pages of {} bytes",
            base_addr, totalpages, page_size
        );
        Arena {
            base,
            layout,
            firstpage,
            totalpages,
            nfreepages: 0,
            freepages: firstpage,
            nextarena: None,
        }
    }

    /// Base address of the arena buffer
    pub fn base(&self) -> Address {
        self.base.as_ptr() as Address
    }

    /// One past the last byte of the arena buffer
    pub fn end(&self) -> Address {
        self.base() + self.layout.size()
    }

    /// Address of the first usable page
    pub(crate) fn firstpage(&self) -> Address {
        self.firstpage
    }

    /// Total number of usable pages
    pub fn totalpages(&self) -> usize {
        self.totalpages
    }

    /// Pages currently on this arena's own free chain
    pub fn nfreepages(&self) -> usize {
        self.nfreepages
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        debug!("releasing arena at 0x{:x}", self.base());
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}
