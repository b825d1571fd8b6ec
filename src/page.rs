/*!
 * Page Header
 * The four-word header living at the start of every allocated page
 */

use crate::types::Address;
use std::mem;

/// In-page bookkeeping for one allocated page. Free pages carry no live
/// header; their first word is reused as the arena's free-page link.
#[repr(C)]
pub(crate) struct PageHeader {
    /// Chains pages of the same size class: rooted in `page_for_size` for
    /// pages with room, in `full_page_for_size` for full ones
    pub(crate) nextpage: PagePtr,
    /// Slab index of the owning arena
    pub(crate) arena: usize,
    /// Number of free blocks chained from `freeblock`
    pub(crate) nfree: usize,
    /// Head of the intra-page free-block chain. After `nfree` links the
    /// chain ends at the first uninitialized block, or at the end of the
    /// page when none remain.
    pub(crate) freeblock: Address,
}

/// Size of the page header in bytes: four machine words
pub(crate) const PAGE_HEADER_SIZE: usize = mem::size_of::<PageHeader>();

const _: () = assert!(PAGE_HEADER_SIZE == 4 * mem::size_of::<usize>());

/// Handle to a page, identified by the address of its first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct PagePtr(Address);

impl PagePtr {
    pub(crate) const NULL: PagePtr = PagePtr(0);

    pub(crate) fn from_addr(addr: Address) -> PagePtr {
        PagePtr(addr)
    }

    pub(crate) fn addr(self) -> Address {
        self.0
    }

    pub(crate) fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Borrow the header in place.
    ///
    /// # Safety
    /// The page must be non-null and point at writable arena memory, and
    /// the borrow must end before any other access to the header bytes.
    #[inline]
    pub(crate) unsafe fn header<'a>(self) -> &'a mut PageHeader {
        &mut *(self.0 as *mut PageHeader)
    }

    /// Address of the header's `freeblock` word. Seeds the address-ordered
    /// free-chain threading during a sweep.
    pub(crate) fn freeblock_slot(self) -> Address {
        self.0 + mem::offset_of!(PageHeader, freeblock)
    }
}

/// Start of the page containing `addr`. Valid because arenas hand out
/// pages aligned to `page_size`, which is a power of two.
pub fn start_of_page(addr: Address, page_size: usize) -> Address {
    debug_assert!(page_size.is_power_of_two());
    addr & !(page_size - 1)
}
