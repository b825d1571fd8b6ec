/*!
 * Raw Memory Access
 * The crate's unsafe boundary: every reinterpretation of managed bytes as
 * free-list links lives here, so the rest of the allocator can handle
 * plain addresses.
 */

use crate::types::Address;

/// Byte written over freed memory in debug builds
pub(crate) const POISON_BYTE: u8 = 0xFE;

/// Read the link word stored in the first bytes of a free block or free
/// page.
///
/// # Safety
/// `addr` must point to at least one readable, word-aligned machine word
/// inside an arena owned by the collection.
#[inline]
pub(crate) unsafe fn read_link(addr: Address) -> Address {
    (addr as *const Address).read()
}

/// Write the link word of a free block or free page.
///
/// # Safety
/// `addr` must point to at least one writable, word-aligned machine word
/// inside an arena owned by the collection.
#[inline]
pub(crate) unsafe fn write_link(addr: Address, next: Address) {
    (addr as *mut Address).write(next);
}

/// Fill a freed region with poison bytes so stale pointers read garbage.
/// Debug builds only; release builds compile this to nothing.
///
/// # Safety
/// `addr` must point to `len` writable bytes inside an arena owned by the
/// collection.
#[inline]
pub(crate) unsafe fn poison(addr: Address, len: usize) {
    if cfg!(debug_assertions) {
        std::ptr::write_bytes(addr as *mut u8, POISON_BYTE, len);
    }
}
