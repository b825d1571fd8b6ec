/*!
 * Visited Flags
 * Mark bits kept outside object memory. Each visited-flags arena reserves
 * its leading system page as a table holding one bit per two words of
 * object space; because those arenas are aligned to their own size, the
 * bit for any address is reached by pure arithmetic, with no lookup.
 */

use crate::types::{Address, WORD};

/// Bytes of the reserved table page at the base of every flags arena
pub const SYSTEM_PAGE_SIZE: usize = 4096;

/// Object bytes covered per byte of flag table: one bit per two words
pub const RATIO: usize = WORD * 2 * 8;

/// Size and alignment of a visited-flags arena: the table page covers the
/// rest of the arena exactly
pub const ARENA_SIZE: usize = SYSTEM_PAGE_SIZE * RATIO;

/// Object bytes covered by one 64-bit word of the flag table
const FLAG_WORD_SPAN: usize = 64 * RATIO / 8;

const _: () = assert!(RATIO.is_power_of_two());
const _: () = assert!(ARENA_SIZE.is_power_of_two());

#[inline]
fn flag_word_ptr(addr: Address) -> *mut u64 {
    let base = addr & !(ARENA_SIZE - 1);
    let ofs = (addr / RATIO) & (SYSTEM_PAGE_SIZE - 8);
    (base + ofs) as *mut u64
}

/// Mask selecting `addr`'s bit inside its 64-bit flag word
#[inline]
pub fn flag_mask(addr: Address) -> u64 {
    1u64 << ((addr / (RATIO / 8)) & 63)
}

/// Last address whose flag lives in the same 64-bit table word as `addr`
#[inline]
pub fn limit_for_flag_word(addr: Address) -> Address {
    addr | (FLAG_WORD_SPAN - 1)
}

/// Test the visited flag for the block at `addr`.
///
/// # Safety
/// `addr` must lie inside the object space of an arena acquired in
/// visited-flags mode.
#[inline]
pub unsafe fn get_visited(addr: Address) -> bool {
    (*flag_word_ptr(addr) & flag_mask(addr)) != 0
}

/// Set the visited flag for the block at `addr`.
///
/// # Safety
/// `addr` must lie inside the object space of an arena acquired in
/// visited-flags mode.
#[inline]
pub unsafe fn set_visited(addr: Address) {
    *flag_word_ptr(addr) |= flag_mask(addr);
}

/// Clear the visited flag for the block at `addr`. Two single-word blocks
/// share one bit, so this can clear a neighbor's flag as well; that only
/// forces a re-visit later, never an early free.
///
/// # Safety
/// `addr` must lie inside the object space of an arena acquired in
/// visited-flags mode.
#[inline]
pub unsafe fn clear_visited(addr: Address) {
    *flag_word_ptr(addr) &= !flag_mask(addr);
}

/// Read and zero the whole 64-bit table word covering `addr`.
///
/// # Safety
/// `addr` must lie inside the object space of an arena acquired in
/// visited-flags mode.
#[inline]
pub unsafe fn fetch_and_clear_64(addr: Address) -> u64 {
    let p = flag_word_ptr(addr);
    let word = *p;
    *p = 0;
    word
}
