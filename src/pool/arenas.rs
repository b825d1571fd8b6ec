/*!
 * Arena Selection
 * Bucket-indexed reuse of partly free arenas and acquisition of new ones
 */

use log::debug;

use super::ArenaCollection;
use crate::arena::{Arena, ArenaId};
use crate::config::AcquireMode;

impl ArenaCollection {
    /// Load some arena into `current_arena`: the listed arena with the
    /// fewest free pages if any has one, a freshly acquired arena
    /// otherwise.
    pub(super) fn allocate_new_arena(&mut self) {
        if self.pick_next_arena() {
            return;
        }

        // An incremental sweep may have handed pages back to arenas
        // since the buckets were last filled in. Rehash and retry.
        self.rehash_arenas_lists();
        if self.pick_next_arena() {
            return;
        }

        if cfg!(debug_assertions) {
            for arena in self.arenas() {
                debug_assert_eq!(
                    arena.nfreepages, 0,
                    "arena with free pages missed by the bucket scan"
                );
            }
        }

        let arena = match self.acquire {
            AcquireMode::Plain => Arena::acquire_plain(self.arena_size, self.page_size),
            AcquireMode::VisitedFlags => Arena::acquire_with_flags(self.page_size),
        };
        self.num_uninitialized_pages = arena.totalpages();
        let id = self.insert_arena(arena);
        self.current_arena = Some(id);
        debug!(
            "acquired arena {}: {} pages of {} bytes",
            id,
            self.arena(id).totalpages,
            self.page_size
        );
    }

    /// Scan `arenas_lists[i]` for the smallest i with a nonempty bucket,
    /// starting from the cache `min_empty_nfreepages`. Buckets below the
    /// cache are known to be empty; the scan pushes it up as it goes.
    fn pick_next_arena(&mut self) -> bool {
        let mut i = self.min_empty_nfreepages;
        while i < self.arenas_lists.len() {
            if let Some(id) = self.arenas_lists[i] {
                let next = self.arena(id).nextarena;
                self.arenas_lists[i] = next;
                self.current_arena = Some(id);
                return true;
            }
            i += 1;
            self.min_empty_nfreepages = i;
        }
        false
    }

    /// Refile every listed arena under its actual free-page count and
    /// release the ones whose pages are all free. The arena being
    /// carved, if any, is not listed and stays where it is.
    pub(super) fn rehash_arenas_lists(&mut self) {
        let length = self.arenas_lists.len();
        let old_lists = std::mem::replace(&mut self.arenas_lists, vec![None; length]);
        for mut next in old_lists {
            while let Some(id) = next {
                next = self.arena(id).nextarena;
                if self.arena(id).nfreepages == self.arena(id).totalpages {
                    // Every page is free again; give the whole arena back.
                    self.remove_arena(id);
                } else {
                    let n = self.arena(id).nfreepages;
                    debug_assert!(n < length, "partly used arena with every page free");
                    let head = self.arenas_lists[n];
                    self.arena_mut(id).nextarena = head;
                    self.arenas_lists[n] = Some(id);
                }
            }
        }
        self.min_empty_nfreepages = 1;
    }

    fn insert_arena(&mut self, arena: Arena) -> ArenaId {
        match self.free_arena_ids.pop() {
            Some(id) => {
                debug_assert!(self.arenas[id].is_none(), "arena slot still occupied");
                self.arenas[id] = Some(arena);
                id
            }
            None => {
                self.arenas.push(Some(arena));
                self.arenas.len() - 1
            }
        }
    }

    fn remove_arena(&mut self, id: ArenaId) {
        let arena = self.arenas[id].take();
        debug_assert!(arena.is_some(), "releasing an arena slot twice");
        self.free_arena_ids.push(id);
    }
}
