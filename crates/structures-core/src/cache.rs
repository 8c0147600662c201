//! C5 — the direct-mapped `(structure, symbol)` lookup cache.
//!
//! A fixed 256-entry table, matching `structures.c`'s `SINGLE_DM_CACHE`
//! block exactly: `CACHE_SETS = 256`, `CACHE_HASH(x) = (x >> 4) % 256`.
//! Entries hold a `Weak` reference to the binding record — the cache
//! observes liveness, it never grants it. A structure collected by the
//! GC simply makes every weak reference to its bindings fail to upgrade;
//! `Engine::collect` also proactively purges entries keyed on a freed
//! `StructureId` so stale slots don't linger hashing to the same set as a
//! later, unrelated structure.

use crate::binding_table::BindingHandle;
use crate::gc::StructureId;
use std::rc::Weak;
use structures_common::Symbol;

const CACHE_SETS: usize = 256;

fn cache_hash(structure_index: u32, sym: Symbol) -> usize {
    let combined = (u64::from(structure_index) << 32) | u64::from(sym.0);
    ((combined >> 4) % CACHE_SETS as u64) as usize
}

struct CacheEntry {
    structure: StructureId,
    symbol: Symbol,
    record: Weak<std::cell::RefCell<crate::binding_table::BindingRecord>>,
}

/// The direct-mapped cache itself.
pub struct Cache {
    slots: Vec<Option<CacheEntry>>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(CACHE_SETS);
        slots.resize_with(CACHE_SETS, || None);
        Self { slots }
    }

    /// Returns the cached binding for `(structure, sym)` if the set it
    /// hashes to currently holds that exact pair and the weak reference
    /// still upgrades.
    #[must_use]
    pub fn probe(&self, structure: StructureId, sym: Symbol) -> Option<BindingHandle> {
        let slot = cache_hash(structure.index(), sym);
        match &self.slots[slot] {
            Some(entry) if entry.structure == structure && entry.symbol == sym => entry.record.upgrade(),
            _ => None,
        }
    }

    /// Records that `sym` resolved to `record` in `structure`, evicting
    /// whatever this set previously held.
    pub fn enter(&mut self, structure: StructureId, sym: Symbol, record: &BindingHandle) {
        let slot = cache_hash(structure.index(), sym);
        self.slots[slot] = Some(CacheEntry {
            structure,
            symbol: sym,
            record: std::rc::Rc::downgrade(record),
        });
    }

    /// Evicts every entry for `sym`, regardless of structure — used when
    /// a binding anywhere may have changed shape (e.g. a registry rename
    /// touching `%structures`'s own binding for that name).
    pub fn invalidate_symbol(&mut self, sym: Symbol) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|e| e.symbol == sym) {
                *slot = None;
            }
        }
    }

    /// Evicts every entry keyed on `structure` — called when a structure
    /// is freed so a later, unrelated structure reusing the same arena
    /// slot index can never observe a stale hit.
    pub fn invalidate_structure(&mut self, structure: StructureId) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|e| e.structure == structure) {
                *slot = None;
            }
        }
    }

    pub fn flush(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}
