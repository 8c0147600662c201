//! C8 — GC integration.
//!
//! The real tracing collector is an external collaborator (see the crate
//! docs): out of scope, referenced only through the narrow `Collector`
//! contract below. What *is* in scope is the engine's half of that
//! contract — a generation-indexed arena standing in for "the collector's
//! bookkeeping of this type" (`register_type`/`alloc_cell`/`free_cell` in
//! the reference source), plus `mark`/`sweep` dispatch for structures.
//!
//! Structures deliberately do *not* live behind `Rc`: import cycles
//! (`A` opens `B`, `B` opens `A`) and closure/home cycles (a structure's
//! own binding holds a closure whose home is that same structure) are
//! ordinary and must not leak. A generational index can express both
//! without reference counting ever needing to break a cycle.

use crate::structure::Structure;
use crate::value::Value;
use structures_common::Symbol;

/// A stable, generation-checked handle to a structure in the arena.
///
/// Two `StructureId`s are equal only if they name the same arena slot
/// *and* the same occupancy generation — a freed-and-reused slot never
/// compares equal to a handle minted before the free.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructureId {
    index: u32,
    generation: u32,
}

impl std::fmt::Debug for StructureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

impl StructureId {
    /// The raw slot index, exposed to the direct-mapped lookup cache
    /// (C5) for hashing. Not meaningful on its own without the
    /// generation — two different structures can share an index over
    /// time as slots are recycled.
    pub(crate) fn index(self) -> u32 {
        self.index
    }
}

/// The narrow contract a host tracing collector implements. The engine
/// calls back into this while tracing a structure's bindings so that
/// values the engine doesn't own (host-managed cells reachable through a
/// binding) get a chance to be traced by the real collector.
pub trait Collector {
    fn mark_value(&mut self, value: &Value);
    fn mark_symbol(&mut self, symbol: Symbol);
}

/// A `Collector` that does nothing, for callers that only care about
/// structure-level reachability and have no host heap of their own to
/// notify (the CLI driver and most unit tests use this).
#[derive(Default)]
pub struct NullCollector;

impl Collector for NullCollector {
    fn mark_value(&mut self, _value: &Value) {}
    fn mark_symbol(&mut self, _symbol: Symbol) {}
}

enum Slot {
    Occupied { structure: Structure, marked: bool },
    Free { next_free: Option<u32> },
}

/// Owns every live `Structure`, indexed by generation-checked handle.
///
/// Plays the role of the reference implementation's `all_structures`
/// linked list plus the per-type GC hooks (`structure_mark`/
/// `structure_sweep`/`free_structure`) registered with the real collector.
#[derive(Default)]
pub struct StructureArena {
    slots: Vec<Slot>,
    generations: Vec<u32>,
    free_head: Option<u32>,
    live_count: usize,
    /// Monotonic counters standing in for `rep_register_new_type`'s
    /// allocation bookkeeping (`alloc_cell`/`free_cell`).
    cells_allocated: u64,
    cells_freed: u64,
}

impl StructureArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    #[must_use]
    pub fn cells_allocated(&self) -> u64 {
        self.cells_allocated
    }

    #[must_use]
    pub fn cells_freed(&self) -> u64 {
        self.cells_freed
    }

    /// Inserts a newly-built structure, returning its handle.
    pub fn insert(&mut self, structure: Structure) -> StructureId {
        self.cells_allocated += 1;
        self.live_count += 1;
        if let Some(idx) = self.free_head {
            let i = idx as usize;
            let Slot::Free { next_free } = self.slots[i] else {
                unreachable!("free list pointed at an occupied slot")
            };
            self.free_head = next_free;
            self.slots[i] = Slot::Occupied {
                structure,
                marked: false,
            };
            StructureId {
                index: idx,
                generation: self.generations[i],
            }
        } else {
            let index = u32::try_from(self.slots.len()).expect("structure arena overflow");
            self.slots.push(Slot::Occupied {
                structure,
                marked: false,
            });
            self.generations.push(0);
            StructureId {
                index,
                generation: 0,
            }
        }
    }

    fn check(&self, id: StructureId) -> bool {
        self.generations.get(id.index as usize).copied() == Some(id.generation)
    }

    #[must_use]
    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        if !self.check(id) {
            return None;
        }
        match self.slots.get(id.index as usize)? {
            Slot::Occupied { structure, .. } => Some(structure),
            Slot::Free { .. } => None,
        }
    }

    pub fn get_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        if !self.check(id) {
            return None;
        }
        match self.slots.get_mut(id.index as usize)? {
            Slot::Occupied { structure, .. } => Some(structure),
            Slot::Free { .. } => None,
        }
    }

    /// Forcibly frees a structure outside of a mark/sweep cycle — used by
    /// the module builder when a header/body thunk fails and the
    /// partially-built structure must be discarded immediately rather than
    /// waiting for the next collection.
    pub fn remove(&mut self, id: StructureId) -> Option<Structure> {
        if !self.check(id) {
            return None;
        }
        let i = id.index as usize;
        let old = std::mem::replace(
            &mut self.slots[i],
            Slot::Free {
                next_free: self.free_head,
            },
        );
        match old {
            Slot::Occupied { structure, .. } => {
                self.generations[i] = self.generations[i].wrapping_add(1);
                self.free_head = Some(i as u32);
                self.live_count -= 1;
                self.cells_freed += 1;
                Some(structure)
            }
            Slot::Free { .. } => {
                self.slots[i] = old;
                None
            }
        }
    }

    /// Marks `id` reachable. Returns `true` the first time a given id is
    /// marked in a collection cycle (so callers doing a worklist traversal
    /// know whether to keep tracing its children), `false` on a repeat
    /// visit or a stale/dead id.
    pub fn mark(&mut self, id: StructureId) -> bool {
        if !self.check(id) {
            return false;
        }
        match self.slots.get_mut(id.index as usize) {
            Some(Slot::Occupied { marked, .. }) if !*marked => {
                *marked = true;
                true
            }
            _ => false,
        }
    }

    /// Frees every slot that was not marked since the last sweep, resets
    /// the mark bit on survivors, and returns the ids that were freed (so
    /// the caller can invalidate their lookup-cache entries).
    pub fn sweep(&mut self) -> Vec<StructureId> {
        let mut freed = Vec::new();
        for i in 0..self.slots.len() {
            let should_free = matches!(&self.slots[i], Slot::Occupied { marked: false, .. });
            if should_free {
                let generation = self.generations[i];
                self.generations[i] = generation.wrapping_add(1);
                let old = std::mem::replace(
                    &mut self.slots[i],
                    Slot::Free {
                        next_free: self.free_head,
                    },
                );
                self.free_head = Some(i as u32);
                if let Slot::Occupied { structure, .. } = old {
                    drop(structure);
                }
                self.live_count -= 1;
                self.cells_freed += 1;
                freed.push(StructureId {
                    index: i as u32,
                    generation,
                });
            } else if let Slot::Occupied { marked, .. } = &mut self.slots[i] {
                *marked = false;
            }
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Structure;

    #[test]
    fn insert_then_get_round_trips() {
        let mut arena = StructureArena::new();
        let id = arena.insert(Structure::anonymous());
        assert!(arena.get(id).is_some());
    }

    #[test]
    fn stale_id_after_removal_does_not_resolve() {
        let mut arena = StructureArena::new();
        let id = arena.insert(Structure::anonymous());
        arena.remove(id);
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn reused_slot_gets_a_new_generation() {
        let mut arena = StructureArena::new();
        let first = arena.insert(Structure::anonymous());
        arena.remove(first);
        let second = arena.insert(Structure::anonymous());
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert!(arena.get(second).is_some());
    }

    #[test]
    fn sweep_frees_only_unmarked_structures() {
        let mut arena = StructureArena::new();
        let kept = arena.insert(Structure::anonymous());
        let dropped = arena.insert(Structure::anonymous());
        arena.mark(kept);
        let freed = arena.sweep();
        assert_eq!(freed, vec![dropped]);
        assert!(arena.get(kept).is_some());
        assert!(arena.get(dropped).is_none());
    }

    #[test]
    fn sweep_resets_marks_for_the_next_cycle() {
        let mut arena = StructureArena::new();
        let id = arena.insert(Structure::anonymous());
        arena.mark(id);
        arena.sweep();
        // Unmarked on this second cycle -> freed.
        let freed = arena.sweep();
        assert_eq!(freed, vec![id]);
    }
}
