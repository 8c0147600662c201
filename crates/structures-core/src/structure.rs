//! C2 — the structure record itself: a named environment with its own
//! binding table, its exported interface, the structures it opens or
//! merely accesses, and a private alist of special (dynamically-scoped)
//! variables.

use crate::binding_table::{BindingHandle, BindingTable};
use crate::gc::{Collector, StructureId};
use crate::value::{ApplyHook, Value};
use bitflags::bitflags;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::rc::Rc;
use structures_common::Symbol;

/// Most structures import or access a small, fixed handful of other
/// structures and export a small handful of names, so these small
/// ordered collections stay inline instead of heap-allocating for the
/// common case.
type SymbolList = SmallVec<[Symbol; 4]>;
type StructureList = SmallVec<[StructureId; 4]>;

bitflags! {
    /// Per-structure flags. `EXPORT_ALL` makes every binding created in this
    /// structure exported by default (the anonymous "scratch" structure and
    /// `%structures`/`%specials` use this). `EXCLUSION` is a transient mark
    /// set only while the resolver (C4) is walking this structure's import
    /// graph, to turn cycles and shared (diamond) imports into a no-op
    /// re-visit instead of infinite recursion or duplicate work.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct StructureFlags: u8 {
        const EXPORT_ALL = 0b0000_0001;
        const EXCLUSION  = 0b0000_0010;
    }
}

/// A structure: symbols map to bindings through `bindings`; `imports` are
/// structures whose exports become visible here unqualified (`open`);
/// `accessible` are structures reachable only through an explicit
/// qualified reference (`access`, `external-structure-ref`).
pub struct Structure {
    pub name: Option<Symbol>,
    pub flags: StructureFlags,
    /// Symbols inherited into the export interface but not yet backed by
    /// a local binding. Once a binding for one of these names is created
    /// (via `lookup_or_add`), the name migrates out of here and the
    /// binding's own `is_exported` flag takes over — a symbol is never in
    /// both places at once.
    pub interface: SymbolList,
    pub imports: StructureList,
    pub accessible: StructureList,
    /// The alist-like store backing `special-ref`/`special-set`, left as
    /// an opaque `Value` since its shape is owned by the evaluator.
    pub special_env: Value,
    pub apply_hook: Option<Rc<dyn ApplyHook>>,
    bindings: BindingTable,
}

impl Structure {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None, StructureFlags::empty())
    }

    #[must_use]
    pub fn new(name: Option<Symbol>, flags: StructureFlags) -> Self {
        Self {
            name,
            flags,
            interface: SymbolList::new(),
            imports: StructureList::new(),
            accessible: StructureList::new(),
            special_env: Value::Void,
            apply_hook: None,
            bindings: BindingTable::new(),
        }
    }

    #[must_use]
    pub fn exports_all(&self) -> bool {
        self.flags.contains(StructureFlags::EXPORT_ALL)
    }

    pub fn set_exports_all(&mut self, yes: bool) {
        self.flags.set(StructureFlags::EXPORT_ALL, yes);
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        self.flags.contains(StructureFlags::EXCLUSION)
    }

    pub fn set_excluded(&mut self, yes: bool) {
        self.flags.set(StructureFlags::EXCLUSION, yes);
    }

    /// Looks up a binding declared directly in this structure (no import
    /// traversal).
    #[must_use]
    pub fn lookup_local(&self, sym: Symbol) -> Option<BindingHandle> {
        self.bindings.lookup(sym)
    }

    /// Returns the binding for `sym`, creating it (as `Void`, non-constant)
    /// if absent. The second element is `true` when a new binding was
    /// created, which callers use to decide whether the cache needs
    /// invalidating for this `(structure, symbol)` pair.
    ///
    /// A freshly created binding that migrates a pending `interface`
    /// entry is exported regardless of `EXPORT_ALL`, and the name is
    /// removed from `interface` — a symbol is never listed there once it
    /// has a local binding.
    pub fn lookup_or_add(&mut self, sym: Symbol) -> (BindingHandle, bool) {
        let pending = self.interface.iter().position(|&s| s == sym);
        let default_exported = self.exports_all() || pending.is_some();
        let (record, created) = self.bindings.get_or_create(sym, default_exported);
        if created {
            if let Some(pos) = pending {
                self.interface.remove(pos);
                record.borrow_mut().is_exported = true;
            }
        }
        (record, created)
    }

    /// Whether `sym` is part of this structure's public interface: always
    /// true under `EXPORT_ALL`, true for a pending (not-yet-bound)
    /// `interface` entry, otherwise whatever the binding's own
    /// `is_exported` flag says.
    #[must_use]
    pub fn is_exported(&self, sym: Symbol) -> bool {
        if self.exports_all() || self.interface.contains(&sym) {
            return true;
        }
        self.bindings
            .lookup(sym)
            .is_some_and(|record| record.borrow().is_exported)
    }

    /// Marks `sym` as exported: if already bound, flips its flag
    /// directly; otherwise adds it to the pending `interface` list so a
    /// later `lookup_or_add` picks it up.
    pub fn export(&mut self, sym: Symbol) {
        if let Some(record) = self.lookup_local(sym) {
            record.borrow_mut().is_exported = true;
        } else if !self.interface.contains(&sym) {
            self.interface.push(sym);
        }
    }

    /// Replaces the export interface wholesale (`set-interface`):
    /// clears `EXPORT_ALL`, re-derives every existing binding's
    /// `is_exported` flag from membership in `iface`, and keeps whatever
    /// names in `iface` have no binding yet as pending `interface`
    /// entries.
    pub fn set_interface(&mut self, iface: Vec<Symbol>) {
        self.set_exports_all(false);
        let iface_set: FxHashSet<Symbol> = iface.iter().copied().collect();
        self.bindings.walk(|record| {
            let mut record = record.borrow_mut();
            record.is_exported = iface_set.contains(&record.symbol);
        });
        self.interface = iface.into_iter().filter(|sym| self.lookup_local(*sym).is_none()).collect();
    }

    /// The full exported interface: local exported bindings plus
    /// whatever `interface` entries are still pending a binding.
    #[must_use]
    pub fn interface(&self) -> Vec<Symbol> {
        let mut names = self.interface.clone();
        self.bindings.walk(|record| {
            let record = record.borrow();
            if record.is_exported {
                names.push(record.symbol);
            }
        });
        names.into_vec()
    }

    pub fn walk_bindings(&self, f: impl FnMut(&BindingHandle)) {
        self.bindings.walk(f);
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.total_bindings()
    }

    /// Traces everything reachable from this structure: its own name, the
    /// structures it imports or accesses (pushed onto `worklist` for the
    /// caller's mark phase), its special-variable store, and every binding
    /// symbol/value. Mirrors `structure_mark`.
    pub fn mark(&self, collector: &mut dyn Collector, worklist: &mut Vec<StructureId>) {
        if let Some(name) = self.name {
            collector.mark_symbol(name);
        }
        for sym in &self.interface {
            collector.mark_symbol(*sym);
        }
        worklist.extend(self.imports.iter().copied());
        worklist.extend(self.accessible.iter().copied());
        collector.mark_value(&self.special_env);
        self.bindings.walk(|record| {
            let record = record.borrow();
            collector.mark_symbol(record.symbol);
            collector.mark_value(&record.binding);
            match &record.binding {
                Value::Structure(id) => worklist.push(*id),
                Value::Callable(callable) => {
                    if let Some(home) = callable.home_structure() {
                        worklist.push(home);
                    }
                }
                _ => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::NullCollector;
    use structures_common::symbol::intern;

    #[test]
    fn export_all_structure_exports_fresh_bindings() {
        let mut s = Structure::new(None, StructureFlags::EXPORT_ALL);
        let sym = intern("structure-export-all");
        s.lookup_or_add(sym);
        assert!(s.is_exported(sym));
    }

    #[test]
    fn plain_structure_does_not_export_fresh_bindings() {
        let mut s = Structure::anonymous();
        let sym = intern("structure-plain");
        s.lookup_or_add(sym);
        assert!(!s.is_exported(sym));
    }

    #[test]
    fn export_marks_an_existing_binding() {
        let mut s = Structure::anonymous();
        let sym = intern("structure-explicit-export");
        s.lookup_or_add(sym);
        assert!(!s.is_exported(sym));
        s.export(sym);
        assert!(s.is_exported(sym));
    }

    #[test]
    fn a_pending_interface_entry_migrates_to_the_binding_on_creation() {
        let mut s = Structure::anonymous();
        let sym = intern("structure-pending-interface");
        s.interface.push(sym);
        assert!(s.is_exported(sym));
        let (record, created) = s.lookup_or_add(sym);
        assert!(created);
        assert!(record.borrow().is_exported);
        assert!(!s.interface.contains(&sym));
    }

    #[test]
    fn set_interface_clears_export_all_and_re_derives_flags() {
        let mut s = Structure::new(None, StructureFlags::EXPORT_ALL);
        let kept = intern("structure-set-interface-kept");
        let dropped = intern("structure-set-interface-dropped");
        s.lookup_or_add(kept);
        s.lookup_or_add(dropped);
        s.set_interface(vec![kept]);
        assert!(!s.exports_all());
        assert!(s.is_exported(kept));
        assert!(!s.is_exported(dropped));
    }

    #[test]
    fn interface_reports_pending_and_bound_exports_together() {
        let mut s = Structure::anonymous();
        let bound = intern("structure-interface-bound");
        let pending = intern("structure-interface-pending");
        s.export(bound);
        s.lookup_or_add(bound);
        s.export(pending);
        let mut names = s.interface();
        names.sort_by_key(|sym| sym.0);
        let mut expected = vec![bound, pending];
        expected.sort_by_key(|sym| sym.0);
        assert_eq!(names, expected);
    }

    #[test]
    fn exclusion_flag_round_trips() {
        let mut s = Structure::anonymous();
        assert!(!s.is_excluded());
        s.set_excluded(true);
        assert!(s.is_excluded());
        s.set_excluded(false);
        assert!(!s.is_excluded());
    }

    #[test]
    fn mark_pushes_import_and_access_edges() {
        let mut s = Structure::anonymous();
        let imported = StructureIdTestHelper::fake(1);
        let accessed = StructureIdTestHelper::fake(2);
        s.imports.push(imported);
        s.accessible.push(accessed);
        let mut worklist = Vec::new();
        let mut collector = NullCollector;
        s.mark(&mut collector, &mut worklist);
        assert!(worklist.contains(&imported));
        assert!(worklist.contains(&accessed));
    }

    /// Test-only way to mint a `StructureId` without going through an
    /// arena, since the type's fields are private by design.
    struct StructureIdTestHelper;
    impl StructureIdTestHelper {
        fn fake(n: u32) -> StructureId {
            let mut arena = crate::gc::StructureArena::new();
            let mut id = arena.insert(Structure::anonymous());
            for _ in 1..n {
                id = arena.insert(Structure::anonymous());
            }
            id
        }
    }
}
