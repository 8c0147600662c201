//! C4 — name resolution: unqualified reference/set against a structure
//! and its transitively `open`ed imports, and qualified
//! `external-structure-ref` against a structure's own interface only.
//!
//! Grounded on `structures.c`'s `lookup_recursively`/`rep_search_imports`:
//! a structure's own bindings are visible unconditionally, an imported
//! structure's bindings only if exported, and the import graph is walked
//! depth-first with each structure guarded against re-entry by a
//! transient flag (`EXCLUSION` here, matching the original) so cyclic or
//! diamond-shaped import graphs terminate instead of looping or being
//! searched twice.

use crate::binding_table::BindingHandle;
use crate::engine::Engine;
use crate::gc::StructureId;
use crate::structure::Structure;
use crate::value::Value;
use structures_common::{EngineError, Symbol};
use tracing::{Level, debug, span};

/// Sets a structure's `EXCLUSION` flag on construction and clears it on
/// drop, including when the caller returns early or unwinds through this
/// frame. This is the only place that flag is ever toggled.
struct ExclusionGuard<'a> {
    engine: &'a mut Engine,
    id: StructureId,
}

impl<'a> ExclusionGuard<'a> {
    fn enter(engine: &'a mut Engine, id: StructureId) -> Self {
        if let Some(s) = engine.arena_mut().get_mut(id) {
            s.set_excluded(true);
        }
        Self { engine, id }
    }

    fn engine(&mut self) -> &mut Engine {
        self.engine
    }
}

impl Drop for ExclusionGuard<'_> {
    fn drop(&mut self) {
        if let Some(s) = self.engine.arena_mut().get_mut(self.id) {
            s.set_excluded(false);
        }
    }
}

fn recursive_lookup(engine: &mut Engine, id: StructureId, sym: Symbol, only_exported: bool) -> Option<BindingHandle> {
    let _span = span!(Level::DEBUG, "recursive_lookup", structure = ?id, symbol = %sym, only_exported).entered();
    let (local, imports, should_descend) = {
        let structure = engine.arena().get(id)?;
        let local = structure.lookup_local(sym);
        // A local binding - exported or not - always terminates the
        // search here: an unexported local binding shadows whatever
        // this structure's own imports would otherwise re-export, it
        // never falls through to them. Only when there is no local
        // binding at all do we consider descending into imports, and
        // then only when `only_exported` is false (this is the
        // original querying structure, whose own import list is
        // always searched) or this structure itself re-exports `sym`
        // (`EXPORT_ALL` or `sym` pending in its `interface`).
        let should_descend = local.is_none() && (!only_exported || structure.is_exported(sym));
        (local, structure.imports.clone(), should_descend)
    };
    if let Some(record) = local {
        return if !only_exported || record.borrow().is_exported {
            Some(record)
        } else {
            None
        };
    }
    if !should_descend {
        return None;
    }

    for imported in imports {
        let already_excluded = engine
            .arena()
            .get(imported)
            .is_none_or(Structure::is_excluded);
        if already_excluded {
            continue;
        }
        let mut guard = ExclusionGuard::enter(engine, imported);
        if let Some(found) = recursive_lookup(guard.engine(), imported, sym, true) {
            return Some(found);
        }
    }
    None
}

fn resolve_handle(engine: &mut Engine, start: StructureId, sym: Symbol) -> Option<BindingHandle> {
    if let Some(record) = engine.cache_mut().probe(start, sym) {
        debug!(structure = ?start, symbol = %sym, "lookup cache hit");
        return Some(record);
    }
    let found = recursive_lookup(engine, start, sym, false);
    if let Some(record) = &found {
        engine.cache_mut().enter(start, sym, record);
    } else {
        debug!(structure = ?start, symbol = %sym, "unqualified reference resolved to nothing");
    }
    found
}

fn non_void(sym: Symbol, value: Value) -> Result<Value, EngineError> {
    if value.is_void() {
        Err(EngineError::VoidValue { symbol: sym })
    } else {
        Ok(value)
    }
}

/// Unqualified reference against `start`'s own bindings and its import
/// graph.
pub fn lookup(engine: &mut Engine, start: StructureId, sym: Symbol) -> Result<Value, EngineError> {
    match resolve_handle(engine, start, sym) {
        Some(record) => non_void(sym, record.borrow().binding.clone()),
        None => Err(EngineError::VoidValue { symbol: sym }),
    }
}

/// Inspects `target`'s own interface directly: its local bindings only,
/// ignoring whatever it imports and ignoring any caller-reachability
/// check. This is *not* `external-structure-ref` (see [`external_ref`]) —
/// it exists as a direct inspection primitive for callers (and tests)
/// that already hold a `StructureId` and want to read its exports
/// without going through a particular caller's access rights.
#[must_use]
pub fn exported_ref(engine: &Engine, target: StructureId, sym: Symbol) -> Result<Value, EngineError> {
    let Some(s) = engine.arena().get(target) else {
        return Err(EngineError::TypeMismatch {
            expected: "structure",
            context: "exported-ref",
        });
    };
    match s.lookup_local(sym) {
        Some(record) if s.is_exported(sym) => non_void(sym, record.borrow().binding.clone()),
        _ => Err(EngineError::VoidValue { symbol: sym }),
    }
}

/// `external-structure-ref`: requires `target` to be in `caller`'s
/// `imports` or `accessible` list, then resolves `sym` the same way an
/// import would — `target`'s own exports, or (if `target` itself
/// re-exports an import) transitively through those, guarded against
/// cycles exactly like [`lookup`].
pub fn external_ref(engine: &mut Engine, caller: StructureId, target: StructureId, sym: Symbol) -> Result<Value, EngineError> {
    let _span = span!(Level::DEBUG, "external_ref", caller = ?caller, target = ?target, symbol = %sym).entered();
    let reachable = engine
        .arena()
        .get(caller)
        .is_some_and(|s| s.imports.contains(&target) || s.accessible.contains(&target));
    if !reachable {
        debug!(caller = ?caller, target = ?target, "external-structure-ref rejected: target not in caller's imports or accessible list");
        return Err(EngineError::VoidValue { symbol: sym });
    }
    match recursive_lookup(engine, target, sym, true) {
        Some(record) => non_void(sym, record.borrow().binding.clone()),
        None => Err(EngineError::VoidValue { symbol: sym }),
    }
}

/// Unqualified set: resolves exactly like `lookup`, then checks the
/// immutability flag before mutating in place.
pub fn set(engine: &mut Engine, start: StructureId, sym: Symbol, value: Value) -> Result<(), EngineError> {
    match resolve_handle(engine, start, sym) {
        Some(record) => {
            if record.borrow().is_constant {
                debug!(structure = ?start, symbol = %sym, "rejected set on constant binding");
                return Err(EngineError::SettingConstant { symbol: sym });
            }
            record.borrow_mut().binding = value;
            Ok(())
        }
        None => Err(EngineError::VoidValue { symbol: sym }),
    }
}

/// Binds `sym` directly in `structure`, bypassing import search. Only
/// invalidates the cache when a *new* record is created: overwriting an
/// existing record's value is invisible to the cache, since a cached hit
/// holds the record itself and reads its current value, but a fresh
/// record can shadow a resolution some other structure's cache entry
/// already walked through to find an outer binding of the same name.
pub fn define(engine: &mut Engine, structure: StructureId, sym: Symbol, value: Value) {
    let created = match engine.arena_mut().get_mut(structure) {
        Some(s) => {
            let (record, created) = s.lookup_or_add(sym);
            record.borrow_mut().binding = value;
            created
        }
        None => return,
    };
    if created {
        engine.cache_mut().invalidate_symbol(sym);
    }
}

pub fn make_binding_immutable(engine: &mut Engine, structure: StructureId, sym: Symbol) {
    if let Some(s) = engine.arena_mut().get_mut(structure) {
        let (record, _created) = s.lookup_or_add(sym);
        record.borrow_mut().is_constant = true;
    }
}

#[must_use]
pub fn binding_immutable_p(engine: &Engine, structure: StructureId, sym: Symbol) -> bool {
    engine
        .arena()
        .get(structure)
        .and_then(|s| s.lookup_local(sym))
        .is_some_and(|record| record.borrow().is_constant)
}
