//! C6 — structure construction: `make-structure`, `open-structures`,
//! `access-structures`.
//!
//! Grounded on `structures.c`'s `F_make_structure`: a new structure is
//! allocated first (so header/body thunks can close over its id and
//! `rep_push_structure`/`rep_pop_structure` it as current while they
//! run), and if either thunk fails the partially-built structure is
//! discarded immediately rather than left for the next collection.

use crate::engine::Engine;
use crate::gc::StructureId;
use crate::structure::{Structure, StructureFlags};
use crate::value::Callable;
use std::rc::Rc;
use structures_common::{EngineError, Symbol};
use tracing::{Level, debug, span};

/// What a new structure exports: everything it ever binds, or exactly
/// the names listed (pre-declared as exported `Void` bindings so
/// `external-structure-ref` can see them even before the body thunk
/// defines them).
pub enum StructureInterface {
    All,
    Only(Vec<Symbol>),
}

/// Temporarily makes `next` the current structure, restoring the
/// previous one on drop — `rep_push_structure`/`rep_pop_structure`.
struct CurrentGuard<'a> {
    engine: &'a mut Engine,
    previous: StructureId,
}

impl<'a> CurrentGuard<'a> {
    fn push(engine: &'a mut Engine, next: StructureId) -> Self {
        let previous = engine.current();
        engine.set_current(next);
        Self { engine, previous }
    }

    fn engine(&mut self) -> &mut Engine {
        self.engine
    }
}

impl Drop for CurrentGuard<'_> {
    fn drop(&mut self) {
        self.engine.set_current(self.previous);
    }
}

fn run_thunk(engine: &mut Engine, id: StructureId, thunk: Option<Rc<dyn Callable>>) -> Result<(), EngineError> {
    let Some(thunk) = thunk else {
        return Ok(());
    };
    let mut guard = CurrentGuard::push(engine, id);
    thunk.call0(guard.engine())?;
    Ok(())
}

/// Builds a new, initially-anonymous structure and runs its header and
/// body thunks (each with the new structure pushed as current) in order.
/// If either thunk errors, the structure is removed from the arena
/// before the error is returned — callers never observe a half-built
/// structure by id.
pub fn make_structure(
    engine: &mut Engine,
    interface: StructureInterface,
    imports: &[StructureId],
    accesses: &[StructureId],
    header: Option<Rc<dyn Callable>>,
    body: Option<Rc<dyn Callable>>,
) -> Result<StructureId, EngineError> {
    let _span = span!(Level::DEBUG, "make_structure", imports = imports.len(), accesses = accesses.len()).entered();
    let flags = match &interface {
        StructureInterface::All => StructureFlags::EXPORT_ALL,
        StructureInterface::Only(_) => StructureFlags::empty(),
    };
    let mut structure = Structure::new(None, flags);
    structure.imports = imports.iter().copied().collect();
    structure.accessible = accesses.iter().copied().collect();
    let id = engine.arena_mut().insert(structure);

    if let StructureInterface::Only(names) = interface {
        if let Some(s) = engine.arena_mut().get_mut(id) {
            s.set_interface(names);
        }
    }

    if let Some(header) = &header {
        header.set_home_structure(id);
    }
    if let Some(body) = &body {
        body.set_home_structure(id);
    }

    if let Err(err) = run_thunk(engine, id, header) {
        debug!(structure = ?id, %err, "header thunk failed, discarding partially-built structure");
        engine.arena_mut().remove(id);
        return Err(err);
    }
    if let Err(err) = run_thunk(engine, id, body) {
        debug!(structure = ?id, %err, "body thunk failed, discarding partially-built structure");
        engine.arena_mut().remove(id);
        return Err(err);
    }
    Ok(id)
}

/// Adds `structures` to `target`'s import list (each structure's
/// exports become visible unqualified in `target`). Idempotent per
/// structure. Each newly opened structure is *prepended*, matching
/// `F_open_structures`'s `dst->imports = Fcons(car, dst->imports)` — the
/// most recently opened structure takes priority on a name collision,
/// since "earlier entries win" in the resolver's import walk. Flushes
/// the whole lookup cache: a new import can shadow a resolution some
/// other structure already cached, and imports are rare enough next to
/// lookups that a blanket flush is cheaper than tracking exactly which
/// cache entries it could affect.
pub fn open_structures(engine: &mut Engine, target: StructureId, structures: &[StructureId]) {
    let _span = span!(Level::DEBUG, "open_structures", target = ?target, count = structures.len()).entered();
    if let Some(s) = engine.arena_mut().get_mut(target) {
        for &id in structures {
            if !s.imports.contains(&id) {
                s.imports.insert(0, id);
            }
        }
    }
    engine.cache_mut().flush();
}

/// Adds `structures` to `target`'s access list (reachable only through
/// `external-structure-ref`, never unqualified). Idempotent per
/// structure; no cache effect since unqualified resolution never
/// consults `accessible`.
pub fn access_structures(engine: &mut Engine, target: StructureId, structures: &[StructureId]) {
    if let Some(s) = engine.arena_mut().get_mut(target) {
        for &id in structures {
            if !s.accessible.contains(&id) {
                s.accessible.push(id);
            }
        }
    }
}
