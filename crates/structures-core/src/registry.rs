//! C3 — the structure registry: the distinguished `%structures` structure
//! whose bindings map a name to the structure it names, used by
//! `get-structure`/`name-structure`/`intern-structure`.

use crate::engine::Engine;
use crate::gc::StructureId;
use crate::value::Value;
use structures_common::Symbol;
use tracing::debug;

/// Names the three structures the engine bootstraps with. Called once
/// from `Engine::new`.
pub(crate) fn register_bootstrap(engine: &mut Engine, registry: StructureId, specials: StructureId, default: StructureId) {
    name_structure(engine, registry, Some(structures_common::symbol::intern("%structures")));
    name_structure(engine, specials, Some(structures_common::symbol::intern("%specials")));
    name_structure(engine, default, Some(structures_common::symbol::intern("rep")));
}

#[must_use]
pub fn get_structure(engine: &Engine, name: Symbol) -> Option<StructureId> {
    let registry = engine.arena().get(engine.registry())?;
    registry.lookup_local(name)?.borrow().binding.as_structure()
}

/// Renames `id` to `name`, registering the new name in `%structures` and
/// removing any previous registration. If `name` is `None`, the previous
/// registry entry is cleared (future `get-structure` calls for the old
/// name fail) but — matching the reference implementation's documented
/// quirk — `id`'s own `name` field is *not* reset to `None`. A structure
/// that was once named keeps reporting that name to its holder even after
/// being unregistered.
pub fn name_structure(engine: &mut Engine, id: StructureId, name: Option<Symbol>) {
    debug!(structure = ?id, ?name, "renaming structure in the registry");
    let old_name = engine.arena().get(id).and_then(|s| s.name);
    let registry = engine.registry();

    if let Some(old) = old_name {
        if let Some(record) = engine
            .arena()
            .get(registry)
            .and_then(|structure| structure.lookup_local(old))
        {
            if record.borrow().binding.as_structure() == Some(id) {
                record.borrow_mut().binding = Value::Void;
            }
        }
        engine.cache_mut().invalidate_symbol(old);
    }

    if let Some(new_name) = name {
        if let Some(registry_structure) = engine.arena_mut().get_mut(registry) {
            let (record, _created) = registry_structure.lookup_or_add(new_name);
            record.borrow_mut().binding = Value::Structure(id);
        }
        engine.cache_mut().invalidate_symbol(new_name);
        if let Some(structure) = engine.arena_mut().get_mut(id) {
            structure.name = Some(new_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NullLoader;
    use crate::structure::Structure;
    use structures_common::symbol::intern;

    #[test]
    fn naming_a_structure_makes_it_findable() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let id = engine.arena_mut().insert(Structure::anonymous());
        name_structure(&mut engine, id, Some(intern("registry-findable")));
        assert_eq!(get_structure(&engine, intern("registry-findable")), Some(id));
    }

    #[test]
    fn renaming_removes_the_old_name() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let id = engine.arena_mut().insert(Structure::anonymous());
        name_structure(&mut engine, id, Some(intern("registry-old-name")));
        name_structure(&mut engine, id, Some(intern("registry-new-name")));
        assert_eq!(get_structure(&engine, intern("registry-old-name")), None);
        assert_eq!(get_structure(&engine, intern("registry-new-name")), Some(id));
    }

    #[test]
    fn name_clears_registry_not_structure_name() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let id = engine.arena_mut().insert(Structure::anonymous());
        name_structure(&mut engine, id, Some(intern("registry-vanishing")));
        name_structure(&mut engine, id, None);

        assert_eq!(get_structure(&engine, intern("registry-vanishing")), None);
        assert_eq!(
            engine.get(id).and_then(|s| s.name),
            Some(intern("registry-vanishing")),
            "structure.name must survive an unregistering name-structure call"
        );
    }

    #[test]
    fn a_structure_registered_under_a_new_name_does_not_clobber_a_different_holder() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let a = engine.arena_mut().insert(Structure::anonymous());
        let b = engine.arena_mut().insert(Structure::anonymous());
        name_structure(&mut engine, a, Some(intern("registry-shared-name")));
        // b steals the name.
        name_structure(&mut engine, b, Some(intern("registry-shared-name")));
        // a forgets the name it no longer holds: its own stale record
        // must not clear b's registration.
        name_structure(&mut engine, a, None);
        assert_eq!(get_structure(&engine, intern("registry-shared-name")), Some(b));
    }
}
