//! C7 — features: `featurep`/`provide`/`require`, and `intern-structure`
//! which layers structure lookup on top of `require`.
//!
//! Grounded on `structures.c`'s `Ffeaturep`/`Fprovide`/`Frequire`/
//! `F_intern_structure`: a feature is just a symbol in a set: checking it
//! is a set membership test, providing it is an insert, and requiring it
//! loads whatever source defines it into the current structure, then
//! names it, imports it, provides it, and flushes the cache — all as one
//! atomic follow-through on a successful load, not left to the loaded
//! source to do piecemeal.

use crate::engine::Engine;
use crate::gc::StructureId;
use structures_common::{EngineError, Symbol};
use tracing::{Level, debug, span};

#[must_use]
pub fn featurep(engine: &Engine, feature: Symbol) -> bool {
    engine.features().contains(&feature)
}

pub fn provide(engine: &mut Engine, feature: Symbol) {
    engine.features_mut().insert(feature);
}

/// Loads `feature` into `current` unless it is already provided or
/// already imported there. The load runs with `current` unchanged (bare
/// top-level forms in the loaded source affect the requiring structure
/// directly, not some structure the loader invents) via the
/// take/restore-loader dance that keeps `Loader::load`'s `&mut Engine`
/// from aliasing the loader fetched off `engine` itself.
///
/// On success: the structure to name/import is whatever the load
/// *produced* (per the `Loader` contract, "if the file's top-level form
/// yielded a structure, that structure is the value"), falling back to a
/// registry lookup by `feature`'s name in case the loaded source named
/// itself directly. If neither yields a structure — the common case of
/// source that defines things directly in `current` rather than
/// creating a separate named structure — nothing beyond `provide` and
/// the cache flush happens. Otherwise: name the structure if anonymous,
/// add it to `current.imports`, `provide`, and flush the cache — a
/// fresh import can shadow whatever some other structure already cached
/// through `current`.
pub fn require(engine: &mut Engine, feature: Symbol) -> Result<(), EngineError> {
    let _span = span!(Level::DEBUG, "require", feature = %feature).entered();
    if featurep(engine, feature) {
        debug!(%feature, "already provided, skipping load");
        return Ok(());
    }
    let current = engine.current();
    if let Some(id) = engine.get_structure(feature) {
        if engine.get(current).is_some_and(|s| s.imports.contains(&id)) {
            debug!(%feature, "already imported into current structure, skipping load");
            return Ok(());
        }
    }

    debug!(%feature, "invoking loader");
    let mut loader = engine.take_loader();
    let result = loader.load(engine, feature);
    engine.restore_loader(loader);
    let produced = result?;

    let structure = produced.as_structure().or_else(|| engine.get_structure(feature));
    if let Some(id) = structure {
        if engine.get(id).is_some_and(|s| s.name.is_none()) {
            engine.name_structure(id, Some(feature));
        }
        if let Some(s) = engine.arena_mut().get_mut(current) {
            if !s.imports.contains(&id) {
                s.imports.push(id);
            }
        }
    }
    provide(engine, feature);
    engine.cache_mut().flush();
    Ok(())
}

/// Returns the structure named `name`, loading it on demand if the
/// registry doesn't already know it. Unlike `require`, the load happens
/// with `default_structure` pushed as current rather than whatever
/// structure called `intern_structure` — callers like `open`, which only
/// want the import edge and no side effect on their own namespace, and
/// engine bootstrap, which has no meaningful "caller" yet.
pub fn intern_structure(engine: &mut Engine, name: Symbol) -> Result<StructureId, EngineError> {
    if let Some(id) = engine.get_structure(name) {
        return Ok(id);
    }
    let previous = engine.current();
    engine.set_current(engine.default_structure());
    let result = require(engine, name);
    engine.set_current(previous);
    result?;
    engine.get_structure(name).ok_or(EngineError::LoadFailure {
        feature: name,
        message: "loader completed but did not register the requested structure".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Loader, NullLoader};
    use crate::structure::Structure;
    use crate::value::Value;
    use structures_common::symbol::intern;

    #[test]
    fn provide_then_featurep_is_true() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let feature = intern("feature-basic");
        assert!(!featurep(&engine, feature));
        provide(&mut engine, feature);
        assert!(featurep(&engine, feature));
    }

    #[test]
    fn require_is_a_no_op_once_provided() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let feature = intern("feature-already-provided");
        provide(&mut engine, feature);
        assert!(require(&mut engine, feature).is_ok());
    }

    #[test]
    fn require_surfaces_the_loader_error() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let feature = intern("feature-missing-loader");
        assert!(require(&mut engine, feature).is_err());
    }

    /// A loader whose `load` returns a freshly-allocated anonymous
    /// structure as its value, matching a real loader whose top-level
    /// `(structure ...)` form produced it — `require` is responsible for
    /// naming it and wiring it in, not the loader.
    struct RegisteringLoader;
    impl Loader for RegisteringLoader {
        fn load(&mut self, engine: &mut Engine, _feature: Symbol) -> Result<Value, EngineError> {
            let id = engine.arena_mut().insert(Structure::anonymous());
            Ok(Value::Structure(id))
        }
    }

    #[test]
    fn intern_structure_loads_on_demand() {
        let mut engine = Engine::new(Box::new(RegisteringLoader));
        let name = intern("feature-loaded-structure");
        assert!(engine.get_structure(name).is_none());
        let id = intern_structure(&mut engine, name).unwrap();
        assert_eq!(engine.get_structure(name), Some(id));
        assert!(featurep(&engine, name));
    }

    #[test]
    fn intern_structure_skips_the_loader_for_a_known_structure() {
        let mut engine = Engine::new(Box::new(NullLoader));
        let id = engine.arena_mut().insert(Structure::anonymous());
        let name = intern("feature-preexisting-structure");
        engine.name_structure(id, Some(name));
        assert_eq!(intern_structure(&mut engine, name), Ok(id));
    }
}
