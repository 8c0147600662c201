//! The engine: owns the structure arena, the lookup cache, the four
//! bootstrap roots, and the loader collaborator, and exposes the
//! structure-engine operations (§6) as ordinary methods. Individual
//! algorithms live in their own modules (`resolver`, `builder`,
//! `registry`, `feature`, `cache`) as free functions taking `&mut Engine`,
//! so they all share one mutable borrow instead of fighting the borrow
//! checker over which field is borrowed when.

use crate::builder::{self, StructureInterface};
use crate::cache::Cache;
use crate::collab::Loader;
use crate::feature;
use crate::gc::{Collector, StructureArena, StructureId};
use crate::registry;
use crate::resolver;
use crate::structure::Structure;
use crate::value::{ApplyHook, Callable, Value};
use rustc_hash::FxHashSet;
use std::rc::Rc;
use structures_common::{EngineError, Symbol};

/// A structure engine instance: one arena, one cache, one loader, one set
/// of bootstrap roots. Nothing here is `Send`/`Sync` — see the crate docs
/// for why that is the right call for a single-threaded host.
pub struct Engine {
    arena: StructureArena,
    cache: Cache,
    loader: Box<dyn Loader>,
    features: FxHashSet<Symbol>,
    registry: StructureId,
    specials: StructureId,
    default: StructureId,
    current: StructureId,
}

impl Engine {
    /// Builds a fresh engine with the four bootstrap structures named the
    /// way `rep_pre_structures_init`/`rep_structures_init` name them:
    /// `%structures` (the registry, which names itself), `%specials`, the
    /// default library structure `rep`, and an anonymous initial current
    /// structure that opens `rep`.
    #[must_use]
    pub fn new(loader: Box<dyn Loader>) -> Self {
        let mut arena = StructureArena::new();
        let registry = arena.insert(Structure::new(None, crate::structure::StructureFlags::EXPORT_ALL));
        let specials = arena.insert(Structure::new(None, crate::structure::StructureFlags::EXPORT_ALL));
        let default = arena.insert(Structure::new(None, crate::structure::StructureFlags::EXPORT_ALL));
        let current = arena.insert(Structure::anonymous());

        let mut engine = Self {
            arena,
            cache: Cache::new(),
            loader,
            features: FxHashSet::default(),
            registry,
            specials,
            default,
            current,
        };

        registry::register_bootstrap(&mut engine, registry, specials, default);
        if let Some(s) = engine.arena.get_mut(current) {
            s.imports.push(default);
        }
        engine
    }

    #[must_use]
    pub fn registry(&self) -> StructureId {
        self.registry
    }

    #[must_use]
    pub fn specials(&self) -> StructureId {
        self.specials
    }

    #[must_use]
    pub fn default_structure(&self) -> StructureId {
        self.default
    }

    #[must_use]
    pub fn current(&self) -> StructureId {
        self.current
    }

    pub fn set_current(&mut self, id: StructureId) {
        self.current = id;
    }

    pub(crate) fn arena(&self) -> &StructureArena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut StructureArena {
        &mut self.arena
    }

    pub(crate) fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }

    pub(crate) fn features(&self) -> &FxHashSet<Symbol> {
        &self.features
    }

    pub(crate) fn features_mut(&mut self) -> &mut FxHashSet<Symbol> {
        &mut self.features
    }

    /// Temporarily hands ownership of the loader to the caller, leaving a
    /// `NullLoader` in its place, so `require` can call `Loader::load`
    /// with a `&mut Engine` that doesn't alias the loader it was fetched
    /// from. Paired with [`Engine::restore_loader`].
    pub(crate) fn take_loader(&mut self) -> Box<dyn Loader> {
        std::mem::replace(&mut self.loader, Box::new(crate::collab::NullLoader))
    }

    pub(crate) fn restore_loader(&mut self, loader: Box<dyn Loader>) {
        self.loader = loader;
    }

    #[must_use]
    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.arena.get(id)
    }

    // ---- C4: resolution -------------------------------------------------

    /// Resolves `sym` against `self.current()`: a local binding, or one
    /// reachable transitively through `open`ed structures.
    pub fn reference(&mut self, sym: Symbol) -> Result<Value, EngineError> {
        let current = self.current;
        self.reference_in(current, sym)
    }

    pub fn reference_in(&mut self, structure: StructureId, sym: Symbol) -> Result<Value, EngineError> {
        resolver::lookup(self, structure, sym)
    }

    /// `external-structure-ref`: `caller` must have `target` in its
    /// `imports` or `accessible` list; resolution then walks `target`
    /// transitively the same way an import would.
    pub fn external_ref(&mut self, caller: StructureId, target: StructureId, sym: Symbol) -> Result<Value, EngineError> {
        resolver::external_ref(self, caller, target, sym)
    }

    /// Direct inspection of `structure`'s own exported interface, with no
    /// caller-reachability gate. Mostly useful for tests and tooling that
    /// already hold a `StructureId` and want to read its exports.
    #[must_use]
    pub fn exported_ref(&self, structure: StructureId, sym: Symbol) -> Result<Value, EngineError> {
        resolver::exported_ref(self, structure, sym)
    }

    pub fn set(&mut self, sym: Symbol, value: Value) -> Result<(), EngineError> {
        let current = self.current;
        self.set_in(current, sym, value)
    }

    pub fn set_in(&mut self, structure: StructureId, sym: Symbol, value: Value) -> Result<(), EngineError> {
        resolver::set(self, structure, sym, value)
    }

    /// Binds `sym` directly in `structure` without consulting imports,
    /// creating the binding if absent (`structure-define`/internal
    /// `define`).
    pub fn define_in(&mut self, structure: StructureId, sym: Symbol, value: Value) {
        resolver::define(self, structure, sym, value);
    }

    pub fn make_binding_immutable(&mut self, structure: StructureId, sym: Symbol) {
        resolver::make_binding_immutable(self, structure, sym);
    }

    #[must_use]
    pub fn binding_immutable_p(&self, structure: StructureId, sym: Symbol) -> bool {
        resolver::binding_immutable_p(self, structure, sym)
    }

    // ---- C6: construction -------------------------------------------------

    pub fn make_structure(
        &mut self,
        interface: StructureInterface,
        imports: &[StructureId],
        accesses: &[StructureId],
        header: Option<Rc<dyn Callable>>,
        body: Option<Rc<dyn Callable>>,
    ) -> Result<StructureId, EngineError> {
        builder::make_structure(self, interface, imports, accesses, header, body)
    }

    pub fn open_structures(&mut self, target: StructureId, structures: &[StructureId]) {
        builder::open_structures(self, target, structures);
    }

    pub fn access_structures(&mut self, target: StructureId, structures: &[StructureId]) {
        builder::access_structures(self, target, structures);
    }

    pub fn install_vm(&mut self, structure: StructureId, hook: Rc<dyn ApplyHook>) {
        if let Some(s) = self.arena.get_mut(structure) {
            s.apply_hook = Some(hook);
        }
    }

    // ---- C3: registry -------------------------------------------------

    #[must_use]
    pub fn get_structure(&self, name: Symbol) -> Option<StructureId> {
        registry::get_structure(self, name)
    }

    pub fn name_structure(&mut self, id: StructureId, name: Option<Symbol>) {
        registry::name_structure(self, id, name);
    }

    // ---- C7: features -------------------------------------------------

    #[must_use]
    pub fn featurep(&self, feature: Symbol) -> bool {
        feature::featurep(self, feature)
    }

    pub fn provide(&mut self, feature: Symbol) {
        feature::provide(self, feature);
    }

    pub fn require(&mut self, feature: Symbol) -> Result<(), EngineError> {
        feature::require(self, feature)
    }

    pub fn intern_structure(&mut self, name: Symbol) -> Result<StructureId, EngineError> {
        feature::intern_structure(self, name)
    }

    // ---- C8: gc -------------------------------------------------

    /// Marks from the four bootstrap roots, transitively follows imports,
    /// accesses, and any `Value::Structure`/closure-home edges discovered
    /// along the way, then sweeps and invalidates the cache for anything
    /// collected.
    pub fn collect(&mut self, collector: &mut dyn Collector) -> Vec<StructureId> {
        let mut worklist = vec![self.current, self.default, self.specials, self.registry];
        while let Some(id) = worklist.pop() {
            if self.arena.mark(id) {
                if let Some(structure) = self.arena.get(id) {
                    let mut discovered = Vec::new();
                    structure.mark(collector, &mut discovered);
                    worklist.extend(discovered);
                }
            }
        }
        let freed = self.arena.sweep();
        for id in &freed {
            self.cache.invalidate_structure(*id);
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NullLoader;

    #[test]
    fn bootstrap_roots_are_named() {
        let engine = Engine::new(Box::new(NullLoader));
        assert_eq!(engine.get_structure(structures_common::symbol::intern("rep")), Some(engine.default_structure()));
        assert_eq!(
            engine.get_structure(structures_common::symbol::intern("%specials")),
            Some(engine.specials())
        );
        assert_eq!(
            engine.get_structure(structures_common::symbol::intern("%structures")),
            Some(engine.registry())
        );
    }

    #[test]
    fn initial_current_structure_is_anonymous_and_opens_default() {
        let engine = Engine::new(Box::new(NullLoader));
        let current = engine.get(engine.current()).unwrap();
        assert!(current.name.is_none());
        assert!(current.imports.contains(&engine.default_structure()));
    }
}
