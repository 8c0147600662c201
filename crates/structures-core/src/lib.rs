//! A Scheme48/SML-style first-class module ("structure") engine: named
//! environments with controlled export interfaces, transitive `open`
//! (import) resolution, qualified `access`, a process-wide direct-mapped
//! lookup cache, and collaboration hooks for a host tracing collector.
//!
//! The runtime value representation (`Value`), the structure arena, and
//! the evaluator/closure/loader/collector contracts all live in this one
//! crate because none of them can be usefully separated: a `Value` can
//! hold a `StructureId`, a `Callable` closes over a `StructureId` as its
//! home, and the engine that owns the arena is what every resolver and
//! builder operation mutates.
//!
//! Host-agnostic pieces — interned `Symbol`s and the typed `EngineError`
//! set — live in `structures-common` instead, since they don't depend on
//! anything here.

pub mod binding_table;
pub mod builder;
pub mod cache;
pub mod collab;
pub mod engine;
pub mod feature;
pub mod gc;
pub mod registry;
pub mod resolver;
pub mod structure;
pub mod value;

pub use binding_table::{BindingHandle, BindingRecord, BindingTable};
pub use builder::StructureInterface;
pub use collab::{Evaluator, Loader, NullLoader};
pub use engine::Engine;
pub use gc::{Collector, NullCollector, StructureArena, StructureId};
pub use structure::{Structure, StructureFlags};
pub use value::{ApplyHook, Callable, Value};

pub use structures_common::{EngineError, Symbol};
