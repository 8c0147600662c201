//! External collaborators: the narrow traits this crate calls out to but
//! never implements beyond a reference/test stand-in. The real
//! implementations — a source-file reader, an evaluator for whatever
//! surface syntax the host parses, the host's own `Callable`s — live
//! outside this crate.

use crate::engine::Engine;
use crate::gc::StructureId;
use crate::value::Value;
use structures_common::{EngineError, Symbol};

/// Services `require`/`intern-structure`: given a feature name this
/// engine doesn't yet recognize, find and evaluate whatever source
/// defines it. A real implementation resolves `feature` to a file on a
/// load path, parses it, and evaluates each top-level form against the
/// engine (typically calling `Engine::make_structure` and
/// `Engine::provide`).
///
/// The return value is whatever the load produced, matching `load`'s
/// external contract: "returns the value produced by loading a file; if
/// the file's top-level form yielded a structure, that structure is the
/// value." `require` inspects this to find the structure it should name
/// and import even when that structure was never itself registered
/// under `feature`'s name (it may be anonymous, or named differently).
pub trait Loader {
    fn load(&mut self, engine: &mut Engine, feature: Symbol) -> Result<Value, EngineError>;
}

/// A `Loader` that always fails, for engines that have no load path
/// configured (unit tests, embedding scenarios that pre-populate every
/// structure by hand).
pub struct NullLoader;

impl Loader for NullLoader {
    fn load(&mut self, _engine: &mut Engine, feature: Symbol) -> Result<Value, EngineError> {
        Err(EngineError::LoadFailure {
            feature,
            message: "no loader configured".to_owned(),
        })
    }
}

/// Evaluates host surface syntax against a structure. Not called by
/// anything in this crate directly — `Callable::call0` is how the engine
/// itself invokes header/body thunks — but is the seam a driver (the CLI,
/// an embedder's REPL) uses to turn source text into calls against
/// `Engine`.
pub trait Evaluator {
    fn eval_top_level(&mut self, engine: &mut Engine, home: StructureId, source: &str) -> Result<(), EngineError>;
}
