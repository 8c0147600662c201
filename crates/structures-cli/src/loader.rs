//! `FilesystemLoader`: the reference `Loader` implementation the driver
//! installs on its `Engine`. Resolves a required feature's name to
//! `<root>/<name>.rep`, reads it with the toy [`crate::sexpr`] reader,
//! and evaluates each top-level form against the engine.
//!
//! This is explicitly a stand-in for the real reader/evaluator (both out
//! of scope for the engine itself — see `structures-core`'s crate docs):
//! just enough surface syntax to write the driver's own demo/test
//! `.rep` files and exercise `require`, `provide`, `open`, `access`, and
//! `(structure ...)` end to end.

use crate::sexpr::{self, SExpr};
use std::path::PathBuf;
use structures_core::{Engine, EngineError, Loader, StructureId, StructureInterface, Symbol, Value};

/// Reads `.rep` files relative to a configured root directory.
pub struct FilesystemLoader {
    root: PathBuf,
}

impl FilesystemLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, feature: Symbol) -> PathBuf {
        self.root.join(format!("{}.rep", feature.as_str()))
    }
}

impl Loader for FilesystemLoader {
    fn load(&mut self, engine: &mut Engine, feature: Symbol) -> Result<Value, EngineError> {
        let path = self.path_for(feature);
        let source = std::fs::read_to_string(&path).map_err(|e| EngineError::LoadFailure {
            feature,
            message: format!("reading {}: {e}", path.display()),
        })?;
        eval_source(engine, &source).map_err(|message| EngineError::LoadFailure { feature, message })
    }
}

/// Parses `source` and evaluates each top-level form in order against
/// `engine.current()`, returning the value of the last form (per the
/// `Loader` contract: "the value produced by loading a file"). An empty
/// file produces `Value::Void`.
fn eval_source(engine: &mut Engine, source: &str) -> Result<Value, String> {
    let forms = sexpr::read_all(source).map_err(|e| e.to_string())?;
    let mut last = Value::Void;
    for form in &forms {
        last = eval_top_level(engine, form)?;
    }
    Ok(last)
}

fn intern_by_name(engine: &mut Engine, name: &str) -> Result<StructureId, String> {
    let sym = structures_common::symbol::intern(name);
    engine
        .intern_structure(sym)
        .map_err(|e| format!("resolving structure '{name}': {e}"))
}

fn symbols_after<'a>(head: &str, form: &'a [SExpr]) -> Result<Vec<&'a str>, String> {
    form[1..]
        .iter()
        .map(|s| s.as_symbol().ok_or_else(|| format!("'{head}' expects bare symbols, found {s}")))
        .collect()
}

fn eval_top_level(engine: &mut Engine, form: &SExpr) -> Result<Value, String> {
    let SExpr::List(items) = form else {
        return eval_value(engine, form);
    };
    let Some(head) = items.first().and_then(SExpr::as_symbol) else {
        return eval_value(engine, form);
    };

    match head {
        "define" => {
            let [_, name, value] = items.as_slice() else {
                return Err("'define' expects (define name value)".to_owned());
            };
            let sym = name.as_symbol().ok_or_else(|| format!("'define' expects a symbol name, found {name}"))?;
            let value = eval_value(engine, value)?;
            let current = engine.current();
            engine.define_in(current, structures_common::symbol::intern(sym), value);
            Ok(Value::Void)
        }
        "require" => {
            let [_, name] = items.as_slice() else {
                return Err("'require' expects exactly one feature name".to_owned());
            };
            let sym = quoted_or_bare_symbol(name)?;
            engine
                .require(structures_common::symbol::intern(sym))
                .map_err(|e| format!("(require '{sym}'): {e}"))?;
            Ok(Value::Void)
        }
        "provide" => {
            let [_, name] = items.as_slice() else {
                return Err("'provide' expects exactly one feature name".to_owned());
            };
            let sym = quoted_or_bare_symbol(name)?;
            engine.provide(structures_common::symbol::intern(sym));
            Ok(Value::Void)
        }
        "open" => {
            let names = symbols_after("open", items)?;
            let current = engine.current();
            let ids = names
                .iter()
                .map(|name| intern_by_name(engine, name))
                .collect::<Result<Vec<_>, _>>()?;
            engine.open_structures(current, &ids);
            Ok(Value::Void)
        }
        "access" => {
            let names = symbols_after("access", items)?;
            let current = engine.current();
            let ids = names
                .iter()
                .map(|name| intern_by_name(engine, name))
                .collect::<Result<Vec<_>, _>>()?;
            engine.access_structures(current, &ids);
            Ok(Value::Void)
        }
        "structure" => eval_structure_form(engine, &items[1..]).map(Value::Structure),
        _ => eval_value(engine, form),
    }
}

/// `(structure (export a b ...)? (open x y ...)? (access z ...)? form*)`.
/// Builds the structure with its imports/accesses resolved up front (the
/// `(open ...)`/`(access ...)` clauses are config, not body forms — see
/// the module-language grammar in the reference source), then evaluates
/// the remaining body forms with the new structure pushed as current.
fn eval_structure_form(engine: &mut Engine, clauses_and_body: &[SExpr]) -> Result<StructureId, String> {
    let mut interface = StructureInterface::All;
    let mut imports = Vec::new();
    let mut accesses = Vec::new();
    let mut body_start = 0;

    for (i, clause) in clauses_and_body.iter().enumerate() {
        let Some(items) = clause.as_list() else { break };
        let Some(head) = items.first().and_then(SExpr::as_symbol) else {
            break;
        };
        match head {
            "export" => {
                let names = symbols_after("export", items)?;
                interface = StructureInterface::Only(names.iter().map(|n| structures_common::symbol::intern(n)).collect());
            }
            "open" => {
                for name in symbols_after("open", items)? {
                    imports.push(intern_by_name(engine, name)?);
                }
            }
            "access" => {
                for name in symbols_after("access", items)? {
                    accesses.push(intern_by_name(engine, name)?);
                }
            }
            _ => break,
        }
        body_start = i + 1;
    }

    let id = engine
        .make_structure(interface, &imports, &accesses, None, None)
        .map_err(|e| format!("building structure: {e}"))?;

    let previous = engine.current();
    engine.set_current(id);
    let result = (|| -> Result<(), String> {
        for form in &clauses_and_body[body_start..] {
            eval_top_level(engine, form)?;
        }
        Ok(())
    })();
    engine.set_current(previous);
    result?;
    Ok(id)
}

fn quoted_or_bare_symbol(expr: &SExpr) -> Result<&str, String> {
    match expr {
        SExpr::Symbol(s) => Ok(s),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Symbol(q), SExpr::Symbol(s)] if q == "quote" => Ok(s),
            _ => Err(format!("expected a symbol or quoted symbol, found {expr}")),
        },
        _ => Err(format!("expected a symbol or quoted symbol, found {expr}")),
    }
}

/// Evaluates a value-position expression: self-evaluating literals,
/// `(quote datum)` (returning a symbol or a homogeneous symbol list), a
/// bare symbol (a reference to that name in the current structure), or a
/// nested `(structure ...)` form.
fn eval_value(engine: &mut Engine, expr: &SExpr) -> Result<Value, String> {
    match expr {
        SExpr::Int(n) => Ok(Value::Int(*n)),
        SExpr::Str(s) => Ok(Value::Str(s.as_str().into())),
        SExpr::Bool(b) => Ok(Value::Bool(*b)),
        SExpr::Symbol(s) => {
            let current = engine.current();
            engine
                .reference_in(current, structures_common::symbol::intern(s))
                .map_err(|e| format!("referencing '{s}': {e}"))
        }
        SExpr::List(items) => match items.first().and_then(SExpr::as_symbol) {
            Some("quote") => quote_datum(items.get(1).ok_or_else(|| "'quote' expects exactly one datum".to_owned())?),
            Some("structure") => eval_structure_form(engine, &items[1..]).map(Value::Structure),
            _ => Err(format!("don't know how to evaluate {expr} in value position")),
        },
    }
}

fn quote_datum(expr: &SExpr) -> Result<Value, String> {
    match expr {
        SExpr::Symbol(s) => Ok(Value::Symbol(structures_common::symbol::intern(s))),
        SExpr::Int(n) => Ok(Value::Int(*n)),
        SExpr::Str(s) => Ok(Value::Str(s.as_str().into())),
        SExpr::Bool(b) => Ok(Value::Bool(*b)),
        SExpr::List(items) => {
            let values = items.iter().map(quote_datum).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(std::rc::Rc::new(values)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use structures_core::NullCollector;
    use tempfile::tempdir;

    fn engine_with_root(dir: &Path) -> Engine {
        Engine::new(Box::new(FilesystemLoader::new(dir)))
    }

    #[test]
    fn define_and_reference_round_trip() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("root.rep"), "(define x 42)").unwrap();
        let mut engine = engine_with_root(dir.path());
        let root = structures_common::symbol::intern("root");
        engine.require(root).unwrap();
        let x = structures_common::symbol::intern("x");
        assert_eq!(engine.reference_in(engine.current(), x), Ok(Value::Int(42)));
    }

    #[test]
    fn require_picks_up_helper_via_open() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("helper.rep"),
            "(structure (export greeting) (define greeting \"hi\"))",
        )
        .unwrap();
        std::fs::write(dir.path().join("root.rep"), "(require 'helper)\n(open helper)").unwrap();

        let mut engine = engine_with_root(dir.path());
        let root = structures_common::symbol::intern("root");
        engine.require(root).unwrap();

        let greeting = structures_common::symbol::intern("greeting");
        assert_eq!(
            engine.reference_in(engine.current(), greeting),
            Ok(Value::Str("hi".into()))
        );
    }

    #[test]
    fn structure_form_exports_only_the_named_symbols() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("root.rep"),
            "(structure (export foo) (define foo 1) (define bar 2))",
        )
        .unwrap();
        let mut engine = engine_with_root(dir.path());
        let root_sym = structures_common::symbol::intern("root");
        engine.require(root_sym).unwrap();

        let root_id = engine.get_structure(root_sym).unwrap();
        let foo = structures_common::symbol::intern("foo");
        let bar = structures_common::symbol::intern("bar");
        assert_eq!(engine.exported_ref(root_id, foo), Ok(Value::Int(1)));
        assert!(engine.exported_ref(root_id, bar).is_err());
    }

    #[test]
    fn missing_file_surfaces_as_load_failure() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with_root(dir.path());
        let missing = structures_common::symbol::intern("does-not-exist");
        assert!(engine.require(missing).is_err());
    }

    #[test]
    fn gc_collect_does_not_disturb_a_freshly_loaded_tree() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("root.rep"), "(define x 1)").unwrap();
        let mut engine = engine_with_root(dir.path());
        engine.require(structures_common::symbol::intern("root")).unwrap();
        let mut collector = NullCollector;
        engine.collect(&mut collector);
        let x = structures_common::symbol::intern("x");
        assert_eq!(engine.reference_in(engine.current(), x), Ok(Value::Int(1)));
    }
}
