//! The tagged runtime value type bindings hold.
//!
//! A sum type over primitive values, callables, and the sentinels every
//! binding lookup can return. This is deliberately small: the reader, the
//! evaluator, and the closure representation are external collaborators
//! (see `collab`), so `Value` only needs enough shape to exercise the
//! structure engine itself.

use crate::engine::Engine;
use crate::gc::StructureId;
use std::fmt;
use std::rc::Rc;
use structures_common::EngineError;
use structures_common::Symbol;

/// A zero-argument callable: a thunk, a closure, or a native function.
///
/// Mirrors the reference implementation's `rep_FUNARG`/`rep_subr`
/// distinction collapsed into one trait object. `home_structure` is the
/// mutable field the module builder (C6) overwrites when arming a thunk.
pub trait Callable {
    /// Invokes this callable with zero arguments, in its home structure.
    fn call0(&self, engine: &mut Engine) -> Result<Value, EngineError>;

    /// The structure this callable resolves free variables against.
    fn home_structure(&self) -> Option<StructureId>;

    /// Rebinds the structure this callable resolves free variables
    /// against. The module builder calls this when arming header/body
    /// thunks; implementers that want to forbid it (a "frozen" closure)
    /// should make this a no-op and document it.
    fn set_home_structure(&self, home: StructureId);

    /// A short label for diagnostics (`#<closure foo>`-style); purely
    /// cosmetic.
    fn name(&self) -> Option<&str> {
        None
    }
}

/// The per-structure bytecode apply-hook (`apply_bytecode`). Polymorphic
/// over whatever VM family the host embeds; the engine only ever stores
/// and hands this back out, never calls it directly except through
/// `structure-install-vm`.
pub trait ApplyHook {
    fn apply(&self, engine: &mut Engine, callee: Value, args: &[Value]) -> Result<Value, EngineError>;
}

/// The tagged runtime value.
#[derive(Clone)]
pub enum Value {
    /// Distinguished value meaning "no binding" even when a record exists.
    Void,
    /// Distinguished value for a symbol that has never been declared at all.
    Unbound,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Symbol(Symbol),
    /// A homogeneous list, used for the `features` binding and for
    /// interfaces passed across the API.
    List(Rc<Vec<Value>>),
    Structure(StructureId),
    Callable(Rc<dyn Callable>),
}

impl Value {
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Self::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_structure(&self) -> Option<StructureId> {
        match self {
            Self::Structure(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Builds a `Value::List` from interned symbols, as used for `features`
    /// and for interface lists passed across the API.
    #[must_use]
    pub fn symbol_list(symbols: &[Symbol]) -> Self {
        Self::List(Rc::new(symbols.iter().copied().map(Self::Symbol).collect()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "#<void>"),
            Self::Unbound => write!(f, "#<unbound>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Symbol(s) => write!(f, "{s}"),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Structure(id) => write!(f, "#<structure {id:?}>"),
            Self::Callable(c) => write!(f, "#<callable {}>", c.name().unwrap_or("anonymous")),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) | (Self::Unbound, Self::Unbound) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Structure(a), Self::Structure(b)) => a == b,
            (Self::Callable(a), Self::Callable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use structures_common::symbol::intern;

    #[test]
    fn void_is_not_equal_to_unbound() {
        assert_ne!(Value::Void, Value::Unbound);
    }

    #[test]
    fn symbol_list_round_trips() {
        let syms = [intern("a"), intern("b")];
        let list = Value::symbol_list(&syms);
        let back: Vec<Symbol> = list.as_list().unwrap().iter().map(|v| v.as_symbol().unwrap()).collect();
        assert_eq!(back, syms);
    }
}
