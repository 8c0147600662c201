//! Interned identifiers.
//!
//! `Symbol` is compared and hashed by identity, never by string content —
//! that's what makes `Symbol: Copy` a cheap key for binding tables, import
//! lists, and the lookup cache. Interning itself is an external collaborator
//! of the engine (the real reader owns the canonical symbol table); the
//! `Interner` here is a reference implementation good enough to run the
//! engine and its tests standalone.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// An interned identifier. Equality and hashing use the numeric id only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub u32);

impl Symbol {
    /// Returns the canonical text this symbol was interned from.
    ///
    /// # Panics
    ///
    /// Panics if `self` was not produced by [`Interner::intern`] (or
    /// [`intern`]) of the currently-installed global interner.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        INTERNER.resolve(self)
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serializes as the symbol's canonical text rather than its numeric id,
/// which is only stable within one process run.
impl serde::Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Reference symbol interner: a concurrent string -> id table plus a
/// reverse id -> string vector. Strings are leaked to `'static` once, which
/// is the standard trick for interners whose symbols outlive the process's
/// interesting work (the real reader's interner would do the same).
pub struct Interner {
    forward: DashMap<&'static str, Symbol>,
    backward: RwLock<Vec<&'static str>>,
}

impl Interner {
    fn new() -> Self {
        Self {
            forward: DashMap::new(),
            backward: RwLock::new(Vec::new()),
        }
    }

    /// Returns the canonical `Symbol` for `text`, interning it if this is
    /// the first time it has been seen.
    pub fn intern(&self, text: &str) -> Symbol {
        if let Some(sym) = self.forward.get(text) {
            return *sym;
        }
        // Racing writers may both get here; `backward` is the arbiter of
        // the final id via its write lock below, so duplicate leaks are a
        // (rare, harmless) wasted allocation rather than a correctness bug.
        let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
        let mut backward = self.backward.write().unwrap();
        if let Some(sym) = self.forward.get(leaked) {
            return *sym;
        }
        let id = u32::try_from(backward.len()).expect("symbol table overflow");
        backward.push(leaked);
        let sym = Symbol(id);
        self.forward.insert(leaked, sym);
        sym
    }

    fn resolve(&self, sym: Symbol) -> &'static str {
        self.backward
            .read()
            .unwrap()
            .get(sym.0 as usize)
            .copied()
            .expect("symbol not produced by this interner")
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

static INTERNER: Lazy<Interner> = Lazy::new(Interner::new);

/// Interns `text` against the process-wide reference interner.
pub fn intern(text: &str) -> Symbol {
    INTERNER.intern(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_interns_to_same_symbol() {
        let a = intern("foo-test-symbol");
        let b = intern("foo-test-symbol");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_text_interns_to_distinct_symbols() {
        let a = intern("bar-test-symbol");
        let b = intern("baz-test-symbol");
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_as_str() {
        let sym = intern("round-trip-test-symbol");
        assert_eq!(sym.as_str(), "round-trip-test-symbol");
    }
}
