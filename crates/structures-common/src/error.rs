//! The engine's typed error set.
//!
//! No `thiserror` here — matching the teacher's own diagnostic types, this
//! is a plain enum with a hand-rolled `Display`/`Error` impl.

use crate::symbol::Symbol;
use std::fmt;

/// Every fallible operation the engine exposes returns this instead of
/// panicking on user-reachable paths. `Serialize` lets a driver report
/// failures as structured JSON instead of only `Display` text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind")]
pub enum EngineError {
    /// Attempted to `structure-set` a binding previously flagged constant
    /// via `make-binding-immutable`.
    SettingConstant { symbol: Symbol },
    /// Referenced a symbol with no binding, or whose binding holds the
    /// void sentinel.
    VoidValue { symbol: Symbol },
    /// An argument failed a declared predicate (structure expected, symbol
    /// expected, interface-list expected, ...).
    TypeMismatch {
        expected: &'static str,
        context: &'static str,
    },
    /// The loader failed while servicing `require`/`intern-structure`.
    LoadFailure { feature: Symbol, message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettingConstant { symbol } => {
                write!(f, "attempt to set constant binding: {symbol}")
            }
            Self::VoidValue { symbol } => write!(f, "void value: {symbol}"),
            Self::TypeMismatch { expected, context } => {
                write!(f, "type mismatch in {context}: expected {expected}")
            }
            Self::LoadFailure { feature, message } => {
                write!(f, "failed to load feature {feature}: {message}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::intern;

    #[test]
    fn displays_setting_constant() {
        let err = EngineError::SettingConstant {
            symbol: intern("frozen"),
        };
        assert_eq!(err.to_string(), "attempt to set constant binding: frozen");
    }

    #[test]
    fn displays_void_value() {
        let err = EngineError::VoidValue {
            symbol: intern("missing"),
        };
        assert_eq!(err.to_string(), "void value: missing");
    }

    #[test]
    fn serializes_the_symbol_by_its_text_not_its_numeric_id() {
        let err = EngineError::LoadFailure {
            feature: intern("serialize-test-feature"),
            message: "disk on fire".to_owned(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"feature\":\"serialize-test-feature\""));
        assert!(json.contains("\"message\":\"disk on fire\""));
        assert!(json.contains("\"kind\":\"LoadFailure\""));
    }
}
