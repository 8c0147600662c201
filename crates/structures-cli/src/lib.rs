//! Library half of `structurectl`: the toy s-expression reader and the
//! `FilesystemLoader` it feeds. Split out from `src/bin/structurectl.rs`
//! so both the binary and its integration tests can use them directly.

pub mod loader;
pub mod sexpr;

pub use loader::FilesystemLoader;
pub use sexpr::{ReadError, SExpr};
