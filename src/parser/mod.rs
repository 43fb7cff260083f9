// Field formula parser module

pub mod ast;
pub mod formula;
pub mod lexer;
pub mod ordinal;

// Public API re-exports
pub use ast::{BinaryOp, Expr};
pub use formula::parse_formula;
pub use ordinal::substitute_ordinals;
