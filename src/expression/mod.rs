//! Ad hoc filter expressions
//!
//! Text is parsed into an [`Expr`] tree, its free identifiers are collected
//! for column resolution, and the tree is then bound to resolved columns to
//! produce dialect SQL.

pub mod ast;
pub mod binder;
pub mod errors;
pub mod methods;
pub mod parser;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use binder::{bind, BindContext};
pub use errors::{BindError, ParseError, ParseErrors};
pub use parser::parse_expression;
