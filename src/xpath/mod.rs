//! XPath 1.0 subsystem with YANG 1.1 extensions.
//!
//! Two sub-components: a parser producing an AST (with the schema context
//! captured at parse time) and a tree-walking evaluator over instance
//! foci. Used for `when`/`must` conditions and leafref paths.

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{
    ArithOp, Axis, CompareOp, CompiledExpr, Expr, Function, NodeTest, PathExpr, SchemaContext,
    Step,
};
pub use error::XPathError;
pub use eval::{evaluate, XPathValue};
pub use parser::{parse_xpath, parse_xpath_shared};
