//! XPath 1.0 over any tree that implements [`DataSourceNode`].
//!
//! Expressions are parsed once into an AST and evaluated against an
//! [`engine::Context`]. Hosts can hook additional functions into evaluation
//! through the [`functions::FunctionResolver`] chain; unresolved names fall
//! back to the built-in XPath core library.

pub mod ast;
pub mod axes;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parser;
pub mod value;

pub use ast::{Axis, BinaryOp, Expression, NodeTest, Path, Step};
pub use datasource::{DataSourceNode, NodeType, QName};
pub use engine::{evaluate, Context};
pub use error::XPathError;
pub use functions::FunctionResolver;
pub use parser::parse_expression;
pub use value::XPathValue;
