//! An XSLT 1.0 processor (with a handful of 2.0 conveniences) over the
//! `larch-xml` DOM and the `larch-xpath` expression engine.
//!
//! A transform runs in two stages. [`compiler::compile`] resolves
//! `xsl:include`/`xsl:import`, then turns the transform DOM into a
//! [`ast::CompiledStylesheet`]: template rules grouped by mode, named
//! templates, keys, stylesheet functions, whitespace lists, decimal formats
//! and the output contract. [`executor::TemplateExecutor`] then walks the
//! compiled instruction tree against the input document, growing a result
//! DOM through [`output::XmlOutputBuilder`], which is finally serialized and
//! post-processed per `xsl:output`.

pub mod ast;
pub mod compiler;
pub mod datasource;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod format;
pub mod functions;
pub mod includes;
pub mod output;
pub mod pattern;
pub mod processor;
pub mod whitespace;

mod executor_handlers;

pub use datasource::DomNode;
pub use error::TransformError;
pub use fetch::{DocumentFetcher, FetchError, FileFetcher};
pub use processor::{process, transform, ParamValue, Params, TransformOptions, TransformSpec};
