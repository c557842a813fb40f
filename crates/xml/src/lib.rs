//! A small mutable DOM for XML documents, backed by an arena of nodes.
//!
//! Parsing and serialization are built on `quick-xml`. The arena hands out
//! plain `NodeId` indices; `NodeRef` bundles an id with its document for
//! navigation. Mutation happens through `&mut Document` only, so a document
//! that is being read (e.g. by an XPath evaluation) is immutable by
//! construction.

pub mod document;
pub mod error;
pub mod parser;
pub mod serializer;

pub use document::{
    Attribute, Document, ElementData, NodeId, NodeKind, NodeRef, XML_NS, XSLT_NS,
};
pub use error::XmlError;
pub use parser::parse;
pub use serializer::{serialize, serialize_with_options, SerializeOptions};
