use crate::fetch::FetchError;
use larch_xml::XmlError;
use larch_xpath::XPathError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    #[error("XPath error: {0}")]
    XPath(#[from] XPathError),

    #[error("unsupported XSLT element <xsl:{0}>")]
    NotImplemented(String),

    #[error("stylesheet structure error: {0}")]
    Structure(String),

    #[error("stylesheet compilation error: {0}")]
    Compile(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("no template named '{0}'")]
    UnknownTemplate(String),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}
