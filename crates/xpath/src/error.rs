use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum XPathError {
    #[error("cannot parse '{expr}': {message}")]
    Parse { expr: String, message: String },

    #[error("function {name}(): {message}")]
    Function { name: String, message: String },

    #[error("type error: {0}")]
    Type(String),
}

impl XPathError {
    pub fn function(name: &str, message: impl Into<String>) -> Self {
        XPathError::Function {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
