use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("invalid XPath '{expr}': {message}")]
    Syntax { expr: String, message: String },

    #[error("XPath prefix '{prefix}' has no namespace binding")]
    UnboundPrefix { prefix: String },

    #[error("unknown XPath function '{name}()'")]
    UnknownFunction { name: String },

    #[error("XPath function '{name}()' does not take {given} argument(s)")]
    Arity { name: String, given: usize },

    #[error("XPath expression does not select nodes (got {found})")]
    NotNodeSet { found: &'static str },
}
