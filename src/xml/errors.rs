use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("malformed tag at byte {position}")]
    MalformedTag { position: usize },

    #[error("duplicate attribute '{name}' at byte {position}")]
    DuplicateAttribute { name: String, position: usize },

    #[error("namespace prefix '{prefix}' is not declared (byte {position})")]
    UnboundPrefix { prefix: String, position: usize },

    #[error("element <{name}> is never closed")]
    UnclosedElement { name: String },

    #[error("second root element at byte {position}")]
    MultipleRoots { position: usize },

    #[error("character data outside the root element at byte {position}")]
    TextOutsideRoot { position: usize },

    #[error("document has no root element")]
    EmptyDocument,

    #[error("document is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}
