use std::fmt;
use std::ops::Range;

/// Classification of an indexed token.
///
/// Spans follow the navigator convention: delimiters are never part of a
/// token. A start tag token covers only the qualified name after `<`, an
/// attribute value covers the text between its quotes, a comment covers the
/// text between `<!--` and `-->`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    ElementStart,
    ElementEnd,
    AttributeName,
    AttributeValue,
    Comment,
    ProcessingInstructionName,
    Text,
    Other,
}

impl TokenKind {
    pub fn is_attribute(self) -> bool {
        matches!(self, TokenKind::AttributeName | TokenKind::AttributeValue)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::ElementStart => "element-start",
            TokenKind::ElementEnd => "element-end",
            TokenKind::AttributeName => "attribute-name",
            TokenKind::AttributeValue => "attribute-value",
            TokenKind::Comment => "comment",
            TokenKind::ProcessingInstructionName => "pi-name",
            TokenKind::Text => "text",
            TokenKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Handle to a token in a [`Document`](super::Document)'s index.
///
/// Positions are only meaningful for the document that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(pub(crate) usize);

impl Position {
    /// Index of this token in the token table.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One entry of the token table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Byte offset of the first byte of the token
    pub offset: usize,
    /// Length in bytes
    pub len: usize,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(offset: usize, len: usize, kind: TokenKind) -> Self {
        Self { offset, len, kind }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}
