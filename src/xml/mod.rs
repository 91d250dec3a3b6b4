//! Token-indexed, read-only view of an XML document.
//!
//! [`Document::parse`] indexes every structurally significant byte range
//! (element names, attribute names and values, comment bodies, PI targets,
//! text runs) so later stages can compute splice offsets without ever
//! re-serializing the tree.

pub(crate) mod builder;
pub mod document;
pub mod errors;
pub mod token;

pub use document::{Document, ElementSpan, NodeId, NodeKind};
pub use errors::ParseError;
pub use token::{Position, Token, TokenKind};
