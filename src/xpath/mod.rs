//! XPath 1.0 location-path evaluation over a [`crate::xml::Document`].
//!
//! Supports the full axis set except `namespace::`, name/wildcard/node-type
//! tests, predicates, unions, boolean and arithmetic operators and the core
//! node-set, string, boolean and number functions. Variables are not
//! supported.

pub mod cache;
pub mod errors;
pub mod eval;
pub mod lexer;
pub mod namespaces;
pub mod parser;
pub mod resolver;

pub use errors::XPathError;
pub use namespaces::NamespaceBindings;
pub use resolver::{Matches, XPathResolver};
