//! XPath Splice: byte-faithful XML editing addressed by XPath
//!
//! Rewrites attribute values and inserts raw fragments into an XML document
//! without ever re-serializing it. Every byte outside an edit is copied
//! through unchanged and in order.
//!
//! # Architecture
//!
//! - [`xml::Document`] indexes the source bytes into tokens (element names,
//!   attribute names and values, comment bodies, PI targets, text).
//! - [`xpath::XPathResolver`] selects nodes and yields their token
//!   [`Position`]s in document order.
//! - [`anchor::AnchorKind`] turns a match into a [`anchor::Cut`]: the exact
//!   byte offset or range an edit applies to.
//! - [`edit::EditSet`] accumulates replacements and insertions against the
//!   original offsets.
//! - [`output::serialize`] replays them in one pass, and
//!   [`output::write_output`] writes the result atomically (tempfile + fsync
//!   + rename).
//!
//! # Example
//!
//! ```
//! use xpath_splice::{apply_to_bytes, AttributeEditDirective, EditPlan, InsertDirective};
//!
//! let input = br#"<Server><Connector port="8080"/></Server>"#;
//!
//! let mut plan = EditPlan::new();
//! plan.attribute_edits
//!     .push(AttributeEditDirective::parse("//Connector@port=80").unwrap());
//! plan.after_head
//!     .push(InsertDirective::parse("/Server:<Listener/>", ":").unwrap());
//!
//! let outcome = apply_to_bytes(&plan, input).unwrap();
//! assert_eq!(
//!     outcome.output,
//!     br#"<Server><Listener/><Connector port="80"/></Server>"#
//! );
//! ```

pub mod anchor;
pub mod config;
pub mod directive;
pub mod edit;
pub mod output;
pub mod xml;
pub mod xpath;

// Re-exports
pub use anchor::{after_location_correction, AnchorKind, Cut};
pub use config::{
    apply_plan, apply_to_bytes, load_from_path, load_from_str, Applied, ApplicationError,
    ConfigError, DirectiveReport, EditPlan, EditScript, MatchScope, Outcome,
};
pub use directive::{AttributeEditDirective, DirectiveError, InsertDirective, NamespaceDirective};
pub use edit::{EditError, EditOperation, EditSet};
pub use output::{serialize, write_output};
pub use xml::{Document, ParseError, Position, TokenKind};
pub use xpath::{Matches, NamespaceBindings, XPathError, XPathResolver};
