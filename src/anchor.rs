//! Maps an XPath match onto the byte offset where an edit cuts into the
//! original document.
//!
//! Every edit category has a fixed rule. The rules only read token spans and
//! element extents from the [`Document`]; they never look at output produced
//! by earlier edits, so offsets stay valid against the original bytes.

use crate::xml::{Document, NodeId, NodeKind, Position, TokenKind};
use std::fmt;
use std::ops::Range;

/// Where an edit lands relative to its matched node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorKind {
    /// Replace the value of `attribute` on the matched element
    AttributeEdit { attribute: String },
    /// First child of the matched element
    AfterHead,
    /// Right after the matched element's end tag
    AfterElement,
    /// Right before the matched element's `<`
    BeforeElement,
    /// After the matched token, skipping its trailing delimiter
    AfterLocation,
    /// After the last attribute of the matched start tag
    AppendAttribute,
}

/// A resolved edit location in the original document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cut {
    Insert { offset: usize },
    Replace { range: Range<usize> },
    /// The `/>` of a self-closing element that has to be opened up so a
    /// fragment can become its first child.
    OpenEmpty { range: Range<usize>, name: String },
}

impl Cut {
    pub fn offset(&self) -> usize {
        match self {
            Cut::Insert { offset } => *offset,
            Cut::Replace { range } | Cut::OpenEmpty { range, .. } => range.start,
        }
    }
}

impl AnchorKind {
    /// Compute the cut for a match at `pos`, or `None` when the match gives
    /// this kind nothing to act on (missing attribute, no attributes to
    /// append after, non-element match).
    pub fn locate(&self, doc: &Document, pos: Position) -> Option<Cut> {
        match self {
            AnchorKind::AttributeEdit { attribute } => {
                let element = element_of(doc, pos)?;
                let value = doc.attribute_value_token(element, attribute)?;
                Some(Cut::Replace {
                    range: doc.token(value).range(),
                })
            }
            AnchorKind::AfterHead => {
                let element = element_of(doc, pos)?;
                let span = doc.element_span(element)?;
                match span.empty_close {
                    Some(slash) => Some(Cut::OpenEmpty {
                        range: slash..slash + 2,
                        name: doc.qualified_name(element).to_string(),
                    }),
                    None => Some(Cut::Insert {
                        offset: span.head_end,
                    }),
                }
            }
            AnchorKind::AfterElement => {
                let span = doc.element_span(element_of(doc, pos)?)?;
                Some(Cut::Insert { offset: span.end })
            }
            AnchorKind::BeforeElement => {
                let span = doc.element_span(element_of(doc, pos)?)?;
                Some(Cut::Insert {
                    offset: span.tag_start,
                })
            }
            AnchorKind::AfterLocation => {
                let token = doc.token(pos);
                Some(Cut::Insert {
                    offset: token.end() + after_location_correction(token.kind),
                })
            }
            AnchorKind::AppendAttribute => {
                if doc.token_type(pos) != TokenKind::ElementStart {
                    return None;
                }
                last_attribute_end(doc, pos).map(|end| Cut::Insert { offset: end + 1 })
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnchorKind::AttributeEdit { .. } => "edit-attribute",
            AnchorKind::AfterHead => "insert-after-head",
            AnchorKind::AfterElement => "insert-after-element",
            AnchorKind::BeforeElement => "insert-before-element",
            AnchorKind::AfterLocation => "insert-after-location",
            AnchorKind::AppendAttribute => "add-attribute",
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bytes between the end of a matched token and the end of its markup.
///
/// `-->` after a comment body, `?>` after a PI target, `>` after an element
/// name, one byte for anything else.
pub fn after_location_correction(kind: TokenKind) -> usize {
    match kind {
        TokenKind::Comment => 3,
        TokenKind::ElementStart => 1,
        TokenKind::ProcessingInstructionName => 2,
        _ => 1,
    }
}

/// End offset of the last attribute token directly following the start tag
/// name at `pos`.
fn last_attribute_end(doc: &Document, pos: Position) -> Option<usize> {
    let mut last_end = None;
    for index in pos.index() + 1..doc.token_count() {
        let next = doc.position_at(index)?;
        let token = doc.token(next);
        if !token.kind.is_attribute() {
            break;
        }
        last_end = Some(token.end());
    }
    last_end
}

fn element_of(doc: &Document, pos: Position) -> Option<NodeId> {
    let node = doc.node_at(pos)?;
    let element = doc.owning_element(node)?;
    (doc.kind(element) == NodeKind::Element).then_some(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::XPathResolver;

    fn first_match(doc: &Document, xpath: &str) -> Position {
        XPathResolver::default()
            .resolve(xpath, doc)
            .unwrap()
            .next()
            .unwrap_or_else(|| panic!("no match for {xpath}"))
    }

    fn locate(xml: &str, xpath: &str, kind: AnchorKind) -> Option<Cut> {
        let doc = Document::parse(xml, false).unwrap();
        let pos = first_match(&doc, xpath);
        kind.locate(&doc, pos)
    }

    fn insert_offset(xml: &str, xpath: &str, kind: AnchorKind) -> usize {
        match locate(xml, xpath, kind) {
            Some(Cut::Insert { offset }) => offset,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn test_correction_table() {
        assert_eq!(after_location_correction(TokenKind::Comment), 3);
        assert_eq!(after_location_correction(TokenKind::ElementStart), 1);
        assert_eq!(after_location_correction(TokenKind::ProcessingInstructionName), 2);
        assert_eq!(after_location_correction(TokenKind::Text), 1);
        assert_eq!(after_location_correction(TokenKind::AttributeValue), 1);
        assert_eq!(after_location_correction(TokenKind::Other), 1);
    }

    #[test]
    fn test_after_location_on_comment() {
        let xml = "<r><!-- c --><a/></r>";
        let offset = insert_offset(xml, "/r/comment()", AnchorKind::AfterLocation);
        assert_eq!(&xml[..offset], "<r><!-- c -->");
    }

    #[test]
    fn test_after_location_on_start_tag() {
        let xml = "<r><e>x</e></r>";
        let offset = insert_offset(xml, "/r/e", AnchorKind::AfterLocation);
        assert_eq!(&xml[..offset], "<r><e>");
    }

    #[test]
    fn test_after_location_on_pi() {
        let xml = "<r><?pi?><a/></r>";
        let offset = insert_offset(xml, "/r/processing-instruction()", AnchorKind::AfterLocation);
        assert_eq!(&xml[..offset], "<r><?pi?>");
    }

    #[test]
    fn test_attribute_edit_replaces_value_without_quotes() {
        let xml = r#"<r><c port="8080" host='h'/></r>"#;
        let Some(Cut::Replace { range }) = locate(
            xml,
            "/r/c",
            AnchorKind::AttributeEdit {
                attribute: "host".to_string(),
            },
        ) else {
            panic!("expected replace");
        };
        assert_eq!(&xml[range], "h");
    }

    #[test]
    fn test_attribute_edit_missing_attribute() {
        let xml = r#"<r><c port="8080"/></r>"#;
        let cut = locate(
            xml,
            "/r/c",
            AnchorKind::AttributeEdit {
                attribute: "missing".to_string(),
            },
        );
        assert_eq!(cut, None);
    }

    #[test]
    fn test_attribute_edit_on_attribute_match_uses_owner() {
        let xml = r#"<r><c port="8080"/></r>"#;
        let Some(Cut::Replace { range }) = locate(
            xml,
            "/r/c/@port",
            AnchorKind::AttributeEdit {
                attribute: "port".to_string(),
            },
        ) else {
            panic!("expected replace");
        };
        assert_eq!(&xml[range], "8080");
    }

    #[test]
    fn test_after_head() {
        let xml = r#"<r><s name="a"><x/></s></r>"#;
        let offset = insert_offset(xml, "/r/s", AnchorKind::AfterHead);
        assert_eq!(&xml[..offset], r#"<r><s name="a">"#);
    }

    #[test]
    fn test_after_head_on_self_closing_opens_element() {
        let xml = r#"<r><s name="a" /></r>"#;
        let cut = locate(xml, "/r/s", AnchorKind::AfterHead).unwrap();
        let Cut::OpenEmpty { range, name } = cut else {
            panic!("expected open-empty");
        };
        assert_eq!(&xml[range], "/>");
        assert_eq!(name, "s");
    }

    #[test]
    fn test_after_and_before_element() {
        let xml = "<r><a>1</a><b/></r>";
        let after = insert_offset(xml, "/r/a", AnchorKind::AfterElement);
        assert_eq!(&xml[..after], "<r><a>1</a>");
        let before = insert_offset(xml, "/r/b", AnchorKind::BeforeElement);
        assert_eq!(&xml[..before], "<r><a>1</a>");
        let after_empty = insert_offset(xml, "/r/b", AnchorKind::AfterElement);
        assert_eq!(&xml[after_empty..], "</r>");
    }

    #[test]
    fn test_element_anchor_on_text_uses_parent() {
        let xml = "<r><a>1</a></r>";
        let offset = insert_offset(xml, "/r/a/text()", AnchorKind::AfterElement);
        assert_eq!(&xml[offset..], "</r>");
    }

    #[test]
    fn test_append_attribute_scan() {
        let xml = r#"<r><e a="1" b="2">x</e></r>"#;
        let offset = insert_offset(xml, "/r/e", AnchorKind::AppendAttribute);
        assert_eq!(&xml[..offset], r#"<r><e a="1" b="2""#);
        assert_eq!(&xml[offset..offset + 1], ">");
    }

    #[test]
    fn test_append_attribute_without_attributes() {
        let xml = "<r><e>x</e></r>";
        assert_eq!(locate(xml, "/r/e", AnchorKind::AppendAttribute), None);
    }

    #[test]
    fn test_append_attribute_needs_element_match() {
        let xml = r#"<r><e a="1"/></r>"#;
        assert_eq!(locate(xml, "/r/e/@a", AnchorKind::AppendAttribute), None);
    }

    #[test]
    fn test_anchor_names() {
        assert_eq!(AnchorKind::AfterHead.to_string(), "insert-after-head");
        assert_eq!(
            AnchorKind::AttributeEdit {
                attribute: "a".into()
            }
            .name(),
            "edit-attribute"
        );
    }
}
