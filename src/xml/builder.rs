//! Token and node index construction.
//!
//! quick-xml frames the input into events and reports where each one starts
//! and ends; the builder derives the finer token spans (names, attribute
//! values, comment bodies) from the raw bytes inside each event.

use crate::xml::document::{ElementSpan, Node, NodeId, NodeKind};
use crate::xml::errors::ParseError;
use crate::xml::token::{Position, Token, TokenKind};
use memchr::memchr;
use quick_xml::events::Event;
use quick_xml::Reader;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

pub(crate) struct Index {
    pub tokens: Vec<Token>,
    pub token_nodes: Vec<Option<NodeId>>,
    pub nodes: Vec<Node>,
}

struct RawAttribute {
    name: Position,
    value: Position,
}

pub(crate) struct IndexBuilder<'a> {
    source: &'a str,
    bytes: &'a [u8],
    namespace_aware: bool,
    tokens: Vec<Token>,
    token_nodes: Vec<Option<NodeId>>,
    nodes: Vec<Node>,
    stack: Vec<NodeId>,
    /// In-scope namespace declarations, innermost last. An empty prefix is
    /// the default namespace; `None` undeclares it.
    scopes: Vec<(String, Option<Box<str>>)>,
    scope_marks: Vec<usize>,
    seen_root: bool,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(source: &'a str, namespace_aware: bool) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            namespace_aware,
            tokens: Vec::new(),
            token_nodes: Vec::new(),
            nodes: vec![Node::new(NodeKind::Root, None, None)],
            stack: Vec::new(),
            scopes: Vec::new(),
            scope_marks: Vec::new(),
            seen_root: false,
        }
    }

    pub fn build(mut self) -> Result<Index, ParseError> {
        let mut reader = Reader::from_str(self.source);
        let config = reader.config_mut();
        config.trim_text_start = false;
        config.trim_text_end = false;
        config.check_end_names = true;
        config.expand_empty_elements = false;

        loop {
            let event_start = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|err| ParseError::Syntax {
                message: err.to_string(),
                position: reader.error_position() as usize,
            })?;
            let event_end = reader.buffer_position() as usize;

            match event {
                Event::Start(_) => self.start_tag(event_start, event_end, false)?,
                Event::Empty(_) => self.start_tag(event_start, event_end, true)?,
                Event::End(_) => self.end_tag(event_start, event_end)?,
                Event::Text(_) => self.text(event_start, event_end)?,
                Event::CData(_) => self.cdata(event_start, event_end)?,
                Event::Comment(_) => self.comment(event_start, event_end),
                Event::PI(_) => self.processing_instruction(event_start, event_end),
                Event::Eof => break,
                // XML declaration, DOCTYPE
                _ => self.other(event_start, event_end),
            }
        }

        if let Some(&open) = self.stack.last() {
            return Err(ParseError::UnclosedElement {
                name: self.qname(open).to_string(),
            });
        }
        if !self.seen_root {
            return Err(ParseError::EmptyDocument);
        }

        Ok(Index {
            tokens: self.tokens,
            token_nodes: self.token_nodes,
            nodes: self.nodes,
        })
    }

    fn start_tag(&mut self, start: usize, end: usize, empty: bool) -> Result<(), ParseError> {
        let lt = self.markup_start(start, end);
        let malformed = ParseError::MalformedTag { position: lt };
        if end < lt + 2 || self.bytes[end - 1] != b'>' {
            return Err(malformed);
        }
        let gt = end - 1;
        let empty_close = if empty {
            if self.bytes[gt - 1] != b'/' {
                return Err(malformed);
            }
            Some(gt - 1)
        } else {
            None
        };
        let limit = empty_close.unwrap_or(gt);

        let name_start = lt + 1;
        let name_end = self.scan_name(name_start, limit, b"");
        if name_end == name_start {
            return Err(malformed);
        }

        if self.stack.is_empty() {
            if self.seen_root {
                return Err(ParseError::MultipleRoots { position: lt });
            }
            self.seen_root = true;
        }

        let parent = self.current_parent();
        let name_pos = self.push_token(name_start, name_end - name_start, TokenKind::ElementStart);
        let mut element = Node::new(NodeKind::Element, Some(parent), Some(name_pos));
        element.span = Some(ElementSpan {
            tag_start: lt,
            head_end: end,
            end: if empty { end } else { 0 },
            empty_close,
        });
        let id = self.push_node(element);
        self.nodes[parent.0].children.push(id);

        let raw_attributes = self.scan_attributes(name_end, limit, lt)?;
        for raw in raw_attributes {
            let mut attribute = Node::new(NodeKind::Attribute, Some(id), Some(raw.name));
            attribute.value = Some(raw.value);
            let qname = self.token_text(raw.name);
            attribute.namespace_decl = qname == "xmlns" || qname.starts_with("xmlns:");
            let attr_id = self.push_node(attribute);
            self.nodes[id.0].attributes.push(attr_id);
        }

        if self.namespace_aware {
            self.enter_scope(id, lt)?;
        }

        if empty {
            if self.namespace_aware {
                self.leave_scope();
            }
        } else {
            self.stack.push(id);
        }
        Ok(())
    }

    fn scan_attributes(
        &mut self,
        mut i: usize,
        limit: usize,
        lt: usize,
    ) -> Result<Vec<RawAttribute>, ParseError> {
        let malformed = || ParseError::MalformedTag { position: lt };
        let mut attributes: Vec<RawAttribute> = Vec::new();

        loop {
            let gap_start = i;
            i = self.skip_whitespace(i, limit);
            if i >= limit {
                break;
            }
            if i == gap_start {
                return Err(malformed());
            }

            let name_start = i;
            i = self.scan_name(i, limit, b"=");
            if i == name_start {
                return Err(malformed());
            }
            let name_end = i;

            i = self.skip_whitespace(i, limit);
            if self.bytes.get(i) != Some(&b'=') || i >= limit {
                return Err(malformed());
            }
            i = self.skip_whitespace(i + 1, limit);
            let quote = match self.bytes.get(i) {
                Some(&q @ (b'"' | b'\'')) if i < limit => q,
                _ => return Err(malformed()),
            };
            let value_start = i + 1;
            let close = memchr(quote, &self.bytes[value_start..limit]).ok_or_else(malformed)?;
            let value_end = value_start + close;
            i = value_end + 1;

            let source: &'a str = self.source;
            let qname = &source[name_start..name_end];
            if attributes
                .iter()
                .any(|attr| self.token_text(attr.name) == qname)
            {
                return Err(ParseError::DuplicateAttribute {
                    name: qname.to_string(),
                    position: name_start,
                });
            }

            let name = self.push_token(name_start, name_end - name_start, TokenKind::AttributeName);
            let value = self.push_token(value_start, value_end - value_start, TokenKind::AttributeValue);
            attributes.push(RawAttribute { name, value });
        }

        Ok(attributes)
    }

    fn end_tag(&mut self, start: usize, end: usize) -> Result<(), ParseError> {
        let lt = self.markup_start(start, end);
        let name_start = lt + 2;
        let name_end = self.scan_name(name_start, end.saturating_sub(1), b"");
        self.push_token(name_start, name_end - name_start, TokenKind::ElementEnd);

        let id = self.stack.pop().ok_or_else(|| ParseError::Syntax {
            message: "end tag without a matching start tag".to_string(),
            position: lt,
        })?;
        if let Some(span) = self.nodes[id.0].span.as_mut() {
            span.end = end;
        }
        if self.namespace_aware {
            self.leave_scope();
        }
        Ok(())
    }

    fn text(&mut self, start: usize, mut end: usize) -> Result<(), ParseError> {
        if end > start && self.bytes[end - 1] == b'<' {
            end -= 1;
        }
        if end <= start {
            return Ok(());
        }

        if self.stack.is_empty() {
            let content = self.source[start..end].trim_start_matches('\u{feff}');
            if !content.trim().is_empty() {
                return Err(ParseError::TextOutsideRoot { position: start });
            }
            self.push_token(start, end - start, TokenKind::Other);
            return Ok(());
        }

        let pos = self.push_token(start, end - start, TokenKind::Text);
        self.push_child(NodeKind::Text, pos);
        Ok(())
    }

    fn cdata(&mut self, start: usize, end: usize) -> Result<(), ParseError> {
        let lt = self.markup_start(start, end);
        if self.stack.is_empty() {
            return Err(ParseError::TextOutsideRoot { position: lt });
        }
        let content_start = lt + "<![CDATA[".len();
        let content_end = end.saturating_sub("]]>".len()).max(content_start);
        let pos = self.push_token(content_start, content_end - content_start, TokenKind::Text);
        self.push_child(NodeKind::Text, pos);
        Ok(())
    }

    fn comment(&mut self, start: usize, end: usize) {
        let lt = self.markup_start(start, end);
        let content_start = lt + "<!--".len();
        let content_end = end.saturating_sub("-->".len()).max(content_start);
        let pos = self.push_token(content_start, content_end - content_start, TokenKind::Comment);
        self.push_child(NodeKind::Comment, pos);
    }

    fn processing_instruction(&mut self, start: usize, end: usize) {
        let lt = self.markup_start(start, end);
        let limit = end.saturating_sub("?>".len());
        let target_start = lt + "<?".len();
        let target_end = self.scan_name(target_start, limit, b"?");
        let pos = self.push_token(
            target_start,
            target_end - target_start,
            TokenKind::ProcessingInstructionName,
        );
        let id = self.push_child(NodeKind::ProcessingInstruction, pos);

        let data_start = self.skip_whitespace(target_end, limit);
        if data_start < limit {
            let data = self.push_token(data_start, limit - data_start, TokenKind::Other);
            self.nodes[id.0].value = Some(data);
        }
    }

    fn other(&mut self, start: usize, end: usize) {
        let lt = self.markup_start(start, end);
        self.push_token(lt, end - lt, TokenKind::Other);
    }

    fn enter_scope(&mut self, element: NodeId, lt: usize) -> Result<(), ParseError> {
        self.scope_marks.push(self.scopes.len());

        let attributes = self.nodes[element.0].attributes.clone();
        for &attr in &attributes {
            if !self.nodes[attr.0].namespace_decl {
                continue;
            }
            let qname = self.qname(attr);
            let prefix = qname.strip_prefix("xmlns").unwrap_or("");
            let prefix = prefix.strip_prefix(':').unwrap_or(prefix).to_string();
            let uri = self.nodes[attr.0]
                .value
                .map(|pos| self.token_text(pos))
                .filter(|uri| !uri.is_empty())
                .map(Box::from);
            self.scopes.push((prefix, uri));
        }

        let qname = self.qname(element);
        let prefix = qname.split_once(':').map_or("", |(prefix, _)| prefix);
        self.nodes[element.0].namespace = self.lookup(prefix, lt)?;

        for &attr in &attributes {
            if self.nodes[attr.0].namespace_decl {
                continue;
            }
            if let Some((prefix, _)) = self.qname(attr).split_once(':') {
                self.nodes[attr.0].namespace = self.lookup(prefix, lt)?;
            }
        }
        Ok(())
    }

    fn leave_scope(&mut self) {
        if let Some(mark) = self.scope_marks.pop() {
            self.scopes.truncate(mark);
        }
    }

    fn lookup(&self, prefix: &str, position: usize) -> Result<Option<Box<str>>, ParseError> {
        if prefix == "xml" {
            return Ok(Some(Box::from(XML_NAMESPACE)));
        }
        match self.scopes.iter().rev().find(|(p, _)| p == prefix) {
            Some((_, uri)) => Ok(uri.clone()),
            None if prefix.is_empty() => Ok(None),
            None => Err(ParseError::UnboundPrefix {
                prefix: prefix.to_string(),
                position,
            }),
        }
    }

    /// Offset of the `<` that opens the event starting near `start`.
    fn markup_start(&self, start: usize, end: usize) -> usize {
        if self.bytes.get(start) == Some(&b'<') {
            start
        } else if start > 0 && self.bytes[start - 1] == b'<' {
            start - 1
        } else {
            memchr(b'<', &self.bytes[start..end]).map_or(start, |i| start + i)
        }
    }

    fn scan_name(&self, mut i: usize, limit: usize, stop: &[u8]) -> usize {
        while i < limit {
            let b = self.bytes[i];
            if is_whitespace(b) || b == b'/' || b == b'>' || stop.contains(&b) {
                break;
            }
            i += 1;
        }
        i
    }

    fn skip_whitespace(&self, mut i: usize, limit: usize) -> usize {
        while i < limit && is_whitespace(self.bytes[i]) {
            i += 1;
        }
        i
    }

    fn current_parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(NodeId(0))
    }

    fn push_token(&mut self, offset: usize, len: usize, kind: TokenKind) -> Position {
        let pos = Position(self.tokens.len());
        self.tokens.push(Token::new(offset, len, kind));
        self.token_nodes.push(None);
        pos
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some(token) = node.token {
            self.token_nodes[token.0] = Some(id);
        }
        self.nodes.push(node);
        id
    }

    fn push_child(&mut self, kind: NodeKind, token: Position) -> NodeId {
        let parent = self.current_parent();
        let id = self.push_node(Node::new(kind, Some(parent), Some(token)));
        self.nodes[parent.0].children.push(id);
        id
    }

    fn token_text(&self, pos: Position) -> &'a str {
        let source: &'a str = self.source;
        source.get(self.tokens[pos.0].range()).unwrap_or("")
    }

    fn qname(&self, id: NodeId) -> &'a str {
        self.nodes[id.0]
            .token
            .map(|pos| self.token_text(pos))
            .unwrap_or("")
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

#[cfg(test)]
mod tests {
    use crate::xml::{Document, NodeKind, ParseError, TokenKind};

    fn kinds(doc: &Document) -> Vec<TokenKind> {
        (0..doc.token_count())
            .filter_map(|i| doc.position_at(i))
            .map(|pos| doc.token_type(pos))
            .collect()
    }

    fn texts(doc: &Document) -> Vec<&str> {
        (0..doc.token_count())
            .filter_map(|i| doc.position_at(i))
            .map(|pos| doc.token_str(pos))
            .collect()
    }

    #[test]
    fn test_token_table() {
        let doc = Document::parse(r#"<e a="1" b='2'>t<!--c--><?pi d?></e>"#, false).unwrap();
        assert_eq!(
            kinds(&doc),
            vec![
                TokenKind::ElementStart,
                TokenKind::AttributeName,
                TokenKind::AttributeValue,
                TokenKind::AttributeName,
                TokenKind::AttributeValue,
                TokenKind::Text,
                TokenKind::Comment,
                TokenKind::ProcessingInstructionName,
                TokenKind::Other,
                TokenKind::ElementEnd,
            ]
        );
        assert_eq!(
            texts(&doc),
            vec!["e", "a", "1", "b", "2", "t", "c", "pi", "d", "e"]
        );
    }

    #[test]
    fn test_declaration_and_whitespace_outside_root() {
        let input = "<?xml version=\"1.0\"?>\n<!DOCTYPE r>\n<r/>\n";
        let doc = Document::parse(input, false).unwrap();
        let kinds = kinds(&doc);
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::ElementStart).count(), 1);
        assert!(!kinds.contains(&TokenKind::Text));
        assert_eq!(doc.token_str(doc.position_at(0).unwrap()), "<?xml version=\"1.0\"?>");
    }

    #[test]
    fn test_gt_inside_attribute_value() {
        let doc = Document::parse(r#"<r expr="a > b" x='"'/>"#, false).unwrap();
        assert_eq!(texts(&doc), vec!["r", "expr", "a > b", "x", "\""]);
    }

    #[test]
    fn test_comment_body_span() {
        let input = "<r><!-- c --></r>";
        let doc = Document::parse(input, false).unwrap();
        let pos = doc.position_at(1).unwrap();
        assert_eq!(doc.token_type(pos), TokenKind::Comment);
        assert_eq!(doc.token_str(pos), " c ");
        let (offset, len) = doc.byte_range(pos);
        assert_eq!(&input[offset + len..offset + len + 3], "-->");
    }

    #[test]
    fn test_cdata_is_text() {
        let doc = Document::parse("<r><![CDATA[a<b]]></r>", false).unwrap();
        let pos = doc.position_at(1).unwrap();
        assert_eq!(doc.token_type(pos), TokenKind::Text);
        assert_eq!(doc.token_str(pos), "a<b");
    }

    #[test]
    fn test_node_order() {
        let doc = Document::parse(r#"<r a="1"><c/>x</r>"#, false).unwrap();
        let kinds: Vec<NodeKind> = (0..doc.node_count())
            .map(|i| doc.kind(crate::xml::NodeId(i)))
            .collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Root,
                NodeKind::Element,
                NodeKind::Attribute,
                NodeKind::Element,
                NodeKind::Text,
            ]
        );
    }

    #[test]
    fn test_namespace_resolution() {
        let input = r#"<s:Server xmlns:s="urn:server" xmlns="urn:default"><Service s:id="1"/><p:x xmlns:p="urn:p"/></s:Server>"#;
        let doc = Document::parse(input, true).unwrap();
        let server = doc.document_element().unwrap();
        assert_eq!(doc.namespace_uri(server), Some("urn:server"));
        assert_eq!(doc.local_name(server), "Server");
        assert_eq!(doc.prefix(server), Some("s"));

        let service = doc.children(server)[0];
        assert_eq!(doc.namespace_uri(service), Some("urn:default"));
        let id = doc.attributes(service)[0];
        assert_eq!(doc.namespace_uri(id), Some("urn:server"));

        let x = doc.children(server)[1];
        assert_eq!(doc.namespace_uri(x), Some("urn:p"));
        assert!(doc
            .attributes(server)
            .iter()
            .all(|&attr| doc.is_namespace_declaration(attr)));
    }

    #[test]
    fn test_unbound_prefix_only_when_namespace_aware() {
        let input = "<a:r/>";
        assert!(Document::parse(input, false).is_ok());
        assert!(matches!(
            Document::parse(input, true),
            Err(ParseError::UnboundPrefix { ref prefix, .. }) if prefix == "a"
        ));
    }

    #[test]
    fn test_declared_scope_ends_with_element() {
        let input = r#"<r><a xmlns:p="urn:p"/><p:b/></r>"#;
        assert!(matches!(
            Document::parse(input, true),
            Err(ParseError::UnboundPrefix { .. })
        ));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Document::parse("<r a=1/>", false),
            Err(ParseError::MalformedTag { .. })
        ));
        assert!(matches!(
            Document::parse(r#"<r a="1"b="2"/>"#, false),
            Err(ParseError::MalformedTag { .. })
        ));
        assert!(matches!(
            Document::parse(r#"<r a="1" a="2"/>"#, false),
            Err(ParseError::DuplicateAttribute { .. })
        ));
        assert!(matches!(
            Document::parse("<r/><s/>", false),
            Err(ParseError::MultipleRoots { .. })
        ));
        assert!(matches!(
            Document::parse("<r/>junk", false),
            Err(ParseError::TextOutsideRoot { .. })
        ));
        assert!(matches!(
            Document::parse("<!-- only -->", false),
            Err(ParseError::EmptyDocument)
        ));
        assert!(Document::parse("<r><a></b></r>", false).is_err());
        assert!(Document::parse("<r><a>", false).is_err());
    }
}
