use crate::xml::builder::IndexBuilder;
use crate::xml::errors::ParseError;
use crate::xml::token::{Position, Token, TokenKind};
use std::borrow::Cow;

/// Handle to a node in the document's node arena.
///
/// Node ids increase in document order: an element precedes its attributes,
/// which precede its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// Byte extent of an element in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpan {
    /// Offset of the opening `<`
    pub tag_start: usize,
    /// Offset just past the `>` that closes the start tag
    pub head_end: usize,
    /// Offset just past the end tag (or past `/>` for an empty element)
    pub end: usize,
    /// Offset of the `/` in `/>`, for self-closing elements
    pub empty_close: Option<usize>,
}

impl ElementSpan {
    pub fn is_self_closing(&self) -> bool {
        self.empty_close.is_some()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Primary token: element name, attribute name, text run, comment body, PI target
    pub token: Option<Position>,
    /// Attribute value, or PI data
    pub value: Option<Position>,
    pub children: Vec<NodeId>,
    pub attributes: Vec<NodeId>,
    pub span: Option<ElementSpan>,
    /// Resolved namespace URI (namespace-aware documents only)
    pub namespace: Option<Box<str>>,
    pub namespace_decl: bool,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, parent: Option<NodeId>, token: Option<Position>) -> Self {
        Self {
            kind,
            parent,
            token,
            value: None,
            children: Vec::new(),
            attributes: Vec::new(),
            span: None,
            namespace: None,
            namespace_decl: false,
        }
    }
}

/// Immutable, token-indexed view of an XML byte buffer.
///
/// Nothing in the crate mutates a `Document` after [`Document::parse`]
/// returns; edits are recorded against its offsets and replayed by the
/// serializer.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) source: String,
    pub(crate) tokens: Vec<Token>,
    pub(crate) token_nodes: Vec<Option<NodeId>>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) namespace_aware: bool,
}

impl Document {
    /// Parse and index `bytes`.
    ///
    /// With `namespace_aware` set, element and attribute prefixes are
    /// resolved against in-scope declarations and an undeclared prefix is an
    /// error.
    pub fn parse(bytes: impl Into<Vec<u8>>, namespace_aware: bool) -> Result<Self, ParseError> {
        let source = String::from_utf8(bytes.into()).map_err(|e| e.utf8_error())?;
        let index = IndexBuilder::new(&source, namespace_aware).build()?;
        Ok(Document {
            source,
            tokens: index.tokens,
            token_nodes: index.token_nodes,
            nodes: index.nodes,
            namespace_aware,
        })
    }

    /// The original bytes.
    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_namespace_aware(&self) -> bool {
        self.namespace_aware
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn position_at(&self, index: usize) -> Option<Position> {
        (index < self.tokens.len()).then_some(Position(index))
    }

    pub fn token(&self, pos: Position) -> &Token {
        &self.tokens[pos.0]
    }

    pub fn token_type(&self, pos: Position) -> TokenKind {
        self.tokens[pos.0].kind
    }

    /// `(offset, length)` of the token.
    pub fn byte_range(&self, pos: Position) -> (usize, usize) {
        let token = &self.tokens[pos.0];
        (token.offset, token.len)
    }

    pub fn token_str(&self, pos: Position) -> &str {
        self.source.get(self.tokens[pos.0].range()).unwrap_or("")
    }

    pub fn token_bytes(&self, pos: Position) -> &[u8] {
        self.token_str(pos).as_bytes()
    }

    /// Node whose primary token is `pos`, if any.
    pub fn node_at(&self, pos: Position) -> Option<NodeId> {
        self.token_nodes.get(pos.0).copied().flatten()
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The outermost element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .find(|&id| self.kind(id) == NodeKind::Element)
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].attributes
    }

    pub fn node_token(&self, id: NodeId) -> Option<Position> {
        self.nodes[id.0].token
    }

    pub fn element_span(&self, id: NodeId) -> Option<ElementSpan> {
        self.nodes[id.0].span
    }

    pub fn is_namespace_declaration(&self, id: NodeId) -> bool {
        self.nodes[id.0].namespace_decl
    }

    /// The element itself, or the element an attribute/text/comment/PI
    /// belongs to.
    pub fn owning_element(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::Element => Some(id),
            NodeKind::Root => None,
            _ => self
                .parent(id)
                .filter(|&parent| self.kind(parent) == NodeKind::Element),
        }
    }

    /// Qualified name as written in the source. Empty for nodes without a
    /// name.
    pub fn qualified_name(&self, id: NodeId) -> &str {
        match self.kind(id) {
            NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction => self
                .node_token(id)
                .map(|pos| self.token_str(pos))
                .unwrap_or(""),
            _ => "",
        }
    }

    pub fn local_name(&self, id: NodeId) -> &str {
        let qname = self.qualified_name(id);
        if self.kind(id) == NodeKind::ProcessingInstruction {
            return qname;
        }
        qname.split_once(':').map_or(qname, |(_, local)| local)
    }

    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element | NodeKind::Attribute => {
                self.qualified_name(id).split_once(':').map(|(prefix, _)| prefix)
            }
            _ => None,
        }
    }

    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].namespace.as_deref()
    }

    /// Token of the value of the attribute named `qname` on `element`.
    pub fn attribute_value_token(&self, element: NodeId, qname: &str) -> Option<Position> {
        self.attributes(element)
            .iter()
            .find(|&&attr| self.qualified_name(attr) == qname)
            .and_then(|&attr| self.nodes[attr.0].value)
    }

    /// XPath string-value of a node.
    pub fn string_value(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        match node.kind {
            NodeKind::Root | NodeKind::Element => {
                let mut out = String::new();
                self.collect_text(id, &mut out);
                out
            }
            NodeKind::Attribute => node
                .value
                .map(|pos| unescape(self.token_str(pos)).into_owned())
                .unwrap_or_default(),
            NodeKind::Text => node
                .token
                .map(|pos| self.text_value(pos).into_owned())
                .unwrap_or_default(),
            NodeKind::Comment => node
                .token
                .map(|pos| self.token_str(pos).to_string())
                .unwrap_or_default(),
            NodeKind::ProcessingInstruction => node
                .value
                .map(|pos| self.token_str(pos).to_string())
                .unwrap_or_default(),
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for &child in self.children(id) {
            match self.kind(child) {
                NodeKind::Text => {
                    if let Some(pos) = self.node_token(child) {
                        out.push_str(&self.text_value(pos));
                    }
                }
                NodeKind::Element => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    fn text_value(&self, pos: Position) -> Cow<'_, str> {
        let raw = self.token_str(pos);
        if self.is_cdata(pos) {
            Cow::Borrowed(raw)
        } else {
            unescape(raw)
        }
    }

    fn is_cdata(&self, pos: Position) -> bool {
        let offset = self.tokens[pos.0].offset;
        offset >= 9 && self.source.as_bytes()[offset - 9..offset] == *b"<![CDATA["
    }
}

/// Resolve entity and character references, falling back to the raw text
/// when the references are not well-formed.
fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}
