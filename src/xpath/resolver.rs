use crate::xml::{Document, Position};
use crate::xpath::cache::get_or_compile;
use crate::xpath::errors::XPathError;
use crate::xpath::eval::Evaluator;
use crate::xpath::namespaces::NamespaceBindings;

/// Evaluates XPath expressions against a [`Document`] and yields the token
/// position of every selected node.
///
/// An element yields its start-tag name token, an attribute its name token,
/// a text node its text token, a comment its body, and a processing
/// instruction its target. The root node has no token and is never yielded.
#[derive(Debug, Clone, Default)]
pub struct XPathResolver {
    bindings: NamespaceBindings,
}

impl XPathResolver {
    pub fn new(bindings: NamespaceBindings) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &NamespaceBindings {
        &self.bindings
    }

    /// Select the nodes matching `xpath`, in document order.
    ///
    /// Fails if the expression does not parse, names a prefix without a
    /// binding (namespace-aware documents), or evaluates to something other
    /// than a node-set.
    pub fn resolve(&self, xpath: &str, doc: &Document) -> Result<Matches, XPathError> {
        let expr = get_or_compile(xpath)?;
        let nodes = Evaluator::new(doc, &self.bindings).select(&expr)?;
        let positions: Vec<Position> = nodes
            .into_iter()
            .filter_map(|node| doc.node_token(node))
            .collect();
        log::trace!("xpath {xpath} selected {} node(s)", positions.len());
        Ok(Matches {
            positions: positions.into_iter(),
        })
    }
}

/// Positions selected by one XPath evaluation, in document order.
#[derive(Debug, Clone)]
pub struct Matches {
    positions: std::vec::IntoIter<Position>,
}

impl Iterator for Matches {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        self.positions.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl ExactSizeIterator for Matches {}
