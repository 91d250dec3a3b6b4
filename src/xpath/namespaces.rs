use std::collections::BTreeMap;

/// Prefix to namespace-URI bindings used when evaluating XPath name tests.
///
/// Prefixes here are independent of the prefixes the document itself uses:
/// a test `s:Server` matches any element whose resolved namespace equals the
/// URI bound to `s`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceBindings {
    bindings: BTreeMap<String, String>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix` to `uri`. A later binding for the same prefix wins.
    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }
}

impl<P, U> FromIterator<(P, U)> for NamespaceBindings
where
    P: Into<String>,
    U: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (P, U)>>(iter: I) -> Self {
        let mut bindings = NamespaceBindings::new();
        for (prefix, uri) in iter {
            bindings.bind(prefix, uri);
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_binding_wins() {
        let mut ns = NamespaceBindings::new();
        ns.bind("a", "urn:one");
        ns.bind("a", "urn:two");
        assert_eq!(ns.resolve("a"), Some("urn:two"));
        assert_eq!(ns.len(), 1);
        assert_eq!(ns.resolve("b"), None);
    }

    #[test]
    fn test_from_iter() {
        let ns: NamespaceBindings = [("s", "urn:server"), ("x", "urn:x")].into_iter().collect();
        assert!(!ns.is_empty());
        assert_eq!(ns.iter().count(), 2);
    }
}
