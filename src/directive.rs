//! Edit directives as written on the command line.
//!
//! Formats:
//! - attribute edit: `<xpath>@<attribute>=<value>`, split at the last `@`
//!   and then the first `=` after it;
//! - insertion: `<xpath><separator><fragment>`, split at the last
//!   occurrence of the separator;
//! - namespace: `<prefix>:<uri>`, split at the first `:`.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("invalid {kind} '{input}': {reason}")]
    InvalidArgument {
        kind: &'static str,
        input: String,
        reason: String,
    },
}

impl DirectiveError {
    fn invalid(kind: &'static str, input: &str, reason: impl Into<String>) -> Self {
        DirectiveError::InvalidArgument {
            kind,
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Replace the value of `attribute` on every element `xpath` selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeEditDirective {
    pub xpath: String,
    pub attribute: String,
    pub value: String,
}

impl AttributeEditDirective {
    pub fn parse(input: &str) -> Result<Self, DirectiveError> {
        const KIND: &str = "attribute edit";
        let at = input
            .rfind('@')
            .ok_or_else(|| DirectiveError::invalid(KIND, input, "expected <xpath>@<attribute>=<value>"))?;
        let rest = &input[at + 1..];
        let eq = rest
            .find('=')
            .ok_or_else(|| DirectiveError::invalid(KIND, input, "missing '=' after the attribute name"))?;

        Ok(AttributeEditDirective {
            xpath: input[..at].to_string(),
            attribute: rest[..eq].to_string(),
            value: rest[eq + 1..].to_string(),
        })
    }
}

/// Insert `fragment` verbatim at an anchor relative to what `xpath` selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertDirective {
    pub xpath: String,
    pub fragment: String,
}

impl InsertDirective {
    pub fn parse(input: &str, separator: &str) -> Result<Self, DirectiveError> {
        const KIND: &str = "insertion";
        if separator.is_empty() {
            return Err(DirectiveError::invalid(KIND, input, "separator must not be empty"));
        }
        let split = input.rfind(separator).ok_or_else(|| {
            DirectiveError::invalid(
                KIND,
                input,
                format!("expected <xpath>{separator}<fragment>"),
            )
        })?;

        Ok(InsertDirective {
            xpath: input[..split].to_string(),
            fragment: input[split + separator.len()..].to_string(),
        })
    }
}

/// Bind an XPath prefix to a namespace URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceDirective {
    pub prefix: String,
    pub uri: String,
}

impl NamespaceDirective {
    pub fn parse(input: &str) -> Result<Self, DirectiveError> {
        let (prefix, uri) = input.split_once(':').ok_or_else(|| {
            DirectiveError::invalid("namespace", input, "expected <prefix>:<uri>")
        })?;
        Ok(NamespaceDirective {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_edit_uses_last_at() {
        let d = AttributeEditDirective::parse("//Connector[@port='8080']@port=80").unwrap();
        assert_eq!(d.xpath, "//Connector[@port='8080']");
        assert_eq!(d.attribute, "port");
        assert_eq!(d.value, "80");
    }

    #[test]
    fn test_attribute_edit_value_may_contain_equals() {
        let d = AttributeEditDirective::parse("/a@href=x?k=v").unwrap();
        assert_eq!(d.attribute, "href");
        assert_eq!(d.value, "x?k=v");
    }

    #[test]
    fn test_attribute_edit_empty_value() {
        let d = AttributeEditDirective::parse("/a@b=").unwrap();
        assert_eq!(d.value, "");
    }

    #[test]
    fn test_attribute_edit_errors() {
        assert!(AttributeEditDirective::parse("/a/b").is_err());
        assert!(AttributeEditDirective::parse("/a[@x=1]@b").is_err());
    }

    #[test]
    fn test_insert_splits_at_last_separator() {
        let d = InsertDirective::parse("/s:Server:<x/>", ":").unwrap();
        assert_eq!(d.xpath, "/s:Server");
        assert_eq!(d.fragment, "<x/>");
    }

    #[test]
    fn test_insert_custom_separator() {
        let d = InsertDirective::parse("/Server|<x a=\"b:c\"/>", "|").unwrap();
        assert_eq!(d.xpath, "/Server");
        assert_eq!(d.fragment, "<x a=\"b:c\"/>");

        let d = InsertDirective::parse("/a::<b/>", "::").unwrap();
        assert_eq!(d.xpath, "/a");
        assert_eq!(d.fragment, "<b/>");
    }

    #[test]
    fn test_insert_errors() {
        let err = InsertDirective::parse("/Server", ":").unwrap_err();
        assert!(err.to_string().contains("insertion"));
        assert!(InsertDirective::parse("/a:b", "").is_err());
    }

    #[test]
    fn test_namespace_splits_at_first_colon() {
        let d = NamespaceDirective::parse("srv:urn:example:server").unwrap();
        assert_eq!(d.prefix, "srv");
        assert_eq!(d.uri, "urn:example:server");
        assert!(NamespaceDirective::parse("nocolon").is_err());
    }
}
