use serde::Deserialize;
use std::fmt;

/// A TOML edit script.
///
/// ```toml
/// all_matches = false
///
/// [[namespaces]]
/// prefix = "srv"
/// uri = "urn:example:server"
///
/// [[edits]]
/// type = "edit-attribute"
/// xpath = "/Server/Service/Connector[@port='8080']"
/// attribute = "port"
/// value = "80"
/// ```
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EditScript {
    #[serde(default)]
    pub all_matches: bool,
    #[serde(default)]
    pub namespaces: Vec<NamespaceBinding>,
    #[serde(default)]
    pub edits: Vec<EditDefinition>,
}

impl EditScript {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.edits.is_empty() && self.namespaces.is_empty() {
            issues.push(ValidationIssue::EmptyScript);
        }

        for (index, binding) in self.namespaces.iter().enumerate() {
            if binding.prefix.trim().is_empty() {
                issues.push(ValidationIssue::MissingNamespaceField {
                    namespace: index,
                    field: "prefix",
                });
            }
            if binding.uri.trim().is_empty() {
                issues.push(ValidationIssue::MissingNamespaceField {
                    namespace: index,
                    field: "uri",
                });
            }
        }

        for (index, edit) in self.edits.iter().enumerate() {
            if edit.xpath().trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    edit: index,
                    kind: edit.kind(),
                    field: "xpath",
                });
            }
            if let EditDefinition::EditAttribute { attribute, .. } = edit {
                if attribute.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        edit: index,
                        kind: edit.kind(),
                        field: "attribute",
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NamespaceBinding {
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EditDefinition {
    EditAttribute {
        xpath: String,
        attribute: String,
        /// Replacement text, written verbatim between the existing quotes
        value: String,
    },
    InsertAfterHead {
        xpath: String,
        fragment: String,
    },
    InsertAfterElement {
        xpath: String,
        fragment: String,
    },
    InsertBeforeElement {
        xpath: String,
        fragment: String,
    },
    InsertAfterLocation {
        xpath: String,
        fragment: String,
    },
    AddAttribute {
        xpath: String,
        fragment: String,
    },
}

impl EditDefinition {
    /// The `type` tag as written in the script.
    pub fn kind(&self) -> &'static str {
        match self {
            EditDefinition::EditAttribute { .. } => "edit-attribute",
            EditDefinition::InsertAfterHead { .. } => "insert-after-head",
            EditDefinition::InsertAfterElement { .. } => "insert-after-element",
            EditDefinition::InsertBeforeElement { .. } => "insert-before-element",
            EditDefinition::InsertAfterLocation { .. } => "insert-after-location",
            EditDefinition::AddAttribute { .. } => "add-attribute",
        }
    }

    pub fn xpath(&self) -> &str {
        match self {
            EditDefinition::EditAttribute { xpath, .. }
            | EditDefinition::InsertAfterHead { xpath, .. }
            | EditDefinition::InsertAfterElement { xpath, .. }
            | EditDefinition::InsertBeforeElement { xpath, .. }
            | EditDefinition::InsertAfterLocation { xpath, .. }
            | EditDefinition::AddAttribute { xpath, .. } => xpath,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issues.as_slice() {
            [single] => write!(f, "{single}"),
            issues => {
                write!(f, "{} problems", issues.len())?;
                for issue in issues {
                    write!(f, "\n  - {issue}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyScript,
    /// `edit` indexes `[[edits]]` from zero; `kind` is its `type` tag
    MissingField {
        edit: usize,
        kind: &'static str,
        field: &'static str,
    },
    MissingNamespaceField { namespace: usize, field: &'static str },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyScript => {
                write!(f, "no edits and no namespace bindings")
            }
            ValidationIssue::MissingField { edit, kind, field } => {
                write!(f, "edits[{edit}] ({kind}): `{field}` is empty")
            }
            ValidationIssue::MissingNamespaceField { namespace, field } => {
                write!(f, "namespaces[{namespace}]: `{field}` is empty")
            }
        }
    }
}
