//! Edit plan application.
//!
//! Resolves every directive of an [`EditPlan`] against one parsed document
//! and accumulates the resulting operations:
//! - categories run in a fixed order (attribute edits, after-head,
//!   after-element, before-element, after-location, add-attribute);
//! - directives inside a category run in the order given;
//! - a directive whose XPath matches nothing, or whose match has no anchor,
//!   records nothing and is not an error.

use crate::anchor::AnchorKind;
use crate::config::schema::{EditDefinition, EditScript};
use crate::directive::{AttributeEditDirective, InsertDirective, NamespaceDirective};
use crate::edit::{EditError, EditSet};
use crate::output::serialize;
use crate::xml::{Document, ParseError};
use crate::xpath::{NamespaceBindings, XPathError, XPathResolver};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Which matches of an insertion directive receive the fragment.
///
/// Attribute edits always act on every match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchScope {
    #[default]
    First,
    All,
}

/// Every directive of one run, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    pub namespaces: Vec<NamespaceDirective>,
    pub attribute_edits: Vec<AttributeEditDirective>,
    pub after_head: Vec<InsertDirective>,
    pub after_element: Vec<InsertDirective>,
    pub before_element: Vec<InsertDirective>,
    pub after_location: Vec<InsertDirective>,
    pub append_attribute: Vec<InsertDirective>,
    pub scope: MatchScope,
}

impl EditPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(script: &EditScript) -> Self {
        let mut plan = EditPlan {
            scope: if script.all_matches {
                MatchScope::All
            } else {
                MatchScope::First
            },
            ..EditPlan::default()
        };
        plan.namespaces = script
            .namespaces
            .iter()
            .map(|binding| NamespaceDirective {
                prefix: binding.prefix.clone(),
                uri: binding.uri.clone(),
            })
            .collect();

        for edit in &script.edits {
            match edit {
                EditDefinition::EditAttribute {
                    xpath,
                    attribute,
                    value,
                } => plan.attribute_edits.push(AttributeEditDirective {
                    xpath: xpath.clone(),
                    attribute: attribute.clone(),
                    value: value.clone(),
                }),
                EditDefinition::InsertAfterHead { xpath, fragment } => {
                    plan.after_head.push(insert(xpath, fragment))
                }
                EditDefinition::InsertAfterElement { xpath, fragment } => {
                    plan.after_element.push(insert(xpath, fragment))
                }
                EditDefinition::InsertBeforeElement { xpath, fragment } => {
                    plan.before_element.push(insert(xpath, fragment))
                }
                EditDefinition::InsertAfterLocation { xpath, fragment } => {
                    plan.after_location.push(insert(xpath, fragment))
                }
                EditDefinition::AddAttribute { xpath, fragment } => {
                    plan.append_attribute.push(insert(xpath, fragment))
                }
            }
        }
        plan
    }

    /// Append `other`'s directives after this plan's, category by category.
    pub fn merge(&mut self, other: EditPlan) {
        self.namespaces.extend(other.namespaces);
        self.attribute_edits.extend(other.attribute_edits);
        self.after_head.extend(other.after_head);
        self.after_element.extend(other.after_element);
        self.before_element.extend(other.before_element);
        self.after_location.extend(other.after_location);
        self.append_attribute.extend(other.append_attribute);
        if other.scope == MatchScope::All {
            self.scope = MatchScope::All;
        }
    }

    /// Number of edit directives (namespace bindings excluded).
    pub fn edit_count(&self) -> usize {
        self.attribute_edits.len()
            + self.after_head.len()
            + self.after_element.len()
            + self.before_element.len()
            + self.after_location.len()
            + self.append_attribute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edit_count() == 0
    }

    /// Documents are parsed namespace-aware iff the plan binds a prefix.
    pub fn is_namespace_aware(&self) -> bool {
        !self.namespaces.is_empty()
    }

    pub fn namespace_bindings(&self) -> NamespaceBindings {
        self.namespaces
            .iter()
            .map(|ns| (ns.prefix.as_str(), ns.uri.as_str()))
            .collect()
    }

    fn insertions(&self) -> [(AnchorKind, &[InsertDirective]); 5] {
        [
            (AnchorKind::AfterHead, self.after_head.as_slice()),
            (AnchorKind::AfterElement, self.after_element.as_slice()),
            (AnchorKind::BeforeElement, self.before_element.as_slice()),
            (AnchorKind::AfterLocation, self.after_location.as_slice()),
            (AnchorKind::AppendAttribute, self.append_attribute.as_slice()),
        ]
    }
}

fn insert(xpath: &str, fragment: &str) -> InsertDirective {
    InsertDirective {
        xpath: xpath.to_string(),
        fragment: fragment.to_string(),
    }
}

/// What one directive did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveReport {
    pub category: &'static str,
    pub xpath: String,
    /// Nodes the XPath selected
    pub matches: usize,
    /// Operations recorded for those matches
    pub recorded: usize,
}

impl DirectiveReport {
    pub fn is_skipped(&self) -> bool {
        self.recorded == 0
    }
}

impl fmt::Display for DirectiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} match(es), {} edit(s))",
            self.category, self.xpath, self.matches, self.recorded
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Applied {
    pub edits: EditSet,
    pub reports: Vec<DirectiveReport>,
}

impl Applied {
    pub fn recorded(&self) -> usize {
        self.edits.len()
    }
}

/// Output bytes of a run together with what produced them.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub output: Vec<u8>,
    pub applied: Applied,
}

impl Outcome {
    pub fn is_changed(&self, input: &[u8]) -> bool {
        self.output != input
    }
}

#[derive(Debug)]
pub enum ApplicationError {
    /// The input is not well-formed XML
    Parse(ParseError),
    /// A directive's XPath could not be evaluated
    XPath { xpath: String, source: XPathError },
    /// Recorded operations could not be replayed
    Edit(EditError),
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Parse(e) => write!(f, "failed to parse document: {}", e),
            ApplicationError::XPath { xpath, source } => {
                write!(f, "cannot evaluate '{}': {}", xpath, source)
            }
            ApplicationError::Edit(e) => write!(f, "edit error: {}", e),
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Parse(e) => Some(e),
            ApplicationError::XPath { source, .. } => Some(source),
            ApplicationError::Edit(e) => Some(e),
        }
    }
}

impl From<ParseError> for ApplicationError {
    fn from(e: ParseError) -> Self {
        ApplicationError::Parse(e)
    }
}

impl From<EditError> for ApplicationError {
    fn from(e: EditError) -> Self {
        ApplicationError::Edit(e)
    }
}

/// Resolve every directive of `plan` against `doc`.
pub fn apply_plan(
    plan: &EditPlan,
    doc: &Document,
    resolver: &XPathResolver,
) -> Result<Applied, ApplicationError> {
    let mut applied = Applied::default();

    for directive in &plan.attribute_edits {
        let kind = AnchorKind::AttributeEdit {
            attribute: directive.attribute.clone(),
        };
        apply_directive(
            &mut applied,
            doc,
            resolver,
            &kind,
            &directive.xpath,
            directive.value.as_bytes(),
            MatchScope::All,
        )?;
    }

    for (kind, directives) in plan.insertions() {
        for directive in directives {
            apply_directive(
                &mut applied,
                doc,
                resolver,
                &kind,
                &directive.xpath,
                directive.fragment.as_bytes(),
                plan.scope,
            )?;
        }
    }

    Ok(applied)
}

/// Parse `input`, apply `plan`, and splice the result.
pub fn apply_to_bytes(plan: &EditPlan, input: &[u8]) -> Result<Outcome, ApplicationError> {
    let doc = Document::parse(input, plan.is_namespace_aware())?;
    let resolver = XPathResolver::new(plan.namespace_bindings());
    let applied = apply_plan(plan, &doc, &resolver)?;
    let output = serialize(doc.bytes(), &applied.edits)?;
    Ok(Outcome { output, applied })
}

fn apply_directive(
    applied: &mut Applied,
    doc: &Document,
    resolver: &XPathResolver,
    kind: &AnchorKind,
    xpath: &str,
    bytes: &[u8],
    scope: MatchScope,
) -> Result<(), ApplicationError> {
    let matches = resolver
        .resolve(xpath, doc)
        .map_err(|source| ApplicationError::XPath {
            xpath: xpath.to_string(),
            source,
        })?;
    let total = matches.len();
    let limit = match scope {
        MatchScope::All => total,
        MatchScope::First => 1,
    };

    // Matches that resolve to the same cut (an element and one of its own
    // attributes, say) edit it once.
    let mut seen = HashSet::new();
    let mut recorded = 0;
    for pos in matches.take(limit) {
        match kind.locate(doc, pos) {
            Some(cut) if !seen.insert(cut.clone()) => {
                log::debug!("{kind} {xpath}: duplicate cut at byte {}, skipped", cut.offset())
            }
            Some(cut) => {
                applied.edits.record_cut(cut, bytes);
                recorded += 1;
            }
            None => log::debug!(
                "{kind} {xpath}: {} match has no anchor, skipped",
                doc.token_type(pos)
            ),
        }
    }

    if total == 0 {
        log::debug!("{kind} {xpath}: no match, skipped");
    } else {
        log::debug!("{kind} {xpath}: {total} match(es), {recorded} edit(s)");
    }

    applied.reports.push(DirectiveReport {
        category: kind.name(),
        xpath: xpath.to_string(),
        matches: total,
        recorded,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditOperation;

    const SERVER: &str = r#"<Server port="8005">
  <Service name="Catalina">
    <Connector port="8080"/>
    <Connector port="8443"/>
  </Service>
</Server>"#;

    fn attr(xpath: &str, attribute: &str, value: &str) -> AttributeEditDirective {
        AttributeEditDirective {
            xpath: xpath.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    fn run(plan: &EditPlan) -> String {
        let outcome = apply_to_bytes(plan, SERVER.as_bytes()).unwrap();
        String::from_utf8(outcome.output).unwrap()
    }

    #[test]
    fn test_empty_plan_is_identity() {
        let plan = EditPlan::new();
        assert!(plan.is_empty());
        assert_eq!(run(&plan), SERVER);
    }

    #[test]
    fn test_attribute_edit_applies_to_all_matches() {
        let mut plan = EditPlan::new();
        plan.attribute_edits.push(attr("//Connector", "port", "9"));
        let out = run(&plan);
        assert_eq!(out.matches(r#"port="9""#).count(), 2);
        assert!(out.contains(r#"<Server port="8005">"#));
    }

    #[test]
    fn test_insertion_uses_first_match_by_default() {
        let mut plan = EditPlan::new();
        plan.after_element.push(insert("//Connector", "<X/>"));
        let out = run(&plan);
        assert_eq!(out.matches("<X/>").count(), 1);
        assert!(out.contains(r#"<Connector port="8080"/><X/>"#));

        plan.scope = MatchScope::All;
        let out = run(&plan);
        assert_eq!(out.matches("<X/>").count(), 2);
    }

    #[test]
    fn test_reports() {
        let mut plan = EditPlan::new();
        plan.attribute_edits.push(attr("//Connector", "secure", "true"));
        plan.before_element.push(insert("/Server/Missing", "<X/>"));
        plan.after_head.push(insert("/Server", "<Y/>"));

        let doc = Document::parse(SERVER, false).unwrap();
        let applied = apply_plan(&plan, &doc, &XPathResolver::default()).unwrap();

        let summary: Vec<(&str, usize, usize)> = applied
            .reports
            .iter()
            .map(|r| (r.category, r.matches, r.recorded))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("edit-attribute", 2, 0),
                ("insert-after-head", 1, 1),
                ("insert-before-element", 0, 0),
            ]
        );
        assert_eq!(applied.recorded(), 1);
        assert!(applied.reports[0].is_skipped());
    }

    #[test]
    fn test_categories_run_in_fixed_order() {
        let mut plan = EditPlan::new();
        plan.append_attribute.push(insert("/Server", " a=\"1\""));
        plan.after_head.push(insert("/Server", "<H/>"));
        plan.attribute_edits.push(attr("/Server", "port", "1"));

        let doc = Document::parse(SERVER, false).unwrap();
        let applied = apply_plan(&plan, &doc, &XPathResolver::default()).unwrap();
        let kinds: Vec<bool> = applied
            .edits
            .iter()
            .map(|op| matches!(op, EditOperation::Replace { .. }))
            .collect();
        assert_eq!(kinds, vec![true, false, false]);
        let categories: Vec<&str> = applied.reports.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec!["edit-attribute", "insert-after-head", "add-attribute"]
        );
    }

    #[test]
    fn test_matches_sharing_an_element_edit_it_once() {
        let mut plan = EditPlan::new();
        plan.attribute_edits
            .push(attr("//Connector | //Connector/@port", "port", "9"));
        plan.scope = MatchScope::All;
        plan.after_element
            .push(insert("//Connector | //Connector/@port", "<X/>"));

        let doc = Document::parse(SERVER, false).unwrap();
        let applied = apply_plan(&plan, &doc, &XPathResolver::default()).unwrap();
        assert_eq!(applied.reports[0].matches, 4);
        assert_eq!(applied.reports[0].recorded, 2);
        assert_eq!(applied.reports[1].recorded, 2);

        let out = run(&plan);
        assert_eq!(out.matches(r#"port="9""#).count(), 2);
        assert_eq!(out.matches("<X/>").count(), 2);
    }

    #[test]
    fn test_repeated_attribute_edit_matches_single_edit() {
        let mut once = EditPlan::new();
        once.attribute_edits.push(attr("/Server", "port", "9005"));
        let mut twice = once.clone();
        twice.attribute_edits.push(attr("/Server", "port", "9005"));
        assert_eq!(run(&twice), run(&once));

        let mut later_wins = once.clone();
        later_wins.attribute_edits.push(attr("/Server", "port", "7"));
        assert!(run(&later_wins).contains(r#"<Server port="7">"#));
    }

    #[test]
    fn test_invalid_xpath_aborts() {
        let mut plan = EditPlan::new();
        plan.after_head.push(insert("/Server[", "<X/>"));
        let err = apply_to_bytes(&plan, SERVER.as_bytes()).unwrap_err();
        assert!(matches!(err, ApplicationError::XPath { .. }));
        assert!(err.to_string().contains("/Server["));
    }

    #[test]
    fn test_parse_error_aborts() {
        let err = apply_to_bytes(&EditPlan::new(), b"<a><b></a>").unwrap_err();
        assert!(matches!(err, ApplicationError::Parse(_)));
    }

    #[test]
    fn test_namespace_plan() {
        let input = r#"<s:Server xmlns:s="urn:server"><s:Service/></s:Server>"#;
        let mut plan = EditPlan::new();
        plan.namespaces.push(NamespaceDirective {
            prefix: "x".to_string(),
            uri: "urn:server".to_string(),
        });
        plan.after_head.push(insert("/x:Server", "<s:Listener/>"));
        assert!(plan.is_namespace_aware());

        let outcome = apply_to_bytes(&plan, input.as_bytes()).unwrap();
        assert_eq!(
            String::from_utf8(outcome.output).unwrap(),
            r#"<s:Server xmlns:s="urn:server"><s:Listener/><s:Service/></s:Server>"#
        );
    }

    #[test]
    fn test_merge_keeps_script_first() {
        let script = EditScript {
            all_matches: true,
            namespaces: Vec::new(),
            edits: vec![EditDefinition::InsertAfterHead {
                xpath: "/a".to_string(),
                fragment: "1".to_string(),
            }],
        };
        let mut plan = EditPlan::from_script(&script);
        let mut cli = EditPlan::new();
        cli.after_head.push(insert("/b", "2"));
        plan.merge(cli);

        assert_eq!(plan.after_head[0].xpath, "/a");
        assert_eq!(plan.after_head[1].xpath, "/b");
        assert_eq!(plan.scope, MatchScope::All);
        assert_eq!(plan.edit_count(), 2);
    }
}
