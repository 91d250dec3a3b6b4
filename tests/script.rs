//! Edit scripts loaded from TOML and applied to fixtures.

use std::fs;
use tempfile::TempDir;
use xpath_splice::config::{
    apply_to_bytes, load_from_path, load_from_str, ConfigError, EditDefinition, EditPlan,
    MatchScope,
};
use xpath_splice::directive::InsertDirective;

const SERVER: &str = include_str!("fixtures/server.xml");
const NAMESPACED: &str = include_str!("fixtures/namespaced.xml");

fn fixture(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_fixture_script_loads() {
    let script = load_from_path(fixture("edits.toml")).unwrap();
    assert!(!script.all_matches);
    assert_eq!(script.edits.len(), 3);
    assert!(matches!(
        &script.edits[0],
        EditDefinition::EditAttribute { attribute, value, .. } if attribute == "port" && value == "80"
    ));
    assert_eq!(script.edits[2].xpath(), "//Engine");
}

#[test]
fn test_fixture_script_applies() {
    let script = load_from_path(fixture("edits.toml")).unwrap();
    let plan = EditPlan::from_script(&script);
    let outcome = apply_to_bytes(&plan, SERVER.as_bytes()).unwrap();
    let out = String::from_utf8(outcome.output).unwrap();

    let expected = SERVER
        .replacen(
            r#"<Connector port="8080""#,
            r#"<Connector port="80""#,
            1,
        )
        .replacen(
            r#"<Service name="Catalina">"#,
            "<Service name=\"Catalina\">\n    <Executor name=\"pool\" maxThreads=\"150\"/>",
            1,
        )
        .replacen(
            r#"defaultHost="localhost">"#,
            r#"defaultHost="localhost" jvmRoute="node1">"#,
            1,
        );
    assert_eq!(out, expected);
    assert_eq!(outcome.applied.recorded(), 3);
}

#[test]
fn test_script_directives_precede_command_line() {
    let script = load_from_str(
        r#"
[[edits]]
type = "insert-after-head"
xpath = "/Server/Service"
fragment = "<FromScript/>"
"#,
    )
    .unwrap();
    let mut plan = EditPlan::from_script(&script);
    let mut args = EditPlan::new();
    args.after_head
        .push(InsertDirective::parse("/Server/Service:<FromArgs/>", ":").unwrap());
    plan.merge(args);

    let out = apply_to_bytes(&plan, SERVER.as_bytes()).unwrap().output;
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains(r#"<Service name="Catalina"><FromScript/><FromArgs/>"#));
}

#[test]
fn test_script_all_matches() {
    let script = load_from_str(
        r#"
all_matches = true

[[edits]]
type = "insert-after-element"
xpath = "//Connector"
fragment = "<!-- reviewed -->"
"#,
    )
    .unwrap();
    let plan = EditPlan::from_script(&script);
    assert_eq!(plan.scope, MatchScope::All);

    let out = apply_to_bytes(&plan, SERVER.as_bytes()).unwrap().output;
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out.matches("<!-- reviewed -->").count(), 2);
}

#[test]
fn test_script_namespaces() {
    let script = load_from_str(
        r#"
[[namespaces]]
prefix = "b"
uri = "http://www.springframework.org/schema/beans"

[[edits]]
type = "insert-before-element"
xpath = "/b:beans/b:bean"
fragment = "<!-- pool -->\n  "
"#,
    )
    .unwrap();
    let plan = EditPlan::from_script(&script);
    assert!(plan.is_namespace_aware());

    let out = apply_to_bytes(&plan, NAMESPACED.as_bytes()).unwrap().output;
    let expected = NAMESPACED.replacen(
        r#"<bean id="dataSource""#,
        "<!-- pool -->\n  <bean id=\"dataSource\"",
        1,
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn test_script_errors_carry_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
[[edits]]
type = "edit-attribute"
xpath = ""
attribute = "port"
value = "1"
"#,
    )
    .unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
    assert!(err.to_string().contains("bad.toml"));

    fs::write(&path, "[[edits]]\ntype = \"rename\"\n").unwrap();
    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));

    let err = load_from_path(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
