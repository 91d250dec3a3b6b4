//! XPath evaluation over a [`Document`]'s node arena.
//!
//! Node-sets are kept as sorted, deduplicated `NodeId` vectors; since node
//! ids are assigned in document order this is also document order.

use crate::xml::{Document, NodeId, NodeKind};
use crate::xpath::errors::XPathError;
use crate::xpath::namespaces::NamespaceBindings;
use crate::xpath::parser::{Axis, BinaryOp, Expr, NodeTest, PathStart, Step};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nodes(Vec<NodeId>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nodes(_) => "node-set",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Context {
    node: NodeId,
    position: usize,
    size: usize,
}

pub struct Evaluator<'a> {
    doc: &'a Document,
    bindings: &'a NamespaceBindings,
}

impl<'a> Evaluator<'a> {
    pub fn new(doc: &'a Document, bindings: &'a NamespaceBindings) -> Self {
        Self { doc, bindings }
    }

    /// Evaluate `expr` with the document root as context node.
    pub fn evaluate(&self, expr: &Expr) -> Result<Value, XPathError> {
        self.eval(expr, self.root_context())
    }

    /// Evaluate `expr`, requiring a node-set result.
    pub fn select(&self, expr: &Expr) -> Result<Vec<NodeId>, XPathError> {
        self.node_set(expr, self.root_context())
    }

    fn root_context(&self) -> Context {
        Context {
            node: self.doc.root(),
            position: 1,
            size: 1,
        }
    }

    fn eval(&self, expr: &Expr, ctx: Context) -> Result<Value, XPathError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Negate(operand) => Ok(Value::Number(-self.number(operand, ctx)?)),
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, ctx)?;
                nodes.extend(self.node_set(right, ctx)?);
                nodes.sort_unstable();
                nodes.dedup();
                Ok(Value::Nodes(nodes))
            }
            Expr::Path { start, steps } => {
                let mut nodes = match start {
                    PathStart::Root => vec![self.doc.root()],
                    PathStart::Context => vec![ctx.node],
                    PathStart::Expr(filter) => self.node_set(filter, ctx)?,
                };
                for step in steps {
                    nodes = self.apply_step(&nodes, step)?;
                }
                Ok(Value::Nodes(nodes))
            }
            Expr::Filter(primary, predicates) => {
                let nodes = self.node_set(primary, ctx)?;
                Ok(Value::Nodes(self.filter(nodes, predicates)?))
            }
            Expr::Function(name, args) => self.call(name, args, ctx),
            Expr::Binary(left, op, right) => self.binary(left, *op, right, ctx),
        }
    }

    fn binary(
        &self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        ctx: Context,
    ) -> Result<Value, XPathError> {
        let value = match op {
            BinaryOp::Or => Value::Boolean(self.truth(left, ctx)? || self.truth(right, ctx)?),
            BinaryOp::And => Value::Boolean(self.truth(left, ctx)? && self.truth(right, ctx)?),
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => {
                let a = self.eval(left, ctx)?;
                let b = self.eval(right, ctx)?;
                Value::Boolean(self.compare(op, &a, &b))
            }
            BinaryOp::Add => Value::Number(self.number(left, ctx)? + self.number(right, ctx)?),
            BinaryOp::Subtract => {
                Value::Number(self.number(left, ctx)? - self.number(right, ctx)?)
            }
            BinaryOp::Multiply => {
                Value::Number(self.number(left, ctx)? * self.number(right, ctx)?)
            }
            BinaryOp::Divide => Value::Number(self.number(left, ctx)? / self.number(right, ctx)?),
            BinaryOp::Modulo => Value::Number(self.number(left, ctx)? % self.number(right, ctx)?),
        };
        Ok(value)
    }

    fn apply_step(&self, input: &[NodeId], step: &Step) -> Result<Vec<NodeId>, XPathError> {
        let uri = self.test_namespace(&step.test)?;
        let principal = if step.axis == Axis::Attribute {
            NodeKind::Attribute
        } else {
            NodeKind::Element
        };

        let mut out = Vec::new();
        for &node in input {
            let candidates: Vec<NodeId> = self
                .axis(node, step.axis)
                .into_iter()
                .filter(|&n| self.matches(n, &step.test, principal, uri))
                .collect();
            out.extend(self.filter(candidates, &step.predicates)?);
        }
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    /// Apply predicates in turn. `nodes` must be in axis order so that
    /// proximity positions count from the context node outward.
    fn filter(&self, mut nodes: Vec<NodeId>, predicates: &[Expr]) -> Result<Vec<NodeId>, XPathError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (i, &node) in nodes.iter().enumerate() {
                let ctx = Context {
                    node,
                    position: i + 1,
                    size,
                };
                let holds = match self.eval(predicate, ctx)? {
                    Value::Number(n) => n == ctx.position as f64,
                    other => to_boolean(&other),
                };
                if holds {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    /// Nodes along `axis` from `id`, in axis order (reverse axes yield the
    /// nearest node first).
    fn axis(&self, id: NodeId, axis: Axis) -> Vec<NodeId> {
        let doc = self.doc;
        let mut out = Vec::new();
        match axis {
            Axis::Child => out.extend_from_slice(doc.children(id)),
            Axis::Descendant => self.descendants(id, &mut out),
            Axis::DescendantOrSelf => {
                out.push(id);
                self.descendants(id, &mut out);
            }
            Axis::SelfAxis => out.push(id),
            Axis::Parent => out.extend(doc.parent(id)),
            Axis::Ancestor => out.extend(self.ancestors(id)),
            Axis::AncestorOrSelf => {
                out.push(id);
                out.extend(self.ancestors(id));
            }
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                if doc.kind(id) == NodeKind::Attribute {
                    return out;
                }
                let Some(parent) = doc.parent(id) else {
                    return out;
                };
                let siblings = doc.children(parent);
                if let Some(i) = siblings.iter().position(|&s| s == id) {
                    if axis == Axis::FollowingSibling {
                        out.extend_from_slice(&siblings[i + 1..]);
                    } else {
                        out.extend(siblings[..i].iter().rev());
                    }
                }
            }
            Axis::Following => {
                let end = self.subtree_end(id);
                out.extend(
                    (end.0 + 1..doc.node_count())
                        .map(NodeId)
                        .filter(|&n| doc.kind(n) != NodeKind::Attribute),
                );
            }
            Axis::Preceding => {
                let ancestors = self.ancestors(id);
                out.extend(
                    (1..id.0)
                        .rev()
                        .map(NodeId)
                        .filter(|n| doc.kind(*n) != NodeKind::Attribute && !ancestors.contains(n)),
                );
            }
            Axis::Attribute => {
                if doc.kind(id) == NodeKind::Element {
                    let skip_decls = doc.is_namespace_aware();
                    out.extend(
                        doc.attributes(id)
                            .iter()
                            .copied()
                            .filter(|&a| !(skip_decls && doc.is_namespace_declaration(a))),
                    );
                }
            }
        }
        out
    }

    fn descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.doc.children(id) {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.doc.parent(id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.doc.parent(parent);
        }
        out
    }

    /// Last node id inside the subtree rooted at `id`, attributes included.
    fn subtree_end(&self, id: NodeId) -> NodeId {
        match self.doc.children(id).last() {
            Some(&child) => self.subtree_end(child),
            None => self.doc.attributes(id).last().copied().unwrap_or(id),
        }
    }

    /// Namespace URI a prefixed test refers to. Only meaningful for
    /// namespace-aware documents.
    fn test_namespace(&self, test: &NodeTest) -> Result<Option<&'a str>, XPathError> {
        if !self.doc.is_namespace_aware() {
            return Ok(None);
        }
        let prefix = match test {
            NodeTest::QName { prefix, .. } | NodeTest::NamespaceWildcard(prefix) => prefix,
            _ => return Ok(None),
        };
        self.bindings
            .resolve(prefix)
            .map(Some)
            .ok_or_else(|| XPathError::UnboundPrefix {
                prefix: prefix.clone(),
            })
    }

    fn matches(&self, id: NodeId, test: &NodeTest, principal: NodeKind, uri: Option<&str>) -> bool {
        let doc = self.doc;
        let kind = doc.kind(id);
        let aware = doc.is_namespace_aware();
        match test {
            NodeTest::Node => true,
            NodeTest::Text => kind == NodeKind::Text,
            NodeTest::Comment => kind == NodeKind::Comment,
            NodeTest::ProcessingInstruction(target) => {
                kind == NodeKind::ProcessingInstruction
                    && target
                        .as_deref()
                        .map_or(true, |target| doc.qualified_name(id) == target)
            }
            _ if kind != principal => false,
            NodeTest::Any => true,
            NodeTest::Name(name) => {
                if aware {
                    doc.local_name(id) == name.as_str() && doc.namespace_uri(id).is_none()
                } else {
                    doc.qualified_name(id) == name.as_str()
                }
            }
            NodeTest::QName { prefix, local } => {
                if aware {
                    doc.local_name(id) == local.as_str() && doc.namespace_uri(id) == uri
                } else {
                    doc.qualified_name(id).split_once(':') == Some((prefix.as_str(), local.as_str()))
                }
            }
            NodeTest::NamespaceWildcard(prefix) => {
                if aware {
                    uri.is_some() && doc.namespace_uri(id) == uri
                } else {
                    doc.prefix(id) == Some(prefix.as_str())
                }
            }
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: Context) -> Result<Value, XPathError> {
        let arity = |allowed: RangeInclusive<usize>| {
            if allowed.contains(&args.len()) {
                Ok(())
            } else {
                Err(XPathError::Arity {
                    name: name.to_string(),
                    given: args.len(),
                })
            }
        };

        let value = match name {
            "last" => {
                arity(0..=0)?;
                Value::Number(ctx.size as f64)
            }
            "position" => {
                arity(0..=0)?;
                Value::Number(ctx.position as f64)
            }
            "count" => {
                arity(1..=1)?;
                Value::Number(self.node_set(&args[0], ctx)?.len() as f64)
            }
            "name" | "local-name" | "namespace-uri" => {
                arity(0..=1)?;
                let node = match args.first() {
                    Some(arg) => self.node_set(arg, ctx)?.first().copied(),
                    None => Some(ctx.node),
                };
                let text = node.map_or("", |n| match name {
                    "name" => self.doc.qualified_name(n),
                    "local-name" => self.doc.local_name(n),
                    _ => self.doc.namespace_uri(n).unwrap_or(""),
                });
                Value::String(text.to_string())
            }
            "string" => {
                arity(0..=1)?;
                Value::String(self.string_arg(args, ctx)?)
            }
            "concat" => {
                if args.len() < 2 {
                    arity(2..=2)?;
                }
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.string(arg, ctx)?);
                }
                Value::String(out)
            }
            "contains" | "starts-with" => {
                arity(2..=2)?;
                let haystack = self.string(&args[0], ctx)?;
                let needle = self.string(&args[1], ctx)?;
                Value::Boolean(if name == "contains" {
                    haystack.contains(needle.as_str())
                } else {
                    haystack.starts_with(needle.as_str())
                })
            }
            "string-length" => {
                arity(0..=1)?;
                Value::Number(self.string_arg(args, ctx)?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0..=1)?;
                let text = self.string_arg(args, ctx)?;
                Value::String(text.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            "not" => {
                arity(1..=1)?;
                Value::Boolean(!self.truth(&args[0], ctx)?)
            }
            "true" | "false" => {
                arity(0..=0)?;
                Value::Boolean(name == "true")
            }
            "boolean" => {
                arity(1..=1)?;
                Value::Boolean(self.truth(&args[0], ctx)?)
            }
            "number" => {
                arity(0..=1)?;
                match args.first() {
                    Some(arg) => Value::Number(self.number(arg, ctx)?),
                    None => Value::Number(parse_number(&self.doc.string_value(ctx.node))),
                }
            }
            _ => {
                return Err(XPathError::UnknownFunction {
                    name: name.to_string(),
                })
            }
        };
        Ok(value)
    }

    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        let doc = self.doc;
        match (left, right) {
            (Value::Nodes(a), Value::Nodes(b)) => {
                let rights: Vec<String> = b.iter().map(|&n| doc.string_value(n)).collect();
                a.iter().any(|&n| {
                    let l = doc.string_value(n);
                    rights.iter().any(|r| compare_strings(op, &l, r))
                })
            }
            (Value::Nodes(nodes), Value::Boolean(_)) => {
                self.compare_atoms(op, &Value::Boolean(!nodes.is_empty()), right)
            }
            (Value::Boolean(_), Value::Nodes(nodes)) => {
                self.compare_atoms(op, left, &Value::Boolean(!nodes.is_empty()))
            }
            (Value::Nodes(nodes), other) => nodes
                .iter()
                .any(|&n| self.compare_atoms(op, &Value::String(doc.string_value(n)), other)),
            (other, Value::Nodes(nodes)) => nodes
                .iter()
                .any(|&n| self.compare_atoms(op, other, &Value::String(doc.string_value(n)))),
            _ => self.compare_atoms(op, left, right),
        }
    }

    fn compare_atoms(&self, op: BinaryOp, a: &Value, b: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = if matches!(a, Value::Boolean(_)) || matches!(b, Value::Boolean(_)) {
                    to_boolean(a) == to_boolean(b)
                } else if matches!(a, Value::Number(_)) || matches!(b, Value::Number(_)) {
                    self.number_of(a) == self.number_of(b)
                } else {
                    self.string_of(a) == self.string_of(b)
                };
                equal == (op == BinaryOp::Eq)
            }
            _ => compare_numbers(op, self.number_of(a), self.number_of(b)),
        }
    }

    fn node_set(&self, expr: &Expr, ctx: Context) -> Result<Vec<NodeId>, XPathError> {
        match self.eval(expr, ctx)? {
            Value::Nodes(nodes) => Ok(nodes),
            other => Err(XPathError::NotNodeSet {
                found: other.type_name(),
            }),
        }
    }

    fn truth(&self, expr: &Expr, ctx: Context) -> Result<bool, XPathError> {
        Ok(to_boolean(&self.eval(expr, ctx)?))
    }

    fn number(&self, expr: &Expr, ctx: Context) -> Result<f64, XPathError> {
        Ok(self.number_of(&self.eval(expr, ctx)?))
    }

    fn string(&self, expr: &Expr, ctx: Context) -> Result<String, XPathError> {
        Ok(self.string_of(&self.eval(expr, ctx)?))
    }

    fn string_arg(&self, args: &[Expr], ctx: Context) -> Result<String, XPathError> {
        match args.first() {
            Some(arg) => self.string(arg, ctx),
            None => Ok(self.doc.string_value(ctx.node)),
        }
    }

    pub fn string_of(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|&n| self.doc.string_value(n))
                .unwrap_or_default(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
        }
    }

    pub fn number_of(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::String(s) => parse_number(s),
            Value::Nodes(_) => parse_number(&self.string_of(value)),
        }
    }
}

pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Boolean(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
    }
}

fn compare_strings(op: BinaryOp, a: &str, b: &str) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => compare_numbers(op, parse_number(a), parse_number(b)),
    }
}

fn compare_numbers(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::GtEq => a >= b,
        _ => false,
    }
}

/// XPath `number()` on a string: optional minus, digits, optional fraction.
/// Anything else is NaN.
fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let body = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !body.is_empty()
        && body != "."
        && body.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && body.bytes().filter(|&b| b == b'.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::parser::parse;

    const DOC: &str = r#"<config>
  <item id="1" weight="2.5">alpha</item>
  <item id="2">beta  gamma</item>
  <!-- note -->
  <?app mode=fast?>
</config>"#;

    fn evaluate(xml: &str, xpath: &str) -> Value {
        let doc = Document::parse(xml, false).unwrap();
        let bindings = NamespaceBindings::new();
        let expr = parse(xpath).unwrap();
        Evaluator::new(&doc, &bindings).evaluate(&expr).unwrap()
    }

    fn string(xpath: &str) -> String {
        match evaluate(DOC, xpath) {
            Value::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        }
    }

    fn number(xpath: &str) -> f64 {
        match evaluate(DOC, xpath) {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    fn boolean(xpath: &str) -> bool {
        match evaluate(DOC, xpath) {
            Value::Boolean(b) => b,
            other => panic!("expected boolean, got {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(number("1 + 2 * 3"), 7.0);
        assert_eq!(number("7 mod 3"), 1.0);
        assert_eq!(number("9 div 2"), 4.5);
        assert_eq!(number("-(2 - 5)"), 3.0);
        assert!(number("number('abc')").is_nan());
    }

    #[test]
    fn test_node_set_functions() {
        assert_eq!(number("count(/config/item)"), 2.0);
        assert_eq!(string("name(/config/*[2])"), "item");
        assert_eq!(string("string(/config/item[@id='2'])"), "beta  gamma");
        assert_eq!(string("normalize-space(/config/item[2])"), "beta gamma");
        assert_eq!(number("string-length(/config/item[1])"), 5.0);
        assert_eq!(number("number(/config/item/@weight)"), 2.5);
        assert_eq!(string("local-name(/config/processing-instruction())"), "app");
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(string("concat('a', 1, true())"), "a1true");
        assert!(boolean("contains('connector', 'nect')"));
        assert!(boolean("starts-with('connector', 'con')"));
        assert!(!boolean("not(true())"));
    }

    #[test]
    fn test_node_set_comparisons() {
        assert!(boolean("/config/item/@id = 2"));
        assert!(boolean("/config/item/@id != 2"));
        assert!(boolean("/config/item/@id > 1"));
        assert!(!boolean("/config/item/@id > 2"));
        assert!(boolean("/config/item = 'alpha'"));
        assert!(boolean("/config/missing = false()"));
        assert!(!boolean("/config/missing = 'x'"));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(string("string(2 div 1)"), "2");
        assert_eq!(string("string(1 div 4)"), "0.25");
        assert_eq!(string("string(1 div 0)"), "Infinity");
        assert_eq!(string("string(0 div 0)"), "NaN");
    }

    #[test]
    fn test_function_errors() {
        let doc = Document::parse(DOC, false).unwrap();
        let bindings = NamespaceBindings::new();
        let eval = Evaluator::new(&doc, &bindings);

        let err = eval.evaluate(&parse("frobnicate()").unwrap()).unwrap_err();
        assert!(matches!(err, XPathError::UnknownFunction { .. }));

        let err = eval.evaluate(&parse("count()").unwrap()).unwrap_err();
        assert!(matches!(err, XPathError::Arity { given: 0, .. }));

        let err = eval.select(&parse("1 + 1").unwrap()).unwrap_err();
        assert_eq!(err, XPathError::NotNodeSet { found: "number" });
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("+1").is_nan());
        assert!(parse_number("").is_nan());
    }
}
