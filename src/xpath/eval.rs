//! Evaluation of compiled expressions against a [`Document`]

use std::collections::HashSet;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::{format_number, parse_number, XPathError, XPathValue};
use crate::namespaces::NAMESPACE_XML;
use crate::tree::{Document, NodeId, NodeKind, NodeType};

type EvalResult<T> = Result<T, XPathError>;

#[derive(Debug, Clone, Copy)]
struct Context {
    node: NodeId,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'a> {
    doc: &'a Document,
    expression: &'a str,
    origin: NodeId,
}

impl<'a> Evaluator<'a> {
    /// Evaluator for `expression` started at `origin`, the node errors are reported against
    pub(crate) fn new(doc: &'a Document, expression: &'a str, origin: NodeId) -> Self {
        Self {
            doc,
            expression,
            origin,
        }
    }

    fn fail(&self, reason: impl Into<String>) -> XPathError {
        XPathError::new(self.expression, reason)
            .with_node(self.doc.node_name(self.origin).unwrap_or("<unknown>"))
    }

    pub(crate) fn evaluate(&self, expr: &Expr) -> EvalResult<XPathValue> {
        let node = self.origin;
        if !self.doc.contains(node) {
            return Err(XPathError::new(
                self.expression,
                "context node does not belong to the document",
            ));
        }
        let ctx = Context {
            node,
            position: 1,
            size: 1,
        };
        let value = self.eval(expr, &ctx)?;
        Ok(match value {
            XPathValue::NodeSet(nodes) => XPathValue::NodeSet(self.document_order(nodes)),
            other => other,
        })
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> EvalResult<XPathValue> {
        match expr {
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Variable(name) => Err(self.fail(format!("unbound variable ${}", name))),
            Expr::Negate(inner) => {
                let value = self.eval(inner, ctx)?;
                Ok(XPathValue::Number(-self.number(&value)))
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, ctx),
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, ctx)?;
                nodes.extend(self.node_set(right, ctx)?);
                Ok(XPathValue::NodeSet(self.document_order(nodes)))
            }
            Expr::Function { name, args } => self.function(name, args, ctx),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    self.tree_root(ctx.node)
                } else {
                    ctx.node
                };
                let nodes = self.steps(vec![start], steps)?;
                Ok(XPathValue::NodeSet(nodes))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.node_set(primary, ctx)?;
                nodes = self.document_order(nodes);
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                let nodes = self.steps(nodes, steps)?;
                Ok(XPathValue::NodeSet(nodes))
            }
        }
    }

    fn node_set(&self, expr: &Expr, ctx: &Context) -> EvalResult<Vec<NodeId>> {
        match self.eval(expr, ctx)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(self.fail(
                format!("expected a node-set, got a {}", other.type_name()),
            )),
        }
    }

    /// Root of the tree containing `node`: the document node, or the top of a detached subtree
    fn tree_root(&self, node: NodeId) -> NodeId {
        self.doc.ancestors(node).last().copied().unwrap_or(node)
    }

    fn document_order(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let mut seen = HashSet::with_capacity(nodes.len());
        let mut unique: Vec<NodeId> = nodes.into_iter().filter(|n| seen.insert(*n)).collect();
        unique.sort_by_cached_key(|&n| self.doc.order_key(n));
        unique
    }

    // ------------------------------------------------------------------
    // Location steps
    // ------------------------------------------------------------------

    fn steps(&self, mut nodes: Vec<NodeId>, steps: &[Step]) -> EvalResult<Vec<NodeId>> {
        for step in steps {
            let mut selected = Vec::new();
            for &node in &nodes {
                let mut candidates = Vec::new();
                for candidate in self.axis(node, step.axis) {
                    if self.test(candidate, &step.test, step.axis)? {
                        candidates.push(candidate);
                    }
                }
                if step.axis.is_reverse() {
                    candidates.reverse();
                }
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                selected.extend(candidates);
            }
            nodes = self.document_order(selected);
        }
        Ok(nodes)
    }

    /// Apply a predicate to nodes given in proximity order
    fn filter(&self, nodes: Vec<NodeId>, predicate: &Expr) -> EvalResult<Vec<NodeId>> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (i, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                XPathValue::Number(n) => n == (i + 1) as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    fn is_namespace_declaration(&self, attr: NodeId) -> bool {
        let name = self.doc.node_name(attr).unwrap_or_default();
        name == "xmlns" || name.starts_with("xmlns:")
    }

    /// Siblings before and after `node` in document order; none for attributes and roots
    fn siblings(&self, node: NodeId) -> (&'a [NodeId], &'a [NodeId]) {
        let doc = self.doc;
        if doc.node_type(node) == Some(NodeType::Attribute) {
            return (&[], &[]);
        }
        let Some(parent) = doc.parent(node) else {
            return (&[], &[]);
        };
        let children = doc.children(parent);
        match children.iter().position(|&c| c == node) {
            Some(i) => (&children[..i], &children[i + 1..]),
            None => (&[], &[]),
        }
    }

    /// Nodes along `axis` in document order
    fn axis(&self, node: NodeId, axis: Axis) -> Vec<NodeId> {
        let doc = self.doc;
        let is_attribute = doc.node_type(node) == Some(NodeType::Attribute);
        match axis {
            Axis::Self_ => vec![node],
            Axis::Child => doc.children(node).to_vec(),
            Axis::Descendant => doc.descendants(node),
            Axis::DescendantOrSelf => {
                let mut nodes = vec![node];
                nodes.extend(doc.descendants(node));
                nodes
            }
            Axis::Parent => doc.parent(node).into_iter().collect(),
            Axis::Ancestor => {
                let mut nodes = doc.ancestors(node);
                nodes.reverse();
                nodes
            }
            Axis::AncestorOrSelf => {
                let mut nodes = doc.ancestors(node);
                nodes.reverse();
                nodes.push(node);
                nodes
            }
            Axis::Attribute => doc
                .attributes(node)
                .iter()
                .copied()
                .filter(|&a| !self.is_namespace_declaration(a))
                .collect(),
            Axis::Namespace => Vec::new(),
            Axis::FollowingSibling => self.siblings(node).1.to_vec(),
            Axis::PrecedingSibling => self.siblings(node).0.to_vec(),
            Axis::Following => {
                let mut nodes = Vec::new();
                let mut current = node;
                if is_attribute {
                    match doc.parent(node) {
                        Some(owner) => {
                            nodes.extend(doc.descendants(owner));
                            current = owner;
                        }
                        None => return nodes,
                    }
                }
                loop {
                    for &s in self.siblings(current).1 {
                        nodes.push(s);
                        nodes.extend(doc.descendants(s));
                    }
                    match doc.parent(current) {
                        Some(parent) => current = parent,
                        None => return nodes,
                    }
                }
            }
            Axis::Preceding => {
                let mut nodes = Vec::new();
                let mut current = match (is_attribute, doc.parent(node)) {
                    (true, Some(owner)) => owner,
                    (true, None) => return nodes,
                    (false, _) => node,
                };
                loop {
                    for &s in self.siblings(current).0.iter().rev() {
                        nodes.extend(doc.descendants(s).into_iter().rev());
                        nodes.push(s);
                    }
                    match doc.parent(current) {
                        Some(parent) => current = parent,
                        None => {
                            nodes.reverse();
                            return nodes;
                        }
                    }
                }
            }
        }
    }

    fn name_matches(&self, node: NodeId, qname: &str, local: &str, namespace: Option<&str>) -> bool {
        if !self.doc.is_namespace_aware() {
            return self.doc.node_name(node) == Some(qname);
        }
        self.doc.local_name(node) == Some(local) && self.doc.namespace_uri(node) == namespace
    }

    fn test(&self, node: NodeId, test: &NodeTest, axis: Axis) -> EvalResult<bool> {
        let doc = self.doc;
        let node_type = doc.node_type(node);
        let principal = if axis == Axis::Attribute {
            NodeType::Attribute
        } else {
            NodeType::Element
        };
        Ok(match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(node_type, Some(NodeType::Text) | Some(NodeType::CData)),
            NodeTest::Comment => node_type == Some(NodeType::Comment),
            NodeTest::ProcessingInstruction(target) => match doc.kind(node) {
                Some(NodeKind::ProcessingInstruction { target: t, .. }) => {
                    target.as_deref().map_or(true, |expected| expected == t.as_str())
                }
                _ => false,
            },
            NodeTest::Any => node_type == Some(principal),
            NodeTest::AnyInNamespace { prefix, namespace } => {
                if node_type != Some(principal) {
                    return Ok(false);
                }
                match namespace {
                    Some(uri) => doc.namespace_uri(node) == Some(uri.as_str()),
                    None if !doc.is_namespace_aware() => doc.prefix(node) == Some(prefix.as_str()),
                    None => return Err(self.unresolved(prefix)),
                }
            }
            NodeTest::Name {
                qname,
                prefix,
                local,
                namespace,
            } => {
                if node_type != Some(principal) {
                    return Ok(false);
                }
                match (prefix, namespace) {
                    (Some(p), None) if doc.is_namespace_aware() => {
                        return Err(self.unresolved(p))
                    }
                    (Some(_), None) => doc.node_name(node) == Some(qname.as_str()),
                    _ => self.name_matches(node, qname, local, namespace.as_deref()),
                }
            }
        })
    }

    fn unresolved(&self, prefix: &str) -> XPathError {
        self.fail(
            format!("no namespace context to resolve prefix '{}'", prefix),
        )
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr, ctx: &Context) -> EvalResult<XPathValue> {
        match op {
            BinaryOp::Or => {
                let l = self.eval(left, ctx)?;
                if self.boolean(&l) {
                    return Ok(XPathValue::Boolean(true));
                }
                let r = self.eval(right, ctx)?;
                Ok(XPathValue::Boolean(self.boolean(&r)))
            }
            BinaryOp::And => {
                let l = self.eval(left, ctx)?;
                if !self.boolean(&l) {
                    return Ok(XPathValue::Boolean(false));
                }
                let r = self.eval(right, ctx)?;
                Ok(XPathValue::Boolean(self.boolean(&r)))
            }
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                Ok(XPathValue::Boolean(self.compare(op, &l, &r)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                let (a, b) = (self.number(&l), self.number(&r));
                Ok(XPathValue::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                }))
            }
        }
    }

    fn compare(&self, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
        use XPathValue::{Boolean, NodeSet};
        match (left, right) {
            (NodeSet(a), NodeSet(b)) => {
                let right_values: Vec<XPathValue> = b
                    .iter()
                    .map(|&n| XPathValue::String(self.string_value(n)))
                    .collect();
                a.iter().any(|&n| {
                    let value = XPathValue::String(self.string_value(n));
                    right_values.iter().any(|r| compare_atoms(op, &value, r))
                })
            }
            (NodeSet(a), Boolean(_)) => compare_atoms(op, &Boolean(!a.is_empty()), right),
            (Boolean(_), NodeSet(b)) => compare_atoms(op, left, &Boolean(!b.is_empty())),
            (NodeSet(a), other) => a
                .iter()
                .any(|&n| compare_atoms(op, &self.node_atom(n, other), other)),
            (other, NodeSet(b)) => b
                .iter()
                .any(|&n| compare_atoms(op, other, &self.node_atom(n, other))),
            _ => compare_atoms(op, left, right),
        }
    }

    /// A node's value converted to the type of the value it is compared with
    fn node_atom(&self, node: NodeId, other: &XPathValue) -> XPathValue {
        let value = self.string_value(node);
        match other {
            XPathValue::Number(_) => XPathValue::Number(parse_number(&value)),
            _ => XPathValue::String(value),
        }
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    pub(crate) fn string_value(&self, node: NodeId) -> String {
        self.doc.text_content(node)
    }

    pub(crate) fn string(&self, value: &XPathValue) -> String {
        match value {
            XPathValue::NodeSet(nodes) => nodes
                .iter()
                .min_by_key(|&&n| self.doc.order_key(n))
                .map(|&n| self.string_value(n))
                .unwrap_or_default(),
            XPathValue::Boolean(b) => b.to_string(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::String(s) => s.clone(),
        }
    }

    pub(crate) fn number(&self, value: &XPathValue) -> f64 {
        match value {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            other => parse_number(&self.string(other)),
        }
    }

    pub(crate) fn boolean(&self, value: &XPathValue) -> bool {
        match value {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
        }
    }

    // ------------------------------------------------------------------
    // Core function library
    // ------------------------------------------------------------------

    fn arg_string(&self, args: &[Expr], index: usize, ctx: &Context) -> EvalResult<String> {
        match args.get(index) {
            Some(arg) => {
                let value = self.eval(arg, ctx)?;
                Ok(self.string(&value))
            }
            None => Ok(self.string_value(ctx.node)),
        }
    }

    fn arg_number(&self, args: &[Expr], index: usize, ctx: &Context) -> EvalResult<f64> {
        match args.get(index) {
            Some(arg) => {
                let value = self.eval(arg, ctx)?;
                Ok(self.number(&value))
            }
            None => Ok(parse_number(&self.string_value(ctx.node))),
        }
    }

    /// First node of the optional node-set argument, or the context node
    fn arg_node(&self, args: &[Expr], ctx: &Context) -> EvalResult<Option<NodeId>> {
        match args.first() {
            Some(arg) => {
                let nodes = self.document_order(self.node_set(arg, ctx)?);
                Ok(nodes.first().copied())
            }
            None => Ok(Some(ctx.node)),
        }
    }

    fn function(&self, name: &str, args: &[Expr], ctx: &Context) -> EvalResult<XPathValue> {
        use XPathValue::{Boolean, Number, String as Str};
        let doc = self.doc;
        Ok(match name {
            "last" => Number(ctx.size as f64),
            "position" => Number(ctx.position as f64),
            "count" => Number(self.node_set(&args[0], ctx)?.len() as f64),
            "id" => XPathValue::NodeSet(self.id(&args[0], ctx)?),
            "local-name" => Str(self
                .arg_node(args, ctx)?
                .and_then(|n| match doc.kind(n) {
                    Some(NodeKind::ProcessingInstruction { target, .. }) => Some(target.as_str()),
                    _ => doc.local_name(n),
                })
                .unwrap_or_default()
                .to_string()),
            "namespace-uri" => Str(self
                .arg_node(args, ctx)?
                .and_then(|n| doc.namespace_uri(n))
                .unwrap_or_default()
                .to_string()),
            "name" => Str(self
                .arg_node(args, ctx)?
                .filter(|&n| {
                    matches!(
                        doc.node_type(n),
                        Some(NodeType::Element)
                            | Some(NodeType::Attribute)
                            | Some(NodeType::ProcessingInstruction)
                    )
                })
                .and_then(|n| doc.node_name(n))
                .unwrap_or_default()
                .to_string()),
            "string" => Str(self.arg_string(args, 0, ctx)?),
            "concat" => {
                let mut result = String::new();
                for i in 0..args.len() {
                    result.push_str(&self.arg_string(args, i, ctx)?);
                }
                Str(result)
            }
            "starts-with" => {
                let (s, prefix) = (self.arg_string(args, 0, ctx)?, self.arg_string(args, 1, ctx)?);
                Boolean(s.starts_with(&prefix))
            }
            "contains" => {
                let (s, needle) = (self.arg_string(args, 0, ctx)?, self.arg_string(args, 1, ctx)?);
                Boolean(s.contains(&needle))
            }
            "substring-before" => {
                let (s, needle) = (self.arg_string(args, 0, ctx)?, self.arg_string(args, 1, ctx)?);
                Str(s.find(&needle).map(|i| s[..i].to_string()).unwrap_or_default())
            }
            "substring-after" => {
                let (s, needle) = (self.arg_string(args, 0, ctx)?, self.arg_string(args, 1, ctx)?);
                Str(s
                    .find(&needle)
                    .map(|i| s[i + needle.len()..].to_string())
                    .unwrap_or_default())
            }
            "substring" => {
                let s = self.arg_string(args, 0, ctx)?;
                let start = round(self.arg_number(args, 1, ctx)?);
                let end = if args.len() > 2 {
                    start + round(self.arg_number(args, 2, ctx)?)
                } else {
                    f64::INFINITY
                };
                Str(s
                    .chars()
                    .enumerate()
                    .filter(|(i, _)| {
                        let position = (*i + 1) as f64;
                        position >= start && position < end
                    })
                    .map(|(_, c)| c)
                    .collect())
            }
            "string-length" => Number(self.arg_string(args, 0, ctx)?.chars().count() as f64),
            "normalize-space" => Str(self
                .arg_string(args, 0, ctx)?
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")),
            "translate" => {
                let s = self.arg_string(args, 0, ctx)?;
                let from: Vec<char> = self.arg_string(args, 1, ctx)?.chars().collect();
                let to: Vec<char> = self.arg_string(args, 2, ctx)?.chars().collect();
                Str(s
                    .chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect())
            }
            "boolean" => {
                let value = self.eval(&args[0], ctx)?;
                Boolean(self.boolean(&value))
            }
            "not" => {
                let value = self.eval(&args[0], ctx)?;
                Boolean(!self.boolean(&value))
            }
            "true" => Boolean(true),
            "false" => Boolean(false),
            "lang" => Boolean(self.lang(&self.arg_string(args, 0, ctx)?, ctx.node)),
            "number" => Number(self.arg_number(args, 0, ctx)?),
            "sum" => Number(
                self.node_set(&args[0], ctx)?
                    .into_iter()
                    .map(|n| parse_number(&self.string_value(n)))
                    .sum(),
            ),
            "floor" => Number(self.arg_number(args, 0, ctx)?.floor()),
            "ceiling" => Number(self.arg_number(args, 0, ctx)?.ceil()),
            "round" => Number(round(self.arg_number(args, 0, ctx)?)),
            other => return Err(self.fail(format!("unknown function '{}'", other))),
        })
    }

    /// Elements whose `xml:id` is one of the whitespace separated tokens
    fn id(&self, arg: &Expr, ctx: &Context) -> EvalResult<Vec<NodeId>> {
        let value = self.eval(arg, ctx)?;
        let tokens: Vec<String> = match &value {
            XPathValue::NodeSet(nodes) => nodes
                .iter()
                .flat_map(|&n| {
                    self.string_value(n)
                        .split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect(),
            other => self
                .string(other)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        };
        let root = self.tree_root(ctx.node);
        let doc = self.doc;
        let found = std::iter::once(root)
            .chain(doc.descendants(root))
            .filter(|&n| {
                doc.attribute_node_ns(n, Some(NAMESPACE_XML), "id")
                    .or_else(|| doc.attribute_node(n, "xml:id"))
                    .and_then(|a| doc.node_value(a))
                    .is_some_and(|id| tokens.iter().any(|t| t == id))
            })
            .collect();
        Ok(self.document_order(found))
    }

    fn lang(&self, wanted: &str, node: NodeId) -> bool {
        let doc = self.doc;
        let lang = std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|n| {
                doc.attribute_node_ns(n, Some(NAMESPACE_XML), "lang")
                    .or_else(|| doc.attribute_node(n, "xml:lang"))
                    .and_then(|a| doc.node_value(a))
            });
        match lang {
            Some(lang) => {
                let (lang, wanted) = (lang.to_lowercase(), wanted.to_lowercase());
                lang == wanted || lang.starts_with(&format!("{}-", wanted))
            }
            None => false,
        }
    }
}

fn compare_atoms(op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    use XPathValue::{Boolean, Number};
    match op {
        BinaryOp::Eq | BinaryOp::Neq => {
            let equal = match (left, right) {
                (Boolean(_), _) | (_, Boolean(_)) => atom_boolean(left) == atom_boolean(right),
                (Number(_), _) | (_, Number(_)) => atom_number(left) == atom_number(right),
                _ => atom_string(left) == atom_string(right),
            };
            if op == BinaryOp::Eq {
                equal
            } else {
                !equal
            }
        }
        _ => {
            let (a, b) = (atom_number(left), atom_number(right));
            match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Lte => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            }
        }
    }
}

fn atom_boolean(value: &XPathValue) -> bool {
    match value {
        XPathValue::Boolean(b) => *b,
        XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
        XPathValue::String(s) => !s.is_empty(),
        XPathValue::NodeSet(nodes) => !nodes.is_empty(),
    }
}

fn atom_number(value: &XPathValue) -> f64 {
    match value {
        XPathValue::Boolean(b) => f64::from(u8::from(*b)),
        XPathValue::Number(n) => *n,
        XPathValue::String(s) => parse_number(s),
        XPathValue::NodeSet(_) => f64::NAN,
    }
}

fn atom_string(value: &XPathValue) -> String {
    match value {
        XPathValue::Boolean(b) => b.to_string(),
        XPathValue::Number(n) => format_number(*n),
        XPathValue::String(s) => s.clone(),
        XPathValue::NodeSet(_) => String::new(),
    }
}

fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    if (-0.5..0.0).contains(&n) {
        return -0.0;
    }
    (n + 0.5).floor()
}
