//! XPath 1.0 support
//!
//! Expressions are compiled once into an [`XPath`] and evaluated against any
//! node of any [`Document`]. Name test prefixes are resolved at compile time
//! against an optional [`NamespaceResolver`].
//!
//! ## Limitations
//!
//! - The `namespace` axis selects nothing; namespace declarations are
//!   attributes of the tree but are hidden from the `attribute` axis.
//! - Variables cannot be bound; referencing one is an evaluation error.
//! - `id()` matches `xml:id` attributes only (there is no DTD).

mod ast;
mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::str::FromStr;

use crate::namespaces::NamespaceResolver;
use crate::tree::{Document, NodeId};

use ast::Expr;
use eval::Evaluator;

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    /// Nodes in document order, without duplicates
    NodeSet(Vec<NodeId>),
    /// A boolean
    Boolean(bool),
    /// A number
    Number(f64),
    /// A string
    String(String),
}

impl XPathValue {
    /// XPath type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::NodeSet(_) => "node-set",
            XPathValue::Boolean(_) => "boolean",
            XPathValue::Number(_) => "number",
            XPathValue::String(_) => "string",
        }
    }

    /// Check if the result is true (for boolean or non-empty nodes)
    pub fn is_truthy(&self) -> bool {
        match self {
            XPathValue::Boolean(b) => *b,
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
        }
    }

    /// Get as nodes if applicable
    pub fn as_nodes(&self) -> Option<&[NodeId]> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// String value; node-sets take the string-value of their first node
    pub fn to_string_value(&self, doc: &Document) -> String {
        match self {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|&n| doc.text_content(n))
                .unwrap_or_default(),
            XPathValue::Boolean(b) => b.to_string(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::String(s) => s.clone(),
        }
    }

    /// Numeric value
    pub fn to_number(&self, doc: &Document) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            other => parse_number(&other.to_string_value(doc)),
        }
    }
}

/// XPath compilation or evaluation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathError {
    /// The expression as written
    pub expression: String,
    /// Name of the context node, for evaluation failures
    pub node: Option<String>,
    /// What went wrong
    pub reason: String,
}

impl XPathError {
    /// Create a new error for `expression`
    pub fn new(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            node: None,
            reason: reason.into(),
        }
    }

    /// Set the context node name
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }
}

impl fmt::Display for XPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(ref node) => write!(
                f,
                "XPath failure on node: {}: {}: {}",
                node, self.expression, self.reason
            ),
            None => write!(
                f,
                "Invalid XPath expression: {}: {}",
                self.expression, self.reason
            ),
        }
    }
}

impl std::error::Error for XPathError {}

/// Format a number the way `string()` does: integers without a fraction,
/// no exponent, `NaN` and `Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// Convert a string the way `number()` does; anything but an optionally
/// signed decimal surrounded by whitespace is `NaN`.
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// A compiled XPath expression
///
/// # Examples
///
/// ```
/// use xmldom::{parse_str, XPath};
///
/// let doc = parse_str("<root><a>1</a><a>2</a></root>").unwrap();
/// let xpath = XPath::compile("sum(/root/a)").unwrap();
/// assert_eq!(xpath.evaluate_number(&doc, doc.root()).unwrap(), 3.0);
/// ```
#[derive(Debug, Clone)]
pub struct XPath {
    expression: String,
    expr: Expr,
}

impl XPath {
    /// Compile an expression without a namespace resolver
    pub fn compile(expression: &str) -> Result<Self, XPathError> {
        Self::compile_with(expression, None)
    }

    /// Compile an expression, resolving name test prefixes with `resolver`
    pub fn compile_with(
        expression: &str,
        resolver: Option<&dyn NamespaceResolver>,
    ) -> Result<Self, XPathError> {
        let expr =
            parser::parse(expression, resolver).map_err(|reason| XPathError::new(expression, reason))?;
        Ok(Self {
            expression: expression.to_string(),
            expr,
        })
    }

    /// The expression as written
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate with `node` as the context node
    pub fn evaluate(&self, doc: &Document, node: NodeId) -> Result<XPathValue, XPathError> {
        Evaluator::new(doc, &self.expression, node).evaluate(&self.expr)
    }

    /// Evaluate to a node-set; any other result type is an error
    pub fn select_nodes(&self, doc: &Document, node: NodeId) -> Result<Vec<NodeId>, XPathError> {
        match self.evaluate(doc, node)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::new(
                &self.expression,
                format!("result is a {}, not a node-set", other.type_name()),
            )
            .with_node(doc.node_name(node).unwrap_or_default())),
        }
    }

    /// Evaluate and convert to a string
    pub fn evaluate_string(&self, doc: &Document, node: NodeId) -> Result<String, XPathError> {
        let value = self.evaluate(doc, node)?;
        Ok(Evaluator::new(doc, &self.expression, node).string(&value))
    }

    /// Evaluate and convert to a number
    pub fn evaluate_number(&self, doc: &Document, node: NodeId) -> Result<f64, XPathError> {
        let value = self.evaluate(doc, node)?;
        Ok(Evaluator::new(doc, &self.expression, node).number(&value))
    }

    /// Evaluate and convert to a boolean
    pub fn evaluate_boolean(&self, doc: &Document, node: NodeId) -> Result<bool, XPathError> {
        let value = self.evaluate(doc, node)?;
        Ok(Evaluator::new(doc, &self.expression, node).boolean(&value))
    }
}

impl FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
