//! XML namespace handling
//!
//! Qualified names, well-known namespace URIs, and the prefix resolvers that
//! XPath queries are evaluated with.

use std::collections::HashMap;

/// XML Schema namespace
pub const NAMESPACE_XS: &str = "http://www.w3.org/2001/XMLSchema";
/// XML Schema instance namespace
pub const NAMESPACE_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// `xml:` prefix namespace
pub const NAMESPACE_XML: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` declaration attributes
pub const NAMESPACE_XMLNS: &str = "http://www.w3.org/2000/xmlns/";
/// XHTML namespace
pub const NAMESPACE_HTML: &str = "http://www.w3.org/1999/xhtml";

/// Conventional prefix for [`NAMESPACE_XS`]
pub const NAMESPACE_ALIAS_XS: &str = "xs";
/// Reserved prefix for [`NAMESPACE_XML`]
pub const NAMESPACE_ALIAS_XML: &str = "xml";
/// Reserved prefix for [`NAMESPACE_XMLNS`]
pub const NAMESPACE_ALIAS_XMLNS: &str = "xmlns";
/// Conventional prefix for [`NAMESPACE_HTML`]
pub const NAMESPACE_ALIAS_HTML: &str = "html";

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Expanded name: namespace URI plus local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Resolves namespace prefixes to URIs (and back) for XPath evaluation.
///
/// Implemented by [`NamespaceContext`] and [`DefaultNamespaceContext`]; callers
/// may implement it for their own lookup tables.
pub trait NamespaceResolver {
    /// URI bound to `prefix`, if any
    fn namespace_uri(&self, prefix: &str) -> Option<&str>;

    /// Every prefix bound to `namespace_uri`
    fn prefixes(&self, namespace_uri: &str) -> Vec<&str>;

    /// First prefix bound to `namespace_uri`
    fn prefix(&self, namespace_uri: &str) -> Option<&str> {
        self.prefixes(namespace_uri).into_iter().next()
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`NamespaceContext::add_prefix`]
    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.add_prefix(prefix, namespace);
        self
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Number of prefix bindings
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// True when no prefix is bound
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl NamespaceResolver for NamespaceContext {
    fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        if prefix.is_empty() {
            return self.get_default_namespace();
        }
        self.get_namespace(prefix)
    }

    fn prefixes(&self, namespace_uri: &str) -> Vec<&str> {
        let mut found: Vec<&str> = self
            .prefixes
            .iter()
            .filter(|(_, uri)| uri.as_str() == namespace_uri)
            .map(|(prefix, _)| prefix.as_str())
            .collect();
        found.sort_unstable();
        found
    }
}

impl<K, V> FromIterator<(K, V)> for NamespaceContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = NamespaceContext::new();
        for (prefix, uri) in iter {
            ctx.add_prefix(prefix, uri);
        }
        ctx
    }
}

const DEFAULT_BINDINGS: [(&str, &str); 4] = [
    (NAMESPACE_ALIAS_HTML, NAMESPACE_HTML),
    (NAMESPACE_ALIAS_XML, NAMESPACE_XML),
    (NAMESPACE_ALIAS_XMLNS, NAMESPACE_XMLNS),
    (NAMESPACE_ALIAS_XS, NAMESPACE_XS),
];

/// Fixed resolver for the `html`, `xml`, `xmlns` and `xs` prefixes
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamespaceContext;

impl NamespaceResolver for DefaultNamespaceContext {
    fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        DEFAULT_BINDINGS
            .iter()
            .find(|(alias, _)| *alias == prefix)
            .map(|(_, uri)| *uri)
    }

    fn prefixes(&self, namespace_uri: &str) -> Vec<&str> {
        DEFAULT_BINDINGS
            .iter()
            .filter(|(_, uri)| *uri == namespace_uri)
            .map(|(alias, _)| *alias)
            .collect()
    }
}

/// Stack of in-scope prefix bindings, one frame per open element.
///
/// Used by the parser to resolve prefixes and by the serializer to decide
/// which declarations still have to be written.
#[derive(Debug, Clone)]
pub(crate) struct NamespaceScope {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceScope {
    pub(crate) fn new() -> Self {
        Self {
            frames: vec![vec![
                (NAMESPACE_ALIAS_XML.to_string(), NAMESPACE_XML.to_string()),
                (NAMESPACE_ALIAS_XMLNS.to_string(), NAMESPACE_XMLNS.to_string()),
            ]],
        }
    }

    pub(crate) fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    pub(crate) fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind `prefix` (empty for the default namespace) in the innermost frame
    pub(crate) fn bind(&mut self, prefix: &str, uri: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.retain(|(p, _)| p != prefix);
            frame.push((prefix.to_string(), uri.to_string()));
        }
    }

    /// Innermost binding of `prefix`; an empty URI means "undeclared"
    pub(crate) fn lookup(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}
