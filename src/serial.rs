//! Serialization of documents and subtrees back to text
//!
//! Output goes through a `quick-xml` [`Writer`]. Indentation is done here
//! rather than by the writer so that mixed content stays inline.

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Condvar, Mutex, PoisonError};

use once_cell::sync::Lazy;
use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceScope, NAMESPACE_ALIAS_XML};
use crate::tree::{Document, NodeId, NodeKind, NodeType};

const INDENT: &str = "    ";

/// Output properties
///
/// The property names accepted by [`OutputOptions::from_properties`] and the
/// serde representation are `indent`, `omit-xml-declaration`, `encoding`,
/// `version` and `standalone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputOptions {
    /// Pretty-print element-only content with 4 spaces per level
    pub indent: bool,
    /// Leave out the XML declaration
    #[serde(rename = "omit-xml-declaration")]
    pub omit_declaration: bool,
    /// Encoding named in the declaration. Output is always UTF-8.
    pub encoding: String,
    /// Version named in the declaration
    pub version: String,
    /// Standalone flag of the declaration, left out when `None`
    pub standalone: Option<bool>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            indent: false,
            omit_declaration: false,
            encoding: "UTF-8".to_string(),
            version: "1.0".to_string(),
            standalone: None,
        }
    }
}

impl OutputOptions {
    /// Default output: declaration, no indentation
    pub fn new() -> Self {
        Self::default()
    }

    /// Set indentation
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Set whether the declaration is left out
    pub fn omit_declaration(mut self, omit: bool) -> Self {
        self.omit_declaration = omit;
        self
    }

    /// Set the declared encoding
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Set the standalone flag
    pub fn standalone(mut self, standalone: Option<bool>) -> Self {
        self.standalone = standalone;
        self
    }

    /// Build options from `(name, value)` output properties.
    ///
    /// Boolean properties take `yes` or `no`. Unknown names and malformed
    /// values are [`Error::Configuration`].
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in properties {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "indent" => options.indent = yes_no(key, value)?,
                "omit-xml-declaration" => options.omit_declaration = yes_no(key, value)?,
                "encoding" => options.encoding = value.to_string(),
                "version" => options.version = value.to_string(),
                "standalone" => options.standalone = Some(yes_no(key, value)?),
                other => {
                    return Err(Error::Configuration(format!(
                        "unknown output property '{}'",
                        other
                    )))
                }
            }
        }
        Ok(options)
    }
}

fn yes_no(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(Error::Configuration(format!(
            "output property '{}' expects yes or no, got '{}'",
            key, other
        ))),
    }
}

/// The XML declaration for `options`, e.g. `<?xml version="1.0" encoding="UTF-8"?>`
pub fn xml_declaration(options: &OutputOptions) -> String {
    let standalone = options.standalone.map(|s| if s { "yes" } else { "no" });
    let decl = BytesDecl::new(&options.version, Some(&options.encoding), standalone);
    let mut writer = Writer::new(Vec::new());
    // writing into a Vec cannot fail
    let _ = writer.write_event(Event::Decl(decl));
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

/// Serialize `node` (a document, element or any other node) to a string
pub fn to_string(doc: &Document, node: NodeId, options: &OutputOptions) -> Result<String> {
    let mut buffer = Vec::new();
    write(doc, node, &mut buffer, options)?;
    String::from_utf8(buffer).map_err(|e| Error::Serialize(e.to_string()))
}

/// Serialize `node` into `writer`, holding the node's serialization lock
#[instrument(level = "debug", skip(doc, writer, options), fields(document = doc.id()))]
pub fn write<W: Write>(doc: &Document, node: NodeId, writer: W, options: &OutputOptions) -> Result<()> {
    if !doc.contains(node) {
        return Err(Error::unknown_node());
    }
    let _lock = NodeLock::acquire(doc.id(), node);
    let mut serializer = Serializer {
        doc,
        writer: Writer::new(writer),
        options,
        scope: NamespaceScope::new(),
        fixup: doc.is_namespace_aware(),
    };
    serializer.write_root(node)
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in partial_escape(value).chars() {
        match c {
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            c => escaped.push(c),
        }
    }
    escaped
}

struct Serializer<'a, W: Write> {
    doc: &'a Document,
    writer: Writer<W>,
    options: &'a OutputOptions,
    scope: NamespaceScope,
    fixup: bool,
}

impl<'a, W: Write> Serializer<'a, W> {
    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::Serialize(e.to_string()))
    }

    fn raw(&mut self, text: &str) -> Result<()> {
        self.emit(Event::Text(BytesText::from_escaped(text)))
    }

    fn newline(&mut self, depth: usize) -> Result<()> {
        let mut ws = String::with_capacity(1 + depth * INDENT.len());
        ws.push('\n');
        for _ in 0..depth {
            ws.push_str(INDENT);
        }
        self.raw(&ws)
    }

    fn write_root(&mut self, node: NodeId) -> Result<()> {
        if !self.options.omit_declaration {
            let declaration = xml_declaration(self.options);
            self.raw(&declaration)?;
            if self.options.indent {
                self.raw("\n")?;
            }
        }
        if self.doc.node_type(node) == Some(NodeType::Document) {
            let children = self.doc.children(node).to_vec();
            for (i, child) in children.into_iter().enumerate() {
                if i > 0 && self.options.indent {
                    self.raw("\n")?;
                }
                self.write_node(child, 0)?;
            }
            Ok(())
        } else {
            self.write_node(node, 0)
        }
    }

    fn write_node(&mut self, node: NodeId, depth: usize) -> Result<()> {
        let doc = self.doc;
        match doc.kind(node).ok_or_else(Error::unknown_node)? {
            NodeKind::Document => self.write_root(node),
            NodeKind::Element { .. } => self.write_element(node, depth),
            NodeKind::Attribute { value, .. } => self.raw(&escape_attribute(value)),
            NodeKind::Text(text) => self.raw(&partial_escape(text)),
            NodeKind::CData(content) => {
                let content = content.replace("]]>", "]]]]><![CDATA[>");
                self.emit(Event::CData(BytesCData::new(content)))
            }
            NodeKind::Comment(comment) => self.emit(Event::Comment(BytesText::from_escaped(comment.as_str()))),
            NodeKind::ProcessingInstruction { target, data } => {
                let content = if data.is_empty() {
                    target.clone()
                } else {
                    format!("{} {}", target, data)
                };
                self.emit(Event::PI(BytesText::from_escaped(content)))
            }
        }
    }

    /// Namespace declarations the element needs beyond the ones it carries
    fn missing_declarations(&mut self, element: NodeId) -> Vec<(String, String)> {
        let doc = self.doc;
        let mut missing = Vec::new();
        for &attr in doc.attributes(element) {
            let name = doc.node_name(attr).unwrap_or_default();
            let value = doc.node_value(attr).unwrap_or_default();
            if name == "xmlns" {
                self.scope.bind("", value);
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                self.scope.bind(prefix, value);
            }
        }

        let mut declare = |scope: &mut NamespaceScope, prefix: &str, uri: &str| {
            scope.bind(prefix, uri);
            let name = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            missing.push((name, uri.to_string()));
        };

        let prefix = doc.prefix(element);
        match doc.namespace_uri(element) {
            Some(uri) => {
                let prefix = prefix.unwrap_or("");
                if self.scope.lookup(prefix) != Some(uri) {
                    declare(&mut self.scope, prefix, uri);
                }
            }
            None => {
                if prefix.is_none() && self.scope.lookup("").is_some() {
                    declare(&mut self.scope, "", "");
                }
            }
        }

        for &attr in doc.attributes(element) {
            let name = doc.node_name(attr).unwrap_or_default();
            if name == "xmlns" || name.starts_with("xmlns:") {
                continue;
            }
            if let (Some(prefix), Some(uri)) = (doc.prefix(attr), doc.namespace_uri(attr)) {
                if prefix != NAMESPACE_ALIAS_XML && self.scope.lookup(prefix) != Some(uri) {
                    declare(&mut self.scope, prefix, uri);
                }
            }
        }
        missing
    }

    fn write_element(&mut self, element: NodeId, depth: usize) -> Result<()> {
        let doc = self.doc;
        let name = doc.node_name(element).ok_or_else(Error::unknown_node)?;

        if self.fixup {
            self.scope.push();
        }
        let extra = if self.fixup {
            self.missing_declarations(element)
        } else {
            Vec::new()
        };

        let mut start = BytesStart::new(name);
        for (key, value) in &extra {
            let escaped = escape_attribute(value);
            start.push_attribute(Attribute::from((key.as_bytes(), escaped.as_bytes())));
        }
        for &attr in doc.attributes(element) {
            let key = doc.node_name(attr).unwrap_or_default();
            let escaped = escape_attribute(doc.node_value(attr).unwrap_or_default());
            start.push_attribute(Attribute::from((key.as_bytes(), escaped.as_bytes())));
        }

        let children = doc.children(element);
        let element_only = self.options.indent
            && children.iter().all(|&c| match doc.kind(c) {
                Some(NodeKind::Text(t)) => t.trim().is_empty(),
                Some(NodeKind::CData(_)) => false,
                _ => true,
            });
        let visible: Vec<NodeId> = if element_only {
            children
                .iter()
                .copied()
                .filter(|&c| doc.node_type(c) != Some(NodeType::Text))
                .collect()
        } else {
            children.to_vec()
        };

        if visible.is_empty() {
            self.emit(Event::Empty(start))?;
        } else {
            self.emit(Event::Start(start))?;
            for child in visible {
                if element_only {
                    self.newline(depth + 1)?;
                }
                self.write_node(child, depth + 1)?;
            }
            if element_only {
                self.newline(depth)?;
            }
            self.emit(Event::End(BytesEnd::new(name)))?;
        }

        if self.fixup {
            self.scope.pop();
        }
        Ok(())
    }
}

type LockKey = (u64, NodeId);

static NODE_LOCKS: Lazy<(Mutex<HashSet<LockKey>>, Condvar)> =
    Lazy::new(|| (Mutex::new(HashSet::new()), Condvar::new()));

/// Exclusive, process-wide lock on one node of one document. Released on drop.
struct NodeLock {
    key: LockKey,
}

impl NodeLock {
    fn acquire(document: u64, node: NodeId) -> Self {
        let key = (document, node);
        let (held, released) = &*NODE_LOCKS;
        let mut held = held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&key) {
            held = released.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key);
        trace!(document, "acquired serialization lock");
        Self { key }
    }
}

impl Drop for NodeLock {
    fn drop(&mut self) {
        let (held, released) = &*NODE_LOCKS;
        let mut held = held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
        released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use pretty_assertions::assert_eq;

    fn render(xml: &str, options: &OutputOptions) -> String {
        let doc = parse_str(xml).unwrap();
        to_string(&doc, doc.root(), options).unwrap()
    }

    #[test]
    fn test_default_output() {
        assert_eq!(
            render("<root><child>text</child></root>", &OutputOptions::default()),
            r#"<?xml version="1.0" encoding="UTF-8"?><root><child>text</child></root>"#
        );
    }

    #[test]
    fn test_indented_output() {
        let options = OutputOptions::new().indent(true);
        assert_eq!(
            render("<root>\n  <a>text</a><b/>\n</root>", &options),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>\n    <a>text</a>\n    <b/>\n</root>"
        );
    }

    #[test]
    fn test_mixed_content_stays_inline() {
        let options = OutputOptions::new().indent(true).omit_declaration(true);
        assert_eq!(
            render("<p>Hello <b>you</b> there</p>", &options),
            "<p>Hello <b>you</b> there</p>"
        );
    }

    #[test]
    fn test_escaping() {
        let options = OutputOptions::new().omit_declaration(true);
        assert_eq!(
            render(r#"<r a="x &quot;y&quot; &lt;z&gt;">1 &lt; 2 &amp; "q"</r>"#, &options),
            r#"<r a="x &quot;y&quot; &lt;z&gt;">1 &lt; 2 &amp; "q"</r>"#
        );
    }

    #[test]
    fn test_cdata_comment_pi() {
        let options = OutputOptions::new().omit_declaration(true);
        let xml = "<r><![CDATA[a < b]]><!-- note --><?go now?></r>";
        assert_eq!(render(xml, &options), xml);
    }

    #[test]
    fn test_cdata_terminator_is_split() {
        let mut doc = Document::new();
        let root = doc.create_element("r", None).unwrap();
        doc.append_child(doc.root(), root).unwrap();
        let cdata = doc.create_cdata("a]]>b");
        doc.append_child(root, cdata).unwrap();
        let out = to_string(&doc, root, &OutputOptions::new().omit_declaration(true)).unwrap();
        assert_eq!(out, "<r><![CDATA[a]]]]><![CDATA[>b]]></r>");
        let reparsed = parse_str(&out).unwrap();
        let r = reparsed.document_element().unwrap();
        assert_eq!(reparsed.text_content(r), "a]]>b");
    }

    #[test]
    fn test_subtree_gets_namespace_declaration() {
        let doc = parse_str(r#"<p:root xmlns:p="urn:p"><p:child/></p:root>"#).unwrap();
        let root = doc.document_element().unwrap();
        let child = doc.element_children(root)[0];
        let out = to_string(&doc, child, &OutputOptions::new().omit_declaration(true)).unwrap();
        assert_eq!(out, r#"<p:child xmlns:p="urn:p"/>"#);
    }

    #[test]
    fn test_created_elements_get_declarations() {
        let mut doc = Document::new();
        let root = doc.create_element("root", Some("urn:default")).unwrap();
        doc.append_child(doc.root(), root).unwrap();
        let plain = doc.create_element("plain", None).unwrap();
        doc.append_child(root, plain).unwrap();
        let out = to_string(&doc, doc.root(), &OutputOptions::new().omit_declaration(true)).unwrap();
        assert_eq!(out, r#"<root xmlns="urn:default"><plain xmlns=""/></root>"#);
    }

    #[test]
    fn test_standalone_and_declaration() {
        let options = OutputOptions::new().standalone(Some(true));
        assert_eq!(
            xml_declaration(&options),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#
        );
        assert_eq!(
            xml_declaration(&OutputOptions::default()),
            r#"<?xml version="1.0" encoding="UTF-8"?>"#
        );
    }

    #[test]
    fn test_from_properties() {
        let options =
            OutputOptions::from_properties([("indent", "yes"), ("omit-xml-declaration", "yes")])
                .unwrap();
        assert!(options.indent);
        assert!(options.omit_declaration);

        let unknown = OutputOptions::from_properties([("method", "html")]);
        assert!(matches!(unknown, Err(Error::Configuration(_))));
        let malformed = OutputOptions::from_properties([("indent", "maybe")]);
        assert!(matches!(malformed, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_options_serde() {
        let options: OutputOptions =
            serde_json::from_str(r#"{"indent": true, "omit-xml-declaration": true}"#).unwrap();
        assert!(options.indent);
        assert!(options.omit_declaration);
        assert_eq!(options.encoding, "UTF-8");
    }

    #[test]
    fn test_lock_is_released() {
        let doc = parse_str("<root/>").unwrap();
        for _ in 0..3 {
            to_string(&doc, doc.root(), &OutputOptions::default()).unwrap();
        }
    }

    #[test]
    fn test_concurrent_serialization() {
        let doc = parse_str("<root><a/><b/></root>").unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let out = to_string(&doc, doc.root(), &OutputOptions::default()).unwrap();
                    assert!(out.ends_with("<root><a/><b/></root>"));
                });
            }
        });
    }
}
