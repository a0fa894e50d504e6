//! XML parsing into a [`Document`]
//!
//! Reads `quick-xml` events and builds the arena tree. Comments, CDATA
//! sections and processing instructions are kept. The DOCTYPE is not kept,
//! but internal general entities declared in it are expanded.
//! With namespace awareness enabled, prefixes are resolved against the
//! in-scope `xmlns` declarations and an undeclared prefix is an error.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use once_cell::sync::Lazy;
use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::names::{split_qname, validate_qname};
use crate::namespaces::{NamespaceScope, NAMESPACE_XMLNS};
use crate::tree::{Document, NodeId};

/// Options controlling how input is turned into a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Resolve prefixes to namespace URIs (default `true`)
    pub namespace_aware: bool,
    /// Resource limits
    pub limits: Limits,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            namespace_aware: true,
            limits: Limits::default(),
        }
    }
}

impl ParseOptions {
    /// Namespace-aware parsing with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set namespace awareness
    pub fn namespace_aware(mut self, namespace_aware: bool) -> Self {
        self.namespace_aware = namespace_aware;
        self
    }

    /// Set resource limits
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Parse a string with default options
pub fn parse_str(xml: &str) -> Result<Document> {
    parse_str_with(xml, &ParseOptions::default())
}

/// Parse a string
#[instrument(level = "debug", skip(xml, options), fields(len = xml.len(), namespace_aware = options.namespace_aware))]
pub fn parse_str_with(xml: &str, options: &ParseOptions) -> Result<Document> {
    options.limits.check_size(xml.len())?;
    let xml = xml.strip_prefix('\u{FEFF}').unwrap_or(xml);

    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    reader.check_end_names(true);

    let mut builder = TreeBuilder::new(options);
    let mut entities = Entities::default();
    loop {
        let event = reader.read_event().map_err(|e| {
            Error::invalid_input_from(
                format!("malformed XML at position {}", reader.buffer_position()),
                e,
            )
        })?;
        match event {
            Event::Decl(decl) => builder.declaration(&decl)?,
            Event::Start(start) => {
                builder.start_element(&start, &entities)?;
            }
            Event::Empty(start) => {
                builder.start_element(&start, &entities)?;
                builder.end_element()?;
            }
            Event::End(_) => builder.end_element()?,
            Event::Text(text) => {
                let text = text
                    .unescape_with(|entity| entities.get(entity))
                    .map_err(|e| Error::invalid_input_from("unable to unescape text", e))?;
                builder.text(&text)?;
            }
            Event::CData(cdata) => {
                let content = utf8(cdata.into_inner().as_ref())?.to_string();
                builder.cdata(&content)?;
            }
            Event::Comment(comment) => {
                let content = utf8(comment.into_inner().as_ref())?.to_string();
                builder.comment(&content)?;
            }
            Event::PI(pi) => {
                let content = utf8(pi.into_inner().as_ref())?.to_string();
                builder.processing_instruction(&content)?;
            }
            Event::DocType(doctype) => {
                let declarations = utf8(doctype.into_inner().as_ref())?.to_string();
                entities.declare_all(&declarations, &options.limits)?;
            }
            Event::Eof => break,
        }
    }
    let doc = builder.finish()?;
    debug!(nodes = doc.node_count(), "parsed document");
    Ok(doc)
}

/// Parse UTF-8 bytes
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Document> {
    options.limits.check_size(bytes.len())?;
    let xml = std::str::from_utf8(bytes)
        .map_err(|e| Error::invalid_input_from("input is not valid UTF-8", e))?;
    parse_str_with(xml, options)
}

/// Read a stream to the end and parse it
pub fn parse_reader<R: Read>(mut reader: R, options: &ParseOptions) -> Result<Document> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::invalid_input_from("Unable to parse from input stream", e))?;
    parse_bytes(&bytes, options)
}

/// Parse a file. A missing file is [`Error::NotFound`].
pub fn parse_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<Document> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| {
        Error::invalid_input_from(format!("unable to open {}", path.display()), e)
    })?;
    parse_reader(BufReader::new(file), options)
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::invalid_input_from("invalid UTF-8 in markup", e))
}

static ENTITY_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!ENTITY\s+([^\s%"'>]+)\s+(?:"([^"]*)"|'([^']*)')\s*>"#)
        .expect("entity declaration pattern is valid")
});

/// Internal general entities declared in the DOCTYPE
#[derive(Debug, Default)]
struct Entities {
    values: HashMap<String, String>,
    expanded_size: usize,
}

impl Entities {
    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Collect `<!ENTITY name "value">` declarations. Parameter and external
    /// entities are ignored. The first declaration of a name wins.
    fn declare_all(&mut self, doctype: &str, limits: &Limits) -> Result<()> {
        for captures in ENTITY_DECLARATION.captures_iter(doctype) {
            let name = &captures[1];
            if self.values.contains_key(name) {
                continue;
            }
            let raw = captures
                .get(2)
                .or_else(|| captures.get(3))
                .map_or("", |m| m.as_str());
            let value = unescape_with(raw, |entity| self.get(entity))
                .map_err(|e| Error::invalid_input_from(format!("malformed value of entity '{}'", name), e))?
                .into_owned();
            self.expanded_size += value.len();
            limits.check_size(self.expanded_size)?;
            debug!(entity = name, len = value.len(), "declared entity");
            self.values.insert(name.to_string(), value);
        }
        Ok(())
    }
}

struct TreeBuilder<'o> {
    doc: Document,
    stack: Vec<NodeId>,
    scope: NamespaceScope,
    options: &'o ParseOptions,
}

impl<'o> TreeBuilder<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        Self {
            doc: Document::with_namespace_awareness(options.namespace_aware),
            stack: Vec::new(),
            scope: NamespaceScope::new(),
            options,
        }
    }

    fn declaration(&mut self, decl: &BytesDecl) -> Result<()> {
        let version = decl
            .version()
            .map_err(|e| Error::invalid_input_from("malformed XML declaration", e))?;
        self.doc.version = Some(utf8(&version)?.to_string());
        if let Some(encoding) = decl.encoding() {
            let encoding =
                encoding.map_err(|e| Error::invalid_input_from("malformed XML declaration", e))?;
            self.doc.encoding = Some(utf8(&encoding)?.to_string());
        }
        if let Some(standalone) = decl.standalone() {
            let standalone =
                standalone.map_err(|e| Error::invalid_input_from("malformed XML declaration", e))?;
            self.doc.standalone = Some(utf8(&standalone)? == "yes");
        }
        Ok(())
    }

    fn attach(&mut self, node: NodeId) -> Result<()> {
        self.options.limits.check_nodes(self.doc.node_count())?;
        let parent = self.stack.last().copied().unwrap_or_else(|| self.doc.root());
        self.doc.append_child(parent, node)?;
        Ok(())
    }

    fn resolve(&self, prefix: &str, name: &str) -> Result<String> {
        self.scope
            .lookup(prefix)
            .map(str::to_string)
            .ok_or_else(|| Error::invalid_input(format!("undeclared namespace prefix in '{}'", name)))
    }

    fn start_element(&mut self, start: &BytesStart, entities: &Entities) -> Result<()> {
        let name = utf8(start.name().as_ref())?.to_string();
        if self.stack.is_empty() && self.doc.document_element().is_some() {
            return Err(Error::invalid_input(format!(
                "document has more than one root element: <{}>",
                name
            )));
        }
        self.options.limits.check_depth(self.stack.len() + 1)?;

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| {
                Error::invalid_input_from(format!("malformed attribute in <{}>", name), e)
            })?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr
                .unescape_value_with(|entity| entities.get(entity))
                .map_err(|e| Error::invalid_input_from(format!("malformed value of '{}'", key), e))?
                .into_owned();
            attributes.push((key, value));
        }
        self.options.limits.check_attributes(attributes.len())?;

        let aware = self.options.namespace_aware;
        let created = if aware {
            self.scope.push();
            for (key, value) in &attributes {
                if key == "xmlns" {
                    self.scope.bind("", value);
                } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                    if value.is_empty() {
                        return Err(Error::invalid_input(format!(
                            "prefix '{}' cannot be bound to an empty namespace",
                            prefix
                        )));
                    }
                    self.scope.bind(prefix, value);
                }
            }
            validate_qname(&name)
                .map_err(|e| Error::invalid_input_from("invalid element name", e))?;
            let namespace = match split_qname(&name).0 {
                Some(prefix) => Some(self.resolve(prefix, &name)?),
                None => self.scope.lookup("").map(str::to_string),
            };
            self.doc.create_element(&name, namespace.as_deref())
        } else {
            self.doc.create_element(&name, None)
        };
        let element = created.map_err(|e| Error::invalid_input_from("invalid element name", e))?;

        for (key, value) in attributes {
            let set = if aware {
                let namespace = if key == "xmlns" || key.starts_with("xmlns:") {
                    Some(NAMESPACE_XMLNS.to_string())
                } else {
                    match split_qname(&key).0 {
                        Some(prefix) => Some(self.resolve(prefix, &key)?),
                        None => None,
                    }
                };
                self.doc
                    .set_attribute_ns(element, namespace.as_deref(), &key, &value)
            } else {
                self.doc.set_attribute(element, &key, &value)
            };
            set.map_err(|e| Error::invalid_input_from("invalid attribute", e))?;
        }

        self.attach(element)?;
        self.stack.push(element);
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        if self.stack.pop().is_none() {
            return Err(Error::invalid_input("unexpected closing tag"));
        }
        if self.options.namespace_aware {
            self.scope.pop();
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if self.stack.is_empty() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(Error::invalid_input(
                "content is not allowed outside of the root element",
            ));
        }
        let node = self.doc.create_text(text);
        self.attach(node)
    }

    fn cdata(&mut self, content: &str) -> Result<()> {
        if self.stack.is_empty() {
            return Err(Error::invalid_input(
                "CDATA is not allowed outside of the root element",
            ));
        }
        let node = self.doc.create_cdata(content);
        self.attach(node)
    }

    fn comment(&mut self, content: &str) -> Result<()> {
        let node = self.doc.create_comment(content);
        self.attach(node)
    }

    fn processing_instruction(&mut self, content: &str) -> Result<()> {
        let (target, data) = match content.find(char::is_whitespace) {
            Some(i) => (&content[..i], content[i..].trim_start()),
            None => (content, ""),
        };
        let node = self
            .doc
            .create_processing_instruction(target, data)
            .map_err(|e| Error::invalid_input_from("invalid processing instruction", e))?;
        self.attach(node)
    }

    fn finish(self) -> Result<Document> {
        if let Some(&open) = self.stack.last() {
            return Err(Error::invalid_input(format!(
                "unexpected end of input, <{}> is not closed",
                self.doc.node_name(open).unwrap_or_default()
            )));
        }
        if self.doc.document_element().is_none() {
            return Err(Error::invalid_input("document has no root element"));
        }
        Ok(self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::NAMESPACE_XML;
    use crate::tree::{NodeKind, NodeType};

    #[test]
    fn test_parse_simple_xml() {
        let doc = parse_str("<root><child>text</child></root>").unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.node_name(root), Some("root"));
        let children = doc.element_children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(doc.text_content(children[0]), "text");
    }

    #[test]
    fn test_parse_with_attributes() {
        let doc = parse_str(r#"<root attr1="value1" attr2="a &amp; b"><child/></root>"#).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.attribute(root, "attr1"), Some("value1"));
        assert_eq!(doc.attribute(root, "attr2"), Some("a & b"));
    }

    #[test]
    fn test_parse_with_namespaces() {
        let xml = r#"<root xmlns="http://example.com" xmlns:p="urn:p"><p:child p:a="1" b="2"/></root>"#;
        let doc = parse_str(xml).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.namespace_uri(root), Some("http://example.com"));
        let decl = doc.attribute_node(root, "xmlns:p").unwrap();
        assert_eq!(doc.namespace_uri(decl), Some(NAMESPACE_XMLNS));

        let child = doc.element_children(root)[0];
        assert_eq!(doc.namespace_uri(child), Some("urn:p"));
        assert_eq!(doc.local_name(child), Some("child"));
        let a = doc.attribute_node(child, "p:a").unwrap();
        assert_eq!(doc.namespace_uri(a), Some("urn:p"));
        let b = doc.attribute_node(child, "b").unwrap();
        assert_eq!(doc.namespace_uri(b), None);
    }

    #[test]
    fn test_xml_prefix_is_predeclared() {
        let doc = parse_str(r#"<root xml:lang="en"/>"#).unwrap();
        let root = doc.document_element().unwrap();
        let lang = doc.attribute_node(root, "xml:lang").unwrap();
        assert_eq!(doc.namespace_uri(lang), Some(NAMESPACE_XML));
    }

    #[test]
    fn test_undeclared_prefix() {
        let err = parse_str("<p:root/>").unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let options = ParseOptions::new().namespace_aware(false);
        let doc = parse_str_with("<p:root/>", &options).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.node_name(root), Some("p:root"));
        assert_eq!(doc.namespace_uri(root), None);
    }

    #[test]
    fn test_namespace_unaware_keeps_names() {
        let options = ParseOptions::new().namespace_aware(false);
        let doc = parse_str_with(r#"<a:root xmlns:a="urn:a"><a:x/></a:root>"#, &options).unwrap();
        let root = doc.document_element().unwrap();
        assert!(!doc.is_namespace_aware());
        assert_eq!(doc.namespace_uri(root), None);
        let decl = doc.attribute_node(root, "xmlns:a").unwrap();
        assert_eq!(doc.namespace_uri(decl), None);
    }

    #[test]
    fn test_preserves_comments_cdata_and_pis() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                   <!-- top --><root><![CDATA[<raw>]]><?target some data?></root>";
        let doc = parse_str(xml).unwrap();
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(doc.standalone, Some(true));

        let top = doc.children(doc.root());
        assert_eq!(doc.node_type(top[0]), Some(NodeType::Comment));

        let root = doc.document_element().unwrap();
        let children = doc.children(root);
        assert_eq!(doc.kind(children[0]), Some(&NodeKind::CData("<raw>".to_string())));
        assert_eq!(
            doc.kind(children[1]),
            Some(&NodeKind::ProcessingInstruction {
                target: "target".to_string(),
                data: "some data".to_string()
            })
        );
    }

    #[test]
    fn test_malformed_input() {
        for xml in [
            "no xml content",
            "",
            "<root>",
            "<root></other>",
            "<a/><b/>",
            "<root/>trailing",
            "<root>&undefined;</root>",
        ] {
            let result = parse_str(xml);
            assert!(
                matches!(result, Err(Error::InvalidInput { .. })),
                "expected invalid input for {:?}",
                xml
            );
        }
    }

    #[test]
    fn test_internal_entities_are_expanded() {
        let doc = parse_str(
            r#"<!DOCTYPE r [
                <!ENTITY e "v">
                <!ENTITY who 'the &e; &amp; co'>
            ]><r title="&who;">&e;&lt;&e;</r>"#,
        )
        .unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.text_content(root), "v<v");
        assert_eq!(doc.attribute(root, "title"), Some("the v & co"));
    }

    #[test]
    fn test_undeclared_entity_with_doctype() {
        let result = parse_str(r#"<!DOCTYPE r [<!ENTITY e "v">]><r>&other;</r>"#);
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_entity_expansion_is_limited() {
        let options = ParseOptions::new().limits(Limits {
            max_size: 200,
            ..Limits::default()
        });
        let xml = concat!(
            r#"<!DOCTYPE r [<!ENTITY a "aaaaaaaaaaaaaaaa">"#,
            r#"<!ENTITY b "&a;&a;&a;&a;"><!ENTITY c "&b;&b;&b;&b;">]>"#,
            "<r>&c;</r>",
        );
        assert!(xml.len() < 200);
        assert!(matches!(parse_str_with(xml, &options), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_invalid_utf8() {
        let result = parse_bytes(b"<root>\xff</root>", &ParseOptions::default());
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let options = ParseOptions::new().limits(Limits {
            max_depth: 2,
            ..Limits::default()
        });
        assert!(parse_str_with("<a><b/></a>", &options).is_ok());
        let result = parse_str_with("<a><b><c/></b></a>", &options);
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = parse_file("path/to/nonexistent.xml", &ParseOptions::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_parse_reader() {
        let doc = parse_reader("<root>x</root>".as_bytes(), &ParseOptions::default()).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.text_content(root), "x");
    }
}
