//! Stateless DOM helpers
//!
//! Free functions over [`Document`] covering parsing, construction, structural
//! edits, XPath queries, serialization and validation. Most of them are thin
//! wrappers over the tree, XPath, serializer and schema layers. The exception
//! is [`insert_element`], which places a new child according to a
//! caller-supplied order of element names.
//!
//! Every query takes a slice of namespace resolvers. At most one may be
//! given; more than one is a [`Error::Configuration`].
//!
//! # Examples
//!
//! ```
//! use xmldom::dom;
//!
//! let mut doc = dom::parse("<root><a/><c/></root>").unwrap();
//! let root = doc.document_element().unwrap();
//! let b = dom::create_element(&mut doc, "b", None).unwrap();
//! dom::insert_element(&mut doc, root, b, &["a", "b", "c"]).unwrap();
//!
//! assert_eq!(
//!     dom::as_xml_with(&doc, root, &xmldom::OutputOptions::new().omit_declaration(true)).unwrap(),
//!     "<root><a/><b/><c/></root>"
//! );
//! ```

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, instrument, trace};

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceResolver, NAMESPACE_ALIAS_XMLNS, NAMESPACE_XMLNS};
use crate::parser::{self, ParseOptions};
use crate::serial::{self, OutputOptions};
use crate::tree::{Document, NodeId, NodeKind, NodeType};
use crate::validators::Schema;
use crate::xpath::{XPath, XPathValue};

// ----------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------

/// Parse a string, namespace-aware
pub fn parse(xml: &str) -> Result<Document> {
    parse_with(xml, true)
}

/// Parse a string with the given namespace awareness
pub fn parse_with(xml: &str, namespace_aware: bool) -> Result<Document> {
    parser::parse_str_with(xml, &options(namespace_aware))
}

/// Parse UTF-8 bytes
pub fn parse_bytes(bytes: &[u8], namespace_aware: bool) -> Result<Document> {
    parser::parse_bytes(bytes, &options(namespace_aware))
}

/// Read a stream to the end and parse it
pub fn parse_reader<R: Read>(reader: R, namespace_aware: bool) -> Result<Document> {
    parser::parse_reader(reader, &options(namespace_aware))
}

/// Parse a file, namespace-aware. A missing file is [`Error::NotFound`].
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    parse_file_with(path, true)
}

/// Parse a file with the given namespace awareness
pub fn parse_file_with<P: AsRef<Path>>(path: P, namespace_aware: bool) -> Result<Document> {
    parser::parse_file(path, &options(namespace_aware))
}

fn options(namespace_aware: bool) -> ParseOptions {
    ParseOptions::new().namespace_aware(namespace_aware)
}

// ----------------------------------------------------------------------
// Construction
// ----------------------------------------------------------------------

/// An empty, namespace-aware document
pub fn create_document() -> Document {
    Document::new()
}

/// A document with a single root element. A blank namespace means none.
pub fn create_document_with_root(name: &str, namespace: Option<&str>) -> Result<Document> {
    let mut doc = Document::new();
    let root = doc.create_element(name, namespace)?;
    doc.append_child(doc.root(), root)?;
    Ok(doc)
}

/// A new document whose root element is a copy of `node` from `source`
pub fn create_document_from(source: &Document, node: NodeId) -> Result<Document> {
    let node = match source.node_type(node) {
        Some(NodeType::Document) => source
            .document_element()
            .ok_or_else(|| Error::InvalidArgument("source document has no document element".to_string()))?,
        _ => node,
    };
    let mut doc = Document::with_namespace_awareness(source.is_namespace_aware());
    let copy = doc.import_node(source, node)?;
    doc.append_child(doc.root(), copy)?;
    Ok(doc)
}

/// Create a detached element. A blank namespace means none.
pub fn create_element(doc: &mut Document, name: &str, namespace: Option<&str>) -> Result<NodeId> {
    doc.create_element(name, namespace)
}

// ----------------------------------------------------------------------
// Structural edits
// ----------------------------------------------------------------------

/// Append `child` as the last child of `parent`, moving it if attached.
/// Mixing namespaced and un-namespaced elements is rejected.
pub fn append_element(doc: &mut Document, parent: NodeId, child: NodeId) -> Result<NodeId> {
    enforce_no_namespace_mixes(doc, parent, child)?;
    doc.append_child(parent, child)
}

/// Append a copy of `child` from another document
pub fn append_element_from(doc: &mut Document, parent: NodeId, source: &Document, child: NodeId) -> Result<NodeId> {
    let copy = doc.import_node(source, child)?;
    append_element(doc, parent, copy)
}

/// Insert `element` under `parent`, keeping the element children in the
/// order given by `order`
///
/// The new element goes before the first element child whose name is not
/// a predecessor of its own name (see [`select_predecessors`]), or last when
/// there is no such child.
#[instrument(level = "trace", skip(doc, order))]
pub fn insert_element(doc: &mut Document, parent: NodeId, element: NodeId, order: &[&str]) -> Result<NodeId> {
    let name = doc
        .node_name(element)
        .ok_or_else(Error::unknown_node)?
        .to_string();
    match select_successor_element_from_order(doc, parent, order, &name) {
        Some(successor) => {
            trace!(element = %name, successor = doc.node_name(successor), "inserting before successor");
            insert_element_before(doc, successor, element)
        }
        None => {
            trace!(element = %name, "no successor, appending");
            append_element(doc, parent, element)
        }
    }
}

/// Names in `order` up to and including `name`; all of `order` when `name`
/// is not part of it
pub fn select_predecessors<'a>(order: &[&'a str], name: &str) -> HashSet<&'a str> {
    let mut predecessors = HashSet::new();
    for &candidate in order {
        predecessors.insert(candidate);
        if candidate == name {
            break;
        }
    }
    predecessors
}

/// First element child of `parent` whose name is not a predecessor of `name`
pub fn select_successor_element_from_order(
    doc: &Document,
    parent: NodeId,
    order: &[&str],
    name: &str,
) -> Option<NodeId> {
    let predecessors = select_predecessors(order, name);
    select_children(doc, parent)
        .into_iter()
        .find(|&child| !doc.node_name(child).is_some_and(|n| predecessors.contains(n)))
}

/// Insert `child` before the first element child of `parent`
pub fn insert_element_as_first(doc: &mut Document, parent: NodeId, child: NodeId) -> Result<NodeId> {
    match select_children(doc, parent).first() {
        Some(&first) => insert_element_before(doc, first, child),
        None => doc.append_child(parent, child),
    }
}

/// Insert `element` immediately before `node`
pub fn insert_element_before(doc: &mut Document, node: NodeId, element: NodeId) -> Result<NodeId> {
    let parent = parent_of(doc, node)?;
    enforce_no_namespace_mixes(doc, parent, element)?;
    doc.insert_before(node, element)
}

/// Insert `element` before the next element sibling of `node`, or last
pub fn insert_element_after(doc: &mut Document, node: NodeId, element: NodeId) -> Result<NodeId> {
    let parent = parent_of(doc, node)?;
    enforce_no_namespace_mixes(doc, parent, element)?;
    match select_element_after(doc, node) {
        Some(sibling) => doc.insert_before(sibling, element),
        None => doc.append_child(parent, element),
    }
}

fn parent_of(doc: &Document, node: NodeId) -> Result<NodeId> {
    doc.parent(node)
        .ok_or_else(|| Error::Hierarchy("node has no parent".to_string()))
}

/// Closest preceding element sibling
pub fn select_element_before(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut sibling = doc.previous_sibling(node);
    while let Some(current) = sibling {
        if is_element(doc, current) {
            return Some(current);
        }
        sibling = doc.previous_sibling(current);
    }
    None
}

/// Closest following element sibling
pub fn select_element_after(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut sibling = doc.next_sibling(node);
    while let Some(current) = sibling {
        if is_element(doc, current) {
            return Some(current);
        }
        sibling = doc.next_sibling(current);
    }
    None
}

/// Append `element` under `parent` and move every previous child of
/// `parent` into it
pub fn squeeze_in_element(doc: &mut Document, parent: NodeId, element: NodeId) -> Result<NodeId> {
    let previous: Vec<NodeId> = doc
        .children(parent)
        .iter()
        .copied()
        .filter(|&child| child != element)
        .collect();
    append_element(doc, parent, element)?;
    for child in previous {
        doc.append_child(element, child)?;
    }
    Ok(element)
}

/// Remove a node and its subtree
pub fn delete(doc: &mut Document, node: NodeId) -> Result<()> {
    doc.remove(node)
}

/// Remove every node in `nodes`. Nodes already removed with an ancestor are skipped.
pub fn delete_all(doc: &mut Document, nodes: &[NodeId]) -> Result<()> {
    for &node in nodes {
        if doc.contains(node) {
            doc.remove(node)?;
        }
    }
    Ok(())
}

/// Remove every node matched by `xpath` from `node`, returning how many
/// matches there were
pub fn delete_matching(
    doc: &mut Document,
    node: NodeId,
    xpath: &str,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<usize> {
    let nodes = select_nodes(doc, node, xpath, namespaces)?;
    delete_all(doc, &nodes)?;
    Ok(nodes.len())
}

/// Rename an element or attribute, keeping its namespace
pub fn rename_node(doc: &mut Document, node: NodeId, name: &str) -> Result<NodeId> {
    let namespace = doc.namespace_uri(node).map(str::to_string);
    doc.rename(node, namespace.as_deref(), name)?;
    Ok(node)
}

/// Rename an element or attribute and set its namespace
pub fn rename_node_ns(doc: &mut Document, node: NodeId, namespace: Option<&str>, name: &str) -> Result<NodeId> {
    doc.rename(node, namespace, name)?;
    Ok(node)
}

/// Rename `node` and every descendant element whose name equals `from`,
/// ignoring case
pub fn rename_all(doc: &mut Document, node: NodeId, from: &str, to: &str) -> Result<()> {
    let from = from.to_lowercase();
    let mut targets = vec![node];
    targets.extend(doc.descendants(node));
    for target in targets {
        let matches = is_element(doc, target) && doc.node_name(target).is_some_and(|n| n.to_lowercase() == from);
        if matches {
            rename_node(doc, target, to)?;
        }
    }
    Ok(())
}

/// Copy of `element` as the root of a new document, made by serializing
/// and parsing again
pub fn clone_element(doc: &Document, element: NodeId) -> Result<Document> {
    parse_with(&as_xml(doc, element)?, doc.is_namespace_aware())
}

/// Copy of a whole document, made by serializing and parsing again
pub fn clone_document(doc: &Document) -> Result<Document> {
    parse_with(&as_xml(doc, doc.root())?, doc.is_namespace_aware())
}

/// Set every attribute of `source` on `dest`
pub fn copy_attributes(doc: &mut Document, source: NodeId, dest: NodeId) -> Result<NodeId> {
    let attributes: Vec<(String, Option<String>, String)> = doc
        .attributes(source)
        .iter()
        .filter_map(|&attribute| match doc.kind(attribute) {
            Some(NodeKind::Attribute { name, namespace, value }) => Some((name.clone(), namespace.clone(), value.clone())),
            _ => None,
        })
        .collect();
    for (name, namespace, value) in attributes {
        match namespace {
            Some(namespace) => doc.set_attribute_ns(dest, Some(&namespace), &name, &value)?,
            None => doc.set_attribute(dest, &name, &value)?,
        };
    }
    Ok(dest)
}

/// Append a copy of every element child of `source` to `dest`
pub fn copy_children(doc: &mut Document, source: NodeId, dest: NodeId) -> Result<NodeId> {
    for child in select_children(doc, source) {
        let copy = doc.deep_copy(child)?;
        append_element(doc, dest, copy)?;
    }
    Ok(dest)
}

/// Append a text node, returning it
pub fn append_text(doc: &mut Document, element: NodeId, text: &str) -> Result<NodeId> {
    let node = doc.create_text(text);
    doc.append_child(element, node)
}

/// Append a text node, returning the parent
pub fn append_text_node(doc: &mut Document, parent: NodeId, text: &str) -> Result<NodeId> {
    append_text(doc, parent, text)?;
    Ok(parent)
}

/// Append a CDATA section, returning it
pub fn append_cdata(doc: &mut Document, element: NodeId, content: &str) -> Result<NodeId> {
    let node = doc.create_cdata(content);
    doc.append_child(element, node)
}

/// Append a comment, returning it
pub fn append_comment(doc: &mut Document, element: NodeId, comment: &str) -> Result<NodeId> {
    let node = doc.create_comment(comment);
    doc.append_child(element, node)
}

/// Declare `xmlns:alias="uri"` on `element`
pub fn add_namespace(doc: &mut Document, element: NodeId, alias: &str, uri: &str) -> Result<NodeId> {
    doc.set_attribute_ns(
        element,
        Some(NAMESPACE_XMLNS),
        &format!("{}:{}", NAMESPACE_ALIAS_XMLNS, alias),
        uri,
    )?;
    Ok(element)
}

/// Declare `alias` on `element` with the URI `resolver` binds it to
pub fn add_namespace_from(
    doc: &mut Document,
    element: NodeId,
    alias: &str,
    resolver: &dyn NamespaceResolver,
) -> Result<NodeId> {
    let uri = resolver
        .namespace_uri(alias)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown namespace alias '{}'", alias)))?
        .to_string();
    add_namespace(doc, element, alias, &uri)
}

/// Deep copy of `node` from `source` into `dest`, detached
pub fn import_node(dest: &mut Document, source: &Document, node: NodeId) -> Result<NodeId> {
    dest.import_node(source, node)
}

// ----------------------------------------------------------------------
// Inspection
// ----------------------------------------------------------------------

/// First element child named `name`
pub fn select_child(doc: &Document, parent: NodeId, name: &str) -> Option<NodeId> {
    select_children_named(doc, parent, name).into_iter().next()
}

/// Element children named `name`
pub fn select_children_named(doc: &Document, parent: NodeId, name: &str) -> Vec<NodeId> {
    select_children(doc, parent)
        .into_iter()
        .filter(|&child| doc.node_name(child) == Some(name))
        .collect()
}

/// Element children
pub fn select_children(doc: &Document, parent: NodeId) -> Vec<NodeId> {
    children(doc, parent, NodeType::Element)
}

/// Children of the given type
pub fn children(doc: &Document, parent: NodeId, node_type: NodeType) -> Vec<NodeId> {
    doc.children(parent)
        .iter()
        .copied()
        .filter(|&child| is_type(doc, child, node_type))
        .collect()
}

/// All child nodes
pub fn select_child_nodes(doc: &Document, node: NodeId) -> Vec<NodeId> {
    doc.children(node).to_vec()
}

/// Fail unless `node` is named `name`
pub fn enforce_node_name(doc: &Document, node: NodeId, name: &str) -> Result<()> {
    if is_node_name(doc, node, name) {
        return Ok(());
    }
    Err(Error::InvalidArgument(format!(
        "Expecting node of type \"{}\" - got \"{}\"",
        name,
        doc.node_name(node).unwrap_or_default()
    )))
}

/// Fail when one node has a namespace and the other has none. The document
/// node accepts both.
pub fn enforce_no_namespace_mixes(doc: &Document, first: NodeId, second: NodeId) -> Result<()> {
    if is_document(doc, first) || is_document(doc, second) {
        return Ok(());
    }
    let blank = |node| doc.namespace_uri(node).map_or(true, |ns| ns.trim().is_empty());
    if blank(first) != blank(second) {
        return Err(Error::InvalidArgument(
            "Mixing non-namespaces-aware node with namespace-aware node not allowed".to_string(),
        ));
    }
    Ok(())
}

/// Check a node's qualified name
pub fn is_node_name(doc: &Document, node: NodeId, name: &str) -> bool {
    doc.node_name(node) == Some(name)
}

/// Check for an attribute by qualified name
pub fn node_has_attribute(doc: &Document, node: NodeId, name: &str) -> bool {
    doc.attribute_node(node, name).is_some()
}

/// Qualified names of the attributes of `node`, in document order
pub fn attribute_names(doc: &Document, node: NodeId) -> Vec<&str> {
    doc.attributes(node)
        .iter()
        .filter_map(|&attribute| doc.node_name(attribute))
        .collect()
}

/// Attribute value by qualified name
pub fn get_attribute<'d>(doc: &'d Document, node: NodeId, name: &str) -> Option<&'d str> {
    doc.attribute(node, name)
}

/// Set an attribute by qualified name
pub fn set_attribute(doc: &mut Document, node: NodeId, name: &str, value: &str) -> Result<()> {
    doc.set_attribute(node, name, value)?;
    Ok(())
}

/// Check if a node has a namespace URI
pub fn has_namespace(doc: &Document, node: NodeId) -> bool {
    doc.namespace_uri(node).is_some()
}

/// Check if a node is an element
pub fn is_element(doc: &Document, node: NodeId) -> bool {
    is_type(doc, node, NodeType::Element)
}

/// Check if a node is a text node
pub fn is_text(doc: &Document, node: NodeId) -> bool {
    is_type(doc, node, NodeType::Text)
}

/// Check if a node is an attribute
pub fn is_attribute(doc: &Document, node: NodeId) -> bool {
    is_type(doc, node, NodeType::Attribute)
}

/// Check if a node is a CDATA section
pub fn is_cdata(doc: &Document, node: NodeId) -> bool {
    is_type(doc, node, NodeType::CData)
}

/// Check if a node is a comment
pub fn is_comment(doc: &Document, node: NodeId) -> bool {
    is_type(doc, node, NodeType::Comment)
}

/// Check if a node is the document node
pub fn is_document(doc: &Document, node: NodeId) -> bool {
    is_type(doc, node, NodeType::Document)
}

/// Check a node's type. Freed nodes have no type.
pub fn is_type(doc: &Document, node: NodeId, node_type: NodeType) -> bool {
    doc.node_type(node) == Some(node_type)
}

/// Namespace URI bound to `prefix` (or the default namespace for `None`) in
/// scope at `node`
pub fn lookup_namespace_uri(doc: &Document, node: NodeId, prefix: Option<&str>) -> Option<String> {
    doc.lookup_namespace_uri(node, prefix)
}

// ----------------------------------------------------------------------
// Queries
// ----------------------------------------------------------------------

fn resolver<'a>(namespaces: &[&'a dyn NamespaceResolver]) -> Result<Option<&'a dyn NamespaceResolver>> {
    match namespaces {
        [] => Ok(None),
        [resolver] => Ok(Some(*resolver)),
        _ => Err(Error::Configuration(
            "Number of NamespaceContext must not exceed 1".to_string(),
        )),
    }
}

/// Compile `xpath` against at most one namespace resolver
pub fn create_xpath_expression(xpath: &str, namespaces: &[&dyn NamespaceResolver]) -> Result<XPath> {
    Ok(XPath::compile_with(xpath, resolver(namespaces)?)?)
}

/// Evaluate `xpath` with `node` as the context node
pub fn evaluate_xpath(
    doc: &Document,
    node: NodeId,
    xpath: &str,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<XPathValue> {
    let compiled = create_xpath_expression(xpath, namespaces)?;
    evaluate_compiled(doc, node, &compiled)
}

fn evaluate_compiled(doc: &Document, node: NodeId, xpath: &XPath) -> Result<XPathValue> {
    xpath
        .evaluate(doc, node)
        .map_err(|e| e.with_node(doc.node_name(node).unwrap_or_default()).into())
}

/// Nodes matched by `xpath`, in document order
pub fn select_nodes(
    doc: &Document,
    node: NodeId,
    xpath: &str,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<Vec<NodeId>> {
    let compiled = create_xpath_expression(xpath, namespaces)?;
    select_nodes_compiled(doc, node, &compiled)
}

/// Nodes matched by a compiled expression
pub fn select_nodes_compiled(doc: &Document, node: NodeId, xpath: &XPath) -> Result<Vec<NodeId>> {
    xpath
        .select_nodes(doc, node)
        .map_err(|e| e.with_node(doc.node_name(node).unwrap_or_default()).into())
}

/// The node matched by `xpath`, if any. Several matches are an
/// [`Error::Cardinality`].
pub fn select_node(
    doc: &Document,
    node: NodeId,
    xpath: &str,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<Option<NodeId>> {
    let compiled = create_xpath_expression(xpath, namespaces)?;
    select_node_compiled(doc, node, &compiled)
}

/// The node matched by a compiled expression, if any
pub fn select_node_compiled(doc: &Document, node: NodeId, xpath: &XPath) -> Result<Option<NodeId>> {
    let nodes = select_nodes_compiled(doc, node, xpath)?;
    match nodes.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(*single)),
        _ => Err(Error::Cardinality {
            expression: xpath.expression().to_string(),
            size: nodes.len(),
        }),
    }
}

/// Check if `xpath` matches at least one node
pub fn exists(doc: &Document, node: NodeId, xpath: &str, namespaces: &[&dyn NamespaceResolver]) -> Result<bool> {
    Ok(!select_nodes(doc, node, xpath, namespaces)?.is_empty())
}

/// Text content of every node matched by `xpath`
pub fn select_strings(
    doc: &Document,
    node: NodeId,
    xpath: &str,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<Vec<String>> {
    iterate(doc, node, xpath, |doc, n| Some(doc.text_content(n)), namespaces)
}

/// String value of `xpath`; empty when nothing matches
pub fn select_string(doc: &Document, node: NodeId, xpath: &str, namespaces: &[&dyn NamespaceResolver]) -> Result<String> {
    let value = evaluate_xpath(doc, node, xpath, namespaces)?;
    Ok(value.to_string_value(doc))
}

/// String value of `xpath` as an integer, 0 when it is not one
pub fn select_integer(doc: &Document, node: NodeId, xpath: &str, namespaces: &[&dyn NamespaceResolver]) -> Result<i64> {
    select_integer_or(doc, node, xpath, 0, namespaces)
}

/// String value of `xpath` as an integer, `default` when it is not one
pub fn select_integer_or(
    doc: &Document,
    node: NodeId,
    xpath: &str,
    default: i64,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<i64> {
    let value = select_string(doc, node, xpath, namespaces)?;
    Ok(value.trim().parse().unwrap_or(default))
}

/// Boolean value of `xpath`
pub fn select_boolean(doc: &Document, node: NodeId, xpath: &str, namespaces: &[&dyn NamespaceResolver]) -> Result<bool> {
    Ok(evaluate_xpath(doc, node, xpath, namespaces)?.is_truthy())
}

/// Number value of `xpath`; NaN when it is not a number
pub fn select_number(doc: &Document, node: NodeId, xpath: &str, namespaces: &[&dyn NamespaceResolver]) -> Result<f64> {
    Ok(evaluate_xpath(doc, node, xpath, namespaces)?.to_number(doc))
}

/// Apply `processor` to every node matched by `xpath`, collecting the
/// `Some` results
pub fn iterate<T, F>(
    doc: &Document,
    node: NodeId,
    xpath: &str,
    mut processor: F,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<Vec<T>>
where
    F: FnMut(&Document, NodeId) -> Option<T>,
{
    let nodes = select_nodes(doc, node, xpath, namespaces)?;
    Ok(nodes.into_iter().filter_map(|n| processor(doc, n)).collect())
}

/// Apply `processor` to every node matched by `xpath`, threading `param`
/// through, and return it
pub fn iterate_with<T, F>(
    doc: &Document,
    node: NodeId,
    xpath: &str,
    mut processor: F,
    mut param: T,
    namespaces: &[&dyn NamespaceResolver],
) -> Result<T>
where
    F: FnMut(&Document, NodeId, &mut T),
{
    for n in select_nodes(doc, node, xpath, namespaces)? {
        processor(doc, n, &mut param);
    }
    Ok(param)
}

// ----------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------

/// Serialize with the default options (declaration, no indentation)
pub fn as_xml(doc: &Document, node: NodeId) -> Result<String> {
    as_xml_with(doc, node, &OutputOptions::default())
}

/// Serialize, optionally indented by 4 spaces
pub fn as_xml_indented(doc: &Document, node: NodeId, indent: bool) -> Result<String> {
    as_xml_with(doc, node, &OutputOptions::new().indent(indent))
}

/// Serialize with explicit options
pub fn as_xml_with(doc: &Document, node: NodeId, options: &OutputOptions) -> Result<String> {
    serial::to_string(doc, node, options)
}

/// Serialize into a writer
pub fn write<W: Write>(doc: &Document, node: NodeId, writer: W, options: &OutputOptions) -> Result<()> {
    serial::write(doc, node, writer, options)
}

/// The XML declaration `options` would produce
pub fn xml_declaration(options: &OutputOptions) -> String {
    serial::xml_declaration(options)
}

/// Print `node` indented to stdout
pub fn dump(doc: &Document, node: NodeId) -> Result<()> {
    println!("{}", as_xml_indented(doc, node, true)?);
    Ok(())
}

// ----------------------------------------------------------------------
// Validation
// ----------------------------------------------------------------------

/// Check a document against a schema. The reason for a failure is logged
/// at debug level and otherwise dropped; use [`Schema::validate`] to get it.
#[instrument(level = "debug", skip_all, fields(document = doc.id()))]
pub fn validate(doc: &Document, schema: &Schema) -> bool {
    schema.is_valid(doc)
}

/// Parse `xml` and check it against a schema. Malformed input is invalid.
#[instrument(level = "debug", skip_all)]
pub fn validate_str(xml: &str, schema: &Schema) -> bool {
    match parse(xml) {
        Ok(doc) => schema.is_valid(&doc),
        Err(error) => {
            debug!(%error, "input is not well-formed");
            false
        }
    }
}
