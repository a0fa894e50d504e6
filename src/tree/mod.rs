//! Arena-based mutable XML document tree.
//!
//! All nodes of a document live in a generational arena owned by the
//! [`Document`] and are addressed by [`NodeId`], a copyable handle. Navigation
//! goes through `&Document`, mutation through `&mut Document`.
//!
//! A node has at most one parent. Appending or inserting a node that is already
//! attached moves it. Removing a node frees it and its subtree; handles to freed
//! nodes resolve to nothing and are never recycled for other nodes. A handle
//! used with a document other than its own resolves to nothing as well; use
//! [`Document::import_node`] to copy nodes across documents.
//!
//! Attributes are nodes too. Their parent is the owner element, but they are
//! not part of the element's children.

mod node;

pub use node::{NodeKind, NodeType};

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use generational_arena::{Arena, Index};
use tracing::{instrument, trace};

use crate::error::{Error, Result};
use crate::names::{split_qname, validate_name, validate_qname};
use crate::namespaces::{NAMESPACE_XML, NAMESPACE_XMLNS};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a node inside a [`Document`].
///
/// A handle remembers the document that created it. Other documents treat it
/// as unknown rather than resolving it to one of their own nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    document: u64,
    index: Index,
}

impl NodeId {
    fn rebind(self, document: u64) -> Self {
        Self { document, ..self }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    fn rebind(&mut self, document: u64) {
        self.parent = self.parent.map(|p| p.rebind(document));
        for child in &mut self.children {
            *child = child.rebind(document);
        }
        if let NodeKind::Element { attributes, .. } = &mut self.kind {
            for attribute in attributes {
                *attribute = attribute.rebind(document);
            }
        }
    }
}

/// Owned copy of a subtree, used to copy nodes within and across documents.
struct Snapshot {
    kind: NodeKind,
    attributes: Vec<NodeKind>,
    children: Vec<Snapshot>,
}

/// An XML document.
///
/// # Examples
///
/// ```
/// use xmldom::Document;
///
/// let mut doc = Document::new();
/// let root = doc.create_element("root", None).unwrap();
/// doc.append_child(doc.root(), root).unwrap();
/// let child = doc.create_element("child", None).unwrap();
/// doc.append_child(root, child).unwrap();
///
/// assert_eq!(doc.document_element(), Some(root));
/// assert_eq!(doc.node_name(child), Some("child"));
/// ```
#[derive(Debug)]
pub struct Document {
    id: u64,
    nodes: Arena<NodeData>,
    root: NodeId,
    namespace_aware: bool,
    /// XML version from the XML declaration
    pub version: Option<String>,
    /// Encoding from the XML declaration
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration
    pub standalone: Option<bool>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Document {
    fn clone(&self) -> Self {
        let id = NEXT_DOCUMENT_ID.fetch_add(1, AtomicOrdering::Relaxed);
        let mut nodes = self.nodes.clone();
        for (_, data) in nodes.iter_mut() {
            data.rebind(id);
        }
        Self {
            id,
            nodes,
            root: self.root.rebind(id),
            namespace_aware: self.namespace_aware,
            version: self.version.clone(),
            encoding: self.encoding.clone(),
            standalone: self.standalone,
        }
    }
}

impl Document {
    /// Create an empty, namespace-aware document
    pub fn new() -> Self {
        Self::with_namespace_awareness(true)
    }

    /// Create an empty document with the given namespace awareness
    pub fn with_namespace_awareness(namespace_aware: bool) -> Self {
        let id = NEXT_DOCUMENT_ID.fetch_add(1, AtomicOrdering::Relaxed);
        let mut nodes = Arena::new();
        let root = NodeId {
            document: id,
            index: nodes.insert(NodeData::new(NodeKind::Document)),
        };
        Self {
            id,
            nodes,
            root,
            namespace_aware,
            version: None,
            encoding: None,
            standalone: None,
        }
    }

    /// Process-unique identity of this document
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether prefixed names were resolved to namespaces when this document was built
    pub fn is_namespace_aware(&self) -> bool {
        self.namespace_aware
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The single element child of the document node
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.node_type(c) == Some(NodeType::Element))
    }

    /// Number of live nodes, the document node included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True if `id` is a live node of this document
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    fn get(&self, id: NodeId) -> Option<&NodeData> {
        if id.document != self.id {
            return None;
        }
        self.nodes.get(id.index)
    }

    fn data(&self, id: NodeId) -> Result<&NodeData> {
        self.get(id).ok_or_else(Error::unknown_node)
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        if id.document != self.id {
            return Err(Error::unknown_node());
        }
        self.nodes.get_mut(id.index).ok_or_else(Error::unknown_node)
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Kind and payload of a node
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    /// Node type of a node
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.kind(id).map(NodeKind::node_type)
    }

    /// DOM node name: the qualified name for elements and attributes, the
    /// target for processing instructions, `#text`-style names otherwise.
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.kind(id).map(|kind| match kind {
            NodeKind::Document => "#document",
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => name.as_str(),
            NodeKind::Text(_) => "#text",
            NodeKind::CData(_) => "#cdata-section",
            NodeKind::Comment(_) => "#comment",
            NodeKind::ProcessingInstruction { target, .. } => target.as_str(),
        })
    }

    /// Local part of an element or attribute name
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => {
                Some(split_qname(name).1)
            }
            _ => None,
        }
    }

    /// Prefix of an element or attribute name
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => split_qname(name).0,
            _ => None,
        }
    }

    /// Namespace URI of an element or attribute
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { namespace, .. } | NodeKind::Attribute { namespace, .. } => {
                namespace.as_deref()
            }
            _ => None,
        }
    }

    /// Parent node. For attributes this is the owner element.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Child nodes in document order (attributes excluded)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Element children in document order
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.node_type(c) == Some(NodeType::Element))
            .collect()
    }

    /// First child node
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// Last child node
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    fn sibling_position(&self, id: NodeId) -> Option<(NodeId, usize)> {
        if self.node_type(id)? == NodeType::Attribute {
            return None;
        }
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|&c| c == id)?;
        Some((parent, index))
    }

    /// Sibling immediately before `id`
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_position(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Sibling immediately after `id`
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_position(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Ancestors from the parent upwards
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    /// Descendants in document order, `id` itself and attributes excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            result.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        result
    }

    /// True if `ancestor` is a strict ancestor of `node`
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Attribute nodes of an element
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            Some(NodeKind::Element { attributes, .. }) => attributes.as_slice(),
            _ => &[],
        }
    }

    /// Attribute node by qualified name
    pub fn attribute_node(&self, element: NodeId, name: &str) -> Option<NodeId> {
        self.attributes(element)
            .iter()
            .copied()
            .find(|&a| self.node_name(a) == Some(name))
    }

    /// Attribute node by namespace and local name
    pub fn attribute_node_ns(
        &self,
        element: NodeId,
        namespace: Option<&str>,
        local_name: &str,
    ) -> Option<NodeId> {
        self.attributes(element).iter().copied().find(|&a| {
            self.namespace_uri(a) == namespace && self.local_name(a) == Some(local_name)
        })
    }

    /// Attribute value by qualified name
    pub fn attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        self.attribute_node(element, name)
            .and_then(|a| self.node_value(a))
    }

    /// DOM node value: attribute value, character data, comment or PI data
    pub fn node_value(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Attribute { value, .. } => Some(value),
            NodeKind::Text(s) | NodeKind::CData(s) | NodeKind::Comment(s) => Some(s),
            NodeKind::ProcessingInstruction { data, .. } => Some(data),
            NodeKind::Document | NodeKind::Element { .. } => None,
        }
    }

    /// Concatenated character data of all descendant text and CDATA nodes,
    /// or the node's own value for leaf nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Element { .. }) | Some(NodeKind::Document) => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| self.kind(d).and_then(NodeKind::character_data))
                .collect(),
            Some(_) => self.node_value(id).unwrap_or_default().to_string(),
            None => String::new(),
        }
    }

    /// Namespace URI bound to `prefix` (None = default namespace) at `id`,
    /// looking at element names and `xmlns` declarations up the ancestor chain.
    pub fn lookup_namespace_uri(&self, id: NodeId, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xml") {
            return Some(NAMESPACE_XML.to_string());
        }
        let start = match self.node_type(id)? {
            NodeType::Attribute | NodeType::Text | NodeType::CData | NodeType::Comment
            | NodeType::ProcessingInstruction => self.parent(id)?,
            NodeType::Document => self.document_element()?,
            NodeType::Element => id,
        };
        let declaration = match prefix {
            Some(p) => format!("xmlns:{}", p),
            None => "xmlns".to_string(),
        };
        let mut current = Some(start);
        while let Some(element) = current {
            if self.node_type(element) != Some(NodeType::Element) {
                break;
            }
            if let Some(ns) = self.namespace_uri(element) {
                if self.prefix(element) == prefix {
                    return Some(ns.to_string());
                }
            }
            if let Some(uri) = self.attribute(element, &declaration) {
                return if uri.is_empty() {
                    None
                } else {
                    Some(uri.to_string())
                };
            }
            current = self.parent(element);
        }
        None
    }

    /// Compare two nodes in document order. Attributes sort after their owner
    /// and before its children. Nodes of unrelated detached subtrees are
    /// ordered consistently but arbitrarily.
    pub fn compare_document_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.order_key(a).cmp(&self.order_key(b))
    }

    /// Sort key realising [`Document::compare_document_order`]
    pub(crate) fn order_key(&self, id: NodeId) -> Vec<(u8, usize)> {
        let mut key = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let step = if self.node_type(current) == Some(NodeType::Attribute) {
                let index = self
                    .attributes(parent)
                    .iter()
                    .position(|&a| a == current)
                    .unwrap_or(0);
                (0, index)
            } else {
                let index = self
                    .children(parent)
                    .iter()
                    .position(|&c| c == current)
                    .unwrap_or(0);
                (1, index)
            };
            key.push(step);
            current = parent;
        }
        key.push((0, current.index.into_raw_parts().0));
        key.reverse();
        key
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        NodeId {
            document: self.id,
            index: self.nodes.insert(NodeData::new(kind)),
        }
    }

    /// Create a detached element. A blank namespace means no namespace.
    pub fn create_element(&mut self, name: &str, namespace: Option<&str>) -> Result<NodeId> {
        let namespace = namespace.filter(|ns| !ns.trim().is_empty());
        if namespace.is_some() {
            validate_qname(name)?;
        } else {
            validate_name(name)?;
        }
        Ok(self.alloc(NodeKind::Element {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    /// Create a detached CDATA section
    pub fn create_cdata(&mut self, content: &str) -> NodeId {
        self.alloc(NodeKind::CData(content.to_string()))
    }

    /// Create a detached comment
    pub fn create_comment(&mut self, comment: &str) -> NodeId {
        self.alloc(NodeKind::Comment(comment.to_string()))
    }

    /// Create a detached processing instruction
    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> Result<NodeId> {
        validate_name(target)?;
        Ok(self.alloc(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        }))
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_type = self.data(parent)?.kind.node_type();
        let child_type = self.data(child)?.kind.node_type();

        if matches!(child_type, NodeType::Document | NodeType::Attribute) {
            return Err(Error::Hierarchy(format!(
                "a {} node cannot be inserted as a child",
                child_type
            )));
        }

        match parent_type {
            NodeType::Element => {}
            NodeType::Document => match child_type {
                NodeType::Element => {
                    if self.document_element().is_some_and(|e| e != child) {
                        return Err(Error::Hierarchy(
                            "document already has a document element".to_string(),
                        ));
                    }
                }
                NodeType::Comment | NodeType::ProcessingInstruction => {}
                other => {
                    return Err(Error::Hierarchy(format!(
                        "a {} node cannot be a child of the document",
                        other
                    )))
                }
            },
            other => {
                return Err(Error::Hierarchy(format!(
                    "{} nodes cannot have children",
                    other
                )))
            }
        }

        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(Error::Hierarchy(
                "a node cannot be inserted below itself".to_string(),
            ));
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`, detaching it first
    #[instrument(level = "trace", skip(self), fields(document = self.id))]
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        self.check_insertion(parent, child)?;
        self.detach(child)?;
        self.data_mut(parent)?.children.push(child);
        self.data_mut(child)?.parent = Some(parent);
        Ok(child)
    }

    /// Insert `new_child` immediately before `reference` under the same parent
    #[instrument(level = "trace", skip(self), fields(document = self.id))]
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) -> Result<NodeId> {
        if self.data(reference)?.kind.node_type() == NodeType::Attribute {
            return Err(Error::Hierarchy(
                "cannot insert before an attribute".to_string(),
            ));
        }
        let parent = self
            .parent(reference)
            .ok_or_else(|| Error::Hierarchy("reference node has no parent".to_string()))?;
        if reference == new_child {
            return Ok(new_child);
        }
        self.check_insertion(parent, new_child)?;
        self.detach(new_child)?;
        let index = self
            .children(parent)
            .iter()
            .position(|&c| c == reference)
            .ok_or_else(Error::unknown_node)?;
        self.data_mut(parent)?.children.insert(index, new_child);
        self.data_mut(new_child)?.parent = Some(parent);
        Ok(new_child)
    }

    /// Remove a node from its parent (or an attribute from its owner) without freeing it
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let (parent, is_attribute) = {
            let data = self.data(id)?;
            match data.parent {
                Some(p) => (p, data.kind.node_type() == NodeType::Attribute),
                None => return Ok(()),
            }
        };
        let parent_data = self.data_mut(parent)?;
        if is_attribute {
            if let NodeKind::Element { attributes, .. } = &mut parent_data.kind {
                attributes.retain(|&a| a != id);
            }
        } else {
            parent_data.children.retain(|&c| c != id);
        }
        self.data_mut(id)?.parent = None;
        Ok(())
    }

    /// Detach a node and free it together with its subtree
    #[instrument(level = "trace", skip(self), fields(document = self.id))]
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(Error::Hierarchy(
                "the document node cannot be removed".to_string(),
            ));
        }
        self.detach(id)?;
        let mut pending = vec![id];
        while let Some(node) = pending.pop() {
            if let Some(data) = self.nodes.remove(node.index) {
                pending.extend(data.children);
                if let NodeKind::Element { attributes, .. } = data.kind {
                    pending.extend(attributes);
                }
            }
        }
        trace!(document = self.id, "removed subtree");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes, names, content
    // ------------------------------------------------------------------

    fn require_element(&self, id: NodeId) -> Result<()> {
        match self.data(id)?.kind.node_type() {
            NodeType::Element => Ok(()),
            other => Err(Error::Hierarchy(format!(
                "expected an element, got a {} node",
                other
            ))),
        }
    }

    fn attach_attribute(&mut self, element: NodeId, attribute: NodeId) -> Result<()> {
        if let NodeKind::Element { attributes, .. } = &mut self.data_mut(element)?.kind {
            attributes.push(attribute);
        }
        self.data_mut(attribute)?.parent = Some(element);
        Ok(())
    }

    fn set_attribute_value(&mut self, attribute: NodeId, new_name: Option<&str>, new_value: &str) -> Result<()> {
        if let NodeKind::Attribute { name, value, .. } = &mut self.data_mut(attribute)?.kind {
            if let Some(n) = new_name {
                *name = n.to_string();
            }
            *value = new_value.to_string();
        }
        Ok(())
    }

    /// Set an attribute by qualified name (no namespace), replacing any existing value
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<NodeId> {
        self.require_element(element)?;
        validate_name(name)?;
        if let Some(existing) = self.attribute_node(element, name) {
            self.set_attribute_value(existing, None, value)?;
            return Ok(existing);
        }
        let namespace = match name {
            "xmlns" => Some(NAMESPACE_XMLNS.to_string()),
            n if n.starts_with("xmlns:") && self.namespace_aware => Some(NAMESPACE_XMLNS.to_string()),
            _ => None,
        };
        let attribute = self.alloc(NodeKind::Attribute {
            name: name.to_string(),
            namespace,
            value: value.to_string(),
        });
        self.attach_attribute(element, attribute)?;
        Ok(attribute)
    }

    /// Set a namespaced attribute, matching an existing one by namespace and local name
    pub fn set_attribute_ns(
        &mut self,
        element: NodeId,
        namespace: Option<&str>,
        qualified_name: &str,
        value: &str,
    ) -> Result<NodeId> {
        self.require_element(element)?;
        validate_qname(qualified_name)?;
        let namespace = namespace.filter(|ns| !ns.is_empty());
        let local = split_qname(qualified_name).1;
        if let Some(existing) = self.attribute_node_ns(element, namespace, local) {
            self.set_attribute_value(existing, Some(qualified_name), value)?;
            return Ok(existing);
        }
        let attribute = self.alloc(NodeKind::Attribute {
            name: qualified_name.to_string(),
            namespace: namespace.map(str::to_string),
            value: value.to_string(),
        });
        self.attach_attribute(element, attribute)?;
        Ok(attribute)
    }

    /// Remove an attribute by qualified name. Returns whether one was removed.
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> Result<bool> {
        match self.attribute_node(element, name) {
            Some(attribute) => {
                self.remove(attribute)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rename an element or attribute, replacing its namespace
    pub fn rename(&mut self, id: NodeId, namespace: Option<&str>, qualified_name: &str) -> Result<()> {
        let namespace = namespace.filter(|ns| !ns.trim().is_empty());
        if namespace.is_some() {
            validate_qname(qualified_name)?;
        } else {
            validate_name(qualified_name)?;
        }
        match &mut self.data_mut(id)?.kind {
            NodeKind::Element { name, namespace: ns, .. }
            | NodeKind::Attribute { name, namespace: ns, .. } => {
                *name = qualified_name.to_string();
                *ns = namespace.map(str::to_string);
                Ok(())
            }
            other => Err(Error::Hierarchy(format!(
                "a {} node cannot be renamed",
                other.node_type()
            ))),
        }
    }

    /// Replace the content of a node. Elements lose all children and get a
    /// single text node (none for empty text).
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<()> {
        match self.data(id)?.kind.node_type() {
            NodeType::Element => {
                for child in self.children(id).to_vec() {
                    self.remove(child)?;
                }
                if !text.is_empty() {
                    let node = self.create_text(text);
                    self.append_child(id, node)?;
                }
                Ok(())
            }
            NodeType::Document => Ok(()),
            _ => {
                match &mut self.data_mut(id)?.kind {
                    NodeKind::Attribute { value, .. } => *value = text.to_string(),
                    NodeKind::Text(s) | NodeKind::CData(s) | NodeKind::Comment(s) => {
                        *s = text.to_string()
                    }
                    NodeKind::ProcessingInstruction { data, .. } => *data = text.to_string(),
                    NodeKind::Document | NodeKind::Element { .. } => {}
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Copying
    // ------------------------------------------------------------------

    fn snapshot(&self, id: NodeId) -> Result<Snapshot> {
        let data = self.data(id)?;
        let (kind, attributes) = match &data.kind {
            NodeKind::Element {
                name,
                namespace,
                attributes,
            } => {
                let copied = attributes
                    .iter()
                    .map(|&a| self.data(a).map(|d| d.kind.clone()))
                    .collect::<Result<Vec<_>>>()?;
                (
                    NodeKind::Element {
                        name: name.clone(),
                        namespace: namespace.clone(),
                        attributes: Vec::new(),
                    },
                    copied,
                )
            }
            NodeKind::Document => {
                return Err(Error::Hierarchy(
                    "the document node cannot be copied".to_string(),
                ))
            }
            other => (other.clone(), Vec::new()),
        };
        let children = data
            .children
            .iter()
            .map(|&c| self.snapshot(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot {
            kind,
            attributes,
            children,
        })
    }

    fn materialize(&mut self, snapshot: Snapshot) -> Result<NodeId> {
        let id = self.alloc(snapshot.kind);
        for attribute in snapshot.attributes {
            let attr = self.alloc(attribute);
            self.attach_attribute(id, attr)?;
        }
        for child in snapshot.children {
            let child_id = self.materialize(child)?;
            self.data_mut(id)?.children.push(child_id);
            self.data_mut(child_id)?.parent = Some(id);
        }
        Ok(id)
    }

    /// Deep copy of a node within this document. The copy is detached.
    pub fn deep_copy(&mut self, id: NodeId) -> Result<NodeId> {
        let snapshot = self.snapshot(id)?;
        self.materialize(snapshot)
    }

    /// Deep copy of a node of another document into this one. The copy is detached.
    pub fn import_node(&mut self, source: &Document, id: NodeId) -> Result<NodeId> {
        let snapshot = source.snapshot(id)?;
        self.materialize(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.create_element("root", None).unwrap();
        doc.append_child(doc.root(), root).unwrap();
        for name in ["a", "b", "c"] {
            let child = doc.create_element(name, None).unwrap();
            doc.append_child(root, child).unwrap();
        }
        (doc, root)
    }

    fn names(doc: &Document, parent: NodeId) -> Vec<String> {
        doc.children(parent)
            .iter()
            .map(|&c| doc.node_name(c).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_document_creation() {
        let doc = Document::new();
        assert!(doc.document_element().is_none());
        assert_eq!(doc.node_type(doc.root()), Some(NodeType::Document));
        assert_eq!(doc.node_name(doc.root()), Some("#document"));
    }

    #[test]
    fn test_append_moves_node() {
        let (mut doc, root) = sample();
        let a = doc.children(root)[0];
        doc.append_child(root, a).unwrap();
        assert_eq!(names(&doc, root), vec!["b", "c", "a"]);
        assert_eq!(doc.parent(a), Some(root));
    }

    #[test]
    fn test_insert_before() {
        let (mut doc, root) = sample();
        let c = doc.children(root)[2];
        let x = doc.create_element("x", None).unwrap();
        doc.insert_before(c, x).unwrap();
        assert_eq!(names(&doc, root), vec!["a", "b", "x", "c"]);
        assert_eq!(doc.previous_sibling(c), Some(x));
        assert_eq!(doc.next_sibling(x), Some(c));
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut doc, root) = sample();
        let a = doc.children(root)[0];
        assert!(matches!(doc.append_child(a, root), Err(Error::Hierarchy(_))));
        assert!(matches!(doc.append_child(a, a), Err(Error::Hierarchy(_))));
    }

    #[test]
    fn test_second_document_element_rejected() {
        let (mut doc, _) = sample();
        let other = doc.create_element("other", None).unwrap();
        let result = doc.append_child(doc.root(), other);
        assert!(matches!(result, Err(Error::Hierarchy(_))));
    }

    #[test]
    fn test_text_cannot_have_children() {
        let (mut doc, root) = sample();
        let text = doc.create_text("hello");
        doc.append_child(root, text).unwrap();
        let x = doc.create_element("x", None).unwrap();
        assert!(doc.append_child(text, x).is_err());
    }

    #[test]
    fn test_remove_frees_subtree() {
        let (mut doc, root) = sample();
        let a = doc.children(root)[0];
        let inner = doc.create_element("inner", None).unwrap();
        doc.append_child(a, inner).unwrap();
        let attr = doc.set_attribute(inner, "k", "v").unwrap();

        doc.remove(a).unwrap();
        assert!(!doc.contains(a));
        assert!(!doc.contains(inner));
        assert!(!doc.contains(attr));
        assert_eq!(names(&doc, root), vec!["b", "c"]);
        assert!(doc.remove(doc.root()).is_err());
    }

    #[test]
    fn test_attributes() {
        let (mut doc, root) = sample();
        doc.set_attribute(root, "id", "1").unwrap();
        doc.set_attribute(root, "id", "2").unwrap();
        assert_eq!(doc.attributes(root).len(), 1);
        assert_eq!(doc.attribute(root, "id"), Some("2"));
        let attr = doc.attribute_node(root, "id").unwrap();
        assert_eq!(doc.parent(attr), Some(root));
        assert!(doc.children(root).iter().all(|&c| c != attr));
        assert!(doc.remove_attribute(root, "id").unwrap());
        assert!(!doc.remove_attribute(root, "id").unwrap());
    }

    #[test]
    fn test_text_content() {
        let (mut doc, root) = sample();
        let b = doc.children(root)[1];
        let t = doc.create_text("x");
        doc.append_child(b, t).unwrap();
        let cdata = doc.create_cdata("y");
        doc.append_child(root, cdata).unwrap();
        let comment = doc.create_comment("ignored");
        doc.append_child(root, comment).unwrap();
        assert_eq!(doc.text_content(root), "xy");
        doc.set_text_content(b, "z").unwrap();
        assert_eq!(doc.text_content(b), "z");
    }

    #[test]
    fn test_deep_copy_is_detached() {
        let (mut doc, root) = sample();
        doc.set_attribute(root, "k", "v").unwrap();
        let copy = doc.deep_copy(root).unwrap();
        assert_eq!(doc.parent(copy), None);
        assert_eq!(names(&doc, copy), vec!["a", "b", "c"]);
        assert_eq!(doc.attribute(copy, "k"), Some("v"));
        assert_ne!(doc.attribute_node(copy, "k"), doc.attribute_node(root, "k"));
    }

    #[test]
    fn test_import_node() {
        let (source, root) = sample();
        let mut target = Document::new();
        let imported = target.import_node(&source, root).unwrap();
        target.append_child(target.root(), imported).unwrap();
        assert_eq!(names(&target, imported), vec!["a", "b", "c"]);
        assert!(target.import_node(&source, source.root()).is_err());
    }

    #[test]
    fn test_document_order() {
        let (mut doc, root) = sample();
        let a = doc.children(root)[0];
        let c = doc.children(root)[2];
        let attr = doc.set_attribute(root, "k", "v").unwrap();
        assert_eq!(doc.compare_document_order(root, a), Ordering::Less);
        assert_eq!(doc.compare_document_order(c, a), Ordering::Greater);
        assert_eq!(doc.compare_document_order(attr, a), Ordering::Less);
        assert_eq!(doc.compare_document_order(root, attr), Ordering::Less);
    }

    #[test]
    fn test_handles_are_bound_to_their_document() {
        let (doc, root) = sample();
        let mut other = Document::new();
        let other_root = other.create_element("other", None).unwrap();

        assert!(!other.contains(root));
        assert_eq!(other.node_name(root), None);
        assert!(matches!(other.append_child(other_root, root), Err(Error::Hierarchy(_))));
        assert!(matches!(other.append_child(other.root(), root), Err(Error::Hierarchy(_))));
        assert!(!doc.contains(other_root));
    }

    #[test]
    fn test_clone_has_its_own_handles() {
        let (doc, root) = sample();
        let mut copy = doc.clone();
        let copy_root = copy.document_element().unwrap();

        assert_ne!(copy_root, root);
        assert!(!copy.contains(root));
        assert_eq!(copy.node_name(copy_root), Some("root"));
        assert_eq!(copy.parent(copy_root), Some(copy.root()));

        let extra = copy.create_element("extra", None).unwrap();
        copy.append_child(copy_root, extra).unwrap();
        let first = copy.children(copy_root)[0];
        copy.remove(first).unwrap();
        assert_eq!(copy.children(copy_root).len(), doc.children(root).len());
    }

    #[test]
    fn test_rename_and_names() {
        let (mut doc, root) = sample();
        let a = doc.children(root)[0];
        doc.rename(a, Some("http://example.com"), "ns:renamed").unwrap();
        assert_eq!(doc.node_name(a), Some("ns:renamed"));
        assert_eq!(doc.local_name(a), Some("renamed"));
        assert_eq!(doc.prefix(a), Some("ns"));
        assert_eq!(doc.namespace_uri(a), Some("http://example.com"));
        assert!(matches!(doc.rename(a, None, "1bad"), Err(Error::Name(_))));
    }

    #[test]
    fn test_lookup_namespace_uri() {
        let (mut doc, root) = sample();
        doc.set_attribute(root, "xmlns:ns", "http://example.com").unwrap();
        let a = doc.children(root)[0];
        assert_eq!(
            doc.lookup_namespace_uri(a, Some("ns")).as_deref(),
            Some("http://example.com")
        );
        assert_eq!(doc.lookup_namespace_uri(a, Some("other")), None);
        assert_eq!(
            doc.lookup_namespace_uri(a, Some("xml")).as_deref(),
            Some(NAMESPACE_XML)
        );
    }
}
