//! Node payloads stored in the document arena.

use std::fmt;

use super::NodeId;

/// What a node is, together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The document node. Exactly one per [`Document`](super::Document).
    Document,
    /// An element.
    Element {
        /// Qualified name as written (`prefix:local` or `local`)
        name: String,
        /// Namespace URI, `None` for no namespace
        namespace: Option<String>,
        /// Attribute nodes in document order
        attributes: Vec<NodeId>,
    },
    /// An attribute. Its parent is the owner element.
    Attribute {
        /// Qualified name as written
        name: String,
        /// Namespace URI, `None` for no namespace
        namespace: Option<String>,
        /// Attribute value, entity references already expanded
        value: String,
    },
    /// Character data.
    Text(String),
    /// A CDATA section.
    CData(String),
    /// A comment.
    Comment(String),
    /// A processing instruction.
    ProcessingInstruction {
        /// PI target
        target: String,
        /// PI data (may be empty)
        data: String,
    },
}

/// Node type discriminant, mirroring the DOM node type constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Element node
    Element,
    /// Attribute node
    Attribute,
    /// Text node
    Text,
    /// CDATA section node
    CData,
    /// Processing instruction node
    ProcessingInstruction,
    /// Comment node
    Comment,
    /// Document node
    Document,
}

impl NodeKind {
    /// The node type of this payload
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Attribute { .. } => NodeType::Attribute,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::CData(_) => NodeType::CData,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
        }
    }

    /// Text or CDATA content
    pub fn character_data(&self) -> Option<&str> {
        match self {
            NodeKind::Text(s) | NodeKind::CData(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Element => "element",
            NodeType::Attribute => "attribute",
            NodeType::Text => "text",
            NodeType::CData => "cdata-section",
            NodeType::ProcessingInstruction => "processing-instruction",
            NodeType::Comment => "comment",
            NodeType::Document => "document",
        };
        write!(f, "{}", s)
    }
}
