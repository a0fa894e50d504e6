//! # xmldom
//!
//! Static helpers for working with XML trees: parse text, bytes, streams or
//! files into a [`Document`], query it with XPath 1.0, edit it, serialize it
//! back to text and validate it against an XML Schema.
//!
//! The helpers live in [`dom`] as free functions. They sit on a small
//! toolkit of their own:
//!
//! - an arena-backed mutable tree ([`tree`])
//! - a parser built on `quick-xml` ([`parser`])
//! - an XPath 1.0 engine ([`xpath`])
//! - a serializer with namespace fixup ([`serial`])
//! - an XSD 1.0 subset validator ([`validators`])
//!
//! ## Example
//!
//! ```rust
//! use xmldom::dom;
//! use xmldom::namespaces::NamespaceContext;
//!
//! let doc = dom::parse(r#"<b:books xmlns:b="urn:books"><b:book>Dune</b:book></b:books>"#).unwrap();
//! let ns = NamespaceContext::new().with_prefix("bk", "urn:books");
//!
//! let title = dom::select_string(&doc, doc.root(), "/bk:books/bk:book", &[&ns]).unwrap();
//! assert_eq!(title, "Dune");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;
pub mod names;
pub mod namespaces;

// Tree, input and output
pub mod parser;
pub mod serial;
pub mod tree;

// Queries and validation
pub mod validators;
pub mod xpath;

// Helper facade
pub mod dom;

// Re-exports for convenience
pub use error::{Error, Result, SchemaError, ValidationError};
pub use namespaces::{DefaultNamespaceContext, NamespaceContext, NamespaceResolver, QName};
pub use parser::{parse_str, parse_str_with, ParseOptions};
pub use serial::OutputOptions;
pub use tree::{Document, NodeId, NodeKind, NodeType};
pub use validators::Schema;
pub use xpath::{XPath, XPathError, XPathValue};

/// Version of the xmldom library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
