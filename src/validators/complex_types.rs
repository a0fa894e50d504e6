//! Type definitions, declarations and complex content

use super::particles::Particle;
use super::schemas::TypeId;
use super::simple_types::SimpleType;
use super::wildcards::Wildcard;
use crate::namespaces::QName;

/// A resolved type definition
#[derive(Debug, Clone)]
pub(crate) enum TypeDef {
    /// `xs:anyType`: any attributes, any content
    AnyType,
    Simple(SimpleType),
    Complex(ComplexType),
}

/// Element declaration; the type is an index into the schema's types
#[derive(Debug, Clone)]
pub(crate) struct ElementDecl {
    pub name: QName,
    pub type_id: TypeId,
    pub nillable: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
}

/// Attribute declaration as used by a complex type
#[derive(Debug, Clone)]
pub(crate) struct AttributeUse {
    pub name: QName,
    pub type_id: TypeId,
    pub required: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
}

/// Content type of a complex type
#[derive(Debug, Clone)]
pub(crate) enum Content {
    /// No children and no character data
    Empty,
    /// Character data of a simple type, no element children
    Simple(TypeId),
    /// Element children matching the particle; text only when mixed
    Elements { particle: Particle, mixed: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct ComplexType {
    pub content: Content,
    pub attributes: Vec<AttributeUse>,
    pub any_attribute: Option<Wildcard>,
}

impl ComplexType {
    pub fn attribute(&self, name: &QName) -> Option<&AttributeUse> {
        self.attributes.iter().find(|attribute| &attribute.name == name)
    }
}
