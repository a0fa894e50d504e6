//! Compiled XML Schema

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use super::builders::SchemaBuilder;
use super::complex_types::{AttributeUse, ElementDecl, TypeDef};
use crate::error::{Error, Result, SchemaError, ValidationError};
use crate::namespaces::QName;
use crate::tree::Document;

/// Index of a type definition within a [`Schema`]
pub(crate) type TypeId = usize;

/// A compiled XML Schema (XSD 1.0 subset)
///
/// # Examples
///
/// ```
/// use xmldom::{parse_str, Schema};
///
/// let schema = Schema::parse(r#"
///     <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
///         <xs:element name="count" type="xs:positiveInteger"/>
///     </xs:schema>"#).unwrap();
///
/// assert!(schema.validate(&parse_str("<count>3</count>").unwrap()).is_ok());
/// assert!(schema.validate(&parse_str("<count>zero</count>").unwrap()).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) target_namespace: Option<String>,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) type_names: IndexMap<QName, TypeId>,
    pub(crate) elements: IndexMap<QName, ElementDecl>,
    pub(crate) attributes: IndexMap<QName, AttributeUse>,
}

impl Schema {
    /// Load a schema file; `xs:include` and `xs:import` locations are
    /// resolved relative to it
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let mut builder = SchemaBuilder::new();
        builder.load_file(path, None)?;
        Ok(builder.build()?)
    }

    /// Compile a schema from text. Relative `schemaLocation`s cannot be
    /// resolved; use [`Schema::parse_with_base`] for schemas that include others.
    pub fn parse(xsd: &str) -> Result<Self> {
        let mut builder = SchemaBuilder::new();
        builder.load_str(xsd, None, "<string>".to_string(), None)?;
        Ok(builder.build()?)
    }

    /// Compile a schema from text, resolving relative `schemaLocation`s
    /// against `base_dir`
    pub fn parse_with_base<P: AsRef<Path>>(xsd: &str, base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let mut builder = SchemaBuilder::new();
        builder.load_str(
            xsd,
            Some(base_dir.to_path_buf()),
            base_dir.display().to_string(),
            None,
        )?;
        Ok(builder.build()?)
    }

    /// Target namespace of the main schema document
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Names of the global element declarations, in declaration order
    pub fn element_names(&self) -> impl Iterator<Item = &QName> {
        self.elements.keys()
    }

    /// Names of the global type definitions, built-in types included
    pub fn type_names(&self) -> impl Iterator<Item = &QName> {
        self.type_names.keys()
    }

    /// Validate a document. The root element must match a global element
    /// declaration.
    #[instrument(level = "debug", skip_all)]
    pub fn validate(&self, doc: &Document) -> std::result::Result<(), ValidationError> {
        let result = self.validate_document(doc);
        if let Err(ref error) = result {
            debug!(error = %error.message, path = ?error.path, "document is not valid");
        }
        result
    }

    /// Check if a document is valid
    pub fn is_valid(&self, doc: &Document) -> bool {
        self.validate(doc).is_ok()
    }

    /// Attribute `default` and `fixed` values must be valid for the
    /// attribute's type, and a required attribute takes no default
    pub(crate) fn check_value_constraints(&self) -> std::result::Result<(), SchemaError> {
        let local_uses = self
            .types
            .iter()
            .filter_map(|def| match def {
                TypeDef::Complex(complex) => Some(complex.attributes.iter()),
                _ => None,
            })
            .flatten();
        for usage in local_uses.chain(self.attributes.values()) {
            if usage.required && usage.default.is_some() {
                return Err(SchemaError::new(format!(
                    "required attribute '{}' cannot have a default value",
                    usage.name
                )));
            }
            let constraints = [("default", &usage.default), ("fixed", &usage.fixed)];
            for (kind, value) in constraints {
                let Some(value) = value else { continue };
                self.validate_value(usage.type_id, value).map_err(|e| {
                    SchemaError::new(format!(
                        "{} value '{}' of attribute '{}' is not valid: {}",
                        kind, value, usage.name, e.message
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub(crate) fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id]
    }
}
