//! Simple type definitions and value validation

use super::builtins::Builtin;
use super::complex_types::TypeDef;
use super::facets::{Facets, WhiteSpace};
use super::schemas::{Schema, TypeId};
use crate::error::ValidationError;

/// Variety of a simple type
#[derive(Debug, Clone)]
pub(crate) enum SimpleType {
    Builtin(Builtin),
    Restriction { base: TypeId, facets: Facets },
    List { item: TypeId },
    Union { members: Vec<TypeId> },
}

impl Schema {
    fn simple(&self, id: TypeId) -> Option<&SimpleType> {
        match self.type_def(id) {
            TypeDef::Simple(simple) => Some(simple),
            _ => None,
        }
    }

    /// Built-in type at the bottom of a restriction chain
    pub(crate) fn builtin_of(&self, id: TypeId) -> Option<Builtin> {
        match self.simple(id)? {
            SimpleType::Builtin(builtin) => Some(*builtin),
            SimpleType::Restriction { base, .. } => self.builtin_of(*base),
            SimpleType::List { .. } | SimpleType::Union { .. } => None,
        }
    }

    fn is_list(&self, id: TypeId) -> bool {
        match self.simple(id) {
            Some(SimpleType::Builtin(builtin)) => builtin.is_list(),
            Some(SimpleType::Restriction { base, .. }) => self.is_list(*base),
            Some(SimpleType::List { .. }) => true,
            _ => false,
        }
    }

    fn white_space(&self, id: TypeId) -> WhiteSpace {
        match self.simple(id) {
            Some(SimpleType::Builtin(builtin)) => builtin.white_space(),
            Some(SimpleType::Restriction { base, facets }) => {
                facets.white_space.unwrap_or_else(|| self.white_space(*base))
            }
            Some(SimpleType::List { .. }) => WhiteSpace::Collapse,
            _ => WhiteSpace::Preserve,
        }
    }

    /// Validate a raw (not yet whitespace-normalized) value against a simple type
    pub(crate) fn validate_value(&self, id: TypeId, raw: &str) -> Result<(), ValidationError> {
        let value = self.white_space(id).normalize(raw);
        self.check_normalized(id, &value)
    }

    fn check_normalized(&self, id: TypeId, value: &str) -> Result<(), ValidationError> {
        let Some(simple) = self.simple(id) else {
            return Ok(());
        };
        match simple {
            SimpleType::Builtin(builtin) => builtin
                .validate(value)
                .map_err(|reason| ValidationError::new(reason).with_instance(value)),
            SimpleType::Restriction { base, facets } => {
                self.check_normalized(*base, value)?;
                facets.check(value, self.builtin_of(*base), self.is_list(*base))
            }
            SimpleType::List { item } => value
                .split_whitespace()
                .try_for_each(|token| self.validate_value(*item, token)),
            SimpleType::Union { members } => {
                if members.iter().any(|member| self.validate_value(*member, value).is_ok()) {
                    Ok(())
                } else {
                    Err(ValidationError::new(format!(
                        "'{}' is not valid for any member type of the union",
                        value
                    ))
                    .with_instance(value))
                }
            }
        }
    }

    /// Value as it is compared against `fixed`
    pub(crate) fn normalize_value(&self, id: TypeId, raw: &str) -> String {
        self.white_space(id).normalize(raw)
    }
}
