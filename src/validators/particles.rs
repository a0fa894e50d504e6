//! Particles: occurrence bounds and the terms they repeat
//!
//! A particle is an element declaration, a wildcard or a model group together
//! with its `minOccurs`/`maxOccurs` bounds.

use super::complex_types::ElementDecl;
use super::wildcards::Wildcard;
use crate::error::SchemaError;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Parse `minOccurs`/`maxOccurs` attribute values
    pub fn parse(min: Option<&str>, max: Option<&str>) -> Result<Self, SchemaError> {
        let min = match min {
            Some(value) => value.trim().parse::<u32>().map_err(|_| {
                SchemaError::new(format!("minOccurs must be a non-negative integer, got '{}'", value))
            })?,
            None => 1,
        };
        let max = match max.map(str::trim) {
            Some("unbounded") => None,
            Some(value) => Some(value.parse::<u32>().map_err(|_| {
                SchemaError::new(format!(
                    "maxOccurs must be a non-negative integer or 'unbounded', got '{}'",
                    value
                ))
            })?),
            None => Some(1),
        };
        if let Some(max) = max {
            if max < min {
                return Err(SchemaError::new(format!(
                    "maxOccurs ({}) is lower than minOccurs ({})",
                    max, min
                )));
            }
        }
        Ok(Self { min, max })
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    /// Children in the declared order
    Sequence,
    /// Exactly one of the children
    Choice,
    /// Every child at most once, in any order
    All,
}

impl Compositor {
    pub(crate) fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "sequence" => Some(Compositor::Sequence),
            "choice" => Some(Compositor::Choice),
            "all" => Some(Compositor::All),
            _ => None,
        }
    }
}

/// Model group: a compositor and its particles
#[derive(Debug, Clone)]
pub(crate) struct ModelGroup {
    pub compositor: Compositor,
    pub particles: Vec<Particle>,
}

/// What a particle repeats
#[derive(Debug, Clone)]
pub(crate) enum Term {
    Element(Box<ElementDecl>),
    Any(Wildcard),
    Group(ModelGroup),
}

#[derive(Debug, Clone)]
pub(crate) struct Particle {
    pub occurs: Occurs,
    pub term: Term,
}

impl Particle {
    /// The empty sequence, content of a mixed type without a model group
    pub fn empty_sequence() -> Self {
        Self {
            occurs: Occurs::once(),
            term: Term::Group(ModelGroup {
                compositor: Compositor::Sequence,
                particles: Vec::new(),
            }),
        }
    }

    /// Append `other` after this particle, as a sequence
    pub fn then(self, other: Particle) -> Self {
        Self {
            occurs: Occurs::once(),
            term: Term::Group(ModelGroup {
                compositor: Compositor::Sequence,
                particles: vec![self, other],
            }),
        }
    }

    /// The `all` group of this particle, when the content model is one
    pub fn as_all(&self) -> Option<&ModelGroup> {
        match &self.term {
            Term::Group(group) if group.compositor == Compositor::All => Some(group),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_parse_defaults() {
        assert_eq!(Occurs::parse(None, None).unwrap(), Occurs::once());
    }

    #[test]
    fn test_occurs_parse_unbounded() {
        let occurs = Occurs::parse(Some("0"), Some("unbounded")).unwrap();
        assert!(occurs.is_emptiable());
        assert_eq!(occurs.max, None);
    }

    #[test]
    fn test_occurs_parse_rejects_inverted_bounds() {
        assert!(Occurs::parse(Some("3"), Some("2")).is_err());
        assert!(Occurs::parse(Some("-1"), None).is_err());
        assert!(Occurs::parse(None, Some("many")).is_err());
    }

    #[test]
    fn test_occurs_zero_max() {
        let occurs = Occurs::parse(Some("0"), Some("0")).unwrap();
        assert_eq!(occurs.max, Some(0));
    }
}
