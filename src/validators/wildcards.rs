//! `xs:any` and `xs:anyAttribute` wildcards

use crate::error::SchemaError;

/// How matched content is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessContents {
    /// A global declaration must exist and the content must be valid against it
    Strict,
    /// Validate against a global declaration when there is one
    Lax,
    /// No validation at all
    Skip,
}

impl ProcessContents {
    pub(crate) fn parse(value: Option<&str>) -> Result<Self, SchemaError> {
        match value {
            None | Some("strict") => Ok(ProcessContents::Strict),
            Some("lax") => Ok(ProcessContents::Lax),
            Some("skip") => Ok(ProcessContents::Skip),
            Some(other) => Err(SchemaError::new(format!(
                "processContents must be 'strict', 'lax' or 'skip', got '{}'",
                other
            ))),
        }
    }
}

/// Namespace constraint of a wildcard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// `##any`
    Any,
    /// `##other`: any namespace but the target namespace, never unqualified
    Other(Option<String>),
    /// An explicit list; `None` stands for `##local`
    List(Vec<Option<String>>),
}

impl NamespaceConstraint {
    /// Parse the `namespace` attribute of a wildcard declared in a schema
    /// whose target namespace is `target`
    pub(crate) fn parse(value: Option<&str>, target: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("##any") => NamespaceConstraint::Any,
            Some("##other") => NamespaceConstraint::Other(target.map(str::to_string)),
            Some(list) => NamespaceConstraint::List(
                list.split_whitespace()
                    .map(|token| match token {
                        "##targetNamespace" => target.map(str::to_string),
                        "##local" => None,
                        uri => Some(uri.to_string()),
                    })
                    .collect(),
            ),
        }
    }

    /// Check whether a name in `namespace` is allowed
    pub fn allows(&self, namespace: Option<&str>) -> bool {
        match self {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => {
                namespace.is_some() && namespace != target.as_deref()
            }
            NamespaceConstraint::List(list) => list.iter().any(|ns| ns.as_deref() == namespace),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Wildcard {
    pub namespaces: NamespaceConstraint,
    pub process: ProcessContents,
}

impl Wildcard {
    pub fn allows(&self, namespace: Option<&str>) -> bool {
        self.namespaces.allows(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_namespace() {
        let constraint = NamespaceConstraint::parse(None, Some("urn:t"));
        assert!(constraint.allows(None));
        assert!(constraint.allows(Some("urn:x")));
    }

    #[test]
    fn test_other_namespace() {
        let constraint = NamespaceConstraint::parse(Some("##other"), Some("urn:t"));
        assert!(constraint.allows(Some("urn:x")));
        assert!(!constraint.allows(Some("urn:t")));
        assert!(!constraint.allows(None));
    }

    #[test]
    fn test_namespace_list() {
        let constraint =
            NamespaceConstraint::parse(Some("##targetNamespace ##local urn:x"), Some("urn:t"));
        assert!(constraint.allows(Some("urn:t")));
        assert!(constraint.allows(None));
        assert!(constraint.allows(Some("urn:x")));
        assert!(!constraint.allows(Some("urn:y")));
    }

    #[test]
    fn test_process_contents() {
        assert_eq!(ProcessContents::parse(None).unwrap(), ProcessContents::Strict);
        assert_eq!(ProcessContents::parse(Some("lax")).unwrap(), ProcessContents::Lax);
        assert!(ProcessContents::parse(Some("loose")).is_err());
    }
}
