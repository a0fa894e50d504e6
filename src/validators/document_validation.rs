//! Instance validation
//!
//! Walks a [`Document`] against a compiled [`Schema`], starting from the
//! global declaration of the root element. The first violation found is
//! reported with the path of the offending element.

use super::complex_types::{ComplexType, Content, ElementDecl, TypeDef};
use super::models::{ContentModel, Label};
use super::particles::{ModelGroup, Occurs, Particle, Term};
use super::schemas::{Schema, TypeId};
use super::wildcards::{ProcessContents, Wildcard};
use crate::error::ValidationError;
use crate::namespaces::{QName, NAMESPACE_XMLNS, NAMESPACE_XSI};
use crate::tree::{Document, NodeId, NodeKind};

impl Schema {
    pub(crate) fn validate_document(&self, doc: &Document) -> Result<(), ValidationError> {
        let root = doc
            .document_element()
            .ok_or_else(|| ValidationError::new("document has no root element"))?;
        let instance = Instance { schema: self, doc };
        let name = instance.qname(root);
        let decl = self.elements.get(&name).ok_or_else(|| {
            ValidationError::new(format!("no global declaration for root element '{}'", name))
                .with_path(instance.path(root))
        })?;
        instance.element(root, decl)
    }
}

struct Instance<'s, 'd> {
    schema: &'s Schema,
    doc: &'d Document,
}

impl<'s, 'd> Instance<'s, 'd> {
    fn qname(&self, node: NodeId) -> QName {
        QName::new(
            self.doc.namespace_uri(node),
            self.doc.local_name(node).unwrap_or_default(),
        )
    }

    fn path(&self, node: NodeId) -> String {
        let mut names: Vec<&str> = self
            .doc
            .ancestors(node)
            .into_iter()
            .filter(|&a| matches!(self.doc.kind(a), Some(NodeKind::Element { .. })))
            .filter_map(|a| self.doc.node_name(a))
            .collect();
        names.reverse();
        names.push(self.doc.node_name(node).unwrap_or_default());
        format!("/{}", names.join("/"))
    }

    fn fail(&self, node: NodeId, message: impl Into<String>) -> ValidationError {
        ValidationError::new(message).with_path(self.path(node))
    }

    fn xsi_attribute(&self, element: NodeId, local_name: &str) -> Option<&'d str> {
        self.doc
            .attribute_node_ns(element, Some(NAMESPACE_XSI), local_name)
            .and_then(|a| self.doc.node_value(a))
    }

    /// Type named by `xsi:type`, if present
    fn xsi_type(&self, element: NodeId) -> Result<Option<TypeId>, ValidationError> {
        let Some(value) = self.xsi_attribute(element, "type") else {
            return Ok(None);
        };
        let value = value.trim();
        let (prefix, local) = match value.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, value),
        };
        let namespace = self.doc.lookup_namespace_uri(element, prefix);
        let name = QName::new(namespace, local);
        self.schema
            .type_names
            .get(&name)
            .copied()
            .map(Some)
            .ok_or_else(|| self.fail(element, format!("xsi:type '{}' does not name a known type", value)))
    }

    fn has_text(&self, element: NodeId) -> bool {
        self.doc.children(element).iter().any(|&child| {
            matches!(
                self.doc.kind(child),
                Some(NodeKind::Text(text)) | Some(NodeKind::CData(text)) if !text.trim().is_empty()
            )
        })
    }

    fn element(&self, element: NodeId, decl: &'s ElementDecl) -> Result<(), ValidationError> {
        let type_id = self.xsi_type(element)?.unwrap_or(decl.type_id);

        if matches!(self.xsi_attribute(element, "nil").map(str::trim), Some("true") | Some("1")) {
            if !decl.nillable {
                return Err(self.fail(element, format!("element '{}' is not nillable", decl.name)));
            }
            if decl.fixed.is_some() {
                return Err(self.fail(element, "an element with a fixed value cannot be nil"));
            }
            if !self.doc.element_children(element).is_empty() || self.has_text(element) {
                return Err(self.fail(element, "a nil element must be empty"));
            }
            if let TypeDef::Complex(complex) = self.schema.type_def(type_id) {
                self.attributes(element, complex)?;
            }
            return Ok(());
        }

        match self.schema.type_def(type_id) {
            TypeDef::AnyType => Ok(()),
            TypeDef::Simple(_) => {
                self.no_children(element)?;
                self.no_attributes(element)?;
                self.value(element, type_id, decl)
            }
            TypeDef::Complex(complex) => {
                self.attributes(element, complex)?;
                match &complex.content {
                    Content::Empty => {
                        self.no_children(element)?;
                        if self.has_text(element) {
                            return Err(self.fail(element, "element must be empty"));
                        }
                        Ok(())
                    }
                    Content::Simple(simple) => {
                        self.no_children(element)?;
                        self.value(element, *simple, decl)
                    }
                    Content::Elements { particle, mixed } => {
                        if !mixed && self.has_text(element) {
                            return Err(self.fail(element, "character data is not allowed in element-only content"));
                        }
                        self.children(element, particle)
                    }
                }
            }
        }
    }

    fn no_children(&self, element: NodeId) -> Result<(), ValidationError> {
        match self.doc.element_children(element).first() {
            Some(&child) => Err(self.fail(
                child,
                format!("element '{}' is not allowed here: the content must be simple", self.qname(child)),
            )),
            None => Ok(()),
        }
    }

    fn is_declaration(&self, attribute: NodeId) -> bool {
        self.doc.namespace_uri(attribute) == Some(NAMESPACE_XMLNS)
            || self.doc.namespace_uri(attribute) == Some(NAMESPACE_XSI)
            || self
                .doc
                .node_name(attribute)
                .map_or(false, |name| name == "xmlns" || name.starts_with("xmlns:"))
    }

    fn no_attributes(&self, element: NodeId) -> Result<(), ValidationError> {
        for &attribute in self.doc.attributes(element) {
            if !self.is_declaration(attribute) {
                return Err(self.fail(
                    element,
                    format!("attribute '{}' is not allowed on an element of simple type", self.qname(attribute)),
                ));
            }
        }
        Ok(())
    }

    /// Character data of `element` against a simple type, with the
    /// declaration's default and fixed values applied
    fn value(&self, element: NodeId, type_id: TypeId, decl: &ElementDecl) -> Result<(), ValidationError> {
        let text = self.doc.text_content(element);
        let text = match decl.default.as_ref().or(decl.fixed.as_ref()) {
            Some(value) if text.is_empty() => value.clone(),
            _ => text,
        };
        self.schema
            .validate_value(type_id, &text)
            .map_err(|e| e.with_path(self.path(element)))?;
        if let Some(fixed) = &decl.fixed {
            if self.schema.normalize_value(type_id, &text) != self.schema.normalize_value(type_id, fixed) {
                return Err(self
                    .fail(element, format!("value must be the fixed value '{}'", fixed))
                    .with_instance(text));
            }
        }
        Ok(())
    }

    fn attributes(&self, element: NodeId, complex: &'s ComplexType) -> Result<(), ValidationError> {
        for &attribute in self.doc.attributes(element) {
            if self.is_declaration(attribute) {
                continue;
            }
            let name = self.qname(attribute);
            let value = self.doc.node_value(attribute).unwrap_or_default();
            let fail = |message: String| {
                ValidationError::new(message).with_path(format!("{}/@{}", self.path(element), name))
            };

            if let Some(usage) = complex.attribute(&name) {
                self.schema
                    .validate_value(usage.type_id, value)
                    .map_err(|e| e.with_path(format!("{}/@{}", self.path(element), name)))?;
                if let Some(fixed) = &usage.fixed {
                    if self.schema.normalize_value(usage.type_id, value)
                        != self.schema.normalize_value(usage.type_id, fixed)
                    {
                        return Err(fail(format!("attribute value must be the fixed value '{}'", fixed)).with_instance(value));
                    }
                }
                continue;
            }

            let wildcard = complex
                .any_attribute
                .as_ref()
                .filter(|wildcard| wildcard.allows(name.namespace.as_deref()));
            let Some(wildcard) = wildcard else {
                return Err(fail(format!("attribute '{}' is not allowed", name)));
            };
            match (wildcard.process, self.schema.attributes.get(&name)) {
                (ProcessContents::Skip, _) | (ProcessContents::Lax, None) => {}
                (_, Some(global)) => {
                    self.schema
                        .validate_value(global.type_id, value)
                        .map_err(|e| e.with_path(format!("{}/@{}", self.path(element), name)))?;
                }
                (ProcessContents::Strict, None) => {
                    return Err(fail(format!("no global declaration for attribute '{}'", name)));
                }
            }
        }

        for usage in complex.attributes.iter().filter(|usage| usage.required) {
            let present = self
                .doc
                .attribute_node_ns(element, usage.name.namespace.as_deref(), &usage.name.local_name)
                .is_some();
            if !present {
                return Err(self.fail(element, format!("required attribute '{}' is missing", usage.name)));
            }
        }
        Ok(())
    }

    fn children(&self, element: NodeId, particle: &'s Particle) -> Result<(), ValidationError> {
        let children = self.doc.element_children(element);
        if let Some(all) = particle.as_all() {
            return self.all(element, &children, all, particle.occurs);
        }

        let model = ContentModel::new(particle);
        let mut position = model.start();
        for child in children {
            let name = self.qname(child);
            match model.advance(&position, name.namespace.as_deref(), &name.local_name) {
                Some((next, label)) => {
                    position = next;
                    self.matched(child, label)?;
                }
                None => {
                    let expected = model.expected(&position);
                    let error = self.fail(child, format!("element '{}' is not expected here", name));
                    return Err(if expected.is_empty() {
                        error.with_reason("no more child elements are allowed")
                    } else {
                        error.with_reason(format!("expected one of: {}", expected.join(", ")))
                    });
                }
            }
        }
        if !model.is_final(&position) {
            return Err(self
                .fail(element, format!("content of element '{}' is incomplete", self.qname(element)))
                .with_reason(format!("expected one of: {}", model.expected(&position).join(", "))));
        }
        Ok(())
    }

    fn all(
        &self,
        element: NodeId,
        children: &[NodeId],
        group: &'s ModelGroup,
        occurs: Occurs,
    ) -> Result<(), ValidationError> {
        if children.is_empty() && occurs.is_emptiable() {
            return Ok(());
        }
        let mut seen = vec![0u32; group.particles.len()];
        for &child in children {
            let name = self.qname(child);
            let index = group.particles.iter().position(|particle| match &particle.term {
                Term::Element(decl) => decl.name == name,
                _ => false,
            });
            let Some(index) = index else {
                return Err(self.fail(child, format!("element '{}' is not expected here", name)));
            };
            seen[index] += 1;
            let particle = &group.particles[index];
            if particle.occurs.max.map_or(false, |max| seen[index] > max) {
                return Err(self.fail(child, format!("element '{}' occurs too often", name)));
            }
            if let Term::Element(decl) = &particle.term {
                self.element(child, decl)?;
            }
        }
        for (particle, count) in group.particles.iter().zip(&seen) {
            if let Term::Element(decl) = &particle.term {
                if *count < particle.occurs.min {
                    return Err(self.fail(element, format!("required element '{}' is missing", decl.name)));
                }
            }
        }
        Ok(())
    }

    fn matched(&self, child: NodeId, label: Label<'s>) -> Result<(), ValidationError> {
        match label {
            Label::Element(decl) => self.element(child, decl),
            Label::Any(wildcard) => self.wildcard(child, wildcard),
        }
    }

    fn wildcard(&self, child: NodeId, wildcard: &Wildcard) -> Result<(), ValidationError> {
        let name = self.qname(child);
        match (wildcard.process, self.schema.elements.get(&name)) {
            (ProcessContents::Skip, _) | (ProcessContents::Lax, None) => Ok(()),
            (_, Some(decl)) => self.element(child, decl),
            (ProcessContents::Strict, None) => {
                Err(self.fail(child, format!("no global declaration for element '{}'", name)))
            }
        }
    }
}
