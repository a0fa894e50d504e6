//! Schema loading
//!
//! Schema documents are read with `roxmltree` into raw components that still
//! refer to each other by name. [`SchemaBuilder::build`] then resolves every
//! reference into the index based model used for validation, so forward
//! references and references across included documents work in any order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use roxmltree::Node;
use tracing::debug;

use super::builtins::Builtin;
use super::complex_types::{AttributeUse, ComplexType, Content, ElementDecl, TypeDef};
use super::facets::Facets;
use super::particles::{Compositor, ModelGroup, Occurs, Particle, Term};
use super::schemas::{Schema, TypeId};
use super::simple_types::SimpleType;
use super::wildcards::{NamespaceConstraint, ProcessContents, Wildcard};
use crate::error::SchemaError;
use crate::names::split_qname;
use crate::namespaces::{QName, NAMESPACE_XML, NAMESPACE_XS};

#[derive(Debug, Clone)]
enum RawTypeRef {
    Named(QName),
    Anonymous(usize),
}

#[derive(Debug, Clone)]
struct RawElement {
    name: QName,
    type_ref: Option<RawTypeRef>,
    nillable: bool,
    default: Option<String>,
    fixed: Option<String>,
}

#[derive(Debug, Clone)]
enum RawTerm {
    Element(RawElement),
    ElementRef(QName),
    Group(Compositor, Vec<RawParticle>),
    GroupRef(QName),
    Any(Wildcard),
}

#[derive(Debug, Clone)]
struct RawParticle {
    occurs: Occurs,
    term: RawTerm,
}

#[derive(Debug, Clone)]
struct RawAttribute {
    name: QName,
    type_ref: Option<RawTypeRef>,
    default: Option<String>,
    fixed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Use {
    Optional,
    Required,
    Prohibited,
}

#[derive(Debug, Clone)]
enum RawAttributeItem {
    Local(RawAttribute, Use),
    Ref {
        name: QName,
        usage: Use,
        default: Option<String>,
        fixed: Option<String>,
    },
    Group(QName),
}

#[derive(Debug, Clone, Default)]
struct RawAttributes {
    items: Vec<RawAttributeItem>,
    any: Option<Wildcard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Derivation {
    Extension,
    Restriction,
}

#[derive(Debug, Clone)]
enum RawSimple {
    Restriction { base: RawTypeRef, facets: Facets },
    List { item: RawTypeRef },
    Union { members: Vec<RawTypeRef> },
}

#[derive(Debug, Clone)]
enum RawContent {
    /// Element content, declared directly or through `xs:complexContent`
    Complex {
        derivation: Option<(Derivation, RawTypeRef)>,
        particle: Option<RawParticle>,
        mixed: bool,
    },
    /// `xs:simpleContent`
    Simple {
        derivation: Derivation,
        base: RawTypeRef,
        inline: Option<RawTypeRef>,
        facets: Facets,
    },
}

#[derive(Debug, Clone)]
struct RawComplex {
    content: RawContent,
    attributes: RawAttributes,
}

#[derive(Debug, Clone)]
enum RawType {
    Simple(RawSimple),
    Complex(RawComplex),
}

/// Settings of the schema document being read
#[derive(Debug, Clone)]
struct Context {
    target: Option<String>,
    element_qualified: bool,
    attribute_qualified: bool,
    /// Included without a target namespace: unqualified references take the
    /// including document's namespace
    chameleon: bool,
    base_dir: Option<PathBuf>,
    location: String,
}

impl Context {
    fn error(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::new(message).with_location(self.location.clone())
    }

    fn qualified(&self, local: &str) -> QName {
        QName::new(self.target.as_deref(), local)
    }

    /// Resolve a QName-valued attribute in the scope of `node`
    fn resolve(&self, node: Node<'_, '_>, value: &str) -> Result<QName, SchemaError> {
        let (prefix, local) = split_qname(value.trim());
        let namespace = match prefix {
            Some("xml") => Some(NAMESPACE_XML.to_string()),
            Some(prefix) => Some(
                node.lookup_namespace_uri(Some(prefix))
                    .ok_or_else(|| self.error(format!("prefix '{}' in '{}' is not declared", prefix, value)))?
                    .to_string(),
            ),
            None => match node.lookup_namespace_uri(None) {
                Some(uri) if !uri.is_empty() => Some(uri.to_string()),
                _ if self.chameleon => self.target.clone(),
                _ => None,
            },
        };
        Ok(QName::new(namespace, local))
    }
}

fn xs_children<'a, 'input: 'a>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| {
        child.is_element()
            && child.tag_name().namespace() == Some(NAMESPACE_XS)
            && child.tag_name().name() != "annotation"
    })
}

fn required<'a>(ctx: &Context, node: Node<'a, '_>, attribute: &str) -> Result<&'a str, SchemaError> {
    node.attribute(attribute).ok_or_else(|| {
        ctx.error(format!(
            "xs:{} is missing the '{}' attribute",
            node.tag_name().name(),
            attribute
        ))
    })
}

fn flag(node: Node<'_, '_>, attribute: &str) -> bool {
    matches!(node.attribute(attribute).map(str::trim), Some("true") | Some("1"))
}

/// Collects schema documents and builds a [`Schema`]
#[derive(Debug, Default)]
pub(crate) struct SchemaBuilder {
    target_namespace: Option<String>,
    types: Vec<RawType>,
    type_names: IndexMap<QName, usize>,
    elements: IndexMap<QName, RawElement>,
    attributes: IndexMap<QName, RawAttribute>,
    groups: IndexMap<QName, RawParticle>,
    attribute_groups: IndexMap<QName, RawAttributes>,
    loaded: HashSet<PathBuf>,
    documents: usize,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema file. `include_target` is the including document's
    /// target namespace when the file is reached through `xs:include`.
    pub fn load_file(&mut self, path: &Path, include_target: Option<Option<String>>) -> Result<(), SchemaError> {
        let location = path.display().to_string();
        let canonical = path
            .canonicalize()
            .map_err(|e| SchemaError::new(format!("cannot read schema: {}", e)).with_location(location.clone()))?;
        if !self.loaded.insert(canonical.clone()) {
            return Ok(());
        }
        let text = std::fs::read_to_string(&canonical)
            .map_err(|e| SchemaError::new(format!("cannot read schema: {}", e)).with_location(location.clone()))?;
        let base_dir = canonical.parent().map(Path::to_path_buf);
        self.load_str(&text, base_dir, location, include_target)
    }

    /// Load a schema document from text
    pub fn load_str(
        &mut self,
        text: &str,
        base_dir: Option<PathBuf>,
        location: String,
        include_target: Option<Option<String>>,
    ) -> Result<(), SchemaError> {
        let document = roxmltree::Document::parse(text)
            .map_err(|e| SchemaError::new(format!("schema is not well-formed: {}", e)).with_location(location.clone()))?;
        let root = document.root_element();
        if root.tag_name().name() != "schema" || root.tag_name().namespace() != Some(NAMESPACE_XS) {
            return Err(SchemaError::new("root element is not xs:schema").with_location(location));
        }

        let declared = root.attribute("targetNamespace").map(str::to_string);
        let (target, chameleon) = match include_target {
            Some(parent) if declared.is_none() => (parent, true),
            Some(parent) if declared != parent => {
                return Err(SchemaError::new(format!(
                    "included schema has targetNamespace '{}', expected '{}'",
                    declared.unwrap_or_default(),
                    parent.unwrap_or_default()
                ))
                .with_location(location));
            }
            _ => (declared, false),
        };
        if self.documents == 0 {
            self.target_namespace = target.clone();
        }
        self.documents += 1;

        let ctx = Context {
            target,
            element_qualified: root.attribute("elementFormDefault") == Some("qualified"),
            attribute_qualified: root.attribute("attributeFormDefault") == Some("qualified"),
            chameleon,
            base_dir,
            location,
        };
        debug!(location = %ctx.location, target = ?ctx.target, "loading schema document");

        for child in xs_children(root) {
            match child.tag_name().name() {
                "include" => {
                    let path = self.locate(&ctx, required(&ctx, child, "schemaLocation")?)?;
                    self.load_file(&path, Some(ctx.target.clone()))?;
                }
                "import" => {
                    if let Some(location) = child.attribute("schemaLocation") {
                        let path = self.locate(&ctx, location)?;
                        self.load_file(&path, None)?;
                    }
                }
                "redefine" | "override" => {
                    return Err(ctx.error(format!("xs:{} is not supported", child.tag_name().name())));
                }
                "element" => {
                    let element = self.element(&ctx, child, true)?;
                    self.declare(&ctx, "element", element.name.clone())?;
                    self.elements.insert(element.name.clone(), element);
                }
                "attribute" => {
                    let attribute = self.attribute(&ctx, child, true)?;
                    if self.attributes.contains_key(&attribute.name) {
                        return Err(ctx.error(format!("duplicate attribute declaration '{}'", attribute.name)));
                    }
                    self.attributes.insert(attribute.name.clone(), attribute);
                }
                "simpleType" | "complexType" => {
                    let name = ctx.qualified(required(&ctx, child, "name")?);
                    if self.type_names.contains_key(&name) {
                        return Err(ctx.error(format!("duplicate type definition '{}'", name)));
                    }
                    let raw = self.type_definition(&ctx, child)?;
                    self.types.push(raw);
                    self.type_names.insert(name, self.types.len() - 1);
                }
                "group" => {
                    let name = ctx.qualified(required(&ctx, child, "name")?);
                    let particle = xs_children(child)
                        .find_map(|c| Compositor::from_local_name(c.tag_name().name()).map(|_| c))
                        .ok_or_else(|| ctx.error(format!("group '{}' has no model group", name)))?;
                    let particle = self.particle(&ctx, particle)?;
                    self.groups.insert(name, particle);
                }
                "attributeGroup" => {
                    let name = ctx.qualified(required(&ctx, child, "name")?);
                    let attributes = self.attributes(&ctx, child)?;
                    self.attribute_groups.insert(name, attributes);
                }
                "notation" => {}
                other => return Err(ctx.error(format!("unexpected xs:{} at the top level", other))),
            }
        }
        Ok(())
    }

    fn locate(&self, ctx: &Context, location: &str) -> Result<PathBuf, SchemaError> {
        let path = Path::new(location);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        match &ctx.base_dir {
            Some(base) => Ok(base.join(path)),
            None => Err(ctx.error(format!(
                "cannot resolve relative schemaLocation '{}' without a base directory",
                location
            ))),
        }
    }

    fn declare(&self, ctx: &Context, kind: &str, name: QName) -> Result<(), SchemaError> {
        if self.elements.contains_key(&name) {
            return Err(ctx.error(format!("duplicate {} declaration '{}'", kind, name)));
        }
        Ok(())
    }

    fn anonymous(&mut self, raw: RawType) -> RawTypeRef {
        self.types.push(raw);
        RawTypeRef::Anonymous(self.types.len() - 1)
    }

    /// `type` attribute, or an inline `simpleType`/`complexType` child
    fn type_ref(&mut self, ctx: &Context, node: Node<'_, '_>, attribute: &str) -> Result<Option<RawTypeRef>, SchemaError> {
        if let Some(name) = node.attribute(attribute) {
            return Ok(Some(RawTypeRef::Named(ctx.resolve(node, name)?)));
        }
        match xs_children(node).find(|c| matches!(c.tag_name().name(), "simpleType" | "complexType")) {
            Some(inline) => {
                let raw = self.type_definition(ctx, inline)?;
                Ok(Some(self.anonymous(raw)))
            }
            None => Ok(None),
        }
    }

    fn element(&mut self, ctx: &Context, node: Node<'_, '_>, global: bool) -> Result<RawElement, SchemaError> {
        let local = required(ctx, node, "name")?;
        let qualified = global
            || match node.attribute("form") {
                Some(form) => form == "qualified",
                None => ctx.element_qualified,
            };
        let name = if qualified { ctx.qualified(local) } else { QName::local(local) };
        Ok(RawElement {
            name,
            type_ref: self.type_ref(ctx, node, "type")?,
            nillable: flag(node, "nillable"),
            default: node.attribute("default").map(str::to_string),
            fixed: node.attribute("fixed").map(str::to_string),
        })
    }

    fn attribute(&mut self, ctx: &Context, node: Node<'_, '_>, global: bool) -> Result<RawAttribute, SchemaError> {
        let local = required(ctx, node, "name")?;
        let qualified = global
            || match node.attribute("form") {
                Some(form) => form == "qualified",
                None => ctx.attribute_qualified,
            };
        let name = if qualified { ctx.qualified(local) } else { QName::local(local) };
        Ok(RawAttribute {
            name,
            type_ref: self.type_ref(ctx, node, "type")?,
            default: node.attribute("default").map(str::to_string),
            fixed: node.attribute("fixed").map(str::to_string),
        })
    }

    fn usage(ctx: &Context, node: Node<'_, '_>) -> Result<Use, SchemaError> {
        match node.attribute("use") {
            None | Some("optional") => Ok(Use::Optional),
            Some("required") => Ok(Use::Required),
            Some("prohibited") => Ok(Use::Prohibited),
            Some(other) => Err(ctx.error(format!("invalid attribute use '{}'", other))),
        }
    }

    fn wildcard(ctx: &Context, node: Node<'_, '_>) -> Result<Wildcard, SchemaError> {
        Ok(Wildcard {
            namespaces: NamespaceConstraint::parse(node.attribute("namespace"), ctx.target.as_deref()),
            process: ProcessContents::parse(node.attribute("processContents"))
                .map_err(|e| ctx.error(e.message))?,
        })
    }

    /// Attribute declarations, references, groups and `anyAttribute` among
    /// the children of `node`
    fn attributes(&mut self, ctx: &Context, node: Node<'_, '_>) -> Result<RawAttributes, SchemaError> {
        let mut attributes = RawAttributes::default();
        for child in xs_children(node) {
            match child.tag_name().name() {
                "attribute" => {
                    let usage = Self::usage(ctx, child)?;
                    let item = match child.attribute("ref") {
                        Some(reference) => RawAttributeItem::Ref {
                            name: ctx.resolve(child, reference)?,
                            usage,
                            default: child.attribute("default").map(str::to_string),
                            fixed: child.attribute("fixed").map(str::to_string),
                        },
                        None => RawAttributeItem::Local(self.attribute(ctx, child, false)?, usage),
                    };
                    attributes.items.push(item);
                }
                "attributeGroup" => {
                    let reference = required(ctx, child, "ref")?;
                    attributes.items.push(RawAttributeItem::Group(ctx.resolve(child, reference)?));
                }
                "anyAttribute" => attributes.any = Some(Self::wildcard(ctx, child)?),
                _ => {}
            }
        }
        Ok(attributes)
    }

    fn particle(&mut self, ctx: &Context, node: Node<'_, '_>) -> Result<RawParticle, SchemaError> {
        let occurs = Occurs::parse(node.attribute("minOccurs"), node.attribute("maxOccurs"))
            .map_err(|e| ctx.error(e.message))?;
        let name = node.tag_name().name();
        let term = match name {
            "element" => match node.attribute("ref") {
                Some(reference) => RawTerm::ElementRef(ctx.resolve(node, reference)?),
                None => RawTerm::Element(self.element(ctx, node, false)?),
            },
            "group" => RawTerm::GroupRef(ctx.resolve(node, required(ctx, node, "ref")?)?),
            "any" => RawTerm::Any(Self::wildcard(ctx, node)?),
            _ => {
                let compositor = Compositor::from_local_name(name)
                    .ok_or_else(|| ctx.error(format!("xs:{} is not a particle", name)))?;
                let mut particles = Vec::new();
                for child in xs_children(node) {
                    if compositor == Compositor::All && child.tag_name().name() != "element" {
                        return Err(ctx.error("xs:all may only contain element declarations"));
                    }
                    if compositor != Compositor::All && child.tag_name().name() == "all" {
                        return Err(ctx.error("xs:all must be the only model group of a content model"));
                    }
                    particles.push(self.particle(ctx, child)?);
                }
                RawTerm::Group(compositor, particles)
            }
        };
        Ok(RawParticle { occurs, term })
    }

    /// First model group or group reference among the children of `node`
    fn content_particle(&mut self, ctx: &Context, node: Node<'_, '_>) -> Result<Option<RawParticle>, SchemaError> {
        match xs_children(node).find(|c| matches!(c.tag_name().name(), "group" | "all" | "choice" | "sequence")) {
            Some(child) => Ok(Some(self.particle(ctx, child)?)),
            None => Ok(None),
        }
    }

    fn type_definition(&mut self, ctx: &Context, node: Node<'_, '_>) -> Result<RawType, SchemaError> {
        match node.tag_name().name() {
            "simpleType" => Ok(RawType::Simple(self.simple_type(ctx, node)?)),
            _ => Ok(RawType::Complex(self.complex_type(ctx, node)?)),
        }
    }

    fn facets(ctx: &Context, node: Node<'_, '_>) -> Result<Facets, SchemaError> {
        let mut facets = Facets::default();
        for child in xs_children(node) {
            let name = child.tag_name().name();
            if Facets::is_facet(name) {
                facets
                    .add(name, required(ctx, child, "value")?)
                    .map_err(|e| ctx.error(e.message))?;
            }
        }
        Ok(facets)
    }

    fn simple_type(&mut self, ctx: &Context, node: Node<'_, '_>) -> Result<RawSimple, SchemaError> {
        let variety = xs_children(node)
            .next()
            .ok_or_else(|| ctx.error("xs:simpleType needs a restriction, list or union"))?;
        match variety.tag_name().name() {
            "restriction" => Ok(RawSimple::Restriction {
                base: self
                    .type_ref(ctx, variety, "base")?
                    .ok_or_else(|| ctx.error("xs:restriction needs a base type"))?,
                facets: Self::facets(ctx, variety)?,
            }),
            "list" => Ok(RawSimple::List {
                item: self
                    .type_ref(ctx, variety, "itemType")?
                    .ok_or_else(|| ctx.error("xs:list needs an item type"))?,
            }),
            "union" => {
                let mut members = Vec::new();
                for member in variety.attribute("memberTypes").unwrap_or_default().split_whitespace() {
                    members.push(RawTypeRef::Named(ctx.resolve(variety, member)?));
                }
                for inline in xs_children(variety).filter(|c| c.tag_name().name() == "simpleType") {
                    let raw = self.simple_type(ctx, inline)?;
                    members.push(self.anonymous(RawType::Simple(raw)));
                }
                if members.is_empty() {
                    return Err(ctx.error("xs:union needs member types"));
                }
                Ok(RawSimple::Union { members })
            }
            other => Err(ctx.error(format!("unexpected xs:{} in xs:simpleType", other))),
        }
    }

    fn complex_type(&mut self, ctx: &Context, node: Node<'_, '_>) -> Result<RawComplex, SchemaError> {
        let mixed = flag(node, "mixed");
        let model = xs_children(node).find(|c| matches!(c.tag_name().name(), "simpleContent" | "complexContent"));
        let Some(model) = model else {
            return Ok(RawComplex {
                content: RawContent::Complex {
                    derivation: None,
                    particle: self.content_particle(ctx, node)?,
                    mixed,
                },
                attributes: self.attributes(ctx, node)?,
            });
        };

        let step = xs_children(model)
            .find(|c| matches!(c.tag_name().name(), "extension" | "restriction"))
            .ok_or_else(|| ctx.error(format!("xs:{} needs an extension or restriction", model.tag_name().name())))?;
        let derivation = if step.tag_name().name() == "extension" {
            Derivation::Extension
        } else {
            Derivation::Restriction
        };
        let base = RawTypeRef::Named(ctx.resolve(step, required(ctx, step, "base")?)?);
        let attributes = self.attributes(ctx, step)?;

        let content = if model.tag_name().name() == "simpleContent" {
            let inline = match xs_children(step).find(|c| c.tag_name().name() == "simpleType") {
                Some(inline) => {
                    let raw = self.simple_type(ctx, inline)?;
                    Some(self.anonymous(RawType::Simple(raw)))
                }
                None => None,
            };
            RawContent::Simple {
                derivation,
                base,
                inline,
                facets: Self::facets(ctx, step)?,
            }
        } else {
            let mixed = match model.attribute("mixed") {
                Some(_) => flag(model, "mixed"),
                None => mixed,
            };
            RawContent::Complex {
                derivation: Some((derivation, base)),
                particle: self.content_particle(ctx, step)?,
                mixed,
            }
        };
        Ok(RawComplex { content, attributes })
    }

    /// Resolve every reference and produce the schema
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut resolver = Resolver::new(&self);
        for index in 0..self.types.len() {
            resolver.resolve_type(index)?;
        }

        let mut elements = IndexMap::new();
        for (name, raw) in &self.elements {
            elements.insert(name.clone(), resolver.element(raw)?);
        }
        let mut attributes = IndexMap::new();
        for (name, raw) in &self.attributes {
            attributes.insert(name.clone(), resolver.attribute(raw, Use::Optional, None, None)?);
        }

        let names = resolver.names;
        let types = resolver
            .types
            .into_iter()
            .collect::<Option<Vec<TypeDef>>>()
            .ok_or_else(|| SchemaError::new("unresolved type definition"))?;
        debug!(
            types = types.len(),
            elements = elements.len(),
            "schema built"
        );
        let schema = Schema {
            target_namespace: self.target_namespace,
            types,
            type_names: names,
            elements,
            attributes,
        };
        schema.check_value_constraints()?;
        Ok(schema)
    }
}

/// Turns raw components into resolved ones
struct Resolver<'b> {
    raw: &'b SchemaBuilder,
    types: Vec<Option<TypeDef>>,
    names: IndexMap<QName, TypeId>,
    in_progress: HashSet<usize>,
    any_type: TypeId,
    any_simple_type: TypeId,
}

impl<'b> Resolver<'b> {
    fn new(raw: &'b SchemaBuilder) -> Self {
        let mut types: Vec<Option<TypeDef>> = vec![None; raw.types.len()];
        let mut names = raw.type_names.clone();

        types.push(Some(TypeDef::AnyType));
        let any_type = types.len() - 1;
        names.insert(QName::namespaced(NAMESPACE_XS, "anyType"), any_type);

        let mut any_simple_type = any_type;
        for &builtin in Builtin::ALL {
            types.push(Some(TypeDef::Simple(SimpleType::Builtin(builtin))));
            let id = types.len() - 1;
            if builtin == Builtin::AnySimpleType {
                any_simple_type = id;
            }
            names.insert(QName::namespaced(NAMESPACE_XS, builtin.name()), id);
        }

        Self {
            raw,
            types,
            names,
            in_progress: HashSet::new(),
            any_type,
            any_simple_type,
        }
    }

    fn type_id(&self, reference: &RawTypeRef) -> Result<TypeId, SchemaError> {
        match reference {
            RawTypeRef::Named(name) => self
                .names
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::new(format!("unknown type '{}'", name))),
            RawTypeRef::Anonymous(index) => Ok(*index),
        }
    }

    /// Resolved definition of `id`, resolving it first if needed
    fn definition(&mut self, id: TypeId) -> Result<&TypeDef, SchemaError> {
        if id < self.raw.types.len() {
            self.resolve_type(id)?;
        }
        self.types[id]
            .as_ref()
            .ok_or_else(|| SchemaError::new("unresolved type definition"))
    }

    fn simple_base(&mut self, reference: &RawTypeRef) -> Result<TypeId, SchemaError> {
        let id = self.type_id(reference)?;
        match self.definition(id)? {
            TypeDef::Simple(_) => Ok(id),
            _ => Err(SchemaError::new(format!(
                "type {:?} used as a simple type is not a simple type",
                reference_name(reference)
            ))),
        }
    }

    fn resolve_type(&mut self, index: usize) -> Result<(), SchemaError> {
        if self.types[index].is_some() {
            return Ok(());
        }
        if !self.in_progress.insert(index) {
            return Err(SchemaError::new("circular type definition"));
        }
        let raw = self.raw;
        let resolved = match &raw.types[index] {
            RawType::Simple(raw) => TypeDef::Simple(self.simple(raw)?),
            RawType::Complex(raw) => TypeDef::Complex(self.complex(raw)?),
        };
        self.types[index] = Some(resolved);
        self.in_progress.remove(&index);
        Ok(())
    }

    fn simple(&mut self, raw: &RawSimple) -> Result<SimpleType, SchemaError> {
        Ok(match raw {
            RawSimple::Restriction { base, facets } => SimpleType::Restriction {
                base: self.simple_base(base)?,
                facets: facets.clone(),
            },
            RawSimple::List { item } => SimpleType::List {
                item: self.simple_base(item)?,
            },
            RawSimple::Union { members } => SimpleType::Union {
                members: members
                    .iter()
                    .map(|member| self.simple_base(member))
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    fn content(&mut self, particle: &Option<RawParticle>, mixed: bool) -> Result<Content, SchemaError> {
        Ok(match particle {
            Some(raw) => Content::Elements {
                particle: self.particle(raw, &mut Vec::new())?,
                mixed,
            },
            None if mixed => Content::Elements {
                particle: Particle::empty_sequence(),
                mixed,
            },
            None => Content::Empty,
        })
    }

    fn complex(&mut self, raw: &RawComplex) -> Result<ComplexType, SchemaError> {
        let (own, prohibited, own_any) = self.attribute_uses(&raw.attributes, &mut Vec::new())?;

        match &raw.content {
            RawContent::Complex {
                derivation: None,
                particle,
                mixed,
            } => Ok(ComplexType {
                content: self.content(particle, *mixed)?,
                attributes: own,
                any_attribute: own_any,
            }),
            RawContent::Complex {
                derivation: Some((derivation, base)),
                particle,
                mixed,
            } => {
                let base_id = self.type_id(base)?;
                let base = match self.definition(base_id)? {
                    TypeDef::AnyType => None,
                    TypeDef::Complex(complex) => Some(complex.clone()),
                    TypeDef::Simple(_) => {
                        return Err(SchemaError::new(format!(
                            "complexContent cannot derive from simple type {:?}",
                            reference_name(base)
                        )))
                    }
                };
                let own_content = self.content(particle, *mixed)?;
                let Some(base) = base else {
                    return Ok(ComplexType {
                        content: own_content,
                        attributes: own,
                        any_attribute: own_any,
                    });
                };
                match derivation {
                    Derivation::Extension => Ok(ComplexType {
                        content: extend(base.content, own_content)?,
                        attributes: merge(base.attributes, own, &prohibited),
                        any_attribute: own_any.or(base.any_attribute),
                    }),
                    Derivation::Restriction => Ok(ComplexType {
                        content: own_content,
                        attributes: merge(base.attributes, own, &prohibited),
                        any_attribute: own_any,
                    }),
                }
            }
            RawContent::Simple {
                derivation,
                base,
                inline,
                facets,
            } => {
                let base_id = self.type_id(base)?;
                let (simple, base_attributes, base_any) = match self.definition(base_id)? {
                    TypeDef::Simple(_) => (base_id, Vec::new(), None),
                    TypeDef::Complex(ComplexType {
                        content: Content::Simple(simple),
                        attributes,
                        any_attribute,
                    }) => (*simple, attributes.clone(), any_attribute.clone()),
                    _ => {
                        return Err(SchemaError::new(format!(
                            "simpleContent base {:?} has no simple content",
                            reference_name(base)
                        )))
                    }
                };
                let content_type = match derivation {
                    Derivation::Extension => simple,
                    Derivation::Restriction => {
                        let restricted = match inline {
                            Some(inline) => self.simple_base(inline)?,
                            None => simple,
                        };
                        self.types.push(Some(TypeDef::Simple(SimpleType::Restriction {
                            base: restricted,
                            facets: facets.clone(),
                        })));
                        self.types.len() - 1
                    }
                };
                let any_attribute = match derivation {
                    Derivation::Extension => own_any.or(base_any),
                    Derivation::Restriction => own_any,
                };
                Ok(ComplexType {
                    content: Content::Simple(content_type),
                    attributes: merge(base_attributes, own, &prohibited),
                    any_attribute,
                })
            }
        }
    }

    fn element(&self, raw: &RawElement) -> Result<ElementDecl, SchemaError> {
        Ok(ElementDecl {
            name: raw.name.clone(),
            type_id: match &raw.type_ref {
                Some(reference) => self.type_id(reference)?,
                None => self.any_type,
            },
            nillable: raw.nillable,
            default: raw.default.clone(),
            fixed: raw.fixed.clone(),
        })
    }

    fn attribute(
        &self,
        raw: &RawAttribute,
        usage: Use,
        default: Option<&String>,
        fixed: Option<&String>,
    ) -> Result<AttributeUse, SchemaError> {
        Ok(AttributeUse {
            name: raw.name.clone(),
            type_id: match &raw.type_ref {
                Some(reference) => self.type_id(reference)?,
                None => self.any_simple_type,
            },
            required: usage == Use::Required,
            default: default.or(raw.default.as_ref()).cloned(),
            fixed: fixed.or(raw.fixed.as_ref()).cloned(),
        })
    }

    /// Attribute uses, prohibited names and wildcard of an attribute list
    fn attribute_uses(
        &self,
        raw: &RawAttributes,
        groups: &mut Vec<QName>,
    ) -> Result<(Vec<AttributeUse>, Vec<QName>, Option<Wildcard>), SchemaError> {
        let mut uses: Vec<AttributeUse> = Vec::new();
        let mut prohibited = Vec::new();
        let mut any = raw.any.clone();

        let add = |uses: &mut Vec<AttributeUse>, attribute: AttributeUse| {
            uses.retain(|existing| existing.name != attribute.name);
            uses.push(attribute);
        };

        for item in &raw.items {
            match item {
                RawAttributeItem::Local(decl, usage) => {
                    if *usage == Use::Prohibited {
                        prohibited.push(decl.name.clone());
                    } else {
                        add(&mut uses, self.attribute(decl, *usage, None, None)?);
                    }
                }
                RawAttributeItem::Ref {
                    name,
                    usage,
                    default,
                    fixed,
                } => {
                    if *usage == Use::Prohibited {
                        prohibited.push(name.clone());
                        continue;
                    }
                    let decl = self
                        .raw
                        .attributes
                        .get(name)
                        .ok_or_else(|| SchemaError::new(format!("unknown attribute '{}'", name)))?;
                    add(&mut uses, self.attribute(decl, *usage, default.as_ref(), fixed.as_ref())?);
                }
                RawAttributeItem::Group(name) => {
                    if groups.contains(name) {
                        return Err(SchemaError::new(format!("circular attribute group '{}'", name)));
                    }
                    let group = self
                        .raw
                        .attribute_groups
                        .get(name)
                        .ok_or_else(|| SchemaError::new(format!("unknown attribute group '{}'", name)))?;
                    groups.push(name.clone());
                    let (group_uses, group_prohibited, group_any) = self.attribute_uses(group, groups)?;
                    groups.pop();
                    for attribute in group_uses {
                        add(&mut uses, attribute);
                    }
                    prohibited.extend(group_prohibited);
                    any = any.or(group_any);
                }
            }
        }
        Ok((uses, prohibited, any))
    }

    fn particle(&self, raw: &RawParticle, groups: &mut Vec<QName>) -> Result<Particle, SchemaError> {
        let term = match &raw.term {
            RawTerm::Element(element) => Term::Element(Box::new(self.element(element)?)),
            RawTerm::ElementRef(name) => {
                let global = self
                    .raw
                    .elements
                    .get(name)
                    .ok_or_else(|| SchemaError::new(format!("unknown element '{}'", name)))?;
                Term::Element(Box::new(self.element(global)?))
            }
            RawTerm::Group(compositor, particles) => Term::Group(ModelGroup {
                compositor: *compositor,
                particles: particles
                    .iter()
                    .map(|particle| self.particle(particle, groups))
                    .collect::<Result<_, _>>()?,
            }),
            RawTerm::GroupRef(name) => {
                if groups.contains(name) {
                    return Err(SchemaError::new(format!("circular model group '{}'", name)));
                }
                let group = self
                    .raw
                    .groups
                    .get(name)
                    .ok_or_else(|| SchemaError::new(format!("unknown model group '{}'", name)))?;
                groups.push(name.clone());
                let resolved = self.particle(group, groups)?;
                groups.pop();
                resolved.term
            }
            RawTerm::Any(wildcard) => Term::Any(wildcard.clone()),
        };
        Ok(Particle {
            occurs: raw.occurs,
            term,
        })
    }
}

fn reference_name(reference: &RawTypeRef) -> String {
    match reference {
        RawTypeRef::Named(name) => name.to_string(),
        RawTypeRef::Anonymous(_) => "(anonymous)".to_string(),
    }
}

/// Content of a type extending `base` with `own`
fn extend(base: Content, own: Content) -> Result<Content, SchemaError> {
    match (base, own) {
        (base, Content::Empty) => Ok(base),
        (Content::Empty, own) => Ok(own),
        (
            Content::Elements {
                particle: base_particle,
                mixed: base_mixed,
            },
            Content::Elements { particle, mixed },
        ) => {
            if base_particle.as_all().is_some() || particle.as_all().is_some() {
                return Err(SchemaError::new("an xs:all content model cannot be extended"));
            }
            Ok(Content::Elements {
                particle: base_particle.then(particle),
                mixed: mixed || base_mixed,
            })
        }
        (Content::Simple(_), _) | (_, Content::Simple(_)) => Err(SchemaError::new(
            "complexContent cannot extend a type with simple content",
        )),
    }
}

/// Base attribute uses overridden by `own`, without the `prohibited` ones
fn merge(base: Vec<AttributeUse>, own: Vec<AttributeUse>, prohibited: &[QName]) -> Vec<AttributeUse> {
    let mut merged: Vec<AttributeUse> = base
        .into_iter()
        .filter(|attribute| !prohibited.contains(&attribute.name))
        .filter(|attribute| !own.iter().any(|o| o.name == attribute.name))
        .collect();
    merged.extend(own);
    merged
}
