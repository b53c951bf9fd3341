//! Arena-backed XML Schema document model.
//!
//! Nodes are addressed by [`NodeId`], which stays stable across clones and
//! across unrelated mutations, so higher layers can key identity caches on it.
//! Only elements in the XML Schema namespace are modelled; foreign markup
//! inside `xs:appinfo` is dropped on parse.

mod parser;
mod writer;

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::error::SchemaError;

pub type Result<T> = std::result::Result<T, SchemaError>;

/// The XML Schema namespace
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Upper bound on the size of a schema text accepted by the parser
pub const MAX_SCHEMA_SIZE: usize = 16 * 1024 * 1024;

/// Cached regex for NCName validation
static NCNAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_ncname_regex() -> &'static Regex {
    NCNAME_REGEX.get_or_init(|| {
        Regex::new(r"^[\p{L}_][\p{L}\p{N}._\-]*$").expect("Failed to compile NCName regex")
    })
}

/// Whether `name` is a valid non-colonized XML name
pub fn is_ncname(name: &str) -> bool {
    get_ncname_regex().is_match(name)
}

/// Stable handle of a node inside one [`SchemaDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identity of a schema document, normally its resolved location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(location: &str) -> Self {
        Self::new(location)
    }
}

/// Kind of schema node, by local name in the XML Schema namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Schema,
    Import,
    Include,
    Redefine,
    Element,
    Attribute,
    ComplexType,
    SimpleType,
    Group,
    AttributeGroup,
    Sequence,
    Choice,
    All,
    Any,
    AnyAttribute,
    ComplexContent,
    SimpleContent,
    Extension,
    Restriction,
    Annotation,
    /// Facets, documentation, identity constraints and anything else kept verbatim
    Other,
}

impl SchemaKind {
    pub fn from_local_name(name: &str) -> Self {
        match name {
            "schema" => Self::Schema,
            "import" => Self::Import,
            "include" => Self::Include,
            "redefine" => Self::Redefine,
            "element" => Self::Element,
            "attribute" => Self::Attribute,
            "complexType" => Self::ComplexType,
            "simpleType" => Self::SimpleType,
            "group" => Self::Group,
            "attributeGroup" => Self::AttributeGroup,
            "sequence" => Self::Sequence,
            "choice" => Self::Choice,
            "all" => Self::All,
            "any" => Self::Any,
            "anyAttribute" => Self::AnyAttribute,
            "complexContent" => Self::ComplexContent,
            "simpleContent" => Self::SimpleContent,
            "extension" => Self::Extension,
            "restriction" => Self::Restriction,
            "annotation" => Self::Annotation,
            _ => Self::Other,
        }
    }

    /// Local name used when serializing; `None` for [`SchemaKind::Other`]
    pub fn local_name(self) -> Option<&'static str> {
        Some(match self {
            Self::Schema => "schema",
            Self::Import => "import",
            Self::Include => "include",
            Self::Redefine => "redefine",
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::ComplexType => "complexType",
            Self::SimpleType => "simpleType",
            Self::Group => "group",
            Self::AttributeGroup => "attributeGroup",
            Self::Sequence => "sequence",
            Self::Choice => "choice",
            Self::All => "all",
            Self::Any => "any",
            Self::AnyAttribute => "anyAttribute",
            Self::ComplexContent => "complexContent",
            Self::SimpleContent => "simpleContent",
            Self::Extension => "extension",
            Self::Restriction => "restriction",
            Self::Annotation => "annotation",
            Self::Other => return None,
        })
    }

    pub fn is_compositor(self) -> bool {
        matches!(self, Self::Sequence | Self::Choice | Self::All)
    }

    /// Kinds that may appear as named top-level declarations
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            Self::Element
                | Self::Attribute
                | Self::ComplexType
                | Self::SimpleType
                | Self::Group
                | Self::AttributeGroup
        )
    }

    /// Kinds sharing one symbol space for global names
    fn symbol_space(self) -> u8 {
        match self {
            Self::Element => 0,
            Self::ComplexType | Self::SimpleType => 1,
            Self::Group => 2,
            Self::AttributeGroup => 3,
            Self::Attribute => 4,
            _ => 5,
        }
    }
}

/// A namespace-resolved reference value (`ref`, `type`, `base`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn is_builtin(&self) -> bool {
        self.namespace.as_deref() == Some(XS_NAMESPACE)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// An `xs:import` or `xs:include` of another document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub kind: SchemaKind,
    pub namespace: Option<String>,
    pub location: Option<String>,
}

/// Declaration counts used to compare document shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeclarationCounts {
    pub global_elements: usize,
    pub local_elements: usize,
    pub element_refs: usize,
    pub complex_types: usize,
    pub simple_types: usize,
    pub groups: usize,
    pub attribute_groups: usize,
    pub global_attributes: usize,
}

/// A single schema node
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    kind: SchemaKind,
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    text: Option<String>,
}

impl SchemaNode {
    fn new(kind: SchemaKind, tag: impl Into<String>) -> Self {
        Self {
            kind,
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
            text: None,
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute("name")
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// An XML Schema document held in an arena
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    id: DocumentId,
    nodes: Vec<Option<SchemaNode>>,
    root: NodeId,
    namespaces: Vec<(String, String)>,
    revision: u64,
}

impl SchemaDocument {
    /// Create an empty schema, optionally with a target namespace bound to `tns`
    pub fn new(id: impl Into<DocumentId>, target_namespace: Option<&str>) -> Self {
        let mut doc = Self::with_root(id.into());
        doc.namespaces
            .push(("xs".to_string(), XS_NAMESPACE.to_string()));
        if let Some(tns) = target_namespace {
            doc.namespaces.push(("tns".to_string(), tns.to_string()));
            doc.write_attribute(doc.root, "targetNamespace", tns);
            doc.write_attribute(doc.root, "elementFormDefault", "qualified");
        }
        doc
    }

    fn with_root(id: DocumentId) -> Self {
        Self {
            id,
            nodes: vec![Some(SchemaNode::new(SchemaKind::Schema, "schema"))],
            root: NodeId(0),
            namespaces: Vec::new(),
            revision: 0,
        }
    }

    /// Parse schema text
    pub fn parse(id: impl Into<DocumentId>, text: &str) -> Result<Self> {
        parser::parse(id.into(), text)
    }

    /// Serialize to indented XML text
    pub fn to_xml(&self) -> Result<String> {
        writer::write(self)
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Monotonic counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    pub fn node(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get(&self, id: NodeId) -> Result<&SchemaNode> {
        self.node(id).ok_or(SchemaError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut SchemaNode> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SchemaError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<SchemaKind> {
        self.node(id).map(SchemaNode::kind)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id).and_then(|node| node.attribute(name))
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.attribute(id, "name")
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(SchemaNode::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(SchemaNode::parent)
    }

    /// First child of the given kind
    pub fn child_of_kind(&self, id: NodeId, kind: SchemaKind) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.kind(*child) == Some(kind))
    }

    /// Whether the node is a top-level child of the schema root
    pub fn is_global(&self, id: NodeId) -> bool {
        self.parent(id) == Some(self.root)
    }

    /// The top-level node containing `id` (itself when global)
    pub fn top_level_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    /// All nodes below `id` in document order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        result
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.attribute(self.root, "targetNamespace")
    }

    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Preferred prefix bound to `uri`; a non-empty prefix wins over the default namespace
    pub fn prefix_for_namespace(&self, uri: &str) -> Option<&str> {
        let mut default = None;
        for (prefix, bound) in &self.namespaces {
            if bound == uri {
                if prefix.is_empty() {
                    default = Some(prefix.as_str());
                } else {
                    return Some(prefix.as_str());
                }
            }
        }
        default
    }

    /// Prefix used for XML Schema elements when serializing
    pub fn xs_prefix(&self) -> &str {
        self.prefix_for_namespace(XS_NAMESPACE).unwrap_or("xs")
    }

    pub fn declare_namespace(&mut self, prefix: &str, uri: &str) {
        match self.namespaces.iter_mut().find(|(p, _)| p == prefix) {
            Some(binding) => binding.1 = uri.to_string(),
            None => self.namespaces.push((prefix.to_string(), uri.to_string())),
        }
        self.revision += 1;
    }

    /// Make sure the target namespace can be referenced with a prefix
    pub fn ensure_target_prefix(&mut self) {
        let Some(tns) = self.target_namespace().map(str::to_string) else {
            return;
        };
        if self.prefix_for_namespace(&tns).is_some() {
            return;
        }
        let mut prefix = "tns".to_string();
        let mut counter = 1;
        while self.namespace_for_prefix(&prefix).is_some() {
            prefix = format!("tns{}", counter);
            counter += 1;
        }
        self.declare_namespace(&prefix, &tns);
    }

    /// Resolve a `prefix:local` reference value against the document's bindings
    pub fn resolve_qname(&self, value: &str) -> Option<QName> {
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local)) => Some(QName {
                namespace: Some(self.namespace_for_prefix(prefix)?.to_string()),
                local: local.to_string(),
            }),
            None => Some(QName {
                namespace: self.namespace_for_prefix("").map(str::to_string),
                local: value.to_string(),
            }),
        }
    }

    /// Reference value naming a declaration of this document
    pub fn qualify(&self, local: &str) -> String {
        match self.target_namespace() {
            None => local.to_string(),
            Some(tns) => match self.prefix_for_namespace(tns) {
                Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
                _ => local.to_string(),
            },
        }
    }

    /// Reference value naming a built-in XML Schema type
    pub fn builtin(&self, local: &str) -> String {
        match self.prefix_for_namespace(XS_NAMESPACE) {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
            _ => local.to_string(),
        }
    }

    /// Whether a resolved reference points into this document's namespace
    pub fn is_own_namespace(&self, qname: &QName) -> bool {
        qname.namespace.as_deref() == self.target_namespace()
    }

    /// Top-level declarations of a kind, in document order
    pub fn globals(&self, kind: SchemaKind) -> Vec<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .filter(|child| self.kind(*child) == Some(kind))
            .collect()
    }

    pub fn find_global(&self, kind: SchemaKind, local: &str) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|child| self.kind(*child) == Some(kind) && self.name(*child) == Some(local))
    }

    /// Resolve a reference to a top-level declaration of this document
    pub fn find_global_ref(&self, kind: SchemaKind, qname: &QName) -> Option<NodeId> {
        if !self.is_own_namespace(qname) {
            return None;
        }
        match kind {
            SchemaKind::ComplexType | SchemaKind::SimpleType => self
                .find_global(SchemaKind::ComplexType, &qname.local)
                .or_else(|| self.find_global(SchemaKind::SimpleType, &qname.local)),
            _ => self.find_global(kind, &qname.local),
        }
    }

    /// Imports and includes in document order
    pub fn external_refs(&self) -> Vec<ExternalRef> {
        self.children(self.root)
            .iter()
            .copied()
            .filter_map(|child| {
                let kind = self.kind(child)?;
                if !matches!(
                    kind,
                    SchemaKind::Import | SchemaKind::Include | SchemaKind::Redefine
                ) {
                    return None;
                }
                Some(ExternalRef {
                    kind,
                    namespace: self.attribute(child, "namespace").map(str::to_string),
                    location: self
                        .attribute(child, "schemaLocation")
                        .map(str::to_string),
                })
            })
            .collect()
    }

    pub fn declaration_counts(&self) -> DeclarationCounts {
        let mut counts = DeclarationCounts::default();
        for id in self.descendants(self.root) {
            let global = self.is_global(id);
            match self.kind(id) {
                Some(SchemaKind::Element) if global => counts.global_elements += 1,
                Some(SchemaKind::Element) if self.attribute(id, "ref").is_some() => {
                    counts.element_refs += 1
                }
                Some(SchemaKind::Element) => counts.local_elements += 1,
                Some(SchemaKind::ComplexType) if global => counts.complex_types += 1,
                Some(SchemaKind::SimpleType) if global => counts.simple_types += 1,
                Some(SchemaKind::Group) if global => counts.groups += 1,
                Some(SchemaKind::AttributeGroup) if global => counts.attribute_groups += 1,
                Some(SchemaKind::Attribute) if global => counts.global_attributes += 1,
                _ => {}
            }
        }
        counts
    }

    /// Nodes whose reference attributes resolve to the top-level declaration `target`
    pub fn references_to(&self, target: NodeId) -> Vec<NodeId> {
        let (Some(kind), Some(name)) = (self.kind(target), self.name(target)) else {
            return Vec::new();
        };
        let wanted = QName {
            namespace: self.target_namespace().map(str::to_string),
            local: name.to_string(),
        };
        self.descendants(self.root)
            .into_iter()
            .filter(|id| {
                reference_attributes(kind, self.kind(*id))
                    .iter()
                    .any(|attr| {
                        self.attribute(*id, attr)
                            .and_then(|value| self.resolve_qname(value))
                            .is_some_and(|qname| qname == wanted)
                    })
            })
            .collect()
    }

    // Mutation primitives

    fn alloc(&mut self, node: SchemaNode) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    /// Create a detached node of a known kind
    pub fn create_node(&mut self, kind: SchemaKind) -> NodeId {
        let tag = kind.local_name().unwrap_or("appinfo");
        self.revision += 1;
        self.alloc(SchemaNode::new(kind, tag))
    }

    /// Create a detached node by local name
    pub fn create_tagged(&mut self, tag: &str) -> NodeId {
        self.revision += 1;
        self.alloc(SchemaNode::new(SchemaKind::from_local_name(tag), tag))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Attach `child` at `index` under `parent`, detaching it from any previous parent
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.get(parent)?;
        self.get(child)?;
        if child == self.root || child == parent || self.is_ancestor(child, parent) {
            return Err(SchemaError::InvalidOperation {
                details: format!("cannot attach {} below {}", child, parent),
            });
        }
        self.detach(child)?;
        let siblings = &mut self.get_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        self.revision += 1;
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn detach(&mut self, id: NodeId) -> Result<()> {
        if let Some(parent) = self.get(id)?.parent {
            self.get_mut(parent)?.children.retain(|child| *child != id);
            self.get_mut(id)?.parent = None;
        }
        Ok(())
    }

    /// Remove a node and its subtree; handles of removed nodes become invalid
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(SchemaError::InvalidOperation {
                details: "cannot remove the schema root".to_string(),
            });
        }
        self.detach(id)?;
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for node in doomed {
            if let Some(slot) = self.nodes.get_mut(node.0) {
                *slot = None;
            }
        }
        self.revision += 1;
        Ok(())
    }

    fn write_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::as_mut) {
            match node.attributes.iter_mut().find(|(key, _)| key == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => node.attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        self.get(id)?;
        self.write_attribute(id, name, value);
        self.revision += 1;
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>> {
        let node = self.get_mut(id)?;
        let position = node.attributes.iter().position(|(key, _)| key == name);
        let removed = position.map(|index| node.attributes.remove(index).1);
        if removed.is_some() {
            self.revision += 1;
        }
        Ok(removed)
    }

    pub fn set_text(&mut self, id: NodeId, text: Option<&str>) -> Result<()> {
        self.get_mut(id)?.text = text.map(str::to_string);
        self.revision += 1;
        Ok(())
    }

    fn check_global_name(&self, kind: SchemaKind, name: &str, except: Option<NodeId>) -> Result<()> {
        if !is_ncname(name) {
            return Err(SchemaError::InvalidOperation {
                details: format!("'{}' is not a valid declaration name", name),
            });
        }
        let clash = self.children(self.root).iter().copied().any(|child| {
            Some(child) != except
                && self.kind(child).is_some_and(|other| {
                    other.is_declaration() && other.symbol_space() == kind.symbol_space()
                })
                && self.name(child) == Some(name)
        });
        if clash {
            return Err(SchemaError::DuplicateDeclaration {
                kind: kind.local_name().unwrap_or("declaration").to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Append a named top-level declaration, rejecting name collisions
    pub fn add_global(&mut self, kind: SchemaKind, name: &str) -> Result<NodeId> {
        if !kind.is_declaration() {
            return Err(SchemaError::InvalidOperation {
                details: format!("{:?} cannot be declared globally", kind),
            });
        }
        self.check_global_name(kind, name, None)?;
        let id = self.create_node(kind);
        self.write_attribute(id, "name", name);
        self.append_child(self.root, id)?;
        Ok(id)
    }

    /// Rename a top-level declaration and rewrite every reference to it.
    /// Returns the number of rewritten references.
    pub fn rename_global(&mut self, id: NodeId, new_name: &str) -> Result<usize> {
        let kind = self.get(id)?.kind;
        if !self.is_global(id) || !kind.is_declaration() {
            return Err(SchemaError::InvalidOperation {
                details: format!("{} is not a global declaration", id),
            });
        }
        self.check_global_name(kind, new_name, Some(id))?;
        let referrers = self.references_to(id);
        let qualified = self.qualify(new_name);
        let wanted = QName {
            namespace: self.target_namespace().map(str::to_string),
            local: self.name(id).unwrap_or_default().to_string(),
        };
        for referrer in &referrers {
            for attr in reference_attributes(kind, self.kind(*referrer)) {
                let points_here = self
                    .attribute(*referrer, attr)
                    .and_then(|value| self.resolve_qname(value))
                    .is_some_and(|qname| qname == wanted);
                if points_here {
                    self.write_attribute(*referrer, attr, &qualified);
                }
            }
        }
        self.write_attribute(id, "name", new_name);
        self.revision += 1;
        Ok(referrers.len())
    }

    /// Copy a subtree of `source` under `parent`, returning the new subtree root
    pub fn copy_subtree(
        &mut self,
        source: &SchemaDocument,
        node: NodeId,
        parent: NodeId,
    ) -> Result<NodeId> {
        let original = source.get(node)?;
        let copy = self.alloc(SchemaNode {
            kind: original.kind,
            tag: original.tag.clone(),
            attributes: original.attributes.clone(),
            children: Vec::new(),
            parent: None,
            text: original.text.clone(),
        });
        self.append_child(parent, copy)?;
        for child in original.children.clone() {
            self.copy_subtree(source, child, copy)?;
        }
        Ok(copy)
    }

    /// Remove every top-level declaration, keeping imports, includes and annotations
    pub fn clear_declarations(&mut self) -> Result<()> {
        let doomed: Vec<NodeId> = self
            .children(self.root)
            .iter()
            .copied()
            .filter(|child| self.kind(*child).is_some_and(SchemaKind::is_declaration))
            .collect();
        for id in doomed {
            self.remove_node(id)?;
        }
        Ok(())
    }
}

/// Attributes of a node of kind `holder` that may name a declaration of kind `target`
fn reference_attributes(target: SchemaKind, holder: Option<SchemaKind>) -> &'static [&'static str] {
    match (target, holder) {
        (SchemaKind::Element, Some(SchemaKind::Element)) => &["ref", "substitutionGroup"],
        (SchemaKind::Attribute, Some(SchemaKind::Attribute)) => &["ref"],
        (SchemaKind::Group, Some(SchemaKind::Group)) => &["ref"],
        (SchemaKind::AttributeGroup, Some(SchemaKind::AttributeGroup)) => &["ref"],
        (
            SchemaKind::ComplexType | SchemaKind::SimpleType,
            Some(SchemaKind::Element | SchemaKind::Attribute),
        ) => &["type"],
        (
            SchemaKind::ComplexType | SchemaKind::SimpleType,
            Some(SchemaKind::Extension | SchemaKind::Restriction),
        ) => &["base"],
        (SchemaKind::SimpleType, Some(SchemaKind::Other)) => &["itemType"],
        _ => &[],
    }
}
