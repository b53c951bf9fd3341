//! Component variants of the AXI tree.

use std::fmt;
use std::str::FromStr;

use crate::schema::{NodeId, QName, SchemaKind};

/// Handle of a component inside one model's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

impl ComponentId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a model inside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(usize);

impl ModelId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Registry-wide address of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentRef {
    pub model: ModelId,
    pub id: ComponentId,
}

impl ComponentRef {
    pub fn new(model: ModelId, id: ComponentId) -> Self {
        Self { model, id }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.model, self.id)
    }
}

/// How a component relates to the declarations it mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Unshared node; it is its own original
    Local,
    /// Global declaration owned by the document root
    Shared,
    /// Same-document pointer to a shared component
    Reference,
    /// Read-only stand-in for a component, possibly in another model
    Proxy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositorKind {
    Sequence,
    Choice,
    All,
}

impl CompositorKind {
    pub fn from_schema_kind(kind: SchemaKind) -> Option<Self> {
        match kind {
            SchemaKind::Sequence => Some(Self::Sequence),
            SchemaKind::Choice => Some(Self::Choice),
            SchemaKind::All => Some(Self::All),
            _ => None,
        }
    }

    pub fn schema_kind(self) -> SchemaKind {
        match self {
            Self::Sequence => SchemaKind::Sequence,
            Self::Choice => SchemaKind::Choice,
            Self::All => SchemaKind::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentModelKind {
    ComplexType,
    Group,
    AttributeGroup,
}

impl ContentModelKind {
    pub fn schema_kind(self) -> SchemaKind {
        match self {
            Self::ComplexType => SchemaKind::ComplexType,
            Self::Group => SchemaKind::Group,
            Self::AttributeGroup => SchemaKind::AttributeGroup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Document,
    Element,
    Attribute,
    Compositor(CompositorKind),
    ContentModel(ContentModelKind),
}

impl ComponentKind {
    /// Whether a component of this kind may be attached below `parent`
    pub fn fits_under(self, parent: ComponentKind) -> bool {
        use ComponentKind::*;
        match (parent, self) {
            (Document, Element | Attribute | ContentModel(_)) => true,
            (Element, Compositor(_) | Attribute) => true,
            (ContentModel(ContentModelKind::ComplexType), Compositor(_) | Attribute) => true,
            (ContentModel(ContentModelKind::Group), Compositor(_)) => true,
            (ContentModel(ContentModelKind::AttributeGroup), Attribute) => true,
            (Compositor(_), Element | Compositor(_)) => true,
            _ => false,
        }
    }
}

/// Upper bound of an element or compositor cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{}", n),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl FromStr for MaxOccurs {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unbounded" => Ok(Self::Unbounded),
            n => n.parse().map(Self::Bounded),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeUse {
    #[default]
    Optional,
    Required,
    Prohibited,
}

impl AttributeUse {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "required" => Self::Required,
            "prohibited" => Self::Prohibited,
            _ => Self::Optional,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optional => "optional",
            Self::Required => "required",
            Self::Prohibited => "prohibited",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    Qualified,
    Unqualified,
}

/// Simple type associated with an element or attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Built-in XML Schema type, by local name (`string`, `int`, ...)
    Builtin(String),
    /// Named simple type declared in some schema
    Named(QName),
    /// Inline anonymous simple type
    Anonymous,
}

/// One node of the AXI tree
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub(crate) kind: ComponentKind,
    pub(crate) component_type: ComponentType,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) children_loaded: bool,
    pub(crate) peer: Option<NodeId>,
    pub(crate) name: Option<String>,
    pub(crate) target_namespace: Option<String>,
    pub(crate) min_occurs: u32,
    pub(crate) max_occurs: MaxOccurs,
    pub(crate) default_value: Option<String>,
    pub(crate) fixed_value: Option<String>,
    pub(crate) nillable: bool,
    pub(crate) is_abstract: bool,
    pub(crate) mixed: bool,
    pub(crate) form: Option<Form>,
    pub(crate) attribute_use: AttributeUse,
    pub(crate) datatype: Option<Datatype>,
    pub(crate) content_type: Option<ComponentRef>,
    pub(crate) shared: Option<ComponentId>,
    pub(crate) original: Option<ComponentRef>,
    pub(crate) ref_set: Vec<ComponentId>,
}

impl Component {
    pub(crate) fn new(kind: ComponentKind, component_type: ComponentType) -> Self {
        Self {
            kind,
            component_type,
            parent: None,
            children: Vec::new(),
            children_loaded: true,
            peer: None,
            name: None,
            target_namespace: None,
            min_occurs: 1,
            max_occurs: MaxOccurs::Bounded(1),
            default_value: None,
            fixed_value: None,
            nillable: false,
            is_abstract: false,
            mixed: false,
            form: None,
            attribute_use: AttributeUse::Optional,
            datatype: None,
            content_type: None,
            shared: None,
            original: None,
            ref_set: Vec::new(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// True for shared declarations and for references to them
    pub fn is_shared(&self) -> bool {
        matches!(
            self.component_type,
            ComponentType::Shared | ComponentType::Reference
        )
    }

    pub fn is_proxy(&self) -> bool {
        self.component_type == ComponentType::Proxy
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Children materialized so far; lazily delegated children appear after first access
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    pub fn children_loaded(&self) -> bool {
        self.children_loaded
    }

    /// Schema node this component mirrors, if any
    pub fn peer(&self) -> Option<NodeId> {
        self.peer
    }

    /// Own name; references and proxies report theirs through the model or registry
    pub fn raw_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub fn min_occurs(&self) -> u32 {
        self.min_occurs
    }

    pub fn max_occurs(&self) -> MaxOccurs {
        self.max_occurs
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn fixed_value(&self) -> Option<&str> {
        self.fixed_value.as_deref()
    }

    pub fn nillable(&self) -> bool {
        self.nillable
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn mixed(&self) -> bool {
        self.mixed
    }

    pub fn form(&self) -> Option<Form> {
        self.form
    }

    pub fn attribute_use(&self) -> AttributeUse {
        self.attribute_use
    }

    pub fn datatype(&self) -> Option<&Datatype> {
        self.datatype.as_ref()
    }

    /// Named content model this element's content comes from
    pub fn content_type(&self) -> Option<ComponentRef> {
        self.content_type
    }

    /// Target of a reference
    pub fn shared(&self) -> Option<ComponentId> {
        self.shared
    }

    /// Target of a proxy
    pub fn original(&self) -> Option<ComponentRef> {
        self.original
    }

    /// References registered against a shared component
    pub fn ref_set(&self) -> &[ComponentId] {
        &self.ref_set
    }
}
