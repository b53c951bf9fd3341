//! Pattern-neutral expansion of a schema, rooted at its master elements.
//!
//! Every element, complex type, model group and attribute group reached
//! from the masters is recorded once per source declaration, so reuse in
//! the source stays visible as a shared id in the shape.

use std::collections::HashMap;

use tracing::debug;

use crate::schema::{NodeId, SchemaDocument, SchemaKind};

pub(crate) type ElementId = usize;
pub(crate) type TypeId = usize;

/// Attributes that describe where a declaration sits rather than what it is
const PLACEMENT_ATTRIBUTES: &[&str] = &["name", "ref", "type", "minOccurs", "maxOccurs"];

#[derive(Debug, Clone)]
pub(crate) enum Content {
    Empty,
    /// `type` value naming a built-in, foreign or simple type
    Simple { value: String, named: Option<NodeId> },
    /// Inline anonymous simple type
    InlineSimple(NodeId),
    Complex(TypeId),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementShape {
    pub(crate) name: String,
    /// Declared at the top level of the source
    pub(crate) global: bool,
    pub(crate) attributes: Vec<(String, String)>,
    /// Annotation children, written before the content
    pub(crate) leading: Vec<NodeId>,
    /// Identity constraints, written after the content
    pub(crate) trailing: Vec<NodeId>,
    pub(crate) content: Content,
}

#[derive(Debug, Clone)]
pub(crate) struct TypeShape {
    /// Source name of a named complex type
    pub(crate) name: Option<String>,
    pub(crate) node: NodeId,
    pub(crate) attributes: Vec<(String, String)>,
    /// Derived types are copied as written
    pub(crate) verbatim: bool,
    pub(crate) items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub(crate) enum Item {
    Element { element: ElementId, site: NodeId },
    Compositor { node: NodeId, kind: SchemaKind, items: Vec<Item> },
    Group { decl: NodeId, site: NodeId },
    Attribute { site: NodeId, decl: Option<NodeId> },
    AttributeGroup { decl: NodeId, site: NodeId },
    /// Copied unchanged (wildcards, annotations, unresolvable references)
    Verbatim(NodeId),
}

#[derive(Debug, Default)]
pub(crate) struct ShapeSet {
    pub(crate) elements: Vec<ElementShape>,
    pub(crate) types: Vec<TypeShape>,
    pub(crate) groups: HashMap<NodeId, Vec<Item>>,
    pub(crate) attribute_groups: HashMap<NodeId, Vec<Item>>,
    pub(crate) masters: Vec<ElementId>,
    global_elements: HashMap<NodeId, ElementId>,
    types_by_node: HashMap<NodeId, TypeId>,
}

impl ShapeSet {
    /// Expand every declaration reachable from `masters`
    pub(crate) fn expand(doc: &SchemaDocument, masters: &[NodeId]) -> Self {
        let mut expander = Expander {
            doc,
            set: ShapeSet::default(),
        };
        for master in masters {
            let id = expander.element(*master);
            expander.set.masters.push(id);
        }
        debug!(
            elements = expander.set.elements.len(),
            types = expander.set.types.len(),
            groups = expander.set.groups.len(),
            "Expanded schema shape"
        );
        expander.set
    }

    /// Shape ids of the source's global elements that were reached
    pub(crate) fn global_elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        let mut ids: Vec<ElementId> = self.global_elements.values().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
    }

    /// Structural fingerprint used to decide whether two elements may share one declaration
    pub(crate) fn signature(&self, doc: &SchemaDocument, element: ElementId) -> String {
        let mut seen = Vec::new();
        self.element_signature(doc, element, &mut seen)
    }

    fn element_signature(&self, doc: &SchemaDocument, element: ElementId, seen: &mut Vec<TypeId>) -> String {
        let shape = &self.elements[element];
        let content = match &shape.content {
            Content::Empty => String::new(),
            Content::Simple { value, .. } => format!("type={}", value),
            Content::InlineSimple(node) => node_signature(doc, *node),
            Content::Complex(id) => self.type_signature(doc, *id, seen),
        };
        format!(
            "{}[{}]{{{}}}",
            shape.name,
            attribute_signature(&shape.attributes),
            content
        )
    }

    fn type_signature(&self, doc: &SchemaDocument, id: TypeId, seen: &mut Vec<TypeId>) -> String {
        if seen.contains(&id) {
            return format!("@{}", id);
        }
        seen.push(id);
        let shape = &self.types[id];
        let body = if shape.verbatim {
            node_signature(doc, shape.node)
        } else {
            self.items_signature(doc, &shape.items, seen)
        };
        seen.pop();
        format!("ct[{}]({})", attribute_signature(&shape.attributes), body)
    }

    fn items_signature(&self, doc: &SchemaDocument, items: &[Item], seen: &mut Vec<TypeId>) -> String {
        items
            .iter()
            .map(|item| match item {
                Item::Element { element, site } => format!(
                    "{}{}",
                    self.element_signature(doc, *element, seen),
                    occurs_signature(doc, *site)
                ),
                Item::Compositor { node, kind, items } => format!(
                    "{:?}{}({})",
                    kind,
                    occurs_signature(doc, *node),
                    self.items_signature(doc, items, seen)
                ),
                Item::Group { decl, site } | Item::AttributeGroup { decl, site } => format!(
                    "ref:{}{}",
                    doc.name(*decl).unwrap_or_default(),
                    occurs_signature(doc, *site)
                ),
                Item::Attribute { site, decl } => {
                    let declared = decl.map(|d| node_signature(doc, d)).unwrap_or_default();
                    format!("{}{}", node_signature(doc, *site), declared)
                }
                Item::Verbatim(node) => node_signature(doc, *node),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

struct Expander<'a> {
    doc: &'a SchemaDocument,
    set: ShapeSet,
}

impl Expander<'_> {
    fn element(&mut self, decl: NodeId) -> ElementId {
        let doc = self.doc;
        let global = doc.is_global(decl);
        if global && let Some(id) = self.set.global_elements.get(&decl) {
            return *id;
        }

        // Register before expanding the content so recursive references resolve
        let id = self.set.elements.len();
        self.set.elements.push(ElementShape {
            name: doc.name(decl).unwrap_or_default().to_string(),
            global,
            attributes: retained_attributes(doc, decl),
            leading: Vec::new(),
            trailing: Vec::new(),
            content: Content::Empty,
        });
        if global {
            self.set.global_elements.insert(decl, id);
        }

        let mut leading = Vec::new();
        let mut trailing = Vec::new();
        let mut content = Content::Empty;
        for child in doc.children(decl).iter().copied() {
            match doc.kind(child) {
                Some(SchemaKind::Annotation) => leading.push(child),
                Some(SchemaKind::ComplexType) => content = Content::Complex(self.complex_type(child)),
                Some(SchemaKind::SimpleType) => content = Content::InlineSimple(child),
                _ => trailing.push(child),
            }
        }
        if let Some(value) = doc.attribute(decl, "type") {
            content = self.typed_content(value);
        }

        let shape = &mut self.set.elements[id];
        shape.leading = leading;
        shape.trailing = trailing;
        shape.content = content;
        id
    }

    fn typed_content(&mut self, value: &str) -> Content {
        let doc = self.doc;
        let simple = Content::Simple {
            value: value.to_string(),
            named: None,
        };
        let Some(qname) = doc.resolve_qname(value) else {
            return simple;
        };
        if qname.is_builtin() || !doc.is_own_namespace(&qname) {
            return simple;
        }
        match doc.find_global_ref(SchemaKind::ComplexType, &qname) {
            Some(decl) if doc.kind(decl) == Some(SchemaKind::ComplexType) => {
                Content::Complex(self.complex_type(decl))
            }
            Some(decl) => Content::Simple {
                value: value.to_string(),
                named: Some(decl),
            },
            None => {
                debug!(%qname, "Type not declared in this document");
                simple
            }
        }
    }

    fn complex_type(&mut self, node: NodeId) -> TypeId {
        if let Some(id) = self.types_by_node(node) {
            return id;
        }
        let doc = self.doc;
        let id = self.set.types.len();
        let verbatim = doc.children(node).iter().any(|child| {
            matches!(
                doc.kind(*child),
                Some(SchemaKind::ComplexContent | SchemaKind::SimpleContent)
            )
        });
        self.set.types.push(TypeShape {
            name: doc.is_global(node).then(|| doc.name(node)).flatten().map(str::to_string),
            node,
            attributes: doc
                .get(node)
                .map(|n| {
                    n.attributes()
                        .iter()
                        .filter(|(key, _)| key != "name")
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            verbatim,
            items: Vec::new(),
        });
        self.set.types_by_node.insert(node, id);

        if !verbatim {
            let items = self.particles(node);
            self.set.types[id].items = items;
        }
        id
    }

    fn types_by_node(&self, node: NodeId) -> Option<TypeId> {
        self.set.types_by_node.get(&node).copied()
    }

    /// Items for the children of a complex type, compositor or group
    fn particles(&mut self, node: NodeId) -> Vec<Item> {
        let doc = self.doc;
        let mut items = Vec::new();
        for child in doc.children(node).iter().copied() {
            let Some(kind) = doc.kind(child) else {
                continue;
            };
            let item = match kind {
                SchemaKind::Element => match doc.attribute(child, "ref") {
                    Some(value) => match self.own_global(value, SchemaKind::Element) {
                        Some(decl) => Item::Element {
                            element: self.element(decl),
                            site: child,
                        },
                        None => Item::Verbatim(child),
                    },
                    None => Item::Element {
                        element: self.element(child),
                        site: child,
                    },
                },
                SchemaKind::Sequence | SchemaKind::Choice | SchemaKind::All => Item::Compositor {
                    node: child,
                    kind,
                    items: self.particles(child),
                },
                SchemaKind::Group => match self.reference(child, SchemaKind::Group) {
                    Some(decl) => {
                        if !self.set.groups.contains_key(&decl) {
                            self.set.groups.insert(decl, Vec::new());
                            let body = self.particles(decl);
                            self.set.groups.insert(decl, body);
                        }
                        Item::Group { decl, site: child }
                    }
                    None => Item::Verbatim(child),
                },
                SchemaKind::Attribute => Item::Attribute {
                    site: child,
                    decl: self.reference(child, SchemaKind::Attribute),
                },
                SchemaKind::AttributeGroup => match self.reference(child, SchemaKind::AttributeGroup) {
                    Some(decl) => {
                        if !self.set.attribute_groups.contains_key(&decl) {
                            self.set.attribute_groups.insert(decl, Vec::new());
                            let body = self.particles(decl);
                            self.set.attribute_groups.insert(decl, body);
                        }
                        Item::AttributeGroup { decl, site: child }
                    }
                    None => Item::Verbatim(child),
                },
                _ => Item::Verbatim(child),
            };
            items.push(item);
        }
        items
    }

    fn reference(&self, node: NodeId, kind: SchemaKind) -> Option<NodeId> {
        let value = self.doc.attribute(node, "ref")?;
        self.own_global(value, kind)
    }

    fn own_global(&self, value: &str, kind: SchemaKind) -> Option<NodeId> {
        let qname = self.doc.resolve_qname(value)?;
        self.doc.find_global_ref(kind, &qname)
    }
}

fn retained_attributes(doc: &SchemaDocument, decl: NodeId) -> Vec<(String, String)> {
    doc.get(decl)
        .map(|node| {
            node.attributes()
                .iter()
                .filter(|(key, _)| !PLACEMENT_ATTRIBUTES.contains(&key.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn attribute_signature(attributes: &[(String, String)]) -> String {
    let mut sorted: Vec<String> = attributes
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    sorted.sort();
    sorted.join(" ")
}

fn occurs_signature(doc: &SchemaDocument, site: NodeId) -> String {
    format!(
        "<{},{}>",
        doc.attribute(site, "minOccurs").unwrap_or("1"),
        doc.attribute(site, "maxOccurs").unwrap_or("1")
    )
}

fn node_signature(doc: &SchemaDocument, node: NodeId) -> String {
    let Some(n) = doc.node(node) else {
        return String::new();
    };
    let children: Vec<String> = n
        .children()
        .iter()
        .map(|child| node_signature(doc, *child))
        .collect();
    format!(
        "{}[{}]{}({})",
        n.tag(),
        attribute_signature(n.attributes()),
        n.text().unwrap_or_default(),
        children.join(",")
    )
}
