//! Schema → AXI reconciliation.
//!
//! The reader projects every schema node onto the component it should become
//! and matches projections against the live tree: first by node identity, then
//! by name among orphaned siblings, then by position. Matched components keep
//! their identity and are relabeled in place; only a change of structural kind
//! creates a new component.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use super::component::{
    AttributeUse, Component, ComponentId, ComponentKind, ComponentRef, ComponentType,
    CompositorKind, ContentModelKind, Datatype, Form, MaxOccurs,
};
use super::model::AxiModel;
use crate::error::Result;
use crate::schema::{NodeId, QName, SchemaDocument, SchemaKind};

/// Resolves declarations that live in other loaded documents
pub(crate) trait ForeignLookup {
    fn find(&self, from: &SchemaDocument, kind: SchemaKind, qname: &QName) -> Option<ComponentRef>;
}

/// Lookup for a model that sees no other documents
pub(crate) struct Isolated;

impl ForeignLookup for Isolated {
    fn find(&self, _: &SchemaDocument, _: SchemaKind, _: &QName) -> Option<ComponentRef> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SyncStats {
    pub created: usize,
    pub removed: usize,
    pub dangling: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Shared(NodeId),
    Foreign(ComponentRef),
}

#[derive(Debug, Clone)]
struct Projection {
    node: NodeId,
    kind: ComponentKind,
    component_type: ComponentType,
    label: Option<String>,
    target: Option<Target>,
}

/// Rebuild only the root level so other models can resolve this one's globals.
/// Types are left as they are; they may name declarations this pass cannot see.
pub(crate) fn sync_globals(model: &mut AxiModel) -> Result<SyncStats> {
    let mut reconciler = Reconciler::new(model, &Isolated);
    reconciler.bind_types = false;
    let root = reconciler.model.root();
    let expected = project_root(&reconciler.model.document);
    reconciler.reconcile_children(root, expected)?;
    reconciler.finish()
}

/// Reconcile the whole tree with the document
pub(crate) fn sync(model: &mut AxiModel, foreign: &dyn ForeignLookup) -> Result<SyncStats> {
    let mut reconciler = Reconciler::new(model, foreign);
    let root = reconciler.model.root();
    let tns = reconciler.model.document.target_namespace().map(str::to_string);
    reconciler.model.get_mut(root)?.target_namespace = tns;

    let expected = project_root(&reconciler.model.document);
    let mut queue: VecDeque<ComponentId> = reconciler.reconcile_children(root, expected)?.into();

    while let Some(id) = queue.pop_front() {
        let component = reconciler.model.get(id)?;
        if !owns_children(component) {
            continue;
        }
        let Some(node) = component.peer else {
            continue;
        };
        let expected = project_content(
            &reconciler.model.document,
            reconciler.foreign,
            node,
            &mut reconciler.stats.dangling,
        );
        queue.extend(reconciler.reconcile_children(id, expected)?);
    }

    let stats = reconciler.finish()?;
    model.synced_revision = Some(model.document.revision());
    debug!(
        document = %model.document.id(),
        created = stats.created,
        removed = stats.removed,
        dangling = stats.dangling,
        "Synchronized model"
    );
    Ok(stats)
}

/// Whether a component's children mirror its own schema subtree
pub(crate) fn owns_children(component: &Component) -> bool {
    matches!(
        component.component_type,
        ComponentType::Local | ComponentType::Shared
    ) && component.content_type.is_none()
        && component.kind != ComponentKind::Attribute
}

struct Reconciler<'a> {
    model: &'a mut AxiModel,
    foreign: &'a dyn ForeignLookup,
    claimed: HashSet<ComponentId>,
    retired: Vec<ComponentId>,
    stats: SyncStats,
    bind_types: bool,
}

impl<'a> Reconciler<'a> {
    fn new(model: &'a mut AxiModel, foreign: &'a dyn ForeignLookup) -> Self {
        let root = model.root();
        Self {
            model,
            foreign,
            claimed: HashSet::from([root]),
            retired: Vec::new(),
            stats: SyncStats::default(),
            bind_types: true,
        }
    }

    fn reconcile_children(
        &mut self,
        parent: ComponentId,
        expected: Vec<Projection>,
    ) -> Result<Vec<ComponentId>> {
        let old = self.model.get(parent)?.children.clone();
        let mut result = Vec::with_capacity(expected.len());

        for (index, projection) in expected.iter().enumerate() {
            let id = match self.find_candidate(&old, index, projection) {
                Some(id) => id,
                None => self.create(projection),
            };
            self.claimed.insert(id);
            self.bind(id, projection)?;
            result.push(id);
        }

        for child in old {
            if !result.contains(&child) {
                self.retired.push(child);
            }
        }

        for child in &result {
            if self.model.parent(*child) != Some(parent) {
                self.model.detach(*child)?;
            }
            self.model.get_mut(*child)?.parent = Some(parent);
        }
        let owner = self.model.get_mut(parent)?;
        owner.children = result.clone();
        owner.children_loaded = true;
        Ok(result)
    }

    fn compatible(&self, id: ComponentId, projection: &Projection) -> bool {
        !self.claimed.contains(&id)
            && self.model.component(id).is_some_and(|c| {
                c.kind == projection.kind && c.component_type == projection.component_type
            })
    }

    /// A component whose schema node is gone (or never existed) may be relabeled
    fn orphaned(&self, id: ComponentId) -> bool {
        self.model
            .component(id)
            .and_then(|c| c.peer)
            .is_none_or(|node| !self.model.document.contains(node))
    }

    fn find_candidate(
        &self,
        old: &[ComponentId],
        index: usize,
        projection: &Projection,
    ) -> Option<ComponentId> {
        if let Some(id) = self.model.component_for_node(projection.node)
            && self.compatible(id, projection)
        {
            return Some(id);
        }

        let by_name = old.iter().copied().find(|id| {
            self.compatible(*id, projection)
                && self.orphaned(*id)
                && self.model.component(*id).and_then(|c| c.name.as_deref())
                    == projection.label.as_deref()
        });
        if by_name.is_some() {
            return by_name;
        }

        old.get(index)
            .copied()
            .filter(|id| self.compatible(*id, projection) && self.orphaned(*id))
    }

    fn create(&mut self, projection: &Projection) -> ComponentId {
        self.stats.created += 1;
        let mut component = Component::new(projection.kind, projection.component_type);
        component.children_loaded = !matches!(
            projection.component_type,
            ComponentType::Reference | ComponentType::Proxy
        );
        self.model.alloc(component)
    }

    fn bind(&mut self, id: ComponentId, projection: &Projection) -> Result<()> {
        self.model.bind_peer(id, projection.node)?;

        let model_id = self.model.id();
        let (datatype, content_type) = match projection.kind {
            ComponentKind::Element | ComponentKind::Attribute
                if self.bind_types
                    && projection.component_type != ComponentType::Proxy
                    && projection.component_type != ComponentType::Reference =>
            {
                let (datatype, content) = resolve_type(
                    &self.model.document,
                    self.foreign,
                    projection.node,
                    &mut self.stats.dangling,
                );
                // Only elements take their content from a named content model
                let content = content.filter(|_| projection.kind == ComponentKind::Element);
                let content = content.and_then(|target| match target {
                    Target::Shared(decl) => self
                        .model
                        .component_for_node(decl)
                        .map(|c| ComponentRef::new(model_id, c)),
                    Target::Foreign(r) => Some(r),
                });
                (datatype, content)
            }
            _ => (None, None),
        };

        let document = &self.model.document;
        let node = projection.node;
        let global = document.is_global(node);
        let properties = read_properties(document, node, projection.kind, global);

        let bind_types = self.bind_types;
        let component = self.model.get_mut(id)?;
        component.name = projection.label.clone();
        properties.apply(component);
        if bind_types {
            component.datatype = datatype;
        }

        match projection.component_type {
            ComponentType::Reference => {
                let shared = match projection.target {
                    Some(Target::Shared(decl)) => self.model.component_for_node(decl),
                    _ => None,
                };
                if self.model.get(id)?.shared != shared {
                    self.model.unregister_reference(id)?;
                    if let Some(shared) = shared {
                        self.model.register_reference(shared, id)?;
                    }
                    self.reset_delegated_children(id)?;
                }
            }
            ComponentType::Proxy => {
                let original = match projection.target {
                    Some(Target::Foreign(r)) => Some(r),
                    _ => None,
                };
                if self.model.get(id)?.original != original {
                    self.model.get_mut(id)?.original = original;
                    self.reset_delegated_children(id)?;
                }
            }
            ComponentType::Local | ComponentType::Shared if bind_types => {
                let previous = self.model.get(id)?.content_type;
                if previous != content_type {
                    self.model.get_mut(id)?.content_type = content_type;
                    if content_type.is_some() {
                        self.reset_delegated_children(id)?;
                    }
                }
            }
            ComponentType::Local | ComponentType::Shared => {}
        }
        Ok(())
    }

    /// Forget children produced by delegation; they are rebuilt on next access
    fn reset_delegated_children(&mut self, id: ComponentId) -> Result<()> {
        let component = self.model.get_mut(id)?;
        let children = std::mem::take(&mut component.children);
        component.children_loaded = false;
        self.retired.extend(children);
        Ok(())
    }

    fn finish(self) -> Result<SyncStats> {
        let Reconciler {
            model,
            claimed,
            retired,
            mut stats,
            ..
        } = self;
        for id in retired {
            if model.contains(id) && !claimed.contains(&id) {
                let before = model.len();
                model.destroy(id, &|c| claimed.contains(&c))?;
                stats.removed += before - model.len();
            }
        }
        Ok(stats)
    }
}

fn project_root(doc: &SchemaDocument) -> Vec<Projection> {
    doc.children(doc.root())
        .iter()
        .copied()
        .filter_map(|node| {
            let kind = match doc.kind(node)? {
                SchemaKind::Element => ComponentKind::Element,
                SchemaKind::Attribute => ComponentKind::Attribute,
                SchemaKind::ComplexType => ComponentKind::ContentModel(ContentModelKind::ComplexType),
                SchemaKind::Group => ComponentKind::ContentModel(ContentModelKind::Group),
                SchemaKind::AttributeGroup => {
                    ComponentKind::ContentModel(ContentModelKind::AttributeGroup)
                }
                _ => return None,
            };
            Some(Projection {
                node,
                kind,
                component_type: ComponentType::Shared,
                label: Some(doc.name(node)?.to_string()),
                target: None,
            })
        })
        .collect()
}

fn project_content(
    doc: &SchemaDocument,
    foreign: &dyn ForeignLookup,
    node: NodeId,
    dangling: &mut usize,
) -> Vec<Projection> {
    match doc.kind(node) {
        Some(SchemaKind::Element) => doc
            .child_of_kind(node, SchemaKind::ComplexType)
            .map(|complex| project_body(doc, foreign, complex, dangling))
            .unwrap_or_default(),
        Some(SchemaKind::ComplexType | SchemaKind::Group | SchemaKind::AttributeGroup) => {
            project_body(doc, foreign, node, dangling)
        }
        Some(kind) if kind.is_compositor() => project_body(doc, foreign, node, dangling),
        _ => Vec::new(),
    }
}

/// Children of a complex type, group, attribute group, derivation or compositor
fn project_body(
    doc: &SchemaDocument,
    foreign: &dyn ForeignLookup,
    node: NodeId,
    dangling: &mut usize,
) -> Vec<Projection> {
    let mut result = Vec::new();
    for child in doc.children(node).iter().copied() {
        let Some(kind) = doc.kind(child) else {
            continue;
        };
        let projection = match kind {
            SchemaKind::Sequence | SchemaKind::Choice | SchemaKind::All => {
                CompositorKind::from_schema_kind(kind).map(|compositor| Projection {
                    node: child,
                    kind: ComponentKind::Compositor(compositor),
                    component_type: ComponentType::Local,
                    label: None,
                    target: None,
                })
            }
            SchemaKind::Element => project_declaration(doc, foreign, child, kind, dangling),
            SchemaKind::Attribute => project_declaration(doc, foreign, child, kind, dangling),
            SchemaKind::Group | SchemaKind::AttributeGroup => {
                project_declaration(doc, foreign, child, kind, dangling)
            }
            SchemaKind::ComplexContent | SchemaKind::SimpleContent => {
                for derivation in doc.children(child).iter().copied() {
                    if matches!(
                        doc.kind(derivation),
                        Some(SchemaKind::Extension | SchemaKind::Restriction)
                    ) {
                        result.extend(project_body(doc, foreign, derivation, dangling));
                    }
                }
                None
            }
            _ => None,
        };
        result.extend(projection);
    }
    result
}

/// A local declaration, or a reference that resolves to a shared or foreign one
fn project_declaration(
    doc: &SchemaDocument,
    foreign: &dyn ForeignLookup,
    node: NodeId,
    schema_kind: SchemaKind,
    dangling: &mut usize,
) -> Option<Projection> {
    let kind = match schema_kind {
        SchemaKind::Element => ComponentKind::Element,
        SchemaKind::Attribute => ComponentKind::Attribute,
        SchemaKind::Group => ComponentKind::ContentModel(ContentModelKind::Group),
        SchemaKind::AttributeGroup => ComponentKind::ContentModel(ContentModelKind::AttributeGroup),
        _ => return None,
    };

    let Some(value) = doc.attribute(node, "ref") else {
        // Groups and attribute groups below the root only ever appear as references
        if matches!(schema_kind, SchemaKind::Group | SchemaKind::AttributeGroup) {
            return None;
        }
        return Some(Projection {
            node,
            kind,
            component_type: ComponentType::Local,
            label: doc.name(node).map(str::to_string),
            target: None,
        });
    };

    let resolved = doc.resolve_qname(value).and_then(|qname| {
        if let Some(decl) = doc.find_global_ref(schema_kind, &qname) {
            Some((ComponentType::Reference, Target::Shared(decl), qname))
        } else {
            foreign
                .find(doc, schema_kind, &qname)
                .map(|r| (ComponentType::Proxy, Target::Foreign(r), qname))
        }
    });

    match resolved {
        Some((component_type, target, qname)) => Some(Projection {
            node,
            kind,
            component_type,
            label: Some(qname.local),
            target: Some(target),
        }),
        None => {
            warn!(
                document = %doc.id(),
                reference = value,
                "Skipping unresolved reference"
            );
            *dangling += 1;
            None
        }
    }
}

/// Datatype of an element or attribute, or the named content model it is typed by
fn resolve_type(
    doc: &SchemaDocument,
    foreign: &dyn ForeignLookup,
    node: NodeId,
    dangling: &mut usize,
) -> (Option<Datatype>, Option<Target>) {
    if let Some(value) = doc.attribute(node, "type") {
        let Some(qname) = doc.resolve_qname(value) else {
            warn!(document = %doc.id(), reference = value, "Skipping unresolved type");
            *dangling += 1;
            return (None, None);
        };
        if qname.is_builtin() {
            return (Some(Datatype::Builtin(qname.local)), None);
        }
        if let Some(decl) = doc.find_global_ref(SchemaKind::ComplexType, &qname) {
            return match doc.kind(decl) {
                Some(SchemaKind::ComplexType) => (None, Some(Target::Shared(decl))),
                _ => (Some(Datatype::Named(qname)), None),
            };
        }
        if let Some(r) = foreign.find(doc, SchemaKind::ComplexType, &qname) {
            return (None, Some(Target::Foreign(r)));
        }
        return (Some(Datatype::Named(qname)), None);
    }

    if doc.child_of_kind(node, SchemaKind::SimpleType).is_some() {
        return (Some(Datatype::Anonymous), None);
    }

    // Simple content carries the datatype on its derivation base
    let base = doc
        .child_of_kind(node, SchemaKind::ComplexType)
        .and_then(|complex| doc.child_of_kind(complex, SchemaKind::SimpleContent))
        .and_then(|content| doc.children(content).first().copied())
        .and_then(|derivation| doc.attribute(derivation, "base"))
        .and_then(|base| doc.resolve_qname(base));
    match base {
        Some(qname) if qname.is_builtin() => (Some(Datatype::Builtin(qname.local)), None),
        Some(qname) => (Some(Datatype::Named(qname)), None),
        None => (None, None),
    }
}

/// Plain properties read off a schema node
struct Properties {
    min_occurs: u32,
    max_occurs: MaxOccurs,
    default_value: Option<String>,
    fixed_value: Option<String>,
    nillable: bool,
    is_abstract: bool,
    mixed: bool,
    form: Option<Form>,
    attribute_use: AttributeUse,
}

impl Properties {
    fn apply(self, component: &mut Component) {
        component.min_occurs = self.min_occurs;
        component.max_occurs = self.max_occurs;
        component.default_value = self.default_value;
        component.fixed_value = self.fixed_value;
        component.nillable = self.nillable;
        component.is_abstract = self.is_abstract;
        component.mixed = self.mixed;
        component.form = self.form;
        component.attribute_use = self.attribute_use;
    }
}

fn read_properties(doc: &SchemaDocument, node: NodeId, kind: ComponentKind, global: bool) -> Properties {
    let flag = |name: &str| doc.attribute(node, name).is_some_and(|v| v.trim() == "true");
    let text = |name: &str| doc.attribute(node, name).map(str::to_string);

    // Global declarations carry no cardinality
    let (min_occurs, max_occurs) = if global {
        (1, MaxOccurs::Bounded(1))
    } else {
        (
            doc.attribute(node, "minOccurs")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1),
            doc.attribute(node, "maxOccurs")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MaxOccurs::Bounded(1)),
        )
    };

    let mixed = match kind {
        ComponentKind::ContentModel(ContentModelKind::ComplexType) => flag("mixed"),
        ComponentKind::Element => doc
            .child_of_kind(node, SchemaKind::ComplexType)
            .and_then(|complex| doc.attribute(complex, "mixed"))
            .is_some_and(|v| v.trim() == "true"),
        _ => false,
    };

    Properties {
        min_occurs,
        max_occurs,
        default_value: text("default"),
        fixed_value: text("fixed"),
        nillable: flag("nillable"),
        is_abstract: flag("abstract"),
        mixed,
        form: doc.attribute(node, "form").map(|v| match v.trim() {
            "qualified" => Form::Qualified,
            _ => Form::Unqualified,
        }),
        attribute_use: doc
            .attribute(node, "use")
            .map(AttributeUse::parse)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axi::component::ModelId;

    const ORDER: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:o="urn:order" targetNamespace="urn:order">
  <xs:element name="order">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="o:note" minOccurs="0"/>
        <xs:element name="item" type="o:ItemType" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:ID" use="required"/>
    </xs:complexType>
  </xs:element>
  <xs:element name="note" type="xs:string"/>
  <xs:complexType name="ItemType">
    <xs:sequence>
      <xs:element name="sku" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    fn synced(text: &str) -> AxiModel {
        let doc = SchemaDocument::parse("order.xsd", text).unwrap();
        let mut model = AxiModel::new(ModelId::new(0), doc, None);
        sync(&mut model, &Isolated).unwrap();
        model
    }

    #[test]
    fn test_sync_builds_shared_and_local_components() {
        let model = synced(ORDER);
        let globals: Vec<_> = model
            .children(model.root())
            .iter()
            .map(|id| model.name(*id).unwrap().to_string())
            .collect();
        assert_eq!(globals, vec!["order", "note", "ItemType"]);

        let order = model.find_global(ComponentKind::Element, "order").unwrap();
        assert_eq!(model.get(order).unwrap().component_type(), ComponentType::Shared);

        let sequence = model.children(order)[0];
        let id_attribute = model.children(order)[1];
        assert_eq!(
            model.get(sequence).unwrap().kind(),
            ComponentKind::Compositor(CompositorKind::Sequence)
        );
        assert_eq!(
            model.get(id_attribute).unwrap().attribute_use(),
            AttributeUse::Required
        );

        let note_ref = model.children(sequence)[0];
        let item = model.children(sequence)[1];
        let note_ref_component = model.get(note_ref).unwrap();
        assert_eq!(note_ref_component.component_type(), ComponentType::Reference);
        assert_eq!(note_ref_component.min_occurs(), 0);
        assert_eq!(model.name(note_ref), Some("note"));

        let note = model.find_global(ComponentKind::Element, "note").unwrap();
        assert_eq!(model.get(note).unwrap().ref_set(), &[note_ref]);
        assert_eq!(
            model.get(note).unwrap().datatype(),
            Some(&Datatype::Builtin("string".to_string()))
        );

        let item_type = model
            .find_global(ComponentKind::ContentModel(ContentModelKind::ComplexType), "ItemType")
            .unwrap();
        let item_component = model.get(item).unwrap();
        assert_eq!(item_component.content_type(), Some(model.reference(item_type)));
        assert_eq!(item_component.max_occurs(), MaxOccurs::Unbounded);
        assert!(!item_component.children_loaded());
    }

    #[test]
    fn test_resync_preserves_identity_and_relabels() {
        let mut model = synced(ORDER);
        let order = model.find_global(ComponentKind::Element, "order").unwrap();
        let sequence = model.children(order)[0];
        let order_node = model.get(order).unwrap().peer().unwrap();

        model.document.set_attribute(order_node, "name", "purchase").unwrap();
        let stats = sync(&mut model, &Isolated).unwrap();

        assert_eq!(stats.created, 0);
        assert_eq!(model.find_global(ComponentKind::Element, "purchase"), Some(order));
        assert_eq!(model.children(order)[0], sequence);
        assert!(!model.is_stale());
    }

    #[test]
    fn test_resync_recreates_on_kind_change_only() {
        let mut model = synced(ORDER);
        let order = model.find_global(ComponentKind::Element, "order").unwrap();
        let sequence = model.children(order)[0];
        let sequence_node = model.get(sequence).unwrap().peer().unwrap();
        let complex = model.document.parent(sequence_node).unwrap();

        // Replace the sequence with a choice holding the same particles
        let choice = model.document.create_node(SchemaKind::Choice);
        model.document.insert_child(complex, 0, choice).unwrap();
        for particle in model.document.children(sequence_node).to_vec() {
            model.document.append_child(choice, particle).unwrap();
        }
        model.document.remove_node(sequence_node).unwrap();

        let note_ref = model.children(sequence)[0];
        sync(&mut model, &Isolated).unwrap();

        let replacement = model.children(order)[0];
        assert_ne!(replacement, sequence);
        assert!(!model.contains(sequence));
        assert_eq!(
            model.get(replacement).unwrap().kind(),
            ComponentKind::Compositor(CompositorKind::Choice)
        );
        // The particles moved with their schema nodes
        assert_eq!(model.children(replacement)[0], note_ref);
    }

    #[test]
    fn test_dangling_reference_is_skipped() {
        let model = synced(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="missing"/>
        <xs:element name="present" type="xs:int"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        );
        let root = model.find_global(ComponentKind::Element, "root").unwrap();
        let sequence = model.children(root)[0];
        assert_eq!(model.children(sequence).len(), 1);
        assert_eq!(model.name(model.children(sequence)[0]), Some("present"));
    }

    #[test]
    fn test_sync_globals_only_builds_root_level() {
        let doc = SchemaDocument::parse("order.xsd", ORDER).unwrap();
        let mut model = AxiModel::new(ModelId::new(0), doc, None);
        sync_globals(&mut model).unwrap();
        assert_eq!(model.global_elements().len(), 2);
        let order = model.find_global(ComponentKind::Element, "order").unwrap();
        assert!(model.children(order).is_empty());
    }
}
