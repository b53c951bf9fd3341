//! Batched mutation of one model, flushed into its schema document on `end()`.

use tracing::{debug, warn};

use super::component::{
    AttributeUse, Component, ComponentId, ComponentKind, ComponentType, ContentModelKind, Datatype,
    MaxOccurs, ModelId,
};
use super::factory::ComponentFactory;
use super::model::{AxiModel, TransactionState};
use super::reader;
use super::registry::ModelRegistry;
use crate::error::{AxiError, FlushFailure, Result, SchemaError};
use crate::generator::{self, DesignPattern};
use crate::schema::{NodeId, QName, SchemaDocument, SchemaKind};

/// Outcome of a successful flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Deltas written into the schema document
    pub applied: usize,
}

#[derive(Debug, Clone, Copy)]
enum Delta {
    Added(ComponentId),
    Removed { component: ComponentId, node: NodeId },
    Renamed(ComponentId),
    Occurs(ComponentId),
    Retyped(ComponentId),
    Use(ComponentId),
}

impl Delta {
    fn component(self) -> ComponentId {
        match self {
            Self::Added(id)
            | Self::Renamed(id)
            | Self::Occurs(id)
            | Self::Retyped(id)
            | Self::Use(id) => id,
            Self::Removed { component, .. } => component,
        }
    }

    fn operation(self) -> &'static str {
        match self {
            Self::Added(_) => "add",
            Self::Removed { .. } => "remove",
            Self::Renamed(_) => "rename",
            Self::Occurs(_) => "set occurs",
            Self::Retyped(_) => "retype",
            Self::Use(_) => "set use",
        }
    }
}

/// Exclusive capability to mutate one model.
///
/// Every edit is applied to the AXI tree at once and recorded as a delta;
/// [`Transaction::end`] writes the deltas into the schema document in the
/// order they were made and then resynchronizes the model.
///
/// Dropping a transaction without ending it flushes as well, but flush
/// failures then only reach the log. Call [`Transaction::end`] to see them.
#[must_use = "a dropped transaction reports flush failures only to the log; call end()"]
pub struct Transaction<'r> {
    registry: &'r mut ModelRegistry,
    model: ModelId,
    deltas: Vec<Delta>,
    finished: bool,
}

impl<'r> Transaction<'r> {
    pub(crate) fn new(registry: &'r mut ModelRegistry, model: ModelId) -> Self {
        Self {
            registry,
            model,
            deltas: Vec::new(),
            finished: false,
        }
    }

    pub fn model_id(&self) -> ModelId {
        self.model
    }

    pub fn model(&self) -> Result<&AxiModel> {
        self.registry.model(self.model)
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.registry
    }

    /// Number of recorded deltas
    pub fn pending(&self) -> usize {
        self.deltas.len()
    }

    fn active_model(&mut self) -> Result<&mut AxiModel> {
        let model = self.registry.model_mut(self.model)?;
        model.require_state(TransactionState::Active)?;
        Ok(model)
    }

    /// Component that can be edited in place: proxies are read-only and
    /// edits to a reference go to the shared component it points at
    fn editable(&mut self, id: ComponentId) -> Result<ComponentId> {
        let model = self.active_model()?;
        let component = model.get(id)?;
        match component.component_type {
            ComponentType::Proxy => Err(AxiError::ReadOnlyProxy { id }),
            ComponentType::Reference => component.shared.ok_or_else(|| AxiError::Inconsistent {
                details: format!("reference {} has no shared component", id),
            }),
            ComponentType::Local | ComponentType::Shared => Ok(id),
        }
    }

    pub fn factory(&mut self) -> Result<ComponentFactory<'_>> {
        Ok(self.active_model()?.factory())
    }

    pub fn add_child(&mut self, parent: ComponentId, child: ComponentId) -> Result<()> {
        let index = self.model()?.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Attach a detached component below `parent` at `index`
    pub fn insert_child(&mut self, parent: ComponentId, index: usize, child: ComponentId) -> Result<()> {
        let model = self.active_model()?;
        let root = model.root();
        let owner = model.get(parent)?;
        if owner.is_proxy() {
            return Err(AxiError::ReadOnlyProxy { id: parent });
        }
        if parent != root && !reader::owns_children(owner) {
            return Err(AxiError::InvalidStructure {
                details: format!("children of {} come from another declaration", parent),
            });
        }
        let parent_kind = owner.kind;

        let component = model.get(child)?;
        if child == root || component.parent.is_some() || component.peer.is_some() {
            return Err(AxiError::InvalidStructure {
                details: format!("{} is not a detached component", child),
            });
        }
        if !component.kind.fits_under(parent_kind) {
            return Err(AxiError::InvalidStructure {
                details: format!("{:?} cannot be placed under {:?}", component.kind, parent_kind),
            });
        }
        if parent == root && component.name.is_none() {
            return Err(AxiError::InvalidStructure {
                details: format!("global {:?} needs a name", component.kind),
            });
        }

        let component = model.get_mut(child)?;
        component.parent = Some(parent);
        if parent == root {
            component.component_type = ComponentType::Shared;
            component.min_occurs = 1;
            component.max_occurs = MaxOccurs::Bounded(1);
        }
        let siblings = &mut model.get_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);

        self.deltas.push(Delta::Added(child));
        Ok(())
    }

    /// Detach and destroy a component and its subtree
    pub fn remove(&mut self, id: ComponentId) -> Result<()> {
        let model = self.active_model()?;
        if id == model.root() {
            return Err(AxiError::InvalidStructure {
                details: "the document component cannot be removed".to_string(),
            });
        }
        let component = model.get(id)?;
        if component.is_proxy() {
            return Err(AxiError::ReadOnlyProxy { id });
        }
        if let Some(parent) = component.parent
            && model.get(parent)?.is_proxy()
        {
            return Err(AxiError::ReadOnlyProxy { id: parent });
        }
        if component.component_type == ComponentType::Shared && !component.ref_set.is_empty() {
            return Err(AxiError::SharedComponentInUse {
                name: component.name.clone().unwrap_or_default(),
                references: component.ref_set.len(),
            });
        }

        let node = component.peer;
        model.destroy(id, &|_| false)?;
        if let Some(node) = node {
            self.deltas.push(Delta::Removed { component: id, node });
        }
        Ok(())
    }

    /// Rename a component; renaming a reference renames the shared declaration
    pub fn set_name(&mut self, id: ComponentId, name: &str) -> Result<()> {
        if !crate::schema::is_ncname(name) {
            return Err(AxiError::InvalidName {
                name: name.to_string(),
            });
        }
        let target = self.editable(id)?;
        let model = self.active_model()?;
        let component = model.get_mut(target)?;
        if component.kind == ComponentKind::Document
            || matches!(component.kind, ComponentKind::Compositor(_))
        {
            return Err(AxiError::InvalidStructure {
                details: format!("{:?} has no name", component.kind),
            });
        }
        component.name = Some(name.to_string());
        self.deltas.push(Delta::Renamed(target));
        Ok(())
    }

    pub fn set_min_occurs(&mut self, id: ComponentId, min: u32) -> Result<()> {
        self.set_occurs(id, |component| {
            if let MaxOccurs::Bounded(max) = component.max_occurs
                && min > max
            {
                return Err(format!("minOccurs {} exceeds maxOccurs {}", min, max));
            }
            component.min_occurs = min;
            Ok(())
        })
    }

    pub fn set_max_occurs(&mut self, id: ComponentId, max: MaxOccurs) -> Result<()> {
        self.set_occurs(id, |component| {
            if let MaxOccurs::Bounded(bound) = max
                && bound < component.min_occurs
            {
                return Err(format!(
                    "maxOccurs {} is below minOccurs {}",
                    bound, component.min_occurs
                ));
            }
            component.max_occurs = max;
            Ok(())
        })
    }

    fn set_occurs(
        &mut self,
        id: ComponentId,
        update: impl FnOnce(&mut Component) -> std::result::Result<(), String>,
    ) -> Result<()> {
        let model = self.active_model()?;
        let component = model.get_mut(id)?;
        match (component.component_type, component.kind) {
            (ComponentType::Proxy, _) => return Err(AxiError::ReadOnlyProxy { id }),
            (ComponentType::Shared, _) => {
                return Err(AxiError::InvalidStructure {
                    details: "global declarations have no cardinality".to_string(),
                });
            }
            (_, ComponentKind::Element | ComponentKind::Compositor(_)) => {}
            (_, kind) => {
                return Err(AxiError::InvalidStructure {
                    details: format!("{:?} has no cardinality", kind),
                });
            }
        }
        update(component).map_err(|details| AxiError::InvalidStructure { details })?;
        self.deltas.push(Delta::Occurs(id));
        Ok(())
    }

    /// Give an element or attribute a built-in or named simple type
    pub fn set_datatype(&mut self, id: ComponentId, datatype: Datatype) -> Result<()> {
        let target = self.editable(id)?;
        let model = self.active_model()?;
        let component = model.get_mut(target)?;
        if !matches!(component.kind, ComponentKind::Element | ComponentKind::Attribute) {
            return Err(AxiError::InvalidStructure {
                details: format!("{:?} has no datatype", component.kind),
            });
        }
        if datatype == Datatype::Anonymous {
            return Err(AxiError::InvalidStructure {
                details: "anonymous types cannot be assigned".to_string(),
            });
        }
        component.datatype = Some(datatype);
        self.deltas.push(Delta::Retyped(target));
        Ok(())
    }

    pub fn set_attribute_use(&mut self, id: ComponentId, attribute_use: AttributeUse) -> Result<()> {
        let model = self.active_model()?;
        let component = model.get_mut(id)?;
        match (component.component_type, component.kind) {
            (ComponentType::Proxy, _) => return Err(AxiError::ReadOnlyProxy { id }),
            (ComponentType::Shared, _) => {
                return Err(AxiError::InvalidStructure {
                    details: "global attributes have no use".to_string(),
                });
            }
            (_, ComponentKind::Attribute) => {}
            (_, kind) => {
                return Err(AxiError::InvalidStructure {
                    details: format!("{:?} has no use", kind),
                });
            }
        }
        component.attribute_use = attribute_use;
        self.deltas.push(Delta::Use(id));
        Ok(())
    }

    /// Flush every delta into the schema document and resynchronize
    pub fn end(mut self) -> Result<FlushReport> {
        self.finished = true;
        self.flush()
    }

    fn flush(&mut self) -> Result<FlushReport> {
        let deltas = std::mem::take(&mut self.deltas);
        let suffix = self.registry.config().generator.type_suffix.clone();
        let model = self.registry.model_mut(self.model)?;
        model.require_state(TransactionState::Active)?;
        if deltas.is_empty() {
            model.state = TransactionState::Idle;
            return Ok(FlushReport::default());
        }

        model.state = TransactionState::Flushing;
        let mut flusher = Flusher {
            pattern: model.schema_design_pattern(),
            model,
            suffix,
            applied: 0,
            failures: Vec::new(),
        };
        flusher.run(&deltas);
        let Flusher {
            model,
            applied,
            failures,
            ..
        } = flusher;
        model.state = TransactionState::Idle;
        debug!(
            document = %model.document().id(),
            applied,
            failed = failures.len(),
            "Flushed transaction"
        );

        self.registry.sync(self.model)?;
        if failures.is_empty() {
            Ok(FlushReport { applied })
        } else {
            Err(AxiError::Flush { applied, failures })
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            model = %self.model,
            pending = self.deltas.len(),
            "Transaction dropped without end(); flushing"
        );
        if let Err(e) = self.flush() {
            warn!(model = %self.model, error = %e, "Flush of dropped transaction failed");
        }
    }
}

enum Rejection {
    /// The parent has not reached the document yet
    Deferred,
    /// A later edit in the same transaction removed the component
    Superseded,
    Failed(String),
}

impl From<SchemaError> for Rejection {
    fn from(error: SchemaError) -> Self {
        Self::Failed(error.to_string())
    }
}

impl From<AxiError> for Rejection {
    fn from(error: AxiError) -> Self {
        Self::Failed(error.to_string())
    }
}

type Applied = std::result::Result<(), Rejection>;

struct Flusher<'m> {
    model: &'m mut AxiModel,
    pattern: Option<DesignPattern>,
    suffix: String,
    applied: usize,
    failures: Vec<FlushFailure>,
}

impl Flusher<'_> {
    fn run(&mut self, deltas: &[Delta]) {
        let mut deferred = Vec::new();
        for delta in deltas {
            match self.apply(*delta) {
                Ok(()) => self.applied += 1,
                Err(Rejection::Deferred) => deferred.push(*delta),
                Err(Rejection::Superseded) => {}
                Err(Rejection::Failed(reason)) => self.fail(*delta, reason),
            }
        }
        for delta in deferred {
            match self.apply(delta) {
                Ok(()) => self.applied += 1,
                Err(Rejection::Deferred) => {
                    self.fail(delta, "parent never reached the document".to_string())
                }
                Err(Rejection::Superseded) => {}
                Err(Rejection::Failed(reason)) => self.fail(delta, reason),
            }
        }
    }

    fn fail(&mut self, delta: Delta, reason: String) {
        warn!(component = %delta.component(), operation = delta.operation(), %reason, "Flush failure");
        self.failures.push(FlushFailure {
            component: delta.component(),
            operation: delta.operation(),
            reason,
        });
    }

    fn doc(&mut self) -> &mut SchemaDocument {
        &mut self.model.document
    }

    fn apply(&mut self, delta: Delta) -> Applied {
        match delta {
            Delta::Added(id) => self.add(id),
            Delta::Removed { node, .. } => {
                if self.model.document.contains(node) {
                    self.doc().remove_node(node)?;
                }
                Ok(())
            }
            Delta::Renamed(id) => self.rename(id),
            Delta::Occurs(id) => {
                let Some(node) = self.written(id)? else {
                    return Ok(());
                };
                let (min, max) = {
                    let component = self.model.get(id)?;
                    (component.min_occurs, component.max_occurs)
                };
                write_occurs(self.doc(), node, min, max)
            }
            Delta::Retyped(id) => {
                let Some(node) = self.written(id)? else {
                    return Ok(());
                };
                let datatype = self.model.get(id)?.datatype.clone();
                self.retype(node, datatype.as_ref())
            }
            Delta::Use(id) => {
                let Some(node) = self.written(id)? else {
                    return Ok(());
                };
                let attribute_use = self.model.get(id)?.attribute_use;
                match attribute_use {
                    AttributeUse::Optional => {
                        self.doc().remove_attribute(node, "use")?;
                    }
                    other => self.doc().set_attribute(node, "use", other.as_str())?,
                }
                Ok(())
            }
        }
    }

    /// Schema node of a component already in the document; `None` when the
    /// component is still pending, since its values are written with it
    fn written(&self, id: ComponentId) -> std::result::Result<Option<NodeId>, Rejection> {
        let Some(component) = self.model.component(id) else {
            return Err(Rejection::Superseded);
        };
        Ok(component.peer.filter(|node| self.model.document.contains(*node)))
    }

    fn rename(&mut self, id: ComponentId) -> Applied {
        let Some(node) = self.written(id)? else {
            return Ok(());
        };
        let name = self
            .model
            .get(id)?
            .name
            .clone()
            .ok_or_else(|| Rejection::Failed("component has no name".to_string()))?;
        if self.model.document.is_global(node) {
            let rewritten = self.doc().rename_global(node, &name)?;
            debug!(%name, rewritten, "Renamed global declaration");
        } else {
            self.doc().set_attribute(node, "name", &name)?;
        }
        Ok(())
    }

    fn add(&mut self, id: ComponentId) -> Applied {
        let Some(component) = self.model.component(id) else {
            return Err(Rejection::Superseded);
        };
        if component.peer.is_some() {
            return Ok(());
        }
        let parent = component
            .parent
            .ok_or_else(|| Rejection::Failed("component is no longer attached".to_string()))?;
        let Some(parent_node) = self.model.get(parent)?.peer else {
            return Err(Rejection::Deferred);
        };
        self.materialize(id, parent, parent_node)
    }

    /// Write a component and any of its unwritten descendants below `parent_node`
    fn materialize(&mut self, id: ComponentId, parent: ComponentId, parent_node: NodeId) -> Applied {
        let component = self.model.get(id)?.clone();
        let parent_kind = self.model.get(parent)?.kind;
        let name = component.name.clone();
        let named = |what: &str| {
            name.clone()
                .ok_or_else(|| Rejection::Failed(format!("{} needs a name", what)))
        };

        let (node, content) = match (parent_kind, component.kind) {
            (ComponentKind::Document, kind) => {
                let schema_kind = declaration_kind(kind)
                    .ok_or_else(|| Rejection::Failed(format!("{:?} cannot be global", kind)))?;
                let node = self.doc().add_global(schema_kind, &named("global declaration")?)?;
                (node, node)
            }
            (ComponentKind::Compositor(_), ComponentKind::Element) if self.promotes_elements() => {
                let name = named("element")?;
                let global = self.doc().add_global(SchemaKind::Element, &name)?;
                self.doc().ensure_target_prefix();
                let qualified = self.model.document.qualify(&name);
                let reference = self.doc().create_node(SchemaKind::Element);
                self.doc().set_attribute(reference, "ref", &qualified)?;
                let index = self.insertion_index(id, parent, parent_node);
                self.doc().insert_child(parent_node, index, reference)?;
                write_occurs(self.doc(), reference, component.min_occurs, component.max_occurs)?;
                self.retype(global, component.datatype.as_ref())?;

                // The resync pairs this component with the new reference node
                self.model.get_mut(id)?.component_type = ComponentType::Reference;
                self.model.bind_peer(id, reference)?;
                for child in component.children.iter().copied() {
                    if self.model.get(child)?.peer.is_none() {
                        self.materialize(child, id, global)?;
                    }
                }
                return Ok(());
            }
            (_, kind) => {
                let container = self.container(parent_kind, parent_node, kind)?;
                let schema_kind = match kind {
                    ComponentKind::Element => SchemaKind::Element,
                    ComponentKind::Attribute => SchemaKind::Attribute,
                    ComponentKind::Compositor(compositor) => compositor.schema_kind(),
                    other => {
                        return Err(Rejection::Failed(format!(
                            "{:?} cannot be nested",
                            other
                        )));
                    }
                };
                let node = self.doc().create_node(schema_kind);
                if let Some(name) = &name {
                    self.doc().set_attribute(node, "name", name)?;
                }
                let index = match kind {
                    ComponentKind::Compositor(_) => self.compositor_index(container),
                    _ => self.insertion_index(id, parent, container),
                };
                self.doc().insert_child(container, index, node)?;
                (node, node)
            }
        };

        match component.kind {
            ComponentKind::Element => {
                if !self.model.document.is_global(node) {
                    write_occurs(self.doc(), node, component.min_occurs, component.max_occurs)?;
                }
                self.retype(node, component.datatype.as_ref())?;
            }
            ComponentKind::Attribute => {
                self.retype(node, component.datatype.as_ref())?;
                if component.attribute_use != AttributeUse::Optional {
                    self.doc()
                        .set_attribute(node, "use", component.attribute_use.as_str())?;
                }
            }
            ComponentKind::Compositor(_) => {
                write_occurs(self.doc(), node, component.min_occurs, component.max_occurs)?;
            }
            _ => {}
        }
        self.model.bind_peer(id, node)?;

        for child in component.children.iter().copied() {
            if self.model.get(child)?.peer.is_none() {
                self.materialize(child, id, content)?;
            }
        }
        Ok(())
    }

    fn promotes_elements(&self) -> bool {
        self.pattern.is_some_and(DesignPattern::promotes_elements)
    }

    fn names_types(&self) -> bool {
        self.pattern.is_some_and(DesignPattern::names_types)
    }

    /// Schema node that receives children of a component of kind `parent_kind`
    fn container(
        &mut self,
        parent_kind: ComponentKind,
        parent_node: NodeId,
        child_kind: ComponentKind,
    ) -> std::result::Result<NodeId, Rejection> {
        match (parent_kind, child_kind) {
            (ComponentKind::Element, ComponentKind::Compositor(_) | ComponentKind::Attribute) => {
                self.element_content(parent_node)
            }
            _ => Ok(parent_node),
        }
    }

    /// Complex type holding an element's content, created on demand
    fn element_content(&mut self, element: NodeId) -> std::result::Result<NodeId, Rejection> {
        let doc = &self.model.document;
        if doc.attribute(element, "ref").is_some() {
            return Err(Rejection::Failed(
                "an element reference cannot own content".to_string(),
            ));
        }
        if let Some(complex) = doc.child_of_kind(element, SchemaKind::ComplexType) {
            return Ok(complex);
        }
        if let Some(qname) = doc.attribute(element, "type").and_then(|v| doc.resolve_qname(v)) {
            if doc.is_own_namespace(&qname)
                && let Some(named) = doc.find_global(SchemaKind::ComplexType, &qname.local)
            {
                return Ok(named);
            }
            self.doc().remove_attribute(element, "type")?;
        }
        if let Some(simple) = self.model.document.child_of_kind(element, SchemaKind::SimpleType) {
            self.doc().remove_node(simple)?;
        }

        if self.names_types()
            && let Some(name) = self.model.document.name(element).map(str::to_string)
        {
            let doc = &self.model.document;
            let type_name = generator::type_name(&name, &self.suffix, |candidate| {
                doc.find_global(SchemaKind::ComplexType, candidate).is_some()
                    || doc.find_global(SchemaKind::SimpleType, candidate).is_some()
            });
            let complex = self.doc().add_global(SchemaKind::ComplexType, &type_name)?;
            self.doc().ensure_target_prefix();
            let qualified = self.model.document.qualify(&type_name);
            self.doc().set_attribute(element, "type", &qualified)?;
            return Ok(complex);
        }

        let complex = self.doc().create_node(SchemaKind::ComplexType);
        let index = usize::from(
            self.model.document.child_of_kind(element, SchemaKind::Annotation).is_some(),
        );
        self.doc().insert_child(element, index, complex)?;
        Ok(complex)
    }

    /// Compositors go before attribute declarations
    fn compositor_index(&self, container: NodeId) -> usize {
        let doc = &self.model.document;
        let children = doc.children(container);
        children
            .iter()
            .position(|child| {
                matches!(
                    doc.kind(*child),
                    Some(
                        SchemaKind::Attribute
                            | SchemaKind::AttributeGroup
                            | SchemaKind::AnyAttribute
                    )
                )
            })
            .unwrap_or(children.len())
    }

    /// Position before the next already written sibling, else the end
    fn insertion_index(&self, id: ComponentId, parent: ComponentId, container: NodeId) -> usize {
        let doc = &self.model.document;
        let siblings = self.model.children(parent);
        let after = siblings
            .iter()
            .position(|sibling| *sibling == id)
            .map_or(siblings.len(), |p| p + 1);
        siblings[after..]
            .iter()
            .filter_map(|sibling| self.model.component(*sibling).and_then(|c| c.peer))
            .find_map(|node| doc.children(container).iter().position(|n| *n == node))
            .unwrap_or_else(|| doc.children(container).len())
    }

    /// Point `node` at a datatype, dropping any inline type it had
    fn retype(&mut self, node: NodeId, datatype: Option<&Datatype>) -> Applied {
        let value = match datatype {
            None | Some(Datatype::Anonymous) => return Ok(()),
            Some(Datatype::Builtin(local)) => self.model.document.builtin(local),
            Some(Datatype::Named(qname)) => self.type_reference(qname)?,
        };
        for kind in [SchemaKind::ComplexType, SchemaKind::SimpleType] {
            if let Some(inline) = self.model.document.child_of_kind(node, kind) {
                self.doc().remove_node(inline)?;
            }
        }
        self.doc().set_attribute(node, "type", &value)?;
        Ok(())
    }

    fn type_reference(&mut self, qname: &QName) -> std::result::Result<String, Rejection> {
        if self.model.document.is_own_namespace(qname) {
            self.doc().ensure_target_prefix();
            return Ok(self.model.document.qualify(&qname.local));
        }
        let Some(namespace) = &qname.namespace else {
            return Ok(qname.local.clone());
        };
        match self.model.document.prefix_for_namespace(namespace) {
            Some("") => Ok(qname.local.clone()),
            Some(prefix) => Ok(format!("{}:{}", prefix, qname.local)),
            None => Err(Rejection::Failed(format!(
                "no prefix is bound to namespace {}",
                namespace
            ))),
        }
    }
}

fn declaration_kind(kind: ComponentKind) -> Option<SchemaKind> {
    match kind {
        ComponentKind::Element => Some(SchemaKind::Element),
        ComponentKind::Attribute => Some(SchemaKind::Attribute),
        ComponentKind::ContentModel(ContentModelKind::ComplexType) => Some(SchemaKind::ComplexType),
        ComponentKind::ContentModel(ContentModelKind::Group) => Some(SchemaKind::Group),
        ComponentKind::ContentModel(ContentModelKind::AttributeGroup) => {
            Some(SchemaKind::AttributeGroup)
        }
        _ => None,
    }
}

/// Cardinality attributes are only written when they differ from 1
fn write_occurs(doc: &mut SchemaDocument, node: NodeId, min: u32, max: MaxOccurs) -> Applied {
    if min == 1 {
        doc.remove_attribute(node, "minOccurs")?;
    } else {
        doc.set_attribute(node, "minOccurs", &min.to_string())?;
    }
    if max == MaxOccurs::Bounded(1) {
        doc.remove_attribute(node, "maxOccurs")?;
    } else {
        doc.set_attribute(node, "maxOccurs", &max.to_string())?;
    }
    Ok(())
}
