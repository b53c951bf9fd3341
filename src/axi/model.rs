use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use super::component::{Component, ComponentId, ComponentKind, ComponentRef, ComponentType, ModelId};
use super::factory::ComponentFactory;
use crate::error::{AxiError, Result};
use crate::generator::DesignPattern;
use crate::schema::{NodeId, SchemaDocument};

/// Transaction lifecycle of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Idle,
    Active,
    Flushing,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Flushing => "flushing",
        })
    }
}

/// AXI tree mirroring one schema document
#[derive(Debug)]
pub struct AxiModel {
    id: ModelId,
    instance: Uuid,
    pub(crate) document: SchemaDocument,
    pub(crate) components: Vec<Option<Component>>,
    root: ComponentId,
    pub(crate) peers: HashMap<NodeId, ComponentId>,
    pub(crate) state: TransactionState,
    pattern: Option<DesignPattern>,
    pub(crate) created: usize,
    pub(crate) synced_revision: Option<u64>,
}

impl AxiModel {
    pub(crate) fn new(id: ModelId, document: SchemaDocument, pattern: Option<DesignPattern>) -> Self {
        let mut root = Component::new(ComponentKind::Document, ComponentType::Local);
        root.peer = Some(document.root());
        root.target_namespace = document.target_namespace().map(str::to_string);

        let mut peers = HashMap::new();
        peers.insert(document.root(), ComponentId::new(0));

        Self {
            id,
            instance: Uuid::new_v4(),
            document,
            components: vec![Some(root)],
            root: ComponentId::new(0),
            peers,
            state: TransactionState::Idle,
            pattern,
            created: 0,
            synced_revision: None,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Unique identity of this model instance, distinct across registry reloads
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn document(&self) -> &SchemaDocument {
        &self.document
    }

    pub fn root(&self) -> ComponentId {
        self.root
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn schema_design_pattern(&self) -> Option<DesignPattern> {
        self.pattern
    }

    /// Pattern that subsequent flushes follow when materializing new components
    pub fn set_schema_design_pattern(&mut self, pattern: Option<DesignPattern>) {
        self.pattern = pattern;
    }

    /// Number of components created through the factory
    pub fn created_components(&self) -> usize {
        self.created
    }

    /// Whether the document changed since the tree was last synced
    pub fn is_stale(&self) -> bool {
        self.synced_revision != Some(self.document.revision())
    }

    pub fn factory(&mut self) -> ComponentFactory<'_> {
        ComponentFactory::new(self)
    }

    pub fn reference(&self, id: ComponentId) -> ComponentRef {
        ComponentRef::new(self.id, id)
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get(&self, id: ComponentId) -> Result<&Component> {
        self.component(id).ok_or(AxiError::UnknownComponent {
            model: self.id,
            id,
        })
    }

    pub(crate) fn get_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        let model = self.id;
        self.components
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(AxiError::UnknownComponent { model, id })
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.component(id).is_some()
    }

    /// Materialized children; see [`crate::ModelRegistry::children`] for delegated ones
    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.component(id).map(Component::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.component(id).and_then(Component::parent)
    }

    /// Display name. References report their shared component's name and
    /// same-model proxies their original's; foreign proxies resolve through the registry.
    pub fn name(&self, id: ComponentId) -> Option<&str> {
        let mut current = id;
        for _ in 0..=self.components.len() {
            let component = self.component(current)?;
            match component.component_type {
                ComponentType::Reference => current = component.shared?,
                ComponentType::Proxy => {
                    let original = component.original?;
                    if original.model != self.id {
                        return None;
                    }
                    current = original.id;
                }
                ComponentType::Local | ComponentType::Shared => return component.name.as_deref(),
            }
        }
        None
    }

    /// Component mirroring a schema node
    pub fn component_for_node(&self, node: NodeId) -> Option<ComponentId> {
        self.peers
            .get(&node)
            .copied()
            .filter(|id| self.contains(*id))
    }

    /// Shared child of the root with the given kind and name
    pub fn find_global(&self, kind: ComponentKind, name: &str) -> Option<ComponentId> {
        self.children(self.root).iter().copied().find(|id| {
            self.component(*id)
                .is_some_and(|c| c.kind == kind && c.name.as_deref() == Some(name))
        })
    }

    pub fn global_elements(&self) -> Vec<ComponentId> {
        self.globals_of(|kind| kind == ComponentKind::Element)
    }

    pub fn content_models(&self) -> Vec<ComponentId> {
        self.globals_of(|kind| matches!(kind, ComponentKind::ContentModel(_)))
    }

    fn globals_of(&self, wanted: impl Fn(ComponentKind) -> bool) -> Vec<ComponentId> {
        self.children(self.root)
            .iter()
            .copied()
            .filter(|id| self.component(*id).is_some_and(|c| wanted(c.kind)))
            .collect()
    }

    /// Live components in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|c| (ComponentId::new(index), c)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn require_state(&self, expected: TransactionState) -> Result<()> {
        if self.state != expected {
            return Err(AxiError::IllegalState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    pub(crate) fn alloc(&mut self, mut component: Component) -> ComponentId {
        if component.target_namespace.is_none() {
            component.target_namespace = self.document.target_namespace().map(str::to_string);
        }
        self.components.push(Some(component));
        ComponentId::new(self.components.len() - 1)
    }

    pub(crate) fn bind_peer(&mut self, id: ComponentId, node: NodeId) -> Result<()> {
        if let Some(previous) = self.get(id)?.peer
            && self.peers.get(&previous) == Some(&id)
        {
            self.peers.remove(&previous);
        }
        self.get_mut(id)?.peer = Some(node);
        self.peers.insert(node, id);
        Ok(())
    }

    pub(crate) fn register_reference(&mut self, shared: ComponentId, reference: ComponentId) -> Result<()> {
        let target = self.get_mut(shared)?;
        if !target.ref_set.contains(&reference) {
            target.ref_set.push(reference);
        }
        self.get_mut(reference)?.shared = Some(shared);
        Ok(())
    }

    pub(crate) fn unregister_reference(&mut self, reference: ComponentId) -> Result<()> {
        if let Some(shared) = self.get_mut(reference)?.shared.take()
            && let Some(target) = self.components.get_mut(shared.index()).and_then(Option::as_mut)
        {
            target.ref_set.retain(|r| *r != reference);
        }
        Ok(())
    }

    /// Detach a component from its parent without destroying it
    pub(crate) fn detach(&mut self, id: ComponentId) -> Result<()> {
        if let Some(parent) = self.get_mut(id)?.parent.take()
            && let Some(owner) = self.components.get_mut(parent.index()).and_then(Option::as_mut)
        {
            owner.children.retain(|child| *child != id);
        }
        Ok(())
    }

    /// Destroy a component and its subtree, keeping any descendant in `keep`
    pub(crate) fn destroy(&mut self, id: ComponentId, keep: &dyn Fn(ComponentId) -> bool) -> Result<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(component) = self.component(next) else {
                continue;
            };
            let children: Vec<ComponentId> = component
                .children
                .iter()
                .copied()
                .filter(|child| self.parent(*child) == Some(next) && !keep(*child))
                .collect();
            stack.extend(children);

            if component.component_type == ComponentType::Reference {
                self.unregister_reference(next)?;
            }
            // Drop references still pointing at a destroyed shared component
            for reference in self.get(next)?.ref_set.clone() {
                if let Some(r) = self.components.get_mut(reference.index()).and_then(Option::as_mut) {
                    r.shared = None;
                }
            }
            if let Some(peer) = self.get(next)?.peer
                && self.peers.get(&peer) == Some(&next)
            {
                self.peers.remove(&peer);
            }
            self.components[next.index()] = None;
        }
        Ok(())
    }
}
