//! Model cache keyed by document identity, and the resolver that lets models
//! see each other's components.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, error, warn};

use super::component::{Component, ComponentKind, ComponentRef, ComponentType, ModelId};
use super::model::{AxiModel, TransactionState};
use super::reader::{self, ForeignLookup, SyncStats};
use super::transaction::Transaction;
use super::visitor::{self, InvariantViolation};
use crate::config::AxiConfig;
use crate::error::{AxiError, Result};
use crate::generator::{self, DesignPattern, TransformOptions, TransformReport};
use crate::schema::{DocumentId, ExternalRef, QName, SchemaDocument, SchemaKind};
use crate::source::SchemaSource;

/// Owns every loaded model; one model per schema document
pub struct ModelRegistry {
    config: AxiConfig,
    source: Box<dyn SchemaSource>,
    models: Vec<Option<AxiModel>>,
    by_document: HashMap<DocumentId, ModelId>,
}

impl ModelRegistry {
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self::with_config(source, AxiConfig::default())
    }

    pub fn with_config(source: impl SchemaSource + 'static, config: AxiConfig) -> Self {
        Self {
            config,
            source: Box::new(source),
            models: Vec::new(),
            by_document: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AxiConfig {
        &self.config
    }

    /// Load a document and everything it imports or includes.
    /// Loading an already cached document returns the cached model.
    pub fn load(&mut self, location: &str) -> Result<ModelId> {
        let document = self.source.resolve(location, None);
        if let Some(existing) = self.by_document.get(&document) {
            return Ok(*existing);
        }

        let mut fresh = Vec::new();
        let id = self.load_recursive(document, &mut fresh)?;
        debug!(location, models = fresh.len(), "Loaded schema documents");
        self.sync_batch(&fresh)?;
        Ok(id)
    }

    fn load_recursive(&mut self, document: DocumentId, fresh: &mut Vec<ModelId>) -> Result<ModelId> {
        if let Some(existing) = self.by_document.get(&document) {
            return Ok(*existing);
        }

        let text = self.source.load(&document)?;
        let doc = SchemaDocument::parse(document.clone(), &text)?;
        let externals = doc.external_refs();
        let id = self.insert_model(doc);
        fresh.push(id);

        // Register before descending so circular imports terminate
        for external in externals {
            let Some(location) = external.location else {
                continue;
            };
            let resolved = self.source.resolve(&location, Some(&document));
            if let Err(e) = self.load_recursive(resolved.clone(), fresh) {
                warn!(
                    document = %document,
                    location = %resolved,
                    error = %e,
                    "Failed to load referenced schema"
                );
            }
        }
        Ok(id)
    }

    /// Register an in-memory document as a new model
    pub fn register_document(&mut self, doc: SchemaDocument) -> Result<ModelId> {
        if self.by_document.contains_key(doc.id()) {
            return Err(AxiError::InvalidStructure {
                details: format!("document {} is already registered", doc.id()),
            });
        }
        let id = self.insert_model(doc);
        self.sync_batch(&[id])?;
        Ok(id)
    }

    fn insert_model(&mut self, doc: SchemaDocument) -> ModelId {
        let id = ModelId::new(self.models.len());
        self.by_document.insert(doc.id().clone(), id);
        self.models.push(Some(AxiModel::new(
            id,
            doc,
            self.config.generator.default_pattern,
        )));
        id
    }

    pub fn model(&self, id: ModelId) -> Result<&AxiModel> {
        self.models
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(AxiError::UnknownModel(id))
    }

    pub fn model_mut(&mut self, id: ModelId) -> Result<&mut AxiModel> {
        self.models
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(AxiError::UnknownModel(id))
    }

    pub fn model_for(&self, document: &DocumentId) -> Option<ModelId> {
        self.by_document.get(document).copied()
    }

    pub fn models(&self) -> impl Iterator<Item = &AxiModel> {
        self.models.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.models().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop one model; proxies other models held into it are resynchronized away
    pub fn close(&mut self, id: ModelId) -> Result<()> {
        let model = self
            .models
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(AxiError::UnknownModel(id))?;
        self.by_document.remove(model.document().id());
        self.refresh_dependents(&[id])?;
        self.prune_stale_proxies()
    }

    /// Drop every model; all model and component handles become invalid.
    /// Slots stay tombstoned so a stale `ModelId` never names a later model.
    pub fn clear(&mut self) {
        for slot in &mut self.models {
            *slot = None;
        }
        self.by_document.clear();
    }

    /// Begin the only path to mutation of a model's tree
    pub fn start_transaction(&mut self, id: ModelId) -> Result<Transaction<'_>> {
        let model = self.model_mut(id)?;
        model.require_state(TransactionState::Idle)?;
        model.state = TransactionState::Active;
        Ok(Transaction::new(self, id))
    }

    /// Re-read a model's document into its tree
    pub fn sync(&mut self, id: ModelId) -> Result<()> {
        self.model(id)?.require_state(TransactionState::Idle)?;
        self.sync_batch(&[id])
    }

    /// Mutate a document outside the AXI layer, then resynchronize
    pub fn edit_document<R>(
        &mut self,
        id: ModelId,
        edit: impl FnOnce(&mut SchemaDocument) -> R,
    ) -> Result<R> {
        let model = self.model_mut(id)?;
        model.require_state(TransactionState::Idle)?;
        let result = edit(&mut model.document);
        self.sync_batch(&[id])?;
        Ok(result)
    }

    /// Swap in an unrelated document for a model; components are matched by name and position
    pub fn replace_document(&mut self, id: ModelId, doc: SchemaDocument) -> Result<()> {
        let model = self.model_mut(id)?;
        model.require_state(TransactionState::Idle)?;
        if doc.id() != model.document.id() {
            return Err(AxiError::InvalidStructure {
                details: format!(
                    "replacement document {} does not match {}",
                    doc.id(),
                    model.document.id()
                ),
            });
        }
        let root = model.root();
        for slot in model.components.iter_mut().flatten() {
            slot.peer = None;
        }
        model.peers.clear();
        model.document = doc;
        let schema_root = model.document.root();
        model.bind_peer(root, schema_root)?;
        self.sync_batch(&[id])
    }

    /// Rewrite a model's document into a design pattern, then reconcile the tree
    pub fn transform(&mut self, id: ModelId, pattern: DesignPattern) -> Result<TransformReport> {
        let model = self.model(id)?;
        model.require_state(TransactionState::Idle)?;
        let options = TransformOptions {
            type_suffix: self.config.generator.type_suffix.clone(),
        };
        let output = generator::transform(model.document(), pattern, &options)?;

        let model = self.model_mut(id)?;
        model.document = output.document;
        model.set_schema_design_pattern(Some(pattern));
        self.sync_batch(&[id])?;
        Ok(output.report)
    }

    pub(crate) fn sync_batch(&mut self, ids: &[ModelId]) -> Result<()> {
        for id in ids {
            reader::sync_globals(self.model_mut(*id)?)?;
        }
        for id in ids {
            self.sync_one(*id)?;
        }
        self.refresh_dependents(ids)?;
        self.prune_stale_proxies()?;

        if self.config.model.verify_after_sync {
            for id in ids {
                let violations = self.verify(*id)?;
                for violation in &violations {
                    error!(model = %id, %violation, "Invariant violated after sync");
                }
            }
        }
        Ok(())
    }

    fn sync_one(&mut self, id: ModelId) -> Result<SyncStats> {
        let mut model = self
            .models
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(AxiError::UnknownModel(id))?;
        let visible = self.visible_from(&model.document);
        let result = {
            let lookup = RegistryLookup {
                registry: self,
                visible,
            };
            reader::sync(&mut model, &lookup)
        };
        self.models[id.index()] = Some(model);
        result
    }

    /// Models reachable through imports and includes of `doc`
    fn visible_from(&self, doc: &SchemaDocument) -> HashSet<ModelId> {
        let own = self.by_document.get(doc.id()).copied();
        let mut visible = HashSet::new();
        let mut queue: VecDeque<(DocumentId, Vec<ExternalRef>)> =
            VecDeque::from([(doc.id().clone(), doc.external_refs())]);

        while let Some((base, externals)) = queue.pop_front() {
            for external in externals {
                let targets: Vec<ModelId> = match &external.location {
                    Some(location) => {
                        let resolved = self.source.resolve(location, Some(&base));
                        self.by_document.get(&resolved).copied().into_iter().collect()
                    }
                    // An import without a location can bind to any loaded document of that namespace
                    None => self
                        .models()
                        .filter(|m| {
                            m.document().target_namespace() == external.namespace.as_deref()
                        })
                        .map(AxiModel::id)
                        .collect(),
                };
                for target in targets {
                    if Some(target) == own {
                        continue;
                    }
                    if visible.insert(target)
                        && let Ok(model) = self.model(target)
                    {
                        queue.push_back((
                            model.document().id().clone(),
                            model.document().external_refs(),
                        ));
                    }
                }
            }
        }
        visible
    }

    /// Resync models holding proxies or content types whose targets died
    fn refresh_dependents(&mut self, changed: &[ModelId]) -> Result<()> {
        let mut changed: HashSet<ModelId> = changed.iter().copied().collect();
        loop {
            let dependents: Vec<ModelId> = self
                .models()
                .filter(|m| !changed.contains(&m.id()))
                .filter(|m| {
                    m.iter().any(|(_, c)| {
                        [c.original, c.content_type]
                            .into_iter()
                            .flatten()
                            .any(|target| changed.contains(&target.model) && self.component(target).is_err())
                    })
                })
                .map(AxiModel::id)
                .collect();
            if dependents.is_empty() {
                return Ok(());
            }
            for id in dependents {
                debug!(model = %id, "Resynchronizing dependent model");
                reader::sync_globals(self.model_mut(id)?)?;
                self.sync_one(id)?;
                changed.insert(id);
            }
        }
    }

    /// Drop delegated children that no longer match their source
    fn prune_stale_proxies(&mut self) -> Result<()> {
        loop {
            let mut stale = Vec::new();
            for model in self.models() {
                for (id, component) in model.iter() {
                    if !component.children_loaded || reader::owns_children(component) {
                        continue;
                    }
                    let r = model.reference(id);
                    let expected = match delegation_source(r, component) {
                        None => Some(Vec::new()),
                        Some(source) => self
                            .component(source)
                            .ok()
                            .filter(|s| s.children_loaded)
                            .map(|s| {
                                s.children
                                    .iter()
                                    .map(|c| ComponentRef::new(source.model, *c))
                                    .collect::<Vec<_>>()
                            }),
                    };
                    let actual: Vec<Option<ComponentRef>> = component
                        .children
                        .iter()
                        .map(|c| model.component(*c).and_then(|child| child.original))
                        .collect();
                    let fresh = expected.is_some_and(|expected| {
                        expected.len() == actual.len()
                            && expected
                                .iter()
                                .zip(&actual)
                                .all(|(e, a)| Some(*e) == *a && self.component(*e).is_ok())
                    });
                    if !fresh {
                        stale.push(r);
                    }
                }
            }
            if stale.is_empty() {
                return Ok(());
            }
            for r in stale {
                let model = self.model_mut(r.model)?;
                if !model.contains(r.id) {
                    continue;
                }
                for child in std::mem::take(&mut model.get_mut(r.id)?.children) {
                    model.destroy(child, &|_| false)?;
                }
                model.get_mut(r.id)?.children_loaded = false;
            }
        }
    }

    /// Check structural invariants of one model
    pub fn verify(&self, id: ModelId) -> Result<Vec<InvariantViolation>> {
        visitor::check_invariants(self, id)
    }

    // Resolution

    pub fn component(&self, r: ComponentRef) -> Result<&Component> {
        self.model(r.model)?.get(r.id)
    }

    pub fn kind(&self, r: ComponentRef) -> Result<ComponentKind> {
        Ok(self.component(r)?.kind())
    }

    pub fn component_type(&self, r: ComponentRef) -> Result<ComponentType> {
        Ok(self.component(r)?.component_type())
    }

    /// One delegation step: a proxy's original, otherwise the component itself
    pub fn original(&self, r: ComponentRef) -> Result<ComponentRef> {
        let component = self.component(r)?;
        if component.is_proxy() {
            return component.original.ok_or_else(|| AxiError::Inconsistent {
                details: format!("proxy {} has no original", r),
            });
        }
        Ok(r)
    }

    /// Walk a proxy chain to its first non-proxy component, returning it and the step count
    pub fn terminal(&self, r: ComponentRef) -> Result<(ComponentRef, usize)> {
        let limit = self.chain_limit();
        let mut current = r;
        let mut depth = 0;
        while self.component(current)?.is_proxy() {
            if depth >= limit {
                return Err(AxiError::Inconsistent {
                    details: format!("proxy chain from {} does not terminate", r),
                });
            }
            current = self.original(current)?;
            depth += 1;
        }
        if depth > self.config.model.max_proxy_depth {
            warn!(component = %r, depth, "Deep proxy chain");
        }
        Ok((current, depth))
    }

    /// Number of proxy steps between a component and what it stands for
    pub fn indirection_depth(&self, r: ComponentRef) -> Result<usize> {
        Ok(self.terminal(r)?.1)
    }

    /// Effective name, delegating through proxies and references
    pub fn name(&self, r: ComponentRef) -> Result<Option<String>> {
        let (terminal, _) = self.terminal(r)?;
        Ok(self
            .model(terminal.model)?
            .name(terminal.id)
            .map(str::to_string))
    }

    /// Effective target namespace, taken from the model that declares the component
    pub fn target_namespace(&self, r: ComponentRef) -> Result<Option<String>> {
        let (terminal, _) = self.terminal(r)?;
        Ok(self
            .model(terminal.model)?
            .document()
            .target_namespace()
            .map(str::to_string))
    }

    fn chain_limit(&self) -> usize {
        // Each delegation step crosses at most one model boundary or one reference
        self.models.len() * 4 + 16
    }

    /// Children of any component, materializing delegated proxies on first access
    pub fn children(&mut self, r: ComponentRef) -> Result<Vec<ComponentRef>> {
        self.children_at(r, 0)
    }

    fn children_at(&mut self, r: ComponentRef, depth: usize) -> Result<Vec<ComponentRef>> {
        if depth > self.chain_limit() {
            return Err(AxiError::Inconsistent {
                details: format!("delegation from {} does not terminate", r),
            });
        }

        let component = self.component(r)?;
        if component.children_loaded {
            return Ok(component
                .children
                .iter()
                .map(|c| ComponentRef::new(r.model, *c))
                .collect());
        }

        let originals = match delegation_source(r, component) {
            Some(source) => self.children_at(source, depth + 1)?,
            None => Vec::new(),
        };
        let kinds = originals
            .iter()
            .map(|original| Ok((*original, self.kind(*original)?)))
            .collect::<Result<Vec<_>>>()?;

        let model = self.model_mut(r.model)?;
        let mut ids = Vec::with_capacity(kinds.len());
        for (original, kind) in kinds {
            let mut proxy = Component::new(kind, ComponentType::Proxy);
            proxy.original = Some(original);
            proxy.parent = Some(r.id);
            proxy.children_loaded = false;
            ids.push(model.alloc(proxy));
        }
        let owner = model.get_mut(r.id)?;
        owner.children = ids.clone();
        owner.children_loaded = true;

        Ok(ids.into_iter().map(|id| ComponentRef::new(r.model, id)).collect())
    }
}

/// Where a component's children come from when it does not own them
pub(crate) fn delegation_source(r: ComponentRef, component: &Component) -> Option<ComponentRef> {
    match component.component_type {
        ComponentType::Proxy => component.original,
        ComponentType::Reference => component.shared.map(|s| ComponentRef::new(r.model, s)),
        ComponentType::Local | ComponentType::Shared => component.content_type,
    }
}

struct RegistryLookup<'a> {
    registry: &'a ModelRegistry,
    visible: HashSet<ModelId>,
}

impl ForeignLookup for RegistryLookup<'_> {
    fn find(&self, from: &SchemaDocument, kind: SchemaKind, qname: &QName) -> Option<ComponentRef> {
        let mut candidates: Vec<ModelId> = self.visible.iter().copied().collect();
        candidates.sort();
        for id in candidates {
            let Ok(model) = self.registry.model(id) else {
                continue;
            };
            let doc = model.document();
            let decl = match doc.target_namespace() {
                Some(_) => doc.find_global_ref(kind, qname),
                // Chameleon include: adopts the including document's namespace
                None if qname.namespace.as_deref() == from.target_namespace() => {
                    doc.find_global_ref(kind, &QName {
                        namespace: None,
                        local: qname.local.clone(),
                    })
                }
                None => None,
            };
            let Some(decl) = decl else {
                continue;
            };
            if kind == SchemaKind::ComplexType && doc.kind(decl) != Some(SchemaKind::ComplexType) {
                return None;
            }
            if let Some(component) = model.component_for_node(decl) {
                return Some(model.reference(component));
            }
        }
        None
    }
}
