//! Tree traversal dispatching on component type, and the invariant checker built on it.

use std::fmt;

use super::component::{Component, ComponentId, ComponentRef, ComponentType, ModelId};
use super::model::AxiModel;
use super::registry::ModelRegistry;
use crate::error::Result;

/// Callbacks for [`walk`]; each defaults to doing nothing
pub trait ComponentVisitor {
    fn visit_local(&mut self, _model: &AxiModel, _id: ComponentId, _component: &Component) {}
    fn visit_shared(&mut self, _model: &AxiModel, _id: ComponentId, _component: &Component) {}
    fn visit_reference(&mut self, _model: &AxiModel, _id: ComponentId, _component: &Component) {}
    fn visit_proxy(&mut self, _model: &AxiModel, _id: ComponentId, _component: &Component) {}
}

/// Visit every materialized component of a model in document order.
/// Delegated children that were never accessed are not loaded here.
pub fn walk<V: ComponentVisitor + ?Sized>(model: &AxiModel, visitor: &mut V) {
    let mut stack = vec![model.root()];
    while let Some(id) = stack.pop() {
        let Some(component) = model.component(id) else {
            continue;
        };
        match component.component_type() {
            ComponentType::Local => visitor.visit_local(model, id, component),
            ComponentType::Shared => visitor.visit_shared(model, id, component),
            ComponentType::Reference => visitor.visit_reference(model, id, component),
            ComponentType::Proxy => visitor.visit_proxy(model, id, component),
        }
        stack.extend(component.children().iter().rev().copied());
    }
}

/// A broken structural invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    MissingParent { component: ComponentRef },
    ParentMismatch { component: ComponentRef, parent: ComponentId },
    ReferenceChildNotProxy { owner: ComponentRef, child: ComponentId },
    RefSetAsymmetry { shared: ComponentRef, reference: ComponentId },
    DanglingReference { component: ComponentRef },
    UnterminatedProxy { component: ComponentRef },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParent { component } => write!(f, "{} is attached but has no parent", component),
            Self::ParentMismatch { component, parent } => {
                write!(f, "{} names {} as parent, which does not list it", component, parent)
            }
            Self::ReferenceChildNotProxy { owner, child } => {
                write!(f, "child {} of {} is not a proxy", child, owner)
            }
            Self::RefSetAsymmetry { shared, reference } => {
                write!(f, "refSet of {} disagrees with reference {}", shared, reference)
            }
            Self::DanglingReference { component } => write!(f, "{} points at nothing", component),
            Self::UnterminatedProxy { component } => {
                write!(f, "proxy chain from {} does not reach a declaration", component)
            }
        }
    }
}

struct InvariantChecker<'a> {
    registry: &'a ModelRegistry,
    model: ModelId,
    violations: Vec<InvariantViolation>,
}

impl InvariantChecker<'_> {
    fn at(&self, id: ComponentId) -> ComponentRef {
        ComponentRef::new(self.model, id)
    }

    fn check_common(&mut self, model: &AxiModel, id: ComponentId, component: &Component) {
        if id != model.root() {
            match component.parent() {
                None => self.violations.push(InvariantViolation::MissingParent {
                    component: self.at(id),
                }),
                Some(parent) if !model.children(parent).contains(&id) => {
                    self.violations.push(InvariantViolation::ParentMismatch {
                        component: self.at(id),
                        parent,
                    })
                }
                Some(_) => {}
            }
        }
        for child in component.children() {
            if model.parent(*child) != Some(id) {
                self.violations.push(InvariantViolation::ParentMismatch {
                    component: self.at(*child),
                    parent: id,
                });
            }
        }
    }

    fn check_delegated_children(&mut self, model: &AxiModel, id: ComponentId, component: &Component) {
        for child in component.children() {
            if model.component(*child).is_some_and(|c| !c.is_proxy()) {
                self.violations.push(InvariantViolation::ReferenceChildNotProxy {
                    owner: self.at(id),
                    child: *child,
                });
            }
        }
    }
}

impl ComponentVisitor for InvariantChecker<'_> {
    fn visit_local(&mut self, model: &AxiModel, id: ComponentId, component: &Component) {
        self.check_common(model, id, component);
        if component.content_type().is_some() {
            self.check_delegated_children(model, id, component);
        }
    }

    fn visit_shared(&mut self, model: &AxiModel, id: ComponentId, component: &Component) {
        self.visit_local(model, id, component);
        for reference in component.ref_set() {
            let symmetric = model
                .component(*reference)
                .is_some_and(|r| r.shared() == Some(id));
            if !symmetric {
                self.violations.push(InvariantViolation::RefSetAsymmetry {
                    shared: self.at(id),
                    reference: *reference,
                });
            }
        }
    }

    fn visit_reference(&mut self, model: &AxiModel, id: ComponentId, component: &Component) {
        self.check_common(model, id, component);
        self.check_delegated_children(model, id, component);
        match component.shared().map(|s| (s, model.component(s))) {
            Some((shared, Some(target))) => {
                if !target.ref_set().contains(&id) {
                    self.violations.push(InvariantViolation::RefSetAsymmetry {
                        shared: self.at(shared),
                        reference: id,
                    });
                }
            }
            _ => self.violations.push(InvariantViolation::DanglingReference {
                component: self.at(id),
            }),
        }
    }

    fn visit_proxy(&mut self, model: &AxiModel, id: ComponentId, component: &Component) {
        self.check_common(model, id, component);
        self.check_delegated_children(model, id, component);
        let live = component
            .original()
            .is_some_and(|original| self.registry.component(original).is_ok());
        if !live {
            self.violations.push(InvariantViolation::DanglingReference {
                component: self.at(id),
            });
        } else if self.registry.terminal(self.at(id)).is_err() {
            self.violations.push(InvariantViolation::UnterminatedProxy {
                component: self.at(id),
            });
        }
    }
}

/// Every structural invariant violation in one model
pub(crate) fn check_invariants(registry: &ModelRegistry, id: ModelId) -> Result<Vec<InvariantViolation>> {
    let model = registry.model(id)?;
    let mut checker = InvariantChecker {
        registry,
        model: id,
        violations: Vec::new(),
    };
    walk(model, &mut checker);
    Ok(checker.violations)
}
