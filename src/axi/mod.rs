//! The AXI model: a component tree mirroring one schema document, with
//! shared declarations, same-document references and read-only proxies
//! for declarations that live in other documents.

mod component;
mod factory;
mod model;
mod reader;
mod registry;
mod transaction;
pub mod visitor;

pub use component::{
    AttributeUse, Component, ComponentId, ComponentKind, ComponentRef, ComponentType,
    CompositorKind, ContentModelKind, Datatype, Form, MaxOccurs, ModelId,
};
pub use factory::ComponentFactory;
pub use model::{AxiModel, TransactionState};
pub use registry::ModelRegistry;
pub use transaction::{FlushReport, Transaction};
pub use visitor::{ComponentVisitor, InvariantViolation};
