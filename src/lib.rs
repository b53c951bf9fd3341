//! # xml-axi Library
//!
//! An abstract XML-instance (AXI) component model kept in sync with XML
//! Schema documents, with a transformer that rewrites a schema between the
//! Russian Doll, Venetian Blind, Salami Slice and Garden of Eden design
//! patterns.
//!
//! ```no_run
//! use xml_axi::{DesignPattern, FileSystemSource, ModelRegistry};
//!
//! # fn main() -> xml_axi::Result<()> {
//! let mut registry = ModelRegistry::new(FileSystemSource::new("schemas"));
//! let po = registry.load("po.xsd")?;
//! let report = registry.transform(po, DesignPattern::GardenOfEden)?;
//! println!("{} global elements", report.counts.global_elements);
//! # Ok(())
//! # }
//! ```

pub mod axi;
pub mod config;
pub mod error;
pub mod generator;
pub mod schema;
pub mod source;

pub use axi::{
    AttributeUse, AxiModel, Component, ComponentFactory, ComponentId, ComponentKind,
    ComponentRef, ComponentType, ComponentVisitor, CompositorKind, ContentModelKind, Datatype,
    FlushReport, Form, InvariantViolation, MaxOccurs, ModelId, ModelRegistry, Transaction,
    TransactionState,
};
pub use config::{AxiConfig, ConfigError, ConfigManager, GeneratorConfig, ModelConfig};
pub use error::{AxiError, FlushFailure, Result, SchemaError, TransformError};
pub use generator::{
    DesignPattern, TransformOptions, TransformOutput, TransformReport, infer_design_pattern,
    master_global_elements, transform,
};
pub use schema::{DeclarationCounts, DocumentId, NodeId, QName, SchemaDocument, SchemaKind};
pub use source::{FileSystemSource, InMemorySource, SchemaLocation, SchemaSource};
