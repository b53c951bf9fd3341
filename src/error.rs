use std::fmt;

use thiserror::Error;

use crate::axi::{ComponentId, ModelId, TransactionState};
use crate::config::ConfigError;
use crate::schema::NodeId;

/// Main library error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum AxiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema source error: {location} - {details}")]
    Source { location: String, details: String },

    #[error("Unknown model: {0}")]
    UnknownModel(ModelId),

    #[error("Unknown component: {id} in model {model}")]
    UnknownComponent { model: ModelId, id: ComponentId },

    #[error("Illegal transaction state: expected {expected}, found {found}")]
    IllegalState {
        expected: TransactionState,
        found: TransactionState,
    },

    #[error("Component {id} is a read-only proxy")]
    ReadOnlyProxy { id: ComponentId },

    #[error("Shared component '{name}' is still referenced by {references} component(s)")]
    SharedComponentInUse { name: String, references: usize },

    #[error("Invalid structure: {details}")]
    InvalidStructure { details: String },

    #[error("Invalid XML name: '{name}'")]
    InvalidName { name: String },

    #[error("Flush rejected {} of {} change(s): {}", .failures.len(), .applied + .failures.len(), summarize(.failures))]
    Flush {
        applied: usize,
        failures: Vec<FlushFailure>,
    },

    #[error("Pattern transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Structural inconsistency: {details}")]
    Inconsistent { details: String },
}

/// Schema document errors (parsing, lookups, mutation primitives)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Schema parsing error: {document} - {details}")]
    Parse { document: String, details: String },

    #[error("Document is not an XML Schema: {document} (root element '{root}')")]
    NotASchema { document: String, root: String },

    #[error("Schema too large: {size} bytes exceeds limit of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Unknown schema node: {0}")]
    UnknownNode(NodeId),

    #[error("Duplicate global {kind} declaration: '{name}'")]
    DuplicateDeclaration { kind: String, name: String },

    #[error("Invalid schema operation: {details}")]
    InvalidOperation { details: String },

    #[error("Schema serialization error: {0}")]
    Serialize(String),
}

/// Pattern transformation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Schema declares no global elements")]
    NoGlobalElements,

    #[error("Schema error during transformation: {0}")]
    Schema(#[from] SchemaError),
}

/// A single delta that could not be written into the schema document
#[derive(Debug, Clone, PartialEq)]
pub struct FlushFailure {
    pub component: ComponentId,
    pub operation: &'static str,
    pub reason: String,
}

impl fmt::Display for FlushFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.operation, self.component, self.reason)
    }
}

fn summarize(failures: &[FlushFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for AxiError {
    fn from(error: ConfigError) -> Self {
        AxiError::Config(error.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AxiError>;
