//! Error types for graph construction and workflow control

use crate::core::value::DataType;
use crate::persistence::StoreError;
use thiserror::Error;

/// Result type alias using WorkflowError
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised by pipeline construction and the workflow controller
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Invalid configuration for step '{step_id}': {message}")]
    InvalidStepConfig { step_id: String, message: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Type mismatch for '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Input '{target}' is already connected to '{existing}'")]
    AlreadyConnected { target: String, existing: String },

    #[error("Connecting '{source_field}' to '{target}' would create a cycle")]
    Cycle { target: String, source_field: String },

    #[error("Unknown workflow input: {0}")]
    UnknownAlias(String),

    #[error("{namespace} alias '{alias}' is already bound to '{field}'")]
    DuplicateAlias {
        namespace: &'static str,
        alias: String,
        field: String,
    },

    #[error("Workflow alias already exists: {0}")]
    AliasExists(String),

    #[error("No step could be processed (failed: [{}], pending: [{}])", failed.join(", "), pending.join(", "))]
    NoProgress {
        failed: Vec<String>,
        pending: Vec<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
