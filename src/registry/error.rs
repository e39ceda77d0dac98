//! Registry and module error types

use thiserror::Error;

/// Error types for registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Operation not found: {0}")]
    NotFound(String),

    #[error("Operation already registered: {0}")]
    Conflict(String),
}

/// Error types for module schema resolution and processing
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid input '{field}': {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid module config: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl ModuleError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}
