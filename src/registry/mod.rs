//! Operation registry - maps operation names to the modules that run them

pub mod error;
pub mod schema;

use crate::core::{StepConfig, ValueMap};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub use error::{ModuleError, RegistryError};
pub use schema::ModuleSchema;

/// Trait for operation execution backends
///
/// A module declares its fields for a given configuration and turns
/// resolved input values into output values. Implementations must be
/// pure with respect to `config` + `inputs`.
#[async_trait]
pub trait Module: Send + Sync {
    /// Declared inputs and outputs for this configuration
    fn schema(&self, config: &StepConfig) -> Result<ModuleSchema, ModuleError>;

    /// Produce output values from resolved inputs
    async fn process(&self, config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError>;
}

/// A registered, named operation
#[derive(Clone)]
pub struct Operation {
    /// Namespaced name (e.g. `create.table`)
    pub name: String,

    /// Short description
    pub doc: String,

    /// Module that executes this operation
    pub module: Arc<dyn Module>,
}

impl Operation {
    pub fn new(name: impl Into<String>, doc: impl Into<String>, module: Arc<dyn Module>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            module,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

/// Registry of operations available to pipelines
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Operation>,
}

impl OperationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in operations
    pub fn with_builtin_operations() -> Self {
        let mut registry = Self::new();
        if let Err(e) = crate::operations::register_builtin(&mut registry) {
            warn!("Builtin operations incomplete: {}", e);
        }
        registry
    }

    /// Register an operation; names are unique
    pub fn register(&mut self, operation: Operation) -> Result<(), RegistryError> {
        if self.operations.contains_key(&operation.name) {
            return Err(RegistryError::Conflict(operation.name));
        }
        self.operations.insert(operation.name.clone(), operation);
        Ok(())
    }

    /// Look up an operation by name
    pub fn lookup(&self, name: &str) -> Result<&Operation, RegistryError> {
        self.operations
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Registered operation names, sorted
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
