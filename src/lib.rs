//! stepwire - declarative step wiring and execution for data workflows

pub mod cli;
pub mod core;
pub mod execution;
pub mod operations;
pub mod persistence;
pub mod registry;
pub mod workflow;

// Re-export commonly used types
pub use crate::core::{
    DataType, FieldRef, InputValue, Pipeline, StepConfig, StepStatus, Value, ValueMap, WorkflowError,
    WorkflowState,
};
pub use execution::{ExecutionEngine, ExecutionEvent, ProcessSummary, SchedulingStrategy};
pub use persistence::{InMemorySnapshotStore, SnapshotStore, StoreError};
pub use registry::{Module, ModuleError, Operation, OperationRegistry, RegistryError};
pub use workflow::Workflow;
