//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, ProcessSummary};
pub use executor::{ExecutionResult, StepExecutor, StepJob};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy, StepPlan, WorkflowInputs};
