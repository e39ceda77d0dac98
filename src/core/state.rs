//! Execution state models

use crate::core::{
    field::FieldRef,
    pipeline::PipelineStructure,
    value::{same_values, Value, ValueMap},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Reported status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Inputs incomplete (or waiting on upstream steps)
    Pending,
    /// Inputs complete, not yet processed
    Ready,
    /// Outputs produced for the current inputs
    Resolved,
    /// Processing failed, or an upstream step failed
    Failed,
}

/// Runtime state of a single step
#[derive(Debug, Clone, PartialEq)]
pub enum StepState {
    /// No result for the current inputs
    Pending,
    /// Step produced outputs
    Resolved {
        /// Resolved inputs the outputs were produced from
        inputs: ValueMap,
        outputs: ValueMap,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step failed
    Failed {
        /// Inputs the failing run used; `None` when an upstream step failed
        inputs: Option<ValueMap>,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Resolved { .. } | StepState::Failed { .. })
    }

    /// Whether this state already holds a result for exactly these inputs
    pub fn is_result_for(&self, resolved: &ValueMap) -> bool {
        match self {
            StepState::Resolved { inputs, .. } => same_values(inputs, resolved),
            StepState::Failed {
                inputs: Some(inputs),
                ..
            } => same_values(inputs, resolved),
            _ => false,
        }
    }

    pub fn outputs(&self) -> Option<&ValueMap> {
        match self {
            StepState::Resolved { outputs, .. } => Some(outputs),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StepState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Value assigned to a workflow input
///
/// `Default` means "use the field's declared default" and is what a
/// `None` passed to `set_input` records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InputValue {
    Default,
    Value(Value),
}

impl InputValue {
    pub fn value(&self) -> Option<&Value> {
        match self {
            InputValue::Default => None,
            InputValue::Value(value) => Some(value),
        }
    }
}

impl From<Option<Value>> for InputValue {
    fn from(value: Option<Value>) -> Self {
        value.map(InputValue::Value).unwrap_or(InputValue::Default)
    }
}

/// Status of one step inside a workflow state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub operation: String,
    pub status: StepStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Immutable record of a workflow at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Unique state ID
    pub id: Uuid,

    /// Number of snapshots taken before this state
    pub version: usize,

    pub created_at: DateTime<Utc>,

    /// Alias of the owning workflow
    pub workflow_alias: String,

    pub doc: String,

    /// Steps, connections and aliases
    pub structure: PipelineStructure,

    /// Values assigned to workflow inputs
    pub inputs: BTreeMap<FieldRef, InputValue>,

    /// Per-step status
    pub steps: BTreeMap<String, StepSnapshot>,

    /// Resolved values of aliased outputs
    pub outputs: BTreeMap<String, Value>,
}

impl WorkflowState {
    /// Count steps in the given status
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.values().filter(|s| s.status == status).count()
    }

    /// Fraction of steps that reached a terminal status (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        (self.count(StepStatus::Resolved) + self.count(StepStatus::Failed)) as f64
            / self.steps.len() as f64
    }
}
