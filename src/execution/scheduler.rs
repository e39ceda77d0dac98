//! Execution scheduler - resolves step inputs and determines which steps to run next

use crate::core::{FieldRef, InputValue, Pipeline, StepState, StepStatus, ValueMap};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Values assigned to workflow inputs
pub type WorkflowInputs = BTreeMap<FieldRef, InputValue>;

/// Strategy for scheduling step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute steps in dependency order, one at a time
    #[default]
    Sequential,

    /// Execute all ready steps in parallel
    Parallel,

    /// Limited parallelism (max N concurrent steps)
    LimitedParallel(usize),
}

impl fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingStrategy::Sequential => write!(f, "sequential"),
            SchedulingStrategy::Parallel => write!(f, "parallel"),
            SchedulingStrategy::LimitedParallel(max) => write!(f, "limited:{}", max),
        }
    }
}

impl FromStr for SchedulingStrategy {
    type Err = String;

    /// Parse `sequential`, `parallel` or `limited:N`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(SchedulingStrategy::Sequential),
            "parallel" => Ok(SchedulingStrategy::Parallel),
            other => {
                let max = other
                    .strip_prefix("limited:")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        format!(
                            "Invalid strategy '{}' (expected sequential, parallel or limited:N)",
                            other
                        )
                    })?;
                Ok(SchedulingStrategy::LimitedParallel(max))
            }
        }
    }
}

/// What a step needs before it can run
#[derive(Debug, Clone, PartialEq)]
pub enum StepPlan {
    /// Some required inputs have no value yet
    Blocked { missing: Vec<String> },

    /// A step feeding this one failed
    UpstreamFailed { upstream: Vec<String> },

    /// All inputs resolved; the step has no result for them yet
    Ready { inputs: ValueMap },

    /// The step already holds a result for exactly these inputs
    Unchanged,
}

/// Scheduler for determining which steps to run
#[derive(Debug, Clone, Default)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Resolve the inputs of `step_id`
    ///
    /// An input is resolved from, in order: the upstream output it is
    /// connected to, a value assigned to it as a workflow input, its
    /// default. Optional inputs may stay absent.
    pub fn plan(pipeline: &Pipeline, inputs: &WorkflowInputs, step_id: &str) -> StepPlan {
        let Some(step) = pipeline.step(step_id) else {
            return StepPlan::Blocked {
                missing: vec![step_id.to_string()],
            };
        };

        let mut resolved = step.constants.clone();
        let mut missing = Vec::new();
        let mut upstream_failed = Vec::new();

        for field in &step.schema.inputs {
            let field_ref = FieldRef::new(&step.id, &field.name);

            let value = match pipeline.incoming(&field_ref) {
                Some(connection) => match pipeline.step(&connection.source.step_id).map(|s| &s.state) {
                    Some(StepState::Resolved { outputs, .. }) => {
                        outputs.get(&connection.source.field).cloned()
                    }
                    Some(StepState::Failed { .. }) => {
                        if !upstream_failed.contains(&connection.source.step_id) {
                            upstream_failed.push(connection.source.step_id.clone());
                        }
                        continue;
                    }
                    _ => {
                        missing.push(field.name.clone());
                        continue;
                    }
                },
                None => inputs.get(&field_ref).and_then(InputValue::value).cloned(),
            };

            match value.or_else(|| field.default.clone()) {
                Some(value) => {
                    resolved.insert(field.name.clone(), value);
                }
                None if field.optional => {}
                None => missing.push(field.name.clone()),
            }
        }

        if !upstream_failed.is_empty() {
            StepPlan::UpstreamFailed {
                upstream: upstream_failed,
            }
        } else if !missing.is_empty() {
            StepPlan::Blocked { missing }
        } else if step.state.is_result_for(&resolved) {
            StepPlan::Unchanged
        } else {
            StepPlan::Ready { inputs: resolved }
        }
    }

    /// Reported status of a step
    pub fn status(pipeline: &Pipeline, inputs: &WorkflowInputs, step_id: &str) -> StepStatus {
        match pipeline.step(step_id).map(|s| &s.state) {
            Some(StepState::Resolved { .. }) => StepStatus::Resolved,
            Some(StepState::Failed { .. }) => StepStatus::Failed,
            Some(StepState::Pending) => match Self::plan(pipeline, inputs, step_id) {
                StepPlan::Ready { .. } => StepStatus::Ready,
                _ => StepStatus::Pending,
            },
            None => StepStatus::Pending,
        }
    }

    /// Select the next batch from steps that are ready, in execution order
    pub fn next_steps<T>(&self, mut ready: Vec<T>) -> Vec<T> {
        let max = match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => ready.len(),
            SchedulingStrategy::LimitedParallel(max) => max.max(1),
        };
        ready.truncate(max);
        ready
    }
}
