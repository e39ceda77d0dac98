//! Step executor - runs individual steps against their module

use crate::core::{Step, StepConfig, ValueMap};
use crate::registry::{ModuleSchema, Operation};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// Everything needed to run one step, detached from the pipeline
#[derive(Debug, Clone)]
pub struct StepJob {
    pub step_id: String,
    pub operation: Operation,
    pub config: StepConfig,
    pub schema: ModuleSchema,
    /// Resolved input values
    pub inputs: ValueMap,
}

impl StepJob {
    pub fn new(step: &Step, inputs: ValueMap) -> Self {
        Self {
            step_id: step.id.clone(),
            operation: step.operation.clone(),
            config: step.config.clone(),
            schema: step.schema.clone(),
            inputs,
        }
    }
}

/// Result of executing a step
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Step produced its outputs
    Success {
        outputs: ValueMap,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Module failed or returned invalid outputs
    Failed { error: String },
}

/// Executes a single step
#[derive(Debug, Default)]
pub struct StepExecutor;

impl StepExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a step and return the result
    pub async fn execute(&self, job: &StepJob) -> ExecutionResult {
        info!("Executing step: {} ({})", job.step_id, job.operation.name);
        let started_at = Utc::now();

        let outputs = match job.operation.module.process(&job.config, &job.inputs).await {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Step {} failed: {}", job.step_id, e);
                return ExecutionResult::Failed {
                    error: e.to_string(),
                };
            }
        };

        match Self::check_outputs(job, outputs) {
            Ok(outputs) => {
                debug!(
                    "Step {} produced: {}",
                    job.step_id,
                    outputs.keys().cloned().collect::<Vec<_>>().join(", ")
                );
                ExecutionResult::Success {
                    outputs,
                    started_at,
                    completed_at: Utc::now(),
                }
            }
            Err(error) => {
                error!("Step {} returned invalid outputs: {}", job.step_id, error);
                ExecutionResult::Failed { error }
            }
        }
    }

    /// Keep declared outputs only; every required output must be present and well-typed
    fn check_outputs(job: &StepJob, mut outputs: ValueMap) -> Result<ValueMap, String> {
        let undeclared: Vec<String> = outputs
            .keys()
            .filter(|name| job.schema.output_field(name).is_none())
            .cloned()
            .collect();
        for name in undeclared {
            warn!("Step {} returned undeclared output '{}'", job.step_id, name);
            outputs.remove(&name);
        }

        for field in &job.schema.outputs {
            match outputs.get(&field.name) {
                Some(value) if !field.data_type.accepts(value.data_type()) => {
                    return Err(format!(
                        "Output '{}' should be {}, got {}",
                        field.name,
                        field.data_type,
                        value.data_type()
                    ));
                }
                None if !field.optional => {
                    return Err(format!("Missing output '{}'", field.name));
                }
                _ => {}
            }
        }

        Ok(outputs)
    }
}
