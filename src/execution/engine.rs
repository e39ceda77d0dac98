//! Main execution engine - drives one processing pass over a pipeline

use crate::{
    core::{Pipeline, StepState},
    execution::{
        scheduler::WorkflowInputs, ExecutionResult, ExecutionScheduler, SchedulingStrategy, StepExecutor,
        StepJob, StepPlan,
    },
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events that can occur during a processing pass
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    ProcessingStarted {
        steps: usize,
    },
    StepStarted {
        step_id: String,
        operation: String,
    },
    StepResolved {
        step_id: String,
    },
    StepFailed {
        step_id: String,
        error: String,
    },
    /// Step not run because a step feeding it failed
    StepSkipped {
        step_id: String,
        upstream: Vec<String>,
    },
    /// Step already held a result for its current inputs
    StepReused {
        step_id: String,
    },
    ProcessingCompleted {
        summary: ProcessSummary,
    },
}

/// Outcome of one processing pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessSummary {
    /// Steps whose module ran during this pass
    pub executed: Vec<String>,
    /// Steps resolved during this pass
    pub resolved: Vec<String>,
    /// Steps that failed during this pass, directly or through an upstream failure
    pub failed: Vec<String>,
    /// Steps whose previous result was kept
    pub reused: Vec<String>,
    /// Steps still pending after the pass
    pub pending: Vec<String>,
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Main pipeline execution engine
pub struct ExecutionEngine {
    scheduler: ExecutionScheduler,
    executor: Arc<StepExecutor>,
    event_handlers: Vec<EventHandler>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(SchedulingStrategy::default())
    }
}

impl ExecutionEngine {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            executor: Arc::new(StepExecutor::new()),
            event_handlers: Vec::new(),
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.scheduler.strategy()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Run every step whose inputs can be resolved, in topological order
    ///
    /// Steps that already hold a result for their resolved inputs are kept.
    /// A failed step marks everything downstream of it as failed; independent
    /// branches keep running.
    pub async fn process(&self, pipeline: &mut Pipeline, inputs: &WorkflowInputs) -> ProcessSummary {
        info!("Processing {} steps ({})", pipeline.len(), self.strategy());
        self.emit_event(ExecutionEvent::ProcessingStarted {
            steps: pipeline.len(),
        });

        let mut summary = ProcessSummary::default();
        let mut first_round = true;
        // A step runs at most once per pass
        let mut executed = HashSet::new();

        loop {
            let mut ready = Vec::new();

            for step_id in pipeline.execution_order().to_vec() {
                match ExecutionScheduler::plan(pipeline, inputs, &step_id) {
                    StepPlan::Ready { .. } if executed.contains(&step_id) => {
                        debug!("Step {} already ran in this pass", step_id);
                    }
                    StepPlan::Ready { inputs } => ready.push((step_id, inputs)),
                    StepPlan::Unchanged => {
                        if first_round {
                            debug!("Step {} unchanged, keeping previous result", step_id);
                            summary.reused.push(step_id.clone());
                            self.emit_event(ExecutionEvent::StepReused { step_id });
                        }
                    }
                    StepPlan::UpstreamFailed { upstream } => {
                        self.mark_upstream_failed(pipeline, &step_id, upstream, &mut summary);
                    }
                    StepPlan::Blocked { .. } => {}
                }
            }
            first_round = false;

            let batch = self.scheduler.next_steps(ready);
            if batch.is_empty() {
                break;
            }

            let jobs: Vec<StepJob> = batch
                .into_iter()
                .filter_map(|(step_id, inputs)| pipeline.step(&step_id).map(|step| StepJob::new(step, inputs)))
                .collect();

            for job in &jobs {
                executed.insert(job.step_id.clone());
                self.emit_event(ExecutionEvent::StepStarted {
                    step_id: job.step_id.clone(),
                    operation: job.operation.name.clone(),
                });
            }

            // Results are applied only after the whole batch finished
            let results = self.run_batch(jobs).await;
            for (job, result) in results {
                self.apply_result(pipeline, job, result, &mut summary);
            }
        }

        summary.pending = pipeline
            .steps()
            .filter(|s| matches!(s.state, StepState::Pending))
            .map(|s| s.id.clone())
            .collect();

        info!(
            "Processing finished: {} executed, {} failed, {} reused, {} pending",
            summary.executed.len(),
            summary.failed.len(),
            summary.reused.len(),
            summary.pending.len()
        );
        self.emit_event(ExecutionEvent::ProcessingCompleted {
            summary: summary.clone(),
        });

        summary
    }

    async fn run_batch(&self, jobs: Vec<StepJob>) -> Vec<(StepJob, ExecutionResult)> {
        let mut results = Vec::with_capacity(jobs.len());

        if jobs.len() == 1 || self.strategy() == SchedulingStrategy::Sequential {
            for job in jobs {
                let handle = self.spawn_job(job.clone());
                let result = Self::join_job(&job, handle).await;
                results.push((job, result));
            }
            return results;
        }

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let handle = self.spawn_job(job.clone());
                (job, handle)
            })
            .collect();
        for (job, handle) in handles {
            let result = Self::join_job(&job, handle).await;
            results.push((job, result));
        }

        results
    }

    fn spawn_job(&self, job: StepJob) -> JoinHandle<ExecutionResult> {
        let executor = self.executor.clone();
        tokio::spawn(async move { executor.execute(&job).await })
    }

    /// Wait for a step task; a panicking module fails its step
    async fn join_job(job: &StepJob, handle: JoinHandle<ExecutionResult>) -> ExecutionResult {
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Step {} task aborted: {}", job.step_id, e);
                let error = if e.is_panic() {
                    format!("Module '{}' panicked", job.operation.name)
                } else {
                    format!("Step task aborted: {}", e)
                };
                ExecutionResult::Failed { error }
            }
        }
    }

    fn apply_result(
        &self,
        pipeline: &mut Pipeline,
        job: StepJob,
        result: ExecutionResult,
        summary: &mut ProcessSummary,
    ) {
        let Some(step) = pipeline.step_mut(&job.step_id) else {
            return;
        };
        summary.executed.push(job.step_id.clone());

        match result {
            ExecutionResult::Success {
                outputs,
                started_at,
                completed_at,
            } => {
                step.state = StepState::Resolved {
                    inputs: job.inputs,
                    outputs,
                    started_at,
                    completed_at,
                };
                summary.resolved.push(job.step_id.clone());
                self.emit_event(ExecutionEvent::StepResolved { step_id: job.step_id });
            }
            ExecutionResult::Failed { error } => {
                step.state = StepState::Failed {
                    inputs: Some(job.inputs),
                    error: error.clone(),
                    failed_at: Utc::now(),
                };
                summary.failed.push(job.step_id.clone());
                self.emit_event(ExecutionEvent::StepFailed {
                    step_id: job.step_id,
                    error,
                });
            }
        }
    }

    fn mark_upstream_failed(
        &self,
        pipeline: &mut Pipeline,
        step_id: &str,
        upstream: Vec<String>,
        summary: &mut ProcessSummary,
    ) {
        let Some(step) = pipeline.step_mut(step_id) else {
            return;
        };
        if matches!(step.state, StepState::Failed { inputs: None, .. }) {
            return;
        }

        let error = format!("Upstream step failed: {}", upstream.join(", "));
        warn!("Skipping step {}: {}", step_id, error);
        step.state = StepState::Failed {
            inputs: None,
            error,
            failed_at: Utc::now(),
        };
        summary.failed.push(step_id.to_string());
        self.emit_event(ExecutionEvent::StepSkipped {
            step_id: step_id.to_string(),
            upstream,
        });
    }
}
