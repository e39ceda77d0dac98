//! Workflow controller - owns a pipeline, its input values and its state history

use crate::core::{
    FieldRef, FieldSchema, InputValue, Pipeline, Result, Step, StepConfig, StepSnapshot, StepState,
    Value, WorkflowError, WorkflowState,
};
use crate::execution::{
    ExecutionEngine, ExecutionEvent, ExecutionScheduler, ProcessSummary, SchedulingStrategy,
    WorkflowInputs,
};
use crate::persistence::SnapshotStore;
use crate::registry::OperationRegistry;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A named, documented pipeline plus the values assigned to its inputs
pub struct Workflow {
    alias: String,
    doc: String,
    registry: Arc<OperationRegistry>,
    store: Arc<dyn SnapshotStore>,
    pipeline: Pipeline,
    inputs: WorkflowInputs,
    engine: ExecutionEngine,
    /// Snapshots taken so far, oldest first
    history: Vec<WorkflowState>,
}

impl Workflow {
    /// Create an empty workflow
    ///
    /// Fails with `AliasExists` when `store` already holds a snapshot under
    /// `alias`, unless `replace_existing_alias` is set.
    pub async fn create(
        alias: impl Into<String>,
        doc: impl Into<String>,
        replace_existing_alias: bool,
        registry: Arc<OperationRegistry>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        let alias = alias.into();
        if !replace_existing_alias && store.contains(&alias).await? {
            return Err(WorkflowError::AliasExists(alias));
        }

        let mut workflow = Self {
            alias,
            doc: doc.into(),
            registry,
            store,
            pipeline: Pipeline::new(),
            inputs: WorkflowInputs::new(),
            engine: ExecutionEngine::default(),
            history: Vec::new(),
        };
        let initial = workflow.current_state();
        workflow.history.push(initial);

        info!("Created workflow {}", workflow.alias);
        Ok(workflow)
    }

    /// Rebuild a workflow from the snapshot stored under `alias`
    ///
    /// Structure and input values are restored; every step starts pending.
    pub async fn load(
        alias: &str,
        registry: Arc<OperationRegistry>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        let state = store.load(alias).await?;
        let pipeline = Pipeline::from_structure(&state.structure, &registry)?;

        info!("Loaded workflow {} (version {})", alias, state.version);
        Ok(Self {
            alias: alias.to_string(),
            doc: state.doc.clone(),
            registry,
            store,
            pipeline,
            inputs: state.inputs.clone(),
            engine: ExecutionEngine::default(),
            history: vec![state],
        })
    }

    /// Use `strategy` for `process_steps`
    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.engine = ExecutionEngine::new(strategy);
        self
    }

    /// Add an execution event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.engine.add_event_handler(handler);
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Values assigned to workflow inputs
    pub fn inputs(&self) -> &WorkflowInputs {
        &self.inputs
    }

    /// Snapshots taken so far, oldest first
    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    /// Add a step running `operation_name`
    pub fn add_step(&mut self, operation_name: &str, step_id: &str, config: Option<StepConfig>) -> Result<&Step> {
        self.pipeline.add_step(&self.registry, operation_name, step_id, config)
    }

    /// Connect `source` (`step.output`) to `target` (`step.input`)
    pub fn connect_fields(&mut self, target: &str, source: &str) -> Result<()> {
        self.pipeline.connect_fields(target, source)?;
        Ok(())
    }

    pub fn set_input_alias(&mut self, input_field: &str, alias: &str) -> Result<()> {
        self.pipeline.set_input_alias(input_field, alias)
    }

    pub fn set_output_alias(&mut self, output_field: &str, alias: &str) -> Result<()> {
        self.pipeline.set_output_alias(output_field, alias)
    }

    /// Resolve an input alias or `step.field` reference to its field
    pub fn input_field(&self, name: &str) -> Result<(FieldRef, &FieldSchema)> {
        let field = self.pipeline.resolve_input(name)?;
        let schema = self
            .pipeline
            .input_schema(&field)
            .ok_or_else(|| WorkflowError::UnknownAlias(name.to_string()))?;
        Ok((field, schema))
    }

    /// Assign a value to a workflow input; `None` means "use the default"
    ///
    /// Nothing runs. A changed value resets the owning step and everything
    /// downstream of it to pending.
    pub fn set_input(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        let field = self.check_input(name, value.as_ref())?;
        self.assign(field, InputValue::from(value));
        Ok(())
    }

    /// Assign several inputs; nothing is assigned if any of them is invalid
    pub fn set_inputs<I, S>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Option<Value>)>,
        S: AsRef<str>,
    {
        let mut checked = Vec::new();
        for (name, value) in values {
            let field = self.check_input(name.as_ref(), value.as_ref())?;
            checked.push((field, InputValue::from(value)));
        }
        for (field, value) in checked {
            self.assign(field, value);
        }
        Ok(())
    }

    fn check_input(&self, name: &str, value: Option<&Value>) -> Result<FieldRef> {
        let (field, schema) = self.input_field(name)?;
        if let Some(value) = value {
            if !schema.data_type.accepts(value.data_type()) {
                return Err(WorkflowError::TypeMismatch {
                    field: name.to_string(),
                    expected: schema.data_type,
                    actual: value.data_type(),
                });
            }
        }
        Ok(field)
    }

    fn assign(&mut self, field: FieldRef, value: InputValue) {
        let unchanged = match (self.inputs.get(&field), &value) {
            (Some(InputValue::Value(old)), InputValue::Value(new)) => old.same_as(new),
            (Some(InputValue::Default), InputValue::Default) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        debug!("Input {} changed", field);
        let step_id = field.step_id.clone();
        self.inputs.insert(field, value);
        self.pipeline.invalidate(&step_id);
    }

    /// Run every step whose inputs can be resolved
    ///
    /// Per-step failures are recorded in the step state. Fails with
    /// `NoProgress` when the pipeline has steps but none of them is
    /// resolved afterwards.
    pub async fn process_steps(&mut self) -> Result<ProcessSummary> {
        let summary = self.engine.process(&mut self.pipeline, &self.inputs).await;

        let any_resolved = self
            .pipeline
            .steps()
            .any(|s| matches!(s.state, StepState::Resolved { .. }));
        if !self.pipeline.is_empty() && !any_resolved {
            let ids_with = |failed: bool| -> Vec<String> {
                self.pipeline
                    .steps()
                    .filter(|s| matches!(s.state, StepState::Failed { .. }) == failed)
                    .map(|s| s.id.clone())
                    .collect()
            };
            return Err(WorkflowError::NoProgress {
                failed: ids_with(true),
                pending: ids_with(false),
            });
        }

        Ok(summary)
    }

    /// Error recorded for a failed step
    pub fn step_error(&self, step_id: &str) -> Option<&str> {
        self.pipeline.step(step_id)?.state.error()
    }

    /// Values of aliased outputs that have been produced
    pub fn current_output_values(&self) -> BTreeMap<String, Value> {
        self.pipeline
            .output_aliases()
            .iter()
            .filter_map(|(alias, field)| {
                let outputs = self.pipeline.step(&field.step_id)?.state.outputs()?;
                Some((alias.clone(), outputs.get(&field.field)?.clone()))
            })
            .collect()
    }

    /// The live state of this workflow
    ///
    /// `version` is the number of snapshots taken before it.
    pub fn current_state(&self) -> WorkflowState {
        let steps = self
            .pipeline
            .steps()
            .map(|step| {
                let snapshot = StepSnapshot {
                    operation: step.operation_name().to_string(),
                    status: ExecutionScheduler::status(&self.pipeline, &self.inputs, &step.id),
                    error: step.state.error().map(str::to_string),
                };
                (step.id.clone(), snapshot)
            })
            .collect();

        WorkflowState {
            id: Uuid::new_v4(),
            version: self.history.len(),
            created_at: Utc::now(),
            workflow_alias: self.alias.clone(),
            doc: self.doc.clone(),
            structure: self.pipeline.structure(),
            inputs: self.inputs.clone(),
            steps,
            outputs: self.current_output_values(),
        }
    }

    /// Append the current state to the history, persisting it if `save`
    pub async fn snapshot(&mut self, save: bool) -> Result<WorkflowState> {
        let state = self.current_state();
        if save {
            self.store.save(&self.alias, &state).await?;
            info!("Saved workflow {} (version {})", self.alias, state.version);
        }
        self.history.push(state.clone());
        Ok(state)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("alias", &self.alias)
            .field("steps", &self.pipeline.len())
            .field("versions", &self.history.len())
            .finish_non_exhaustive()
    }
}
