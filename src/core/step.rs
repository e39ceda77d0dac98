//! Step domain model

use crate::core::{
    error::{Result, WorkflowError},
    field::FieldSchema,
    state::StepState,
    value::{Value, ValueMap},
};
use crate::registry::{ModuleSchema, Operation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-step module configuration
///
/// Mirrors the record passed when adding a step, e.g.
/// `{constants: {}, defaults: {}, source_type: csv_file, target_type: table, ignore_errors: false}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Input values fixed for this step; the fields stop being inputs
    #[serde(default)]
    pub constants: BTreeMap<String, serde_json::Value>,

    /// Overrides for declared input defaults
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,

    #[serde(default)]
    pub ignore_errors: bool,

    /// Module-specific settings
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    pub fn with_constant(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.constants.insert(field.into(), value);
        self
    }

    pub fn with_default(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }
}

/// Serializable description of a step, as stored in snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    pub operation: String,
    #[serde(default)]
    pub config: StepConfig,
}

/// A single step in a pipeline: one instance of an operation
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Operation this step runs
    pub operation: Operation,

    /// Configuration the step was added with
    pub config: StepConfig,

    /// Fields resolved for `config` (constants removed, defaults applied)
    pub schema: ModuleSchema,

    /// Input values fixed by `config.constants`
    pub constants: ValueMap,

    /// Runtime state (not serialized)
    pub state: StepState,
}

impl Step {
    /// Instantiate `operation` as step `id`, resolving its schema for `config`
    pub fn new(id: impl Into<String>, operation: Operation, config: StepConfig) -> Result<Self> {
        let id = id.into();
        let invalid = |message: String| WorkflowError::InvalidStepConfig {
            step_id: id.clone(),
            message,
        };

        let mut schema = operation
            .module
            .schema(&config)
            .map_err(|e| invalid(e.to_string()))?;

        let mut constants = ValueMap::new();
        for (name, raw) in &config.constants {
            let position = schema
                .inputs
                .iter()
                .position(|f| &f.name == name)
                .ok_or_else(|| invalid(format!("constant for unknown input '{}'", name)))?;
            let field = schema.inputs.remove(position);
            if let Some(value) = coerce_for(&field, raw).map_err(&invalid)? {
                constants.insert(name.clone(), value);
            }
        }

        for (name, raw) in &config.defaults {
            let field = schema
                .inputs
                .iter_mut()
                .find(|f| &f.name == name)
                .ok_or_else(|| invalid(format!("default for unknown input '{}'", name)))?;
            field.default = coerce_for(field, raw).map_err(&invalid)?;
        }

        Ok(Step {
            id,
            operation,
            config,
            schema,
            constants,
            state: StepState::Pending,
        })
    }

    /// Name of the operation this step runs
    pub fn operation_name(&self) -> &str {
        &self.operation.name
    }

    pub fn input_field(&self, name: &str) -> Option<&FieldSchema> {
        self.schema.input_field(name)
    }

    pub fn output_field(&self, name: &str) -> Option<&FieldSchema> {
        self.schema.output_field(name)
    }

    pub fn definition(&self) -> StepDefinition {
        StepDefinition {
            id: self.id.clone(),
            operation: self.operation.name.clone(),
            config: self.config.clone(),
        }
    }
}

fn coerce_for(field: &FieldSchema, raw: &serde_json::Value) -> std::result::Result<Option<Value>, String> {
    let value = Value::coerce(raw, field.data_type)
        .map_err(|e| format!("field '{}': {}", field.name, e))?;
    if let Some(value) = &value {
        if !field.data_type.accepts(value.data_type()) {
            return Err(format!(
                "field '{}' expects {}, got {}",
                field.name,
                field.data_type,
                value.data_type()
            ));
        }
    }
    Ok(value)
}
