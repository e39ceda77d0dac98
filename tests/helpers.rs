//! Test utility functions for stepwire

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stepwire::core::{DataType, FieldSchema, StepConfig, StepStatus, Value, ValueMap};
use stepwire::persistence::{InMemorySnapshotStore, SnapshotStore};
use stepwire::registry::{Module, ModuleError, ModuleSchema, Operation, OperationRegistry};
use stepwire::Workflow;

/// `math.add`: `sum = a + b`, counting every call
pub struct AddModule {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Module for AddModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("a", DataType::Integer))
            .input(FieldSchema::new("b", DataType::Integer).with_default(Value::Integer(0)))
            .output(FieldSchema::new("sum", DataType::Integer)))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let get = |name: &str| {
            inputs
                .get(name)
                .and_then(Value::as_i64)
                .ok_or_else(|| ModuleError::MissingInput(name.to_string()))
        };
        let mut outputs = ValueMap::new();
        outputs.insert("sum".to_string(), Value::Integer(get("a")? + get("b")?));
        Ok(outputs)
    }
}

/// `debug.fail`: always fails with the given message
pub struct FailModule {
    message: String,
}

#[async_trait]
impl Module for FailModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("a", DataType::Integer))
            .output(FieldSchema::new("sum", DataType::Integer)))
    }

    async fn process(&self, _config: &StepConfig, _inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        Err(ModuleError::Processing(self.message.clone()))
    }
}

/// `math.half`: `half = x / 2`, counting every call
pub struct HalfModule {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Module for HalfModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("x", DataType::Float))
            .output(FieldSchema::new("half", DataType::Float)))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(Value::Float(x)) = inputs.get("x") else {
            return Err(ModuleError::MissingInput("x".to_string()));
        };
        let mut outputs = ValueMap::new();
        outputs.insert("half".to_string(), Value::Float(x / 2.0));
        Ok(outputs)
    }
}

/// `debug.panic`: panics inside `process`
pub struct PanicModule;

#[async_trait]
impl Module for PanicModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("a", DataType::Integer))
            .output(FieldSchema::new("sum", DataType::Integer)))
    }

    async fn process(&self, _config: &StepConfig, _inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        panic!("module bug");
    }
}

/// Builtin operations plus `math.add`, `math.half`, `debug.fail` and `debug.panic`
///
/// Returns the registry and the counter shared by `math.add` and `math.half`.
pub fn registry_with_mocks() -> (Arc<OperationRegistry>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = OperationRegistry::with_builtin_operations();
    registry
        .register(Operation::new(
            "math.add",
            "Add two integers",
            Arc::new(AddModule { calls: calls.clone() }),
        ))
        .unwrap();
    registry
        .register(Operation::new(
            "math.half",
            "Halve a float",
            Arc::new(HalfModule { calls: calls.clone() }),
        ))
        .unwrap();
    registry
        .register(Operation::new("debug.panic", "Always panics", Arc::new(PanicModule)))
        .unwrap();
    registry
        .register(Operation::new(
            "debug.fail",
            "Always fails",
            Arc::new(FailModule {
                message: "boom".to_string(),
            }),
        ))
        .unwrap();
    (Arc::new(registry), calls)
}

pub fn call_count(calls: &AtomicUsize) -> usize {
    calls.load(Ordering::SeqCst)
}

/// Fresh workflow backed by an in-memory store
pub async fn new_workflow(alias: &str, registry: Arc<OperationRegistry>) -> Workflow {
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
    Workflow::create(alias, "", false, registry, store).await.unwrap()
}

/// Reported status of `step_id`
pub fn step_status(workflow: &Workflow, step_id: &str) -> StepStatus {
    workflow
        .current_state()
        .steps
        .get(step_id)
        .unwrap_or_else(|| panic!("step {} not found", step_id))
        .status
}

/// Assert the reported status of a step
pub fn assert_step_status(workflow: &Workflow, step_id: &str, expected: StepStatus) {
    let actual = step_status(workflow, step_id);
    assert_eq!(
        actual, expected,
        "step {} should be {:?}, was {:?}",
        step_id, expected, actual
    );
}

/// Output `field` of `step_id`, if the step is resolved
pub fn step_output(workflow: &Workflow, step_id: &str, field: &str) -> Option<Value> {
    workflow
        .pipeline()
        .step(step_id)?
        .state
        .outputs()?
        .get(field)
        .cloned()
}

/// Empty scratch directory under the system temp dir
pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stepwire-{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write `content` to `dir/name`, returning the path as a string
pub fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}
