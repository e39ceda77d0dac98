//! Test: Snapshots - save, list and reload workflows

use crate::helpers::*;
use std::sync::Arc;
use stepwire::core::{InputValue, StepStatus, Value};
use stepwire::persistence::{InMemorySnapshotStore, SnapshotStore};
use stepwire::{Workflow, WorkflowError};

async fn saved_chain(store: Arc<dyn SnapshotStore>) -> Workflow {
    let (registry, _) = registry_with_mocks();
    let mut workflow = Workflow::create("sums", "Running sums", false, registry, store)
        .await
        .unwrap();
    workflow.add_step("math.add", "x", None).unwrap();
    workflow.add_step("math.add", "y", None).unwrap();
    workflow.connect_fields("y.a", "x.sum").unwrap();
    workflow.set_input_alias("x.a", "start").unwrap();
    workflow.set_output_alias("y.sum", "total").unwrap();
    workflow.set_input("start", Some(Value::Integer(4))).unwrap();
    workflow.set_input("y.b", Some(Value::Integer(3))).unwrap();
    workflow.process_steps().await.unwrap();
    workflow
}

async fn check_round_trip(store: Arc<dyn SnapshotStore>) {
    let mut workflow = saved_chain(store.clone()).await;
    let saved = workflow.snapshot(true).await.unwrap();
    assert_eq!(saved.version, 1);
    assert_eq!(saved.outputs.get("total"), Some(&Value::Integer(7)));
    assert_eq!(store.list().await.unwrap(), vec!["sums"]);

    let (registry, calls) = registry_with_mocks();
    let mut loaded = Workflow::load("sums", registry, store.clone()).await.unwrap();
    assert_eq!(loaded.doc(), "Running sums");
    assert_eq!(loaded.pipeline().structure(), saved.structure);
    assert_eq!(loaded.inputs(), &saved.inputs);
    assert_eq!(
        loaded.inputs().values().filter(|v| matches!(v, InputValue::Value(_))).count(),
        2
    );

    // Results are not persisted; the reloaded workflow recomputes them
    assert_step_status(&loaded, "x", StepStatus::Ready);
    assert_step_status(&loaded, "y", StepStatus::Pending);
    loaded.process_steps().await.unwrap();
    assert_eq!(call_count(&calls), 2);
    assert_eq!(loaded.current_output_values(), saved.outputs);
}

#[tokio::test]
async fn test_in_memory_round_trip() {
    check_round_trip(Arc::new(InMemorySnapshotStore::new())).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_round_trip() {
    use stepwire::persistence::SqliteSnapshotStore;

    let store = SqliteSnapshotStore::new(":memory:").await.unwrap();
    check_round_trip(Arc::new(store)).await;
}

/// Non-finite floats in inputs and outputs survive a save and reload
async fn check_non_finite_round_trip(store: Arc<dyn SnapshotStore>) {
    let (registry, _) = registry_with_mocks();
    let mut workflow = Workflow::create("halves", "", false, registry, store.clone())
        .await
        .unwrap();
    workflow.add_step("math.half", "big", None).unwrap();
    workflow.add_step("math.half", "odd", None).unwrap();
    workflow.set_output_alias("big.half", "big_half").unwrap();
    workflow.set_output_alias("odd.half", "odd_half").unwrap();
    workflow.set_input("big.x", Some(Value::Float(f64::NEG_INFINITY))).unwrap();
    workflow.set_input("odd.x", Some(Value::Float(f64::NAN))).unwrap();
    workflow.process_steps().await.unwrap();
    let saved = workflow.snapshot(true).await.unwrap();

    let state = store.load("halves").await.unwrap();
    assert!(state.outputs["big_half"].same_as(&Value::Float(f64::NEG_INFINITY)));
    assert!(state.outputs["odd_half"].same_as(&Value::Float(f64::NAN)));

    let (registry, _) = registry_with_mocks();
    let mut loaded = Workflow::load("halves", registry, store).await.unwrap();
    loaded.process_steps().await.unwrap();
    let outputs = loaded.current_output_values();
    assert!(outputs["big_half"].same_as(&saved.outputs["big_half"]));
    assert!(outputs["odd_half"].same_as(&saved.outputs["odd_half"]));
}

#[tokio::test]
async fn test_in_memory_non_finite_floats() {
    check_non_finite_round_trip(Arc::new(InMemorySnapshotStore::new())).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_non_finite_floats() {
    use stepwire::persistence::SqliteSnapshotStore;

    let store = SqliteSnapshotStore::new(":memory:").await.unwrap();
    check_non_finite_round_trip(Arc::new(store)).await;
}

/// A database file outlives the store that wrote it
#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_file_reopen() {
    use stepwire::persistence::SqliteSnapshotStore;

    let dir = temp_dir("sqlite");
    let path = dir.join("snapshots.db");

    {
        let store: Arc<dyn SnapshotStore> = Arc::new(SqliteSnapshotStore::open(&path).await.unwrap());
        let mut workflow = saved_chain(store).await;
        workflow.snapshot(true).await.unwrap();
    }
    assert!(path.exists());

    let store: Arc<dyn SnapshotStore> = Arc::new(SqliteSnapshotStore::open(&path).await.unwrap());
    assert_eq!(store.list().await.unwrap(), vec!["sums"]);

    let (registry, _) = registry_with_mocks();
    let mut loaded = Workflow::load("sums", registry, store).await.unwrap();
    assert_eq!(loaded.doc(), "Running sums");
    assert_eq!(
        loaded.inputs().values().filter(|v| matches!(v, InputValue::Value(_))).count(),
        2
    );
    loaded.process_steps().await.unwrap();
    assert_eq!(loaded.current_output_values().get("total"), Some(&Value::Integer(7)));

    drop(loaded);
    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_alias_conflicts() {
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
    let mut workflow = saved_chain(store.clone()).await;
    workflow.snapshot(true).await.unwrap();

    let (registry, _) = registry_with_mocks();
    let err = Workflow::create("sums", "", false, registry.clone(), store.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AliasExists(_)));

    let replacement = Workflow::create("sums", "", true, registry, store).await.unwrap();
    assert!(replacement.pipeline().is_empty());
}

#[tokio::test]
async fn test_snapshot_history() {
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
    let mut workflow = saved_chain(store.clone()).await;

    let first = workflow.snapshot(false).await.unwrap();
    workflow.set_input("start", Some(Value::Integer(10))).unwrap();
    let second = workflow.snapshot(false).await.unwrap();

    assert_eq!((first.version, second.version), (1, 2));
    assert_ne!(first.id, second.id);
    assert_eq!(first.count(StepStatus::Resolved), 2);
    assert_eq!(second.count(StepStatus::Resolved), 0);
    assert_eq!(workflow.history().len(), 3);

    // Nothing was saved
    assert!(!store.contains("sums").await.unwrap());
    assert!(matches!(
        Workflow::load("sums", registry_with_mocks().0, store).await.unwrap_err(),
        WorkflowError::Store(_)
    ));
}
