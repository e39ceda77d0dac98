//! Test: Partial Failure - failures stay on their own branch

use crate::helpers::*;
use stepwire::core::{StepStatus, Value};
use stepwire::execution::{ExecutionEvent, SchedulingStrategy};
use stepwire::{Workflow, WorkflowError};
use std::sync::{Arc, Mutex};

/// seed -> broken -> after_broken, seed -> side
async fn branching_workflow(strategy: SchedulingStrategy) -> Workflow {
    let (registry, _) = registry_with_mocks();
    let mut workflow = new_workflow("branches", registry).await.with_strategy(strategy);

    workflow.add_step("math.add", "seed", None).unwrap();
    workflow.add_step("debug.fail", "broken", None).unwrap();
    workflow.add_step("math.add", "after_broken", None).unwrap();
    workflow.add_step("math.add", "side", None).unwrap();
    workflow.connect_fields("broken.a", "seed.sum").unwrap();
    workflow.connect_fields("after_broken.a", "broken.sum").unwrap();
    workflow.connect_fields("side.a", "seed.sum").unwrap();
    workflow.set_input_alias("seed.a", "start").unwrap();
    workflow.set_input("start", Some(Value::Integer(2))).unwrap();
    workflow
}

#[tokio::test]
async fn test_independent_branch_completes() {
    for strategy in [SchedulingStrategy::Sequential, SchedulingStrategy::Parallel] {
        let mut workflow = branching_workflow(strategy).await;
        let summary = workflow.process_steps().await.unwrap();

        assert_eq!(summary.resolved, vec!["seed", "side"]);
        assert_eq!(summary.failed.len(), 2);
        assert_step_status(&workflow, "seed", StepStatus::Resolved);
        assert_step_status(&workflow, "side", StepStatus::Resolved);
        assert_step_status(&workflow, "broken", StepStatus::Failed);
        assert_step_status(&workflow, "after_broken", StepStatus::Failed);
        assert_eq!(step_output(&workflow, "side", "sum"), Some(Value::Integer(2)));

        assert!(workflow.step_error("broken").unwrap().contains("boom"));
        assert!(workflow.step_error("after_broken").unwrap().contains("broken"));
    }
}

#[tokio::test]
async fn test_failure_events() {
    let mut workflow = branching_workflow(SchedulingStrategy::Sequential).await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    workflow.add_event_handler(move |event| sink.lock().unwrap().push(event));

    workflow.process_steps().await.unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(events.first(), Some(ExecutionEvent::ProcessingStarted { steps: 4 })));
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepFailed { step_id, .. } if step_id == "broken"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepSkipped { step_id, upstream } if step_id == "after_broken" && upstream == &["broken"]
    )));
    assert!(matches!(events.last(), Some(ExecutionEvent::ProcessingCompleted { .. })));
}

/// No step resolved at all is an error for the caller
#[tokio::test]
async fn test_no_progress() {
    let (registry, _) = registry_with_mocks();
    let mut workflow = new_workflow("stuck", registry).await;
    workflow.add_step("debug.fail", "broken", None).unwrap();
    workflow.add_step("math.add", "after", None).unwrap();
    workflow.add_step("math.add", "waiting", None).unwrap();
    workflow.connect_fields("after.a", "broken.sum").unwrap();
    workflow.set_input("broken.a", Some(Value::Integer(1))).unwrap();

    match workflow.process_steps().await {
        Err(WorkflowError::NoProgress { failed, pending }) => {
            assert_eq!(failed, vec!["broken", "after"]);
            assert_eq!(pending, vec!["waiting"]);
        }
        other => panic!("expected NoProgress, got {:?}", other),
    }
}

/// A panicking module fails its own step and its dependents
#[tokio::test]
async fn test_panicking_module_fails_step() {
    use std::time::Duration;

    for strategy in [SchedulingStrategy::Parallel, SchedulingStrategy::Sequential] {
        let (registry, _) = registry_with_mocks();
        let mut workflow = new_workflow("panics", registry).await.with_strategy(strategy);
        workflow.add_step("math.add", "seed", None).unwrap();
        workflow.add_step("debug.panic", "first", None).unwrap();
        workflow.add_step("debug.panic", "second", None).unwrap();
        workflow.add_step("math.add", "after_first", None).unwrap();
        workflow.add_step("math.add", "side", None).unwrap();
        workflow.connect_fields("first.a", "seed.sum").unwrap();
        workflow.connect_fields("second.a", "seed.sum").unwrap();
        workflow.connect_fields("after_first.a", "first.sum").unwrap();
        workflow.connect_fields("side.a", "seed.sum").unwrap();
        workflow.set_input("seed.a", Some(Value::Integer(1))).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(10), workflow.process_steps())
            .await
            .expect("processing should terminate")
            .unwrap();

        assert_eq!(summary.resolved, vec!["seed", "side"]);
        assert_eq!(summary.failed.len(), 3);
        for step_id in ["first", "second", "after_first"] {
            assert_step_status(&workflow, step_id, StepStatus::Failed);
        }
        assert!(workflow.step_error("first").unwrap().contains("panicked"));
        assert!(workflow.step_error("after_first").unwrap().contains("first"));

        // Same inputs, same failure: not retried
        let again = workflow.process_steps().await.unwrap();
        assert!(again.executed.is_empty());
    }
}
