//! Test: Memoization - unchanged inputs never re-execute

use crate::helpers::*;
use stepwire::core::{StepStatus, Value};
use stepwire::Workflow;

/// x -> y -> z, with y.b a free input
async fn chain() -> (Workflow, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    let (registry, calls) = registry_with_mocks();
    let mut workflow = new_workflow("chain", registry).await;
    for id in ["x", "y", "z"] {
        workflow.add_step("math.add", id, None).unwrap();
    }
    workflow.connect_fields("y.a", "x.sum").unwrap();
    workflow.connect_fields("z.a", "y.sum").unwrap();
    workflow.set_input_alias("x.a", "start").unwrap();
    workflow.set_input_alias("y.b", "offset").unwrap();
    workflow.set_input("start", Some(Value::Integer(1))).unwrap();
    (workflow, calls)
}

#[tokio::test]
async fn test_second_pass_reuses_results() {
    let (mut workflow, calls) = chain().await;

    let first = workflow.process_steps().await.unwrap();
    assert_eq!(first.resolved, vec!["x", "y", "z"]);
    assert_eq!(call_count(&calls), 3);

    let second = workflow.process_steps().await.unwrap();
    assert!(second.executed.is_empty());
    assert_eq!(second.reused, vec!["x", "y", "z"]);
    assert_eq!(call_count(&calls), 3);
}

#[tokio::test]
async fn test_same_value_keeps_results() {
    let (mut workflow, calls) = chain().await;
    workflow.process_steps().await.unwrap();

    workflow.set_input("start", Some(Value::Integer(1))).unwrap();
    assert_step_status(&workflow, "z", StepStatus::Resolved);

    workflow.process_steps().await.unwrap();
    assert_eq!(call_count(&calls), 3);
}

#[tokio::test]
async fn test_changed_input_resets_downstream_only() {
    let (mut workflow, calls) = chain().await;
    workflow.process_steps().await.unwrap();

    workflow.set_input("offset", Some(Value::Integer(10))).unwrap();
    assert_step_status(&workflow, "x", StepStatus::Resolved);
    assert_step_status(&workflow, "y", StepStatus::Ready);
    assert_step_status(&workflow, "z", StepStatus::Pending);

    let summary = workflow.process_steps().await.unwrap();
    assert_eq!(summary.executed, vec!["y", "z"]);
    assert_eq!(call_count(&calls), 5);
    assert_eq!(step_output(&workflow, "z", "sum"), Some(Value::Integer(11)));
}

/// Going back to the declared default is a change too
#[tokio::test]
async fn test_reset_to_default() {
    let (mut workflow, _) = chain().await;
    workflow.set_input("offset", Some(Value::Integer(5))).unwrap();
    workflow.process_steps().await.unwrap();
    assert_eq!(step_output(&workflow, "z", "sum"), Some(Value::Integer(6)));

    workflow.set_input("offset", None).unwrap();
    assert_step_status(&workflow, "y", StepStatus::Ready);
    workflow.process_steps().await.unwrap();
    assert_eq!(step_output(&workflow, "z", "sum"), Some(Value::Integer(1)));
}

/// NaN inputs still count as unchanged, so nothing re-runs
#[tokio::test]
async fn test_nan_inputs_are_memoized() {
    use std::time::Duration;

    let (registry, calls) = registry_with_mocks();
    let mut workflow = new_workflow("nan", registry).await;
    workflow.add_step("math.half", "h", None).unwrap();
    workflow.add_step("math.half", "q", None).unwrap();
    workflow.connect_fields("q.x", "h.half").unwrap();
    workflow.set_input("h.x", Some(Value::Float(f64::NAN))).unwrap();

    let first = tokio::time::timeout(Duration::from_secs(10), workflow.process_steps())
        .await
        .expect("processing NaN inputs should terminate")
        .unwrap();
    assert_eq!(first.executed, vec!["h", "q"]);
    assert_eq!(call_count(&calls), 2);

    workflow.set_input("h.x", Some(Value::Float(f64::NAN))).unwrap();
    assert_step_status(&workflow, "q", StepStatus::Resolved);

    let second = tokio::time::timeout(Duration::from_secs(10), workflow.process_steps())
        .await
        .expect("second pass should terminate")
        .unwrap();
    assert!(second.executed.is_empty());
    assert_eq!(second.reused, vec!["h", "q"]);
    assert_eq!(call_count(&calls), 2);
}
