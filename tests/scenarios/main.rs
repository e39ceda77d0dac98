//! Scenario-based tests for stepwire

#[path = "../helpers.rs"]
mod helpers;

mod memoization;
mod network_graph;
mod partial_failure;
mod snapshots;
mod topic_modeling;
