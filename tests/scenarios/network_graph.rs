//! Test: Network Graph - onboard edges and nodes CSV files into network data

use crate::helpers::*;
use std::sync::Arc;
use stepwire::core::config::WorkflowConfig;
use stepwire::core::{StepStatus, Value};
use stepwire::persistence::{InMemorySnapshotStore, SnapshotStore};
use stepwire::{OperationRegistry, Workflow};

const NETWORK_GRAPH: &str = r#"
alias: journals_network
doc: Journals and the cities that link them
steps:
  - id: import_edges_file
    operation: import.file
  - id: import_nodes_file
    operation: import.file
  - id: create_edges_table
    operation: create.table
    config: { source_type: csv_file, target_type: table }
  - id: create_nodes_table
    operation: create.table
    config: { source_type: csv_file, target_type: table }
  - id: assemble_network_data
    operation: create.network_data.from.tables
connections:
  - { target: create_edges_table.csv_file, source: import_edges_file.file }
  - { target: create_nodes_table.csv_file, source: import_nodes_file.file }
  - { target: assemble_network_data.edges, source: create_edges_table.table }
  - { target: assemble_network_data.nodes, source: create_nodes_table.table }
input_aliases:
  edges_file: import_edges_file.path
  nodes_file: import_nodes_file.path
  source_column_name: assemble_network_data.source_column_name
  target_column_name: assemble_network_data.target_column_name
  id_column_name: assemble_network_data.id_column_name
  label_column_name: assemble_network_data.label_column_name
output_aliases:
  network_data: assemble_network_data.network_data
inputs:
  source_column_name: Source
  target_column_name: Target
  id_column_name: Id
  label_column_name: Label
"#;

const EDGES: &str = "Source,Target,Weight\n1,2,3\n2,3,1\n1,3,2\n";
const NODES: &str = "Id,Label,City\n1,Il Caffè,Milano\n2,La Lega,Bologna\n";

async fn build() -> Workflow {
    let registry = Arc::new(OperationRegistry::with_builtin_operations());
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
    WorkflowConfig::from_yaml(NETWORK_GRAPH)
        .unwrap()
        .build(registry, store, false)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_network_from_csv_files() {
    let dir = temp_dir("network");
    let edges = write_file(&dir, "JournalEdges1902.csv", EDGES);
    let nodes = write_file(&dir, "JournalNodes1902.csv", NODES);

    let mut workflow = build().await;
    assert_step_status(&workflow, "import_edges_file", StepStatus::Pending);

    workflow
        .set_inputs([
            ("edges_file", Some(Value::String(edges))),
            ("nodes_file", Some(Value::String(nodes))),
        ])
        .unwrap();
    assert_step_status(&workflow, "import_edges_file", StepStatus::Ready);
    assert_step_status(&workflow, "assemble_network_data", StepStatus::Pending);

    let summary = workflow.process_steps().await.unwrap();
    assert_eq!(summary.resolved.len(), 5);

    let outputs = workflow.current_output_values();
    let Some(Value::NetworkData(network)) = outputs.get("network_data") else {
        panic!("network_data not produced: {:?}", outputs);
    };

    let ids: Vec<&str> = network.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert_eq!(network.nodes[0].label.as_deref(), Some("Il Caffè"));
    assert_eq!(
        network.nodes[1].attributes.get("City"),
        Some(&Value::String("Bologna".to_string()))
    );
    // Only referenced by edges
    assert!(network.nodes[2].label.is_none());

    assert_eq!(network.edges.len(), 3);
    assert_eq!((network.edges[1].source.as_str(), network.edges[1].target.as_str()), ("2", "3"));
    assert_eq!(network.edges[0].attributes.get("Weight"), Some(&Value::Integer(3)));

    std::fs::remove_dir_all(dir).ok();
}

/// A missing edges file fails its branch; the nodes table is still built
#[tokio::test]
async fn test_missing_edges_file() {
    let dir = temp_dir("network-missing");
    let nodes = write_file(&dir, "nodes.csv", NODES);

    let mut workflow = build().await;
    workflow
        .set_inputs([
            ("edges_file", Some(Value::String(dir.join("absent.csv").to_string_lossy().into_owned()))),
            ("nodes_file", Some(Value::String(nodes))),
        ])
        .unwrap();

    let summary = workflow.process_steps().await.unwrap();
    assert_eq!(summary.resolved, vec!["import_nodes_file", "create_nodes_table"]);
    assert_step_status(&workflow, "import_edges_file", StepStatus::Failed);
    assert_step_status(&workflow, "create_edges_table", StepStatus::Failed);
    assert_step_status(&workflow, "assemble_network_data", StepStatus::Failed);
    assert!(workflow.current_output_values().is_empty());

    // Fixing the input re-runs only the failed branch
    let edges = write_file(&dir, "edges.csv", EDGES);
    workflow.set_input("edges_file", Some(Value::String(edges))).unwrap();
    let summary = workflow.process_steps().await.unwrap();
    assert_eq!(
        summary.executed,
        vec!["import_edges_file", "create_edges_table", "assemble_network_data"]
    );
    assert_eq!(summary.reused, vec!["import_nodes_file", "create_nodes_table"]);

    std::fs::remove_dir_all(dir).ok();
}
