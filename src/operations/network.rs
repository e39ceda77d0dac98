//! Network data assembly

use super::{cell_text, single, string_input, table_input};
use crate::core::{DataType, Edge, FieldSchema, NetworkData, Node, StepConfig, Table, Value, ValueMap};
use crate::registry::{Module, ModuleError, ModuleSchema};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

/// `create.network_data.from.tables`
///
/// Edges come from an edges table (source and target columns); node
/// labels and attributes from an optional nodes table. Nodes referenced
/// only by edges are added without a label.
pub struct NetworkFromTablesModule;

#[async_trait]
impl Module for NetworkFromTablesModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        let text = |name: &str, default: &str, doc: &str| {
            FieldSchema::new(name, DataType::String)
                .with_default(Value::String(default.to_string()))
                .with_doc(doc)
        };

        Ok(ModuleSchema::new()
            .input(FieldSchema::new("edges", DataType::Table).with_doc("One row per edge"))
            .input(
                FieldSchema::new("nodes", DataType::Table)
                    .with_doc("One row per node")
                    .optional(),
            )
            .input(text("source_column_name", "source", "Edges column holding the source node id"))
            .input(text("target_column_name", "target", "Edges column holding the target node id"))
            .input(
                FieldSchema::new("edges_column_map", DataType::Dict)
                    .with_doc("Rename edges columns before use (old name -> new name)")
                    .optional(),
            )
            .input(text("id_column_name", "id", "Nodes column holding the node id"))
            .input(text("label_column_name", "label", "Nodes column holding the node label"))
            .input(
                FieldSchema::new("nodes_column_map", DataType::Dict)
                    .with_doc("Rename nodes columns before use (old name -> new name)")
                    .optional(),
            )
            .output(FieldSchema::new("network_data", DataType::NetworkData)))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let edges_table = renamed(table_input(inputs, "edges")?, inputs.get("edges_column_map"), "edges_column_map")?;
        let source_column = string_input(inputs, "source_column_name")?;
        let target_column = string_input(inputs, "target_column_name")?;

        let column = |table: &Table, name: &str, field: &str| -> Result<usize, ModuleError> {
            table.columns.iter().position(|c| c.name == name).ok_or_else(|| {
                ModuleError::invalid_input(
                    field,
                    format!("no column '{}' (available: {})", name, table.column_names().join(", ")),
                )
            })
        };

        let mut network = NetworkData::default();
        let mut known = HashSet::new();

        if inputs.contains_key("nodes") {
            let nodes_table =
                renamed(table_input(inputs, "nodes")?, inputs.get("nodes_column_map"), "nodes_column_map")?;
            let id_index = column(&nodes_table, string_input(inputs, "id_column_name")?, "id_column_name")?;
            let label_name = string_input(inputs, "label_column_name")?;
            let label_index = nodes_table.columns.iter().position(|c| c.name == label_name);

            for row in 0..nodes_table.num_rows() {
                let id = node_id(&nodes_table.columns[id_index].values[row], "id_column_name")?;
                if !known.insert(id.clone()) {
                    return Err(ModuleError::invalid_input("nodes", format!("duplicate node id '{}'", id)));
                }
                let label = label_index.and_then(|i| cell_text(&nodes_table.columns[i].values[row]));
                network.nodes.push(Node {
                    id,
                    label,
                    attributes: attributes(&nodes_table, row, &[Some(id_index), label_index]),
                });
            }
        }

        let source_index = column(&edges_table, source_column, "source_column_name")?;
        let target_index = column(&edges_table, target_column, "target_column_name")?;

        for row in 0..edges_table.num_rows() {
            let source = node_id(&edges_table.columns[source_index].values[row], "source_column_name")?;
            let target = node_id(&edges_table.columns[target_index].values[row], "target_column_name")?;
            for id in [&source, &target] {
                if known.insert(id.clone()) {
                    network.nodes.push(Node {
                        id: id.clone(),
                        label: None,
                        attributes: BTreeMap::new(),
                    });
                }
            }
            network.edges.push(Edge {
                source,
                target,
                attributes: attributes(&edges_table, row, &[Some(source_index), Some(target_index)]),
            });
        }

        Ok(single("network_data", Value::NetworkData(network)))
    }
}

fn node_id(value: &Value, field: &str) -> Result<String, ModuleError> {
    cell_text(value)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ModuleError::invalid_input(field, "node ids must be non-empty scalars"))
}

/// Copy of `table` with columns renamed through `map`
fn renamed(table: &Table, map: Option<&Value>, field: &str) -> Result<Table, ModuleError> {
    let mut table = table.clone();
    let Some(map) = map else {
        return Ok(table);
    };
    let Value::Dict(map) = map else {
        return Err(ModuleError::invalid_input(field, "expected a dict"));
    };

    for column in &mut table.columns {
        if let Some(new_name) = map.get(&column.name) {
            column.name = new_name
                .as_str()
                .ok_or_else(|| ModuleError::invalid_input(field, "column names must be strings"))?
                .to_string();
        }
    }
    Ok(table)
}

/// Cells of `row` outside the `skip` columns
fn attributes(table: &Table, row: usize, skip: &[Option<usize>]) -> BTreeMap<String, Value> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(index, _)| !skip.contains(&Some(*index)))
        .map(|(_, column)| (column.name.clone(), column.values[row].clone()))
        .collect()
}
