//! Pipeline domain model

use crate::core::{
    error::{Result, WorkflowError},
    field::{FieldRef, FieldSchema},
    state::StepState,
    step::{Step, StepConfig, StepDefinition},
};
use crate::registry::OperationRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::debug;

/// Directed edge from a step output to a step input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: FieldRef,
    pub target: FieldRef,
}

/// Serializable structure of a pipeline (no runtime state)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineStructure {
    pub steps: Vec<StepDefinition>,
    pub connections: Vec<Connection>,
    pub input_aliases: BTreeMap<String, FieldRef>,
    pub output_aliases: BTreeMap<String, FieldRef>,
}

/// A wired set of steps
///
/// Append-only: steps and connections are never removed. Every successful
/// mutation keeps the graph acyclic and the execution order current.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    /// Pipeline steps
    steps: HashMap<String, Step>,

    /// Step ids in the order they were added
    step_order: Vec<String>,

    connections: Vec<Connection>,

    /// Workflow input alias -> step input field
    input_aliases: BTreeMap<String, FieldRef>,

    /// Workflow output alias -> step output field
    output_aliases: BTreeMap<String, FieldRef>,

    /// Step execution order (topological sort)
    execution_order: Vec<String>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pipeline from its serialized structure
    pub fn from_structure(structure: &PipelineStructure, registry: &OperationRegistry) -> Result<Self> {
        let mut pipeline = Pipeline::new();
        for step in &structure.steps {
            pipeline.add_step(registry, &step.operation, &step.id, Some(step.config.clone()))?;
        }
        for connection in &structure.connections {
            pipeline.connect_fields(
                &connection.target.to_string(),
                &connection.source.to_string(),
            )?;
        }
        for (alias, field) in &structure.input_aliases {
            pipeline.set_input_alias(&field.to_string(), alias)?;
        }
        for (alias, field) in &structure.output_aliases {
            pipeline.set_output_alias(&field.to_string(), alias)?;
        }
        Ok(pipeline)
    }

    /// Add a step running `operation_name`
    pub fn add_step(
        &mut self,
        registry: &OperationRegistry,
        operation_name: &str,
        step_id: &str,
        config: Option<StepConfig>,
    ) -> Result<&Step> {
        if self.steps.contains_key(step_id) {
            return Err(WorkflowError::DuplicateStepId(step_id.to_string()));
        }
        if step_id.is_empty() || step_id.contains('.') {
            return Err(WorkflowError::InvalidStepConfig {
                step_id: step_id.to_string(),
                message: "step id must be non-empty and must not contain '.'".to_string(),
            });
        }

        let operation = registry
            .lookup(operation_name)
            .map_err(|_| WorkflowError::UnknownOperation(operation_name.to_string()))?
            .clone();
        let step = Step::new(step_id, operation, config.unwrap_or_default())?;

        debug!("Added step {} ({})", step_id, operation_name);
        self.steps.insert(step_id.to_string(), step);
        self.step_order.push(step_id.to_string());
        self.execution_order = Self::topological_sort(&self.step_order, &self.connections);

        Ok(&self.steps[step_id])
    }

    /// Connect `source` (`step.output`) to `target` (`step.input`)
    pub fn connect_fields(&mut self, target: &str, source: &str) -> Result<&Connection> {
        let target_ref = FieldRef::parse(target)?;
        let source_ref = FieldRef::parse(source)?;

        let target_field = self
            .input_schema(&target_ref)
            .ok_or_else(|| WorkflowError::UnknownField(target.to_string()))?;
        let source_field = self
            .output_schema(&source_ref)
            .ok_or_else(|| WorkflowError::UnknownField(source.to_string()))?;

        if !target_field.data_type.accepts(source_field.data_type) {
            return Err(WorkflowError::TypeMismatch {
                field: target.to_string(),
                expected: target_field.data_type,
                actual: source_field.data_type,
            });
        }

        if let Some(existing) = self.incoming(&target_ref) {
            return Err(WorkflowError::AlreadyConnected {
                target: target.to_string(),
                existing: existing.source.to_string(),
            });
        }

        if source_ref.step_id == target_ref.step_id
            || self.reaches(&target_ref.step_id, &source_ref.step_id)
        {
            return Err(WorkflowError::Cycle {
                target: target.to_string(),
                source_field: source.to_string(),
            });
        }

        debug!("Connected {} -> {}", source_ref, target_ref);
        self.connections.push(Connection {
            source: source_ref,
            target: target_ref,
        });
        self.execution_order = Self::topological_sort(&self.step_order, &self.connections);

        Ok(&self.connections[self.connections.len() - 1])
    }

    /// Bind a workflow input alias to a step input
    ///
    /// The input may also be connected; the connection then feeds it and
    /// the alias only names it.
    pub fn set_input_alias(&mut self, input_field: &str, alias: &str) -> Result<()> {
        let field = FieldRef::parse(input_field)?;
        if self.input_schema(&field).is_none() {
            return Err(WorkflowError::UnknownField(input_field.to_string()));
        }
        Self::bind_alias(&mut self.input_aliases, "input", alias, field)
    }

    /// Bind a workflow output alias to a step output
    pub fn set_output_alias(&mut self, output_field: &str, alias: &str) -> Result<()> {
        let field = FieldRef::parse(output_field)?;
        if self.output_schema(&field).is_none() {
            return Err(WorkflowError::UnknownField(output_field.to_string()));
        }
        Self::bind_alias(&mut self.output_aliases, "output", alias, field)
    }

    fn bind_alias(
        aliases: &mut BTreeMap<String, FieldRef>,
        namespace: &'static str,
        alias: &str,
        field: FieldRef,
    ) -> Result<()> {
        match aliases.get(alias) {
            Some(existing) if *existing == field => Ok(()),
            Some(existing) => Err(WorkflowError::DuplicateAlias {
                namespace,
                alias: alias.to_string(),
                field: existing.to_string(),
            }),
            None => {
                aliases.insert(alias.to_string(), field);
                Ok(())
            }
        }
    }

    /// Resolve a workflow input name: an input alias, or a `step.field`
    /// reference to an unconnected step input
    ///
    /// An alias naming a connected input fails with `AlreadyConnected`.
    pub fn resolve_input(&self, name: &str) -> Result<FieldRef> {
        if let Some(field) = self.input_aliases.get(name) {
            if let Some(connection) = self.incoming(field) {
                return Err(WorkflowError::AlreadyConnected {
                    target: field.to_string(),
                    existing: connection.source.to_string(),
                });
            }
            return Ok(field.clone());
        }
        let unknown = || WorkflowError::UnknownAlias(name.to_string());
        let field = FieldRef::parse(name).map_err(|_| unknown())?;
        if self.input_schema(&field).is_none() || self.incoming(&field).is_some() {
            return Err(unknown());
        }
        Ok(field)
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Get a mutable step by ID
    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.get_mut(id)
    }

    /// Steps in the order they were added
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.step_order.iter().filter_map(|id| self.steps.get(id))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn input_aliases(&self) -> &BTreeMap<String, FieldRef> {
        &self.input_aliases
    }

    pub fn output_aliases(&self) -> &BTreeMap<String, FieldRef> {
        &self.output_aliases
    }

    /// Get execution order (topological sort)
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Declared schema of a step input (constants excluded)
    pub fn input_schema(&self, field: &FieldRef) -> Option<&FieldSchema> {
        self.steps.get(&field.step_id)?.input_field(&field.field)
    }

    pub fn output_schema(&self, field: &FieldRef) -> Option<&FieldSchema> {
        self.steps.get(&field.step_id)?.output_field(&field.field)
    }

    /// Connection feeding `target`, if any
    pub fn incoming(&self, target: &FieldRef) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.target == target)
    }

    /// Step inputs not fed by a connection, in step order
    pub fn unconnected_inputs(&self) -> Vec<(FieldRef, &FieldSchema)> {
        self.steps()
            .flat_map(|step| {
                step.schema
                    .inputs
                    .iter()
                    .map(move |field| (FieldRef::new(&step.id, &field.name), field))
            })
            .filter(|(field, _)| self.incoming(field).is_none())
            .collect()
    }

    /// Ids of steps feeding `step_id` directly
    pub fn upstream(&self, step_id: &str) -> Vec<&str> {
        let mut result: Vec<&str> = Vec::new();
        for connection in &self.connections {
            if connection.target.step_id == step_id
                && !result.contains(&connection.source.step_id.as_str())
            {
                result.push(&connection.source.step_id);
            }
        }
        result
    }

    /// Ids of steps fed by `step_id` directly
    pub fn downstream(&self, step_id: &str) -> Vec<&str> {
        let mut result: Vec<&str> = Vec::new();
        for connection in &self.connections {
            if connection.source.step_id == step_id
                && !result.contains(&connection.target.step_id.as_str())
            {
                result.push(&connection.target.step_id);
            }
        }
        result
    }

    /// All steps transitively depending on `step_id`, in execution order
    pub fn dependents(&self, step_id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([step_id]);
        while let Some(current) = queue.pop_front() {
            for next in self.downstream(current) {
                if seen.insert(next.to_string()) {
                    queue.push_back(next);
                }
            }
        }
        self.execution_order
            .iter()
            .filter(|id| seen.contains(*id))
            .cloned()
            .collect()
    }

    /// Whether `to` can be reached from `from` following connections
    fn reaches(&self, from: &str, to: &str) -> bool {
        from == to || self.dependents(from).iter().any(|id| id == to)
    }

    /// Reset `step_id` and everything downstream of it to `Pending`
    ///
    /// Returns the ids whose state changed.
    pub fn invalidate(&mut self, step_id: &str) -> Vec<String> {
        let mut affected = vec![step_id.to_string()];
        affected.extend(self.dependents(step_id));

        let mut reset = Vec::new();
        for id in affected {
            if let Some(step) = self.steps.get_mut(&id) {
                if step.state != StepState::Pending {
                    step.state = StepState::Pending;
                    reset.push(id);
                }
            }
        }
        if !reset.is_empty() {
            debug!("Reset steps to pending: {}", reset.join(", "));
        }
        reset
    }

    /// Serializable structure of this pipeline
    pub fn structure(&self) -> PipelineStructure {
        PipelineStructure {
            steps: self.steps().map(Step::definition).collect(),
            connections: self.connections.clone(),
            input_aliases: self.input_aliases.clone(),
            output_aliases: self.output_aliases.clone(),
        }
    }

    /// Execution graph: steps grouped into stages by dependency depth
    pub fn execution_graph(&self) -> ExecutionGraph {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        for step_id in &self.execution_order {
            let level = self
                .upstream(step_id)
                .iter()
                .filter_map(|up| depth.get(up))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(step_id, level);
        }

        let mut stages: Vec<Vec<String>> = Vec::new();
        for step_id in &self.execution_order {
            let level = depth[step_id.as_str()];
            if stages.len() <= level {
                stages.resize_with(level + 1, Vec::new);
            }
            stages[level].push(step_id.clone());
        }

        ExecutionGraph {
            stages,
            operations: self
                .steps()
                .map(|s| (s.id.clone(), s.operation_name().to_string()))
                .collect(),
            connections: self.connections.clone(),
        }
    }

    /// Calculate topological sort of steps based on connections
    fn topological_sort(step_order: &[String], connections: &[Connection]) -> Vec<String> {
        let mut dependencies: HashMap<&str, Vec<&str>> = HashMap::new();
        for connection in connections {
            let deps = dependencies
                .entry(connection.target.step_id.as_str())
                .or_default();
            if !deps.contains(&connection.source.step_id.as_str()) {
                deps.push(&connection.source.step_id);
            }
        }

        let mut result = Vec::new();
        let mut visited = HashSet::new();

        for step_id in step_order {
            Self::visit(step_id, &dependencies, &mut visited, &mut result);
        }

        result
    }

    fn visit<'a>(
        step_id: &'a str,
        dependencies: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(step_id) {
            return;
        }

        if let Some(deps) = dependencies.get(step_id) {
            for dep in deps {
                Self::visit(dep, dependencies, visited, result);
            }
        }

        result.push(step_id.to_string());
    }
}

/// Stages of steps that can run once the previous stages resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    pub stages: Vec<Vec<String>>,
    /// Step id -> operation name
    pub operations: BTreeMap<String, String>,
    pub connections: Vec<Connection>,
}

impl ExecutionGraph {
    /// Render as Graphviz DOT
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph pipeline {\n    rankdir=LR;\n");
        for (index, stage) in self.stages.iter().enumerate() {
            dot.push_str(&format!("    subgraph stage_{} {{\n        rank=same;\n", index));
            for step_id in stage {
                let operation = self.operations.get(step_id).map(String::as_str).unwrap_or("");
                dot.push_str(&format!(
                    "        \"{}\" [shape=box, label=\"{}\\n({})\"];\n",
                    step_id, step_id, operation
                ));
            }
            dot.push_str("    }\n");
        }
        for connection in &self.connections {
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{} -> {}\"];\n",
                connection.source.step_id,
                connection.target.step_id,
                connection.source.field,
                connection.target.field
            ));
        }
        dot.push_str("}\n");
        dot
    }
}

impl fmt::Display for ExecutionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, stage) in self.stages.iter().enumerate() {
            writeln!(f, "stage {}:", index + 1)?;
            for step_id in stage {
                let operation = self.operations.get(step_id).map(String::as_str).unwrap_or("");
                writeln!(f, "  {} ({})", step_id, operation)?;
                for connection in self.connections.iter().filter(|c| &c.target.step_id == step_id) {
                    writeln!(f, "    {} <- {}", connection.target.field, connection.source)?;
                }
            }
        }
        Ok(())
    }
}
