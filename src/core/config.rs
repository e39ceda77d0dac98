//! Workflow definitions from YAML

use crate::core::{FieldRef, StepDefinition, Value};
use crate::persistence::SnapshotStore;
use crate::registry::OperationRegistry;
use crate::workflow::Workflow;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Connection as written in a workflow file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `step.input` receiving the value
    pub target: String,
    /// `step.output` producing the value
    pub source: String,
}

/// Top-level workflow definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow alias
    pub alias: String,

    #[serde(default)]
    pub doc: String,

    /// Steps, in the order they are added
    #[serde(default)]
    pub steps: Vec<StepDefinition>,

    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,

    /// Input alias -> `step.input`
    #[serde(default)]
    pub input_aliases: BTreeMap<String, String>,

    /// Output alias -> `step.output`
    #[serde(default)]
    pub output_aliases: BTreeMap<String, String>,

    /// Input alias (or `step.input`) -> value; `null` means "use the default"
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_yaml::Value>,
}

impl WorkflowConfig {
    /// Load a workflow definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check references without consulting the registry
    pub fn validate(&self) -> Result<()> {
        if self.alias.trim().is_empty() {
            anyhow::bail!("Workflow alias must not be empty");
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(step.id.as_str()) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
        }

        let check_field = |reference: &str, context: &str| -> Result<FieldRef> {
            let field = FieldRef::parse(reference)
                .with_context(|| format!("Invalid field reference in {}", context))?;
            if !seen_ids.contains(field.step_id.as_str()) {
                anyhow::bail!(
                    "{} references non-existent step '{}'",
                    context,
                    field.step_id
                );
            }
            Ok(field)
        };

        let mut targets = HashSet::new();
        for connection in &self.connections {
            let target = check_field(&connection.target, "connection target")?;
            check_field(&connection.source, "connection source")?;
            if !targets.insert(target) {
                anyhow::bail!("Input '{}' is connected more than once", connection.target);
            }
        }
        for (alias, field) in &self.input_aliases {
            check_field(field, &format!("input alias '{}'", alias))?;
        }
        for (alias, field) in &self.output_aliases {
            check_field(field, &format!("output alias '{}'", alias))?;
        }

        self.check_cycles()?;

        Ok(())
    }

    /// Check for cycles in the step graph formed by connections
    fn check_cycles(&self) -> Result<()> {
        let mut upstream: HashMap<String, Vec<String>> = HashMap::new();
        for connection in &self.connections {
            if let (Ok(target), Ok(source)) = (
                FieldRef::parse(&connection.target),
                FieldRef::parse(&connection.source),
            ) {
                upstream.entry(target.step_id).or_default().push(source.step_id);
            }
        }

        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for step in &self.steps {
            if !visited.contains(&step.id) {
                Self::dfs_check(&step.id, &upstream, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        step_id: &str,
        upstream: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(step_id.to_string());
        recursion_stack.insert(step_id.to_string());

        for dep in upstream.get(step_id).into_iter().flatten() {
            if recursion_stack.contains(dep) {
                anyhow::bail!("Cycle detected in connections involving step '{}'", dep);
            }
            if !visited.contains(dep) {
                Self::dfs_check(dep, upstream, visited, recursion_stack)?;
            }
        }

        recursion_stack.remove(step_id);
        Ok(())
    }

    /// Build the workflow: steps, connections, aliases, then input values
    pub async fn build(
        &self,
        registry: Arc<OperationRegistry>,
        store: Arc<dyn SnapshotStore>,
        replace_existing_alias: bool,
    ) -> Result<Workflow> {
        let mut workflow =
            Workflow::create(&self.alias, &self.doc, replace_existing_alias, registry, store).await?;

        for step in &self.steps {
            workflow
                .add_step(&step.operation, &step.id, Some(step.config.clone()))
                .with_context(|| format!("Failed to add step '{}'", step.id))?;
        }
        for connection in &self.connections {
            workflow
                .connect_fields(&connection.target, &connection.source)
                .with_context(|| {
                    format!("Failed to connect {} -> {}", connection.source, connection.target)
                })?;
        }
        for (alias, field) in &self.input_aliases {
            workflow
                .set_input_alias(field, alias)
                .with_context(|| format!("Failed to bind input alias '{}'", alias))?;
        }
        for (alias, field) in &self.output_aliases {
            workflow
                .set_output_alias(field, alias)
                .with_context(|| format!("Failed to bind output alias '{}'", alias))?;
        }

        let inputs = self
            .inputs
            .iter()
            .map(|(name, raw)| Ok((name.clone(), typed_input(&workflow, name, raw)?)))
            .collect::<Result<Vec<_>>>()?;
        workflow.set_inputs(inputs)?;

        Ok(workflow)
    }
}

/// Convert a raw YAML value for the workflow input `name`
pub fn typed_input(workflow: &Workflow, name: &str, raw: &serde_yaml::Value) -> Result<Option<Value>> {
    let (_, schema) = workflow.input_field(name)?;
    Value::from_yaml(raw, schema.data_type)
        .map_err(|e| anyhow::anyhow!("Invalid value for input '{}': {}", name, e))
}
