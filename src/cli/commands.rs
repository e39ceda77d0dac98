//! CLI command definitions

use crate::execution::SchedulingStrategy;
use clap::Args;

/// Build and process a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Input overrides (alias=value, value parsed as YAML)
    #[arg(long, value_parser = parse_key_value)]
    pub input: Vec<(String, String)>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Sequential)]
    pub strategy: SchedulingStrategyArg,

    /// Maximum concurrent steps for parallel-limited
    #[arg(long, default_value_t = 4)]
    pub jobs: usize,

    /// Save the final snapshot under the workflow alias
    #[arg(long)]
    pub save: bool,

    /// Fail if a snapshot already exists under the workflow alias
    #[arg(long)]
    pub no_replace: bool,

    /// Output the final state as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    pub fn scheduling_strategy(&self) -> SchedulingStrategy {
        match self.strategy {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(self.jobs.max(1)),
        }
    }
}

/// Validate a workflow definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output the execution graph as JSON
    #[arg(long)]
    pub json: bool,
}

/// List saved workflows
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show a saved workflow snapshot
#[derive(Debug, Args, Clone)]
pub struct ExplainCommand {
    /// Workflow alias
    pub alias: String,

    /// Output the snapshot as JSON
    #[arg(long, conflicts_with = "dot")]
    pub json: bool,

    /// Output the execution graph as Graphviz DOT
    #[arg(long)]
    pub dot: bool,
}

/// List available operations
#[derive(Debug, Args, Clone)]
pub struct OperationsCommand {
    /// Show input and output fields
    #[arg(long)]
    pub fields: bool,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
