//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ExplainCommand, ListCommand, OperationsCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Declarative step wiring and execution for data workflows
#[derive(Debug, Parser, Clone)]
#[command(name = "stepwire")]
#[command(author = "Stepwire Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Wire, run and snapshot data workflows", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the snapshot database (defaults to the user data directory)
    #[arg(long, global = true)]
    pub db: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build and process a workflow from a YAML definition
    Run(RunCommand),

    /// Validate a workflow definition
    Validate(ValidateCommand),

    /// List saved workflows
    List(ListCommand),

    /// Show a saved workflow snapshot
    Explain(ExplainCommand),

    /// List available operations
    Operations(OperationsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
