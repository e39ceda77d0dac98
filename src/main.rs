use anyhow::{Context, Result};
use std::sync::Arc;
use stepwire::cli::commands::{ExplainCommand, ListCommand, OperationsCommand, RunCommand, ValidateCommand};
use stepwire::cli::output::*;
use stepwire::cli::{Cli, Command};
use stepwire::core::config::{typed_input, WorkflowConfig};
use stepwire::persistence::{InMemorySnapshotStore, SnapshotStore};
use stepwire::{OperationRegistry, Workflow, WorkflowError};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let db = cli.db.as_deref();
    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, db).await?,
        Command::Validate(cmd) => validate_workflow(cmd).await?,
        Command::List(cmd) => list_workflows(cmd, db).await?,
        Command::Explain(cmd) => explain_workflow(cmd, db).await?,
        Command::Operations(cmd) => list_operations(cmd),
    }

    Ok(())
}

/// Open the snapshot store at `db`, or at the default location
#[cfg(feature = "sqlite")]
async fn open_store(db: Option<&str>) -> Result<Arc<dyn SnapshotStore>> {
    use stepwire::persistence::SqliteSnapshotStore;

    let store = match db {
        Some(path) => SqliteSnapshotStore::new(path).await,
        None => SqliteSnapshotStore::with_default_path().await,
    }
    .context("Failed to open snapshot store")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store(_db: Option<&str>) -> Result<Arc<dyn SnapshotStore>> {
    tracing::warn!("Built without sqlite support, snapshots are kept in memory only");
    Ok(Arc::new(InMemorySnapshotStore::new()))
}

async fn run_workflow(cmd: &RunCommand, db: Option<&str>) -> Result<()> {
    let config = WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow definition")?;

    println!("{} Loaded workflow: {}", INFO, style(&config.alias).bold());

    let registry = Arc::new(OperationRegistry::with_builtin_operations());
    let store: Arc<dyn SnapshotStore> = if cmd.save || cmd.no_replace {
        open_store(db).await?
    } else {
        Arc::new(InMemorySnapshotStore::new())
    };

    let mut workflow = config
        .build(registry, store, !cmd.no_replace)
        .await
        .context("Failed to build workflow")?
        .with_strategy(cmd.scheduling_strategy());

    // Apply input overrides
    for (name, raw) in &cmd.input {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("Invalid value for input '{}'", name))?;
        let value = typed_input(&workflow, name, &yaml)?;
        workflow.set_input(name, value)?;
        println!("{} Input override: {} = {}", INFO, style(name).cyan(), style(raw).dim());
    }

    let spinner = create_spinner("Processing steps");
    let progress = spinner.clone();
    workflow.add_event_handler(move |event| {
        progress.println(format_execution_event(&event));
    });

    let result = workflow.process_steps().await;
    spinner.finish_and_clear();

    let state = workflow.snapshot(cmd.save).await?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("\n{}", format_state(&state));
    }
    if cmd.save {
        println!("\n{} Snapshot saved as {}", INFO, style(workflow.alias()).bold());
    }

    match result {
        Ok(summary) if summary.failed.is_empty() => {
            println!("\n{} {} processed {}", CHECK, style(workflow.alias()).bold(), style("successfully").green());
        }
        Ok(summary) => {
            println!(
                "\n{} {} processed with {} failed steps",
                WARN,
                style(workflow.alias()).bold(),
                style(summary.failed.len()).red()
            );
        }
        Err(e @ WorkflowError::NoProgress { .. }) => {
            println!("\n{} {} {}", CROSS, style(workflow.alias()).bold(), style("failed").red());
            error!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

async fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    let result = match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => {
            let registry = Arc::new(OperationRegistry::with_builtin_operations());
            let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
            config.build(registry, store, true).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(workflow) => {
            let pipeline = workflow.pipeline();
            println!("{} Workflow definition is valid!", CHECK);
            println!("  Alias: {}", style(workflow.alias()).bold());
            println!("  Steps: {}", style(pipeline.len()).cyan());
            println!("  Connections: {}", style(pipeline.connections().len()).cyan());

            let graph = pipeline.execution_graph();
            if cmd.json {
                println!("\n{}", serde_json::to_string_pretty(&graph)?);
            } else {
                println!("\n{}", graph);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn list_workflows(cmd: &ListCommand, db: Option<&str>) -> Result<()> {
    let store = open_store(db).await?;
    let aliases = store.list().await?;

    if cmd.json {
        let data = serde_json::json!({ "workflows": aliases });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if aliases.is_empty() {
        println!("{} No saved workflows found", INFO);
        return Ok(());
    }

    println!("{} Saved workflows:", INFO);
    for alias in &aliases {
        let state = store.load(alias).await?;
        println!(
            "  {} (version {}, {} steps) {}",
            style(alias).bold(),
            state.version,
            state.steps.len(),
            style(&state.doc).dim()
        );
    }

    Ok(())
}

async fn explain_workflow(cmd: &ExplainCommand, db: Option<&str>) -> Result<()> {
    let store = open_store(db).await?;
    let state = store
        .load(&cmd.alias)
        .await
        .with_context(|| format!("Failed to load workflow '{}'", cmd.alias))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let registry = Arc::new(OperationRegistry::with_builtin_operations());
    let workflow = Workflow::load(&cmd.alias, registry, store).await?;
    let graph = workflow.pipeline().execution_graph();

    if cmd.dot {
        print!("{}", graph.to_dot());
    } else {
        println!("{}", format_state(&state));
        println!("\n{}", graph);
    }

    Ok(())
}

fn list_operations(cmd: &OperationsCommand) {
    let registry = OperationRegistry::with_builtin_operations();
    println!("{} Available operations:", INFO);
    for name in registry.operations() {
        if let Ok(operation) = registry.lookup(name) {
            println!("{}", format_operation(operation, cmd.fields));
        }
    }
}
