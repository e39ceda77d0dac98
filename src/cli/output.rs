//! CLI output formatting

use crate::{
    core::{StepStatus, Value, WorkflowState},
    execution::{ExecutionEvent, ProcessSummary},
    registry::Operation,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner shown while steps are processed
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a step status for display
pub fn format_status(status: StepStatus) -> String {
    match status {
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Ready => style("READY").yellow().to_string(),
        StepStatus::Resolved => style("RESOLVED").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::ProcessingStarted { steps } => {
            format!("{} Processing {} steps", ROCKET, style(steps).bold())
        }
        ExecutionEvent::StepStarted { step_id, operation } => {
            format!("{} {} ({})", SPINNER, style(step_id).cyan(), style(operation).dim())
        }
        ExecutionEvent::StepResolved { step_id } => format!("{} {}", CHECK, style(step_id).green()),
        ExecutionEvent::StepFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped { step_id, upstream } => format!(
            "{} {} skipped (upstream failed: {})",
            WARN,
            style(step_id).yellow(),
            upstream.join(", ")
        ),
        ExecutionEvent::StepReused { step_id } => {
            format!("{} {} unchanged", INFO, style(step_id).dim())
        }
        ExecutionEvent::ProcessingCompleted { summary } => {
            format!("{} {}", INFO, format_process_summary(summary))
        }
    }
}

/// One-line summary of a processing pass
pub fn format_process_summary(summary: &ProcessSummary) -> String {
    format!(
        "{} resolved, {} failed, {} unchanged, {} pending",
        style(summary.resolved.len()).green(),
        style(summary.failed.len()).red(),
        style(summary.reused.len()).dim(),
        style(summary.pending.len()).yellow()
    )
}

/// Multi-line rendering of a workflow state
pub fn format_state(state: &WorkflowState) -> String {
    let mut lines = vec![
        format!(
            "{} {} (version {}, {})",
            INFO,
            style(&state.workflow_alias).bold(),
            state.version,
            style(state.created_at.to_rfc3339()).dim()
        ),
    ];
    if !state.doc.is_empty() {
        lines.push(format!("  {}", style(&state.doc).dim()));
    }

    lines.push(format!("  {}", style("Steps:").bold()));
    for step in &state.structure.steps {
        let Some(snapshot) = state.steps.get(&step.id) else {
            continue;
        };
        lines.push(format!(
            "    {} {} ({})",
            format_status(snapshot.status),
            style(&step.id).cyan(),
            snapshot.operation
        ));
        if let Some(error) = &snapshot.error {
            lines.push(format!("      {}", style(error).red()));
        }
    }

    if !state.structure.input_aliases.is_empty() {
        lines.push(format!("  {}", style("Inputs:").bold()));
        for (alias, field) in &state.structure.input_aliases {
            let connection = state.structure.connections.iter().find(|c| &c.target == field);
            let value = match connection {
                Some(connection) => style(format!("<- {}", connection.source)).dim().to_string(),
                None => state
                    .inputs
                    .get(field)
                    .and_then(|v| v.value())
                    .map(format_value)
                    .unwrap_or_else(|| style("<default>").dim().to_string()),
            };
            lines.push(format!("    {} ({}) = {}", style(alias).cyan(), field, value));
        }
    }

    if !state.structure.output_aliases.is_empty() {
        lines.push(format!("  {}", style("Outputs:").bold()));
        for (alias, field) in &state.structure.output_aliases {
            let value = state
                .outputs
                .get(alias)
                .map(format_value)
                .unwrap_or_else(|| style("<not set>").dim().to_string());
            lines.push(format!("    {} ({}) = {}", style(alias).cyan(), field, value));
        }
    }

    lines.join("\n")
}

/// Format an operation and, optionally, its default fields
pub fn format_operation(operation: &Operation, with_fields: bool) -> String {
    let mut out = format!("  {} {}", style(&operation.name).bold(), style(&operation.doc).dim());
    if !with_fields {
        return out;
    }

    match operation.module.schema(&Default::default()) {
        Ok(schema) => {
            for field in &schema.inputs {
                let marker = if field.is_required() { "" } else { "?" };
                out.push_str(&format!("\n    in  {}{}: {}", field.name, marker, field.data_type));
            }
            for field in &schema.outputs {
                out.push_str(&format!("\n    out {}: {}", field.name, field.data_type));
            }
        }
        Err(e) => out.push_str(&format!("\n    {}", style(format!("fields depend on config ({})", e)).dim())),
    }
    out
}

/// Format a value with truncation
pub fn format_value(value: &Value) -> String {
    let preview = value.preview();
    const MAX: usize = 80;
    if preview.chars().count() <= MAX {
        preview
    } else {
        let truncated: String = preview.chars().take(MAX).collect();
        format!("{}{}", truncated, style("...").dim())
    }
}
