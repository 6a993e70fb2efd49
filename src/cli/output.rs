//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::DesiredGraph;
use crate::notifier::EngineEvent;
use crate::planner::{ChangeAction, ChangeEntry, Plan};
use crate::state::{StateRecord, StateSummary};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan entry row for table display.
#[derive(Tabled)]
struct PlanEntryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Changed")]
    changed: String,
}

/// State resource row for table display.
#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Attributes")]
    attributes: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &Plan, detailed: bool) -> String {
        if !plan.has_changes() {
            return format!(
                "{} No changes. Infrastructure is up-to-date.\n",
                "✓".green()
            );
        }

        let mut output = String::new();
        let _ = write!(
            output,
            "\nPlan (graph v{}, state v{})\n\n",
            plan.graph_version, plan.state_version
        );

        let rows: Vec<PlanEntryRow> = plan
            .changes()
            .enumerate()
            .map(|(i, entry)| PlanEntryRow {
                index: i + 1,
                action: Self::format_action(entry.action()),
                resource: entry.resource().to_string(),
                changed: Self::truncate(&entry.changed_attributes().join(", "), 40),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if detailed {
            output.push('\n');
            for entry in plan.changes() {
                Self::write_entry_detail(&mut output, entry);
            }
        }

        let summary = plan.summary();
        let _ = writeln!(
            output,
            "\nPlan: {} to add, {} to change, {} to destroy",
            summary.create.to_string().green(),
            summary.update.to_string().yellow(),
            summary.delete.to_string().red()
        );

        output
    }

    /// Writes the attribute-level changes of one entry.
    fn write_entry_detail(output: &mut String, entry: &ChangeEntry) {
        let _ = writeln!(output, "  {}", entry.description());
        match entry.action() {
            ChangeAction::Create => {
                for (key, value) in entry.after().into_iter().flatten() {
                    let _ = writeln!(output, "      {} {key} = {value}", "+".green());
                }
            }
            ChangeAction::Delete => {
                for (key, value) in entry.before().into_iter().flatten() {
                    let _ = writeln!(output, "      {} {key} = {value}", "-".red());
                }
            }
            ChangeAction::Update => {
                for path in entry.changed_attributes() {
                    let old = entry.before().and_then(|attrs| lookup(attrs, path));
                    let new = entry.after().and_then(|attrs| lookup(attrs, path));
                    let _ = writeln!(
                        output,
                        "      {} {path}: {} -> {}",
                        "~".yellow(),
                        old.unwrap_or_else(|| String::from("(absent)")),
                        new.unwrap_or_else(|| String::from("(absent)"))
                    );
                }
            }
            ChangeAction::NoOp => {}
        }
    }

    /// Formats the recorded state.
    #[must_use]
    pub fn format_state(&self, state: &StateRecord) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = writeln!(output, "\nState");
                let _ = writeln!(output, "   Version: {}", state.version);
                let _ = writeln!(output, "   Last synced: {}", state.last_synced.format("%Y-%m-%d %H:%M:%S UTC"));
                let _ = writeln!(output, "   Resources: {}\n", state.len());

                if !state.is_empty() {
                    let rows: Vec<StateRow> = state
                        .resources
                        .iter()
                        .map(|(id, attrs)| StateRow {
                            resource: id.to_string(),
                            attributes: attrs.len(),
                        })
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                output
            }
        }
    }

    /// Formats the result of a state replace.
    #[must_use]
    pub fn format_state_summary(&self, summary: &StateSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => format!(
                "{} State updated to version {} ({} resources)\n",
                "✓".green(),
                summary.version,
                summary.resource_count
            ),
        }
    }

    /// Formats the module paths of a graph.
    #[must_use]
    pub fn format_modules(&self, modules: &[String]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(modules).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                for module in modules {
                    let _ = writeln!(output, "   {module}");
                }
                output
            }
        }
    }

    /// Formats a validation outcome.
    #[must_use]
    pub fn format_validation(&self, graph: &DesiredGraph, warnings: &[String], show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": true,
                    "modules": graph.module_paths().len(),
                    "resources": graph.len(),
                    "digest": graph.digest(),
                    "warnings": warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());
                let _ = writeln!(output, "\nConfiguration summary:");
                let _ = writeln!(output, "   Modules: {}", graph.module_paths().len());
                let _ = writeln!(output, "   Resources: {}", graph.len());

                if show_warnings && !warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a single engine event as one line.
    #[must_use]
    pub fn format_event(&self, event: &EngineEvent) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(event).unwrap_or_default(),
            OutputFormat::Text => match event {
                EngineEvent::PlanUpdated(plan) => format!(
                    "{} graph v{} / state v{}: {}",
                    "plan".cyan(),
                    plan.graph_version,
                    plan.state_version,
                    plan.summary()
                ),
                EngineEvent::StateUpdated(summary) => format!(
                    "{} version {} ({} resources)",
                    "state".cyan(),
                    summary.version,
                    summary.resource_count
                ),
                EngineEvent::Error { kind, message } => {
                    format!("{} {kind}: {message}", "error".red())
                }
            },
        }
    }

    /// Formats an action with color.
    fn format_action(action: ChangeAction) -> String {
        match action {
            ChangeAction::Create => "+create".green().to_string(),
            ChangeAction::Update => "~update".yellow().to_string(),
            ChangeAction::Delete => "-delete".red().to_string(),
            ChangeAction::NoOp => "no-op".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

/// Resolves a dotted attribute path to a rendered value.
fn lookup(attrs: &crate::resource::Attributes, path: &str) -> Option<String> {
    let mut segments = path.split('.');
    let mut value = attrs.get(segments.next()?)?;
    for segment in segments {
        value = value.as_map()?.get(segment)?;
    }
    Some(value.to_string())
}
