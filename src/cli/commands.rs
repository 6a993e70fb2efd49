//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fleetform - plan and state reconciliation for infrastructure modules.
#[derive(Parser, Debug)]
#[command(name = "fleetform")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the settings file.
    #[arg(short, long, global = true, env = "FLEETFORM_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Modules directory (overrides the settings file).
    #[arg(short, long, global = true)]
    pub modules: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the module tree.
    Validate {
        /// Show warnings as well as errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// List the modules of the module tree.
    Modules,

    /// Compute and display the plan.
    Plan {
        /// Show attribute-level changes.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Show the recorded state.
    Show,

    /// Replace the recorded state with observed attributes from a JSON file.
    Refresh {
        /// JSON object mapping `type.name` to attributes.
        #[arg(short, long)]
        file: PathBuf,

        /// State version the file was based on (defaults to the current one).
        #[arg(long)]
        expected_version: Option<u64>,
    },

    /// Watch the modules directory and print engine events.
    Watch {
        /// Reload interval in seconds (overrides the settings file).
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
