//! CLI module for the Fleetform tool.
//!
//! This module provides the command-line interface over the engine:
//! validating and listing modules, planning, and inspecting or refreshing
//! recorded state.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
