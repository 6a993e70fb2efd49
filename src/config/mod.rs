//! Configuration module for the Fleetform engine.
//!
//! This module handles everything on the desired side of a plan:
//! - Parsing HCL, JSON and YAML module files
//! - Walking module trees into a desired graph
//! - Validation and content hashing of declarations
//! - Loading engine settings

mod format;
mod graph;
mod hash;
mod parser;
mod registry;
mod settings;
mod validator;

pub use format::{ConfigFormat, Document, FormatRegistry, HclFormat, JsonFormat, ResourceDecl, YamlFormat};
pub use graph::{DesiredGraph, Module};
pub use hash::GraphHasher;
pub use parser::{DEFAULT_SETTINGS_FILES, SettingsParser, find_settings_file};
pub use registry::ModuleRegistry;
pub use settings::{EngineSettings, StateBackendKind, StateSettings};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
