//! Engine settings.
//!
//! These types map to the optional `fleetform.settings.yaml` file. Every field
//! has a default, so an engine can run without any settings file at all.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FleetformError, Result};

/// Root settings structure for an engine instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineSettings {
    /// Root directory of the module tree.
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,
    /// State backend configuration.
    #[serde(default)]
    pub state: StateSettings,
    /// Per-subscriber event buffer capacity.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Interval between background module reloads, in seconds.
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,
    /// Optional file receiving every newly computed plan as JSON.
    #[serde(default)]
    pub plan_path: Option<PathBuf>,
    /// Maximum attempts when a provider sync hits a version conflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// State backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateSettings {
    /// Backend type (local or s3).
    #[serde(default)]
    pub backend: StateBackendKind,
    /// Local state file path.
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    /// S3 bucket name (required for s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix (optional).
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
}

/// State backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackendKind {
    /// Local file-based state storage.
    #[default]
    Local,
    /// AWS S3-based state storage.
    S3,
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".fleetform/state.json")
}

const fn default_event_buffer() -> usize {
    64
}

const fn default_reload_interval() -> u64 {
    2
}

const fn default_max_attempts() -> u32 {
    3
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            state: StateSettings::default(),
            event_buffer: default_event_buffer(),
            reload_interval_secs: default_reload_interval(),
            plan_path: None,
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            backend: StateBackendKind::Local,
            path: default_state_path(),
            bucket: None,
            prefix: None,
            region: None,
        }
    }
}

impl EngineSettings {
    /// Checks settings for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer == 0 {
            return Err(FleetformError::Config(ConfigError::validation(
                "Event buffer must hold at least one event",
                "event_buffer",
            )));
        }

        if self.reload_interval_secs == 0 {
            return Err(FleetformError::Config(ConfigError::validation(
                "Reload interval must be at least one second",
                "reload_interval_secs",
            )));
        }

        if self.max_attempts == 0 {
            return Err(FleetformError::Config(ConfigError::validation(
                "At least one sync attempt is required",
                "max_attempts",
            )));
        }

        if self.state.backend == StateBackendKind::S3
            && self.state.bucket.as_ref().is_none_or(String::is_empty)
        {
            return Err(FleetformError::Config(ConfigError::validation(
                "S3 bucket name is required when using S3 backend",
                "state.bucket",
            )));
        }

        Ok(())
    }

    /// Resolves relative paths against the given base directory.
    #[must_use]
    pub fn resolved_against(mut self, base: &Path) -> Self {
        if self.modules_dir.is_relative() {
            self.modules_dir = base.join(&self.modules_dir);
        }
        if self.state.path.is_relative() {
            self.state.path = base.join(&self.state.path);
        }
        if let Some(plan_path) = self.plan_path.take() {
            self.plan_path = Some(if plan_path.is_relative() {
                base.join(plan_path)
            } else {
                plan_path
            });
        }
        self
    }
}
