//! Settings parser for loading engine settings.
//!
//! Settings come from an optional YAML file, overridden by `FLEETFORM_*`
//! environment variables, which may themselves be supplied by a `.env` file.

use crate::error::{ConfigError, FleetformError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::settings::EngineSettings;

/// Default settings file names to search for.
pub const DEFAULT_SETTINGS_FILES: &[&str] = &["fleetform.settings.yaml", "fleetform.settings.yml"];

/// Parser for loading engine settings.
#[derive(Debug, Default)]
pub struct SettingsParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl SettingsParser {
    /// Creates a new settings parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Returns the base directory, defaulting to the current directory.
    fn base_dir(&self) -> PathBuf {
        self.base_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<EngineSettings> {
        let path = path.as_ref();
        info!("Loading settings from: {}", path.display());

        if !path.exists() {
            return Err(FleetformError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            FleetformError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<EngineSettings> {
        debug!("Parsing YAML settings");

        if content.trim().is_empty() {
            return Ok(EngineSettings::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            FleetformError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })
    }

    /// Loads settings with environment variable overrides.
    ///
    /// Without an explicit path the base directory is searched for one of
    /// [`DEFAULT_SETTINGS_FILES`]; if none exists the defaults are used.
    /// Relative paths are resolved against the directory holding the file.
    ///
    /// Environment variables are checked in the format
    /// `FLEETFORM_<KEY>` (e.g., `FLEETFORM_MODULES_DIR`).
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed, or if
    /// the resulting settings are invalid.
    pub fn load_with_env(&self, path: Option<&Path>) -> Result<EngineSettings> {
        let base = self.base_dir();
        let (mut settings, settings_dir) = match path {
            Some(path) => {
                let dir = path.parent().map_or_else(|| base.clone(), Path::to_path_buf);
                (self.load_file(path)?, dir)
            }
            None => match find_settings_file(&base) {
                Some(found) => (self.load_file(&found)?, base.clone()),
                None => {
                    debug!("No settings file found in {}, using defaults", base.display());
                    (EngineSettings::default(), base.clone())
                }
            },
        };

        Self::apply_env_overrides(&mut settings);
        settings.validate()?;

        Ok(settings.resolved_against(&settings_dir))
    }

    /// Applies environment variable overrides to the settings.
    fn apply_env_overrides(settings: &mut EngineSettings) {
        if let Ok(dir) = std::env::var("FLEETFORM_MODULES_DIR") {
            debug!("Overriding modules_dir from environment");
            settings.modules_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("FLEETFORM_STATE_PATH") {
            debug!("Overriding state.path from environment");
            settings.state.path = PathBuf::from(path);
        }

        if let Ok(bucket) = std::env::var("FLEETFORM_STATE_BUCKET") {
            debug!("Overriding state.bucket from environment");
            settings.state.bucket = Some(bucket);
        }

        if let Ok(prefix) = std::env::var("FLEETFORM_STATE_PREFIX") {
            debug!("Overriding state.prefix from environment");
            settings.state.prefix = Some(prefix);
        }

        if let Ok(path) = std::env::var("FLEETFORM_PLAN_PATH") {
            debug!("Overriding plan_path from environment");
            settings.plan_path = Some(PathBuf::from(path));
        }

        if let Ok(raw) = std::env::var("FLEETFORM_EVENT_BUFFER") {
            match raw.parse() {
                Ok(buffer) => {
                    debug!("Overriding event_buffer from environment");
                    settings.event_buffer = buffer;
                }
                Err(e) => warn!("Ignoring invalid FLEETFORM_EVENT_BUFFER '{raw}': {e}"),
            }
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.base_dir().join(".env");

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                FleetformError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Finds a settings file in the given directory.
#[must_use]
pub fn find_settings_file(dir: impl AsRef<Path>) -> Option<PathBuf> {
    DEFAULT_SETTINGS_FILES
        .iter()
        .map(|name| dir.as_ref().join(name))
        .find(|path| path.exists())
        .inspect(|path| info!("Found settings file: {}", path.display()))
}
