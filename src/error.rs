//! Error types for the Fleetform engine.
//!
//! This module provides the error hierarchy for every stage of the
//! reconciliation pipeline: module loading, state storage, and the engine
//! facade that ties them together.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Fleetform engine.
#[derive(Debug, Error)]
pub enum FleetformError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration and module loading errors.
///
/// Any of these is fatal to the load attempt that produced it; the previously
/// loaded desired graph stays authoritative.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file or module root was not found.
    #[error("Configuration path not found: {path}")]
    FileNotFound {
        /// Path that does not exist.
        path: PathBuf,
    },

    /// A module directory could not be read.
    #[error("Cannot read module directory {path}: {message}")]
    UnreadableDirectory {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The same resource identity is declared more than once.
    #[error("Duplicate resource {resource} declared in {first} and {second}")]
    DuplicateResource {
        /// The duplicated identity (`type.name`).
        resource: String,
        /// Where the identity was first declared.
        first: String,
        /// Where the duplicate was found.
        second: String,
    },

    /// A module references itself transitively.
    #[error("Circular module reference detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// Optimistic concurrency conflict on a state write.
    ///
    /// The caller must take a fresh snapshot and retry.
    #[error("State was modified concurrently: expected version {expected}, found {found}")]
    ConcurrentModification {
        /// Version the caller based its write on.
        expected: u64,
        /// Version currently held by the store.
        found: u64,
    },

    /// Persisted state is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written to durable storage.
    #[error("Failed to persist state: {message}")]
    Persistence {
        /// Description of the failure.
        message: String,
    },

    /// S3 backend error.
    #[error("S3 state backend error: {message}")]
    S3Error {
        /// Description of the S3 error.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Result type alias for Fleetform operations.
pub type Result<T> = std::result::Result<T, FleetformError>;

impl FleetformError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable without operator intervention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::State(StateError::ConcurrentModification { .. } | StateError::S3Error { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::State(StateError::ConcurrentModification { .. }) => Some(0),
            Self::State(StateError::S3Error { .. }) => Some(2),
            _ => None,
        }
    }

    /// Returns true if this is an optimistic concurrency conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::State(StateError::ConcurrentModification { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error located in the given file.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl StateError {
    /// Creates an S3 error with the given message.
    #[must_use]
    pub fn s3(message: impl Into<String>) -> Self {
        Self::S3Error {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a persistence error with the given message.
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }
}
