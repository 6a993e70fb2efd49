//! State management module for the Fleetform engine.
//!
//! This module owns the last recorded real-world state of every resource and
//! mirrors it to a durable backend: a local JSON file, S3, or memory.

mod backend;
mod local;
mod memory;
mod s3;
mod store;
mod types;

pub use backend::StateBackend;
pub use local::LocalStateBackend;
pub use memory::MemoryStateBackend;
pub use s3::S3StateBackend;
pub use store::StateStore;
pub use types::{STATE_FORMAT, StateRecord, StateSummary};

use crate::config::{StateBackendKind, StateSettings};

/// Builds the backend described by the state settings.
pub async fn backend_from_settings(settings: &StateSettings) -> Box<dyn StateBackend> {
    match settings.backend {
        StateBackendKind::Local => Box::new(LocalStateBackend::with_state_path(settings.path.clone())),
        StateBackendKind::S3 => {
            let bucket = settings.bucket.as_deref().unwrap_or_default();
            Box::new(
                S3StateBackend::new(bucket, settings.prefix.as_deref(), settings.region.as_deref())
                    .await,
            )
        }
    }
}
