//! Durable storage seam for state records.

use async_trait::async_trait;

use crate::error::Result;
use super::types::StateRecord;

/// Trait for state storage backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Loads the persisted record.
    ///
    /// Returns `None` if no state exists yet.
    async fn load(&self) -> Result<Option<StateRecord>>;

    /// Persists a record, replacing any previous one.
    async fn save(&self, record: &StateRecord) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl StateBackend for Box<dyn StateBackend> {
    async fn load(&self) -> Result<Option<StateRecord>> {
        (**self).load().await
    }

    async fn save(&self, record: &StateRecord) -> Result<()> {
        (**self).save(record).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
