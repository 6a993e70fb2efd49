//! In-memory state backend for tests and ephemeral engines.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

use super::backend::StateBackend;
use super::types::StateRecord;

/// State backend that keeps the last saved record in memory.
#[derive(Debug, Default)]
pub struct MemoryStateBackend {
    /// Last saved record.
    record: Mutex<Option<StateRecord>>,
}

impl MemoryStateBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with a record.
    #[must_use]
    pub fn with_record(record: StateRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn load(&self) -> Result<Option<StateRecord>> {
        Ok(self.record.lock().clone())
    }

    async fn save(&self, record: &StateRecord) -> Result<()> {
        *self.record.lock() = Some(record.clone());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
