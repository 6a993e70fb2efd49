//! The owned state store.
//!
//! The store is the single owner of the current [`StateRecord`]. Readers get
//! an `Arc` to an immutable record and never wait on a writer's I/O; writers
//! are serialized behind an async gate so the version check, the durable write
//! and the in-memory swap happen as one step.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{FleetformError, Result, StateError};
use crate::resource::{Attributes, ResourceId};

use super::backend::StateBackend;
use super::types::{StateRecord, StateSummary};

/// Versioned, durably mirrored state.
pub struct StateStore {
    /// Durable backend.
    backend: Box<dyn StateBackend>,
    /// Currently published record.
    current: RwLock<Arc<StateRecord>>,
    /// Serializes writers.
    write_gate: Mutex<()>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("backend", &self.backend.backend_type())
            .field("version", &self.current.read().version)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Opens a store, loading the persisted record from `backend`.
    ///
    /// Absent state yields an empty record at version 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot read its state or the persisted
    /// state is corrupted.
    pub async fn open(backend: Box<dyn StateBackend>) -> Result<Self> {
        let record = match backend.load().await? {
            Some(record) => {
                info!(
                    "Opened {} state at version {} ({} resources)",
                    backend.backend_type(),
                    record.version,
                    record.len()
                );
                record
            }
            None => {
                debug!("No persisted state in {} backend, starting empty", backend.backend_type());
                StateRecord::empty()
            }
        };

        Ok(Self {
            backend,
            current: RwLock::new(Arc::new(record)),
            write_gate: Mutex::new(()),
        })
    }

    /// Returns an immutable snapshot of the current record.
    #[must_use]
    pub fn snapshot(&self) -> Arc<StateRecord> {
        Arc::clone(&self.current.read())
    }

    /// Returns the current state version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Returns the backend type name.
    #[must_use]
    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    /// Atomically replaces the recorded resources.
    ///
    /// The write succeeds only if `expected_version` is the current version.
    /// The new record is persisted before it is published, so a failed write
    /// leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StateError::ConcurrentModification` on a version mismatch, or
    /// the backend's error if persisting fails.
    pub async fn replace(
        &self,
        resources: BTreeMap<ResourceId, Attributes>,
        expected_version: u64,
    ) -> Result<StateSummary> {
        let _gate = self.write_gate.lock().await;

        let current = self.snapshot();
        if current.version != expected_version {
            warn!(
                "Rejected state write based on version {expected_version}, current is {}",
                current.version
            );
            return Err(FleetformError::State(StateError::ConcurrentModification {
                expected: expected_version,
                found: current.version,
            }));
        }

        let next = current.successor(resources);
        self.backend.save(&next).await?;

        let summary = next.summary();
        *self.current.write() = Arc::new(next);

        info!(
            "State replaced: version {} ({} resources)",
            summary.version, summary.resource_count
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AttributeValue;
    use crate::state::backend::MockStateBackend;
    use crate::state::MemoryStateBackend;

    fn resources(acl: &str) -> BTreeMap<ResourceId, Attributes> {
        let mut attrs = Attributes::new();
        attrs.insert(String::from("acl"), AttributeValue::from(acl));
        let mut map = BTreeMap::new();
        map.insert(ResourceId::new("aws_s3_bucket", "my_bucket"), attrs);
        map
    }

    async fn memory_store() -> StateStore {
        StateStore::open(Box::new(MemoryStateBackend::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_empty() {
        let store = memory_store().await;
        let snapshot = store.snapshot();
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_replace_bumps_version() {
        let store = memory_store().await;
        let summary = store.replace(resources("private"), 0).await.unwrap();
        assert_eq!(summary.version, 1);
        assert_eq!(summary.resource_count, 1);
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let store = memory_store().await;
        store.replace(resources("private"), 0).await.unwrap();

        let err = store.replace(resources("public-read"), 0).await.unwrap_err();
        assert!(matches!(
            err,
            FleetformError::State(StateError::ConcurrentModification { expected: 0, found: 1 })
        ));
        assert!(err.is_retryable());
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_unaffected_by_later_writes() {
        let store = memory_store().await;
        let before = store.snapshot();
        store.replace(resources("private"), 0).await.unwrap();

        assert_eq!(before.version, 0);
        assert!(before.is_empty());
        assert_eq!(store.snapshot().version, 1);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_state_unchanged() {
        let mut backend = MockStateBackend::new();
        backend.expect_load().returning(|| Ok(None));
        backend
            .expect_save()
            .returning(|_| Err(FleetformError::State(StateError::persistence("disk full"))));
        backend.expect_backend_type().return_const("mock");

        let store = StateStore::open(Box::new(backend)).await.unwrap();
        assert!(store.replace(resources("private"), 0).await.is_err());
        assert_eq!(store.version(), 0);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_open_loads_persisted_record() {
        let record = StateRecord::empty().successor(resources("private"));
        let mut backend = MockStateBackend::new();
        let persisted = record.clone();
        backend
            .expect_load()
            .returning(move || Ok(Some(persisted.clone())));
        backend.expect_backend_type().return_const("mock");

        let store = StateStore::open(Box::new(backend)).await.unwrap();
        assert_eq!(*store.snapshot(), record);
    }

    #[tokio::test]
    async fn test_concurrent_writers_one_wins() {
        let store = Arc::new(memory_store().await);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.replace(resources(&format!("acl-{i}")), 0).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.version(), 1);
    }
}
