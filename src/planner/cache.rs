//! Single-slot cache for the most recently computed plan.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use super::plan::Plan;

/// Holds at most one plan and hands it out only while it is current.
#[derive(Debug, Default)]
pub struct PlanCache {
    slot: RwLock<Option<Arc<Plan>>>,
}

impl PlanCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached plan if it was computed from the given versions.
    ///
    /// A stale plan is reported as absent; it stays in the slot until it is
    /// replaced or invalidated.
    #[must_use]
    pub fn get(&self, graph_version: u64, state_version: u64) -> Option<Arc<Plan>> {
        let slot = self.slot.read();
        match slot.as_ref() {
            Some(plan) if plan.is_current(graph_version, state_version) => Some(Arc::clone(plan)),
            Some(plan) => {
                debug!(
                    "Cached plan is stale (graph v{}/v{graph_version}, state v{}/v{state_version})",
                    plan.graph_version, plan.state_version
                );
                None
            }
            None => None,
        }
    }

    /// Stores a plan, replacing any previous one.
    pub fn store(&self, plan: Arc<Plan>) {
        *self.slot.write() = Some(plan);
    }

    /// Drops the cached plan.
    pub fn invalidate(&self) {
        if self.slot.write().take().is_some() {
            debug!("Plan cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plan(graph_version: u64, state_version: u64) -> Arc<Plan> {
        Arc::new(Plan {
            entries: Vec::new(),
            generated_at: Utc::now(),
            graph_version,
            state_version,
        })
    }

    #[test]
    fn test_hit_requires_both_versions() {
        let cache = PlanCache::new();
        assert!(cache.get(1, 1).is_none());

        cache.store(plan(1, 1));
        assert!(cache.get(1, 1).is_some());
        assert!(cache.get(2, 1).is_none());
        assert!(cache.get(1, 2).is_none());
    }

    #[test]
    fn test_invalidate_clears_slot() {
        let cache = PlanCache::new();
        cache.store(plan(1, 1));
        cache.invalidate();
        assert!(cache.get(1, 1).is_none());
    }

    #[test]
    fn test_store_replaces() {
        let cache = PlanCache::new();
        cache.store(plan(1, 1));
        cache.store(plan(1, 2));
        assert!(cache.get(1, 1).is_none());
        assert_eq!(cache.get(1, 2).unwrap().state_version, 2);
    }
}
