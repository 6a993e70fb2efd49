//! The reconciliation engine.
//!
//! [`Engine`] ties the module registry, state store, diff engine, plan cache
//! and change notifier together. It holds the authoritative desired graph,
//! serves plans computed against immutable state snapshots, and tells
//! subscribers whenever the plan or the state changes.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{DesiredGraph, EngineSettings, ModuleRegistry};
use crate::error::{FleetformError, Result};
use crate::notifier::{ChangeNotifier, EngineEvent, EventErrorKind, Subscription};
use crate::planner::{DiffEngine, Plan, PlanCache};
use crate::resource::{Attributes, ResourceId};
use crate::state::{StateBackend, StateRecord, StateStore, StateSummary, backend_from_settings};

/// Source of observed resource attributes.
///
/// Implemented by whatever talks to the real infrastructure; the engine only
/// records what it reports.
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Returns the observed attributes of the resources that exist.
    ///
    /// The desired graph tells the provider what to look for; resources it
    /// cannot find are simply left out of the result.
    async fn observe(&self, desired: &DesiredGraph) -> Result<BTreeMap<ResourceId, Attributes>>;

    /// Gets the provider name.
    fn name(&self) -> &str;
}

/// The plan and state reconciliation engine.
pub struct Engine {
    /// Engine settings.
    settings: EngineSettings,
    /// Module loader.
    registry: ModuleRegistry,
    /// Owned state.
    state: StateStore,
    /// Plan computation.
    diff: DiffEngine,
    /// Latest plan.
    cache: PlanCache,
    /// Event fan-out.
    notifier: ChangeNotifier,
    /// Authoritative desired graph.
    graph: RwLock<Arc<DesiredGraph>>,
    /// Serializes module loads so graph versions stay monotonic.
    load_gate: Mutex<()>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("modules_dir", &self.settings.modules_dir)
            .field("graph_version", &self.graph.read().version())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine over the given state backend.
    ///
    /// The engine starts with an empty desired graph at version 0; call
    /// [`Self::reload`] or [`Self::load_modules`] to install one.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the persisted state
    /// cannot be loaded.
    pub async fn new(settings: EngineSettings, backend: Box<dyn StateBackend>) -> Result<Self> {
        settings.validate()?;
        let state = StateStore::open(backend).await?;
        let notifier = ChangeNotifier::new(settings.event_buffer);

        info!(
            "Engine ready: modules in {}, {} state at version {}",
            settings.modules_dir.display(),
            state.backend_type(),
            state.version()
        );

        Ok(Self {
            settings,
            registry: ModuleRegistry::new(),
            state,
            diff: DiffEngine::new(),
            cache: PlanCache::new(),
            notifier,
            graph: RwLock::new(Arc::new(DesiredGraph::empty())),
            load_gate: Mutex::new(()),
        })
    }

    /// Creates an engine using the state backend named in the settings.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::new`].
    pub async fn from_settings(settings: EngineSettings) -> Result<Self> {
        let backend = backend_from_settings(&settings.state).await;
        Self::new(settings, backend).await
    }

    /// Returns the engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the current desired graph.
    #[must_use]
    pub fn graph(&self) -> Arc<DesiredGraph> {
        Arc::clone(&self.graph.read())
    }

    /// Loads the module tree at `path` and installs it as the desired graph.
    ///
    /// On success the plan cache is invalidated and a fresh plan is published.
    /// On failure the previous graph stays authoritative and subscribers get
    /// a `config_error` event.
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` that made the load fail.
    pub async fn load_modules(&self, path: impl AsRef<Path>) -> Result<Arc<DesiredGraph>> {
        let path = path.as_ref().to_path_buf();
        let _gate = self.load_gate.lock().await;

        let graph = match self.load_graph(path).await {
            Ok(graph) => graph,
            Err(err) => {
                error!("Module load failed: {err}");
                self.notifier
                    .publish(EngineEvent::error(EventErrorKind::ConfigError, err.to_string()));
                return Err(err);
            }
        };

        let installed = self.install(graph);
        self.publish_plan().await;
        Ok(installed)
    }

    /// Reloads the configured modules directory.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::load_modules`].
    pub async fn reload(&self) -> Result<Arc<DesiredGraph>> {
        self.load_modules(self.settings.modules_dir.clone()).await
    }

    /// Reloads the configured modules directory if its content changed.
    ///
    /// Returns whether a new graph was installed.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::load_modules`].
    pub async fn reload_if_changed(&self) -> Result<bool> {
        let _gate = self.load_gate.lock().await;

        let graph = match self.load_graph(self.settings.modules_dir.clone()).await {
            Ok(graph) => graph,
            Err(err) => {
                self.notifier
                    .publish(EngineEvent::error(EventErrorKind::ConfigError, err.to_string()));
                return Err(err);
            }
        };

        if graph.digest() == self.graph().digest() {
            debug!("Modules unchanged, keeping graph v{}", self.graph().version());
            return Ok(false);
        }

        self.install(graph);
        self.publish_plan().await;
        Ok(true)
    }

    /// Spawns a task reloading the modules directory every `interval`.
    ///
    /// Load failures are reported as events and do not stop the loop. Abort
    /// the returned handle to stop it.
    pub fn spawn_reload_loop(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        info!("Reloading modules every {}s", interval.as_secs_f64());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match engine.reload_if_changed().await {
                    Ok(true) => info!("Modules changed, graph v{} installed", engine.graph().version()),
                    Ok(false) => {}
                    Err(err) => warn!("Background reload failed: {err}"),
                }
            }
        })
    }

    /// Returns an immutable snapshot of the recorded state.
    #[must_use]
    pub fn get_state(&self) -> Arc<StateRecord> {
        self.state.snapshot()
    }

    /// Replaces the recorded state.
    ///
    /// On success subscribers get a `StateUpdated` event followed by a
    /// `PlanUpdated` event for the new state.
    ///
    /// # Errors
    ///
    /// Returns `StateError::ConcurrentModification` if `expected_version` is
    /// not the current state version, or the backend error if persisting fails.
    pub async fn refresh_state(
        &self,
        resources: BTreeMap<ResourceId, Attributes>,
        expected_version: u64,
    ) -> Result<StateSummary> {
        match self.state.replace(resources, expected_version).await {
            Ok(summary) => {
                self.cache.invalidate();
                self.notifier.publish(EngineEvent::StateUpdated(summary));
                self.publish_plan().await;
                Ok(summary)
            }
            Err(err) => {
                let kind = if err.is_conflict() {
                    EventErrorKind::StateConflict
                } else {
                    EventErrorKind::StateError
                };
                self.notifier.publish(EngineEvent::error(kind, err.to_string()));
                Err(err)
            }
        }
    }

    /// Records what `provider` observes for the current desired graph.
    ///
    /// Each attempt reads a fresh snapshot version; a write that loses a race
    /// is retried up to `max_attempts` times.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or the last state error once attempts
    /// are exhausted.
    pub async fn sync_from_provider(&self, provider: &dyn StateProvider) -> Result<StateSummary> {
        let max_attempts = self.settings.max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!("Sync from {} attempt {attempt}/{max_attempts}", provider.name());

            let base_version = self.state.version();
            let observed = provider.observe(&self.graph()).await?;

            match self.refresh_state(observed, base_version).await {
                Ok(summary) => {
                    info!("Synced state from {} at version {}", provider.name(), summary.version);
                    return Ok(summary);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!("Sync attempt {attempt} failed: {err}, retrying");
                    if let Some(delay) = err.retry_delay_secs().filter(|d| *d > 0) {
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| FleetformError::internal("no sync attempts were made")))
    }

    /// Returns the plan for the current graph and state.
    ///
    /// The cached plan is returned while both versions match; otherwise a new
    /// plan is computed and cached.
    pub async fn get_plan(&self) -> Arc<Plan> {
        let graph = self.graph();
        let state = self.state.snapshot();

        if let Some(plan) = self.cache.get(graph.version(), state.version) {
            return plan;
        }

        let plan = Arc::new(self.diff.compute(&graph, &state));
        self.cache.store(Arc::clone(&plan));
        info!(
            "Plan computed for graph v{} / state v{}: {}",
            plan.graph_version,
            plan.state_version,
            plan.summary()
        );

        if let Some(path) = &self.settings.plan_path {
            write_plan_artifact(path, &plan).await;
        }
        plan
    }

    /// Registers a subscriber for engine events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    /// Returns the module paths of the current graph.
    #[must_use]
    pub fn modules(&self) -> Vec<String> {
        self.graph().module_paths()
    }

    /// Runs the registry on a blocking thread.
    async fn load_graph(&self, path: PathBuf) -> Result<DesiredGraph> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.load(&path))
            .await
            .map_err(|e| FleetformError::internal(format!("Module load task failed: {e}")))?
    }

    /// Installs a loaded graph under the next version. Caller holds the load gate.
    fn install(&self, graph: DesiredGraph) -> Arc<DesiredGraph> {
        let mut slot = self.graph.write();
        let graph = Arc::new(graph.with_version(slot.version() + 1));
        *slot = Arc::clone(&graph);
        drop(slot);

        self.cache.invalidate();
        info!(
            "Installed desired graph v{} ({} resources, digest {})",
            graph.version(),
            graph.len(),
            &graph.digest()[..12]
        );
        graph
    }

    /// Publishes the current plan.
    async fn publish_plan(&self) {
        let plan = self.get_plan().await;
        self.notifier.publish(EngineEvent::PlanUpdated(plan));
    }
}

/// Writes a plan as JSON, logging rather than failing.
async fn write_plan_artifact(path: &Path, plan: &Plan) {
    let content = match serde_json::to_vec_pretty(plan) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to serialize plan: {e}");
            return;
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        warn!("Failed to create plan directory {}: {e}", parent.display());
        return;
    }

    match tokio::fs::write(path, content).await {
        Ok(()) => debug!("Plan written to {}", path.display()),
        Err(e) => warn!("Failed to write plan to {}: {e}", path.display()),
    }
}
