// ── Polling coordinator ──
//
// Owns the client, the entity store and the background poll task. Each
// cycle checks the connection, fetches a snapshot, projects it and
// publishes the result. The first cycle must succeed; later failures keep
// the last published entities and report an update failure.

use std::sync::Arc;
use std::time::Duration;

use clashmon_api::{ApiRequest, ClashClient, VersionInfo};
use tokio::sync::{Mutex, OnceCell, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{self, Command, CommandResult};
use crate::config::CoordinatorConfig;
use crate::error::CoreError;
use crate::model::{DeviceIdentity, EntityDescriptor, EntityState, EntityType};
use crate::projector::{has_data_entities, project};
use crate::store::{EntitySnapshot, EntityStore};
use crate::stream::EntityStream;

/// Lifecycle of a [`Coordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoordinatorState {
    /// No refresh has succeeded yet.
    Uninitialized,
    /// The last refresh succeeded.
    Ready,
    /// The last refresh failed; the previous entities are still served.
    Degraded,
    /// Shut down. No further refreshes or commands.
    Stopped,
}

// ── Coordinator ──────────────────────────────────────────────────

/// Periodic poller and command entry point for one Clash controller.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    client: ClashClient,
    store: EntityStore,
    state: watch::Sender<CoordinatorState>,
    device: OnceCell<DeviceIdentity>,
    last_error: std::sync::Mutex<Option<String>>,
    /// Held for the duration of a cycle so refreshes never overlap.
    cycle: Mutex<()>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build a coordinator. Does not contact the controller; call
    /// [`start()`](Self::start) or [`refresh()`](Self::refresh).
    pub fn new(config: CoordinatorConfig) -> Self {
        let config = config.clamped();
        let client = ClashClient::new(
            config.endpoint_url.clone(),
            config.token.clone(),
            config.transport(),
        );
        let (state, _) = watch::channel(CoordinatorState::Uninitialized);

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                client,
                store: EntityStore::new(),
                state,
                device: OnceCell::new(),
                last_error: std::sync::Mutex::new(None),
                cycle: Mutex::new(()),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &ClashClient {
        &self.inner.client
    }

    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first refresh and spawn the periodic poll task.
    ///
    /// A failed first refresh is fatal and returns
    /// [`CoreError::NotReady`]; no task is spawned in that case.
    pub async fn start(&self) -> Result<Arc<EntitySnapshot>, CoreError> {
        let snapshot = self.refresh().await?;

        let mut handles = self.inner.task_handles.lock().await;
        if handles.is_empty() {
            let interval = self.inner.config.poll_interval;
            let cancel = self.inner.cancel.child_token();
            handles.push(tokio::spawn(poll_task(self.clone(), interval, cancel)));
        }

        info!(
            endpoint = %self.inner.config.endpoint_url,
            interval_secs = self.inner.config.poll_interval.as_secs(),
            entities = snapshot.len(),
            "coordinator started"
        );
        Ok(snapshot)
    }

    /// Stop polling and release the HTTP session. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.client.close();
        let previous = self.inner.state.send_replace(CoordinatorState::Stopped);
        if previous != CoordinatorState::Stopped {
            info!("coordinator stopped");
        }
    }

    /// One-shot: refresh once, run the closure, shut down.
    ///
    /// No poll task is spawned.
    pub async fn oneshot<F, Fut, T>(config: CoordinatorConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let coordinator = Coordinator::new(config);
        if let Err(e) = coordinator.refresh().await {
            coordinator.shutdown().await;
            return Err(e);
        }
        let result = f(coordinator.clone()).await;
        coordinator.shutdown().await;
        result
    }

    // ── Refresh cycle ────────────────────────────────────────────

    /// Run one poll cycle and publish the projected entities.
    ///
    /// Without prior data a failure yields [`CoreError::NotReady`]. With
    /// prior data the store is left untouched, the state moves to
    /// `Degraded` and [`CoreError::UpdateFailed`] is returned.
    pub async fn refresh(&self) -> Result<Arc<EntitySnapshot>, CoreError> {
        let _cycle = self.inner.cycle.lock().await;
        if self.state() == CoordinatorState::Stopped {
            return Err(CoreError::Stopped);
        }

        match self.run_cycle().await {
            Ok(entities) => {
                let count = entities.len();
                let snapshot = self.inner.store.publish(entities);
                self.set_last_error(None);
                self.transition(CoordinatorState::Ready);
                debug!(entities = count, generation = snapshot.generation(), "refresh complete");
                Ok(snapshot)
            }
            Err(e) => {
                let reason = e.to_string();
                let kind = e.kind();
                self.set_last_error(Some(reason.clone()));

                if self.inner.store.has_data() {
                    warn!(error = %reason, "refresh failed, serving last known entities");
                    self.transition(CoordinatorState::Degraded);
                    Err(CoreError::UpdateFailed { reason, kind })
                } else {
                    warn!(error = %reason, "initial refresh failed");
                    Err(CoreError::NotReady { reason, kind })
                }
            }
        }
    }

    async fn run_cycle(&self) -> Result<Vec<EntityDescriptor>, CoreError> {
        let client = &self.inner.client;
        let streaming = self.inner.config.streaming_checks_enabled;

        let version = client.check_connection().await?;
        self.identify(&version).await;

        let snapshot = client.fetch_snapshot(streaming).await;
        let entities = project(&snapshot, client.device_id(), streaming);
        if !has_data_entities(&entities) {
            return Err(CoreError::Api {
                message: "Empty response".into(),
                status: None,
            });
        }
        Ok(entities)
    }

    /// Record the device identity the first time the version is seen.
    async fn identify(&self, version: &VersionInfo) {
        let device_id = self.inner.client.device_id();
        let device = self
            .inner
            .device
            .get_or_init(|| async { DeviceIdentity::new(device_id, version) })
            .await;
        debug!(device = %device.id, model = %device.model, "device identity");
    }

    fn transition(&self, next: CoordinatorState) {
        self.inner.state.send_if_modified(|state| {
            if *state == next || *state == CoordinatorState::Stopped {
                return false;
            }
            info!(from = %state, to = %next, "coordinator state changed");
            *state = next;
            true
        });
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.inner.last_error.lock().expect("last_error lock poisoned") = error;
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    /// The current published snapshot.
    pub fn entities(&self) -> Arc<EntitySnapshot> {
        self.inner.store.current()
    }

    pub fn subscribe(&self) -> EntityStream {
        self.inner.store.subscribe()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<EntityDescriptor>> {
        self.inner.store.current().get_by_name(name)
    }

    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<Arc<EntityDescriptor>> {
        self.inner.store.current().get_by_unique_id(unique_id)
    }

    /// Device identity, known after the first successful version check.
    pub fn device(&self) -> Option<DeviceIdentity> {
        self.inner.device.get().cloned()
    }

    /// Message of the most recent failed refresh, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().expect("last_error lock poisoned").clone()
    }

    // ── Entity actions ───────────────────────────────────────────

    /// Press a button entity.
    pub async fn press(&self, unique_id: &str) -> Result<(), CoreError> {
        self.ensure_running()?;
        let entity = self.entity(unique_id)?;
        let Some(action) = entity.action.as_ref() else {
            return Err(CoreError::ValidationFailed {
                message: format!("{} has no action", entity.name),
            });
        };

        let request: ApiRequest = action.to_request();
        self.inner
            .client
            .send(&request)
            .await
            .map_err(|e| CoreError::operation("press", e))?;
        info!(entity = %entity.name, %request, "button pressed");
        Ok(())
    }

    /// Switch a selector group to `option` and publish the new state
    /// without waiting for the next poll.
    pub async fn select_option(&self, unique_id: &str, option: &str) -> Result<Arc<EntitySnapshot>, CoreError> {
        self.ensure_running()?;
        let entity = self.entity(unique_id)?;
        if entity.entity_type != EntityType::ProxyGroupSelector {
            return Err(CoreError::ValidationFailed {
                message: format!("{} is not a selectable proxy group", entity.name),
            });
        }
        let known = entity
            .options
            .as_deref()
            .is_some_and(|options| options.iter().any(|o| o == option));
        if !known {
            return Err(CoreError::ValidationFailed {
                message: format!("{option:?} is not an option of {}", entity.name),
            });
        }

        command::select_proxy(&self.inner.client, &entity.name, option)
            .await
            .map_err(|e| CoreError::operation("select_option", e))?;
        Ok(self
            .inner
            .store
            .replace_entity(entity.with_state(EntityState::from(option))))
    }

    /// Execute a service command against the controller.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        self.ensure_running()?;
        command::route(&self.inner.client, self.inner.config.concurrency_limit, cmd).await
    }

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.state() == CoordinatorState::Stopped {
            return Err(CoreError::Stopped);
        }
        Ok(())
    }

    fn entity(&self, unique_id: &str) -> Result<Arc<EntityDescriptor>, CoreError> {
        self.get_by_unique_id(unique_id).ok_or_else(|| CoreError::NotFound {
            identifier: unique_id.to_owned(),
        })
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically refresh until cancelled. Cycles are sequential: a slow
/// cycle delays the next tick instead of bursting.
async fn poll_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = coordinator.refresh().await {
                    debug!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
    debug!("poll task exited");
}
