// ── Bridge abstraction ──
//
// Full lifecycle management for one Freedompro account: discovery and
// reconciliation, background sync tasks (event stream consumer and both
// pollers), command dispatch, and graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use freedompro_api::{DeviceDescriptor, EventStreamHandle, FreedomproClient};

use crate::config::{BridgeConfig, DeviceSource};
use crate::dispatch::CommandDispatcher;
use crate::error::CoreError;
use crate::host::AccessoryHost;
use crate::model::{CompositeId, LocalAccessory};
use crate::poll::{accessory_poll_task, global_poll_task, poll_accessories_once, poll_all_once};
use crate::reconcile::ReconcileReport;
use crate::registry::Registry;
use crate::state::{StateCache, StateEntry};
use crate::stream::event_consumer_task;
use crate::sync::SyncContext;

// ── Bridge ───────────────────────────────────────────────────────────

/// The main entry point for embedding the bridge.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Manages the Freedompro client,
/// the registry and state cache, and the background sync tasks.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    client: FreedomproClient,
    ctx: SyncContext,
    dispatcher: CommandDispatcher,
    cancel: CancellationToken,
    started: AtomicBool,
    /// Event stream handle (set on start if the stream is enabled).
    stream: OnceLock<EventStreamHandle>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Create a bridge from configuration. Does NOT contact the cloud;
    /// call [`start()`](Self::start) to discover accessories and begin syncing.
    pub fn new(config: BridgeConfig, host: Arc<dyn AccessoryHost>) -> Result<Self, CoreError> {
        let client = FreedomproClient::new(&config.base_url, &config.api_key, &config.transport())?;
        Ok(Self::with_client(config, client, host))
    }

    /// Create a bridge around an already built client.
    ///
    /// `config.base_url`, `api_key` and transport settings are not used.
    pub fn with_client(
        config: BridgeConfig,
        client: FreedomproClient,
        host: Arc<dyn AccessoryHost>,
    ) -> Self {
        let registry = Arc::new(Registry::new());
        let cache = Arc::new(StateCache::new());
        let dispatcher =
            CommandDispatcher::new(client.clone(), Arc::clone(&registry), Arc::clone(&cache));

        Self {
            inner: Arc::new(BridgeInner {
                config,
                client,
                ctx: SyncContext {
                    registry,
                    cache,
                    host,
                },
                dispatcher,
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                stream: OnceLock::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &FreedomproClient {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Load restored accessories, discover and reconcile remote ones, then
    /// spawn the background sync tasks.
    ///
    /// A failed discovery is logged, not returned: the bridge keeps running
    /// with whatever the host restored. Only a second call fails.
    pub async fn start(&self) -> Result<ReconcileReport, CoreError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::AlreadyStarted);
        }

        let restored = self.inner.ctx.load_restored();
        debug!(restored, "loaded accessories from host cache");

        let report = match self.discover_remote().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "device discovery failed, continuing with cached accessories");
                ReconcileReport::default()
            }
        };

        self.spawn_tasks().await;

        info!(
            created = report.created,
            restored = report.restored,
            accessories = self.inner.ctx.registry.len(),
            "bridge started"
        );
        Ok(report)
    }

    /// Load restored accessories, then fetch and reconcile the remote
    /// device list once. Safe to repeat.
    pub async fn discover(&self) -> Result<ReconcileReport, CoreError> {
        self.inner.ctx.load_restored();
        self.discover_remote().await
    }

    /// Reconcile an already fetched device list.
    pub fn reconcile(&self, devices: &[DeviceDescriptor]) -> ReconcileReport {
        self.inner.ctx.reconcile(devices)
    }

    /// Cancel all background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(stream) = self.inner.stream.get() {
            stream.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        info!("bridge stopped");
    }

    async fn discover_remote(&self) -> Result<ReconcileReport, CoreError> {
        let devices = self.fetch_devices().await?;
        debug!(
            devices = devices.len(),
            source = %self.inner.config.device_source,
            "fetched device list"
        );
        Ok(self.inner.ctx.reconcile(&devices))
    }

    /// Fetch the remote device list from the configured source.
    ///
    /// Legacy accessories come back as one pseudo-device each.
    pub async fn fetch_devices(&self) -> Result<Vec<DeviceDescriptor>, CoreError> {
        let client = &self.inner.client;
        let devices = match self.inner.config.device_source {
            DeviceSource::Devices => client.list_devices().await?,
            DeviceSource::Accessories => client
                .list_accessories()
                .await?
                .into_iter()
                .map(freedompro_api::AccessoryDescriptor::into_legacy_device)
                .collect(),
        };
        Ok(devices)
    }

    async fn spawn_tasks(&self) {
        let config = &self.inner.config;
        let mut handles = self.inner.task_handles.lock().await;

        if config.stream_enabled {
            let stream = EventStreamHandle::spawn(
                self.inner.client.clone(),
                config.reconnect.clone(),
                self.inner.cancel.child_token(),
            );
            let rx = stream.subscribe();
            let _ = self.inner.stream.set(stream);
            handles.push(tokio::spawn(event_consumer_task(
                self.inner.ctx.clone(),
                rx,
                self.inner.cancel.clone(),
            )));
        }

        if !config.accessory_poll_interval.is_zero() {
            handles.push(tokio::spawn(accessory_poll_task(
                self.inner.client.clone(),
                self.inner.ctx.clone(),
                config.accessory_poll_interval,
                self.inner.cancel.clone(),
            )));
        }

        if !config.global_poll_interval.is_zero() {
            handles.push(tokio::spawn(global_poll_task(
                self.inner.client.clone(),
                self.inner.ctx.clone(),
                config.global_poll_interval,
                self.inner.cancel.clone(),
            )));
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Switch an accessory via the cloud and cache the new value.
    pub async fn set_state(&self, composite_id: &CompositeId, on: bool) -> Result<(), CoreError> {
        self.inner.dispatcher.set_state(composite_id, on).await
    }

    /// Cached on/off value of an accessory. Never touches the network.
    pub fn get_state(&self, composite_id: &CompositeId) -> Result<bool, CoreError> {
        self.inner.dispatcher.get_state(composite_id)
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.inner.dispatcher
    }

    // ── One-shot polls ───────────────────────────────────────────

    /// Run one per-accessory poll round now. Returns updated count.
    pub async fn poll_accessories(&self) -> usize {
        poll_accessories_once(&self.inner.client, &self.inner.ctx).await
    }

    /// Run one global poll round now. Returns updated count.
    pub async fn poll_all(&self) -> Result<usize, CoreError> {
        poll_all_once(&self.inner.client, &self.inner.ctx).await
    }

    // ── Snapshots ────────────────────────────────────────────────

    pub fn accessories(&self) -> Vec<Arc<LocalAccessory>> {
        self.inner.ctx.registry.snapshot()
    }

    pub fn state(&self, uuid: &Uuid) -> Option<StateEntry> {
        self.inner.ctx.cache.entry(uuid)
    }

    pub fn states(&self) -> Vec<(Uuid, StateEntry)> {
        self.inner.ctx.cache.snapshot()
    }

    /// Event stream reconnects so far, or `None` if the stream is not running.
    pub fn stream_reconnects(&self) -> Option<u64> {
        self.inner.stream.get().map(EventStreamHandle::reconnect_count)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.ctx.registry
    }

    pub fn cache(&self) -> &Arc<StateCache> {
        &self.inner.ctx.cache
    }
}
