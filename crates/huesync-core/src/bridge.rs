// ── Bridge abstraction ──
//
// Full lifecycle management for one bridge connection: snapshot
// ingestion, the event stream consumer with its reconnect loop, and the
// notification fan-out. Mutations live in `crate::mutation` as further
// `impl Bridge` blocks.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use huesync_api::eventstream::{calculate_backoff, parse_frame};
use huesync_api::{
    ClipClient, Endpoint, EventStreamClient, HttpTransport, LegacyClient, ReconnectConfig,
    ReqwestTransport, StreamEventKind, StreamTransport, TransportConfig,
};

use crate::batch::EventBatch;
use crate::config::BridgeConfig;
use crate::draft::ResourceDraft;
use crate::error::CoreError;
use crate::handle::ResourceHandle;
use crate::model::{Category, DeviceKind, ResourceIdentity, ResourceType};
use crate::notify::Notification;
use crate::store::ingest::{self, observed_kind};
use crate::store::{IngestSummary, Registry};
use crate::stream::{NotificationFilter, NotificationStream};

const NOTIFICATION_CHANNEL_SIZE: usize = 1024;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// `close()` was called.
    Closed,
    /// The reconnect budget ran out.
    Failed,
}

// ── Bridge ───────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Every [`ResourceHandle`] holds
/// a clone, so handles stay valid for as long as they are kept.
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

pub(crate) struct BridgeInner {
    pub(crate) config: BridgeConfig,
    pub(crate) clip: ClipClient,
    pub(crate) legacy: LegacyClient,
    events: EventStreamClient,
    pub(crate) registry: RwLock<Registry>,
    connection_state: watch::Sender<ConnectionState>,
    notify_tx: broadcast::Sender<Arc<Notification>>,
    session: Mutex<Option<Session>>,
}

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BridgeInner {
    pub(crate) fn batch(&self) -> EventBatch {
        EventBatch::new(self.notify_tx.clone())
    }

    fn emit(&self, notification: Notification) {
        let _ = self.notify_tx.send(Arc::new(notification));
    }

    fn set_state(&self, state: ConnectionState) {
        self.connection_state.send_replace(state);
    }
}

impl Bridge {
    /// Create a bridge backed by the reqwest transport. Does NOT connect;
    /// call [`connect()`](Self::connect) to fetch the snapshot and open
    /// the event stream.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let transport = Arc::new(ReqwestTransport::new(&TransportConfig {
            tls: config.tls.strict_mode(),
            timeout: config.timeout,
            ..TransportConfig::default()
        })?);
        Ok(Self::with_transport(config, transport.clone(), transport))
    }

    /// Create a bridge over caller-supplied transports.
    pub fn with_transport(
        config: BridgeConfig,
        http: Arc<dyn HttpTransport>,
        stream: Arc<dyn StreamTransport>,
    ) -> Self {
        let endpoint = endpoint_for(&config);
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);

        Self {
            inner: Arc::new(BridgeInner {
                clip: ClipClient::new(http.clone(), endpoint.clone()),
                legacy: LegacyClient::new(http, endpoint.clone()),
                events: EventStreamClient::new(stream, endpoint),
                config,
                registry: RwLock::new(Registry::new()),
                connection_state,
                notify_tx,
                session: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Fetch the snapshot, build the graph, and (when enabled) start the
    /// event stream consumer.
    ///
    /// A failed snapshot leaves the registry as it was, emits
    /// `ConnectionError`, and is returned to the caller.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.set_state(ConnectionState::Connecting);

        let summary = match self.refresh_resources().await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Initial snapshot failed");
                self.inner.emit(Notification::ConnectionError {
                    message: e.to_string(),
                });
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        if self.inner.config.stream_enabled {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(stream_loop(self.clone(), cancel.clone()));
            let previous = self.inner.session.lock().replace(Session { cancel, handle });
            if let Some(previous) = previous {
                previous.cancel.cancel();
            }
        } else {
            self.inner.set_state(ConnectionState::Connected);
            self.inner.emit(Notification::Connected);
        }

        info!(resources = summary.documents, "Connected to bridge");
        Ok(())
    }

    /// Stop the event stream and cancel any pending reconnect. No further
    /// attempts are made until the next `connect()`.
    pub async fn close(&self) {
        let session = self.inner.session.lock().take();
        if let Some(session) = session {
            session.cancel.cancel();
            let _ = session.handle.await;
        }
        self.inner.set_state(ConnectionState::Closed);
        self.inner.emit(Notification::Disconnected);
        debug!("Bridge closed");
    }

    /// Connect with the event stream disabled, run `f`, close.
    pub async fn oneshot<F, Fut, T>(config: BridgeConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Bridge) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.stream_enabled = false;

        let bridge = Bridge::new(cfg)?;
        bridge.connect().await?;
        let result = f(bridge.clone()).await;
        bridge.close().await;
        result
    }

    /// Re-fetch the full snapshot and reconcile: everything in it is
    /// ingested, everything missing is swept. Nothing is touched when the
    /// fetch fails.
    pub async fn refresh_resources(&self) -> Result<IngestSummary, CoreError> {
        let docs = self.inner.clip.get_resources().await?;

        let summary = {
            let mut batch = self.inner.batch();
            let mut registry = self.inner.registry.write();
            registry.mark_all_dead();
            let summary = ingest::ingest(&mut registry, docs, &mut batch);
            registry.sweep(&mut batch);
            summary
        };
        Ok(summary)
    }

    // ── Event dispatch ───────────────────────────────────────────────

    /// Apply one stream frame. All of its events share a single batch.
    pub(crate) fn dispatch_frame(&self, payload: &str) {
        let events = parse_frame(payload);
        if events.is_empty() {
            return;
        }

        let mut batch = self.inner.batch();
        let mut registry = self.inner.registry.write();

        for event in events {
            match event.kind {
                StreamEventKind::Update => apply_updates(&mut registry, &event.data, &mut batch),
                StreamEventKind::Add => {
                    ingest::ingest(&mut registry, event.data, &mut batch);
                }
                StreamEventKind::Delete => {
                    for doc in &event.data {
                        let Some(identity) = ResourceIdentity::from_document(doc) else {
                            continue;
                        };
                        if !registry.mark_dead(&identity) {
                            trace!(identity = %identity, "Delete for unknown resource");
                        }
                    }
                    registry.sweep(&mut batch);
                }
                StreamEventKind::Error => {
                    warn!(data = ?event.data, "Bridge reported an event stream error");
                }
                StreamEventKind::Unknown => {
                    debug!(id = ?event.id, "Ignoring event of unknown type");
                }
            }
        }
    }

    // ── Classification ───────────────────────────────────────────────

    /// Re-derive a device's kind from its current services, replacing the
    /// kind frozen at first ingestion.
    pub fn reclassify(&self, identity: &ResourceIdentity) -> Result<DeviceKind, CoreError> {
        if identity.category() != Category::Device {
            return Err(CoreError::unsupported("reclassify", identity));
        }
        let mut batch = self.inner.batch();
        let mut registry = self.inner.registry.write();

        let kind = observed_kind(&registry, identity).ok_or_else(|| CoreError::NotFound {
            identity: identity.clone(),
        })?;
        if let Some(device) = registry.get_mut(identity) {
            device.replace_device_kind(kind);
        }
        if kind == DeviceKind::Bridge {
            registry.set_bridge_device(identity.clone());
        }
        batch.changed(&registry, identity);
        info!(identity = %identity, kind = %kind, "Device reclassified");
        Ok(kind)
    }

    // ── State observation ────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Raw notification receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.notify_tx.subscribe()
    }

    pub fn notifications(&self, filter: NotificationFilter) -> NotificationStream {
        NotificationStream::new(self.inner.notify_tx.subscribe(), filter)
    }

    // ── Registry accessors ───────────────────────────────────────────

    /// Run `f` against the registry under a read lock.
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&self.inner.registry.read())
    }

    pub fn resource(&self, identity: &ResourceIdentity) -> Option<ResourceHandle> {
        self.inner
            .registry
            .read()
            .contains(identity)
            .then(|| ResourceHandle::new(self.clone(), identity.clone()))
    }

    pub fn resources(&self) -> Vec<ResourceHandle> {
        let identities: Vec<ResourceIdentity> =
            self.inner.registry.read().identities().cloned().collect();
        identities
            .into_iter()
            .map(|id| ResourceHandle::new(self.clone(), id))
            .collect()
    }

    pub fn resources_of(&self, rtype: &ResourceType) -> Vec<ResourceHandle> {
        let identities: Vec<ResourceIdentity> = self
            .inner
            .registry
            .read()
            .by_type(rtype)
            .into_iter()
            .map(|r| r.identity().clone())
            .collect();
        identities
            .into_iter()
            .map(|id| ResourceHandle::new(self.clone(), id))
            .collect()
    }

    /// The device carrying the bridge service.
    pub fn bridge_device(&self) -> Option<ResourceHandle> {
        let identity = self
            .inner
            .registry
            .read()
            .bridge_device()
            .map(|d| d.identity().clone())?;
        Some(ResourceHandle::new(self.clone(), identity))
    }

    // ── Drafts ───────────────────────────────────────────────────────

    /// A new scene for `group`, staged for `create()`.
    pub fn draft_scene(&self, group: &ResourceIdentity, name: &str) -> ResourceDraft {
        let draft = ResourceDraft::new(self.clone(), ResourceType::Scene, None);
        draft.stage(&serde_json::json!({
            "type": "scene",
            "metadata": {"name": name},
            "group": {"rid": group.id, "rtype": group.rtype.as_str()},
            "actions": [],
        }));
        draft
    }

    /// An empty draft. `legacy_collection` (e.g. `/groups`) enables
    /// legacy-protocol creation.
    pub fn draft(&self, rtype: impl Into<ResourceType>, legacy_collection: Option<&str>) -> ResourceDraft {
        ResourceDraft::new(self.clone(), rtype.into(), legacy_collection.map(str::to_owned))
    }
}

// ── Endpoint selection ───────────────────────────────────────────────

fn endpoint_for(config: &BridgeConfig) -> Endpoint {
    match &config.remote {
        Some(remote) => {
            if remote.is_expired(Utc::now()) {
                warn!(
                    expires_at = ?remote.expires_at,
                    "Remote access token has expired; requests will be rejected until it is refreshed"
                );
            }
            Endpoint::remote(
                remote.relay_url.clone(),
                config.app_key.clone(),
                remote.access_token.clone(),
            )
        }
        None => Endpoint::local(config.address.clone(), config.app_key.clone())
            .with_local_verification(config.tls.verifies_local()),
    }
}

// ── Update application ───────────────────────────────────────────────

fn apply_updates(registry: &mut Registry, deltas: &[Value], batch: &mut EventBatch) {
    for delta in deltas {
        let Some(identity) = ResourceIdentity::from_document(delta) else {
            continue;
        };
        if !registry.contains(&identity) {
            trace!(identity = %identity, "Ignoring update for unknown resource");
            continue;
        }

        batch.start(registry, &identity);
        if let Some(resource) = registry.get_mut(&identity) {
            resource.set_data(delta);
        }
        batch.changed(registry, &identity);

        if identity.rtype == ResourceType::Light {
            note_capability_drift(registry, &identity);
        }
    }
}

fn note_capability_drift(registry: &Registry, light: &ResourceIdentity) {
    let Some(device) = registry.get(light).and_then(|l| l.owner()) else {
        return;
    };
    let frozen = registry.get(device).and_then(|d| d.device_kind());
    let Some(frozen) = frozen else { return };
    let observed = observed_kind(registry, device);
    if let Some(observed) = observed.filter(|o| *o != frozen) {
        debug!(
            identity = %device,
            frozen = %frozen,
            observed = %observed,
            "Device capabilities changed; keeping original classification"
        );
    }
}

// ── Event stream consumer ────────────────────────────────────────────

enum SessionEnd {
    Cancelled,
    Failed { error: CoreError, was_open: bool },
}

/// Open the stream, read until it fails, back off, repeat.
async fn stream_loop(bridge: Bridge, cancel: CancellationToken) {
    let policy = ReconnectConfig::from(&bridge.inner.config.reconnect);
    let mut attempt: u32 = 0;
    let mut recovering = false;

    loop {
        let end = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            end = bridge.run_session(&cancel, recovering, &mut attempt) => end,
        };

        match end {
            SessionEnd::Cancelled => break,
            SessionEnd::Failed { error, was_open } => {
                warn!(error = %error, attempt, "Event stream error");
                bridge.inner.emit(Notification::ConnectionError {
                    message: error.to_string(),
                });
                if was_open {
                    bridge.inner.emit(Notification::Disconnected);
                }
                recovering = true;
            }
        }

        if let Some(max) = policy.max_retries.filter(|max| attempt >= *max) {
            error!(max_retries = max, "Event stream reconnection limit reached, giving up");
            bridge.inner.set_state(ConnectionState::Failed);
            bridge
                .inner
                .emit(Notification::ReconnectGaveUp { attempts: attempt });
            break;
        }

        let delay = calculate_backoff(attempt, &policy);
        attempt += 1;
        bridge
            .inner
            .set_state(ConnectionState::Reconnecting { attempt });
        bridge
            .inner
            .emit(Notification::ReconnectScheduled { attempt, delay });
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("Event stream loop exiting");
}

impl Bridge {
    /// One stream connection, from open to failure or cancellation.
    async fn run_session(
        &self,
        cancel: &CancellationToken,
        recovering: bool,
        attempt: &mut u32,
    ) -> SessionEnd {
        let mut frames = match self.inner.events.open().await {
            Ok(frames) => frames,
            Err(e) => {
                return SessionEnd::Failed {
                    error: e.into(),
                    was_open: false,
                };
            }
        };

        *attempt = 0;
        self.inner.set_state(ConnectionState::Connected);
        self.inner.emit(Notification::Connected);
        info!("Event stream open");

        if recovering {
            match self.refresh_resources().await {
                Ok(summary) => debug!(documents = summary.documents, "Resynchronised after reconnect"),
                Err(error) => {
                    return SessionEnd::Failed {
                        error,
                        was_open: true,
                    };
                }
            }
        }

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                frame = frames.next() => match frame {
                    Some(Ok(payload)) => self.dispatch_frame(&payload),
                    Some(Err(e)) => {
                        return SessionEnd::Failed { error: e.into(), was_open: true };
                    }
                    None => {
                        return SessionEnd::Failed {
                            error: CoreError::Transport {
                                message: "event stream closed by bridge".into(),
                            },
                            was_open: true,
                        };
                    }
                },
            }
        }
    }
}
