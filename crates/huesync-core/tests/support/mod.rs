#![allow(dead_code, clippy::unwrap_used)]
// In-memory transport for driving a `Bridge` without a network.
//
// Records every request, serves a fixed snapshot for the full-resource
// GET, pops scripted responses for everything else, and feeds stream
// frames through a channel per scripted session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use url::Url;

use huesync_api::{ApiRequest, ApiResponse, Error, FrameStream, HttpTransport, Method, StreamTransport};
use huesync_core::{Bridge, BridgeConfig, Notification, ReconnectPolicy};

pub type FrameSender = mpsc::UnboundedSender<Result<String, Error>>;

#[derive(Default)]
pub struct Spy {
    requests: Mutex<Vec<ApiRequest>>,
    snapshot: Mutex<Vec<Value>>,
    snapshot_failure: Mutex<Option<u16>>,
    responses: Mutex<VecDeque<ApiResponse>>,
    sessions: Mutex<VecDeque<UnboundedReceiverStream<Result<String, Error>>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Spy {
    pub fn new(snapshot: Vec<Value>) -> Arc<Self> {
        let spy = Arc::new(Self::default());
        spy.set_snapshot(snapshot);
        spy
    }

    pub fn set_snapshot(&self, snapshot: Vec<Value>) {
        *self.snapshot.lock() = snapshot;
    }

    /// Answer every snapshot GET with `status` and no body.
    pub fn fail_snapshot(&self, status: Option<u16>) {
        *self.snapshot_failure.lock() = status;
    }

    /// Queue the response for the next non-snapshot request.
    pub fn respond(&self, status: u16, data: Value) {
        self.responses.lock().push_back(ApiResponse { status, data });
    }

    /// Script one stream session; frames sent on the returned channel are
    /// delivered in order, dropping it ends the session.
    pub fn open_session(&self) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().push_back(UnboundedReceiverStream::new(rx));
        tx
    }

    /// Hold every mutating request after it is recorded until
    /// [`release`](Self::release).
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(1024);
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_of(&self, method: Method) -> Vec<ApiRequest> {
        self.requests().into_iter().filter(|r| r.method == method).collect()
    }

    /// Yield until `count` requests with `method` have been recorded.
    pub async fn wait_for_requests(&self, method: Method, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.requests_of(method).len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}

#[async_trait]
impl HttpTransport for Spy {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let is_snapshot =
            request.method == Method::Get && request.url.path().ends_with("/clip/v2/resource");
        self.requests.lock().push(request);

        if is_snapshot {
            if let Some(status) = *self.snapshot_failure.lock() {
                return Ok(ApiResponse { status, data: Value::Null });
            }
            let data = self.snapshot.lock().clone();
            return Ok(ApiResponse {
                status: 200,
                data: json!({"errors": [], "data": data}),
            });
        }

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }

        Ok(self.responses.lock().pop_front().unwrap_or(ApiResponse {
            status: 200,
            data: json!({"errors": [], "data": []}),
        }))
    }
}

#[async_trait]
impl StreamTransport for Spy {
    async fn connect(&self, _request: ApiRequest) -> Result<FrameStream, Error> {
        match self.sessions.lock().pop_front() {
            Some(frames) => Ok(Box::pin(frames)),
            None => Err(Error::StreamConnect("connection refused".into())),
        }
    }
}

// ── Bridge construction ─────────────────────────────────────────────

pub fn config(stream_enabled: bool) -> BridgeConfig {
    let mut config = BridgeConfig::new(
        Url::parse("https://10.0.0.2").unwrap(),
        SecretString::from("test-key"),
    );
    config.stream_enabled = stream_enabled;
    config.reconnect = ReconnectPolicy {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_retries: Some(3),
    };
    config
}

pub fn bridge(spy: &Arc<Spy>, config: BridgeConfig) -> Bridge {
    Bridge::with_transport(config, spy.clone(), spy.clone())
}

/// Bridge connected to `spy` with the event stream off.
pub async fn connected(spy: &Arc<Spy>) -> Bridge {
    let bridge = bridge(spy, config(false));
    bridge.connect().await.unwrap();
    bridge
}

// ── Notifications ───────────────────────────────────────────────────

/// Receive until `done` matches, then drain whatever is already queued.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<Arc<Notification>>,
    done: impl Fn(&Notification) -> bool,
) -> Vec<Notification> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let n = rx.recv().await.unwrap();
            let finished = done(&n);
            seen.push((*n).clone());
            if finished {
                break;
            }
        }
    })
    .await
    .unwrap();
    while let Ok(n) = rx.try_recv() {
        seen.push((*n).clone());
    }
    seen
}

pub fn drain(rx: &mut broadcast::Receiver<Arc<Notification>>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(n) = rx.try_recv() {
        seen.push((*n).clone());
    }
    seen
}

pub fn count(seen: &[Notification], wanted: &Notification) -> usize {
    seen.iter().filter(|n| *n == wanted).count()
}

// ── Fixtures ────────────────────────────────────────────────────────

/// A room with one white-ambiance bulb, its grouped light, a scene, a
/// motion sensor, and the bridge device. Documents are deliberately
/// unordered.
pub fn home() -> Vec<Value> {
    vec![
        json!({
            "id": "L1", "id_v1": "/lights/1", "type": "light",
            "owner": {"rid": "D1", "rtype": "device"},
            "metadata": {"name": "Desk", "archetype": "desk_lamp"},
            "on": {"on": true},
            "dimming": {"brightness": 80.0, "min_dim_level": 0.2},
            "color_temperature": {"mirek": 366, "mirek_schema": {"mirek_minimum": 153, "mirek_maximum": 454}}
        }),
        json!({
            "id": "R1", "id_v1": "/groups/1", "type": "room",
            "metadata": {"name": "Office", "archetype": "office"},
            "children": [{"rid": "D1", "rtype": "device"}, {"rid": "D2", "rtype": "device"}],
            "services": [{"rid": "G1", "rtype": "grouped_light"}]
        }),
        json!({
            "id": "D1", "type": "device",
            "metadata": {"name": "Desk lamp", "archetype": "desk_lamp"},
            "product_data": {"model_id": "LTW001"},
            "services": [
                {"rid": "L1", "rtype": "light"},
                {"rid": "Z1", "rtype": "zigbee_connectivity"},
                {"rid": "P1", "rtype": "device_power"}
            ]
        }),
        json!({"id": "Z1", "type": "zigbee_connectivity", "owner": {"rid": "D1", "rtype": "device"}, "status": "connected"}),
        json!({"id": "P1", "type": "device_power", "owner": {"rid": "D1", "rtype": "device"}, "power_state": {"battery_level": 100}}),
        json!({
            "id": "G1", "id_v1": "/groups/1", "type": "grouped_light",
            "owner": {"rid": "R1", "rtype": "room"},
            "on": {"on": true}, "dimming": {"brightness": 80.0}
        }),
        json!({
            "id": "S1", "id_v1": "/scenes/abc", "type": "scene",
            "metadata": {"name": "Read"},
            "group": {"rid": "R1", "rtype": "room"},
            "actions": [{"target": {"rid": "L1", "rtype": "light"}, "action": {"on": {"on": true}}}]
        }),
        json!({
            "id": "D2", "type": "device",
            "metadata": {"name": "Hall sensor", "archetype": "unknown_archetype"},
            "services": [{"rid": "M1", "rtype": "motion"}]
        }),
        json!({
            "id": "M1", "id_v1": "/sensors/5", "type": "motion",
            "owner": {"rid": "D2", "rtype": "device"},
            "enabled": true,
            "motion": {"motion": false},
            "sensitivity": {"sensitivity": 2, "sensitivity_max": 4}
        }),
        json!({
            "id": "BD", "type": "device",
            "metadata": {"name": "Bridge", "archetype": "bridge_v2"},
            "services": [{"rid": "B1", "rtype": "bridge"}]
        }),
        json!({"id": "B1", "type": "bridge", "owner": {"rid": "BD", "rtype": "device"}, "bridge_id": "001788fffe000000"}),
    ]
}
