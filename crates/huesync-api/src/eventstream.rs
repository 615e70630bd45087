//! Server-sent event channel.
//!
//! The bridge pushes resource deltas on `/eventstream/clip/v2` as SSE. Each
//! `data:` payload is a JSON array of events:
//!
//! ```json
//! [{"creationtime": "...", "id": "...", "type": "update",
//!   "data": [{"id": "...", "type": "light", "on": {"on": false}}]}]
//! ```
//!
//! [`SseDecoder`] turns a raw byte stream into frame payloads, [`parse_frame`]
//! turns a payload into [`StreamEvent`]s, and [`calculate_backoff`] drives the
//! reconnect delay used by the engine's connection loop.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_core::Stream;
use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::transport::{FrameStream, Method, StreamTransport};

// ── StreamEvent ──────────────────────────────────────────────────────

/// Kind of a single stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventKind {
    Add,
    Update,
    Delete,
    Error,
    #[serde(other)]
    Unknown,
}

/// One event inside a frame: a kind and the resource deltas it carries.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub creationtime: Option<String>,
}

/// Parse one frame payload into its events.
///
/// Malformed frames are logged and yield nothing; a bad frame must never
/// take the connection down.
pub fn parse_frame(payload: &str) -> Vec<StreamEvent> {
    match serde_json::from_str::<Vec<StreamEvent>>(payload) {
        Ok(events) => events,
        Err(e) => {
            tracing::debug!(
                error = %e,
                payload = excerpt(payload, 200),
                "Failed to parse event frame"
            );
            Vec::new()
        }
    }
}

/// At most `max_chars` leading characters of `payload`.
fn excerpt(payload: &str, max_chars: usize) -> &str {
    payload
        .char_indices()
        .nth(max_chars)
        .map_or(payload, |(end, _)| &payload[..end])
}

// ── SseDecoder ───────────────────────────────────────────────────────

/// Stream adapter that turns SSE bytes into `data` payloads.
///
/// Buffers across chunk boundaries, joins multi-line `data:` fields with
/// `\n`, accepts `\n` and `\r\n` line endings, and skips comments plus the
/// `id:`/`event:`/`retry:` fields.
pub struct SseDecoder {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>,
    buffer: Vec<u8>,
    data: Option<String>,
    last_event_id: Option<String>,
    done: bool,
}

impl SseDecoder {
    pub fn new(byte_stream: impl Stream<Item = Result<Bytes, Error>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: Vec::new(),
            data: None,
            last_event_id: None,
            done: false,
        }
    }

    /// The last `id:` field seen on the stream.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Consume complete lines from the buffer until an event is dispatched.
    fn next_event(&mut self) -> Option<Result<String, Error>> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = match String::from_utf8(line) {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(Error::StreamInterrupted(format!(
                        "invalid UTF-8 in event stream: {e}"
                    ))));
                }
            };

            if line.is_empty() {
                if let Some(data) = self.data.take() {
                    return Some(Ok(data));
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_str(), ""),
            };

            match field {
                "data" => match self.data {
                    Some(ref mut data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => self.data = Some(value.to_owned()),
                },
                "id" => self.last_event_id = Some(value.to_owned()),
                _ => tracing::trace!(field, "Ignoring SSE field"),
            }
        }
        None
    }
}

impl Stream for SseDecoder {
    type Item = Result<String, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.next_event() {
                return Poll::Ready(Some(event));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    // A trailing event without its blank line still counts.
                    this.done = true;
                    if !this.buffer.is_empty() {
                        this.buffer.extend_from_slice(b"\n\n");
                    } else if this.data.is_some() {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for event stream reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
#[allow(clippy::cast_possible_wrap, clippy::as_conversions)]
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.min(30) as i32;
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── EventStreamClient ────────────────────────────────────────────────

/// Opens the bridge's event stream through a [`StreamTransport`].
#[derive(Clone)]
pub struct EventStreamClient {
    transport: Arc<dyn StreamTransport>,
    endpoint: Endpoint,
}

impl EventStreamClient {
    pub fn new(transport: Arc<dyn StreamTransport>, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// Connect and return the frame stream. Resolving is the "open" signal.
    pub async fn open(&self) -> Result<FrameStream, Error> {
        let url = self.endpoint.eventstream_url()?;
        tracing::info!(url = %url, "Connecting to event stream");
        let request = self.endpoint.clip_request(Method::Get, url);
        self.transport.connect(request).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────
