// Transport abstraction and the reqwest-backed implementation.
//
// The engine never touches reqwest directly: it hands an `ApiRequest` to an
// `HttpTransport` and gets `{status, data}` back, and opens the event channel
// through a `StreamTransport`. `ReqwestTransport` implements both; tests
// substitute an in-memory spy.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::TryStreamExt;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::eventstream::SseDecoder;

/// Header names whose values are redacted from `Debug` output.
const SENSITIVE_HEADERS: &[&str] = &["hue-application-key", "authorization"];

const USER_AGENT: &str = concat!("huesync/", env!("CARGO_PKG_VERSION"));

// ── Request / response ───────────────────────────────────────────────

/// HTTP verb for an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A fully addressed request: target URL, headers, certificate policy,
/// optional JSON body.
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub verify_tls: bool,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            verify_tls: true,
            body: None,
        }
    }

    /// The URL with the application key masked. Legacy paths carry the key
    /// as the segment after a leading `/api` or `/bridge`.
    pub fn redacted_url(&self) -> String {
        let mut segments = self.url.path_segments().into_iter().flatten();
        let root = segments.next();
        let key = segments.next().filter(|k| !k.is_empty());
        match (root, key) {
            (Some(root @ ("api" | "bridge")), Some(key)) => self.url.as_str().replacen(
                &format!("/{root}/{key}"),
                &format!("/{root}/<redacted>"),
                1,
            ),
            _ => self.url.to_string(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let shown = if SENSITIVE_HEADERS.contains(&k.to_ascii_lowercase().as_str()) {
                    "<redacted>"
                } else {
                    v.as_str()
                };
                (k.as_str(), shown)
            })
            .collect();

        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.redacted_url())
            .field("headers", &headers)
            .field("verify_tls", &self.verify_tls)
            .field("body", &self.body)
            .finish()
    }
}

/// Status code plus the decoded body. Empty bodies decode to `Value::Null`,
/// non-JSON bodies to `Value::String`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

/// Raw frame payloads from the event channel.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

// ── Transport traits ─────────────────────────────────────────────────

/// Request/response half of the transport.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error>;
}

/// Streaming half of the transport.
///
/// A resolved `connect` is the "open" signal; each stream item is one data
/// frame; an `Err` item or the end of the stream is the "error" signal.
/// Dropping the returned stream closes the connection.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self, request: ApiRequest) -> Result<FrameStream, Error>;
}

// ── TransportConfig ──────────────────────────────────────────────────

/// TLS verification mode for requests that ask for verification.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate, even when a request asks for verification.
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client`.
    ///
    /// `verify` selects between the configured TLS mode and a relaxed client
    /// for self-signed bridge certificates. Streaming clients get no overall
    /// timeout since the body never completes.
    pub fn build_client(&self, verify: bool, streaming: bool) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT);

        if !streaming {
            builder = builder.timeout(self.timeout);
        }

        let tls = if verify {
            &self.tls
        } else {
            &TlsMode::DangerAcceptInvalid
        };

        match tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

// ── ReqwestTransport ─────────────────────────────────────────────────

/// Production transport over reqwest.
///
/// Holds four clients (strict/relaxed × request/stream) so a request's
/// `verify_tls` flag can be honoured without rebuilding a client per call.
#[derive(Clone)]
pub struct ReqwestTransport {
    strict: reqwest::Client,
    relaxed: reqwest::Client,
    stream_strict: reqwest::Client,
    stream_relaxed: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            strict: config.build_client(true, false)?,
            relaxed: config.build_client(false, false)?,
            stream_strict: config.build_client(true, true)?,
            stream_relaxed: config.build_client(false, true)?,
        })
    }

    /// Wrap a single pre-built client for every mode (tests, custom setups).
    pub fn from_reqwest(http: reqwest::Client) -> Self {
        Self {
            strict: http.clone(),
            relaxed: http.clone(),
            stream_strict: http.clone(),
            stream_relaxed: http,
        }
    }

    fn builder(&self, request: &ApiRequest, streaming: bool) -> reqwest::RequestBuilder {
        let client = match (request.verify_tls, streaming) {
            (true, false) => &self.strict,
            (false, false) => &self.relaxed,
            (true, true) => &self.stream_strict,
            (false, true) => &self.stream_relaxed,
        };

        let mut builder = client.request(request.method.as_reqwest(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        debug!("{} {}", request.method, request.redacted_url());

        // reqwest errors embed the URL, which may carry the key.
        let resp = self
            .builder(&request, false)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(reqwest::Error::without_url)?;

        let data = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };

        Ok(ApiResponse { status, data })
    }
}

#[async_trait]
impl StreamTransport for ReqwestTransport {
    async fn connect(&self, request: ApiRequest) -> Result<FrameStream, Error> {
        debug!("STREAM {}", request.redacted_url());

        let resp = self
            .builder(&request, true)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::StreamConnect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::StreamConnect(format!("HTTP {status}")));
        }

        let bytes = resp
            .bytes_stream()
            .map_err(|e| Error::StreamInterrupted(e.to_string()));

        Ok(Box::pin(SseDecoder::new(bytes)))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_credentials() {
        let req = ApiRequest::new(Method::Get, Url::parse("https://bridge.local/x").unwrap())
            .header("hue-application-key", "super-secret")
            .header("Authorization", "Bearer token-123")
            .header("X-Trace", "visible");

        let rendered = format!("{req:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("token-123"));
        assert!(rendered.contains("visible"));
    }

    #[test]
    fn legacy_paths_hide_the_application_key() {
        let local = ApiRequest::new(
            Method::Put,
            Url::parse("https://bridge.local/api/super-secret/lights/1/state").unwrap(),
        );
        assert_eq!(
            local.redacted_url(),
            "https://bridge.local/api/<redacted>/lights/1/state"
        );
        assert!(!format!("{local:?}").contains("super-secret"));

        let remote = ApiRequest::new(
            Method::Put,
            Url::parse("https://relay.example/bridge/super-secret/groups/1/action").unwrap(),
        );
        assert!(!format!("{remote:?}").contains("super-secret"));

        let clip = ApiRequest::new(
            Method::Get,
            Url::parse("https://bridge.local/clip/v2/resource/bridge/B1").unwrap(),
        );
        assert_eq!(clip.redacted_url(), "https://bridge.local/clip/v2/resource/bridge/B1");
    }

    #[test]
    fn request_builder_defaults_to_verified_tls() {
        let req = ApiRequest::new(Method::Put, Url::parse("https://bridge.local/x").unwrap());
        assert!(req.verify_tls);
        assert!(req.body.is_none());
        assert!(!req.verify_tls(false).verify_tls);
    }

    #[test]
    fn method_display() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(Method::Get.as_reqwest(), reqwest::Method::GET);
    }
}
