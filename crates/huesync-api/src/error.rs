use thiserror::Error;

/// Top-level error type for the `huesync-api` crate.
///
/// Covers every failure mode across the wire surfaces: transport, the
/// event stream, current-protocol and legacy-protocol rejections.
/// `huesync-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A header value could not be encoded (bad application key, etc.)
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    // ── Event stream ────────────────────────────────────────────────
    /// The stream handshake was refused or returned a non-success status.
    #[error("Event stream connection failed: {0}")]
    StreamConnect(String),

    /// The stream dropped mid-body or delivered undecodable bytes.
    #[error("Event stream interrupted: {0}")]
    StreamInterrupted(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// Current-protocol response carrying a status from the error-code table.
    #[error("Bridge rejected request (HTTP {status}): {message}")]
    Protocol { status: u16, message: String },

    /// Legacy-protocol embedded error object (`[{"error": {...}}]`).
    #[error("Legacy API error {kind} at {address}: {description}")]
    Legacy {
        kind: u16,
        address: String,
        description: String,
        /// HTTP-equivalent status mapped from `kind`, when known.
        status: Option<u16>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::StreamConnect(_) | Self::StreamInterrupted(_) => true,
            Self::Protocol { status, .. } => matches!(status, 429 | 503),
            _ => false,
        }
    }

    /// HTTP status carried by a protocol rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::Legacy { status, .. } => *status,
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the bridge answered "not found".
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
