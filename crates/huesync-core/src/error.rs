// ── Core error types ──
//
// User-facing errors from huesync-core. Consumers never see reqwest errors
// or raw envelopes; the `From<huesync_api::Error>` impl sorts wire failures
// into transport, protocol, and internal kinds.

use thiserror::Error;

use crate::model::ResourceIdentity;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// Connect/stream-level failure. Recovered by the reconnect loop when
    /// it happens on the event stream.
    #[error("Transport error: {message}")]
    Transport { message: String },

    // ── Protocol errors ──────────────────────────────────────────────
    /// The bridge answered with a status from the error-code table.
    #[error("Bridge rejected request (HTTP {status}): {message}")]
    Protocol { status: u16, message: String },

    // ── Local misuse ─────────────────────────────────────────────────
    /// create() on an existing resource, update()/delete() on one that
    /// does not exist yet. Raised before any I/O.
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// A setter the resource cannot honour (missing capability or no
    /// legacy address).
    #[error("Operation not supported: {operation} on {resource}")]
    Unsupported { operation: String, resource: String },

    #[error("Resource not found: {identity}")]
    NotFound { identity: ResourceIdentity },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(operation: &str, resource: &ResourceIdentity) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            resource: resource.to_string(),
        }
    }

    /// HTTP status of a protocol rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<huesync_api::Error> for CoreError {
    fn from(err: huesync_api::Error) -> Self {
        use huesync_api::Error as Api;

        match err {
            Api::Transport(e) => match e.status() {
                Some(status) => CoreError::Protocol {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => CoreError::Transport {
                    message: e.to_string(),
                },
            },
            Api::Tls(message) => CoreError::Transport {
                message: format!("TLS error: {message}"),
            },
            Api::StreamConnect(reason) => CoreError::Transport {
                message: format!("event stream connection failed: {reason}"),
            },
            Api::StreamInterrupted(reason) => CoreError::Transport {
                message: format!("event stream interrupted: {reason}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::InvalidHeader { name, reason } => CoreError::Config {
                message: format!("Invalid header {name}: {reason}"),
            },
            Api::Protocol { status, message } => CoreError::Protocol { status, message },
            Api::Legacy {
                kind,
                address,
                description,
                status,
            } => match status {
                Some(status) => CoreError::Protocol {
                    status,
                    message: format!("{description} ({address})"),
                },
                None => CoreError::Internal(format!(
                    "legacy error type {kind} at {address}: {description}"
                )),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_keep_status() {
        let err: CoreError = huesync_api::Error::Protocol {
            status: 429,
            message: "slow down".into(),
        }
        .into();
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn legacy_errors_become_protocol_errors() {
        let err: CoreError = huesync_api::Error::Legacy {
            kind: 3,
            address: "/lights/9".into(),
            description: "resource not available".into(),
            status: Some(404),
        }
        .into();
        assert!(
            matches!(err, CoreError::Protocol { status: 404, ref message } if message.contains("/lights/9")),
            "got: {err:?}"
        );
    }

    #[test]
    fn stream_failures_are_transport_errors() {
        let err: CoreError = huesync_api::Error::StreamConnect("HTTP 503".into()).into();
        assert!(matches!(err, CoreError::Transport { .. }));
    }
}
