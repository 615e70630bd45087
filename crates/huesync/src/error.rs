//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help
//! text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use huesync_config::ConfigError;
use huesync_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const RATE_LIMITED: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the bridge: {message}")]
    #[diagnostic(
        code(huesync::connection_failed),
        help(
            "Check that the bridge is powered and reachable on the network.\n\
             Bridges use self-signed certificates: try --insecure (-k) or set ca_cert."
        )
    )]
    ConnectionFailed { message: String },

    // ── Bridge rejections ────────────────────────────────────────────
    #[error("The bridge refused the application key (HTTP {status})")]
    #[diagnostic(
        code(huesync::auth_failed),
        help(
            "The key may have been removed from the bridge's whitelist.\n\
             Store a new one with: huesync config set-key"
        )
    )]
    AuthFailed { status: u16 },

    #[error("The bridge is rate limiting requests")]
    #[diagnostic(
        code(huesync::rate_limited),
        help("Wait a moment and retry; batch changes with `huesync light set`.")
    )]
    RateLimited,

    #[error("Bridge rejected request (HTTP {status}): {message}")]
    #[diagnostic(code(huesync::rejected))]
    Rejected { status: u16, message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Resource '{identifier}' not found")]
    #[diagnostic(
        code(huesync::not_found),
        help("Run: huesync list{list_hint} to see available resources")
    )]
    NotFound {
        identifier: String,
        list_hint: String,
    },

    #[error("'{identifier}' matches {count} resources")]
    #[diagnostic(
        code(huesync::ambiguous),
        help("Use the `type/id` form. Candidates: {candidates}")
    )]
    Ambiguous {
        identifier: String,
        count: usize,
        candidates: String,
    },

    #[error("{operation} is not supported by {resource}")]
    #[diagnostic(
        code(huesync::unsupported),
        help("Run: huesync show {resource} to see what it offers")
    )]
    Unsupported { operation: String, resource: String },

    #[error("{message}")]
    #[diagnostic(code(huesync::invalid_state))]
    InvalidState { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(huesync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No application key configured for profile '{profile}'")]
    #[diagnostic(
        code(huesync::no_credentials),
        help(
            "Store one with: huesync config set-key --profile {profile}\n\
             Or set HUESYNC_APP_KEY."
        )
    )]
    NoCredentials { profile: String },

    #[error("No bridge configured")]
    #[diagnostic(
        code(huesync::no_config),
        help(
            "Create a profile with: huesync config init\n\
             Or pass --bridge and --app-key. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(huesync::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(huesync::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(huesync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(huesync::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::InvalidState { .. } => exit_code::CONFLICT,
            Self::RateLimited => exit_code::RATE_LIMITED,
            Self::Validation { .. }
            | Self::Ambiguous { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport { message } => CliError::ConnectionFailed { message },

            CoreError::Protocol {
                status: status @ (401 | 403),
                ..
            } => CliError::AuthFailed { status },
            CoreError::Protocol { status: 429, .. } => CliError::RateLimited,
            CoreError::Protocol { status, message } => CliError::Rejected { status, message },

            CoreError::InvariantViolation { message } => CliError::InvalidState { message },

            CoreError::Unsupported {
                operation,
                resource,
            } => CliError::Unsupported {
                operation,
                resource,
            },

            CoreError::NotFound { identity } => CliError::NotFound {
                list_hint: format!(" --type {}", identity.rtype),
                identifier: identity.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "bridge".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use huesync_core::ResourceIdentity;

    use super::*;

    #[test]
    fn rejections_map_to_exit_codes() {
        let auth: CliError = CoreError::Protocol {
            status: 403,
            message: "forbidden".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let busy: CliError = CoreError::Protocol {
            status: 429,
            message: "slow down".into(),
        }
        .into();
        assert_eq!(busy.exit_code(), exit_code::RATE_LIMITED);

        let other: CliError = CoreError::Protocol {
            status: 507,
            message: "full".into(),
        }
        .into();
        assert!(matches!(other, CliError::Rejected { status: 507, .. }));
        assert_eq!(other.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn local_misuse_is_not_a_connection_error() {
        let err: CliError = CoreError::InvariantViolation {
            message: "resource was already created".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONFLICT);

        let err: CliError = CoreError::NotFound {
            identity: ResourceIdentity::new("scene", "S9"),
        }
        .into();
        assert!(matches!(err, CliError::NotFound { ref list_hint, .. } if list_hint == " --type scene"));
    }
}
