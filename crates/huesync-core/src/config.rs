// ── Runtime connection configuration ──
//
// These types describe *how* to reach a bridge. They carry credential data
// and connection tuning, but never touch disk. The CLI (or any other
// consumer) constructs a `BridgeConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use url::Url;

use huesync_api::{ReconnectConfig, TlsMode};

/// TLS verification strategy for direct (LAN) access.
///
/// Remote relay access always verifies certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file (e.g. the bridge's signing CA).
    CustomCa(PathBuf),
    /// Skip verification. Bridges ship self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    /// TLS mode for clients that verify. The relaxed client is always built
    /// separately, so "accept invalid" maps to the system store here.
    pub(crate) fn strict_mode(&self) -> TlsMode {
        match self {
            Self::SystemDefaults | Self::DangerAcceptInvalid => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        }
    }

    pub(crate) fn verifies_local(&self) -> bool {
        !matches!(self, Self::DangerAcceptInvalid)
    }
}

/// Remote relay credentials. Refreshing the token is somebody else's job;
/// the bridge only presents the current access token.
#[derive(Debug, Clone)]
pub struct RemoteAccess {
    pub relay_url: Url,
    pub access_token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<SecretString>,
}

impl RemoteAccess {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Event stream reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        let defaults = ReconnectConfig::default();
        Self {
            initial_delay: defaults.initial_delay,
            max_delay: defaults.max_delay,
            max_retries: defaults.max_retries,
        }
    }
}

impl From<&ReconnectPolicy> for ReconnectConfig {
    fn from(policy: &ReconnectPolicy) -> Self {
        Self {
            initial_delay: policy.initial_delay,
            max_delay: policy.max_delay,
            max_retries: policy.max_retries,
        }
    }
}

/// Configuration for one bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge address (e.g. `https://192.168.1.20`).
    pub address: Url,
    /// Application key (the whitelisted user).
    pub app_key: SecretString,
    /// Reach the bridge through the remote relay instead of the LAN.
    pub remote: Option<RemoteAccess>,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Open the event stream after the snapshot.
    pub stream_enabled: bool,
    pub reconnect: ReconnectPolicy,
}

impl BridgeConfig {
    pub fn new(address: Url, app_key: SecretString) -> Self {
        Self {
            address,
            app_key,
            remote: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            stream_enabled: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BridgeConfig::new(
            Url::parse("https://10.0.0.2").unwrap(),
            SecretString::from("key"),
        );
        assert!(config.stream_enabled);
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(config.reconnect.max_retries, None);
        assert!(!config.tls.verifies_local());
    }

    #[test]
    fn remote_expiry() {
        let now = Utc::now();
        let remote = RemoteAccess {
            relay_url: Url::parse("https://api.meethue.com").unwrap(),
            access_token: SecretString::from("t"),
            expires_at: Some(now - chrono::Duration::minutes(1)),
            refresh_token: None,
        };
        assert!(remote.is_expired(now));
    }
}
