//! Configuration for the huesync tools.
//!
//! TOML profiles, credential resolution (env var, system keyring, then
//! plaintext) and translation into `huesync_core::BridgeConfig`. The CLI
//! layers its flag overrides on top of this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use huesync_core::{BridgeConfig, ReconnectPolicy, RemoteAccess, TlsVerification};

const KEYRING_SERVICE: &str = "huesync";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no application key configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named bridge profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named bridge profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Bridge address (e.g. "https://192.168.1.20").
    pub bridge: String,

    /// Application key (plaintext; prefer keyring or env var).
    pub app_key: Option<String>,

    /// Environment variable holding the application key.
    pub app_key_env: Option<String>,

    /// Path to the bridge's CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept any certificate.
    pub insecure: Option<bool>,

    /// Request timeout in seconds.
    pub timeout: Option<u64>,

    /// Event stream reconnect budget; unset retries forever.
    pub max_retries: Option<u32>,

    /// Reach the bridge through the remote relay.
    pub remote: Option<RemoteProfile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteProfile {
    pub relay_url: String,
    /// Access token (plaintext; prefer keyring or env var).
    pub access_token: Option<String>,
    pub access_token_env: Option<String>,
    /// RFC 3339 expiry of the access token.
    pub expires_at: Option<String>,
    pub refresh_token: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "huesync", "huesync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("huesync");
    p
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load from the canonical path merged with `HUESYNC_*` variables.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` merged with `HUESYNC_*` variables. Nested keys use a
/// double underscore: `HUESYNC_PROFILES__HOME__BRIDGE`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HUESYNC_").split("__"))
        .extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "Config loaded");
    Ok(config)
}

pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_secret(account: &str) -> Option<SecretString> {
    keyring::Entry::new(KEYRING_SERVICE, account)
        .and_then(|entry| entry.get_password())
        .ok()
        .map(SecretString::from)
}

/// Store the application key for `profile_name` in the system keyring.
pub fn store_app_key(profile_name: &str, key: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/app-key"))
        .and_then(|entry| entry.set_password(key))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Application key: `app_key_env`, then the keyring, then plaintext.
pub fn resolve_app_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(val) = profile
        .app_key_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Ok(SecretString::from(val));
    }
    if let Some(secret) = keyring_secret(&format!("{profile_name}/app-key")) {
        return Ok(secret);
    }
    profile
        .app_key
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

fn resolve_remote(remote: &RemoteProfile, profile_name: &str) -> Result<RemoteAccess, ConfigError> {
    let relay_url = parse_url("remote.relay_url", &remote.relay_url)?;

    let access_token = remote
        .access_token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .map(SecretString::from)
        .or_else(|| keyring_secret(&format!("{profile_name}/access-token")))
        .or_else(|| remote.access_token.clone().map(SecretString::from))
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let expires_at = remote
        .expires_at
        .as_deref()
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| ConfigError::Validation {
                    field: "remote.expires_at".into(),
                    reason: e.to_string(),
                })
        })
        .transpose()?;

    Ok(RemoteAccess {
        relay_url,
        access_token,
        expires_at,
        refresh_token: remote.refresh_token.clone().map(SecretString::from),
    })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// TLS policy for a profile. Bridges ship self-signed certificates, so
/// without a CA the relaxed mode is the only one that works locally.
pub fn tls_for(profile: &Profile) -> TlsVerification {
    match (&profile.ca_cert, profile.insecure.unwrap_or(false)) {
        (_, true) | (None, false) => TlsVerification::DangerAcceptInvalid,
        (Some(ca), false) => TlsVerification::CustomCa(ca.clone()),
    }
}

/// Build a `BridgeConfig` from a profile, with no flag overrides.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    let address = parse_url("bridge", &profile.bridge)?;
    let app_key = resolve_app_key(profile, profile_name)?;

    let mut config = BridgeConfig::new(address, app_key);
    config.tls = if defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        tls_for(profile)
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.reconnect = ReconnectPolicy {
        max_retries: profile.max_retries,
        ..ReconnectPolicy::default()
    };
    config.remote = profile
        .remote
        .as_ref()
        .map(|remote| resolve_remote(remote, profile_name))
        .transpose()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "home"

[defaults]
timeout = 12

[profiles.home]
bridge = "https://192.168.1.20"
app_key = "plain-key"
max_retries = 5

[profiles.away]
bridge = "https://192.168.1.20"
app_key = "plain-key"
ca_cert = "/etc/huesync/bridge-ca.pem"

[profiles.away.remote]
relay_url = "https://api.meethue.com"
access_token = "token"
expires_at = "2030-01-01T00:00:00Z"
"#;

    fn load(contents: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn profiles_load_with_defaults() {
        let cfg = load(SAMPLE);
        assert_eq!(cfg.default_profile.as_deref(), Some("home"));
        assert_eq!(cfg.defaults.timeout, 12);
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.profiles.len(), 2);
        assert_eq!(cfg.profiles["home"].max_retries, Some(5));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.profiles.is_empty());
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
    }

    #[test]
    fn profile_translates_to_bridge_config() {
        let cfg = load(SAMPLE);
        let bridge = profile_to_bridge_config(
            &cfg.profiles["away"],
            "huesync-test-away-profile",
            &cfg.defaults,
        )
        .unwrap();

        assert_eq!(bridge.address.as_str(), "https://192.168.1.20/");
        assert_eq!(
            bridge.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/huesync/bridge-ca.pem"))
        );
        assert_eq!(bridge.timeout, Duration::from_secs(12));
        assert_eq!(bridge.reconnect.max_retries, None);
        let remote = bridge.remote.unwrap();
        assert_eq!(remote.relay_url.as_str(), "https://api.meethue.com/");
        assert!(!remote.is_expired(DateTime::parse_from_rfc3339("2029-12-31T23:59:59Z").unwrap().with_timezone(&Utc)));
    }

    #[test]
    fn insecure_wins_over_ca() {
        let profile = Profile {
            bridge: "https://10.0.0.2".into(),
            ca_cert: Some(PathBuf::from("/ca.pem")),
            insecure: Some(true),
            ..Profile::default()
        };
        assert_eq!(tls_for(&profile), TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn bad_address_is_a_validation_error() {
        let profile = Profile {
            bridge: "not a url".into(),
            app_key: Some("k".into()),
            ..Profile::default()
        };
        let err = profile_to_bridge_config(&profile, "huesync-test-bad", &Defaults::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "bridge"));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                bridge: "https://10.0.0.2".into(),
                app_key_env: Some("HUE_KEY".into()),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["default"].bridge, "https://10.0.0.2");
        assert_eq!(loaded.profiles["default"].app_key_env.as_deref(), Some("HUE_KEY"));
    }
}
