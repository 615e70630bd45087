//! Thin wrapper over `huesync-config`: profile selection and CLI flag
//! overrides on top of the file-based configuration.

use std::time::Duration;

use secrecy::SecretString;

use huesync_config::{Config, Profile};
use huesync_core::{BridgeConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use huesync_config::{config_path, load_config_or_default, save_config, store_app_key};

pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `BridgeConfig` from the config file, the active profile and
/// the global flags. Flags win over the profile.
pub fn bridge_config(global: &GlobalOpts, stream_enabled: bool) -> Result<BridgeConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut config = match cfg.profiles.get(&profile_name) {
        Some(profile) => resolve_profile(profile, &profile_name, &cfg, global)?,
        None if global.profile.is_some() => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => from_flags(global, &profile_name)?,
    };

    if let Some(seconds) = global.timeout {
        config.timeout = Duration::from_secs(seconds);
    }
    config.stream_enabled = stream_enabled;
    Ok(config)
}

fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<BridgeConfig, CliError> {
    let mut effective = profile.clone();
    if let Some(ref bridge) = global.bridge {
        effective.bridge.clone_from(bridge);
    }
    if global.app_key.is_some() {
        effective.app_key.clone_from(&global.app_key);
    }

    let mut config =
        huesync_config::profile_to_bridge_config(&effective, profile_name, &cfg.defaults)?;
    // --app-key beats the env var and keyring entries the chain prefers.
    if let Some(ref key) = global.app_key {
        config.app_key = SecretString::from(key.clone());
    }
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    Ok(config)
}

/// No profile: everything comes from flags or `HUESYNC_*` variables.
fn from_flags(global: &GlobalOpts, profile_name: &str) -> Result<BridgeConfig, CliError> {
    let address = global.bridge.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let address: url::Url = address.parse().map_err(|_| CliError::Validation {
        field: "bridge".into(),
        reason: format!("invalid URL: {address}"),
    })?;
    let key = global
        .app_key
        .clone()
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.into(),
        })?;

    Ok(BridgeConfig::new(address, SecretString::from(key)))
}
