//! Config subcommand handlers. None of these touch the bridge.

use std::fmt::Write;

use dialoguer::{Input, Select};

use huesync_config::{Config, Defaults, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

/// Copy of `cfg` with every stored secret masked.
fn redacted(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, profile)| {
            let mut p = profile.clone();
            if p.app_key.is_some() {
                p.app_key = Some(MASK.into());
            }
            if let Some(ref mut remote) = p.remote {
                if remote.access_token.is_some() {
                    remote.access_token = Some(MASK.into());
                }
                if remote.refresh_token.is_some() {
                    remote.refresh_token = Some(MASK.into());
                }
            }
            (name.clone(), p)
        })
        .collect();

    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: Defaults {
            output: cfg.defaults.output.clone(),
            insecure: cfg.defaults.insecure,
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

fn format_config(cfg: &Config) -> String {
    let mut out = String::new();
    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out, "\n[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out, "\n[profiles.{name}]");
        let _ = writeln!(out, "bridge = \"{}\"", p.bridge);
        if let Some(ref key) = p.app_key {
            let _ = writeln!(out, "app_key = \"{key}\"");
        }
        if let Some(ref env) = p.app_key_env {
            let _ = writeln!(out, "app_key_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(retries) = p.max_retries {
            let _ = writeln!(out, "max_retries = {retries}");
        }
        if let Some(ref remote) = p.remote {
            let _ = writeln!(out, "remote.relay_url = \"{}\"", remote.relay_url);
            if let Some(ref expires) = remote.expires_at {
                let _ = writeln!(out, "remote.expires_at = \"{expires}\"");
            }
        }
    }
    out
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_app_key() -> Result<String, CliError> {
    let key = rpassword::prompt_password("Application key: ").map_err(prompt_err)?;
    if key.trim().is_empty() {
        return Err(CliError::Validation {
            field: "app_key".into(),
            reason: "application key cannot be empty".into(),
        });
    }
    Ok(key.trim().to_owned())
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => {
            let path = config::config_path();
            eprintln!("huesync configuration");
            eprintln!("   Config path: {}\n", path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let bridge: String = Input::new()
                .with_prompt("Bridge address")
                .default("https://192.168.1.2".into())
                .validate_with(|input: &String| -> Result<(), String> {
                    input
                        .parse::<url::Url>()
                        .map(|_| ())
                        .map_err(|e| format!("not a URL: {e}"))
                })
                .interact_text()
                .map_err(prompt_err)?;

            let key = prompt_app_key()?;
            let storage = Select::new()
                .with_prompt("Where to store the application key?")
                .items(&["System keyring (recommended)", "Config file (plaintext)"])
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            let app_key = if storage == 0 {
                config::store_app_key(&profile_name, &key)?;
                eprintln!("   Application key stored in the system keyring");
                None
            } else {
                Some(key)
            };

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(
                profile_name.clone(),
                Profile {
                    bridge,
                    app_key,
                    ..Profile::default()
                },
            );
            cfg.default_profile = Some(profile_name.clone());
            config::save_config(&cfg)?;

            eprintln!("\nConfiguration written to {}", path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("  Try it: huesync list --type room");
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
            names.sort();
            let lines: Vec<String> = names
                .into_iter()
                .map(|name| {
                    let marker = if name == active { "*" } else { " " };
                    format!("{marker} {name}\t{}", cfg.profiles[&name].bridge)
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
                available.sort();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: available.join(", "),
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("Default profile set to {name}");
            Ok(())
        }

        ConfigCommand::SetKey { profile } => {
            let cfg = config::load_config_or_default();
            let name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let key = prompt_app_key()?;
            config::store_app_key(&name, &key)?;
            eprintln!("Application key for {name} stored in the system keyring");
            Ok(())
        }
    }
}
