//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use huesync_core::{Bridge, Category, Resource, ResourceHandle, ResourceIdentity};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Connect with a spinner on interactive terminals.
pub async fn connect(bridge: &Bridge, global: &GlobalOpts) -> Result<(), CliError> {
    let spinner = (!global.quiet && std::io::stderr().is_terminal()).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Loading resources from {}", bridge.config().address));
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    });

    let result = bridge.connect().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    result.map_err(CliError::from)
}

/// Resolve `needle` (`type/id` or a name) to a live resource.
///
/// Names match case-insensitively. When several resources share a name
/// the most encompassing wins (a group over a device over a service), so
/// "Desk" picks the device rather than its light service.
pub fn resolve(bridge: &Bridge, needle: &str) -> Result<ResourceHandle, CliError> {
    resolve_where(bridge, needle, |_| true)
}

/// [`resolve`] restricted to resources accepted by `accept`.
pub fn resolve_where(
    bridge: &Bridge,
    needle: &str,
    accept: impl Fn(&Resource) -> bool,
) -> Result<ResourceHandle, CliError> {
    let by_identity = needle
        .parse::<ResourceIdentity>()
        .ok()
        .and_then(|identity| bridge.resource(&identity))
        .filter(|handle| {
            bridge.with_registry(|registry| {
                registry
                    .get(handle.identity())
                    .is_some_and(|r| r.exists() && accept(r))
            })
        });
    if let Some(handle) = by_identity {
        return Ok(handle);
    }

    let mut matches: Vec<(u8, ResourceIdentity)> = bridge.with_registry(|registry| {
        registry
            .iter()
            .filter(|r| r.exists() && accept(r))
            .filter(|r| r.name().is_some_and(|name| name.eq_ignore_ascii_case(needle)))
            .map(|r| (rank(r.category()), r.identity().clone()))
            .collect()
    });
    matches.sort();

    let best = matches.first().map(|(rank, _)| *rank);
    let top: Vec<ResourceIdentity> = matches
        .into_iter()
        .filter(|(rank, _)| Some(*rank) == best)
        .map(|(_, id)| id)
        .collect();

    match top.as_slice() {
        [] => Err(CliError::NotFound {
            identifier: needle.into(),
            list_hint: String::new(),
        }),
        [only] => bridge.resource(only).ok_or_else(|| CliError::NotFound {
            identifier: needle.into(),
            list_hint: String::new(),
        }),
        many => Err(CliError::Ambiguous {
            identifier: needle.into(),
            count: many.len(),
            candidates: many
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn rank(category: Category) -> u8 {
    match category {
        Category::Group => 0,
        Category::Device => 1,
        Category::Container => 2,
        Category::Service => 3,
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, global: &GlobalOpts) -> Result<bool, CliError> {
    if global.yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Report a completed change on stderr.
pub fn done(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}
