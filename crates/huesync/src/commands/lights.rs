//! Light command handlers.

use huesync_core::{AlertMode, Bridge, Category, CoreError, Resource, ResourceHandle};

use crate::cli::{GlobalOpts, LightArgs, LightCommand};
use crate::error::CliError;

use super::util;

/// Anything a light setter can be applied to: light services, groups, and
/// devices (which delegate to their light service).
fn light_target(r: &Resource) -> bool {
    r.identity().rtype.is_light_like()
        || matches!(r.category(), Category::Group | Category::Device)
}

fn resolve(bridge: &Bridge, target: &str) -> Result<ResourceHandle, CliError> {
    util::resolve_where(bridge, target, light_target)
}

fn describe(handle: &ResourceHandle) -> String {
    handle
        .name()
        .unwrap_or_else(|| handle.identity().to_string())
}

pub async fn handle(bridge: &Bridge, args: LightArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        LightCommand::On { target } => {
            let handle = resolve(bridge, &target)?;
            handle.set_on(true).await?;
            util::done(global, &format!("{} turned on", describe(&handle)));
            Ok(())
        }

        LightCommand::Off { target } => {
            let handle = resolve(bridge, &target)?;
            handle.set_on(false).await?;
            util::done(global, &format!("{} turned off", describe(&handle)));
            Ok(())
        }

        LightCommand::Set {
            target,
            on,
            brightness,
            mirek,
            xy,
        } => {
            if on.is_none() && brightness.is_none() && mirek.is_none() && xy.is_none() {
                return Err(CliError::Validation {
                    field: "set".into(),
                    reason: "nothing to change; pass --on, --brightness, --mirek or --xy".into(),
                });
            }
            let handle = resolve(bridge, &target)?;

            // One request per touched service instead of one per attribute.
            handle.prepare_update()?;
            let staged = stage(&handle, on, brightness, mirek, xy).await;
            if let Err(err) = staged {
                handle.cancel_update()?;
                return Err(err.into());
            }
            handle.update().await?;

            util::done(global, &format!("{} updated", describe(&handle)));
            Ok(())
        }

        LightCommand::Alert { target, mode } => {
            let mode: AlertMode = mode.parse().map_err(|_| CliError::Validation {
                field: "mode".into(),
                reason: format!("expected select, lselect or none, got {mode:?}"),
            })?;
            let handle = resolve(bridge, &target)?;
            handle.set_alert(mode).await?;
            util::done(global, &format!("Alert {mode} sent to {}", describe(&handle)));
            Ok(())
        }

        LightCommand::Rename { target, name } => {
            let handle = util::resolve(bridge, &target)?;
            // Resources without metadata still answer to the legacy name.
            match handle.set_name(&name).await {
                Err(CoreError::Unsupported { .. }) => handle.set_legacy_name(&name).await?,
                other => other?,
            }
            util::done(global, &format!("{} renamed to {name}", handle.identity()));
            Ok(())
        }
    }
}

async fn stage(
    handle: &ResourceHandle,
    on: Option<bool>,
    brightness: Option<f64>,
    mirek: Option<u16>,
    xy: Option<(f64, f64)>,
) -> Result<(), CoreError> {
    if let Some(on) = on {
        handle.set_on(on).await?;
    }
    if let Some(brightness) = brightness {
        handle.set_brightness(brightness).await?;
    }
    if let Some(mirek) = mirek {
        handle.set_color_temperature(mirek).await?;
    }
    if let Some((x, y)) = xy {
        handle.set_xy(x, y).await?;
    }
    Ok(())
}
