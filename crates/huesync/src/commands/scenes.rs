//! Scene command handlers.

use serde::Serialize;
use serde_json::{Value, json};
use tabled::Tabled;

use huesync_core::{
    Bridge, Category, CreatedResource, LightState, ResourceHandle, ResourceIdentity, ResourceType,
    SceneView,
};

use crate::cli::{GlobalOpts, SceneArgs, SceneCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct SceneSummary {
    #[serde(flatten)]
    identity: ResourceIdentity,
    #[serde(flatten)]
    view: SceneView,
}

#[derive(Tabled)]
struct SceneRow {
    #[tabled(rename = "Scene")]
    identity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Actions")]
    actions: usize,
}

impl From<&SceneSummary> for SceneRow {
    fn from(s: &SceneSummary) -> Self {
        Self {
            identity: s.identity.to_string(),
            name: s.view.name.clone().unwrap_or_default(),
            group: s.view.group.as_ref().map(ToString::to_string).unwrap_or_default(),
            actions: s.view.actions.len(),
        }
    }
}

pub async fn handle(bridge: &Bridge, args: SceneArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SceneCommand::List { group } => {
            let group = group
                .as_deref()
                .map(|needle| util::resolve_where(bridge, needle, |r| r.category() == Category::Group))
                .transpose()?
                .map(|handle| handle.identity().clone());

            let mut scenes: Vec<SceneSummary> = bridge
                .resources_of(&ResourceType::Scene)
                .into_iter()
                .filter(ResourceHandle::exists)
                .filter_map(|h| {
                    Some(SceneSummary {
                        identity: h.identity().clone(),
                        view: h.scene_view()?,
                    })
                })
                .filter(|s| group.is_none() || s.view.group == group)
                .collect();
            scenes.sort_by(|a, b| a.identity.cmp(&b.identity));

            let out = output::render_list(&global.output, &scenes, |s| SceneRow::from(s), |s| {
                s.identity.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SceneCommand::Recall { scene } => {
            let handle = resolve_scene(bridge, &scene)?;
            handle.recall().await?;
            util::done(global, &format!("Recalled {}", handle.identity()));
            Ok(())
        }

        SceneCommand::Create { group, name } => {
            let group = util::resolve_where(bridge, &group, |r| r.category() == Category::Group)?;
            let draft = bridge.draft_scene(group.identity(), &name);

            let lights = lights_in(bridge, group.identity());
            if lights.is_empty() {
                return Err(CliError::Validation {
                    field: "group".into(),
                    reason: format!("{} contains no lights", group.identity()),
                });
            }
            for light in &lights {
                if let Some(state) = bridge.resource(light).and_then(|h| h.light_state()) {
                    draft.set_action(light, capture(&state));
                }
            }

            let created = match draft.create().await? {
                CreatedResource::Registered(handle) => handle.identity().to_string(),
                CreatedResource::Legacy { id_v1 } => id_v1,
            };
            output::print_output(&created, global.quiet);
            Ok(())
        }

        SceneCommand::Delete { scene } => {
            let handle = resolve_scene(bridge, &scene)?;
            let label = handle.name().unwrap_or_else(|| handle.identity().to_string());
            if !util::confirm(&format!("Delete scene {label}?"), global)? {
                return Ok(());
            }
            handle.delete().await?;
            util::done(global, &format!("Deleted {}", handle.identity()));
            Ok(())
        }
    }
}

fn resolve_scene(bridge: &Bridge, needle: &str) -> Result<ResourceHandle, CliError> {
    util::resolve_where(bridge, needle, |r| {
        matches!(r.identity().rtype, ResourceType::Scene | ResourceType::SmartScene)
    })
}

/// Light services of a group: its direct light members (zones) and the
/// lights owned by member devices (rooms).
fn lights_in(bridge: &Bridge, group: &ResourceIdentity) -> Vec<ResourceIdentity> {
    bridge.with_registry(|registry| {
        let Some(group) = registry.get(group) else {
            return Vec::new();
        };
        let mut lights = Vec::new();
        for child in group.children() {
            match child.rtype {
                ResourceType::Light => lights.push(child.clone()),
                ResourceType::Device => lights.extend(
                    registry
                        .owned_by(child)
                        .into_iter()
                        .filter(|s| s.rtype == ResourceType::Light),
                ),
                _ => {}
            }
        }
        lights.sort();
        lights.dedup();
        lights
    })
}

/// Scene action reproducing a light's current state.
fn capture(state: &LightState) -> Value {
    let mut action = json!({"on": {"on": state.is_on()}});
    if let Some(brightness) = state.brightness() {
        action["dimming"] = json!({"brightness": brightness});
    }
    if let Some(mirek) = state.mirek() {
        action["color_temperature"] = json!({"mirek": mirek});
    } else if let Some(xy) = state.xy() {
        action["color"] = json!({"xy": {"x": xy.x, "y": xy.y}});
    }
    action
}
