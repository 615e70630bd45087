//! `list` and `show` handlers.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tabled::Tabled;

use huesync_core::{
    Bridge, GroupView, LightState, Resource, ResourceIdentity, ResourceType, SceneView,
    SmartSceneView,
};

use crate::cli::{GlobalOpts, ListArgs, ShowArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ResourceSummary {
    #[serde(flatten)]
    pub identity: ResourceIdentity,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentity>,
}

impl From<&Resource> for ResourceSummary {
    fn from(r: &Resource) -> Self {
        Self {
            identity: r.identity().clone(),
            name: r.name().map(str::to_owned),
            kind: r.device_kind().map(|k| k.to_string()),
            id_v1: r.id_v1().map(str::to_owned),
            owner: r.owner().cloned(),
        }
    }
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Resource")]
    identity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Legacy")]
    id_v1: String,
    #[tabled(rename = "Owner")]
    owner: String,
}

impl From<&ResourceSummary> for ResourceRow {
    fn from(s: &ResourceSummary) -> Self {
        Self {
            identity: s.identity.to_string(),
            name: s.name.clone().unwrap_or_default(),
            kind: s.kind.clone().unwrap_or_default(),
            id_v1: s.id_v1.clone().unwrap_or_default(),
            owner: s.owner.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResourceDetail {
    #[serde(flatten)]
    summary: ResourceSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    services: Vec<ResourceIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    light: Option<LightState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<GroupView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene: Option<SceneView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    smart_scene: Option<SmartSceneView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
}

fn dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn detail(d: &ResourceDetail) -> String {
    let s = &d.summary;
    let mut lines = vec![
        format!("Resource: {}", s.identity),
        format!("Name:     {}", dash(s.name.as_deref())),
        format!("Legacy:   {}", dash(s.id_v1.as_deref())),
        format!(
            "Owner:    {}",
            s.owner.as_ref().map_or_else(|| "-".into(), ToString::to_string)
        ),
    ];
    if let Some(ref kind) = s.kind {
        lines.push(format!("Kind:     {kind}"));
    }
    if !d.services.is_empty() {
        let services: Vec<_> = d.services.iter().map(ToString::to_string).collect();
        lines.push(format!("Services: {}", services.join(", ")));
    }
    if let Some(ref light) = d.light {
        lines.push(format!("Power:    {}", if light.is_on() { "on" } else { "off" }));
        if let Some(bri) = light.brightness() {
            lines.push(format!("Bright:   {bri:.1}%"));
        }
        if let Some(ref ct) = light.color_temperature {
            let mirek = ct.mirek.map_or_else(|| "-".into(), |m| m.to_string());
            lines.push(format!(
                "Mirek:    {mirek} ({}-{})",
                ct.schema.minimum, ct.schema.maximum
            ));
        }
        if let Some(xy) = light.xy() {
            lines.push(format!("Color:    x={:.4} y={:.4}", xy.x, xy.y));
        }
    }
    if let Some(ref group) = d.group {
        lines.push(format!("Members:  {}", group.children.len()));
        lines.push(format!("Scenes:   {}", group.scenes.len()));
    }
    if let Some(ref scene) = d.scene {
        lines.push(format!(
            "Group:    {}",
            scene.group.as_ref().map_or_else(|| "-".into(), ToString::to_string)
        ));
        lines.push(format!("Actions:  {}", scene.actions.len()));
    }
    if let Some(ref smart) = d.smart_scene {
        lines.push(format!("State:    {}", dash(smart.state.as_deref())));
        lines.push(format!("Days:     {}", smart.week_timeslots.len()));
    }
    if let Some(ref data) = d.data {
        lines.push(String::new());
        lines.push(output::render_json(data, false));
    }
    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn list(bridge: &Bridge, args: &ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let rtype = args.rtype.as_deref().map(ResourceType::from);
    let within = args
        .within
        .as_deref()
        .map(|needle| util::resolve(bridge, needle))
        .transpose()?
        .map(|handle| members_of(bridge, handle.identity()));

    let mut rows: Vec<ResourceSummary> = bridge.with_registry(|registry| {
        registry
            .iter()
            .filter(|r| r.exists())
            .filter(|r| rtype.as_ref().is_none_or(|t| r.identity().rtype == *t))
            .filter(|r| within.as_ref().is_none_or(|set| set.contains(r.identity())))
            .map(ResourceSummary::from)
            .collect()
    });
    rows.sort_by(|a, b| a.identity.cmp(&b.identity));

    let out = output::render_list(&global.output, &rows, |s| ResourceRow::from(s), |s| {
        s.identity.to_string()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Everything `identity` owns, contains, or groups.
fn members_of(bridge: &Bridge, identity: &ResourceIdentity) -> BTreeSet<ResourceIdentity> {
    bridge.with_registry(|registry| {
        let mut members: BTreeSet<_> = registry.owned_by(identity).into_iter().collect();
        if let Some(resource) = registry.get(identity) {
            members.extend(resource.children().cloned());
            members.extend(resource.services().cloned());
            members.extend(resource.scenes().cloned());
        }
        members
    })
}

pub fn show(bridge: &Bridge, args: &ShowArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let handle = util::resolve(bridge, &args.resource)?;
    let identity = handle.identity().clone();

    let (summary, services) = bridge
        .with_registry(|registry| {
            registry.get(&identity).map(|r| {
                (
                    ResourceSummary::from(r),
                    r.services().cloned().collect::<Vec<_>>(),
                )
            })
        })
        .ok_or_else(|| CliError::NotFound {
            identifier: identity.to_string(),
            list_hint: String::new(),
        })?;

    let detail_view = ResourceDetail {
        summary,
        services,
        light: handle.light_state(),
        group: handle.group_view(),
        scene: handle.scene_view(),
        smart_scene: handle.smart_scene_view(),
        data: if args.raw { handle.data() } else { None },
    };

    let out = output::render_single(&global.output, &detail_view, detail, |d| {
        d.summary.identity.to_string()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
