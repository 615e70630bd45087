// ── Group view ──
//
// Rooms, zones and the bridge home: members, scenes, and the aggregated
// grouped_light service when the group embeds one.

use serde::Serialize;

use super::identity::{ResourceIdentity, ResourceType};
use super::resource::Resource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub name: Option<String>,
    pub archetype: Option<String>,
    pub children: Vec<ResourceIdentity>,
    pub scenes: Vec<ResourceIdentity>,
    pub grouped_light: Option<ResourceIdentity>,
}

impl GroupView {
    pub fn from_resource(group: &Resource) -> Self {
        Self {
            name: group.name().map(str::to_owned),
            archetype: group
                .get("metadata")
                .and_then(|m| m.get("archetype"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            children: group.children().cloned().collect(),
            scenes: group.scenes().cloned().collect(),
            grouped_light: grouped_light_of(group),
        }
    }
}

/// The aggregated light service embedded in a group's service list.
pub fn grouped_light_of(group: &Resource) -> Option<ResourceIdentity> {
    group
        .services()
        .find(|s| s.rtype == ResourceType::GroupedLight)
        .cloned()
}
