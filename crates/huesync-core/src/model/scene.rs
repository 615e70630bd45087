// ── Scene and smart scene views ──

use serde::Serialize;
use serde_json::{Map, Value};

use super::identity::ResourceIdentity;

/// One per-target action of a scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneAction {
    pub target: ResourceIdentity,
    pub action: Value,
}

/// Typed view over a `scene` resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneView {
    pub name: Option<String>,
    pub group: Option<ResourceIdentity>,
    pub actions: Vec<SceneAction>,
    pub palette: Option<Value>,
    pub active: Option<String>,
}

impl SceneView {
    pub fn from_data(data: &Map<String, Value>) -> Self {
        Self {
            name: name_of(data),
            group: data.get("group").and_then(ResourceIdentity::from_reference),
            actions: scene_actions(data),
            palette: data.get("palette").filter(|p| !p.is_null()).cloned(),
            active: data
                .get("status")
                .and_then(|s| s.get("active"))
                .and_then(Value::as_str)
                .map(str::to_owned),
        }
    }

    pub fn action_for(&self, target: &ResourceIdentity) -> Option<&Value> {
        self.actions
            .iter()
            .find(|a| a.target == *target)
            .map(|a| &a.action)
    }
}

pub(crate) fn scene_actions(data: &Map<String, Value>) -> Vec<SceneAction> {
    data.get("actions")
        .and_then(Value::as_array)
        .map(|actions| {
            actions
                .iter()
                .filter_map(|entry| {
                    Some(SceneAction {
                        target: ResourceIdentity::from_reference(entry.get("target")?)?,
                        action: entry.get("action").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Hour/minute/second of a time slot. Each component is tracked on its own
/// so a write only touches what changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeOfDay {
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour: Some(hour),
            minute: Some(minute),
            second: Some(second),
        }
    }

    pub(crate) fn from_value(value: &Value) -> Self {
        let part = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u8::try_from(v).ok())
        };
        Self {
            hour: part("hour"),
            minute: part("minute"),
            second: part("second"),
        }
    }

    /// Components of `other` that are set and differ from `self`.
    pub fn changes_from(self, other: Self) -> Self {
        let diff = |current: Option<u8>, wanted: Option<u8>| wanted.filter(|w| Some(*w) != current);
        Self {
            hour: diff(self.hour, other.hour),
            minute: diff(self.minute, other.minute),
            second: diff(self.second, other.second),
        }
    }

    pub fn is_empty(self) -> bool {
        self.hour.is_none() && self.minute.is_none() && self.second.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeslot {
    pub time: TimeOfDay,
    pub target: Option<ResourceIdentity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySchedule {
    pub recurrence: Vec<String>,
    pub timeslots: Vec<Timeslot>,
}

/// Typed view over a `smart_scene` resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmartSceneView {
    pub name: Option<String>,
    pub group: Option<ResourceIdentity>,
    pub state: Option<String>,
    pub week_timeslots: Vec<DaySchedule>,
}

impl SmartSceneView {
    pub fn from_data(data: &Map<String, Value>) -> Self {
        let week_timeslots = data
            .get("week_timeslots")
            .and_then(Value::as_array)
            .map(|days| days.iter().map(day_schedule).collect())
            .unwrap_or_default();

        Self {
            name: name_of(data),
            group: data.get("group").and_then(ResourceIdentity::from_reference),
            state: data.get("state").and_then(Value::as_str).map(str::to_owned),
            week_timeslots,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.as_deref() == Some("active")
    }

    pub fn timeslot(&self, day: usize, slot: usize) -> Option<&Timeslot> {
        self.week_timeslots.get(day)?.timeslots.get(slot)
    }
}

fn day_schedule(day: &Value) -> DaySchedule {
    DaySchedule {
        recurrence: day
            .get("recurrence")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default(),
        timeslots: day
            .get("timeslots")
            .and_then(Value::as_array)
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| Timeslot {
                        time: slot
                            .get("start_time")
                            .and_then(|s| s.get("time"))
                            .map(TimeOfDay::from_value)
                            .unwrap_or_default(),
                        target: slot.get("target").and_then(ResourceIdentity::from_reference),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn name_of(data: &Map<String, Value>) -> Option<String> {
    data.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}
