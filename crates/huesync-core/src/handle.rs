// ── Resource handles ──
//
// A `ResourceHandle` is an identity plus the bridge it lives on. Reads go
// through the registry lock and return owned views; setters validate at
// call time, stage into the target's buffers, and flush unless the handle
// is batching.

use std::fmt;

use serde_json::{Map, Value, json};
use strum::{Display, EnumString};
use tracing::warn;

use crate::bridge::Bridge;
use crate::error::CoreError;
use crate::model::light::mirek_schema;
use crate::model::scene::scene_actions;
use crate::model::{
    Capability, Category, DeviceKind, GroupView, LightState, PendingChanges, Resource,
    ResourceIdentity, ResourceType, SceneView, SmartSceneView, TimeOfDay, capabilities_of,
    grouped_light_of,
};
use crate::store::Registry;

/// Legacy alert effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AlertMode {
    /// One breathe cycle.
    Select,
    /// Breathe for fifteen seconds.
    Lselect,
    None,
}

#[derive(Clone)]
pub struct ResourceHandle {
    bridge: Bridge,
    identity: ResourceIdentity,
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceHandle").field(&self.identity.to_string()).finish()
    }
}

impl ResourceHandle {
    pub(crate) fn new(bridge: Bridge, identity: ResourceIdentity) -> Self {
        Self { bridge, identity }
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn read<R>(&self, f: impl FnOnce(&Registry, &Resource) -> R) -> Option<R> {
        let registry = self.bridge.inner.registry.read();
        let resource = registry.get(&self.identity)?;
        Some(f(&registry, resource))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Canonical data; `None` once the resource has been swept.
    pub fn data(&self) -> Option<Map<String, Value>> {
        self.read(|_, r| r.data().clone())
    }

    pub fn name(&self) -> Option<String> {
        self.read(|_, r| r.name().map(str::to_owned)).flatten()
    }

    pub fn id_v1(&self) -> Option<String> {
        self.read(|_, r| r.id_v1().map(str::to_owned)).flatten()
    }

    pub fn owner(&self) -> Option<ResourceIdentity> {
        self.read(|_, r| r.owner().cloned()).flatten()
    }

    pub fn device_kind(&self) -> Option<DeviceKind> {
        self.read(|_, r| r.device_kind()).flatten()
    }

    pub fn exists(&self) -> bool {
        self.read(|_, r| r.exists()).unwrap_or(false)
    }

    pub fn is_batching(&self) -> bool {
        self.read(|_, r| r.is_batching()).unwrap_or(false)
    }

    pub fn pending(&self) -> Option<PendingChanges> {
        self.read(|_, r| r.pending().clone())
    }

    /// Light state of this resource, or of the light service it
    /// delegates to (device) or its aggregated light (group).
    pub fn light_state(&self) -> Option<LightState> {
        self.read(|registry, resource| {
            let target = light_delegate(registry, resource)?;
            registry.get(&target).map(|l| LightState::from_data(l.data()))
        })
        .flatten()
    }

    pub fn scene_view(&self) -> Option<SceneView> {
        self.read(|_, r| {
            (r.identity().rtype == ResourceType::Scene).then(|| SceneView::from_data(r.data()))
        })
        .flatten()
    }

    pub fn smart_scene_view(&self) -> Option<SmartSceneView> {
        self.read(|_, r| {
            (r.identity().rtype == ResourceType::SmartScene)
                .then(|| SmartSceneView::from_data(r.data()))
        })
        .flatten()
    }

    pub fn group_view(&self) -> Option<GroupView> {
        self.read(|_, r| (r.category() == Category::Group).then(|| GroupView::from_resource(r)))
            .flatten()
    }

    // ── Batching ─────────────────────────────────────────────────────

    /// Stop flushing after every setter. Changes accumulate until
    /// [`update()`](Self::update).
    pub fn prepare_update(&self) -> Result<(), CoreError> {
        self.with_resource(|r| r.batching = true)
    }

    /// Leave batching mode. Staged changes stay in the buffers.
    pub fn cancel_update(&self) -> Result<(), CoreError> {
        self.with_resource(|r| r.batching = false)
    }

    /// Send everything staged here and on the services touched while
    /// batching. Buffers are empty once the requests are dispatched.
    pub async fn update(&self) -> Result<(), CoreError> {
        self.bridge.flush_update(&self.identity).await
    }

    pub async fn delete(&self) -> Result<(), CoreError> {
        self.bridge.delete_resource(&self.identity).await
    }

    // ── Light setters ────────────────────────────────────────────────

    pub async fn set_on(&self, on: bool) -> Result<(), CoreError> {
        let target = self.light_target("set_on", Capability::On)?;
        self.apply(&target, |r| r.stage_update(&json!({"on": {"on": on}})))
            .await
    }

    /// Brightness in percent. Out-of-range values are clamped.
    pub async fn set_brightness(&self, brightness: f64) -> Result<(), CoreError> {
        let target = self.light_target("set_brightness", Capability::Dimming)?;
        if brightness.is_nan() {
            return Err(CoreError::invariant("brightness must be a number"));
        }
        let clamped = brightness.clamp(0.0, 100.0);
        if !(0.0..=100.0).contains(&brightness) {
            warn!(identity = %target, requested = brightness, applied = clamped, "Brightness out of range, clamped");
        }
        self.apply(&target, |r| {
            r.stage_update(&json!({"dimming": {"brightness": clamped}}));
        })
        .await
    }

    /// Colour temperature in mirek, clamped into the light's schema.
    pub async fn set_color_temperature(&self, mirek: u16) -> Result<(), CoreError> {
        let target = self.light_target("set_color_temperature", Capability::ColorTemperature)?;
        let schema = self
            .bridge
            .with_registry(|reg| {
                reg.get(&target)
                    .and_then(|l| l.get("color_temperature").map(mirek_schema))
            })
            .unwrap_or_default();
        let clamped = schema.clamp(mirek);
        if clamped != mirek {
            warn!(
                identity = %target,
                requested = mirek,
                applied = clamped,
                minimum = schema.minimum,
                maximum = schema.maximum,
                "Colour temperature outside the light's range, clamped"
            );
        }
        self.apply(&target, |r| {
            r.stage_update(&json!({"color_temperature": {"mirek": clamped}}));
        })
        .await
    }

    /// CIE xy colour; each coordinate clamped into 0..=1.
    pub async fn set_xy(&self, x: f64, y: f64) -> Result<(), CoreError> {
        let target = self.light_target("set_xy", Capability::Color)?;
        if x.is_nan() || y.is_nan() {
            return Err(CoreError::invariant("colour coordinates must be numbers"));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&x) || !unit.contains(&y) {
            warn!(identity = %target, x, y, "Colour coordinates out of range, clamped");
        }
        let xy = json!({"x": x.clamp(0.0, 1.0), "y": y.clamp(0.0, 1.0)});
        self.apply(&target, |r| r.stage_update(&json!({"color": {"xy": xy}})))
            .await
    }

    /// Trigger the legacy alert effect on a light or group.
    pub async fn set_alert(&self, mode: AlertMode) -> Result<(), CoreError> {
        let target = self.light_target("set_alert", Capability::On)?;
        let legacy_id = self.legacy_id_of(&target, "set_alert")?;
        let subpath = if legacy_id.starts_with("/groups") {
            "action"
        } else {
            "state"
        };
        let alert = mode.to_string();
        self.apply(&target, |r| r.stage_legacy(subpath, &json!({"alert": alert})))
            .await
    }

    // ── Generic setters ──────────────────────────────────────────────

    pub async fn set_name(&self, name: &str) -> Result<(), CoreError> {
        let supported = self
            .read(|_, r| r.get("metadata").is_some_and(Value::is_object))
            .ok_or_else(|| self.not_found())?;
        if !supported {
            return Err(CoreError::unsupported("set_name", &self.identity));
        }
        let identity = self.identity.clone();
        self.apply(&identity, |r| {
            r.stage_update(&json!({"metadata": {"name": name}}));
        })
        .await
    }

    /// Legacy root `name` attribute.
    pub async fn set_legacy_name(&self, name: &str) -> Result<(), CoreError> {
        let identity = self.identity.clone();
        self.legacy_id_of(&identity, "set_legacy_name")?;
        self.apply(&identity, |r| r.stage_legacy("", &json!({"name": name})))
            .await
    }

    /// Enable or disable a sensor service (or the device's sensor).
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), CoreError> {
        let target = self.service_target("set_enabled", |r| {
            r.category() == Category::Service && r.get("enabled").is_some_and(Value::is_boolean)
        })?;
        self.apply(&target, |r| r.stage_update(&json!({"enabled": enabled})))
            .await
    }

    /// Legacy motion sensitivity, clamped to the sensor's maximum when it
    /// reports one.
    pub async fn set_sensitivity(&self, sensitivity: u8) -> Result<(), CoreError> {
        let target = self.service_target("set_sensitivity", |r| r.identity().rtype == ResourceType::Motion)?;
        self.legacy_id_of(&target, "set_sensitivity")?;
        let max = self
            .bridge
            .with_registry(|reg| {
                reg.get(&target)
                    .and_then(|m| m.get("sensitivity"))
                    .and_then(|s| s.get("sensitivity_max"))
                    .and_then(Value::as_u64)
            })
            .and_then(|m| u8::try_from(m).ok());
        let applied = max.map_or(sensitivity, |m| sensitivity.min(m));
        if applied != sensitivity {
            warn!(identity = %target, requested = sensitivity, applied, "Sensitivity above sensor maximum, clamped");
        }
        self.apply(&target, |r| {
            r.stage_legacy("config", &json!({"sensitivity": applied}));
        })
        .await
    }

    // ── Scene setters ────────────────────────────────────────────────

    /// Replace (or add) the action for one target of a scene.
    pub async fn set_action(&self, target: &ResourceIdentity, action: Value) -> Result<(), CoreError> {
        self.require_type(ResourceType::Scene, "set_action")?;
        let identity = self.identity.clone();
        self.apply(&identity, |r| {
            let source = if r.pending().update.contains_key("actions") {
                &r.pending().update
            } else {
                r.data()
            };
            let mut actions: Vec<Value> = scene_actions(source)
                .into_iter()
                .filter(|a| a.target != *target)
                .map(|a| json!({"target": reference(&a.target), "action": a.action}))
                .collect();
            actions.push(json!({"target": reference(target), "action": action}));
            r.stage_update(&json!({"actions": actions}));
        })
        .await
    }

    /// Activate a scene or smart scene.
    pub async fn recall(&self) -> Result<(), CoreError> {
        let action = match self.identity.rtype {
            ResourceType::Scene => "active",
            ResourceType::SmartScene => "activate",
            _ => return Err(CoreError::unsupported("recall", &self.identity)),
        };
        let identity = self.identity.clone();
        self.apply(&identity, |r| {
            r.stage_update(&json!({"recall": {"action": action}}));
        })
        .await
    }

    pub async fn set_smart_scene_active(&self, active: bool) -> Result<(), CoreError> {
        self.require_type(ResourceType::SmartScene, "set_smart_scene_active")?;
        let action = if active { "activate" } else { "deactivate" };
        let identity = self.identity.clone();
        self.apply(&identity, |r| {
            r.stage_update(&json!({"recall": {"action": action}}));
        })
        .await
    }

    /// Move one weekly timeslot. Only components that differ from the
    /// current time are written; an identical time sends nothing.
    pub async fn set_timeslot_time(&self, day: usize, slot: usize, time: TimeOfDay) -> Result<(), CoreError> {
        self.require_type(ResourceType::SmartScene, "set_timeslot_time")?;

        let mut week = self
            .read(|_, r| {
                r.pending()
                    .update
                    .get("week_timeslots")
                    .or_else(|| r.get("week_timeslots"))
                    .cloned()
            })
            .flatten()
            .and_then(|w| match w {
                Value::Array(days) => Some(days),
                _ => None,
            })
            .unwrap_or_default();

        // Diff against the staged week when there is one, so a later call
        // in the same batch can move a slot back to its canonical time.
        let Some(entry) = week
            .get_mut(day)
            .and_then(|d| d.get_mut("timeslots"))
            .and_then(|s| s.get_mut(slot))
        else {
            return Err(CoreError::invariant(format!(
                "{} has no timeslot {day}/{slot}",
                self.identity
            )));
        };
        let current = entry
            .pointer("/start_time/time")
            .map(TimeOfDay::from_value)
            .unwrap_or_default();

        let changes = current.changes_from(time);
        if changes.is_empty() {
            return Ok(());
        }

        let time_obj = entry
            .as_object_mut()
            .map(|e| e.entry("start_time").or_insert_with(|| json!({"kind": "time"})))
            .and_then(Value::as_object_mut)
            .map(|s| s.entry("time").or_insert_with(|| json!({})));
        if let Some(Value::Object(time_obj)) = time_obj {
            for (key, value) in [("hour", changes.hour), ("minute", changes.minute), ("second", changes.second)] {
                if let Some(value) = value {
                    time_obj.insert(key.into(), json!(value));
                }
            }
        }

        let identity = self.identity.clone();
        self.apply(&identity, |r| {
            r.stage_update(&json!({"week_timeslots": week}));
        })
        .await
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    fn not_found(&self) -> CoreError {
        CoreError::NotFound {
            identity: self.identity.clone(),
        }
    }

    fn with_resource(&self, f: impl FnOnce(&mut Resource)) -> Result<(), CoreError> {
        let mut registry = self.bridge.inner.registry.write();
        let resource = registry.get_mut(&self.identity).ok_or_else(|| self.not_found())?;
        f(resource);
        Ok(())
    }

    fn require_type(&self, rtype: ResourceType, operation: &str) -> Result<(), CoreError> {
        if self.identity.rtype == rtype {
            Ok(())
        } else {
            Err(CoreError::unsupported(operation, &self.identity))
        }
    }

    /// The light-like resource this handle's light setters act on, checked
    /// for `capability`.
    fn light_target(&self, operation: &str, capability: Capability) -> Result<ResourceIdentity, CoreError> {
        let registry = self.bridge.inner.registry.read();
        let resource = registry.get(&self.identity).ok_or_else(|| self.not_found())?;
        let target = light_delegate(&registry, resource)
            .ok_or_else(|| CoreError::unsupported(operation, &self.identity))?;
        let capable = registry
            .get(&target)
            .is_some_and(|t| capabilities_of(t.data()).contains(&capability));
        if capable {
            Ok(target)
        } else {
            Err(CoreError::unsupported(operation, &target))
        }
    }

    /// This resource if it satisfies `accepts`, else the first owned
    /// service that does.
    fn service_target(
        &self,
        operation: &str,
        accepts: impl Fn(&Resource) -> bool,
    ) -> Result<ResourceIdentity, CoreError> {
        let registry = self.bridge.inner.registry.read();
        let resource = registry.get(&self.identity).ok_or_else(|| self.not_found())?;
        if accepts(resource) {
            return Ok(self.identity.clone());
        }
        resource
            .services()
            .filter_map(|s| registry.get(s))
            .find(|s| accepts(s))
            .map(|s| s.identity().clone())
            .ok_or_else(|| CoreError::unsupported(operation, &self.identity))
    }

    fn legacy_id_of(&self, target: &ResourceIdentity, operation: &str) -> Result<String, CoreError> {
        self.bridge
            .with_registry(|reg| reg.get(target).and_then(|r| r.id_v1().map(str::to_owned)))
            .ok_or_else(|| CoreError::unsupported(operation, target))
    }

    /// Stage on `target`, then flush unless batching. A delegated target
    /// is recorded in this resource's pending services while batching.
    async fn apply(&self, target: &ResourceIdentity, stage: impl FnOnce(&mut Resource)) -> Result<(), CoreError> {
        let flush = {
            let mut registry = self.bridge.inner.registry.write();
            let batching = registry
                .get(&self.identity)
                .ok_or_else(|| self.not_found())?
                .is_batching();
            let resource = registry.get_mut(target).ok_or_else(|| CoreError::NotFound {
                identity: target.clone(),
            })?;
            stage(resource);

            match (batching, *target == self.identity) {
                (false, _) => Some(target.clone()),
                (true, true) => None,
                (true, false) => {
                    if let Some(parent) = registry.get_mut(&self.identity) {
                        parent.pending.services.insert(target.clone());
                    }
                    None
                }
            }
        };

        match flush {
            Some(identity) => self.bridge.flush_update(&identity).await,
            None => Ok(()),
        }
    }
}

/// Light-like resource a resource's light operations apply to.
fn light_delegate(registry: &Registry, resource: &Resource) -> Option<ResourceIdentity> {
    let identity = resource.identity();
    match identity.category() {
        Category::Service if identity.rtype.is_light_like() => Some(identity.clone()),
        Category::Device => resource
            .services()
            .find(|s| s.rtype == ResourceType::Light && registry.contains(s))
            .cloned(),
        Category::Group => grouped_light_of(resource),
        _ => None,
    }
}

fn reference(identity: &ResourceIdentity) -> Value {
    json!({"rid": identity.id, "rtype": identity.rtype.as_str()})
}
