// ── Domain model ──
//
// Identity, the single concrete `Resource` type, capability classification,
// and typed read-only views over canonical data.

pub mod capability;
pub mod group;
pub mod identity;
pub mod light;
pub mod resource;
pub mod scene;

pub use capability::{
    Capability, CapabilitySet, DeviceKind, LightKind, capabilities_of, classify_device,
    classify_light,
};
pub use group::{GroupView, grouped_light_of};
pub use identity::{Category, ParseIdentityError, ResourceIdentity, ResourceType};
pub use light::{LightState, MirekSchema, Xy};
pub use resource::{PendingChanges, Resource};
pub use scene::{DaySchedule, SceneAction, SceneView, SmartSceneView, TimeOfDay, Timeslot};
