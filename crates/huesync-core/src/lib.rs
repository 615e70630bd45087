//! Live object-graph mirror of a Hue-style lighting bridge.
//!
//! This crate sits between the wire layer in `huesync-api` and consumers
//! such as the `huesync` CLI:
//!
//! - **[`Bridge`]**: Central facade managing the full lifecycle:
//!   [`connect()`](Bridge::connect) fetches the resource snapshot, builds the
//!   graph, then spawns the event stream consumer with its reconnect loop.
//!   [`Bridge::oneshot()`](Bridge::oneshot) runs a closure against a
//!   snapshot without keeping a stream open.
//!
//! - **[`Registry`]**: The arena of mirrored [`Resource`]s keyed by
//!   [`ResourceIdentity`]. Ownership, group membership and ancestry are
//!   derived from it on demand.
//!
//! - **[`ResourceHandle`]**: Per-identity facade with typed reads and
//!   validating setters. Setters flush immediately unless the handle is
//!   batching; [`ResourceDraft`] covers resources not yet created.
//!
//! - **[`Notification`]**: Change events delivered over a broadcast
//!   channel. Every change cascade is framed by `EventStart`/`EventEnd`
//!   per touched resource so observers can coalesce work.

mod batch;
pub mod bridge;
pub mod config;
mod draft;
pub mod error;
pub mod handle;
pub mod model;
mod mutation;
pub mod notify;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use batch::EventBatch;
pub use bridge::{Bridge, ConnectionState};
pub use config::{BridgeConfig, ReconnectPolicy, RemoteAccess, TlsVerification};
pub use draft::ResourceDraft;
pub use error::CoreError;
pub use handle::{AlertMode, ResourceHandle};
pub use mutation::CreatedResource;
pub use notify::Notification;
pub use store::{IngestSummary, Registry};
pub use stream::{NotificationFilter, NotificationStream};

pub use model::{
    Capability, CapabilitySet, Category, DaySchedule, DeviceKind, GroupView, LightKind,
    LightState, MirekSchema, PendingChanges, Resource, ResourceIdentity, ResourceType,
    SceneAction, SceneView, SmartSceneView, TimeOfDay, Timeslot, Xy,
};
