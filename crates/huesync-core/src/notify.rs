// ── Notifications ──
//
// Everything observable about the bridge flows through one broadcast
// channel of `Arc<Notification>`: connection lifecycle, resource
// lifecycle, changes, and the start/end coalescing markers.

use std::time::Duration;

use crate::model::ResourceIdentity;

/// A typed event emitted by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    // ── Connection ───────────────────────────────────────────────────
    /// The event stream opened.
    Connected,
    /// A previously open stream went away, or `close()` was called.
    Disconnected,
    /// A transport-level failure (snapshot fetch or stream).
    ConnectionError { message: String },
    /// A reconnect attempt will start after `delay`.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The retry budget is spent; no further attempts will be made.
    ReconnectGaveUp { attempts: u32 },

    // ── Resources ────────────────────────────────────────────────────
    Created { identity: ResourceIdentity },
    /// `target` changed because `origin` (itself, or something it owns or
    /// contains) changed.
    Changed {
        target: ResourceIdentity,
        origin: ResourceIdentity,
    },
    Deleted { identity: ResourceIdentity },

    // ── Coalescing ───────────────────────────────────────────────────
    EventStart { identity: ResourceIdentity },
    EventEnd { identity: ResourceIdentity },
}

impl Notification {
    /// The resource this notification is about, if any.
    pub fn identity(&self) -> Option<&ResourceIdentity> {
        match self {
            Self::Created { identity }
            | Self::Deleted { identity }
            | Self::EventStart { identity }
            | Self::EventEnd { identity } => Some(identity),
            Self::Changed { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connected
                | Self::Disconnected
                | Self::ConnectionError { .. }
                | Self::ReconnectScheduled { .. }
                | Self::ReconnectGaveUp { .. }
        )
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Deleted { .. })
    }
}
