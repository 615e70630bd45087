// ── Filter predicates for notification streams ──

use crate::model::{ResourceIdentity, ResourceType};
use crate::notify::Notification;

/// Which notifications a [`NotificationStream`](super::NotificationStream)
/// yields.
pub enum NotificationFilter {
    All,
    /// Anything whose identity (or change target) is this resource.
    Resource(ResourceIdentity),
    /// Anything about a resource of this type.
    Type(ResourceType),
    /// `Created` / `Deleted` only.
    Lifecycle,
    /// Connection state changes and reconnect progress.
    Connection,
    Custom(Box<dyn Fn(&Notification) -> bool + Send + Sync>),
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        match self {
            Self::All => true,
            Self::Resource(id) => notification.identity() == Some(id),
            Self::Type(rtype) => notification.identity().is_some_and(|id| id.rtype == *rtype),
            Self::Lifecycle => notification.is_lifecycle(),
            Self::Connection => notification.is_connection(),
            Self::Custom(f) => f(notification),
        }
    }
}

impl std::fmt::Debug for NotificationFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Resource(id) => write!(f, "Resource({id})"),
            Self::Type(rtype) => write!(f, "Type({rtype})"),
            Self::Lifecycle => f.write_str("Lifecycle"),
            Self::Connection => f.write_str("Connection"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
