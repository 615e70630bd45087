// ── Event coalescing ──
//
// An `EventBatch` wraps one frame, one refresh, or one update
// reconciliation. Every resource touched inside it, and every ancestor of
// those resources, gets exactly one EventStart and exactly one EventEnd.
// The ends fire when the batch is dropped, so an early return or a failed
// request can never leave an observer in a started-never-ended state.

use std::sync::Arc;

use indexmap::IndexSet;
use tokio::sync::broadcast;

use crate::model::ResourceIdentity;
use crate::notify::Notification;
use crate::store::Registry;

pub struct EventBatch {
    tx: broadcast::Sender<Arc<Notification>>,
    started: IndexSet<ResourceIdentity>,
}

impl EventBatch {
    pub fn new(tx: broadcast::Sender<Arc<Notification>>) -> Self {
        Self {
            tx,
            started: IndexSet::new(),
        }
    }

    fn emit(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.tx.send(Arc::new(notification));
    }

    fn start_one(&mut self, identity: &ResourceIdentity) {
        if self.started.insert(identity.clone()) {
            self.emit(Notification::EventStart {
                identity: identity.clone(),
            });
        }
    }

    /// Start `identity` and all of its ancestors, each at most once per
    /// batch. Returns the ancestors.
    pub fn start(&mut self, registry: &Registry, identity: &ResourceIdentity) -> Vec<ResourceIdentity> {
        self.start_one(identity);
        let ancestors = registry.ancestors(identity);
        for ancestor in &ancestors {
            self.start_one(ancestor);
        }
        ancestors
    }

    fn fan_out(&self, ancestors: Vec<ResourceIdentity>, origin: &ResourceIdentity) {
        for target in ancestors {
            self.emit(Notification::Changed {
                target,
                origin: origin.clone(),
            });
        }
    }

    /// `identity` changed; its ancestors are told too.
    pub fn changed(&mut self, registry: &Registry, identity: &ResourceIdentity) {
        let ancestors = self.start(registry, identity);
        self.emit(Notification::Changed {
            target: identity.clone(),
            origin: identity.clone(),
        });
        self.fan_out(ancestors, identity);
    }

    pub fn created(&mut self, registry: &Registry, identity: &ResourceIdentity) {
        let ancestors = self.start(registry, identity);
        self.emit(Notification::Created {
            identity: identity.clone(),
        });
        self.fan_out(ancestors, identity);
    }

    /// Must be called while `identity` is still in the registry.
    pub fn deleted(&mut self, registry: &Registry, identity: &ResourceIdentity) {
        let ancestors = self.start(registry, identity);
        self.emit(Notification::Deleted {
            identity: identity.clone(),
        });
        self.fan_out(ancestors, identity);
    }

    pub fn is_started(&self, identity: &ResourceIdentity) -> bool {
        self.started.contains(identity)
    }

    /// End the batch now.
    pub fn finish(self) {}
}

impl Drop for EventBatch {
    fn drop(&mut self) {
        for identity in std::mem::take(&mut self.started) {
            self.emit(Notification::EventEnd { identity });
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::Resource;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        for doc in [
            json!({"id": "R1", "type": "room", "children": [{"rid": "D1", "rtype": "device"}]}),
            json!({"id": "D1", "type": "device", "services": [{"rid": "L1", "rtype": "light"}]}),
            json!({"id": "L1", "type": "light", "owner": {"rid": "D1", "rtype": "device"}}),
        ] {
            if let Some(r) = Resource::from_document(&doc) {
                reg.put(r);
            }
        }
        reg
    }

    fn drain(rx: &mut broadcast::Receiver<Arc<Notification>>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push((*n).clone());
        }
        out
    }

    #[test]
    fn nested_changes_start_each_ancestor_once() {
        let reg = registry();
        let (tx, mut rx) = broadcast::channel(64);
        let light = ResourceIdentity::new("light", "L1");

        let mut batch = EventBatch::new(tx);
        batch.changed(&reg, &light);
        batch.changed(&reg, &light);
        batch.finish();

        let seen = drain(&mut rx);
        let count = |f: &dyn Fn(&Notification) -> bool| seen.iter().filter(|n| f(n)).count();
        let room = ResourceIdentity::new("room", "R1");

        assert_eq!(
            count(&|n| matches!(n, Notification::EventStart { identity } if *identity == room)),
            1
        );
        assert_eq!(
            count(&|n| matches!(n, Notification::EventEnd { identity } if *identity == room)),
            1
        );
        assert_eq!(count(&|n| matches!(n, Notification::EventStart { .. })), 3);
        assert_eq!(count(&|n| matches!(n, Notification::EventEnd { .. })), 3);
        assert_eq!(
            count(&|n| matches!(n, Notification::Changed { target, origin } if *target == room && *origin == light)),
            2
        );
    }

    #[test]
    fn ends_fire_on_drop() {
        let reg = registry();
        let (tx, mut rx) = broadcast::channel(64);
        {
            let mut batch = EventBatch::new(tx);
            batch.start(&reg, &ResourceIdentity::new("device", "D1"));
        }
        let seen = drain(&mut rx);
        assert!(matches!(seen.last(), Some(Notification::EventEnd { .. })));
        assert_eq!(seen.len(), 4, "start+end for device and room: {seen:?}");
    }
}
