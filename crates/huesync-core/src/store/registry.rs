// ── Registry ──
//
// The single arena of mirrored resources, keyed by identity. Derived
// indices (by type, by owner, group membership, ancestry) are computed
// from the arena on demand and never stored alongside it.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::debug;

use crate::batch::EventBatch;
use crate::model::{Category, Resource, ResourceIdentity, ResourceType};

#[derive(Debug, Default)]
pub struct Registry {
    entries: IndexMap<ResourceIdentity, Resource>,
    bridge_device: Option<ResourceIdentity>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, identity: &ResourceIdentity) -> Option<&Resource> {
        self.entries.get(identity)
    }

    pub(crate) fn get_mut(&mut self, identity: &ResourceIdentity) -> Option<&mut Resource> {
        self.entries.get_mut(identity)
    }

    pub fn contains(&self, identity: &ResourceIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Insert `resource` unless its identity is already present, in which
    /// case the existing instance is returned untouched.
    pub fn put(&mut self, resource: Resource) -> &mut Resource {
        self.entries
            .entry(resource.identity().clone())
            .or_insert(resource)
    }

    /// Fetch the resource for `identity`, constructing it with `make` when
    /// absent. The flag reports whether it was inserted.
    pub(crate) fn get_or_insert_with(
        &mut self,
        identity: &ResourceIdentity,
        make: impl FnOnce(ResourceIdentity) -> Resource,
    ) -> (&mut Resource, bool) {
        match self.entries.entry(identity.clone()) {
            indexmap::map::Entry::Occupied(slot) => (slot.into_mut(), false),
            indexmap::map::Entry::Vacant(slot) => {
                let resource = make(identity.clone());
                (slot.insert(resource), true)
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.entries.values()
    }

    pub fn identities(&self) -> impl Iterator<Item = &ResourceIdentity> {
        self.entries.keys()
    }

    /// The device carrying the bridge service, once ingested.
    pub fn bridge_device(&self) -> Option<&Resource> {
        self.bridge_device.as_ref().and_then(|id| self.entries.get(id))
    }

    pub(crate) fn set_bridge_device(&mut self, identity: ResourceIdentity) {
        if let Some(existing) = self.bridge_device.as_ref().filter(|e| **e != identity) {
            debug!(previous = %existing, current = %identity, "Bridge device moved");
        }
        self.bridge_device = Some(identity);
    }

    // ── Derived indices ──────────────────────────────────────────────

    pub fn by_type(&self, rtype: &ResourceType) -> Vec<&Resource> {
        self.entries
            .values()
            .filter(|r| r.identity().rtype == *rtype)
            .collect()
    }

    pub fn by_category(&self, category: Category) -> Vec<&Resource> {
        self.entries
            .values()
            .filter(|r| r.category() == category)
            .collect()
    }

    /// Resources whose owner is `owner`.
    pub fn owned_by(&self, owner: &ResourceIdentity) -> Vec<ResourceIdentity> {
        self.entries
            .values()
            .filter(|r| r.owner() == Some(owner))
            .map(|r| r.identity().clone())
            .collect()
    }

    /// Groups listing `member` among their children or services.
    pub fn groups_containing(&self, member: &ResourceIdentity) -> Vec<ResourceIdentity> {
        self.entries
            .values()
            .filter(|r| r.category() == Category::Group)
            .filter(|g| g.children.contains(member) || g.services.contains(member))
            .map(|g| g.identity().clone())
            .collect()
    }

    /// Every resource a change on `identity` propagates to: its owner chain
    /// and every group containing it or one of its ancestors. Breadth-first,
    /// nearest first, `identity` itself excluded.
    pub fn ancestors(&self, identity: &ResourceIdentity) -> Vec<ResourceIdentity> {
        let mut seen: HashSet<ResourceIdentity> = HashSet::from([identity.clone()]);
        let mut queue = VecDeque::from([identity.clone()]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            let owner = self
                .entries
                .get(&current)
                .and_then(Resource::owner)
                .filter(|o| self.entries.contains_key(*o))
                .cloned();

            for parent in owner.into_iter().chain(self.groups_containing(&current)) {
                if seen.insert(parent.clone()) {
                    out.push(parent.clone());
                    queue.push_back(parent);
                }
            }
        }
        out
    }

    // ── Liveness ─────────────────────────────────────────────────────

    pub(crate) fn mark_all_dead(&mut self) {
        for resource in self.entries.values_mut() {
            resource.alive = false;
        }
    }

    pub(crate) fn mark_dead(&mut self, identity: &ResourceIdentity) -> bool {
        match self.entries.get_mut(identity) {
            Some(resource) => {
                resource.alive = false;
                true
            }
            None => false,
        }
    }

    /// Remove every resource not marked alive, emitting one `Deleted` per
    /// removal in insertion order. Links pointing at removed resources are
    /// left in place.
    pub(crate) fn sweep(&mut self, batch: &mut EventBatch) -> Vec<ResourceIdentity> {
        let dead: Vec<ResourceIdentity> = self
            .entries
            .values()
            .filter(|r| !r.alive)
            .map(|r| r.identity().clone())
            .collect();

        for identity in &dead {
            batch.deleted(self, identity);
        }
        for identity in &dead {
            self.entries.shift_remove(identity);
            if self.bridge_device.as_ref() == Some(identity) {
                self.bridge_device = None;
            }
        }

        if !dead.is_empty() {
            debug!(removed = dead.len(), remaining = self.entries.len(), "Swept dead resources");
        }
        dead
    }
}
