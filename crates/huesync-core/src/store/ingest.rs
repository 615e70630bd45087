// ── Snapshot / add-event ingestion ──
//
// Turns a flat, unordered list of resource documents into linked registry
// entries. Documents are bucketed by category and processed in table order
// (devices, groups, scenes, leftover services). Service documents live in
// an extractable map so each is consumed by at most one owner.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::Registry;
use crate::batch::EventBatch;
use crate::model::{
    Category, DeviceKind, Resource, ResourceIdentity, ResourceType, capabilities_of,
    classify_device,
};

/// Counts from one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents: usize,
    pub created: usize,
    pub changed: usize,
}

struct Pass<'a> {
    registry: &'a mut Registry,
    services: IndexMap<ResourceIdentity, Value>,
    created: IndexSet<ResourceIdentity>,
    changed: IndexSet<ResourceIdentity>,
}

type Stage = fn(&mut Pass<'_>, &ResourceIdentity, &Value);

/// Processing order and handler per category.
const STAGES: &[(Category, Stage)] = &[
    (Category::Device, ingest_device),
    (Category::Group, ingest_group),
    (Category::Container, ingest_container),
    (Category::Service, ingest_service),
];

/// Ingest `docs`, marking every touched resource alive. Created and
/// changed notifications go out through `batch` once all links are in
/// place, so ancestry is complete when they fan out.
pub(crate) fn ingest(
    registry: &mut Registry,
    docs: Vec<Value>,
    batch: &mut EventBatch,
) -> IngestSummary {
    let documents = docs.len();
    let mut buckets: HashMap<Category, Vec<(ResourceIdentity, Value)>> = HashMap::new();
    let mut services = IndexMap::new();

    for doc in docs {
        let Some(identity) = ResourceIdentity::from_document(&doc) else {
            warn!(document = %doc, "Skipping document without id/type");
            continue;
        };
        match identity.category() {
            Category::Service => {
                services.insert(identity, doc);
            }
            category => buckets.entry(category).or_default().push((identity, doc)),
        }
    }

    let mut pass = Pass {
        registry,
        services,
        created: IndexSet::new(),
        changed: IndexSet::new(),
    };

    for (category, stage) in STAGES {
        let work = match category {
            Category::Service => std::mem::take(&mut pass.services).into_iter().collect(),
            other => buckets.remove(other).unwrap_or_default(),
        };
        for (identity, doc) in &work {
            stage(&mut pass, identity, doc);
        }
    }

    let Pass {
        registry,
        created,
        changed,
        ..
    } = pass;

    for identity in &created {
        batch.created(registry, identity);
    }
    for identity in &changed {
        batch.changed(registry, identity);
    }

    let summary = IngestSummary {
        documents,
        created: created.len(),
        changed: changed.len(),
    };
    debug!(
        documents = summary.documents,
        created = summary.created,
        changed = summary.changed,
        total = registry.len(),
        "Ingestion pass complete"
    );
    summary
}

impl Pass<'_> {
    /// Merge `doc` into the resource for `identity` (constructing it when
    /// new) and mark it alive. A reference with no document only touches a
    /// resource the registry already holds.
    fn absorb(
        &mut self,
        identity: &ResourceIdentity,
        doc: Option<&Value>,
        owner: Option<&ResourceIdentity>,
    ) -> bool {
        if doc.is_none() && !self.registry.contains(identity) {
            trace!(identity = %identity, "Reference to a resource not yet known");
            return false;
        }

        let (resource, _) = self.registry.get_or_insert_with(identity, Resource::new);
        let changed = doc.is_some_and(|d| resource.set_data(d));
        if let Some(owner) = owner {
            resource.set_owner(owner.clone());
        }
        resource.alive = true;

        if !resource.initialized {
            resource.initialized = true;
            self.created.insert(identity.clone());
        } else if changed {
            self.changed.insert(identity.clone());
        }
        true
    }

    fn absorb_reference(&mut self, reference: &ResourceIdentity, owner: Option<&ResourceIdentity>) {
        let doc = self.services.shift_remove(reference);
        self.absorb(reference, doc.as_ref(), owner);
    }

    fn links(&self, identity: &ResourceIdentity, pick: fn(&Resource) -> &IndexSet<ResourceIdentity>) -> Vec<ResourceIdentity> {
        self.registry
            .get(identity)
            .map(|r| pick(r).iter().cloned().collect())
            .unwrap_or_default()
    }
}

// ── Stages ───────────────────────────────────────────────────────────

fn ingest_device(pass: &mut Pass<'_>, identity: &ResourceIdentity, doc: &Value) {
    pass.absorb(identity, Some(doc), None);
    for service in pass.links(identity, |r| &r.services) {
        pass.absorb_reference(&service, Some(identity));
    }
    apply_classification(pass.registry, identity);
}

fn ingest_group(pass: &mut Pass<'_>, identity: &ResourceIdentity, doc: &Value) {
    pass.absorb(identity, Some(doc), None);
    for service in pass.links(identity, |r| &r.services) {
        pass.absorb_reference(&service, Some(identity));
    }
    // Members keep their own owner (a zone lists lights owned by devices).
    for child in pass.links(identity, |r| &r.children) {
        pass.absorb_reference(&child, None);
    }
}

fn ingest_container(pass: &mut Pass<'_>, identity: &ResourceIdentity, doc: &Value) {
    pass.absorb(identity, Some(doc), None);
    let group = pass.registry.get(identity).and_then(Resource::owner).cloned();
    match group.and_then(|g| pass.registry.get_mut(&g)) {
        Some(group) => {
            group.scenes.insert(identity.clone());
        }
        None => trace!(identity = %identity, "Scene group not in registry"),
    }
}

fn ingest_service(pass: &mut Pass<'_>, identity: &ResourceIdentity, doc: &Value) {
    pass.absorb(identity, Some(doc), None);
    let Some(owner) = pass.registry.get(identity).and_then(Resource::owner).cloned() else {
        return;
    };
    if let Some(parent) = pass.registry.get_mut(&owner) {
        parent.services.insert(identity.clone());
    }
    if owner.category() == Category::Device {
        apply_classification(pass.registry, &owner);
    }
}

// ── Classification ───────────────────────────────────────────────────

/// What a device would classify as from its current services, or `None`
/// while an owned light service has not been ingested yet.
pub(crate) fn observed_kind(registry: &Registry, device: &ResourceIdentity) -> Option<DeviceKind> {
    let resource = registry.get(device)?;
    let mut light_caps = None;
    for service in resource.services().filter(|s| s.rtype == ResourceType::Light) {
        light_caps = Some(capabilities_of(registry.get(service)?.data()));
    }
    Some(classify_device(
        resource.services().map(|s| &s.rtype),
        light_caps.as_ref(),
    ))
}

/// Classify once; later observations that disagree are only logged.
fn apply_classification(registry: &mut Registry, device: &ResourceIdentity) {
    let Some(kind) = observed_kind(registry, device) else {
        trace!(identity = %device, "Deferring classification until light service arrives");
        return;
    };
    if kind == DeviceKind::Bridge {
        registry.set_bridge_device(device.clone());
    }
    let Some(resource) = registry.get_mut(device) else {
        return;
    };
    match resource.device_kind() {
        None => resource.init_device_kind(kind),
        Some(frozen) if frozen != kind => debug!(
            identity = %device,
            frozen = %frozen,
            observed = %kind,
            "Device capabilities changed; keeping original classification"
        ),
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::broadcast;

    use super::*;
    use crate::model::LightKind;
    use crate::notify::Notification;

    fn snapshot() -> Vec<Value> {
        vec![
            json!({"id": "S1", "type": "scene", "group": {"rid": "R1", "rtype": "room"},
                   "metadata": {"name": "Relax"}, "actions": []}),
            json!({"id": "L1", "type": "light", "owner": {"rid": "D1", "rtype": "device"},
                   "on": {"on": true}, "dimming": {"brightness": 50.0, "min_dim_level": 2.0},
                   "color_temperature": {"mirek": 300}}),
            json!({"id": "R1", "type": "room", "metadata": {"name": "Office"},
                   "children": [{"rid": "D1", "rtype": "device"}],
                   "services": [{"rid": "G1", "rtype": "grouped_light"}]}),
            json!({"id": "G1", "type": "grouped_light", "owner": {"rid": "R1", "rtype": "room"},
                   "on": {"on": true}}),
            json!({"id": "D1", "type": "device", "metadata": {"name": "Desk"},
                   "services": [{"rid": "L1", "rtype": "light"}, {"rid": "Z1", "rtype": "zigbee_connectivity"}]}),
            json!({"id": "Z1", "type": "zigbee_connectivity", "owner": {"rid": "D1", "rtype": "device"}}),
            json!({"id": "BD", "type": "device", "services": [{"rid": "B1", "rtype": "bridge"}]}),
            json!({"id": "B1", "type": "bridge", "owner": {"rid": "BD", "rtype": "device"}}),
            json!({"id": "T1", "type": "temperature"}),
        ]
    }

    fn run(registry: &mut Registry, docs: Vec<Value>) -> Vec<Notification> {
        let (tx, mut rx) = broadcast::channel::<Arc<Notification>>(256);
        let mut batch = EventBatch::new(tx);
        ingest(registry, docs, &mut batch);
        batch.finish();
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push((*n).clone());
        }
        out
    }

    #[test]
    fn builds_linked_graph() {
        let mut reg = Registry::new();
        run(&mut reg, snapshot());

        assert_eq!(reg.len(), 9);
        let device = reg.get(&ResourceIdentity::new("device", "D1"));
        assert_eq!(
            device.and_then(Resource::device_kind),
            Some(DeviceKind::Light(LightKind::WhiteAmbiance))
        );
        let light = reg.get(&ResourceIdentity::new("light", "L1"));
        assert_eq!(light.and_then(Resource::owner), Some(&ResourceIdentity::new("device", "D1")));

        let room = reg.get(&ResourceIdentity::new("room", "R1"));
        assert_eq!(
            room.map(|r| r.scenes().cloned().collect::<Vec<_>>()),
            Some(vec![ResourceIdentity::new("scene", "S1")])
        );
        assert_eq!(
            reg.bridge_device().map(|d| d.identity().id.as_str()),
            Some("BD")
        );
    }

    #[test]
    fn unique_entries_regardless_of_order() {
        let mut forward = Registry::new();
        run(&mut forward, snapshot());

        let mut reversed_docs = snapshot();
        reversed_docs.reverse();
        let mut reversed = Registry::new();
        run(&mut reversed, reversed_docs);

        let mut a: Vec<_> = forward.identities().cloned().collect();
        let mut b: Vec<_> = reversed.identities().cloned().collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
        assert_eq!(
            reversed
                .get(&ResourceIdentity::new("device", "D1"))
                .and_then(Resource::device_kind),
            Some(DeviceKind::Light(LightKind::WhiteAmbiance))
        );
    }

    #[test]
    fn created_fires_once_then_changes_only() {
        let mut reg = Registry::new();
        let first = run(&mut reg, snapshot());
        let created = first
            .iter()
            .filter(|n| matches!(n, Notification::Created { .. }))
            .count();
        assert_eq!(created, 9);

        let mut docs = snapshot();
        docs[1] = json!({"id": "L1", "type": "light", "owner": {"rid": "D1", "rtype": "device"},
                         "on": {"on": false}});
        let second = run(&mut reg, docs);
        assert!(!second.iter().any(|n| matches!(n, Notification::Created { .. })));
        let light = ResourceIdentity::new("light", "L1");
        assert!(second.contains(&Notification::Changed {
            target: light.clone(),
            origin: light,
        }));
    }

    #[test]
    fn classification_is_frozen() {
        let mut reg = Registry::new();
        run(&mut reg, snapshot());
        run(
            &mut reg,
            vec![json!({"id": "L1", "type": "light", "color": {"xy": {"x": 0.3, "y": 0.3}}})],
        );
        let device = ResourceIdentity::new("device", "D1");
        assert_eq!(
            reg.get(&device).and_then(Resource::device_kind),
            Some(DeviceKind::Light(LightKind::WhiteAmbiance))
        );
        assert_eq!(
            observed_kind(&reg, &device),
            Some(DeviceKind::Light(LightKind::ExtendedColor))
        );
    }

    #[test]
    fn classification_waits_for_light_service() {
        let mut reg = Registry::new();
        run(
            &mut reg,
            vec![json!({"id": "D9", "type": "device", "services": [{"rid": "L9", "rtype": "light"}]})],
        );
        let device = ResourceIdentity::new("device", "D9");
        assert_eq!(reg.get(&device).and_then(Resource::device_kind), None);

        run(
            &mut reg,
            vec![json!({"id": "L9", "type": "light", "owner": {"rid": "D9", "rtype": "device"},
                        "on": {"on": true}})],
        );
        assert_eq!(
            reg.get(&device).and_then(Resource::device_kind),
            Some(DeviceKind::Light(LightKind::OnOff))
        );
    }
}
