// ── Resource ──
//
// One concrete entity type for every mirrored resource. Specialisation is
// carried by the identity's category, the set-once `device_kind`, and the
// link sets, not by a type hierarchy.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::capability::DeviceKind;
use super::identity::{Category, ResourceIdentity};

/// Fields the bridge owns. Never sent back in an update payload.
const READ_ONLY_FIELDS: &[&str] = &[
    "id",
    "type",
    "id_v1",
    "owner",
    "services",
    "children",
    "product_data",
    "identify",
];

/// Write-only commands that must not be merged into canonical state.
pub(crate) const WRITE_ONLY_FIELDS: &[&str] = &["recall", "identify", "alert"];

/// Changes staged locally and not yet sent.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    /// Current-protocol diff.
    pub update: Map<String, Value>,
    /// Legacy-protocol diffs keyed by sub-path (`""` addresses the root).
    pub legacy: BTreeMap<String, Map<String, Value>>,
    /// Current-protocol create payload.
    pub create: Map<String, Value>,
    /// Legacy-protocol create payload.
    pub create_legacy: Map<String, Value>,
    /// Owned services touched while this resource was batching.
    pub services: IndexSet<ResourceIdentity>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.update.is_empty()
            && self.legacy.values().all(Map::is_empty)
            && self.create.is_empty()
            && self.create_legacy.is_empty()
            && self.services.is_empty()
    }
}

/// A mirrored resource.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Resource {
    identity: ResourceIdentity,
    id_v1: Option<String>,
    data: Map<String, Value>,
    owner: Option<ResourceIdentity>,
    device_kind: Option<DeviceKind>,
    pub(crate) services: IndexSet<ResourceIdentity>,
    pub(crate) children: IndexSet<ResourceIdentity>,
    pub(crate) scenes: IndexSet<ResourceIdentity>,
    pub(crate) pending: PendingChanges,
    pub(crate) exists: bool,
    pub(crate) alive: bool,
    pub(crate) initialized: bool,
    pub(crate) batching: bool,
}

impl Resource {
    /// A resource known to the bridge (from a snapshot or stream event).
    pub fn new(identity: ResourceIdentity) -> Self {
        Self {
            identity,
            id_v1: None,
            data: Map::new(),
            owner: None,
            device_kind: None,
            services: IndexSet::new(),
            children: IndexSet::new(),
            scenes: IndexSet::new(),
            pending: PendingChanges::default(),
            exists: true,
            alive: true,
            initialized: false,
            batching: false,
        }
    }

    /// A resource that has no server-assigned identity yet.
    pub fn draft(identity: ResourceIdentity) -> Self {
        Self {
            exists: false,
            ..Self::new(identity)
        }
    }

    /// Build from a full document.
    pub fn from_document(doc: &Value) -> Option<Self> {
        let mut resource = Self::new(ResourceIdentity::from_document(doc)?);
        resource.set_data(doc);
        Some(resource)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn category(&self) -> Category {
        self.identity.category()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// `metadata.name`, when the resource has one.
    pub fn name(&self) -> Option<&str> {
        self.data.get("metadata")?.get("name")?.as_str()
    }

    pub fn id_v1(&self) -> Option<&str> {
        self.id_v1.as_deref().filter(|s| !s.is_empty())
    }

    pub fn owner(&self) -> Option<&ResourceIdentity> {
        self.owner.as_ref()
    }

    pub fn device_kind(&self) -> Option<DeviceKind> {
        self.device_kind
    }

    pub fn services(&self) -> impl Iterator<Item = &ResourceIdentity> {
        self.services.iter()
    }

    pub fn children(&self) -> impl Iterator<Item = &ResourceIdentity> {
        self.children.iter()
    }

    pub fn scenes(&self) -> impl Iterator<Item = &ResourceIdentity> {
        self.scenes.iter()
    }

    pub fn pending(&self) -> &PendingChanges {
        &self.pending
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_batching(&self) -> bool {
        self.batching
    }

    // ── Links ────────────────────────────────────────────────────────

    /// Set the owner. The first owner wins; later attempts are ignored.
    pub(crate) fn set_owner(&mut self, owner: ResourceIdentity) -> bool {
        match self.owner {
            None => {
                self.owner = Some(owner);
                true
            }
            Some(ref current) if *current == owner => true,
            Some(ref current) => {
                warn!(
                    identity = %self.identity,
                    owner = %current,
                    rejected = %owner,
                    "Ignoring owner reassignment"
                );
                false
            }
        }
    }

    /// Record the device kind. Frozen after the first call.
    pub(crate) fn init_device_kind(&mut self, kind: DeviceKind) {
        if self.device_kind.is_none() {
            self.device_kind = Some(kind);
        }
    }

    pub(crate) fn replace_device_kind(&mut self, kind: DeviceKind) {
        self.device_kind = Some(kind);
    }

    pub(crate) fn set_identity_id(&mut self, id: String) {
        self.identity.id = id;
    }

    pub(crate) fn set_id_v1(&mut self, id_v1: String) {
        self.id_v1 = Some(id_v1);
    }

    // ── Remote state ─────────────────────────────────────────────────

    /// Deep-merge a document or delta into canonical state.
    ///
    /// Objects merge key by key, everything else (arrays included) is
    /// replaced. Embedded `services`/`children` references and the legacy
    /// id follow the data. Returns whether anything changed.
    pub fn set_data(&mut self, delta: &Value) -> bool {
        let Some(delta) = delta.as_object() else {
            debug!(identity = %self.identity, "Ignoring non-object delta");
            return false;
        };

        let changed = merge_into(&mut self.data, delta);

        if let Some(id_v1) = delta.get("id_v1").and_then(Value::as_str) {
            self.id_v1 = Some(id_v1.to_owned());
        }
        if let Some(refs) = delta.get("services") {
            self.services = references(refs);
        }
        if let Some(refs) = delta.get("children") {
            self.children = references(refs);
        }
        let owner_ref = delta
            .get("owner")
            .or_else(|| delta.get("group"))
            .and_then(ResourceIdentity::from_reference);
        if let Some(owner) = owner_ref {
            self.set_owner(owner);
        }

        changed
    }

    /// Canonical state with the bridge-owned fields stripped, suitable for
    /// re-applying via [`set_data`](Self::set_data) or sending as a PUT.
    pub fn to_update_payload(&self) -> Value {
        let payload: Map<String, Value> = self
            .data
            .iter()
            .filter(|(k, _)| !READ_ONLY_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(payload)
    }

    // ── Local staging ────────────────────────────────────────────────

    pub(crate) fn stage_update(&mut self, patch: &Value) {
        if let Some(patch) = patch.as_object() {
            merge_into(&mut self.pending.update, patch);
        }
    }

    pub(crate) fn stage_legacy(&mut self, subpath: &str, patch: &Value) {
        if let Some(patch) = patch.as_object() {
            let buffer = self.pending.legacy.entry(subpath.to_owned()).or_default();
            merge_into(buffer, patch);
        }
    }

    pub(crate) fn stage_create(&mut self, patch: &Value) {
        if let Some(patch) = patch.as_object() {
            merge_into(&mut self.pending.create, patch);
        }
    }

    pub(crate) fn stage_create_legacy(&mut self, patch: &Value) {
        if let Some(patch) = patch.as_object() {
            merge_into(&mut self.pending.create_legacy, patch);
        }
    }
}

/// Deep merge `src` into `dst`. Returns whether `dst` changed.
pub(crate) fn merge_into(dst: &mut Map<String, Value>, src: &Map<String, Value>) -> bool {
    let mut changed = false;
    for (key, value) in src {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (dst.get_mut(key), value) {
            changed |= merge_into(existing, incoming);
            continue;
        }
        if dst.get(key) != Some(value) {
            dst.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

fn references(value: &Value) -> IndexSet<ResourceIdentity> {
    value
        .as_array()
        .map(|refs| {
            refs.iter()
                .filter_map(ResourceIdentity::from_reference)
                .collect()
        })
        .unwrap_or_default()
}
