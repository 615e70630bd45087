// ── Drafts ──
//
// A resource that does not exist on the bridge yet. It lives outside the
// registry until `create()` succeeds; only then does the bridge register
// the assigned identity.

use std::fmt;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::debug;

use crate::bridge::Bridge;
use crate::error::CoreError;
use crate::handle::ResourceHandle;
use crate::model::{PendingChanges, Resource, ResourceIdentity, ResourceType};
use crate::mutation::CreatedResource;
use crate::mutation::create::{CreateResponse, plan_create};

pub struct ResourceDraft {
    bridge: Bridge,
    resource: Mutex<Resource>,
    legacy_collection: Option<String>,
}

impl fmt::Debug for ResourceDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resource = self.resource.lock();
        f.debug_struct("ResourceDraft")
            .field("identity", &resource.identity().to_string())
            .field("exists", &resource.exists())
            .field("legacy_collection", &self.legacy_collection)
            .finish_non_exhaustive()
    }
}

impl ResourceDraft {
    pub(crate) fn new(bridge: Bridge, rtype: ResourceType, legacy_collection: Option<String>) -> Self {
        Self {
            bridge,
            resource: Mutex::new(Resource::draft(ResourceIdentity::new(rtype, ""))),
            legacy_collection,
        }
    }

    /// Identity; the id is empty until a current-protocol create succeeds.
    pub fn identity(&self) -> ResourceIdentity {
        self.resource.lock().identity().clone()
    }

    /// Legacy id assigned by a legacy create.
    pub fn id_v1(&self) -> Option<String> {
        self.resource.lock().id_v1().map(str::to_owned)
    }

    pub fn exists(&self) -> bool {
        self.resource.lock().exists()
    }

    pub fn pending(&self) -> PendingChanges {
        self.resource.lock().pending().clone()
    }

    // ── Staging ──────────────────────────────────────────────────────

    /// Merge `patch` into the current-protocol create payload.
    pub fn stage(&self, patch: &Value) {
        self.resource.lock().stage_create(patch);
    }

    /// Merge `patch` into the legacy create payload.
    pub fn stage_legacy(&self, patch: &Value) {
        self.resource.lock().stage_create_legacy(patch);
    }

    pub fn set_name(&self, name: &str) {
        self.stage(&json!({"metadata": {"name": name}}));
    }

    pub fn set_group(&self, group: &ResourceIdentity) {
        self.stage(&json!({"group": {"rid": group.id, "rtype": group.rtype.as_str()}}));
    }

    /// Add or replace the staged action for `target`.
    pub fn set_action(&self, target: &ResourceIdentity, action: Value) {
        let mut resource = self.resource.lock();
        let mut actions: Vec<Value> = resource
            .pending()
            .create
            .get("actions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        actions.retain(|a| {
            a.get("target")
                .and_then(ResourceIdentity::from_reference)
                .is_none_or(|t| t != *target)
        });
        actions.push(json!({
            "target": {"rid": target.id, "rtype": target.rtype.as_str()},
            "action": action,
        }));
        resource.pending.create.insert("actions".into(), Value::Array(actions));
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// POST the staged payload. On failure the buffer is kept so a retry
    /// resends the same body.
    pub async fn create(&self) -> Result<CreatedResource, CoreError> {
        let (snapshot, request) = {
            let resource = self.resource.lock();
            let request = plan_create(&resource, self.legacy_collection.as_deref())?;
            (resource.clone(), request)
        };
        let rtype = snapshot.identity().rtype.clone();

        match self.bridge.send_create(rtype.as_str(), &request).await? {
            CreateResponse::Clip(assigned) => {
                let mut created = snapshot;
                created.set_identity_id(assigned.id.clone());
                let identity = self.bridge.register_created(created, request.body());
                {
                    let mut resource = self.resource.lock();
                    resource.set_identity_id(identity.id.clone());
                    resource.exists = true;
                    resource.pending.create.clear();
                    resource.pending.create_legacy.clear();
                }
                Ok(CreatedResource::Registered(ResourceHandle::new(
                    self.bridge.clone(),
                    identity,
                )))
            }
            CreateResponse::Legacy(id_v1) => {
                {
                    let mut resource = self.resource.lock();
                    resource.set_id_v1(id_v1.clone());
                    resource.exists = true;
                    resource.pending.create_legacy.clear();
                }
                debug!(id_v1 = %id_v1, "Legacy resource created");
                Ok(CreatedResource::Legacy { id_v1 })
            }
        }
    }

    /// Flush staged updates. Fails without I/O until the draft exists and
    /// has a resource id.
    pub async fn update(&self) -> Result<(), CoreError> {
        let identity = self.require_exists("update")?;
        self.bridge.flush_update(&identity).await
    }

    /// Delete on the bridge. Fails without I/O until the draft exists.
    pub async fn delete(&self) -> Result<(), CoreError> {
        let identity = self.require_exists("delete")?;
        self.bridge.delete_resource(&identity).await
    }

    /// Legacy-created drafts have no current-protocol id; they become
    /// addressable once the event stream reports the new resource.
    fn require_exists(&self, operation: &str) -> Result<ResourceIdentity, CoreError> {
        let resource = self.resource.lock();
        if resource.exists() && resource.identity().id.is_empty() {
            Err(CoreError::Unsupported {
                operation: format!("{operation}() before the resource id is known"),
                resource: resource
                    .id_v1()
                    .map_or_else(|| resource.identity().rtype.to_string(), str::to_owned),
            })
        } else if resource.exists() {
            Ok(resource.identity().clone())
        } else {
            Err(CoreError::invariant(format!(
                "{operation}() on a {} draft that does not exist on the bridge",
                resource.identity().rtype
            )))
        }
    }
}
