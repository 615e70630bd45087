// ── Create ──

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::bridge::Bridge;
use crate::error::CoreError;
use crate::handle::ResourceHandle;
use crate::model::resource::WRITE_ONLY_FIELDS;
use crate::model::{Category, Resource, ResourceIdentity};

/// Result of a successful `create()`.
#[derive(Debug, Clone)]
pub enum CreatedResource {
    /// Created through the current protocol and registered in the graph.
    Registered(ResourceHandle),
    /// Created through the legacy protocol. It joins the graph when the
    /// bridge announces it over the event stream.
    Legacy { id_v1: String },
}

/// What `create()` will send. Built from a clone of the buffer so a
/// failed request leaves it intact.
#[derive(Debug, Clone)]
pub(crate) enum CreateRequest {
    Clip { body: Map<String, Value> },
    Legacy { collection: String, body: Map<String, Value> },
}

impl CreateRequest {
    pub(crate) fn body(&self) -> &Map<String, Value> {
        match self {
            Self::Clip { body } | Self::Legacy { body, .. } => body,
        }
    }
}

/// Pick the buffer to send; the current protocol wins when both are
/// staged.
pub(crate) fn plan_create(
    resource: &Resource,
    legacy_collection: Option<&str>,
) -> Result<CreateRequest, CoreError> {
    let identity = resource.identity();
    if resource.exists() {
        return Err(CoreError::invariant(format!(
            "create() on {identity}, which already exists on the bridge"
        )));
    }

    let pending = resource.pending();
    if !pending.create.is_empty() {
        return Ok(CreateRequest::Clip {
            body: pending.create.clone(),
        });
    }
    if !pending.create_legacy.is_empty() {
        let collection =
            legacy_collection.ok_or_else(|| CoreError::unsupported("legacy create", identity))?;
        return Ok(CreateRequest::Legacy {
            collection: collection.to_owned(),
            body: pending.create_legacy.clone(),
        });
    }
    Err(CoreError::invariant(format!(
        "create() on {identity} with nothing staged"
    )))
}

/// Outcome of the request, before local reconciliation.
pub(crate) enum CreateResponse {
    Clip(ResourceIdentity),
    Legacy(String),
}

impl Bridge {
    pub(crate) async fn send_create(
        &self,
        resource_type: &str,
        request: &CreateRequest,
    ) -> Result<CreateResponse, CoreError> {
        match request {
            CreateRequest::Clip { body } => {
                let assigned = self
                    .inner
                    .clip
                    .create(resource_type, Value::Object(body.clone()))
                    .await?;
                let first = assigned.into_iter().next().ok_or_else(|| {
                    CoreError::Internal("bridge accepted create without returning an id".into())
                })?;
                Ok(CreateResponse::Clip(ResourceIdentity::from(first)))
            }
            CreateRequest::Legacy { collection, body } => {
                let id = self
                    .inner
                    .legacy
                    .post(collection, Value::Object(body.clone()))
                    .await?
                    .ok_or_else(|| {
                        CoreError::Internal("bridge accepted create without returning an id".into())
                    })?;
                let collection = collection.trim_end_matches('/');
                Ok(CreateResponse::Legacy(format!("{collection}/{id}")))
            }
        }
    }

    /// Register a freshly created resource. If an `add` event already put
    /// the same identity in the registry, that instance is kept and the
    /// accepted payload is merged into it.
    pub(crate) fn register_created(
        &self,
        mut resource: Resource,
        sent: &Map<String, Value>,
    ) -> ResourceIdentity {
        let identity = resource.identity().clone();
        let mut accepted = sent.clone();
        for field in WRITE_ONLY_FIELDS {
            accepted.remove(*field);
        }
        accepted.insert("id".into(), Value::String(identity.id.clone()));
        accepted.insert("type".into(), Value::String(identity.rtype.as_str().to_owned()));

        resource.set_data(&Value::Object(accepted.clone()));
        resource.exists = true;
        resource.alive = true;
        resource.initialized = true;
        resource.pending.create.clear();
        resource.pending.create_legacy.clear();

        let mut batch = self.inner.batch();
        let mut registry = self.inner.registry.write();

        let (entry, inserted) = registry.get_or_insert_with(&identity, |_| resource);
        if !inserted {
            entry.set_data(&Value::Object(accepted));
            entry.exists = true;
        }

        if identity.category() == Category::Container {
            let group = registry.get(&identity).and_then(Resource::owner).cloned();
            if let Some(group) = group.and_then(|g| registry.get_mut(&g)) {
                group.scenes.insert(identity.clone());
            }
        }

        if inserted {
            batch.created(&registry, &identity);
            info!(identity = %identity, "Resource created");
        } else {
            batch.changed(&registry, &identity);
            debug!(identity = %identity, "Created resource was already announced");
        }
        identity
    }
}
