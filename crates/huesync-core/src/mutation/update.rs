// ── Batched update ──
//
// Buffers are drained into a plan while the registry lock is held, so they
// are empty before the first request leaves. Requests then fan out and the
// accepted current-protocol payloads are merged back in one batch.

use std::collections::HashSet;

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::batch::EventBatch;
use crate::bridge::Bridge;
use crate::error::CoreError;
use crate::model::ResourceIdentity;
use crate::model::resource::WRITE_ONLY_FIELDS;
use crate::store::Registry;

struct ClipWork {
    identity: ResourceIdentity,
    body: Map<String, Value>,
}

struct LegacyWork {
    identity: ResourceIdentity,
    legacy_id: String,
    subpath: Option<String>,
    body: Map<String, Value>,
}

#[derive(Default)]
struct UpdatePlan {
    clip: Vec<ClipWork>,
    legacy: Vec<LegacyWork>,
}

impl UpdatePlan {
    fn is_empty(&self) -> bool {
        self.clip.is_empty() && self.legacy.is_empty()
    }
}

impl Bridge {
    /// Flush everything staged on `identity` and on the services touched
    /// while it was batching.
    pub(crate) async fn flush_update(&self, identity: &ResourceIdentity) -> Result<(), CoreError> {
        let plan = {
            let mut registry = self.inner.registry.write();
            let root = registry.get(identity).ok_or_else(|| CoreError::NotFound {
                identity: identity.clone(),
            })?;
            if !root.exists() {
                return Err(CoreError::invariant(format!(
                    "update() on {identity}, which does not exist on the bridge"
                )));
            }
            let mut plan = UpdatePlan::default();
            drain_into(&mut registry, identity, &mut plan, &mut HashSet::new());
            plan
        };

        if plan.is_empty() {
            debug!(identity = %identity, "Nothing staged to update");
            return Ok(());
        }

        let clip_calls = plan.clip.iter().map(|work| {
            self.inner.clip.update(
                work.identity.rtype.as_str(),
                &work.identity.id,
                Value::Object(work.body.clone()),
            )
        });
        let legacy_calls = plan.legacy.iter().map(|work| {
            self.inner.legacy.put(
                &work.legacy_id,
                work.subpath.as_deref(),
                Value::Object(work.body.clone()),
            )
        });
        let (clip_results, legacy_results) = tokio::join!(join_all(clip_calls), join_all(legacy_calls));

        let mut first_error = None;
        {
            let mut batch = self.inner.batch();
            let mut registry = self.inner.registry.write();

            for (work, result) in plan.clip.iter().zip(clip_results) {
                match result {
                    Ok(_) => apply_accepted(&mut registry, &mut batch, work),
                    Err(e) => {
                        warn!(identity = %work.identity, error = %e, "Update rejected");
                        first_error.get_or_insert(CoreError::from(e));
                    }
                }
            }
            for (work, result) in plan.legacy.iter().zip(legacy_results) {
                if let Err(e) = result {
                    warn!(
                        identity = %work.identity,
                        legacy_id = %work.legacy_id,
                        subpath = ?work.subpath,
                        error = %e,
                        "Legacy update rejected"
                    );
                    first_error.get_or_insert(CoreError::from(e));
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// Take the buffers of `identity` and, recursively, of its pending
/// services. Services that vanished or no longer exist are skipped.
fn drain_into(
    registry: &mut Registry,
    identity: &ResourceIdentity,
    plan: &mut UpdatePlan,
    visited: &mut HashSet<ResourceIdentity>,
) {
    if !visited.insert(identity.clone()) {
        return;
    }
    let Some(resource) = registry.get_mut(identity).filter(|r| r.exists()) else {
        warn!(identity = %identity, "Dropping staged changes for a resource no longer on the bridge");
        return;
    };

    resource.batching = false;
    let services = std::mem::take(&mut resource.pending.services);
    let update = std::mem::take(&mut resource.pending.update);
    let legacy = std::mem::take(&mut resource.pending.legacy);
    let legacy_id = resource.id_v1().map(str::to_owned);

    if !update.is_empty() {
        plan.clip.push(ClipWork {
            identity: identity.clone(),
            body: update,
        });
    }

    for (subpath, body) in legacy.into_iter().filter(|(_, b)| !b.is_empty()) {
        let Some(legacy_id) = legacy_id.clone() else {
            warn!(identity = %identity, "Dropping legacy changes: resource has no legacy id");
            continue;
        };
        plan.legacy.push(LegacyWork {
            identity: identity.clone(),
            legacy_id,
            subpath: (!subpath.is_empty()).then_some(subpath),
            body,
        });
    }

    for service in services {
        drain_into(registry, &service, plan, visited);
    }
}

/// Merge an accepted payload into canonical state, minus write-only
/// commands.
fn apply_accepted(registry: &mut Registry, batch: &mut EventBatch, work: &ClipWork) {
    let mut accepted = work.body.clone();
    for field in WRITE_ONLY_FIELDS {
        accepted.remove(*field);
    }

    batch.start(registry, &work.identity);
    if let Some(resource) = registry.get_mut(&work.identity) {
        resource.set_data(&Value::Object(accepted));
    }
    batch.changed(registry, &work.identity);
}
