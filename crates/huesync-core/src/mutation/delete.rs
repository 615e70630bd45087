// ── Delete ──

use tracing::info;

use crate::bridge::Bridge;
use crate::error::CoreError;
use crate::model::{Category, Resource, ResourceIdentity};

impl Bridge {
    /// DELETE `identity` on the bridge. The registry entry stays until a
    /// stream `delete` event or the next refresh sweeps it; only the
    /// scene-to-group link is dropped here.
    pub(crate) async fn delete_resource(&self, identity: &ResourceIdentity) -> Result<(), CoreError> {
        {
            let registry = self.inner.registry.read();
            let resource = registry.get(identity).ok_or_else(|| CoreError::NotFound {
                identity: identity.clone(),
            })?;
            if !resource.exists() {
                return Err(CoreError::invariant(format!(
                    "delete() on {identity}, which does not exist on the bridge"
                )));
            }
        }

        self.inner
            .clip
            .delete(identity.rtype.as_str(), &identity.id)
            .await?;

        let mut batch = self.inner.batch();
        let mut registry = self.inner.registry.write();

        let group = registry
            .get(identity)
            .filter(|r| r.category() == Category::Container)
            .and_then(Resource::owner)
            .cloned();
        if let Some(resource) = registry.get_mut(identity) {
            resource.exists = false;
            resource.batching = false;
        }
        if let Some(group) = group {
            let detached = registry
                .get_mut(&group)
                .is_some_and(|g| g.scenes.shift_remove(identity));
            if detached {
                batch.changed(&registry, &group);
            }
        }

        info!(identity = %identity, "Resource deleted");
        Ok(())
    }
}
