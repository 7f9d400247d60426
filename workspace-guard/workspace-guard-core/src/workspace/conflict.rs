use crate::error::{Result, SavedObjectsError};
use crate::saved_objects::bulk::Partition;
use crate::saved_objects::{
    BaseOptions, BulkCreateObject, BulkGetObject, BulkResponse, ClientWrapper,
    ClientWrapperFactory, CreateOptions, SavedObject, SavedObjectsClient, UpdateOptions,
    WrappedClient, WrapperOptions,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const WORKSPACE_CONFLICT_CONTROL_WRAPPER_ID: &str = "workspace_conflict_control";

/// Refuses writes that would move an existing object into workspaces it
/// does not already belong to.
pub struct WorkspaceConflictSavedObjectsClientWrapper {
    repository: Arc<dyn SavedObjectsClient>,
}

impl WorkspaceConflictSavedObjectsClientWrapper {
    /// `repository` must be the unwrapped base client.
    pub fn new(repository: Arc<dyn SavedObjectsClient>) -> Self {
        Self { repository }
    }
}

impl ClientWrapperFactory for WorkspaceConflictSavedObjectsClientWrapper {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient> {
        Arc::new(WrappedClient::new(
            options.client,
            ConflictControl {
                repository: Arc::clone(&self.repository),
            },
        ))
    }
}

struct ConflictControl {
    repository: Arc<dyn SavedObjectsClient>,
}

/// Targets must be a subset of the existing object's workspaces.
fn is_conflict(existing: &SavedObject, targets: &[String]) -> bool {
    let current = existing.workspaces();
    targets.iter().any(|w| !current.contains(w))
}

impl ConflictControl {
    async fn check(
        &self,
        object_type: &str,
        id: &str,
        targets: &[String],
        namespace: &Option<String>,
    ) -> Result<()> {
        let options = BaseOptions {
            namespace: namespace.clone(),
        };
        match self.repository.get(object_type, id, &options).await {
            Ok(existing) if is_conflict(&existing, targets) => {
                debug!(object_type, id, ?targets, "workspace conflict");
                Err(SavedObjectsError::conflict(object_type, id))
            }
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ClientWrapper for ConflictControl {
    async fn create(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        if let (true, Some(id), Some(targets)) =
            (options.overwrite, options.id.as_deref(), options.workspaces.as_deref())
        {
            if !targets.is_empty() {
                self.check(object_type, id, targets, &options.namespace)
                    .await?;
            }
        }
        client.create(object_type, attributes, options).await
    }

    async fn bulk_create(
        &self,
        client: &dyn SavedObjectsClient,
        objects: Vec<BulkCreateObject>,
        options: &CreateOptions,
    ) -> Result<BulkResponse> {
        if !options.overwrite {
            return client.bulk_create(objects, options).await;
        }
        let targets: Vec<Vec<String>> = objects
            .iter()
            .map(|o| {
                o.workspaces
                    .clone()
                    .or_else(|| options.workspaces.clone())
                    .unwrap_or_default()
            })
            .collect();
        let lookups: Vec<Option<BulkGetObject>> = objects
            .iter()
            .zip(&targets)
            .map(|(o, targets)| match &o.id {
                Some(id) if !targets.is_empty() => Some(BulkGetObject::new(&o.object_type, id)),
                _ => None,
            })
            .collect();
        let refs: Vec<BulkGetObject> = lookups.iter().flatten().cloned().collect();
        if refs.is_empty() {
            return client.bulk_create(objects, options).await;
        }
        let base = BaseOptions {
            namespace: options.namespace.clone(),
        };
        let mut fetched = self.repository.bulk_get(&refs, &base).await?.saved_objects.into_iter();
        let rejections = lookups
            .iter()
            .zip(&targets)
            .map(|(lookup, targets)| {
                let reference = lookup.as_ref()?;
                let existing = fetched.next().filter(|o| !o.is_error())?;
                if !is_conflict(&existing, targets) {
                    return None;
                }
                debug!(
                    object_type = %reference.object_type,
                    id = %reference.id,
                    "workspace conflict in bulk create"
                );
                Some(SavedObject::from_error(
                    &reference.object_type,
                    &reference.id,
                    SavedObjectsError::conflict(&reference.object_type, &reference.id)
                        .to_rejected_item_error(),
                ))
            })
            .collect();
        Partition::split(objects, rejections)
            .forward(|allowed| async move { client.bulk_create(allowed, options).await })
            .await
    }

    async fn update(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: &UpdateOptions,
    ) -> Result<SavedObject> {
        if let Some(targets) = options.workspaces.as_deref().filter(|t| !t.is_empty()) {
            self.check(object_type, id, targets, &options.namespace)
                .await?;
        }
        client.update(object_type, id, attributes, options).await
    }
}
