use super::{EditMode, DATA_SOURCE_SAVED_OBJECT_TYPE};
use crate::error::{Result, SavedObjectsError};
use crate::request::Request;
use crate::saved_objects::bulk::Partition;
use crate::saved_objects::{
    BaseOptions, BulkCreateObject, BulkResponse, BulkUpdateObject, ClientWrapper,
    ClientWrapperFactory, CreateOptions, SavedObject, SavedObjectsClient, UpdateOptions,
    WrappedClient, WrapperOptions,
};
use crate::state::WorkspaceStateStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const DATA_SOURCE_PERMISSION_WRAPPER_ID: &str = "data_source_permission";

/// Blocks create, update and delete of data-source objects according to
/// the configured [`EditMode`]. Other types always pass through.
pub struct DataSourcePermissionClientWrapper {
    edit_mode: EditMode,
    state: Arc<WorkspaceStateStore>,
}

impl DataSourcePermissionClientWrapper {
    pub fn new(edit_mode: EditMode, state: Arc<WorkspaceStateStore>) -> Self {
        Self { edit_mode, state }
    }
}

impl ClientWrapperFactory for DataSourcePermissionClientWrapper {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient> {
        if self.edit_mode == EditMode::AdminOnly && self.state.is_dashboard_admin(&options.request)
        {
            return options.client;
        }
        Arc::new(WrappedClient::new(
            options.client,
            EditModeGuard {
                edit_mode: self.edit_mode,
                request: options.request,
                state: Arc::clone(&self.state),
            },
        ))
    }
}

struct EditModeGuard {
    edit_mode: EditMode,
    request: Request,
    state: Arc<WorkspaceStateStore>,
}

impl EditModeGuard {
    fn denies(&self, object_type: &str) -> bool {
        if object_type != DATA_SOURCE_SAVED_OBJECT_TYPE || !self.edit_mode.restricts_writes() {
            return false;
        }
        !(self.edit_mode == EditMode::AdminOnly && self.state.is_dashboard_admin(&self.request))
    }

    fn check(&self, object_type: &str) -> Result<()> {
        if self.denies(object_type) {
            debug!(object_type, edit_mode = ?self.edit_mode, "data source write blocked");
            return Err(SavedObjectsError::forbidden());
        }
        Ok(())
    }

    fn rejection(&self, object_type: &str, id: &str) -> Option<SavedObject> {
        self.denies(object_type).then(|| {
            SavedObject::from_error(
                object_type,
                id,
                SavedObjectsError::forbidden().to_rejected_item_error(),
            )
        })
    }
}

#[async_trait]
impl ClientWrapper for EditModeGuard {
    async fn create(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        self.check(object_type)?;
        client.create(object_type, attributes, options).await
    }

    async fn bulk_create(
        &self,
        client: &dyn SavedObjectsClient,
        objects: Vec<BulkCreateObject>,
        options: &CreateOptions,
    ) -> Result<BulkResponse> {
        let rejections = objects
            .iter()
            .map(|o| self.rejection(&o.object_type, o.id.as_deref().unwrap_or_default()))
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
        self.check(object_type)?;
        client.update(object_type, id, attributes, options).await
    }

    async fn bulk_update(
        &self,
        client: &dyn SavedObjectsClient,
        objects: Vec<BulkUpdateObject>,
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        let rejections = objects
            .iter()
            .map(|o| self.rejection(&o.object_type, &o.id))
            .collect();
        Partition::split(objects, rejections)
            .forward(|allowed| async move { client.bulk_update(allowed, options).await })
            .await
    }

    async fn delete(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        options: &BaseOptions,
    ) -> Result<()> {
        self.check(object_type)?;
        client.delete(object_type, id, options).await
    }
}
