use crate::error::Result;
use crate::request::Request;
use crate::saved_objects::{
    BulkCreateObject, BulkResponse, ClientWrapper, ClientWrapperFactory, CreateOptions,
    FindOptions, FindResponse, SavedObject, SavedObjectsClient, WrappedClient, WrapperOptions,
};
use crate::state::WorkspaceStateStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const WORKSPACE_ID_CONSUMER_WRAPPER_ID: &str = "workspace_id_consumer";

/// Applies the workspace named in the request URL as the default
/// `workspaces` of creates and finds that do not name any.
pub struct WorkspaceIdConsumerWrapper {
    state: Arc<WorkspaceStateStore>,
}

impl WorkspaceIdConsumerWrapper {
    pub fn new(state: Arc<WorkspaceStateStore>) -> Self {
        Self { state }
    }
}

impl ClientWrapperFactory for WorkspaceIdConsumerWrapper {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient> {
        Arc::new(WrappedClient::new(
            options.client,
            IdConsumer {
                request: options.request,
                state: Arc::clone(&self.state),
            },
        ))
    }
}

struct IdConsumer {
    request: Request,
    state: Arc<WorkspaceStateStore>,
}

impl IdConsumer {
    /// `Some(default)` when `current` is unset and the request names a workspace.
    fn default_workspaces(&self, current: &Option<Vec<String>>) -> Option<Vec<String>> {
        if current.as_ref().is_some_and(|w| !w.is_empty()) {
            return None;
        }
        self.state
            .request_workspace_id(&self.request)
            .map(|id| vec![id])
    }
}

#[async_trait]
impl ClientWrapper for IdConsumer {
    async fn create(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        match self.default_workspaces(&options.workspaces) {
            Some(workspaces) => {
                let options = CreateOptions {
                    workspaces: Some(workspaces),
                    ..options.clone()
                };
                client.create(object_type, attributes, &options).await
            }
            None => client.create(object_type, attributes, options).await,
        }
    }

    async fn bulk_create(
        &self,
        client: &dyn SavedObjectsClient,
        objects: Vec<BulkCreateObject>,
        options: &CreateOptions,
    ) -> Result<BulkResponse> {
        match self.default_workspaces(&options.workspaces) {
            Some(workspaces) => {
                let options = CreateOptions {
                    workspaces: Some(workspaces),
                    ..options.clone()
                };
                client.bulk_create(objects, &options).await
            }
            None => client.bulk_create(objects, options).await,
        }
    }

    async fn find(
        &self,
        client: &dyn SavedObjectsClient,
        options: &FindOptions,
    ) -> Result<FindResponse> {
        match self.default_workspaces(&options.workspaces) {
            Some(workspaces) => {
                let options = FindOptions {
                    workspaces: Some(workspaces),
                    ..options.clone()
                };
                client.find(&options).await
            }
            None => client.find(options).await,
        }
    }
}
