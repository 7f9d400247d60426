//! Workspace isolation: wrapper registration, request routing and
//! capabilities.

mod authorization;
mod conflict;
mod id_consumer;

pub use authorization::{
    WorkspaceSavedObjectsClientWrapper, WORKSPACE_SAVED_OBJECTS_CLIENT_WRAPPER_ID,
};
pub use conflict::{
    WorkspaceConflictSavedObjectsClientWrapper, WORKSPACE_CONFLICT_CONTROL_WRAPPER_ID,
};
pub use id_consumer::{WorkspaceIdConsumerWrapper, WORKSPACE_ID_CONSUMER_WRAPPER_ID};

use crate::admin::{ApplicationConfigClient, DashboardAdminResolver};
use crate::auth::AuthProvider;
use crate::config::WorkspaceConfig;
use crate::permission::SavedObjectsPermissionControl;
use crate::request::{clean_workspace_id, workspace_id_from_url, Request};
use crate::saved_objects::{SavedObjectsClient, SavedObjectsClientProvider};
use crate::state::{WorkspaceState, WorkspaceStateStore};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const WORKSPACE_AUTHORIZATION_PRIORITY: i32 = 0;
pub const WORKSPACE_CONFLICT_CONTROL_PRIORITY: i32 = 2;
pub const WORKSPACE_ID_CONSUMER_PRIORITY: i32 = 3;

/// Random URL-safe id of exactly `size` characters.
pub fn generate_random_id(size: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(size)
        .map(char::from)
        .collect()
}

/// Strip a `/w/{id}` prefix from `request` and remember `{id}` in its state.
pub fn route_workspace_request(
    state: &WorkspaceStateStore,
    request: &mut Request,
) -> Option<String> {
    let workspace_id = workspace_id_from_url(request.path())?;
    let path = clean_workspace_id(request.path());
    debug!(%workspace_id, %path, "routing workspace request");
    request.set_path(path);
    state.update(
        request,
        WorkspaceState {
            request_workspace_id: Some(workspace_id.clone()),
            ..Default::default()
        },
    );
    Some(workspace_id)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub workspaces: WorkspaceCapabilities,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceCapabilities {
    pub enabled: bool,
    pub permission_enabled: bool,
}

pub struct SetupDeps<'a> {
    pub provider: &'a mut SavedObjectsClientProvider,
    pub auth: Arc<dyn AuthProvider>,
    pub state: Arc<WorkspaceStateStore>,
    pub application_config: Option<Arc<dyn ApplicationConfigClient>>,
}

/// What [`WorkspacePlugin::setup`] leaves behind for request admission.
pub struct WorkspaceSetup {
    pub capabilities: Capabilities,
    /// Present when permission control is enabled.
    pub admin_resolver: Option<Arc<DashboardAdminResolver>>,
    pub permission_control: Option<Arc<SavedObjectsPermissionControl>>,
}

pub struct WorkspacePlugin {
    config: WorkspaceConfig,
}

impl WorkspacePlugin {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    pub fn setup(&self, deps: SetupDeps<'_>) -> anyhow::Result<WorkspaceSetup> {
        if !self.config.enabled {
            info!("Workspaces disabled");
            return Ok(WorkspaceSetup {
                capabilities: Capabilities::default(),
                admin_resolver: None,
                permission_control: None,
            });
        }
        info!("Setting up workspaces");
        let repository: Arc<dyn SavedObjectsClient> = deps.provider.base();

        deps.provider.add_client_wrapper(
            WORKSPACE_CONFLICT_CONTROL_PRIORITY,
            WORKSPACE_CONFLICT_CONTROL_WRAPPER_ID,
            Arc::new(WorkspaceConflictSavedObjectsClientWrapper::new(Arc::clone(&repository))),
        )?;
        deps.provider.add_client_wrapper(
            WORKSPACE_ID_CONSUMER_PRIORITY,
            WORKSPACE_ID_CONSUMER_WRAPPER_ID,
            Arc::new(WorkspaceIdConsumerWrapper::new(Arc::clone(&deps.state))),
        )?;

        let permission_enabled = self.config.permission.enabled;
        info!("Workspace permission control enabled: {permission_enabled}");
        let (admin_resolver, permission_control) = if permission_enabled {
            info!(
                "Dynamic application configuration enabled: {}",
                deps.application_config.is_some()
            );
            let control = Arc::new(SavedObjectsPermissionControl::new(
                repository,
                Arc::clone(&deps.auth),
            ));
            deps.provider.add_client_wrapper(
                WORKSPACE_AUTHORIZATION_PRIORITY,
                WORKSPACE_SAVED_OBJECTS_CLIENT_WRAPPER_ID,
                Arc::new(WorkspaceSavedObjectsClientWrapper::new(
                    Arc::clone(&control),
                    Arc::clone(&deps.state),
                )),
            )?;
            let resolver = Arc::new(DashboardAdminResolver::new(
                self.config.dashboard_admin.clone(),
                deps.application_config,
                deps.auth,
                deps.state,
            ));
            (Some(resolver), Some(control))
        } else {
            (None, None)
        };

        Ok(WorkspaceSetup {
            capabilities: Capabilities {
                workspaces: WorkspaceCapabilities {
                    enabled: true,
                    permission_enabled,
                },
            },
            admin_resolver,
            permission_control,
        })
    }
}
