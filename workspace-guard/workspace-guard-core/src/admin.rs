//! Per-request dashboard-admin resolution.
//!
//! Runs once after authentication: the static allow-lists are checked
//! first, then the dynamic application configuration when one is wired.
//! The request state is written once, after both phases.

use crate::auth::AuthProvider;
use crate::config::DashboardAdminConfig;
use crate::principal::{is_dashboard_admin, principals_from_request, string_to_array};
use crate::request::Request;
use crate::state::{WorkspaceState, WorkspaceStateStore};
use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const DASHBOARD_ADMIN_GROUPS_KEY: &str = "workspace.dashboardAdmin.groups";
pub const DASHBOARD_ADMIN_USERS_KEY: &str = "workspace.dashboardAdmin.users";

/// Dynamic per-entity configuration store.
#[async_trait]
pub trait ApplicationConfigClient: Send + Sync {
    async fn get_entity_config(&self, entity: &str) -> anyhow::Result<String>;
}

#[derive(Default)]
pub struct InMemoryApplicationConfig {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryApplicationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, entity: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(entity.into(), value.into());
    }

    pub fn remove(&self, entity: &str) {
        self.entries.write().remove(entity);
    }
}

#[async_trait]
impl ApplicationConfigClient for InMemoryApplicationConfig {
    async fn get_entity_config(&self, entity: &str) -> anyhow::Result<String> {
        self.entries
            .read()
            .get(entity)
            .cloned()
            .ok_or_else(|| anyhow!("no configuration for {entity}"))
    }
}

/// A JSON list, or a bare value standing for a single entry.
fn entity_list(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.is_empty() {
        return Vec::new();
    }
    if value.starts_with('[') {
        return string_to_array(value);
    }
    vec![value.to_string()]
}

pub struct DashboardAdminResolver {
    config: DashboardAdminConfig,
    application_config: Option<Arc<dyn ApplicationConfigClient>>,
    auth: Arc<dyn AuthProvider>,
    state: Arc<WorkspaceStateStore>,
}

impl DashboardAdminResolver {
    pub fn new(
        config: DashboardAdminConfig,
        application_config: Option<Arc<dyn ApplicationConfigClient>>,
        auth: Arc<dyn AuthProvider>,
        state: Arc<WorkspaceStateStore>,
    ) -> Self {
        Self {
            config,
            application_config,
            auth,
            state,
        }
    }

    pub fn has_dynamic_config(&self) -> bool {
        self.application_config.is_some()
    }

    /// Classify `request` and record the verdict in its state.
    ///
    /// Returns `None`, leaving the state untouched, when the requester has
    /// no usable identity yet.
    pub async fn resolve(&self, request: &Request) -> Option<bool> {
        let principals = match principals_from_request(request, self.auth.as_ref()) {
            Ok(principals) => principals,
            Err(e) => {
                debug!(
                    request = %request.id(),
                    error = %e,
                    "no principals, admin state left unset"
                );
                return None;
            }
        };

        let is_admin = if principals.is_unrestricted() {
            false
        } else if is_dashboard_admin(&principals, &self.config.groups, &self.config.users) {
            true
        } else if let Some(client) = &self.application_config {
            let (groups, users) = futures::join!(
                client.get_entity_config(DASHBOARD_ADMIN_GROUPS_KEY),
                client.get_entity_config(DASHBOARD_ADMIN_USERS_KEY),
            );
            let groups = groups.map(|v| entity_list(&v)).unwrap_or_default();
            let users = users.map(|v| entity_list(&v)).unwrap_or_default();
            is_dashboard_admin(&principals, &groups, &users)
        } else {
            false
        };

        debug!(request = %request.id(), is_admin, "dashboard admin resolved");
        self.state.update(
            request,
            WorkspaceState {
                is_dashboard_admin: Some(is_admin),
                ..Default::default()
            },
        );
        Some(is_admin)
    }
}
