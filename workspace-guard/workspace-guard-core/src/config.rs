//! Static configuration, read once at startup.

use crate::data_source::EditMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardConfig {
    pub workspace: WorkspaceConfig,
    pub data_source: DataSourceConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub enabled: bool,
    pub permission: PermissionConfig,
    pub dashboard_admin: DashboardAdminConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub enabled: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Static dashboard-admin allow-lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardAdminConfig {
    pub groups: Vec<String>,
    pub users: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSourceConfig {
    pub edit_mode: EditMode,
}

impl GuardConfig {
    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("parsing config {}", path.display()))
    }
}
