use crate::error::SavedObjectError;
use crate::permission::{PermissionMode, Permissions};
use crate::principal::Principals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved type of workspace documents.
pub const WORKSPACE_TYPE: &str = "workspace";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_PER_PAGE: usize = 20;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedObject {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SavedObjectError>,
}

impl SavedObject {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>, attributes: Value) -> Self {
        Self {
            id: id.into(),
            object_type: object_type.into(),
            attributes,
            ..Default::default()
        }
    }

    /// Bulk entry carrying only an error.
    pub fn from_error(
        object_type: impl Into<String>,
        id: impl Into<String>,
        error: SavedObjectError,
    ) -> Self {
        Self {
            id: id.into(),
            object_type: object_type.into(),
            attributes: Value::Null,
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_workspaces(mut self, workspaces: &[&str]) -> Self {
        self.workspaces = Some(workspaces.iter().map(|w| w.to_string()).collect());
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn workspaces(&self) -> &[String] {
        self.workspaces.as_deref().unwrap_or_default()
    }

    pub fn is_workspace(&self) -> bool {
        self.object_type == WORKSPACE_TYPE
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Neither workspace-owned nor ACL-owned.
    pub fn is_unowned(&self) -> bool {
        self.workspaces().is_empty() && self.permissions.is_none()
    }

    pub fn in_namespace(&self, namespace: &str) -> bool {
        match &self.namespaces {
            Some(namespaces) => namespaces.iter().any(|n| n == namespace),
            None => namespace == DEFAULT_NAMESPACE,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGetObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
}

impl BulkGetObject {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOptions {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkCreateObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub version: Option<String>,
    /// Overrides [`CreateOptions::workspaces`] for this object.
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

impl BulkCreateObject {
    pub fn new(object_type: impl Into<String>, id: Option<&str>, attributes: Value) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.map(str::to_string),
            attributes,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOptions {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Reassigns workspace membership when set.
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

impl BulkUpdateObject {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>, attributes: Value) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
            attributes,
            ..Default::default()
        }
    }
}

/// ACL part of a find query: objects whose own permissions grant any of
/// `permission_modes` to `principals` match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclSearchParams {
    pub principals: Principals,
    pub permission_modes: Vec<PermissionMode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default)]
    pub namespaces: Option<Vec<String>>,
    /// Restrict results to members of these workspaces.
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
    #[serde(default)]
    pub acl_search_params: Option<AclSearchParams>,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            search: None,
            page: default_page(),
            per_page: default_per_page(),
            namespaces: None,
            workspaces: None,
            acl_search_params: None,
        }
    }
}

impl FindOptions {
    pub fn of_type(object_type: impl Into<String>) -> Self {
        Self {
            types: vec![object_type.into()],
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FindResponse {
    pub saved_objects: Vec<SavedObject>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Result of a bulk call; always one entry per input item, in input order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkResponse {
    pub saved_objects: Vec<SavedObject>,
}

impl BulkResponse {
    pub fn errors(&self) -> impl Iterator<Item = &SavedObject> {
        self.saved_objects.iter().filter(|o| o.is_error())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConflictsObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConflictsError {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
    pub error: SavedObjectError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConflictsResponse {
    pub errors: Vec<CheckConflictsError>,
}
