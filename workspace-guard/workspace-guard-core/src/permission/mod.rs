//! Permission control: ACL evaluation against resolved principals.
//!
//! A document is reachable through two independent paths, its owning
//! workspaces and its own ACL; either one granting is enough. Empty
//! principals are the unrestricted sentinel and always pass.

mod acl;

pub use acl::{Access, PermissionMode, Permissions};

use crate::auth::AuthProvider;
use crate::error::{Result, SavedObjectsError};
use crate::principal::{self, Principals};
use crate::request::Request;
use crate::saved_objects::{
    AclSearchParams, BaseOptions, BulkGetObject, FindOptions, SavedObject, SavedObjectsClient,
    WORKSPACE_TYPE,
};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

const WORKSPACE_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<PermissionMode>,
}

impl ValidateResult {
    pub fn allowed() -> Self {
        Self {
            success: true,
            missing: None,
        }
    }

    pub fn denied(missing: Option<PermissionMode>) -> Self {
        Self {
            success: false,
            missing,
        }
    }
}

/// ACLs of a set of workspaces, loaded once per call.
///
/// A workspace that was not found grants nothing. One stored without an
/// ACL grants everything.
#[derive(Clone, Debug, Default)]
pub struct WorkspaceAcls(HashMap<String, Option<Permissions>>);

impl WorkspaceAcls {
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn grants_any(&self, id: &str, principals: &Principals, modes: &[PermissionMode]) -> bool {
        match self.0.get(id) {
            None => false,
            Some(None) => true,
            Some(Some(permissions)) => permissions.has_any_permission(modes, principals),
        }
    }
}

pub struct SavedObjectsPermissionControl {
    repository: Arc<dyn SavedObjectsClient>,
    auth: Arc<dyn AuthProvider>,
}

impl SavedObjectsPermissionControl {
    /// `repository` must be the unwrapped base client.
    pub fn new(repository: Arc<dyn SavedObjectsClient>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { repository, auth }
    }

    pub fn principals_from_request(&self, request: &Request) -> Result<Principals> {
        principal::principals_from_request(request, self.auth.as_ref())
    }

    /// Check `modes` against the own ACL of every object (AND across modes
    /// and objects). Objects without an ACL do not restrict.
    pub fn validate_saved_objects_acl(
        objects: &[SavedObject],
        principals: &Principals,
        modes: &[PermissionMode],
    ) -> ValidateResult {
        if principals.is_unrestricted() {
            return ValidateResult::allowed();
        }
        for object in objects {
            let Some(permissions) = &object.permissions else {
                continue;
            };
            if let Some(missing) = permissions.missing_permission(modes, principals) {
                return ValidateResult::denied(Some(missing));
            }
        }
        ValidateResult::allowed()
    }

    /// Load `objects` and validate their ACLs for the requester. A target
    /// that does not exist fails validation.
    pub async fn validate(
        &self,
        request: &Request,
        objects: &[BulkGetObject],
        modes: &[PermissionMode],
    ) -> Result<ValidateResult> {
        let principals = self.principals_from_request(request)?;
        if principals.is_unrestricted() {
            return Ok(ValidateResult::allowed());
        }
        let mut found = Vec::with_capacity(objects.len());
        let fetched = self.fetch(objects, &BaseOptions::default()).await?;
        for (reference, object) in objects.iter().zip(fetched) {
            match object {
                Some(object) => found.push(object),
                None => {
                    debug!(
                        object_type = %reference.object_type,
                        id = %reference.id,
                        "validation target not found"
                    );
                    return Ok(ValidateResult::denied(modes.first().copied()));
                }
            }
        }
        Ok(Self::validate_saved_objects_acl(&found, &principals, modes))
    }

    /// Bulk-load objects from the base repository; not-found entries are `None`.
    pub async fn fetch(
        &self,
        objects: &[BulkGetObject],
        options: &BaseOptions,
    ) -> Result<Vec<Option<SavedObject>>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.repository.bulk_get(objects, options).await?;
        if response.saved_objects.len() != objects.len() {
            return Err(SavedObjectsError::Internal(anyhow!(
                "bulk_get returned {} entries for {} objects",
                response.saved_objects.len(),
                objects.len()
            )));
        }
        response
            .saved_objects
            .into_iter()
            .map(|object| match &object.error {
                None => Ok(Some(object)),
                Some(error) if error.status_code == 404 => Ok(None),
                Some(error) => Err(SavedObjectsError::Internal(anyhow!(
                    "failed to load {}/{}: {}",
                    object.object_type,
                    object.id,
                    error.message
                ))),
            })
            .collect()
    }

    pub async fn load_workspaces<'a, I>(&self, ids: I) -> Result<WorkspaceAcls>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let ids: BTreeSet<&String> = ids.into_iter().collect();
        let refs: Vec<BulkGetObject> = ids
            .iter()
            .map(|id| BulkGetObject::new(WORKSPACE_TYPE, id.as_str()))
            .collect();
        let fetched = self.fetch(&refs, &BaseOptions::default()).await?;
        Ok(WorkspaceAcls(
            fetched
                .into_iter()
                .flatten()
                .map(|workspace| (workspace.id, workspace.permissions))
                .collect(),
        ))
    }

    /// Whether `principals` may access `object` at `access` level, through
    /// either an owning workspace or the object's own ACL.
    pub fn is_permitted(
        object: &SavedObject,
        principals: &Principals,
        access: Access,
        workspaces: &WorkspaceAcls,
    ) -> bool {
        if principals.is_unrestricted() || object.is_unowned() {
            return true;
        }
        if object.is_workspace() {
            return match &object.permissions {
                Some(permissions) => {
                    permissions.has_any_permission(access.workspace_modes(), principals)
                }
                None => true,
            };
        }
        let via_workspace = object
            .workspaces()
            .iter()
            .any(|id| workspaces.grants_any(id, principals, access.library_modes()));
        let via_acl = object
            .permissions
            .as_ref()
            .is_some_and(|p| p.has_permission(access.object_modes(), principals));
        via_workspace || via_acl
    }

    /// Every workspace in `targets` must exist and grant `access`.
    pub fn targets_permitted(
        targets: &[String],
        principals: &Principals,
        access: Access,
        workspaces: &WorkspaceAcls,
    ) -> bool {
        principals.is_unrestricted()
            || targets
                .iter()
                .all(|id| workspaces.grants_any(id, principals, access.library_modes()))
    }

    /// Workspaces granting `library_read` or `read` to `principals`; all
    /// workspaces for unrestricted principals.
    pub async fn get_allowed_workspace_ids(&self, principals: &Principals) -> Result<Vec<String>> {
        let acl_search_params = (!principals.is_unrestricted()).then(|| AclSearchParams {
            principals: principals.clone(),
            permission_modes: vec![PermissionMode::LibraryRead, PermissionMode::Read],
        });
        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let options = FindOptions {
                types: vec![WORKSPACE_TYPE.to_string()],
                page,
                per_page: WORKSPACE_PAGE_SIZE,
                acl_search_params: acl_search_params.clone(),
                ..Default::default()
            };
            let response = self.repository.find(&options).await?;
            let fetched = response.saved_objects.len();
            ids.extend(response.saved_objects.into_iter().map(|w| w.id));
            if fetched < WORKSPACE_PAGE_SIZE || ids.len() >= response.total {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }
}
