//! Workspace authorization wrapper.
//!
//! Single-target calls fail as a whole with `Forbidden`; bulk calls reject
//! denied items in place and forward the rest; `find` is scoped to the
//! workspaces the requester can read.

use crate::error::{Result, SavedObjectsError};
use crate::permission::{Access, PermissionMode, SavedObjectsPermissionControl};
use crate::principal::Principals;
use crate::request::Request;
use crate::saved_objects::bulk::Partition;
use crate::saved_objects::{
    AclSearchParams, BaseOptions, BulkCreateObject, BulkGetObject, BulkResponse, BulkUpdateObject,
    ClientWrapper, ClientWrapperFactory, CreateOptions, FindOptions, FindResponse, SavedObject,
    SavedObjectsClient, UpdateOptions, WrappedClient, WrapperOptions,
};
use crate::state::WorkspaceStateStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const WORKSPACE_SAVED_OBJECTS_CLIENT_WRAPPER_ID: &str = "workspace";

pub struct WorkspaceSavedObjectsClientWrapper {
    permission_control: Arc<SavedObjectsPermissionControl>,
    state: Arc<WorkspaceStateStore>,
}

impl WorkspaceSavedObjectsClientWrapper {
    pub fn new(
        permission_control: Arc<SavedObjectsPermissionControl>,
        state: Arc<WorkspaceStateStore>,
    ) -> Self {
        Self {
            permission_control,
            state,
        }
    }
}

impl ClientWrapperFactory for WorkspaceSavedObjectsClientWrapper {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient> {
        if self.state.is_dashboard_admin(&options.request) {
            debug!(
                request = %options.request.id(),
                "dashboard admin bypasses workspace authorization"
            );
            return options.client;
        }
        Arc::new(WrappedClient::new(
            options.client,
            WorkspaceAuthorization {
                request: options.request,
                control: Arc::clone(&self.permission_control),
                state: Arc::clone(&self.state),
            },
        ))
    }
}

struct WorkspaceAuthorization {
    request: Request,
    control: Arc<SavedObjectsPermissionControl>,
    state: Arc<WorkspaceStateStore>,
}

fn namespace_options(namespace: &Option<String>) -> BaseOptions {
    BaseOptions {
        namespace: namespace.clone(),
    }
}

fn rejected(object_type: &str, id: &str, access: Access) -> Option<SavedObject> {
    debug!(object_type, id, ?access, "rejecting bulk item");
    Some(SavedObject::from_error(
        object_type,
        id,
        SavedObjectsError::forbidden().to_rejected_item_error(),
    ))
}

impl WorkspaceAuthorization {
    /// Principals to check against, or `None` when checks are skipped for
    /// this call (dashboard admin or unrestricted requester).
    fn principals(&self) -> Result<Option<Principals>> {
        if self.state.is_dashboard_admin(&self.request) {
            return Ok(None);
        }
        let principals = self.control.principals_from_request(&self.request)?;
        Ok((!principals.is_unrestricted()).then_some(principals))
    }

    /// Fail unless the existing object (if any) grants `access`. Missing
    /// objects pass so the inner client can report them.
    async fn ensure_existing_permitted(
        &self,
        principals: &Principals,
        object_type: &str,
        id: &str,
        options: &BaseOptions,
        access: Access,
        targets: &[String],
    ) -> Result<()> {
        let refs = [BulkGetObject::new(object_type, id)];
        let existing = self.control.fetch(&refs, options).await?.pop().flatten();
        let acls = self
            .control
            .load_workspaces(
                targets
                    .iter()
                    .chain(existing.iter().flat_map(|o| o.workspaces())),
            )
            .await?;
        if !SavedObjectsPermissionControl::targets_permitted(targets, principals, access, &acls) {
            debug!(object_type, id, ?targets, "target workspaces not permitted");
            return Err(SavedObjectsError::forbidden());
        }
        if let Some(existing) = existing {
            if !SavedObjectsPermissionControl::is_permitted(&existing, principals, access, &acls) {
                debug!(object_type, id, ?access, "object not permitted");
                return Err(SavedObjectsError::forbidden());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ClientWrapper for WorkspaceAuthorization {
    async fn get(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        options: &BaseOptions,
    ) -> Result<SavedObject> {
        if let Some(principals) = self.principals()? {
            self.ensure_existing_permitted(&principals, object_type, id, options, Access::Read, &[])
                .await?;
        }
        client.get(object_type, id, options).await
    }

    async fn bulk_get(
        &self,
        client: &dyn SavedObjectsClient,
        objects: &[BulkGetObject],
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        let Some(principals) = self.principals()? else {
            return client.bulk_get(objects, options).await;
        };
        let existing = self.control.fetch(objects, options).await?;
        let acls = self
            .control
            .load_workspaces(existing.iter().flatten().flat_map(|o| o.workspaces()))
            .await?;
        let rejections = objects
            .iter()
            .zip(&existing)
            .map(|(reference, object)| match object {
                Some(object)
                    if !SavedObjectsPermissionControl::is_permitted(
                        object,
                        &principals,
                        Access::Read,
                        &acls,
                    ) =>
                {
                    rejected(&reference.object_type, &reference.id, Access::Read)
                }
                _ => None,
            })
            .collect();
        Partition::split(objects.to_vec(), rejections)
            .forward(|allowed| async move { client.bulk_get(&allowed, options).await })
            .await
    }

    async fn find(
        &self,
        client: &dyn SavedObjectsClient,
        options: &FindOptions,
    ) -> Result<FindResponse> {
        let Some(principals) = self.principals()? else {
            return client.find(options).await;
        };
        let allowed = self.control.get_allowed_workspace_ids(&principals).await?;
        let mut scoped = options.clone();
        match &options.workspaces {
            Some(requested) if !requested.is_empty() => {
                if let Some(denied) = requested.iter().find(|w| !allowed.contains(w)) {
                    debug!(workspace = %denied, "find names a workspace outside the allowed set");
                    return Err(SavedObjectsError::NotAuthorized(format!(
                        "Invalid workspaces: {denied}"
                    )));
                }
                scoped.acl_search_params = None;
            }
            _ => {
                scoped.workspaces = Some(allowed);
                scoped.acl_search_params = Some(AclSearchParams {
                    principals,
                    permission_modes: vec![PermissionMode::Read],
                });
            }
        }
        client.find(&scoped).await
    }

    async fn create(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        if let Some(principals) = self.principals()? {
            let targets = options.workspaces.clone().unwrap_or_default();
            match options.id.as_deref().filter(|_| options.overwrite) {
                Some(id) => {
                    self.ensure_existing_permitted(
                        &principals,
                        object_type,
                        id,
                        &namespace_options(&options.namespace),
                        Access::Write,
                        &targets,
                    )
                    .await?
                }
                None => {
                    let acls = self.control.load_workspaces(&targets).await?;
                    if !SavedObjectsPermissionControl::targets_permitted(
                        &targets,
                        &principals,
                        Access::Write,
                        &acls,
                    ) {
                        debug!(object_type, ?targets, "create into workspaces not permitted");
                        return Err(SavedObjectsError::forbidden());
                    }
                }
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
        let Some(principals) = self.principals()? else {
            return client.bulk_create(objects, options).await;
        };
        let lookups: Vec<Option<BulkGetObject>> = objects
            .iter()
            .map(|o| match &o.id {
                Some(id) if options.overwrite => Some(BulkGetObject::new(&o.object_type, id)),
                _ => None,
            })
            .collect();
        let refs: Vec<BulkGetObject> = lookups.iter().flatten().cloned().collect();
        let mut fetched = self
            .control
            .fetch(&refs, &namespace_options(&options.namespace))
            .await?
            .into_iter();
        let existing: Vec<Option<SavedObject>> = lookups
            .iter()
            .map(|lookup| lookup.as_ref().and_then(|_| fetched.next().flatten()))
            .collect();
        let targets: Vec<Vec<String>> = objects
            .iter()
            .map(|o| {
                o.workspaces
                    .clone()
                    .or_else(|| options.workspaces.clone())
                    .unwrap_or_default()
            })
            .collect();
        let acls = self
            .control
            .load_workspaces(
                targets
                    .iter()
                    .flatten()
                    .chain(existing.iter().flatten().flat_map(|o| o.workspaces())),
            )
            .await?;

        let rejections = objects
            .iter()
            .zip(targets.iter().zip(&existing))
            .map(|(object, (targets, existing))| {
                let targets_ok = SavedObjectsPermissionControl::targets_permitted(
                    targets,
                    &principals,
                    Access::Write,
                    &acls,
                );
                let existing_ok = existing.as_ref().map_or(true, |existing| {
                    SavedObjectsPermissionControl::is_permitted(
                        existing,
                        &principals,
                        Access::Write,
                        &acls,
                    )
                });
                if targets_ok && existing_ok {
                    None
                } else {
                    rejected(
                        &object.object_type,
                        object.id.as_deref().unwrap_or_default(),
                        Access::Write,
                    )
                }
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
        if let Some(principals) = self.principals()? {
            let targets = options.workspaces.clone().unwrap_or_default();
            self.ensure_existing_permitted(
                &principals,
                object_type,
                id,
                &namespace_options(&options.namespace),
                Access::Write,
                &targets,
            )
            .await?;
        }
        client.update(object_type, id, attributes, options).await
    }

    async fn bulk_update(
        &self,
        client: &dyn SavedObjectsClient,
        objects: Vec<BulkUpdateObject>,
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        let Some(principals) = self.principals()? else {
            return client.bulk_update(objects, options).await;
        };
        let refs: Vec<BulkGetObject> = objects
            .iter()
            .map(|o| BulkGetObject::new(&o.object_type, &o.id))
            .collect();
        let existing = self.control.fetch(&refs, options).await?;
        let acls = self
            .control
            .load_workspaces(existing.iter().flatten().flat_map(|o| o.workspaces()))
            .await?;
        let rejections = objects
            .iter()
            .zip(&existing)
            .map(|(object, current)| match current {
                Some(current)
                    if !SavedObjectsPermissionControl::is_permitted(
                        current,
                        &principals,
                        Access::Write,
                        &acls,
                    ) =>
                {
                    rejected(&object.object_type, &object.id, Access::Write)
                }
                _ => None,
            })
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
        if let Some(principals) = self.principals()? {
            self.ensure_existing_permitted(
                &principals,
                object_type,
                id,
                options,
                Access::Write,
                &[],
            )
            .await?;
        }
        client.delete(object_type, id, options).await
    }
}
