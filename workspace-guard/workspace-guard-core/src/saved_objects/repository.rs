//! In-process saved-objects repository.
//! Objects are kept in memory and, when opened on a directory, mirrored to
//! one JSON file per object and loaded again at startup.

use super::client::SavedObjectsClient;
use super::types::{
    AclSearchParams, BaseOptions, BulkCreateObject, BulkGetObject, BulkResponse,
    BulkUpdateObject, CheckConflictsError, CheckConflictsObject, CheckConflictsResponse,
    CreateOptions, FindOptions, FindResponse, SavedObject, UpdateOptions, DEFAULT_NAMESPACE,
};
use crate::error::{Result, SavedObjectsError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

type ObjectKey = (String, String);

fn key(object_type: &str, id: &str) -> ObjectKey {
    (object_type.to_string(), id.to_string())
}

#[derive(Default)]
pub struct SavedObjectsRepository {
    objects: RwLock<BTreeMap<ObjectKey, SavedObject>>,
    dir: Option<PathBuf>,
    version: AtomicU64,
}

impl SavedObjectsRepository {
    /// Memory-only repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository persisted under `dir`; existing objects are loaded.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut objects = BTreeMap::new();
        let mut version = 0;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<SavedObject>(&data) {
                Ok(object) => {
                    if let Some(v) = object.version.as_deref().and_then(|v| v.parse().ok()) {
                        version = version.max(v);
                    }
                    objects.insert(key(&object.object_type, &object.id), object);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable saved object"
                    )
                }
            }
        }
        debug!(dir = %dir.display(), count = objects.len(), "loaded saved objects");
        Ok(Self {
            objects: RwLock::new(objects),
            dir: Some(dir),
            version: AtomicU64::new(version),
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn path(&self, object_type: &str, id: &str) -> Option<PathBuf> {
        let stem = URL_SAFE_NO_PAD.encode(format!("{object_type}:{id}"));
        self.dir.as_ref().map(|dir| dir.join(format!("{stem}.json")))
    }

    fn persist(&self, object: &SavedObject) -> anyhow::Result<()> {
        if let Some(path) = self.path(&object.object_type, &object.id) {
            std::fs::write(path, serde_json::to_vec_pretty(object)?)?;
        }
        Ok(())
    }

    fn unpersist(&self, object_type: &str, id: &str) -> anyhow::Result<()> {
        if let Some(path) = self.path(object_type, id) {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn get_object(
        &self,
        object_type: &str,
        id: &str,
        options: &BaseOptions,
    ) -> Result<SavedObject> {
        let namespace = options.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        self.objects
            .read()
            .get(&key(object_type, id))
            .filter(|o| o.in_namespace(namespace))
            .cloned()
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))
    }

    fn create_object(
        &self,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        let id = options
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut objects = self.objects.write();
        if let Some(existing) = objects.get(&key(object_type, &id)) {
            let stale = options
                .version
                .as_ref()
                .is_some_and(|v| existing.version.as_ref() != Some(v));
            if !options.overwrite || stale {
                return Err(SavedObjectsError::conflict(object_type, id));
            }
        }
        let object = SavedObject {
            id,
            object_type: object_type.to_string(),
            attributes,
            workspaces: options.workspaces.clone(),
            permissions: options.permissions.clone(),
            namespaces: options.namespace.clone().map(|n| vec![n]),
            version: Some(self.next_version()),
            updated_at: Some(Utc::now()),
            error: None,
        };
        self.persist(&object)?;
        objects.insert(key(object_type, &object.id), object.clone());
        Ok(object)
    }

    fn update_object(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: &UpdateOptions,
    ) -> Result<SavedObject> {
        let namespace = options.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        let mut objects = self.objects.write();
        let existing = objects
            .get_mut(&key(object_type, id))
            .filter(|o| o.in_namespace(namespace))
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))?;
        if let Some(version) = &options.version {
            if existing.version.as_ref() != Some(version) {
                return Err(SavedObjectsError::conflict(object_type, id));
            }
        }
        let mut updated = existing.clone();
        merge_attributes(&mut updated.attributes, attributes);
        if let Some(workspaces) = &options.workspaces {
            updated.workspaces = Some(workspaces.clone());
        }
        if let Some(permissions) = &options.permissions {
            updated.permissions = Some(permissions.clone());
        }
        updated.version = Some(self.next_version());
        updated.updated_at = Some(Utc::now());
        self.persist(&updated)?;
        *existing = updated.clone();
        Ok(updated)
    }

    fn matches(object: &SavedObject, options: &FindOptions) -> bool {
        if !options.types.is_empty() && !options.types.contains(&object.object_type) {
            return false;
        }
        if let Some(namespaces) = &options.namespaces {
            if !namespaces.iter().any(|n| object.in_namespace(n)) {
                return false;
            }
        }
        if let Some(search) = &options.search {
            if !contains_text(&object.attributes, &search.to_lowercase()) {
                return false;
            }
        }
        in_scope(
            object,
            options.workspaces.as_deref(),
            options.acl_search_params.as_ref(),
        )
    }
}

/// Workspace and ACL scoping of a find: any listed clause matching is enough.
fn in_scope(
    object: &SavedObject,
    workspaces: Option<&[String]>,
    acl: Option<&AclSearchParams>,
) -> bool {
    if workspaces.is_none() && acl.is_none() {
        return true;
    }
    if let Some(workspaces) = workspaces {
        if object.workspaces().iter().any(|w| workspaces.contains(w)) {
            return true;
        }
        if object.is_workspace() && workspaces.contains(&object.id) {
            return true;
        }
    }
    if let Some(acl) = acl {
        if object.is_unowned() {
            return true;
        }
        if object
            .permissions
            .as_ref()
            .is_some_and(|p| p.has_any_permission(&acl.permission_modes, &acl.principals))
        {
            return true;
        }
    }
    false
}

fn merge_attributes(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                target.insert(k, v);
            }
        }
        (target, patch) => *target = patch,
    }
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
        _ => false,
    }
}

#[async_trait]
impl SavedObjectsClient for SavedObjectsRepository {
    async fn get(&self, object_type: &str, id: &str, options: &BaseOptions) -> Result<SavedObject> {
        self.get_object(object_type, id, options)
    }

    async fn bulk_get(
        &self,
        objects: &[BulkGetObject],
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        let saved_objects = objects
            .iter()
            .map(|o| {
                self.get_object(&o.object_type, &o.id, options)
                    .unwrap_or_else(|e| {
                        SavedObject::from_error(&o.object_type, &o.id, e.to_item_error())
                    })
            })
            .collect();
        Ok(BulkResponse { saved_objects })
    }

    async fn find(&self, options: &FindOptions) -> Result<FindResponse> {
        let page = options.page.max(1);
        let per_page = options.per_page;
        let objects = self.objects.read();
        let matching: Vec<&SavedObject> = objects
            .values()
            .filter(|o| Self::matches(o, options))
            .collect();
        let total = matching.len();
        let saved_objects = matching
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();
        Ok(FindResponse {
            saved_objects,
            total,
            page,
            per_page,
        })
    }

    async fn create(
        &self,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        self.create_object(object_type, attributes, options)
    }

    async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        options: &CreateOptions,
    ) -> Result<BulkResponse> {
        let saved_objects = objects
            .into_iter()
            .map(|o| {
                let item_options = CreateOptions {
                    id: o.id.clone(),
                    overwrite: options.overwrite,
                    namespace: options.namespace.clone(),
                    version: o.version,
                    workspaces: o.workspaces.or_else(|| options.workspaces.clone()),
                    permissions: o.permissions.or_else(|| options.permissions.clone()),
                };
                self.create_object(&o.object_type, o.attributes, &item_options)
                    .unwrap_or_else(|e| {
                        SavedObject::from_error(
                            &o.object_type,
                            o.id.unwrap_or_default(),
                            e.to_item_error(),
                        )
                    })
            })
            .collect();
        Ok(BulkResponse { saved_objects })
    }

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: &UpdateOptions,
    ) -> Result<SavedObject> {
        self.update_object(object_type, id, attributes, options)
    }

    async fn bulk_update(
        &self,
        objects: Vec<BulkUpdateObject>,
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        let saved_objects = objects
            .into_iter()
            .map(|o| {
                let item_options = UpdateOptions {
                    namespace: options.namespace.clone(),
                    version: o.version,
                    workspaces: None,
                    permissions: o.permissions,
                };
                self.update_object(&o.object_type, &o.id, o.attributes, &item_options)
                    .unwrap_or_else(|e| {
                        SavedObject::from_error(&o.object_type, &o.id, e.to_item_error())
                    })
            })
            .collect();
        Ok(BulkResponse { saved_objects })
    }

    async fn delete(&self, object_type: &str, id: &str, options: &BaseOptions) -> Result<()> {
        let namespace = options.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        let mut objects = self.objects.write();
        let k = key(object_type, id);
        if !objects.get(&k).is_some_and(|o| o.in_namespace(namespace)) {
            return Err(SavedObjectsError::not_found(object_type, id));
        }
        self.unpersist(object_type, id)?;
        objects.remove(&k);
        Ok(())
    }

    async fn check_conflicts(
        &self,
        objects: &[CheckConflictsObject],
        _options: &BaseOptions,
    ) -> Result<CheckConflictsResponse> {
        let existing = self.objects.read();
        let errors = objects
            .iter()
            .filter(|o| existing.contains_key(&key(&o.object_type, &o.id)))
            .map(|o| CheckConflictsError {
                object_type: o.object_type.clone(),
                id: o.id.clone(),
                error: SavedObjectsError::conflict(&o.object_type, &o.id).to_item_error(),
            })
            .collect();
        Ok(CheckConflictsResponse { errors })
    }

    async fn add_to_namespaces(
        &self,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        _options: &BaseOptions,
    ) -> Result<Vec<String>> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(&key(object_type, id))
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))?;
        let mut updated = object.clone();
        let current = updated
            .namespaces
            .get_or_insert_with(|| vec![DEFAULT_NAMESPACE.to_string()]);
        for namespace in namespaces {
            if !current.contains(namespace) {
                current.push(namespace.clone());
            }
        }
        updated.version = Some(self.next_version());
        self.persist(&updated)?;
        *object = updated;
        Ok(object.namespaces.clone().unwrap_or_default())
    }

    async fn delete_from_namespaces(
        &self,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        _options: &BaseOptions,
    ) -> Result<Vec<String>> {
        let mut objects = self.objects.write();
        let k = key(object_type, id);
        let object = objects
            .get_mut(&k)
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))?;
        let mut remaining = object
            .namespaces
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_NAMESPACE.to_string()]);
        remaining.retain(|n| !namespaces.contains(n));
        if remaining.is_empty() {
            self.unpersist(object_type, id)?;
            objects.remove(&k);
            return Ok(remaining);
        }
        let mut updated = object.clone();
        updated.namespaces = Some(remaining.clone());
        updated.version = Some(self.next_version());
        self.persist(&updated)?;
        *object = updated;
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests;
