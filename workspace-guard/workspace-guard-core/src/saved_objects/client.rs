use super::types::{
    BaseOptions, BulkCreateObject, BulkGetObject, BulkResponse, BulkUpdateObject,
    CheckConflictsObject, CheckConflictsResponse, CreateOptions, FindOptions, FindResponse,
    SavedObject, UpdateOptions,
};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// CRUD surface shared by the base repository and every wrapper.
///
/// Bulk calls return exactly one entry per input item, in input order;
/// per-item failures are reported in the entry's `error` field.
#[async_trait]
pub trait SavedObjectsClient: Send + Sync {
    async fn get(&self, object_type: &str, id: &str, options: &BaseOptions) -> Result<SavedObject>;

    async fn bulk_get(&self, objects: &[BulkGetObject], options: &BaseOptions)
        -> Result<BulkResponse>;

    async fn find(&self, options: &FindOptions) -> Result<FindResponse>;

    async fn create(
        &self,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject>;

    async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        options: &CreateOptions,
    ) -> Result<BulkResponse>;

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: &UpdateOptions,
    ) -> Result<SavedObject>;

    async fn bulk_update(
        &self,
        objects: Vec<BulkUpdateObject>,
        options: &BaseOptions,
    ) -> Result<BulkResponse>;

    async fn delete(&self, object_type: &str, id: &str, options: &BaseOptions) -> Result<()>;

    async fn check_conflicts(
        &self,
        objects: &[CheckConflictsObject],
        options: &BaseOptions,
    ) -> Result<CheckConflictsResponse>;

    async fn add_to_namespaces(
        &self,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        options: &BaseOptions,
    ) -> Result<Vec<String>>;

    async fn delete_from_namespaces(
        &self,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        options: &BaseOptions,
    ) -> Result<Vec<String>>;
}
