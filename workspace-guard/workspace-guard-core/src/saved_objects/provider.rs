//! Wrapper composition: builds the per-request client out of the base
//! repository and the registered wrapper factories.

use super::client::SavedObjectsClient;
use super::types::{
    BaseOptions, BulkCreateObject, BulkGetObject, BulkResponse, BulkUpdateObject,
    CheckConflictsObject, CheckConflictsResponse, CreateOptions, FindOptions, FindResponse,
    SavedObject, UpdateOptions,
};
use crate::error::Result;
use crate::request::Request;
use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct WrapperOptions {
    /// Client produced by the next wrapper towards the base.
    pub client: Arc<dyn SavedObjectsClient>,
    pub request: Request,
}

pub trait ClientWrapperFactory: Send + Sync {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient>;
}

impl<F> ClientWrapperFactory for F
where
    F: Fn(WrapperOptions) -> Arc<dyn SavedObjectsClient> + Send + Sync,
{
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient> {
        self(options)
    }
}

/// Interception hooks of one wrapper. Every hook receives the inner client
/// and forwards to it unchanged unless overridden.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    async fn get(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        options: &BaseOptions,
    ) -> Result<SavedObject> {
        client.get(object_type, id, options).await
    }

    async fn bulk_get(
        &self,
        client: &dyn SavedObjectsClient,
        objects: &[BulkGetObject],
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        client.bulk_get(objects, options).await
    }

    async fn find(
        &self,
        client: &dyn SavedObjectsClient,
        options: &FindOptions,
    ) -> Result<FindResponse> {
        client.find(options).await
    }

    async fn create(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        client.create(object_type, attributes, options).await
    }

    async fn bulk_create(
        &self,
        client: &dyn SavedObjectsClient,
        objects: Vec<BulkCreateObject>,
        options: &CreateOptions,
    ) -> Result<BulkResponse> {
        client.bulk_create(objects, options).await
    }

    async fn update(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: &UpdateOptions,
    ) -> Result<SavedObject> {
        client.update(object_type, id, attributes, options).await
    }

    async fn bulk_update(
        &self,
        client: &dyn SavedObjectsClient,
        objects: Vec<BulkUpdateObject>,
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        client.bulk_update(objects, options).await
    }

    async fn delete(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        options: &BaseOptions,
    ) -> Result<()> {
        client.delete(object_type, id, options).await
    }

    async fn check_conflicts(
        &self,
        client: &dyn SavedObjectsClient,
        objects: &[CheckConflictsObject],
        options: &BaseOptions,
    ) -> Result<CheckConflictsResponse> {
        client.check_conflicts(objects, options).await
    }

    async fn add_to_namespaces(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        options: &BaseOptions,
    ) -> Result<Vec<String>> {
        client
            .add_to_namespaces(object_type, id, namespaces, options)
            .await
    }

    async fn delete_from_namespaces(
        &self,
        client: &dyn SavedObjectsClient,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        options: &BaseOptions,
    ) -> Result<Vec<String>> {
        client
            .delete_from_namespaces(object_type, id, namespaces, options)
            .await
    }
}

/// A [`ClientWrapper`] bound to the client it wraps.
pub struct WrappedClient<W> {
    inner: Arc<dyn SavedObjectsClient>,
    wrapper: W,
}

impl<W: ClientWrapper> WrappedClient<W> {
    pub fn new(inner: Arc<dyn SavedObjectsClient>, wrapper: W) -> Self {
        Self { inner, wrapper }
    }
}

#[async_trait]
impl<W: ClientWrapper> SavedObjectsClient for WrappedClient<W> {
    async fn get(&self, object_type: &str, id: &str, options: &BaseOptions) -> Result<SavedObject> {
        self.wrapper
            .get(self.inner.as_ref(), object_type, id, options)
            .await
    }

    async fn bulk_get(
        &self,
        objects: &[BulkGetObject],
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        self.wrapper
            .bulk_get(self.inner.as_ref(), objects, options)
            .await
    }

    async fn find(&self, options: &FindOptions) -> Result<FindResponse> {
        self.wrapper.find(self.inner.as_ref(), options).await
    }

    async fn create(
        &self,
        object_type: &str,
        attributes: Value,
        options: &CreateOptions,
    ) -> Result<SavedObject> {
        self.wrapper
            .create(self.inner.as_ref(), object_type, attributes, options)
            .await
    }

    async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        options: &CreateOptions,
    ) -> Result<BulkResponse> {
        self.wrapper
            .bulk_create(self.inner.as_ref(), objects, options)
            .await
    }

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: &UpdateOptions,
    ) -> Result<SavedObject> {
        self.wrapper
            .update(self.inner.as_ref(), object_type, id, attributes, options)
            .await
    }

    async fn bulk_update(
        &self,
        objects: Vec<BulkUpdateObject>,
        options: &BaseOptions,
    ) -> Result<BulkResponse> {
        self.wrapper
            .bulk_update(self.inner.as_ref(), objects, options)
            .await
    }

    async fn delete(&self, object_type: &str, id: &str, options: &BaseOptions) -> Result<()> {
        self.wrapper
            .delete(self.inner.as_ref(), object_type, id, options)
            .await
    }

    async fn check_conflicts(
        &self,
        objects: &[CheckConflictsObject],
        options: &BaseOptions,
    ) -> Result<CheckConflictsResponse> {
        self.wrapper
            .check_conflicts(self.inner.as_ref(), objects, options)
            .await
    }

    async fn add_to_namespaces(
        &self,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        options: &BaseOptions,
    ) -> Result<Vec<String>> {
        self.wrapper
            .add_to_namespaces(self.inner.as_ref(), object_type, id, namespaces, options)
            .await
    }

    async fn delete_from_namespaces(
        &self,
        object_type: &str,
        id: &str,
        namespaces: &[String],
        options: &BaseOptions,
    ) -> Result<Vec<String>> {
        self.wrapper
            .delete_from_namespaces(self.inner.as_ref(), object_type, id, namespaces, options)
            .await
    }
}

struct RegisteredWrapper {
    priority: i32,
    id: String,
    factory: Arc<dyn ClientWrapperFactory>,
}

/// Registry of wrapper factories around one base client.
///
/// Lower priorities wrap closer to the base, so requests reach them last.
/// Equal priorities keep registration order.
pub struct SavedObjectsClientProvider {
    base: Arc<dyn SavedObjectsClient>,
    wrappers: Vec<RegisteredWrapper>,
}

impl SavedObjectsClientProvider {
    pub fn new(base: Arc<dyn SavedObjectsClient>) -> Self {
        Self {
            base,
            wrappers: Vec::new(),
        }
    }

    pub fn base(&self) -> Arc<dyn SavedObjectsClient> {
        Arc::clone(&self.base)
    }

    pub fn add_client_wrapper(
        &mut self,
        priority: i32,
        id: impl Into<String>,
        factory: Arc<dyn ClientWrapperFactory>,
    ) -> anyhow::Result<()> {
        let id = id.into();
        if self.wrappers.iter().any(|w| w.id == id) {
            bail!("wrapper factory with id {id} is already defined");
        }
        debug!(%id, priority, "registering saved objects client wrapper");
        let position = self
            .wrappers
            .iter()
            .position(|w| w.priority > priority)
            .unwrap_or(self.wrappers.len());
        self.wrappers.insert(
            position,
            RegisteredWrapper {
                priority,
                id,
                factory,
            },
        );
        Ok(())
    }

    /// Wrapper ids from the one closest to the base outwards.
    pub fn wrapper_ids(&self) -> Vec<&str> {
        self.wrappers.iter().map(|w| w.id.as_str()).collect()
    }

    pub fn get_client(&self, request: &Request) -> Arc<dyn SavedObjectsClient> {
        self.get_client_excluding(request, &[])
    }

    /// Compose the client for `request`, skipping wrappers named in `excluded`.
    pub fn get_client_excluding(
        &self,
        request: &Request,
        excluded: &[&str],
    ) -> Arc<dyn SavedObjectsClient> {
        self.wrappers
            .iter()
            .filter(|w| !excluded.contains(&w.id.as_str()))
            .fold(Arc::clone(&self.base), |client, w| {
                w.factory.wrap(WrapperOptions {
                    client,
                    request: request.clone(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saved_objects::SavedObjectsRepository;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ClientWrapper for Recorder {
        async fn get(
            &self,
            client: &dyn SavedObjectsClient,
            object_type: &str,
            id: &str,
            options: &BaseOptions,
        ) -> Result<SavedObject> {
            self.calls.lock().push(self.name);
            client.get(object_type, id, options).await
        }
    }

    fn recording(
        name: &'static str,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn ClientWrapperFactory> {
        let calls = Arc::clone(calls);
        Arc::new(move |options: WrapperOptions| -> Arc<dyn SavedObjectsClient> {
            Arc::new(WrappedClient::new(
                options.client,
                Recorder {
                    name,
                    calls: Arc::clone(&calls),
                },
            ))
        })
    }

    async fn provider_with_object() -> SavedObjectsClientProvider {
        let repo = Arc::new(SavedObjectsRepository::new());
        repo.create(
            "dashboard",
            json!({"title": "d"}),
            &CreateOptions {
                id: Some("d1".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        SavedObjectsClientProvider::new(repo)
    }

    #[tokio::test]
    async fn higher_priority_sees_requests_first() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut provider = provider_with_object().await;
        provider.add_client_wrapper(2, "outer", recording("outer", &calls)).unwrap();
        provider.add_client_wrapper(0, "inner", recording("inner", &calls)).unwrap();
        provider.add_client_wrapper(1, "middle", recording("middle", &calls)).unwrap();
        assert_eq!(provider.wrapper_ids(), vec!["inner", "middle", "outer"]);

        let client = provider.get_client(&Request::new("/app"));
        let object = client.get("dashboard", "d1", &BaseOptions::default()).await.unwrap();
        assert_eq!(object.attributes["title"], "d");
        assert_eq!(*calls.lock(), vec!["outer", "middle", "inner"]);
    }

    #[tokio::test]
    async fn equal_priorities_keep_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut provider = provider_with_object().await;
        provider.add_client_wrapper(1, "first", recording("first", &calls)).unwrap();
        provider.add_client_wrapper(1, "second", recording("second", &calls)).unwrap();
        assert_eq!(provider.wrapper_ids(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut provider = provider_with_object().await;
        provider.add_client_wrapper(0, "w", recording("w", &calls)).unwrap();
        assert!(provider.add_client_wrapper(5, "w", recording("w", &calls)).is_err());
        assert_eq!(provider.wrapper_ids(), vec!["w"]);
    }

    #[tokio::test]
    async fn excluded_wrappers_are_skipped() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut provider = provider_with_object().await;
        provider.add_client_wrapper(0, "a", recording("a", &calls)).unwrap();
        provider.add_client_wrapper(1, "b", recording("b", &calls)).unwrap();

        let client = provider.get_client_excluding(&Request::new("/app"), &["a"]);
        client.get("dashboard", "d1", &BaseOptions::default()).await.unwrap();
        assert_eq!(*calls.lock(), vec!["b"]);
    }

    #[tokio::test]
    async fn unhooked_methods_pass_through() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut provider = provider_with_object().await;
        provider.add_client_wrapper(0, "a", recording("a", &calls)).unwrap();
        let client = provider.get_client(&Request::new("/app"));

        let found = client.find(&FindOptions::of_type("dashboard")).await.unwrap();
        assert_eq!(found.total, 1);
        client
            .update("dashboard", "d1", json!({"title": "e"}), &UpdateOptions::default())
            .await
            .unwrap();
        client.delete("dashboard", "d1", &BaseOptions::default()).await.unwrap();
        assert!(calls.lock().is_empty());
    }
}
