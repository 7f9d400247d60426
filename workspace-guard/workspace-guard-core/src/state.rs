//! Request-scoped workspace state.
//!
//! One slot per in-flight request, created on first write and removed when
//! the request's [`RequestScope`] is dropped.

use crate::request::{Request, RequestId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dashboard_admin: Option<bool>,
}

impl WorkspaceState {
    /// Shallow merge: fields set on `patch` replace the current ones.
    fn merge(&mut self, patch: WorkspaceState) {
        if patch.request_workspace_id.is_some() {
            self.request_workspace_id = patch.request_workspace_id;
        }
        if patch.is_dashboard_admin.is_some() {
            self.is_dashboard_admin = patch.is_dashboard_admin;
        }
    }
}

#[derive(Default)]
pub struct WorkspaceStateStore {
    slots: RwLock<HashMap<RequestId, WorkspaceState>>,
}

impl WorkspaceStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, request: &Request) -> Option<WorkspaceState> {
        self.slots.read().get(&request.id()).cloned()
    }

    pub fn update(&self, request: &Request, patch: WorkspaceState) -> WorkspaceState {
        let mut slots = self.slots.write();
        let slot = slots.entry(request.id()).or_default();
        slot.merge(patch);
        slot.clone()
    }

    /// Admin flag as last written for `request`; absent means not admin.
    pub fn is_dashboard_admin(&self, request: &Request) -> bool {
        self.slots
            .read()
            .get(&request.id())
            .and_then(|s| s.is_dashboard_admin)
            .unwrap_or(false)
    }

    pub fn request_workspace_id(&self, request: &Request) -> Option<String> {
        self.slots
            .read()
            .get(&request.id())
            .and_then(|s| s.request_workspace_id.clone())
    }

    pub fn remove(&self, id: RequestId) -> Option<WorkspaceState> {
        self.slots.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Tie the slot of `request` to the returned guard's lifetime.
    pub fn scope(self: &Arc<Self>, request: &Request) -> RequestScope {
        RequestScope {
            store: Arc::clone(self),
            id: request.id(),
        }
    }
}

/// Removes the request's state slot when dropped.
pub struct RequestScope {
    store: Arc<WorkspaceStateStore>,
    id: RequestId,
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.store.remove(self.id);
    }
}
