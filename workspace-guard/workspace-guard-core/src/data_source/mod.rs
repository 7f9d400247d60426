//! Edit-mode policy for data-source connection objects.

mod permission_wrapper;

pub use permission_wrapper::{
    DataSourcePermissionClientWrapper, DATA_SOURCE_PERMISSION_WRAPPER_ID,
};

use crate::saved_objects::SavedObjectsClientProvider;
use crate::state::WorkspaceStateStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DATA_SOURCE_SAVED_OBJECT_TYPE: &str = "data-source";

/// Priority of [`DataSourcePermissionClientWrapper`] in the client pipeline.
pub const DATA_SOURCE_PERMISSION_WRAPPER_PRIORITY: i32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    Normal,
    ReadOnly,
    /// Writable by dashboard admins only.
    AdminOnly,
}

impl EditMode {
    /// Whether writes to data-source objects are restricted at all.
    pub fn restricts_writes(self) -> bool {
        matches!(self, EditMode::ReadOnly | EditMode::AdminOnly)
    }
}

/// Install the edit-mode wrapper on `provider`.
pub fn register(
    provider: &mut SavedObjectsClientProvider,
    edit_mode: EditMode,
    state: Arc<WorkspaceStateStore>,
) -> anyhow::Result<()> {
    info!(?edit_mode, "Data source edit mode");
    provider.add_client_wrapper(
        DATA_SOURCE_PERMISSION_WRAPPER_PRIORITY,
        DATA_SOURCE_PERMISSION_WRAPPER_ID,
        Arc::new(DataSourcePermissionClientWrapper::new(edit_mode, state)),
    )
}
