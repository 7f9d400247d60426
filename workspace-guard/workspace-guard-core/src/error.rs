//! Error taxonomy shared by the saved-objects client and every wrapper.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = SavedObjectsError> = std::result::Result<T, E>;

const PERMISSION_DENIED: &str = "You have no permission to perform this operation";

#[derive(Debug, Error)]
pub enum SavedObjectsError {
    /// The request carries no usable identity.
    #[error("Not Authorized: {0}")]
    NotAuthorized(String),

    /// The identity is known but lacks the required permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Saved object [{object_type}/{id}] not found")]
    NotFound { object_type: String, id: String },

    #[error("Saved object [{object_type}/{id}] conflict")]
    Conflict { object_type: String, id: String },

    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// The authentication layer reported a status this layer does not know.
    #[error("Unexpected authorization status: {0}")]
    UnexpectedAuthorizationStatus(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SavedObjectsError {
    pub fn forbidden() -> Self {
        Self::Forbidden(PERMISSION_DENIED.to_string())
    }

    pub fn not_authorized() -> Self {
        Self::NotAuthorized("NOT_AUTHORIZED".to_string())
    }

    pub fn not_found(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotAuthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::BadRequest(_) => 400,
            Self::UnexpectedAuthorizationStatus(_) | Self::Internal(_) => 500,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Payload attached to a single entry of a bulk response.
    pub fn to_item_error(&self) -> SavedObjectError {
        let error = match self {
            Self::NotAuthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound { .. } => "Not Found",
            Self::Conflict { .. } => "Conflict",
            Self::BadRequest(_) => "Bad Request",
            Self::UnexpectedAuthorizationStatus(_) | Self::Internal(_) => "Internal Server Error",
        };
        SavedObjectError {
            status_code: self.status_code(),
            error: error.to_string(),
            message: self.to_string(),
            metadata: None,
        }
    }

    /// Per-item payload for an entry a wrapper refused to forward.
    pub fn to_rejected_item_error(&self) -> SavedObjectError {
        let mut error = self.to_item_error();
        error.metadata = Some(ErrorMetadata {
            is_not_overwritable: true,
        });
        error
    }
}

/// Error entry spliced into bulk responses.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedObjectError {
    pub status_code: u16,
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ErrorMetadata>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetadata {
    pub is_not_overwritable: bool,
}
