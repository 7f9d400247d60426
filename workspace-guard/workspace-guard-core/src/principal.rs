//! Principal resolution and dashboard-admin classification.

use crate::auth::{AuthProvider, AuthStatus};
use crate::error::{Result, SavedObjectsError};
use crate::request::Request;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    Users,
    Groups,
}

/// Resolved identity of the requester.
///
/// Both lists empty is the "no authentication configured" sentinel that
/// every permission check treats as unrestricted access.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principals {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl Principals {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            users: vec![name.into()],
            groups: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            users: Vec::new(),
            groups: vec![name.into()],
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }

    pub(crate) fn entries_mut(&mut self, principal_type: PrincipalType) -> &mut Vec<String> {
        match principal_type {
            PrincipalType::Users => &mut self.users,
            PrincipalType::Groups => &mut self.groups,
        }
    }
}

/// Resolve the effective identity of `request`.
pub fn principals_from_request(request: &Request, auth: &dyn AuthProvider) -> Result<Principals> {
    let result = auth.get(request);
    match result.status {
        AuthStatus::Unknown => Ok(Principals::unrestricted()),
        AuthStatus::Authenticated => {
            let mut principals = Principals::default();
            if let Some(info) = result.auth_info() {
                if let Some(roles) = &info.backend_roles {
                    principals.groups = roles.clone();
                }
                if let Some(user) = &info.user_name {
                    principals.users = vec![user.clone()];
                }
            }
            Ok(principals)
        }
        AuthStatus::Unauthenticated => Err(SavedObjectsError::not_authorized()),
        AuthStatus::Unrecognized => Err(SavedObjectsError::UnexpectedAuthorizationStatus(
            "UNEXPECTED_AUTHORIZATION_STATUS".to_string(),
        )),
    }
}

/// True when any group or user of `principals` is on the admin allow-lists.
pub fn is_dashboard_admin(
    principals: &Principals,
    config_groups: &[String],
    config_users: &[String],
) -> bool {
    if config_groups.is_empty() && config_users.is_empty() {
        return false;
    }
    let group_match = principals.groups.iter().any(|g| config_groups.contains(g));
    let user_match = principals.users.iter().any(|u| config_users.contains(u));
    group_match || user_match
}

/// Parse a JSON array of strings; anything else yields an empty list.
pub fn string_to_array(value: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(value).unwrap_or_default()
}
