//! Inbound request handle threaded through the wrapper chain.

use crate::auth::AuthResult;
use std::fmt;
use uuid::Uuid;

const WORKSPACE_PATH_PREFIX: &str = "/w/";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity and routing information of one inbound request.
///
/// The authentication layer attaches its verdict with [`Request::with_auth`];
/// a request without one is treated as coming from a deployment with no
/// authentication configured.
#[derive(Clone, Debug)]
pub struct Request {
    id: RequestId,
    path: String,
    auth: Option<AuthResult>,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            path: path.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, auth: AuthResult) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn auth(&self) -> Option<&AuthResult> {
        self.auth.as_ref()
    }
}

/// Extract `{id}` from a `/w/{id}/...` path.
pub fn workspace_id_from_url(path: &str) -> Option<String> {
    let rest = path.strip_prefix(WORKSPACE_PATH_PREFIX)?;
    let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Strip a leading `/w/{id}` segment, leaving the real application path.
pub fn clean_workspace_id(path: &str) -> String {
    let Some(rest) = path.strip_prefix(WORKSPACE_PATH_PREFIX) else {
        return path.to_string();
    };
    match rest.find(['/', '?', '#']) {
        Some(idx) if rest[idx..].starts_with('/') => rest[idx..].to_string(),
        Some(idx) => format!("/{}", &rest[idx..]),
        None => "/".to_string(),
    }
}
