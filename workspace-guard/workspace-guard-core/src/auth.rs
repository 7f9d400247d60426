use crate::request::Request;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Outcome reported by the authentication layer for one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// No authentication layer is configured.
    Unknown,
    Authenticated,
    Unauthenticated,
    #[serde(other)]
    Unrecognized,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub backend_roles: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub auth_info: Option<AuthInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub status: AuthStatus,
    #[serde(default)]
    pub state: Option<AuthState>,
}

impl AuthResult {
    pub fn unknown() -> Self {
        Self {
            status: AuthStatus::Unknown,
            state: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            state: None,
        }
    }

    pub fn authenticated(user_name: Option<String>, backend_roles: Option<Vec<String>>) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            state: Some(AuthState {
                auth_info: Some(AuthInfo {
                    user_name,
                    backend_roles,
                }),
            }),
        }
    }

    pub fn auth_info(&self) -> Option<&AuthInfo> {
        self.state.as_ref().and_then(|s| s.auth_info.as_ref())
    }
}

/// Read access to the authentication verdict of a request.
pub trait AuthProvider: Send + Sync {
    fn get(&self, request: &Request) -> AuthResult;
}

/// Returns whatever the authentication layer attached to the request,
/// `unknown` when nothing was attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestAuth;

impl AuthProvider for RequestAuth {
    fn get(&self, request: &Request) -> AuthResult {
        request.auth().cloned().unwrap_or_else(AuthResult::unknown)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Claims>;

    /// Translate a bearer token (or its absence) into an auth result.
    async fn authenticate(&self, bearer: Option<&str>) -> AuthResult {
        let Some(token) = bearer else {
            return AuthResult::unauthenticated();
        };
        match self.verify(token).await {
            Some(claims) => {
                let roles = (!claims.roles.is_empty()).then_some(claims.roles);
                AuthResult::authenticated(Some(claims.sub), roles)
            }
            None => AuthResult::unauthenticated(),
        }
    }
}

pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: String) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<Claims>(token, &self.key, &validation)
            .ok()
            .map(|d| d.claims)
    }
}
