use super::AppState;
use axum::{
    extract::{OriginalUri, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use workspace_guard_core::auth::AuthResult;
use workspace_guard_core::workspace::route_workspace_request;

/// Bearer token from the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

/// Admit a request: authenticate it, strip a `/w/{id}` prefix into its
/// workspace state and classify the requester as dashboard admin.
///
/// The core request travels to handlers as an extension. Its state slot
/// lives until the response has been produced.
pub async fn admit_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let auth = match &state.verifier {
        Some(verifier) => {
            let token = bearer_token(request.headers());
            verifier.authenticate(token.as_deref()).await
        }
        None => AuthResult::unknown(),
    };

    let mut scoped = workspace_guard_core::request::Request::new(path).with_auth(auth);
    let _scope = state.state.scope(&scoped);
    if let Some(workspace_id) = route_workspace_request(&state.state, &mut scoped) {
        debug!(request = %scoped.id(), %workspace_id, "workspace request");
    }
    if let Some(resolver) = &state.admin_resolver {
        resolver.resolve(&scoped).await;
    }

    request.extensions_mut().insert(scoped);
    next.run(request).await
}
