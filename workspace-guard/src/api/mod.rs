//! HTTP API layer exposing saved-object reads through the composed client.

pub mod auth_middleware;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use workspace_guard_core::admin::DashboardAdminResolver;
use workspace_guard_core::auth::TokenVerifier;
use workspace_guard_core::request::Request;
use workspace_guard_core::saved_objects::{
    FindOptions, FindResponse, SavedObject, SavedObjectsClientProvider, DEFAULT_PER_PAGE,
};
use workspace_guard_core::state::WorkspaceStateStore;
use workspace_guard_core::workspace::Capabilities;
use workspace_guard_core::SavedObjectsError;

/// Shared application state: the client pipeline plus request admission.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<SavedObjectsClientProvider>,
    pub state: Arc<WorkspaceStateStore>,
    /// Absent when the deployment runs without authentication.
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub admin_resolver: Option<Arc<DashboardAdminResolver>>,
    pub capabilities: Capabilities,
}

/// JSON error body `{statusCode, error, message}`.
pub struct ApiError(SavedObjectsError);

impl From<SavedObjectsError> for ApiError {
    fn from(err: SavedObjectsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = self.0.to_item_error();
        let status =
            StatusCode::from_u16(payload.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(payload)).into_response()
    }
}

#[derive(Deserialize)]
struct ObjectPath {
    #[serde(rename = "type")]
    object_type: String,
    id: String,
}

#[derive(Deserialize)]
struct FindQuery {
    /// Comma separated.
    #[serde(rename = "type")]
    types: Option<String>,
    search: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
    /// Comma separated.
    workspaces: Option<String>,
}

fn split_list(value: Option<String>) -> Option<Vec<String>> {
    value.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

impl From<FindQuery> for FindOptions {
    fn from(query: FindQuery) -> Self {
        Self {
            types: split_list(query.types).unwrap_or_default(),
            search: query.search,
            page: query.page.unwrap_or(1).max(1),
            per_page: query.per_page.unwrap_or(DEFAULT_PER_PAGE),
            workspaces: split_list(query.workspaces),
            ..Default::default()
        }
    }
}

/// Build the application router around `app_state`.
///
/// Every saved-object route is also reachable below `/w/{workspace_id}`,
/// which makes that workspace the request's default target.
pub fn router(app_state: AppState) -> Router {
    let saved_objects = Router::new()
        .route("/api/capabilities", get(capabilities))
        .route("/api/saved_objects/_find", get(find_objects))
        .route("/api/saved_objects/{type}/{id}", get(get_object));

    Router::new()
        .merge(saved_objects.clone())
        .nest("/w/{workspace_id}", saved_objects)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware::admit_request,
        ))
        .route("/health", get(|| async { "OK" }))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(app_state)
}

async fn capabilities(State(state): State<AppState>) -> Json<Capabilities> {
    Json(state.capabilities)
}

async fn get_object(
    State(state): State<AppState>,
    Extension(request): Extension<Request>,
    Path(path): Path<ObjectPath>,
) -> Result<Json<SavedObject>, ApiError> {
    let client = state.provider.get_client(&request);
    let object = client
        .get(&path.object_type, &path.id, &Default::default())
        .await?;
    Ok(Json(object))
}

async fn find_objects(
    State(state): State<AppState>,
    Extension(request): Extension<Request>,
    Query(query): Query<FindQuery>,
) -> Result<Json<FindResponse>, ApiError> {
    let client = state.provider.get_client(&request);
    let response = client.find(&query.into()).await?;
    Ok(Json(response))
}
