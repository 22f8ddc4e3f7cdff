use axum::{Json, extract::Path, response::IntoResponse};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `GET /actions`: every action with its dependencies and statistics.
pub async fn list_actions(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> impl IntoResponse {
    Json(state.registry.actions().summaries())
}

/// `GET /registration`: registered names and event links.
pub async fn registration_state(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> impl IntoResponse {
    Json(state.registry.registration_state())
}

/// `GET /components/{name}`: what is known about a component.
///
/// Unregistered names are answered with `"type": "unknown"` rather than 404.
pub async fn component_info(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(name): Path<String>,
) -> impl IntoResponse {
    Json(state.registry.component_info(&name))
}
