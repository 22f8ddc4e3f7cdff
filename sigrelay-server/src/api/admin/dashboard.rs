use axum::{Json, response::IntoResponse};
use sigrelay_sdk::objects::DashboardSummary;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `GET /`: everything the dashboard shows on its landing page.
pub async fn dashboard(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> impl IntoResponse {
    let webhook_url = state.config.server.read().await.webhook_url();
    let registry = &state.registry;

    Json(DashboardSummary {
        version: env!("CARGO_PKG_VERSION").to_string(),
        events: registry.events().summaries(webhook_url.as_deref()),
        actions: registry.actions().summaries(),
        log_entries: state.logs().len(),
        log_limit: state.logs().limit(),
    })
}
