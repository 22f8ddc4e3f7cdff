use axum::{
    Json,
    extract::{Path, Query},
    response::IntoResponse,
};
use serde::Deserialize;
use sigrelay_core::logs::{LogCategory, LogLevel, LogRecord};
use sigrelay_sdk::objects::SetActiveResponse;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /events`: every event with its key, webhook URL and statistics.
pub async fn list_events(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> impl IntoResponse {
    let webhook_url = state.config.server.read().await.webhook_url();
    Json(state.registry.events().summaries(webhook_url.as_deref()))
}

/// `GET /events/{name}`: a single event.
pub async fn get_event(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AdminApiError> {
    let webhook_url = state.config.server.read().await.webhook_url();
    let summary = state
        .registry
        .events()
        .summaries(webhook_url.as_deref())
        .into_iter()
        .find(|summary| summary.name == name)
        .ok_or(AdminApiError::NotFound)?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveQuery {
    pub event: Option<String>,
    /// `true` activates the event; any other value deactivates it.
    pub active: Option<String>,
}

/// `POST /event/active?event=<name>&active=<true|false>`: enable or disable
/// an event.
pub async fn set_event_active(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<SetActiveQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let event = query.event.ok_or(AdminApiError::NotFound)?;
    let requested = query.active.as_deref() == Some("true");

    let active = state
        .registry
        .set_event_active(&event, requested)
        .ok_or(AdminApiError::NotFound)?;

    tracing::info!(event = %event, active, "Event active flag changed");
    state.logs().write(LogRecord::new(
        event.as_str(),
        LogLevel::Info,
        LogCategory::Event,
        "active_changed",
        format!("Event {event} set active: {active}"),
    ));

    Ok(Json(SetActiveResponse { event, active }))
}
