//! Admin API handlers.
//!
//! These endpoints back the operator dashboard and require the
//! `Relay-Admin-Authorization` header with the plaintext admin secret
//! (unless no secret is configured).
//!
//! # Endpoints
//!
//! - `GET    /`                    - dashboard summary
//! - `GET    /events`              - list events with keys, webhook URL and stats
//! - `GET    /events/{name}`       - a single event
//! - `POST   /event/active`        - enable or disable an event
//! - `GET    /actions`             - list actions with stats
//! - `GET    /registration`        - registration state snapshot
//! - `GET    /components/{name}`   - component introspection
//! - `GET    /logs`                - query the system log
//! - `DELETE /logs`                - clear the system log
//! - `GET    /logs/export`         - download the system log as JSON or CSV
//! - `GET    /exchange/account`    - exchange account summary
//! - `GET    /exchange/positions`  - open exchange positions

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use sigrelay_core::exchange::ExchangeError;
use sigrelay_core::logs::LogStoreError;

use crate::state::AppState;

mod components;
mod dashboard;
mod events;
mod exchange;
mod logs;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/events", get(events::list_events))
        .route("/events/{name}", get(events::get_event))
        .route("/event/active", post(events::set_event_active))
        .route("/actions", get(components::list_actions))
        .route("/registration", get(components::registration_state))
        .route("/components/{name}", get(components::component_info))
        .route("/logs", get(logs::query_logs).delete(logs::clear_logs))
        .route("/logs/export", get(logs::export_logs))
        .route("/exchange/account", get(exchange::account_summary))
        .route("/exchange/positions", get(exchange::open_positions))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    NotFound,
    Logs(LogStoreError),
    Exchange(ExchangeError),
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            AdminApiError::Logs(e) => {
                tracing::error!(error = %e, "Admin API log store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::Exchange(ExchangeError::MissingCredentials) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "exchange credentials are not configured",
            )
                .into_response(),
            AdminApiError::Exchange(e) => {
                tracing::error!(error = %e, "Admin API exchange error");
                (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
            }
        }
    }
}
