//! Webhook entrypoint.
//!
//! Signal sources post a JSON object carrying the event `key` plus
//! action-defined fields. Every event whose key matches is triggered and
//! the per-event outcome is returned.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use kanau::processor::Processor;
use serde_json::Value;
use sigrelay_core::dispatch::{DispatchError, WebhookPayload};
use sigrelay_core::logs::{LogCategory, LogLevel, LogRecord};

use crate::api::extractors::WebhookSource;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive_webhook))
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum WebhookApiError {
    #[error("Invalid JSON data")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// `POST /webhook`: trigger the events matching the payload key.
///
/// The body is parsed as JSON regardless of the content type, since some
/// alerting services post JSON as `text/plain`.
pub async fn receive_webhook(
    State(state): State<AppState>,
    WebhookSource(source): WebhookSource,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let data: Value = serde_json::from_slice(&body).inspect_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook with invalid JSON");
        state.logs().write(LogRecord::new(
            "Webhook",
            LogLevel::Warning,
            LogCategory::Api,
            "webhook_invalid",
            format!("Invalid JSON data: {e}"),
        ));
    })?;

    tracing::debug!(source = ?source, "Webhook received");
    let response = state
        .dispatcher
        .process(WebhookPayload(data))
        .await
        .inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook payload");
            state.logs().write(LogRecord::new(
                "Webhook",
                LogLevel::Warning,
                LogCategory::Api,
                "webhook_invalid",
                e.to_string(),
            ));
        })?;
    Ok(Json(response))
}
