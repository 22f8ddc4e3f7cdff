use axum::{
    Json,
    extract::Query,
    http::{StatusCode, header},
    response::IntoResponse,
};
use sigrelay_core::logs::{ExportFormat, LogQuery, LogRecord};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /logs`: records matching the filters, newest first.
pub async fn query_logs(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let records: Vec<_> = state
        .logs()
        .query(&query)
        .iter()
        .map(LogRecord::to_response)
        .collect();
    Json(records)
}

/// `DELETE /logs`: drop every record, in memory and on disk.
pub async fn clear_logs(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, AdminApiError> {
    state.logs().clear().map_err(AdminApiError::Logs)?;
    tracing::info!("System log cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /logs/export?format=json|csv`: the filtered log as a download.
pub async fn export_logs(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<LogQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let format = query.format.unwrap_or_default();
    let body = state
        .logs()
        .export(&query, format)
        .map_err(AdminApiError::Logs)?;

    let (content_type, disposition) = match format {
        ExportFormat::Json => (
            "application/json",
            "attachment; filename=\"relay-logs.json\"",
        ),
        ExportFormat::Csv => ("text/csv", "attachment; filename=\"relay-logs.csv\""),
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
