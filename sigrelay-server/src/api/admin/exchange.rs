use axum::{Json, response::IntoResponse};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /exchange/account`: balances and margin of the configured account.
pub async fn account_summary(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, AdminApiError> {
    let summary = state
        .exchange
        .account_summary()
        .await
        .map_err(AdminApiError::Exchange)?;
    Ok(Json(summary))
}

/// `GET /exchange/positions`: positions with a non-zero size.
pub async fn open_positions(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, AdminApiError> {
    let positions = state
        .exchange
        .open_positions()
        .await
        .map_err(AdminApiError::Exchange)?;
    Ok(Json(positions))
}
