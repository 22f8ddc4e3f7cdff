//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `AdminAuth`: checks the `Relay-Admin-Authorization` header against the
//!   hashed admin secret (used by the admin API).
//! - `WebhookSource`: enforces the webhook source IP allowlist.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use sigrelay_core::logs::{LogCategory, LogLevel, LogRecord};
use sigrelay_sdk::ADMIN_AUTH_HEADER;
use std::net::{IpAddr, SocketAddr};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// AdminAuth
// ---------------------------------------------------------------------------

/// Admin API authentication.
///
/// The header carries the plaintext admin secret. Without a configured
/// secret every request passes.
pub struct AdminAuth;

#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("missing Relay-Admin-Authorization header")]
    MissingHeader,
    #[error("invalid admin secret")]
    InvalidSecret,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AdminAuthError::MissingHeader => "missing Relay-Admin-Authorization header",
            AdminAuthError::InvalidSecret => "invalid admin secret",
        };
        (StatusCode::UNAUTHORIZED, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = state.config.admin.read().await;
        if admin.is_open() {
            return Ok(AdminAuth);
        }

        let provided = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidSecret)?;

        if admin.verify_secret(provided) {
            Ok(AdminAuth)
        } else {
            drop(admin);
            tracing::warn!("Rejected admin request with an invalid secret");
            state.logs().write(LogRecord::new(
                "AdminApi",
                LogLevel::Warning,
                LogCategory::Security,
                "auth_failed",
                "Rejected admin request with an invalid secret",
            ));
            Err(AdminAuthError::InvalidSecret)
        }
    }
}

// ---------------------------------------------------------------------------
// WebhookSource
// ---------------------------------------------------------------------------

/// The address a webhook came from, checked against `[security]
/// allowed_ips`. `None` when the allowlist is empty and the address was not
/// looked at.
pub struct WebhookSource(pub Option<IpAddr>);

#[derive(Debug, thiserror::Error)]
pub enum WebhookSourceError {
    #[error("webhook source {0} is not allowed")]
    NotAllowed(IpAddr),
    #[error("webhook source address is unknown")]
    Unknown,
}

impl IntoResponse for WebhookSourceError {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, "source not allowed").into_response()
    }
}

fn client_ip(parts: &Parts, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

impl FromRequestParts<AppState> for WebhookSource {
    type Rejection = WebhookSourceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let security = state.config.security.read().await;
        if security.allowed_ips.is_empty() {
            return Ok(WebhookSource(None));
        }

        let result = match client_ip(parts, security.trust_forwarded_for) {
            Some(ip) if security.is_ip_allowed(ip) => return Ok(WebhookSource(Some(ip))),
            Some(ip) => WebhookSourceError::NotAllowed(ip),
            None => WebhookSourceError::Unknown,
        };
        drop(security);

        tracing::warn!(error = %result, "Rejected webhook request");
        state.logs().write(LogRecord::new(
            "Webhook",
            LogLevel::Warning,
            LogCategory::Security,
            "webhook_rejected",
            result.to_string(),
        ));
        Err(result)
    }
}
