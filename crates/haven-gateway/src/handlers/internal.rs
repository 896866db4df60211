//! Internal API endpoints.
//!
//! These endpoints are called by a cron job, not by end users. They take a
//! shared token in the `x-internal-token` header instead of a JWT, and are
//! closed entirely when no token is configured.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use haven_auth::JwtValidator;
use haven_store::Store;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Header carrying the internal token.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

fn check_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Err(ApiError::Forbidden("internal endpoints are disabled".into()));
    };
    match headers.get(INTERNAL_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Send reminder emails for confirmed bookings starting soon.
///
/// Safe to call repeatedly: a booking is marked once its reminder has gone
/// out, and failures are retried on the next run.
///
/// # Errors
///
/// Returns 401/403 without a valid internal token, or 500 if the scan
/// itself fails. Individual send failures are reported in the body.
pub async fn run_reminders<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    check_token(&headers, state.config.internal_token.as_deref())?;

    let report = state.services.bookings.run_reminder_scan(Utc::now()).await?;
    tracing::info!(
        scanned = report.scanned,
        due = report.due,
        sent = report.sent,
        failed = report.failed,
        "Reminder run finished"
    );
    Ok(Json(report))
}

/// Health check for internal callers.
pub async fn internal_health() -> impl IntoResponse {
    #[derive(Serialize)]
    struct InternalHealthResponse {
        status: &'static str,
    }

    Json(InternalHealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_required_when_configured() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            check_token(&headers, Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));

        headers.insert(INTERNAL_TOKEN_HEADER, HeaderValue::from_static("wrong"));
        assert!(matches!(
            check_token(&headers, Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));

        headers.insert(INTERNAL_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(check_token(&headers, Some("s3cret")).is_ok());
    }

    #[test]
    fn disabled_without_token() {
        let mut headers = HeaderMap::new();
        headers.insert(INTERNAL_TOKEN_HEADER, HeaderValue::from_static("anything"));
        assert!(matches!(
            check_token(&headers, None),
            Err(ApiError::Forbidden(_))
        ));
    }
}
