//! File upload endpoint.
//!
//! The request body is the raw file; its `Content-Type` header decides the
//! stored object's type and extension.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use haven_auth::JwtValidator;
use haven_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Store a file in `folder` (staff).
///
/// # Errors
///
/// Returns 400 without a content type, for unknown folders or empty bodies,
/// and 502 when object storage fails.
pub async fn upload<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(folder): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("content-type header is required".into()))?;

    let uploaded = state
        .services
        .uploads
        .upload(&caller, &folder, &content_type, body.to_vec())
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}
