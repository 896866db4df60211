//! Counselor endpoints.
//!
//! Reads are public and see active counselors only; writes are admin-only.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use haven_auth::JwtValidator;
use haven_service::{CounselorFilters, CreateCounselorRequest, PageRequest, UpdateCounselorRequest};
use haven_store::Store;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery};
use crate::state::GatewayState;

/// Add a counselor (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 400 for invalid fields.
pub async fn create_counselor<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<CreateCounselorRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let counselor = state.services.counselors.create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(counselor)))
}

/// List counselors.
///
/// # Errors
///
/// Returns 400 for malformed query parameters.
pub async fn list_counselors<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<CounselorFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state
        .services
        .counselors
        .list(user.caller(), filters, page)
        .await?;
    Ok(Json(page))
}

/// Get one counselor.
///
/// # Errors
///
/// Returns 404 if absent, or inactive and the caller is not an admin.
pub async fn get_counselor<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let counselor = state.services.counselors.get(user.caller(), &id).await?;
    Ok(Json(counselor))
}

/// Edit a counselor (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn update_counselor<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCounselorRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let counselor = state.services.counselors.update(&caller, &id, body).await?;
    Ok(Json(counselor))
}

/// Soft-delete a counselor (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn delete_counselor<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    state.services.counselors.delete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/counselors/:id/activate`
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn activate_counselor<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let counselor = state.services.counselors.set_active(&caller, &id, true).await?;
    Ok(Json(counselor))
}

/// `POST /v1/counselors/:id/deactivate`
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn deactivate_counselor<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let counselor = state.services.counselors.set_active(&caller, &id, false).await?;
    Ok(Json(counselor))
}
