//! User profile endpoints.
//!
//! Identity lives in the token; a profile is created once per subject with
//! `POST /v1/users/me`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use haven_auth::JwtValidator;
use haven_service::{PageRequest, RegisterProfileRequest, UpdateUserRequest, UserFilters};
use haven_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery};
use crate::state::GatewayState;

/// Create the caller's profile.
///
/// # Errors
///
/// Returns 409 if the profile exists or the email belongs to someone else.
pub async fn register_profile<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<RegisterProfileRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let user = state.services.users.register_profile(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// The caller's own profile.
///
/// # Errors
///
/// Returns 404 if no profile has been registered yet.
pub async fn get_me<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let user = state.services.users.get_me(&caller).await?;
    Ok(Json(user))
}

/// Edit the caller's own profile.
///
/// # Errors
///
/// Returns 403 when a non-admin tries to change their role.
pub async fn update_me<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let id = caller.user_id.to_string();
    let user = state.services.users.update(&caller, &id, body).await?;
    Ok(Json(user))
}

/// List users (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers.
pub async fn list_users<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<UserFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state.services.users.list(&caller, filters, page).await?;
    Ok(Json(page))
}

/// Get a profile by id (self or admin).
///
/// # Errors
///
/// Returns 403 for other callers and 404 if absent.
pub async fn get_user<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let user = state.services.users.get(&caller, &id).await?;
    Ok(Json(user))
}

/// Edit a profile by id (self or admin).
///
/// # Errors
///
/// Returns 403 for other callers and 409 if the new email is taken.
pub async fn update_user<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let user = state.services.users.update(&caller, &id, body).await?;
    Ok(Json(user))
}

/// Deactivate a profile (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn deactivate_user<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    state.services.users.deactivate(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
