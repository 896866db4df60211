//! Category endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use haven_auth::JwtValidator;
use haven_service::{CategoryFilters, CreateCategoryRequest, PageRequest, UpdateCategoryRequest};
use haven_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery};
use crate::state::GatewayState;

/// Add a category (admin).
///
/// # Errors
///
/// Returns 409 if the slug is already in use.
pub async fn create_category<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let category = state.services.categories.create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// List categories. Public.
pub async fn list_categories<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<CategoryFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state.services.categories.list(filters, page).await?;
    Ok(Json(page))
}

/// Get one category. Public.
pub async fn get_category<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let category = state.services.categories.get(&id).await?;
    Ok(Json(category))
}

/// Edit a category (admin).
///
/// # Errors
///
/// Returns 409 if a new slug is already in use.
pub async fn update_category<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let category = state.services.categories.update(&caller, &id, body).await?;
    Ok(Json(category))
}

/// Soft-delete a category (admin).
pub async fn delete_category<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    state.services.categories.delete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
