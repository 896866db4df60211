//! Blog endpoints.
//!
//! Anonymous readers only ever see published posts; reading a post by slug
//! counts as a view.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use haven_auth::JwtValidator;
use haven_service::{BlogFilters, CreateBlogRequest, PageRequest, UpdateBlogRequest};
use haven_store::Store;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery, DeleteQuery};
use crate::state::GatewayState;

/// Write a post (staff).
///
/// # Errors
///
/// Returns 403 for non-staff callers and 409 if the slug is taken.
pub async fn create_blog<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<CreateBlogRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let blog = state.services.blogs.create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

/// List posts.
///
/// # Errors
///
/// Returns 400 for malformed query parameters.
pub async fn list_blogs<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<BlogFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state.services.blogs.list(user.caller(), filters, page).await?;
    Ok(Json(page))
}

/// Read a post by slug, counting the view when it is published.
///
/// # Errors
///
/// Returns 404 if absent or not visible to the caller.
pub async fn get_blog_by_slug<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let blogs = &state.services.blogs;
    let mut blog = blogs.get_by_slug(user.caller(), &slug).await?;
    if blog.is_published {
        blog.views = blogs.record_view(&blog.id).await?;
    }
    Ok(Json(blog))
}

/// Read a post by id.
///
/// # Errors
///
/// Returns 404 if absent or not visible to the caller.
pub async fn get_blog<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let blog = state.services.blogs.get(user.caller(), &id).await?;
    Ok(Json(blog))
}

/// Edit a post (author or admin).
///
/// # Errors
///
/// Returns 403 for other callers and 409 if a new slug is taken.
pub async fn update_blog<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateBlogRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let blog = state.services.blogs.update(&caller, &id, body).await?;
    Ok(Json(blog))
}

/// Delete a post. `?hard=true` removes it for good (admin).
///
/// # Errors
///
/// Returns 403 if the caller may not delete it and 404 if absent.
pub async fn delete_blog<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    if query.hard {
        state.services.blogs.hard_delete(&caller, &id).await?;
    } else {
        state.services.blogs.delete(&caller, &id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Publish a post (author or admin).
///
/// # Errors
///
/// Returns 403 for other callers and 404 if absent.
pub async fn publish_blog<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let blog = state.services.blogs.publish(&caller, &id).await?;
    Ok(Json(blog))
}

/// Take a post offline (author or admin).
///
/// # Errors
///
/// Returns 403 for other callers and 404 if absent.
pub async fn unpublish_blog<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let blog = state.services.blogs.unpublish(&caller, &id).await?;
    Ok(Json(blog))
}
