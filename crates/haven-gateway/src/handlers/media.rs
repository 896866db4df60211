//! Media collection endpoints.
//!
//! One set of handlers serves every collection; the first path segment
//! after `/v1/media` names it (`videos`, `reels`, `banners`, `team`,
//! `materials`).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use haven_auth::JwtValidator;
use haven_service::{MediaCollection, MediaFilters, MediaRequest, PageRequest};
use haven_store::Store;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery, DeleteQuery, ReconcileResponse};
use crate::state::GatewayState;

/// Body for `PUT /v1/media/:collection/reorder`.
#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    /// Item ids in their new display order.
    pub ids: Vec<String>,
}

fn collection(name: &str) -> Result<MediaCollection, ApiError> {
    Ok(name.parse::<MediaCollection>()?)
}

/// Add an item (admin).
///
/// # Errors
///
/// Returns 400 for an unknown collection or a missing title/asset.
pub async fn create_item<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(name): Path<String>,
    ApiJson(body): ApiJson<MediaRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let item = state
        .services
        .media
        .create(&caller, collection(&name)?, body)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// List a collection in display order.
///
/// # Errors
///
/// Returns 400 for an unknown collection.
pub async fn list_items<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    Path(name): Path<String>,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<MediaFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state
        .services
        .media
        .list(user.caller(), collection(&name)?, filters, page)
        .await?;
    Ok(Json(page))
}

/// Get one item.
///
/// # Errors
///
/// Returns 404 if absent or unpublished for a non-admin caller.
pub async fn get_item<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    Path((name, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let item = state
        .services
        .media
        .get(user.caller(), collection(&name)?, &id)
        .await?;
    Ok(Json(item))
}

/// Edit an item (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn update_item<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path((name, id)): Path<(String, String)>,
    ApiJson(body): ApiJson<MediaRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let item = state
        .services
        .media
        .update(&caller, collection(&name)?, &id, body)
        .await?;
    Ok(Json(item))
}

/// Delete an item. `?hard=true` also removes its stored assets.
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn delete_item<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path((name, id)): Path<(String, String)>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let collection = collection(&name)?;
    if query.hard {
        state.services.media.hard_delete(&caller, collection, &id).await?;
    } else {
        state.services.media.delete(&caller, collection, &id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Publish an item. Publishing a banner unpublishes the others.
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn publish_item<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path((name, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let item = state
        .services
        .media
        .publish(&caller, collection(&name)?, &id)
        .await?;
    Ok(Json(item))
}

/// Unpublish an item (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn unpublish_item<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path((name, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let item = state
        .services
        .media
        .unpublish(&caller, collection(&name)?, &id)
        .await?;
    Ok(Json(item))
}

/// Rewrite display order (admin).
///
/// # Errors
///
/// Returns 400 for duplicate ids and 404 if any id is absent.
pub async fn reorder_items<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(name): Path<String>,
    ApiJson(body): ApiJson<ReorderBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let items = state
        .services
        .media
        .reorder(&caller, collection(&name)?, &body.ids)
        .await?;
    Ok(Json(items))
}

/// Repair the single-published-banner rule (admin).
///
/// # Errors
///
/// Returns 400 for collections without that rule.
pub async fn reconcile_published<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let demoted = state
        .services
        .media
        .reconcile_published(&caller, collection(&name)?)
        .await?;
    Ok(Json(ReconcileResponse { demoted }))
}
