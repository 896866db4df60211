//! Testimonial endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use haven_auth::JwtValidator;
use haven_service::{
    CreateTestimonialRequest, PageRequest, TestimonialFilters, UpdateTestimonialRequest,
};
use haven_store::Store;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery, ReconcileResponse};
use crate::state::GatewayState;

/// Leave a testimonial. Any signed-in user may.
pub async fn create_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<CreateTestimonialRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let testimonial = state.services.testimonials.create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

/// List testimonials; admins may see unpublished ones.
pub async fn list_testimonials<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<TestimonialFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state
        .services
        .testimonials
        .list(user.caller(), filters, page)
        .await?;
    Ok(Json(page))
}

/// Get one testimonial.
pub async fn get_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let testimonial = state.services.testimonials.get(user.caller(), &id).await?;
    Ok(Json(testimonial))
}

/// Edit a testimonial (author or admin).
pub async fn update_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateTestimonialRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let testimonial = state
        .services
        .testimonials
        .update(&caller, &id, body)
        .await?;
    Ok(Json(testimonial))
}

/// Soft-delete a testimonial (author or admin).
pub async fn delete_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    state.services.testimonials.delete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publish a testimonial (admin).
pub async fn publish_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let testimonial = state.services.testimonials.publish(&caller, &id).await?;
    Ok(Json(testimonial))
}

/// Unpublish a testimonial, dropping its featured flag (admin).
pub async fn unpublish_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let testimonial = state.services.testimonials.unpublish(&caller, &id).await?;
    Ok(Json(testimonial))
}

/// Make this the one featured testimonial (admin).
pub async fn feature_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let testimonial = state.services.testimonials.feature(&caller, &id).await?;
    Ok(Json(testimonial))
}

/// Clear the featured flag (admin).
pub async fn unfeature_testimonial<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let testimonial = state.services.testimonials.unfeature(&caller, &id).await?;
    Ok(Json(testimonial))
}

/// Repair the featured flag after concurrent `feature` calls (admin).
pub async fn reconcile_featured<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let demoted = state.services.testimonials.reconcile_featured(&caller).await?;
    Ok(Json(ReconcileResponse { demoted }))
}
