//! Lead and lead activity endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use haven_auth::JwtValidator;
use haven_service::{
    CreateActivityRequest, CreateLeadRequest, LeadFilters, PageRequest, UpdateActivityRequest,
    UpdateLeadRequest,
};
use haven_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery};
use crate::state::GatewayState;

/// Submit a contact form. Public.
///
/// # Errors
///
/// Returns 400 if name or email is invalid.
pub async fn create_lead<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    ApiJson(body): ApiJson<CreateLeadRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let lead = state.services.leads.create(body).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// List leads (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers.
pub async fn list_leads<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<LeadFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state.services.leads.list(&caller, filters, page).await?;
    Ok(Json(page))
}

/// Lead counts (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers.
pub async fn lead_stats<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let stats = state.services.leads.stats(&caller).await?;
    Ok(Json(stats))
}

/// Get one lead (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn get_lead<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let lead = state.services.leads.get(&caller, &id).await?;
    Ok(Json(lead))
}

/// Edit a lead (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers, 404 if absent and 400 for invalid fields.
pub async fn update_lead<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateLeadRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let lead = state.services.leads.update(&caller, &id, body).await?;
    Ok(Json(lead))
}

/// Soft-delete a lead (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn delete_lead<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    state.services.leads.delete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/leads/:id/contacted`
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn mark_contacted<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let lead = state.services.leads.mark_contacted(&caller, &id).await?;
    Ok(Json(lead))
}

/// `DELETE /v1/leads/:id/contacted`
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn mark_not_contacted<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let lead = state.services.leads.mark_not_contacted(&caller, &id).await?;
    Ok(Json(lead))
}

/// Log an interaction with a lead (staff).
///
/// # Errors
///
/// Returns 403 for non-staff callers and 404 if the lead is absent.
pub async fn add_activity<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(lead_id): Path<String>,
    ApiJson(body): ApiJson<CreateActivityRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let activity = state
        .services
        .leads
        .add_activity(&caller, &lead_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// Activity history for a lead (staff).
///
/// # Errors
///
/// Returns 403 for non-staff callers.
pub async fn list_activities<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(lead_id): Path<String>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state
        .services
        .leads
        .list_activities(&caller, &lead_id, page)
        .await?;
    Ok(Json(page))
}

/// Edit an activity (author or admin).
///
/// # Errors
///
/// Returns 403 unless the caller logged the activity or is an admin.
pub async fn update_activity<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateActivityRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let activity = state
        .services
        .leads
        .update_activity(&caller, &id, body)
        .await?;
    Ok(Json(activity))
}

/// Remove an activity (author or admin).
///
/// # Errors
///
/// Returns 403 unless the caller logged the activity or is an admin.
pub async fn delete_activity<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    state.services.leads.delete_activity(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
