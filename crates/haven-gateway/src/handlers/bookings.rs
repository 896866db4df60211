//! Booking endpoints.
//!
//! Guests book without an account; everything after creation needs a token.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use haven_auth::JwtValidator;
use haven_service::{BookingFilters, BookingStatus, CreateBookingRequest, PageRequest, UpdateBookingRequest};
use haven_store::Store;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::handlers::{ApiJson, ApiQuery};
use crate::state::GatewayState;

// =============================================================================
// Request Types
// =============================================================================

/// Query for `GET /v1/bookings/availability`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// Counselor to check.
    pub counselor_id: String,
    /// `YYYY-MM-DD`.
    pub booking_date: String,
    /// `HH:MM`.
    pub booking_time: String,
}

/// Query for `GET /v1/bookings/me`.
#[derive(Debug, Default, Deserialize)]
pub struct MyBookingsQuery {
    /// Only bookings in this status.
    pub status: Option<BookingStatus>,
}

/// Body for `POST /v1/bookings/:id/confirm`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    /// Where the session takes place.
    pub meeting_link: String,
}

/// Body for `POST /v1/bookings/:id/cancel`.
#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    /// Why the booking was cancelled.
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Book a session. Works with or without a token.
///
/// # Errors
///
/// Returns 409 if the slot is taken, 400 for invalid input and 404 if the
/// counselor is unknown or inactive.
pub async fn create_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: MaybeAuthUser,
    ApiJson(body): ApiJson<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let booking = state.services.bookings.create(user.caller(), body).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Check whether a slot is free.
///
/// # Errors
///
/// Returns 400 for malformed dates or times.
pub async fn check_availability<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let availability = state
        .services
        .bookings
        .check_availability(&query.counselor_id, &query.booking_date, &query.booking_time)
        .await?;
    Ok(Json(availability))
}

/// List every booking (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers.
pub async fn list_bookings<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(filters): ApiQuery<BookingFilters>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state.services.bookings.list(&caller, filters, page).await?;
    Ok(Json(page))
}

/// List the caller's own bookings.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn my_bookings<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    ApiQuery(page): ApiQuery<PageRequest>,
    ApiQuery(query): ApiQuery<MyBookingsQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let page = state
        .services
        .bookings
        .list_for_user(&caller, query.status, page)
        .await?;
    Ok(Json(page))
}

/// Get one booking.
///
/// # Errors
///
/// Returns 404 if absent and 403 if the caller neither owns it nor is staff.
pub async fn get_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let booking = state.services.bookings.get(&caller, &id).await?;
    Ok(Json(booking))
}

/// Change booking details or reschedule.
///
/// # Errors
///
/// Returns 409 if the booking is finished or the new slot is taken.
pub async fn update_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateBookingRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let booking = state.services.bookings.update(&caller, &id, body).await?;
    Ok(Json(booking))
}

/// Soft-delete a booking (admin).
///
/// # Errors
///
/// Returns 403 for non-admin callers and 404 if absent.
pub async fn delete_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    state.services.bookings.delete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Confirm a pending booking (staff).
///
/// # Errors
///
/// Returns 409 unless the booking is pending.
pub async fn confirm_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ConfirmBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let booking = state
        .services
        .bookings
        .confirm(&caller, &id, &body.meeting_link)
        .await?;
    Ok(Json(booking))
}

/// Cancel a booking. The body is optional.
///
/// # Errors
///
/// Returns 409 if the booking is already finished.
pub async fn cancel_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let reason = body.and_then(|Json(b)| b.reason);
    let booking = state.services.bookings.cancel(&caller, &id, reason).await?;
    Ok(Json(booking))
}

/// Mark a confirmed booking completed (staff).
///
/// # Errors
///
/// Returns 409 unless the booking is confirmed.
pub async fn complete_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let booking = state.services.bookings.complete(&caller, &id).await?;
    Ok(Json(booking))
}

/// Mark a confirmed booking as a no-show (staff).
///
/// # Errors
///
/// Returns 409 unless the booking is confirmed.
pub async fn no_show_booking<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let booking = state.services.bookings.mark_no_show(&caller, &id).await?;
    Ok(Json(booking))
}
