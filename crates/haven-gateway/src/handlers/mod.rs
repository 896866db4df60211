//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub mod blogs;
pub mod bookings;
pub mod categories;
pub mod counselors;
pub mod health;
pub mod internal;
pub mod leads;
pub mod media;
pub mod testimonials;
pub mod uploads;
pub mod users;

/// JSON body whose rejections use the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections use the API error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `?hard=true` on delete routes that support permanent removal.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    /// Remove the record for good instead of soft-deleting it.
    #[serde(default)]
    pub hard: bool,
}

/// Outcome of a repair pass over an exclusive flag.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    /// How many items lost the flag.
    pub demoted: usize,
}
