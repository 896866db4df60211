//! Common error types for Haven.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the platform.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An unknown role name was provided.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// A date, time or timestamp could not be parsed.
    #[error("invalid time value: {0}")]
    InvalidTime(String),
}
