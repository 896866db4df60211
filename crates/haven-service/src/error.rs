//! Error types for the service layer.
//!
//! Every business rule violation is a typed variant; storage failures pass
//! through unchanged inside [`ServiceError::Store`].

use haven_core::CoreError;
use haven_store::StoreError;
use thiserror::Error;

use crate::lifecycle::BookingStatus;

/// A result type using `ServiceError`.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that can occur in service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The referenced entity does not exist or has been soft-deleted.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"booking"`.
        entity: &'static str,
        /// Requested key.
        id: String,
    },

    /// A uniqueness rule would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The booking cannot move from its current status to the requested one.
    #[error("cannot move booking {booking_id} from {from} to {to}")]
    InvalidTransition {
        /// The booking being transitioned.
        booking_id: String,
        /// Current status.
        from: BookingStatus,
        /// Requested status.
        to: BookingStatus,
    },

    /// The caller lacks the role or ownership the operation requires.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The operation requires an authenticated caller.
    #[error("authentication required")]
    Unauthorized,

    /// Structurally invalid input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// The notification collaborator failed.
    #[error("notification failed: {0}")]
    Notification(String),

    /// The object storage collaborator failed.
    #[error("object storage failed: {0}")]
    Storage(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict(_) | Self::InvalidTransition { .. } => 409,
            Self::Forbidden(_) => 403,
            Self::Unauthorized => 401,
            Self::Validation(_) => 400,
            Self::Notification(_) | Self::Storage(_) => 502,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Notification(_) | Self::Storage(_) | Self::Internal(_)
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConditionFailed { claim, holder } => {
                Self::Conflict(format!("{claim} is already taken by {holder}"))
            }
            other => Self::Store(other),
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(ServiceError::not_found("booking", "b1").http_status_code(), 404);
        assert_eq!(ServiceError::Conflict("slug".into()).http_status_code(), 409);
        assert_eq!(
            ServiceError::InvalidTransition {
                booking_id: "b1".into(),
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed,
            }
            .http_status_code(),
            409
        );
        assert_eq!(ServiceError::Forbidden("x".into()).http_status_code(), 403);
        assert_eq!(ServiceError::Unauthorized.http_status_code(), 401);
        assert_eq!(ServiceError::Validation("x".into()).http_status_code(), 400);
        assert_eq!(
            ServiceError::Store(StoreError::Database("io".into())).http_status_code(),
            500
        );
    }

    #[test]
    fn condition_failure_becomes_conflict() {
        let err: ServiceError = StoreError::ConditionFailed {
            claim: "c1#2025-06-01#14:00".into(),
            holder: "b1".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err: ServiceError = StoreError::Database("boom".into()).into();
        assert!(matches!(err, ServiceError::Store(_)));
        assert!(err.is_retriable());
    }

    #[test]
    fn transition_message_is_readable() {
        let err = ServiceError::InvalidTransition {
            booking_id: "b1".into(),
            from: BookingStatus::Confirmed,
            to: BookingStatus::Confirmed,
        };
        assert_eq!(err.to_string(), "cannot move booking b1 from confirmed to confirmed");
    }
}
