//! Booking lifecycle state machine.
//!
//! This module defines the valid status transitions for bookings and provides
//! validation logic to ensure state machine invariants are maintained.
//!
//! # State Machine
//!
//! ```text
//!     ┌───────────┐   confirm    ┌───────────┐   complete   ┌───────────┐
//!     │  pending  │─────────────▶│ confirmed │─────────────▶│ completed │
//!     └─────┬─────┘              └─────┬─────┘              └───────────┘
//!           │                          │  │
//!           │ cancel                   │  │ no-show       ┌───────────┐
//!           │                   cancel │  └──────────────▶│  no-show  │
//!           ▼                          ▼                  └───────────┘
//!     ┌──────────────────────────────────┐
//!     │            cancelled             │
//!     └──────────────────────────────────┘
//! ```
//!
//! Only `pending` and `confirmed` bookings occupy their slot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    /// Requested, awaiting confirmation.
    Pending,
    /// Confirmed with a meeting link.
    Confirmed,
    /// Cancelled by the user, a counselor or an admin.
    Cancelled,
    /// The session took place.
    Completed,
    /// The client did not show up.
    NoShow,
}

/// Statuses that hold a slot.
pub const SLOT_HOLDING: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

impl BookingStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no-show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            "no-show" => Ok(Self::NoShow),
            other => Err(ServiceError::Validation(format!(
                "unknown booking status: {other}"
            ))),
        }
    }
}

impl From<BookingStatus> for serde_json::Value {
    fn from(status: BookingStatus) -> Self {
        Self::String(status.as_str().to_string())
    }
}

/// Validates a status transition and returns the target status if valid.
///
/// # Errors
///
/// Returns `ServiceError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(
    booking_id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<BookingStatus> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ServiceError::InvalidTransition {
            booking_id: booking_id.to_string(),
            from,
            to,
        })
    }
}

/// Check if a status transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::{Cancelled, Completed, Confirmed, NoShow, Pending};

    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending | Confirmed, Cancelled) | (Confirmed, Completed | NoShow)
    )
}

/// Returns the list of valid target statuses from the given status.
#[must_use]
pub fn valid_transitions_from(status: BookingStatus) -> Vec<BookingStatus> {
    use BookingStatus::{Cancelled, Completed, Confirmed, NoShow, Pending};

    match status {
        Pending => vec![Confirmed, Cancelled],
        Confirmed => vec![Completed, NoShow, Cancelled],
        Cancelled | Completed | NoShow => vec![],
    }
}

/// Returns true if a booking in this status occupies its slot.
#[must_use]
pub const fn holds_slot(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Confirmed)
}

/// Returns true if no further transition is possible.
#[must_use]
pub const fn is_terminal(status: BookingStatus) -> bool {
    matches!(
        status,
        BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
    )
}

/// Returns true if date, time and contact details may still change.
#[must_use]
pub const fn can_reschedule(status: BookingStatus) -> bool {
    !is_terminal(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use BookingStatus::*;

        assert!(is_valid_transition(Pending, Confirmed));
        assert!(is_valid_transition(Pending, Cancelled));
        assert!(is_valid_transition(Confirmed, Cancelled));
        assert!(is_valid_transition(Confirmed, Completed));
        assert!(is_valid_transition(Confirmed, NoShow));
    }

    #[test]
    fn invalid_transitions() {
        use BookingStatus::*;

        // Confirming twice or after cancellation
        assert!(!is_valid_transition(Confirmed, Confirmed));
        assert!(!is_valid_transition(Cancelled, Confirmed));
        // Completing straight from pending
        assert!(!is_valid_transition(Pending, Completed));
        assert!(!is_valid_transition(Pending, NoShow));
        // Terminal states stay put
        assert!(!is_valid_transition(Completed, Cancelled));
        assert!(!is_valid_transition(NoShow, Cancelled));
        assert!(!is_valid_transition(Cancelled, Pending));
    }

    #[test]
    fn validate_transition_err() {
        let result = validate_transition("b1", BookingStatus::Completed, BookingStatus::Cancelled);

        match result {
            Err(ServiceError::InvalidTransition { from, to, .. }) => {
                assert_eq!(from, BookingStatus::Completed);
                assert_eq!(to, BookingStatus::Cancelled);
            }
            _ => panic!("expected InvalidTransition error"),
        }
    }

    #[test]
    fn transitions_table_agrees_with_predicate() {
        use BookingStatus::*;

        for from in [Pending, Confirmed, Cancelled, Completed, NoShow] {
            for to in [Pending, Confirmed, Cancelled, Completed, NoShow] {
                assert_eq!(
                    valid_transitions_from(from).contains(&to),
                    is_valid_transition(from, to),
                    "{from} -> {to}"
                );
            }
            assert_eq!(valid_transitions_from(from).is_empty(), is_terminal(from));
        }
    }

    #[test]
    fn slot_holding_states() {
        assert!(holds_slot(BookingStatus::Pending));
        assert!(holds_slot(BookingStatus::Confirmed));
        assert!(!holds_slot(BookingStatus::Cancelled));
        assert!(!holds_slot(BookingStatus::NoShow));
        assert!(SLOT_HOLDING.iter().all(|s| holds_slot(*s)));
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_value(BookingStatus::NoShow).unwrap(),
            serde_json::json!("no-show")
        );
        assert_eq!("no-show".parse::<BookingStatus>().unwrap(), BookingStatus::NoShow);
        assert!("done".parse::<BookingStatus>().is_err());
    }
}
