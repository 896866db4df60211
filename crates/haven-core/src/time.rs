//! Timestamp helpers.
//!
//! Every stored timestamp is an ISO-8601 UTC string with millisecond precision
//! (`2025-06-01T14:00:00.000Z`). A fixed width keeps lexicographic order equal
//! to chronological order, which the generic sort comparator relies on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

use crate::error::{CoreError, Result};

/// Format a timestamp the way items store it.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time formatted for storage.
#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a calendar date in `YYYY-MM-DD` form.
///
/// # Errors
///
/// Returns `CoreError::InvalidTime` if the string is not a valid date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidTime(format!("expected YYYY-MM-DD, got {value:?}")))
}

/// Parse a wall-clock time in `HH:MM` (24h) form.
///
/// # Errors
///
/// Returns `CoreError::InvalidTime` if the string is not a valid time.
pub fn parse_clock(value: &str) -> Result<NaiveTime> {
    if value.len() != 5 {
        return Err(CoreError::InvalidTime(format!(
            "expected HH:MM, got {value:?}"
        )));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| CoreError::InvalidTime(format!("expected HH:MM, got {value:?}")))
}

/// Parse a date and return it zero-padded as `YYYY-MM-DD`.
///
/// Stored dates go through this so that one calendar day has one spelling
/// and string order matches date order.
///
/// # Errors
///
/// Returns `CoreError::InvalidTime` if the string is not a valid date.
pub fn canonical_date(value: &str) -> Result<String> {
    Ok(parse_date(value.trim())?.format("%Y-%m-%d").to_string())
}

/// Parse a time and return it zero-padded as `HH:MM`.
///
/// # Errors
///
/// Returns `CoreError::InvalidTime` if the string is not a valid time.
pub fn canonical_clock(value: &str) -> Result<String> {
    Ok(parse_clock(value.trim())?.format("%H:%M").to_string())
}

/// Combine a `YYYY-MM-DD` date and an `HH:MM` time into a UTC instant.
///
/// # Errors
///
/// Returns `CoreError::InvalidTime` if either part fails to parse.
pub fn slot_start(date: &str, time: &str) -> Result<DateTime<Utc>> {
    let date = parse_date(date)?;
    let time = parse_clock(time)?;
    Ok(NaiveDateTime::new(date, time).and_utc())
}

/// Serde adapter storing `DateTime<Utc>` in the millisecond form.
pub mod millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a timestamp.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(*at))
    }

    /// Deserialize any RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Fails when the string is not RFC 3339.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for `Option<DateTime<Utc>>`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize an optional timestamp.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => serializer.serialize_str(&crate::time::format_timestamp(*at)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional RFC 3339 timestamp.
        ///
        /// # Errors
        ///
        /// Fails when a present value is not RFC 3339.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}
