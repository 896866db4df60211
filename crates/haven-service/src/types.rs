//! Service configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Session length used when a booking request names none (minutes).
    pub default_duration_minutes: u32,
    /// Shortest bookable session (minutes).
    pub min_duration_minutes: u32,
    /// Longest bookable session (minutes).
    pub max_duration_minutes: u32,
    /// How far ahead the reminder scan looks (hours).
    pub reminder_window_hours: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: 60,
            min_duration_minutes: 15,
            max_duration_minutes: 240,
            reminder_window_hours: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.default_duration_minutes, 60);
        assert_eq!(config.min_duration_minutes, 15);
        assert_eq!(config.max_duration_minutes, 240);
        assert_eq!(config.reminder_window_hours, 24);
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let config: ServiceConfig =
            serde_json::from_value(serde_json::json!({"reminder_window_hours": 48})).unwrap();
        assert_eq!(config.reminder_window_hours, 48);
        assert_eq!(config.default_duration_minutes, 60);
    }
}
