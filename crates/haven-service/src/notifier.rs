//! Email notifications for booking events.
//!
//! The platform does not render emails itself. A [`Notifier`] hands a
//! template name plus data to a relay that owns the templates.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::booking::Booking;
use crate::error::{Result, ServiceError};

/// Which booking event a message announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// A booking request was received.
    BookingReceived,
    /// A booking was confirmed.
    BookingApproved,
    /// A booking was cancelled.
    BookingCancelled,
    /// A confirmed booking starts soon.
    BookingReminder,
}

impl NotificationKind {
    const fn subject(self) -> &'static str {
        match self {
            Self::BookingReceived => "We received your booking request",
            Self::BookingApproved => "Your session is confirmed",
            Self::BookingCancelled => "Your session was cancelled",
            Self::BookingReminder => "Reminder: your session is coming up",
        }
    }
}

/// One outgoing email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Template the relay renders.
    pub template: NotificationKind,
    /// Template data.
    pub data: Value,
}

impl EmailMessage {
    /// The message announcing `kind` to the booking's guest.
    #[must_use]
    pub fn for_booking(kind: NotificationKind, booking: &Booking) -> Self {
        Self {
            to: booking.guest_email.clone(),
            subject: kind.subject().to_string(),
            template: kind,
            data: json!({
                "bookingId": booking.id,
                "guestName": booking.guest_name,
                "counselorName": booking.counselor_name,
                "bookingDate": booking.booking_date,
                "bookingTime": booking.booking_time,
                "duration": booking.duration,
                "meetingLink": booking.meeting_link,
                "cancellationReason": booking.cancellation_reason,
            }),
        }
    }
}

/// Trait for sending notifications.
///
/// Callers treat failures as non-fatal; implementations only report them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Notification` if delivery fails.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Sends messages through an HTTP email relay.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

/// Request body for the relay.
#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a EmailMessage,
}

/// Error response from the relay.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl HttpNotifier {
    /// Create a notifier posting to `endpoint` with the given sender address.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Internal` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, endpoint, from))
    }

    /// Create a notifier with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            from: from.into(),
        }
    }

    /// The relay endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let request = RelayRequest {
            from: &self.from,
            message,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Notification(format!("relay request failed: {e}")))?;

        if response.status().is_success() {
            tracing::debug!(to = %message.to, template = ?message.template, "Sent email");
            Ok(())
        } else {
            let status = response.status();
            let error = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("relay returned status {status}"));

            Err(ServiceError::Notification(error))
        }
    }
}

/// A notifier that drops every message, for deployments without email.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::debug!(
            to = %message.to,
            template = ?message.template,
            "NoopNotifier: email relay not configured, dropping message"
        );
        Ok(())
    }
}

/// A notifier that records messages and fails on demand, for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: parking_lot::Mutex<Vec<EmailMessage>>,
    failing: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingNotifier {
    /// Make every message to `recipient` fail.
    pub fn fail_for(&self, recipient: impl Into<String>) {
        self.failing.lock().push(recipient.into());
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.failing.lock().contains(&message.to) {
            return Err(ServiceError::Notification(format!(
                "delivery to {} refused",
                message.to
            )));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
