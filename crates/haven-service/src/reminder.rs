//! Reminder scan for confirmed bookings.
//!
//! The scan runs on demand (an internal HTTP trigger or a scheduler calling
//! it). Each due booking is handled independently: a failed email is logged,
//! counted and retried on the next run because its flag stays unset.

use chrono::{DateTime, Duration, Utc};
use haven_core::time::slot_start;
use haven_store::{Item, Predicate, Store};
use serde::Serialize;
use serde_json::Value;

use crate::booking::{Booking, BookingService};
use crate::error::Result;
use crate::lifecycle::BookingStatus;
use crate::notifier::{EmailMessage, NotificationKind};

/// Outcome of one reminder scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderReport {
    /// Confirmed bookings without a reminder.
    pub scanned: usize,
    /// Of those, bookings starting inside the window.
    pub due: usize,
    /// Reminders delivered and flagged.
    pub sent: usize,
    /// Reminders that failed to send or to flag.
    pub failed: usize,
}

fn is_due(booking: &Booking, now: DateTime<Utc>, window: Duration) -> bool {
    match slot_start(&booking.booking_date, &booking.booking_time) {
        Ok(start) => start > now && start <= now + window,
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, error = %e, "Skipping booking with unreadable slot");
            false
        }
    }
}

impl<S: Store + 'static> BookingService<S> {
    /// Send reminders for confirmed bookings starting in `(now, now + window]`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial index read fails. Per-booking
    /// failures are reported in the counts.
    pub async fn run_reminder_scan(&self, now: DateTime<Utc>) -> Result<ReminderReport> {
        let window = Duration::hours(self.config().reminder_window_hours);
        let pending = self.repository().find_by_index(
            "status",
            BookingStatus::Confirmed,
            &Predicate::new()
                .eq("reminderEmailSent", false)
                .eq("isActive", true),
        )?;

        let mut report = ReminderReport {
            scanned: pending.len(),
            ..ReminderReport::default()
        };

        for booking in pending.iter().filter(|b| is_due(b, now, window)) {
            report.due += 1;

            let message = EmailMessage::for_booking(NotificationKind::BookingReminder, booking);
            if let Err(e) = self.notifier().send(&message).await {
                tracing::warn!(booking_id = %booking.id, error = %e, "Reminder email failed");
                report.failed += 1;
                continue;
            }

            let mut flag = Item::new();
            flag.insert("reminderEmailSent".into(), Value::Bool(true));
            match self.repository().update(&booking.id, flag) {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    tracing::error!(booking_id = %booking.id, error = %e, "Failed to flag sent reminder");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            due = report.due,
            sent = report.sent,
            failed = report.failed,
            "Reminder scan finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::tests::{days_ahead, request, setup};
    use crate::booking::CreateBookingRequest;

    #[tokio::test]
    async fn reminds_only_confirmed_bookings_inside_window() {
        let f = setup().await;
        let tomorrow = days_ahead(1);

        let due = f
            .service
            .create(None, request(&f.counselor_id, &tomorrow, "10:00"))
            .await
            .unwrap();
        f.service.confirm(&f.admin, &due.id, "https://x").await.unwrap();

        // Confirmed but far away
        let later = f
            .service
            .create(None, request(&f.counselor_id, &days_ahead(5), "10:00"))
            .await
            .unwrap();
        f.service.confirm(&f.admin, &later.id, "https://x").await.unwrap();

        // Inside the window but still pending
        f.service
            .create(None, request(&f.counselor_id, &tomorrow, "11:00"))
            .await
            .unwrap();

        // Run as of the evening before so "tomorrow 10:00" is within 24h
        let now = slot_start(&tomorrow, "10:00").unwrap() - Duration::hours(12);
        let report = f.service.run_reminder_scan(now).await.unwrap();
        assert_eq!(
            report,
            ReminderReport {
                scanned: 2,
                due: 1,
                sent: 1,
                failed: 0
            }
        );

        let flagged = f.service.repository().get(&due.id).unwrap().unwrap();
        assert!(flagged.reminder_email_sent);

        // A second run finds nothing left to do
        let again = f.service.run_reminder_scan(now).await.unwrap();
        assert_eq!(again.scanned, 1);
        assert_eq!(again.due, 0);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_scan() {
        let f = setup().await;
        let tomorrow = days_ahead(1);
        f.notifier.fail_for("bounce@example.com");

        let failing = f
            .service
            .create(
                None,
                CreateBookingRequest {
                    guest_email: "bounce@example.com".into(),
                    ..request(&f.counselor_id, &tomorrow, "09:00")
                },
            )
            .await
            .unwrap();
        let ok = f
            .service
            .create(None, request(&f.counselor_id, &tomorrow, "10:00"))
            .await
            .unwrap();
        for id in [&failing.id, &ok.id] {
            f.service.confirm(&f.admin, id, "https://x").await.unwrap();
        }

        let now = slot_start(&tomorrow, "09:00").unwrap() - Duration::hours(2);
        let report = f.service.run_reminder_scan(now).await.unwrap();
        assert_eq!(report.due, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);

        let unflagged = f.service.repository().get(&failing.id).unwrap().unwrap();
        assert!(!unflagged.reminder_email_sent);
        let flagged = f.service.repository().get(&ok.id).unwrap().unwrap();
        assert!(flagged.reminder_email_sent);
    }

    #[tokio::test]
    async fn started_sessions_are_not_due() {
        let f = setup().await;
        let tomorrow = days_ahead(1);
        let booking = f
            .service
            .create(None, request(&f.counselor_id, &tomorrow, "10:00"))
            .await
            .unwrap();
        f.service.confirm(&f.admin, &booking.id, "https://x").await.unwrap();

        let after_start = slot_start(&tomorrow, "10:00").unwrap() + Duration::minutes(1);
        let report = f.service.run_reminder_scan(after_start).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.due, 0);
    }
}
