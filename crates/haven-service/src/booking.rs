//! Booking lifecycle management.
//!
//! A booking reserves one `(counselor, date, time)` slot. Creation and
//! rescheduling are guarded twice: an explicit availability check gives a
//! readable error, and the write itself is conditional on the slot claim so
//! two concurrent requests cannot both succeed.
//!
//! Notifications go out after the write commits, on a spawned task; their
//! failure never affects the operation that triggered them.

use std::sync::Arc;

use chrono::Utc;
use haven_core::time::{canonical_clock, canonical_date, now_timestamp, slot_start};
use haven_core::{new_key, Caller, Role};
use haven_store::{
    to_item, EntitySchema, Item, ListQuery, Page, PageRequest, PostFilter, Predicate, Record,
    Repository, Store, UniqueGuard,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz;
use crate::counselor::CounselorService;
use crate::error::{Result, ServiceError};
use crate::lifecycle::{self, BookingStatus, SLOT_HOLDING};
use crate::notifier::{EmailMessage, NotificationKind, Notifier};
use crate::schemas::BOOKINGS;
use crate::types::ServiceConfig;
use crate::validate;

/// A scheduled session between a counselor and a user or guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Key.
    pub id: String,
    /// Booked counselor.
    pub counselor_id: String,
    /// Counselor name at booking time.
    #[serde(default)]
    pub counselor_name: String,
    /// Counselor address at booking time.
    #[serde(default)]
    pub counselor_email: String,
    /// Registered user who booked, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Contact name.
    pub guest_name: String,
    /// Contact address.
    pub guest_email: String,
    /// Contact phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_phone: Option<String>,
    /// `YYYY-MM-DD`.
    pub booking_date: String,
    /// `HH:MM`, 24h, UTC.
    pub booking_time: String,
    /// Minutes.
    pub duration: u32,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Free-form notes from the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Video call link, set on confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    /// Whether the "received" email went out.
    #[serde(default)]
    pub confirmation_email_sent: bool,
    /// Whether the reminder email went out.
    #[serde(default)]
    pub reminder_email_sent: bool,
    /// Why the booking was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// When the booking was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
    /// Role of whoever cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<Role>,
    /// When the booking was confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<String>,
    /// When the session was marked completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_active: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Last update time.
    #[serde(default)]
    pub updated_at: String,
}

impl Record for Booking {
    const SCHEMA: &'static EntitySchema = &BOOKINGS;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Booking {
    /// Whether `caller` booked this session.
    #[must_use]
    pub fn is_owned_by(&self, caller: &Caller) -> bool {
        self.user_id.as_deref().is_some_and(|owner| caller.owns(owner))
    }
}

/// Request to book a session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Counselor to book.
    pub counselor_id: String,
    /// Contact name.
    pub guest_name: String,
    /// Contact address.
    pub guest_email: String,
    /// Contact phone.
    #[serde(default)]
    pub guest_phone: Option<String>,
    /// `YYYY-MM-DD`.
    pub booking_date: String,
    /// `HH:MM`.
    pub booking_time: String,
    /// Minutes; the configured default when absent.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Notes for the counselor.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Changes to a booking that has not reached a terminal status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    /// New date.
    pub booking_date: Option<String>,
    /// New time.
    pub booking_time: Option<String>,
    /// New duration.
    pub duration: Option<u32>,
    /// New notes.
    pub notes: Option<String>,
    /// New contact name.
    pub guest_name: Option<String>,
    /// New contact address.
    pub guest_email: Option<String>,
    /// New contact phone.
    pub guest_phone: Option<String>,
}

/// Booking list filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilters {
    /// Exact status.
    pub status: Option<BookingStatus>,
    /// Exact counselor.
    pub counselor_id: Option<String>,
    /// Exact user.
    pub user_id: Option<String>,
    /// Exact date.
    pub booking_date: Option<String>,
    /// Earliest date, inclusive.
    pub date_from: Option<String>,
    /// Latest date, inclusive.
    pub date_to: Option<String>,
    /// Free-text search.
    pub search: Option<String>,
}

/// Slot availability answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Counselor asked about.
    pub counselor_id: String,
    /// Date asked about.
    pub booking_date: String,
    /// Time asked about.
    pub booking_time: String,
    /// Whether the slot is free.
    pub available: bool,
}

/// Claim name for a slot.
fn slot_claim(counselor_id: &str, date: &str, time: &str) -> String {
    format!("{counselor_id}#{date}#{time}")
}

/// Conditions under which a booking still occupies its slot.
fn slot_holder(counselor_id: &str, date: &str, time: &str) -> Predicate {
    Predicate::new()
        .eq("counselorId", counselor_id)
        .eq("bookingDate", date)
        .eq("bookingTime", time)
        .eq("isActive", true)
        .one_of("status", SLOT_HOLDING)
}

fn slot_guard(counselor_id: &str, date: &str, time: &str) -> UniqueGuard {
    UniqueGuard::new(
        slot_claim(counselor_id, date, time),
        slot_holder(counselor_id, date, time),
    )
}

fn attrs(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Item {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Booking lifecycle service.
pub struct BookingService<S: Store> {
    bookings: Repository<S, Booking>,
    counselors: CounselorService<S>,
    notifier: Arc<dyn Notifier>,
    config: ServiceConfig,
}

impl<S: Store> Clone for BookingService<S> {
    fn clone(&self) -> Self {
        Self {
            bookings: self.bookings.clone(),
            counselors: self.counselors.clone(),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
        }
    }
}

impl<S: Store + 'static> BookingService<S> {
    /// Create a booking service.
    #[must_use]
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, config: ServiceConfig) -> Self {
        Self {
            bookings: Repository::new(Arc::clone(&store)),
            counselors: CounselorService::new(store),
            notifier,
            config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub(crate) fn repository(&self) -> &Repository<S, Booking> {
        &self.bookings
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Fetch an active booking.
    fn load(&self, id: &str) -> Result<Booking> {
        match self.bookings.get(id)? {
            Some(booking) if booking.is_active => Ok(booking),
            _ => Err(ServiceError::not_found("booking", id)),
        }
    }

    fn validate_duration(&self, duration: u32) -> Result<u32> {
        let (min, max) = (self.config.min_duration_minutes, self.config.max_duration_minutes);
        if (min..=max).contains(&duration) {
            Ok(duration)
        } else {
            Err(ServiceError::Validation(format!(
                "duration must be between {min} and {max} minutes"
            )))
        }
    }

    /// Reject slots that do not start strictly in the future.
    fn require_future(date: &str, time: &str) -> Result<()> {
        if slot_start(date, time)? <= Utc::now() {
            return Err(ServiceError::Validation(
                "booking must start in the future".into(),
            ));
        }
        Ok(())
    }

    /// Whether another live booking holds the slot.
    fn slot_taken(
        &self,
        counselor_id: &str,
        date: &str,
        time: &str,
        except: Option<&str>,
    ) -> Result<bool> {
        let holders = self.bookings.find_by_index(
            "counselorId",
            counselor_id,
            &slot_holder(counselor_id, date, time),
        )?;
        Ok(holders.iter().any(|b| Some(b.id.as_str()) != except))
    }

    /// Send a notification on a background task. On success the
    /// `on_success` attribute, if any, is set to `true` on the booking.
    fn notify(&self, kind: NotificationKind, booking: &Booking, on_success: Option<&'static str>) {
        let message = EmailMessage::for_booking(kind, booking);
        let notifier = Arc::clone(&self.notifier);
        let bookings = self.bookings.clone();
        let booking_id = booking.id.clone();

        tokio::spawn(async move {
            match notifier.send(&message).await {
                Ok(()) => {
                    if let Some(flag) = on_success {
                        if let Err(e) = bookings.update(&booking_id, attrs([(flag, Value::Bool(true))])) {
                            tracing::warn!(booking_id = %booking_id, error = %e, "Failed to record sent email");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        booking_id = %booking_id,
                        template = ?kind,
                        error = %e,
                        "Booking notification failed"
                    );
                }
            }
        });
    }

    /// Book a session.
    ///
    /// Anonymous callers book as guests; authenticated callers are recorded
    /// as the booking's owner.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed input or past slots, `NotFound` for
    /// unknown or inactive counselors and `Conflict` when the slot is taken.
    pub async fn create(
        &self,
        caller: Option<&Caller>,
        request: CreateBookingRequest,
    ) -> Result<Booking> {
        let guest_name = validate::required("guestName", &request.guest_name)?;
        let guest_email = validate::email(&request.guest_email)?;
        let booking_date = canonical_date(&request.booking_date)?;
        let booking_time = canonical_clock(&request.booking_time)?;
        let duration =
            self.validate_duration(request.duration.unwrap_or(self.config.default_duration_minutes))?;
        Self::require_future(&booking_date, &booking_time)?;

        let counselor = self.counselors.active(&request.counselor_id)?;

        if self.slot_taken(&counselor.id, &booking_date, &booking_time, None)? {
            return Err(ServiceError::Conflict(format!(
                "{} on {booking_date} at {booking_time} is already booked",
                counselor.name
            )));
        }

        let now = now_timestamp();
        let booking = Booking {
            id: new_key(),
            counselor_id: counselor.id.clone(),
            counselor_name: counselor.name,
            counselor_email: counselor.email,
            user_id: caller.map(|c| c.user_id.to_string()),
            guest_name,
            guest_email,
            guest_phone: validate::optional(request.guest_phone),
            booking_date,
            booking_time,
            duration,
            status: BookingStatus::Pending,
            notes: validate::optional(request.notes),
            meeting_link: None,
            confirmation_email_sent: false,
            reminder_email_sent: false,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            confirmed_at: None,
            completed_at: None,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let guard = slot_guard(&booking.counselor_id, &booking.booking_date, &booking.booking_time);
        let booking = self.bookings.put_unique(&booking, &guard)?;

        tracing::info!(
            booking_id = %booking.id,
            counselor_id = %booking.counselor_id,
            date = %booking.booking_date,
            time = %booking.booking_time,
            "Created booking"
        );

        self.notify(
            NotificationKind::BookingReceived,
            &booking,
            Some("confirmationEmailSent"),
        );

        Ok(booking)
    }

    /// Whether a slot is free.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed dates or times.
    pub async fn check_availability(
        &self,
        counselor_id: &str,
        date: &str,
        time: &str,
    ) -> Result<Availability> {
        let date = canonical_date(date)?;
        let time = canonical_clock(time)?;

        let available = !self.slot_taken(counselor_id, &date, &time, None)?;
        Ok(Availability {
            counselor_id: counselor_id.to_string(),
            booking_date: date,
            booking_time: time,
            available,
        })
    }

    /// Apply a status transition with extra attributes.
    fn transition(&self, booking: &Booking, to: BookingStatus, extra: Item) -> Result<Booking> {
        lifecycle::validate_transition(&booking.id, booking.status, to)?;

        let mut partial = extra;
        partial.insert("status".into(), to.into());

        let updated = self
            .bookings
            .update(&booking.id, partial)?
            .ok_or_else(|| ServiceError::not_found("booking", &booking.id))?;

        tracing::info!(
            booking_id = %booking.id,
            from = %booking.status,
            to = %to,
            "Booking status changed"
        );

        Ok(updated)
    }

    /// Confirm a pending booking with a meeting link.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers, `Validation` for a missing
    /// link and `InvalidTransition` unless the booking is pending.
    pub async fn confirm(&self, caller: &Caller, id: &str, meeting_link: &str) -> Result<Booking> {
        authz::require_staff(caller)?;
        let meeting_link = validate::web_url("meetingLink", meeting_link)?;
        let booking = self.load(id)?;

        let updated = self.transition(
            &booking,
            BookingStatus::Confirmed,
            attrs([
                ("meetingLink", Value::String(meeting_link)),
                ("confirmedAt", Value::String(now_timestamp())),
            ]),
        )?;

        self.notify(NotificationKind::BookingApproved, &updated, None);
        Ok(updated)
    }

    /// Cancel a pending or confirmed booking.
    ///
    /// Users may cancel only their own bookings; staff may cancel any.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when a user cancels someone else's booking and
    /// `InvalidTransition` from terminal statuses.
    pub async fn cancel(
        &self,
        caller: &Caller,
        id: &str,
        reason: Option<String>,
    ) -> Result<Booking> {
        let booking = self.load(id)?;
        if !caller.is_staff() && !booking.is_owned_by(caller) {
            return Err(ServiceError::Forbidden(
                "users may only cancel their own bookings".into(),
            ));
        }

        let mut extra = attrs([
            ("cancelledAt", Value::String(now_timestamp())),
            ("cancelledBy", Value::String(caller.role.as_str().to_string())),
        ]);
        if let Some(reason) = validate::optional(reason) {
            extra.insert("cancellationReason".into(), Value::String(reason));
        }

        let updated = self.transition(&booking, BookingStatus::Cancelled, extra)?;

        self.notify(NotificationKind::BookingCancelled, &updated, None);
        Ok(updated)
    }

    /// Mark a confirmed booking as completed.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers and `InvalidTransition`
    /// unless the booking is confirmed.
    pub async fn complete(&self, caller: &Caller, id: &str) -> Result<Booking> {
        authz::require_staff(caller)?;
        let booking = self.load(id)?;
        self.transition(
            &booking,
            BookingStatus::Completed,
            attrs([("completedAt", Value::String(now_timestamp()))]),
        )
    }

    /// Mark a confirmed booking as a no-show.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers and `InvalidTransition`
    /// unless the booking is confirmed.
    pub async fn mark_no_show(&self, caller: &Caller, id: &str) -> Result<Booking> {
        authz::require_staff(caller)?;
        let booking = self.load(id)?;
        self.transition(&booking, BookingStatus::NoShow, Item::new())
    }

    /// Change contact details, notes, duration or the slot itself.
    ///
    /// Moving to a new date or time re-checks availability and claims the
    /// new slot in the same write.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` unless the caller owns the booking or is an admin,
    /// `Conflict` once the booking is terminal or when the new slot is taken,
    /// and `Validation` for malformed input.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        request: UpdateBookingRequest,
    ) -> Result<Booking> {
        let booking = self.load(id)?;
        if !caller.is_admin() && !booking.is_owned_by(caller) {
            return Err(ServiceError::Forbidden(
                "only the owner or an admin may change a booking".into(),
            ));
        }
        if !lifecycle::can_reschedule(booking.status) {
            return Err(ServiceError::Conflict(format!(
                "booking {id} is {} and can no longer be changed",
                booking.status
            )));
        }

        let mut partial = Item::new();
        if let Some(name) = &request.guest_name {
            partial.insert("guestName".into(), validate::required("guestName", name)?.into());
        }
        if let Some(email) = &request.guest_email {
            partial.insert("guestEmail".into(), validate::email(email)?.into());
        }
        if let Some(phone) = request.guest_phone {
            partial.insert("guestPhone".into(), phone.trim().into());
        }
        if let Some(notes) = request.notes {
            partial.insert("notes".into(), notes.trim().into());
        }
        if let Some(duration) = request.duration {
            partial.insert("duration".into(), self.validate_duration(duration)?.into());
        }

        let date = match request.booking_date {
            Some(date) => canonical_date(&date)?,
            None => booking.booking_date.clone(),
        };
        let time = match request.booking_time {
            Some(time) => canonical_clock(&time)?,
            None => booking.booking_time.clone(),
        };
        let moved = date != booking.booking_date || time != booking.booking_time;

        let updated = if moved {
            Self::require_future(&date, &time)?;

            if self.slot_taken(&booking.counselor_id, &date, &time, Some(id))? {
                return Err(ServiceError::Conflict(format!(
                    "{} on {date} at {time} is already booked",
                    booking.counselor_name
                )));
            }

            partial.insert("bookingDate".into(), Value::String(date.clone()));
            partial.insert("bookingTime".into(), Value::String(time.clone()));
            // A moved session gets a fresh reminder
            partial.insert("reminderEmailSent".into(), Value::Bool(false));

            let guard = slot_guard(&booking.counselor_id, &date, &time);
            self.bookings.update_unique(id, partial, &guard)?
        } else {
            self.bookings.update(id, partial)?
        };

        let updated = updated.ok_or_else(|| ServiceError::not_found("booking", id))?;
        if moved {
            tracing::info!(booking_id = %id, date = %date, time = %time, "Rescheduled booking");
        }
        Ok(updated)
    }

    /// Fetch one booking. Visible to its owner and to staff.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Booking> {
        let booking = self.load(id)?;
        if !caller.is_staff() && !booking.is_owned_by(caller) {
            return Err(ServiceError::Forbidden("not your booking".into()));
        }
        Ok(booking)
    }

    /// List bookings (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn list(
        &self,
        caller: &Caller,
        filters: BookingFilters,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        authz::require_admin(caller)?;
        let booking_date = filters.booking_date.as_deref().map(canonical_date).transpose()?;
        let date_from = filters.date_from.as_deref().map(canonical_date).transpose()?;
        let date_to = filters.date_to.as_deref().map(canonical_date).transpose()?;

        // Narrowest index first; the remaining equalities become conditions.
        let mut query = ListQuery::new();
        let mut counselor_id = filters.counselor_id;
        let mut user_id = filters.user_id;
        let mut status = filters.status;
        if let Some(id) = counselor_id.take() {
            query = query.by_index("counselorId", id);
        } else if let Some(id) = user_id.take() {
            query = query.by_index("userId", id);
        } else if let Some(status) = status.take() {
            query = query.by_index("status", status);
        }

        let query = query
            .eq("isActive", true)
            .eq_opt("counselorId", counselor_id)
            .eq_opt("userId", user_id)
            .eq_opt("status", status)
            .eq_opt("bookingDate", booking_date)
            .filter_opt(
                (date_from.is_some() || date_to.is_some())
                    .then(|| PostFilter::range("bookingDate", date_from, date_to)),
            )
            .search(filters.search.as_deref())
            .page(page);

        Ok(self.bookings.list(&query)?)
    }

    /// The caller's own bookings.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_for_user(
        &self,
        caller: &Caller,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        let query = ListQuery::new()
            .by_index("userId", caller.user_id.to_string())
            .eq("isActive", true)
            .eq_opt("status", status)
            .page(page);

        Ok(self.bookings.list(&query)?)
    }

    /// Soft-delete a booking (admin). The slot is released.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound` for unknown ids.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<()> {
        authz::require_admin(caller)?;
        self.bookings
            .soft_delete(id)?
            .ok_or_else(|| ServiceError::not_found("booking", id))?;
        tracing::info!(booking_id = %id, "Deleted booking");
        Ok(())
    }
}
