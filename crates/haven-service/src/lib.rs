//! Business logic for Haven.
//!
//! This crate holds every rule the platform enforces. Services sit between
//! the HTTP gateway and the item store; each one owns the authorization
//! checks, validation and state changes for one entity.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Gateway (HTTP)                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Services                            │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Booking    │ │  Entity     │ │    Lifecycle        │    │
//! │  │  + reminder │ │  services   │ │    State Machine    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │  Store   │   │ Notifier │   │  Object  │
//!        │ (RocksDB)│   │  (HTTP)  │   │ Storage  │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use haven_service::{
//!     schemas, CreateBookingRequest, NoopNotifier, NoopObjectStorage, ServiceConfig, Services,
//! };
//! use haven_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/haven", schemas::ALL)?);
//! let services = Services::new(
//!     store,
//!     Arc::new(NoopNotifier),
//!     Arc::new(NoopObjectStorage),
//!     ServiceConfig::default(),
//! );
//!
//! let request = CreateBookingRequest {
//!     counselor_id: "c-1".into(),
//!     guest_name: "Ana".into(),
//!     guest_email: "ana@example.com".into(),
//!     booking_date: "2030-06-01".into(),
//!     booking_time: "14:00".into(),
//!     ..Default::default()
//! };
//! let booking = services.bookings.create(None, request).await?;
//! println!("Booked {} at {}", booking.booking_date, booking.booking_time);
//! # Ok(())
//! # }
//! ```
//!
//! # Booking states
//!
//! - `pending` → `confirmed` or `cancelled`
//! - `confirmed` → `completed`, `no-show` or `cancelled`
//! - `completed`, `no-show` and `cancelled` are terminal
//!
//! See the [`lifecycle`] module for transition validation helpers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod authz;
pub mod blog;
pub mod booking;
pub mod category;
pub mod counselor;
pub mod error;
pub mod exclusive;
pub mod lead;
pub mod lifecycle;
pub mod media;
pub mod notifier;
pub mod reminder;
pub mod schemas;
pub mod services;
pub mod storage;
pub mod testimonial;
pub mod types;
pub mod user;
pub mod validate;

pub use blog::{AuthorInfo, Blog, BlogFilters, BlogService, CreateBlogRequest, UpdateBlogRequest};
pub use booking::{
    Availability, Booking, BookingFilters, BookingService, CreateBookingRequest,
    UpdateBookingRequest,
};
pub use category::{
    Category, CategoryFilters, CategoryKind, CategoryService, CreateCategoryRequest,
    UpdateCategoryRequest,
};
pub use counselor::{
    Counselor, CounselorFilters, CounselorService, CreateCounselorRequest, UpdateCounselorRequest,
};
pub use error::{Result, ServiceError};
pub use lead::{
    ActivityType, CreateActivityRequest, CreateLeadRequest, Lead, LeadActivity, LeadFilters,
    LeadService, LeadStats, UpdateActivityRequest, UpdateLeadRequest,
};
pub use lifecycle::BookingStatus;
pub use media::{MediaCollection, MediaFilters, MediaItem, MediaRequest, MediaService};
pub use notifier::{EmailMessage, HttpNotifier, NoopNotifier, NotificationKind, Notifier};
pub use reminder::ReminderReport;
pub use services::Services;
pub use storage::{NoopObjectStorage, ObjectStorage, S3ObjectStorage, UploadService, UploadedObject};
pub use testimonial::{
    CreateTestimonialRequest, Testimonial, TestimonialFilters, TestimonialService,
    UpdateTestimonialRequest,
};
pub use types::ServiceConfig;
pub use user::{RegisterProfileRequest, UpdateUserRequest, User, UserFilters, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use notifier::RecordingNotifier;
#[cfg(any(test, feature = "test-utils"))]
pub use storage::RecordingObjectStorage;

// Re-export commonly used types from dependencies for convenience
pub use haven_core::{Caller, Role, UserId};
pub use haven_store::{Page, PageRequest};
