//! Wiring for every service over one store.

use std::sync::Arc;

use haven_store::Store;

use crate::blog::BlogService;
use crate::booking::BookingService;
use crate::category::CategoryService;
use crate::counselor::CounselorService;
use crate::lead::LeadService;
use crate::media::MediaService;
use crate::notifier::Notifier;
use crate::storage::{ObjectStorage, UploadService};
use crate::testimonial::TestimonialService;
use crate::types::ServiceConfig;
use crate::user::UserService;

/// All services, built once at startup and shared.
pub struct Services<S: Store> {
    /// Bookings and reminders.
    pub bookings: BookingService<S>,
    /// Counselor profiles.
    pub counselors: CounselorService<S>,
    /// Leads and activities.
    pub leads: LeadService<S>,
    /// Blog posts.
    pub blogs: BlogService<S>,
    /// Testimonials.
    pub testimonials: TestimonialService<S>,
    /// Categories.
    pub categories: CategoryService<S>,
    /// User profiles.
    pub users: UserService<S>,
    /// Media collections.
    pub media: MediaService<S>,
    /// File uploads.
    pub uploads: UploadService,
}

impl<S: Store> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            bookings: self.bookings.clone(),
            counselors: self.counselors.clone(),
            leads: self.leads.clone(),
            blogs: self.blogs.clone(),
            testimonials: self.testimonials.clone(),
            categories: self.categories.clone(),
            users: self.users.clone(),
            media: self.media.clone(),
            uploads: self.uploads.clone(),
        }
    }
}

impl<S: Store + 'static> Services<S> {
    /// Build every service over `store` with the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn ObjectStorage>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            bookings: BookingService::new(Arc::clone(&store), notifier, config),
            counselors: CounselorService::new(Arc::clone(&store)),
            leads: LeadService::new(Arc::clone(&store)),
            blogs: BlogService::new(Arc::clone(&store), Arc::clone(&storage)),
            testimonials: TestimonialService::new(Arc::clone(&store)),
            categories: CategoryService::new(Arc::clone(&store)),
            users: UserService::new(Arc::clone(&store)),
            media: MediaService::new(store, Arc::clone(&storage)),
            uploads: UploadService::new(storage),
        }
    }
}
