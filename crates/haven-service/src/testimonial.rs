//! Client testimonials.

use std::sync::Arc;

use haven_core::time::now_timestamp;
use haven_core::{new_key, Caller};
use haven_store::{
    from_item, EntitySchema, Item, ListQuery, Page, PageRequest, Record, Repository, Store,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz;
use crate::error::{Result, ServiceError};
use crate::exclusive;
use crate::schemas::TESTIMONIALS;
use crate::validate;

/// A testimonial left by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    /// Key.
    pub id: String,
    /// Name shown with the quote.
    pub name: String,
    /// Role or location shown under the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    /// The quote.
    pub message: String,
    /// Stars, `0.0..=5.0`.
    pub rating: f64,
    /// Portrait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Author.
    pub user_id: String,
    /// Shown publicly.
    #[serde(default)]
    pub is_published: bool,
    /// Highlighted on the homepage; at most one.
    #[serde(default)]
    pub is_featured: bool,
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

impl Record for Testimonial {
    const SCHEMA: &'static EntitySchema = &TESTIMONIALS;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Request to leave a testimonial.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestimonialRequest {
    /// Name shown with the quote.
    pub name: String,
    /// Role or location.
    #[serde(default)]
    pub designation: Option<String>,
    /// The quote.
    pub message: String,
    /// Stars.
    pub rating: f64,
    /// Portrait.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Partial testimonial update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTestimonialRequest {
    /// New name.
    pub name: Option<String>,
    /// New designation.
    pub designation: Option<String>,
    /// New quote.
    pub message: Option<String>,
    /// New rating.
    pub rating: Option<f64>,
    /// New portrait.
    pub avatar_url: Option<String>,
}

/// Testimonial list filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialFilters {
    /// Featured only.
    pub featured: Option<bool>,
    /// Publication flag; honored for admins only.
    pub published: Option<bool>,
    /// Author.
    pub user_id: Option<String>,
    /// Free-text search.
    pub search: Option<String>,
}

/// Testimonial management.
pub struct TestimonialService<S: Store> {
    testimonials: Repository<S, Testimonial>,
}

impl<S: Store> Clone for TestimonialService<S> {
    fn clone(&self) -> Self {
        Self {
            testimonials: self.testimonials.clone(),
        }
    }
}

impl<S: Store + 'static> TestimonialService<S> {
    /// Create a testimonial service.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            testimonials: Repository::new(store),
        }
    }

    fn load(&self, id: &str) -> Result<Testimonial> {
        match self.testimonials.get(id)? {
            Some(t) if t.is_active => Ok(t),
            _ => Err(ServiceError::not_found("testimonial", id)),
        }
    }

    fn set_flag(&self, id: &str, attribute: &str, on: bool) -> Result<Testimonial> {
        let mut partial = Item::new();
        partial.insert(attribute.to_string(), Value::Bool(on));
        self.testimonials
            .update(id, partial)?
            .ok_or_else(|| ServiceError::not_found("testimonial", id))
    }

    /// Leave a testimonial. New testimonials await publication.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty fields or an out-of-range rating.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateTestimonialRequest,
    ) -> Result<Testimonial> {
        let now = now_timestamp();
        let testimonial = Testimonial {
            id: new_key(),
            name: validate::required("name", &request.name)?,
            designation: validate::optional(request.designation),
            message: validate::required("message", &request.message)?,
            rating: validate::rating(request.rating)?,
            avatar_url: validate::optional(request.avatar_url),
            user_id: caller.user_id.to_string(),
            is_published: false,
            is_featured: false,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let testimonial = self.testimonials.create(&testimonial)?;
        tracing::info!(testimonial_id = %testimonial.id, "Received testimonial");
        Ok(testimonial)
    }

    /// Fetch a testimonial. Unpublished ones are visible to their author
    /// and admins.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`.
    pub async fn get(&self, caller: Option<&Caller>, id: &str) -> Result<Testimonial> {
        let t = self.load(id)?;
        let privileged = caller.is_some_and(|c| c.is_admin() || c.owns(&t.user_id));
        if t.is_published || privileged {
            Ok(t)
        } else {
            Err(ServiceError::not_found("testimonial", id))
        }
    }

    /// List testimonials. The public sees published ones only.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list(
        &self,
        caller: Option<&Caller>,
        filters: TestimonialFilters,
        page: PageRequest,
    ) -> Result<Page<Testimonial>> {
        let published = if authz::is_admin(caller) {
            filters.published
        } else {
            Some(true)
        };

        let mut query = ListQuery::new();
        if let Some(user_id) = filters.user_id {
            query = query.by_index("userId", user_id);
        }
        let query = query
            .eq("isActive", true)
            .eq_opt("isPublished", published)
            .eq_opt("isFeatured", filters.featured)
            .search(filters.search.as_deref())
            .page(page);

        Ok(self.testimonials.list(&query)?)
    }

    /// Edit a testimonial. Only its author or an admin may.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `Validation` and `NotFound`.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        mut request: UpdateTestimonialRequest,
    ) -> Result<Testimonial> {
        let t = self.load(id)?;
        authz::require_owner_or_admin(caller, &t.user_id)?;

        if let Some(rating) = request.rating {
            request.rating = Some(validate::rating(rating)?);
        }
        if let Some(name) = &request.name {
            request.name = Some(validate::required("name", name)?);
        }
        if let Some(message) = &request.message {
            request.message = Some(validate::required("message", message)?);
        }

        self.testimonials
            .patch(id, &request)?
            .ok_or_else(|| ServiceError::not_found("testimonial", id))
    }

    /// Soft-delete a testimonial. Only its author or an admin may.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<()> {
        let t = self.load(id)?;
        authz::require_owner_or_admin(caller, &t.user_id)?;
        self.testimonials.soft_delete(id)?;
        Ok(())
    }

    /// Show a testimonial publicly (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn publish(&self, caller: &Caller, id: &str) -> Result<Testimonial> {
        authz::require_admin(caller)?;
        self.load(id)?;
        self.set_flag(id, "isPublished", true)
    }

    /// Hide a testimonial (admin). An unpublished testimonial also loses
    /// its featured spot.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn unpublish(&self, caller: &Caller, id: &str) -> Result<Testimonial> {
        authz::require_admin(caller)?;
        self.load(id)?;

        let mut partial = Item::new();
        partial.insert("isPublished".into(), Value::Bool(false));
        partial.insert("isFeatured".into(), Value::Bool(false));
        self.testimonials
            .update(id, partial)?
            .ok_or_else(|| ServiceError::not_found("testimonial", id))
    }

    /// Make this the only featured testimonial (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn feature(&self, caller: &Caller, id: &str) -> Result<Testimonial> {
        authz::require_admin(caller)?;
        self.load(id)?;

        let store = self.testimonials.store();
        let item = exclusive::set(store.as_ref(), &TESTIMONIALS, "isFeatured", id, "testimonial")?;
        Ok(from_item(item)?)
    }

    /// Remove the featured flag (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn unfeature(&self, caller: &Caller, id: &str) -> Result<Testimonial> {
        authz::require_admin(caller)?;
        self.load(id)?;
        self.set_flag(id, "isFeatured", false)
    }

    /// Repair more than one featured testimonial, keeping the most recently
    /// updated. Returns how many were demoted.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn reconcile_featured(&self, caller: &Caller) -> Result<usize> {
        authz::require_admin(caller)?;
        exclusive::reconcile(self.testimonials.store().as_ref(), &TESTIMONIALS, "isFeatured")
    }
}
