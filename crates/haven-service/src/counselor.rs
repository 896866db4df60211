//! Counselor profiles.

use std::sync::Arc;

use haven_core::time::now_timestamp;
use haven_core::{new_key, Caller};
use haven_store::{EntitySchema, ListQuery, Page, PageRequest, PostFilter, Record, Repository, Store};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::authz;
use crate::error::{Result, ServiceError};
use crate::schemas::COUNSELORS;
use crate::validate;

/// A counselor who can be booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counselor {
    /// Key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact address, used for booking notifications.
    pub email: String,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Area of practice.
    #[serde(default)]
    pub specialization: String,
    /// Profile text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Profile image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Years in practice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<u32>,
    /// Languages spoken.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Position in listings.
    #[serde(default)]
    pub display_order: i64,
    /// Inactive counselors accept no bookings.
    #[serde(default)]
    pub is_active: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Last update time.
    #[serde(default)]
    pub updated_at: String,
}

impl Record for Counselor {
    const SCHEMA: &'static EntitySchema = &COUNSELORS;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Request to create a counselor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCounselorRequest {
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Area of practice.
    #[serde(default)]
    pub specialization: String,
    /// Profile text.
    #[serde(default)]
    pub bio: Option<String>,
    /// Profile image.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Years in practice.
    #[serde(default)]
    pub experience_years: Option<u32>,
    /// Languages spoken.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Position in listings.
    #[serde(default)]
    pub display_order: i64,
}

/// Partial counselor update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCounselorRequest {
    /// New name.
    pub name: Option<String>,
    /// New address.
    pub email: Option<String>,
    /// New phone.
    pub phone: Option<String>,
    /// New specialization.
    pub specialization: Option<String>,
    /// New profile text.
    pub bio: Option<String>,
    /// New image.
    pub avatar_url: Option<String>,
    /// New experience.
    pub experience_years: Option<u32>,
    /// New languages.
    pub languages: Option<Vec<String>>,
    /// New position.
    pub display_order: Option<i64>,
}

/// Counselor list filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselorFilters {
    /// Substring of the specialization.
    pub specialization: Option<String>,
    /// Spoken language.
    pub language: Option<String>,
    /// Free-text search.
    pub search: Option<String>,
    /// Include deactivated counselors (admin only).
    #[serde(default)]
    pub include_inactive: bool,
}

/// Counselor management.
pub struct CounselorService<S: Store> {
    counselors: Repository<S, Counselor>,
}

impl<S: Store> Clone for CounselorService<S> {
    fn clone(&self) -> Self {
        Self {
            counselors: self.counselors.clone(),
        }
    }
}

impl<S: Store + 'static> CounselorService<S> {
    /// Create a counselor service.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            counselors: Repository::new(store),
        }
    }

    /// Add a counselor.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `Validation` for bad input.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateCounselorRequest,
    ) -> Result<Counselor> {
        authz::require_admin(caller)?;

        let now = now_timestamp();
        let counselor = Counselor {
            id: new_key(),
            name: validate::required("name", &request.name)?,
            email: validate::email(&request.email)?,
            phone: validate::optional(request.phone),
            specialization: request.specialization.trim().to_string(),
            bio: validate::optional(request.bio),
            avatar_url: validate::optional(request.avatar_url),
            experience_years: request.experience_years,
            languages: request.languages,
            display_order: request.display_order,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let counselor = self.counselors.create(&counselor)?;
        tracing::info!(counselor_id = %counselor.id, "Created counselor");
        Ok(counselor)
    }

    /// Fetch a counselor. Deactivated counselors are visible to admins only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the counselor is absent or hidden.
    pub async fn get(&self, caller: Option<&Caller>, id: &str) -> Result<Counselor> {
        match self.counselors.get(id)? {
            Some(c) if c.is_active || authz::is_admin(caller) => Ok(c),
            _ => Err(ServiceError::not_found("counselor", id)),
        }
    }

    /// Look up an active counselor for a booking.
    pub(crate) fn active(&self, id: &str) -> Result<Counselor> {
        match self.counselors.get(id)? {
            Some(c) if c.is_active => Ok(c),
            _ => Err(ServiceError::not_found("counselor", id)),
        }
    }

    /// List counselors.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list(
        &self,
        caller: Option<&Caller>,
        filters: CounselorFilters,
        page: PageRequest,
    ) -> Result<Page<Counselor>> {
        let show_inactive = filters.include_inactive && authz::is_admin(caller);

        let query = ListQuery::new()
            .eq_opt("isActive", (!show_inactive).then_some(true))
            .filter_opt(
                filters
                    .specialization
                    .as_deref()
                    .map(|s| PostFilter::contains("specialization", s)),
            )
            .filter_opt(
                filters
                    .language
                    .as_deref()
                    .map(|l| PostFilter::has_tag("languages", l)),
            )
            .search(filters.search.as_deref())
            .page(page);

        Ok(self.counselors.list(&query)?)
    }

    /// Update a counselor.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound` for unknown ids.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        mut request: UpdateCounselorRequest,
    ) -> Result<Counselor> {
        authz::require_admin(caller)?;

        if let Some(name) = &request.name {
            request.name = Some(validate::required("name", name)?);
        }
        if let Some(email) = &request.email {
            request.email = Some(validate::email(email)?);
        }

        self.counselors
            .patch(id, &request)?
            .ok_or_else(|| ServiceError::not_found("counselor", id))
    }

    /// Activate or deactivate a counselor.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound` for unknown ids.
    pub async fn set_active(&self, caller: &Caller, id: &str, active: bool) -> Result<Counselor> {
        authz::require_admin(caller)?;

        let partial = json!({ "isActive": active });
        let counselor = self
            .counselors
            .update(id, haven_store::to_item(&partial)?)?
            .ok_or_else(|| ServiceError::not_found("counselor", id))?;

        tracing::info!(counselor_id = %id, active, "Changed counselor availability");
        Ok(counselor)
    }

    /// Soft-delete a counselor.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound` for unknown ids.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<()> {
        authz::require_admin(caller)?;
        self.counselors
            .soft_delete(id)?
            .ok_or_else(|| ServiceError::not_found("counselor", id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::{Role, UserId};
    use haven_store::RocksStore;
    use tempfile::TempDir;

    fn setup() -> (CounselorService<RocksStore>, TempDir, Caller) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path(), crate::schemas::ALL).unwrap());
        let admin = Caller::new(UserId::generate(), Role::Admin);
        (CounselorService::new(store), dir, admin)
    }

    fn request(name: &str, order: i64) -> CreateCounselorRequest {
        CreateCounselorRequest {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            specialization: "Anxiety".into(),
            languages: vec!["English".into(), "Hindi".into()],
            display_order: order,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_requires_admin() {
        let (service, _dir, _admin) = setup();
        let user = Caller::new(UserId::generate(), Role::User);
        let result = service.create(&user, request("Asha", 1)).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn list_orders_by_display_order_and_hides_inactive() {
        let (service, _dir, admin) = setup();
        let b = service.create(&admin, request("Bela", 2)).await.unwrap();
        service.create(&admin, request("Asha", 1)).await.unwrap();
        service.create(&admin, request("Chen", 3)).await.unwrap();

        service.set_active(&admin, &b.id, false).await.unwrap();

        let page = service
            .list(None, CounselorFilters::default(), PageRequest::default())
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Asha", "Chen"]);

        let all = service
            .list(
                Some(&admin),
                CounselorFilters {
                    include_inactive: true,
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(all.total, 3);

        assert!(matches!(
            service.get(None, &b.id).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(service.get(Some(&admin), &b.id).await.is_ok());
    }

    #[tokio::test]
    async fn language_filter() {
        let (service, _dir, admin) = setup();
        service.create(&admin, request("Asha", 1)).await.unwrap();
        let page = service
            .list(
                None,
                CounselorFilters {
                    language: Some("hindi".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn update_validates_email() {
        let (service, _dir, admin) = setup();
        let c = service.create(&admin, request("Asha", 1)).await.unwrap();

        let bad = UpdateCounselorRequest {
            email: Some("nope".into()),
            ..Default::default()
        };
        assert!(service.update(&admin, &c.id, bad).await.is_err());

        let good = UpdateCounselorRequest {
            bio: Some("Ten years of practice".into()),
            ..Default::default()
        };
        let updated = service.update(&admin, &c.id, good).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Ten years of practice"));
        assert_eq!(updated.name, "Asha");
    }
}
