//! Leads and their CRM activity log.

use std::collections::BTreeMap;
use std::sync::Arc;

use haven_core::time::now_timestamp;
use haven_core::{new_key, Caller};
use haven_store::{
    EntitySchema, Item, ListQuery, Page, PageRequest, PostFilter, Predicate, Record, Repository,
    Store,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz;
use crate::error::{Result, ServiceError};
use crate::schemas::{LEADS, LEAD_ACTIVITIES};
use crate::user::UserService;
use crate::validate;

/// Source recorded when a lead names none.
pub const DEFAULT_SOURCE: &str = "website";

/// A prospective client who left their contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Key.
    pub id: String,
    /// Contact name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Contact phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// What they wrote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Where the lead came from, e.g. a landing page.
    #[serde(default)]
    pub source: String,
    /// Service they asked about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest: Option<String>,
    /// Whether someone has reached out.
    #[serde(default)]
    pub contacted: bool,
    /// When they were last marked contacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacted_at: Option<String>,
    /// Who marked them contacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacted_by: Option<String>,
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

impl Record for Lead {
    const SCHEMA: &'static EntitySchema = &LEADS;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Kind of contact logged against a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    /// Phone call.
    Call,
    /// Email.
    Email,
    /// In-person or video meeting.
    Meeting,
    /// Internal note.
    Note,
    /// WhatsApp message.
    Whatsapp,
}

/// One logged interaction with a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadActivity {
    /// Key.
    pub id: String,
    /// Lead the activity belongs to.
    pub lead_id: String,
    /// Kind of contact.
    pub activity_type: ActivityType,
    /// What happened.
    pub description: String,
    /// Caller who logged it.
    pub performed_by: String,
    /// Their name at the time, when they have a profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_by_name: Option<String>,
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

impl Record for LeadActivity {
    const SCHEMA: &'static EntitySchema = &LEAD_ACTIVITIES;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Contact form submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    /// Contact name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Message.
    #[serde(default)]
    pub message: Option<String>,
    /// Source tag.
    #[serde(default)]
    pub source: Option<String>,
    /// Interest.
    #[serde(default)]
    pub interest: Option<String>,
}

/// Partial lead update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    /// New name.
    pub name: Option<String>,
    /// New address.
    pub email: Option<String>,
    /// New phone.
    pub phone: Option<String>,
    /// New message.
    pub message: Option<String>,
    /// New source.
    pub source: Option<String>,
    /// New interest.
    pub interest: Option<String>,
}

/// Lead list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadFilters {
    /// Contacted or not.
    pub contacted: Option<bool>,
    /// Source tag, case-insensitive.
    pub source: Option<String>,
    /// Free-text search.
    pub search: Option<String>,
}

/// Counts over active leads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    /// Active leads.
    pub total: usize,
    /// Of those, contacted.
    pub contacted: usize,
    /// Of those, not yet contacted.
    pub not_contacted: usize,
    /// Active leads per source.
    pub by_source: BTreeMap<String, usize>,
}

/// New activity on a lead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    /// Kind of contact.
    pub activity_type: ActivityType,
    /// What happened.
    pub description: String,
}

/// Partial activity update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    /// New kind.
    pub activity_type: Option<ActivityType>,
    /// New description.
    pub description: Option<String>,
}

/// Lead and activity management. Everything except lead capture is for
/// staff.
pub struct LeadService<S: Store> {
    leads: Repository<S, Lead>,
    activities: Repository<S, LeadActivity>,
    users: UserService<S>,
}

impl<S: Store> Clone for LeadService<S> {
    fn clone(&self) -> Self {
        Self {
            leads: self.leads.clone(),
            activities: self.activities.clone(),
            users: self.users.clone(),
        }
    }
}

impl<S: Store + 'static> LeadService<S> {
    /// Create a lead service.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            leads: Repository::new(Arc::clone(&store)),
            activities: Repository::new(Arc::clone(&store)),
            users: UserService::new(store),
        }
    }

    fn load(&self, id: &str) -> Result<Lead> {
        match self.leads.get(id)? {
            Some(lead) if lead.is_active => Ok(lead),
            _ => Err(ServiceError::not_found("lead", id)),
        }
    }

    fn load_activity(&self, id: &str) -> Result<LeadActivity> {
        match self.activities.get(id)? {
            Some(activity) if activity.is_active => Ok(activity),
            _ => Err(ServiceError::not_found("lead activity", id)),
        }
    }

    fn set(&self, id: &str, partial: Item) -> Result<Lead> {
        self.leads
            .update(id, partial)?
            .ok_or_else(|| ServiceError::not_found("lead", id))
    }

    /// Capture a lead from the public contact form.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a missing name or malformed email.
    pub async fn create(&self, request: CreateLeadRequest) -> Result<Lead> {
        let now = now_timestamp();
        let lead = Lead {
            id: new_key(),
            name: validate::required("name", &request.name)?,
            email: validate::email(&request.email)?,
            phone: validate::optional(request.phone),
            message: validate::optional(request.message),
            source: validate::optional(request.source)
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            interest: validate::optional(request.interest),
            contacted: false,
            contacted_at: None,
            contacted_by: None,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let lead = self.leads.create(&lead)?;
        tracing::info!(lead_id = %lead.id, source = %lead.source, "Captured lead");
        Ok(lead)
    }

    /// Fetch a lead.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound`.
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Lead> {
        authz::require_admin(caller)?;
        self.load(id)
    }

    /// List leads.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn list(
        &self,
        caller: &Caller,
        filters: LeadFilters,
        page: PageRequest,
    ) -> Result<Page<Lead>> {
        authz::require_admin(caller)?;

        let query = ListQuery::new()
            .eq("isActive", true)
            .eq_opt("contacted", filters.contacted)
            .filter_opt(
                filters
                    .source
                    .as_deref()
                    .map(|s| PostFilter::eq_ignore_case("source", s)),
            )
            .search(filters.search.as_deref())
            .page(page);

        Ok(self.leads.list(&query)?)
    }

    /// Update a lead's details.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins, `Validation` and `NotFound`.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        mut request: UpdateLeadRequest,
    ) -> Result<Lead> {
        authz::require_admin(caller)?;
        self.load(id)?;

        if let Some(name) = &request.name {
            request.name = Some(validate::required("name", name)?);
        }
        if let Some(email) = &request.email {
            request.email = Some(validate::email(email)?);
        }

        self.leads
            .patch(id, &request)?
            .ok_or_else(|| ServiceError::not_found("lead", id))
    }

    /// Record that the caller reached out.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound`.
    pub async fn mark_contacted(&self, caller: &Caller, id: &str) -> Result<Lead> {
        authz::require_admin(caller)?;
        self.load(id)?;

        let mut partial = Item::new();
        partial.insert("contacted".into(), Value::Bool(true));
        partial.insert("contactedAt".into(), Value::String(now_timestamp()));
        partial.insert("contactedBy".into(), Value::String(caller.user_id.to_string()));

        let lead = self.set(id, partial)?;
        tracing::info!(lead_id = %id, by = %caller.user_id, "Lead marked contacted");
        Ok(lead)
    }

    /// Clear the contacted flag. When and by whom it was set is kept.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound`.
    pub async fn mark_not_contacted(&self, caller: &Caller, id: &str) -> Result<Lead> {
        authz::require_admin(caller)?;
        self.load(id)?;

        let mut partial = Item::new();
        partial.insert("contacted".into(), Value::Bool(false));
        self.set(id, partial)
    }

    /// Soft-delete a lead.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound`.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<()> {
        authz::require_admin(caller)?;
        self.leads
            .soft_delete(id)?
            .ok_or_else(|| ServiceError::not_found("lead", id))?;
        Ok(())
    }

    /// Counts over active leads.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn stats(&self, caller: &Caller) -> Result<LeadStats> {
        authz::require_admin(caller)?;

        let leads = self.leads.find(&Predicate::new().eq("isActive", true))?;
        let mut stats = LeadStats {
            total: leads.len(),
            ..LeadStats::default()
        };
        for lead in &leads {
            if lead.contacted {
                stats.contacted += 1;
            } else {
                stats.not_contacted += 1;
            }
            *stats.by_source.entry(lead.source.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Log an activity against a lead.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers, `NotFound` for unknown
    /// leads and `Validation` for an empty description.
    pub async fn add_activity(
        &self,
        caller: &Caller,
        lead_id: &str,
        request: CreateActivityRequest,
    ) -> Result<LeadActivity> {
        authz::require_staff(caller)?;
        self.load(lead_id)?;

        let performed_by = caller.user_id.to_string();
        let performed_by_name = self
            .users
            .lookup(std::slice::from_ref(&performed_by))?
            .remove(&performed_by)
            .map(|u| u.name);

        let now = now_timestamp();
        let activity = LeadActivity {
            id: new_key(),
            lead_id: lead_id.to_string(),
            activity_type: request.activity_type,
            description: validate::required("description", &request.description)?,
            performed_by,
            performed_by_name,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let activity = self.activities.create(&activity)?;
        tracing::info!(
            lead_id = %lead_id,
            activity_id = %activity.id,
            activity_type = ?activity.activity_type,
            "Logged lead activity"
        );
        Ok(activity)
    }

    /// Activities of one lead, newest first by default.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers and `NotFound` for unknown
    /// leads.
    pub async fn list_activities(
        &self,
        caller: &Caller,
        lead_id: &str,
        page: PageRequest,
    ) -> Result<Page<LeadActivity>> {
        authz::require_staff(caller)?;
        self.load(lead_id)?;

        let query = ListQuery::new()
            .by_index("leadId", lead_id)
            .eq("isActive", true)
            .page(page);

        Ok(self.activities.list(&query)?)
    }

    /// Change an activity. Only its author or an admin may.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `Validation` and `NotFound`.
    pub async fn update_activity(
        &self,
        caller: &Caller,
        id: &str,
        mut request: UpdateActivityRequest,
    ) -> Result<LeadActivity> {
        let activity = self.load_activity(id)?;
        authz::require_owner_or_admin(caller, &activity.performed_by)?;

        if let Some(description) = &request.description {
            request.description = Some(validate::required("description", description)?);
        }

        self.activities
            .patch(id, &request)?
            .ok_or_else(|| ServiceError::not_found("lead activity", id))
    }

    /// Soft-delete an activity. Only its author or an admin may.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn delete_activity(&self, caller: &Caller, id: &str) -> Result<()> {
        let activity = self.load_activity(id)?;
        authz::require_owner_or_admin(caller, &activity.performed_by)?;
        self.activities.soft_delete(id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::RegisterProfileRequest;
    use haven_core::{Role, UserId};
    use haven_store::RocksStore;
    use tempfile::TempDir;

    struct Fixture {
        leads: LeadService<RocksStore>,
        users: UserService<RocksStore>,
        admin: Caller,
        _dir: TempDir,
    }

    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path(), crate::schemas::ALL).unwrap());
        Fixture {
            leads: LeadService::new(Arc::clone(&store)),
            users: UserService::new(store),
            admin: Caller::new(UserId::generate(), Role::Admin),
            _dir: dir,
        }
    }

    fn lead(name: &str, source: Option<&str>) -> CreateLeadRequest {
        CreateLeadRequest {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            message: Some("Looking for couples counseling".into()),
            source: source.map(Into::into),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn contacted_round_trip_reflected_in_stats() {
        let f = setup();
        let created = f.leads.create(lead("Ana", None)).await.unwrap();
        assert!(!created.contacted);
        assert_eq!(created.source, DEFAULT_SOURCE);

        let contacted = f.leads.mark_contacted(&f.admin, &created.id).await.unwrap();
        assert!(contacted.contacted);
        assert!(contacted.contacted_at.is_some());
        assert_eq!(contacted.contacted_by, Some(f.admin.user_id.to_string()));

        let stats = f.leads.stats(&f.admin).await.unwrap();
        assert_eq!((stats.total, stats.contacted, stats.not_contacted), (1, 1, 0));

        let reverted = f.leads.mark_not_contacted(&f.admin, &created.id).await.unwrap();
        assert!(!reverted.contacted);
        assert_eq!(reverted.contacted_at, contacted.contacted_at);
        assert_eq!(reverted.contacted_by, contacted.contacted_by);
        assert_eq!(reverted.name, "Ana");
        assert_eq!(reverted.message, created.message);

        let stats = f.leads.stats(&f.admin).await.unwrap();
        assert_eq!((stats.total, stats.contacted, stats.not_contacted), (1, 0, 1));
        assert_eq!(stats.by_source.get(DEFAULT_SOURCE), Some(&1));
    }

    #[tokio::test]
    async fn stats_skip_deleted_and_group_by_source() {
        let f = setup();
        f.leads.create(lead("Ana", Some("instagram"))).await.unwrap();
        f.leads.create(lead("Bo", Some("instagram"))).await.unwrap();
        let gone = f.leads.create(lead("Cy", Some("referral"))).await.unwrap();
        f.leads.delete(&f.admin, &gone.id).await.unwrap();

        let stats = f.leads.stats(&f.admin).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_source.get("instagram"), Some(&2));
        assert_eq!(stats.by_source.get("referral"), None);
    }

    #[tokio::test]
    async fn list_filters_and_requires_admin() {
        let f = setup();
        let a = f.leads.create(lead("Ana", Some("Instagram"))).await.unwrap();
        f.leads.create(lead("Bo", Some("referral"))).await.unwrap();
        f.leads.mark_contacted(&f.admin, &a.id).await.unwrap();

        let by_source = f
            .leads
            .list(
                &f.admin,
                LeadFilters {
                    source: Some("instagram".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_source.total, 1);

        let uncontacted = f
            .leads
            .list(
                &f.admin,
                LeadFilters {
                    contacted: Some(false),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(uncontacted.items[0].name, "Bo");

        let counselor = Caller::new(UserId::generate(), Role::Counselor);
        assert!(matches!(
            f.leads.list(&counselor, LeadFilters::default(), PageRequest::default()).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn create_validates() {
        let f = setup();
        let mut bad = lead("Ana", None);
        bad.email = "not-an-email".into();
        assert!(matches!(f.leads.create(bad).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn activities_belong_to_author() {
        let f = setup();
        let counselor = Caller::new(UserId::generate(), Role::Counselor);
        let other = Caller::new(UserId::generate(), Role::Counselor);
        f.users
            .register_profile(
                &counselor,
                RegisterProfileRequest {
                    name: "Dr. Rao".into(),
                    email: "rao@example.com".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let l = f.leads.create(lead("Ana", None)).await.unwrap();
        let activity = f
            .leads
            .add_activity(
                &counselor,
                &l.id,
                CreateActivityRequest {
                    activity_type: ActivityType::Call,
                    description: "Left a voicemail".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(activity.performed_by_name.as_deref(), Some("Dr. Rao"));

        let edit = UpdateActivityRequest {
            description: Some("Spoke for ten minutes".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.leads.update_activity(&other, &activity.id, edit.clone()).await,
            Err(ServiceError::Forbidden(_))
        ));
        let edited = f.leads.update_activity(&counselor, &activity.id, edit).await.unwrap();
        assert_eq!(edited.description, "Spoke for ten minutes");
        assert_eq!(edited.activity_type, ActivityType::Call);

        let listed = f
            .leads
            .list_activities(&other, &l.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);

        f.leads.delete_activity(&f.admin, &activity.id).await.unwrap();
        let listed = f
            .leads
            .list_activities(&counselor, &l.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn activity_on_unknown_lead() {
        let f = setup();
        let result = f
            .leads
            .add_activity(
                &f.admin,
                "missing",
                CreateActivityRequest {
                    activity_type: ActivityType::Note,
                    description: "x".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }
}
