//! User profiles.
//!
//! Identity comes from the bearer token; the profile stored here is keyed by
//! the token subject and carries the contact details other services
//! denormalize (blog authors, activity performers).

use std::collections::HashMap;
use std::sync::Arc;

use haven_core::time::now_timestamp;
use haven_core::{Caller, Role};
use haven_store::{
    EntitySchema, Item, ListQuery, Page, PageRequest, Predicate, Record, Repository, Store,
    UniqueGuard,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz;
use crate::error::{Result, ServiceError};
use crate::schemas::USERS;
use crate::validate;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Token subject.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Lower-cased, unique among active users.
    pub email: String,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Profile image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Stored role.
    #[serde(default)]
    pub role: Role,
    /// Deactivated users are hidden.
    #[serde(default)]
    pub is_active: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Last update time.
    #[serde(default)]
    pub updated_at: String,
}

impl Record for User {
    const SCHEMA: &'static EntitySchema = &USERS;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Request to create the caller's own profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProfileRequest {
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Profile image.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Partial profile update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    /// New name.
    pub name: Option<String>,
    /// New address.
    pub email: Option<String>,
    /// New phone.
    pub phone: Option<String>,
    /// New image.
    pub avatar_url: Option<String>,
    /// New role (admin only).
    pub role: Option<Role>,
}

/// User list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilters {
    /// Exact role.
    pub role: Option<Role>,
    /// Free-text search.
    pub search: Option<String>,
}

fn email_guard(email: &str) -> UniqueGuard {
    UniqueGuard::new(
        format!("email#{email}"),
        Predicate::new().eq("email", email).eq("isActive", true),
    )
}

/// User profile management.
pub struct UserService<S: Store> {
    users: Repository<S, User>,
}

impl<S: Store> Clone for UserService<S> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
        }
    }
}

impl<S: Store + 'static> UserService<S> {
    /// Create a user service.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            users: Repository::new(store),
        }
    }

    fn load(&self, id: &str) -> Result<User> {
        match self.users.get(id)? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(ServiceError::not_found("user", id)),
        }
    }

    fn email_taken(&self, email: &str, except: &str) -> Result<bool> {
        let holder = self.users.find_one_by_index(
            "email",
            email,
            &Predicate::new().eq("isActive", true),
        )?;
        Ok(holder.is_some_and(|u| u.id != except))
    }

    /// Active profiles for `ids`, keyed by id. Unknown ids are skipped.
    pub(crate) fn lookup(&self, ids: &[String]) -> Result<HashMap<String, User>> {
        Ok(self
            .users
            .get_many(ids)?
            .into_iter()
            .flatten()
            .filter(|u| u.is_active)
            .map(|u| (u.id.clone(), u))
            .collect())
    }

    /// Create the caller's profile. The stored role is the token's role.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the caller already has a profile or the email is
    /// in use, and `Validation` for bad input.
    pub async fn register_profile(
        &self,
        caller: &Caller,
        request: RegisterProfileRequest,
    ) -> Result<User> {
        let id = caller.user_id.to_string();
        let email = validate::email(&request.email)?;
        let name = validate::required("name", &request.name)?;

        if self.users.get(&id)?.is_some() {
            return Err(ServiceError::Conflict("profile already exists".into()));
        }
        if self.email_taken(&email, &id)? {
            return Err(ServiceError::Conflict(format!("email {email} is already registered")));
        }

        let now = now_timestamp();
        let user = User {
            id,
            name,
            email,
            phone: validate::optional(request.phone),
            avatar_url: validate::optional(request.avatar_url),
            role: caller.role,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let guard = email_guard(&user.email);
        let user = self.users.put_unique(&user, &guard)?;
        tracing::info!(user_id = %user.id, role = %user.role, "Registered profile");
        Ok(user)
    }

    /// The caller's own profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` until the caller registers.
    pub async fn get_me(&self, caller: &Caller) -> Result<User> {
        self.load(&caller.user_id.to_string())
    }

    /// Fetch a profile. Users may read only their own.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for other users' profiles and `NotFound`.
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<User> {
        authz::require_owner_or_admin(caller, id)?;
        self.load(id)
    }

    /// List profiles (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn list(
        &self,
        caller: &Caller,
        filters: UserFilters,
        page: PageRequest,
    ) -> Result<Page<User>> {
        authz::require_admin(caller)?;

        let query = ListQuery::new()
            .eq("isActive", true)
            .eq_opt("role", filters.role.map(Role::as_str))
            .search(filters.search.as_deref())
            .page(page);

        Ok(self.users.list(&query)?)
    }

    /// Update a profile. Only admins may change roles.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for foreign profiles or role changes by
    /// non-admins, and `Conflict` if the new email is in use.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        request: UpdateUserRequest,
    ) -> Result<User> {
        authz::require_owner_or_admin(caller, id)?;
        let current = self.load(id)?;

        let mut partial = Item::new();
        if let Some(role) = request.role {
            if role != current.role {
                authz::require_admin(caller)?;
                partial.insert("role".into(), Value::String(role.as_str().to_string()));
            }
        }
        if let Some(name) = &request.name {
            partial.insert("name".into(), validate::required("name", name)?.into());
        }
        if let Some(phone) = request.phone {
            partial.insert("phone".into(), phone.trim().into());
        }
        if let Some(avatar) = request.avatar_url {
            partial.insert("avatarUrl".into(), avatar.trim().into());
        }

        let new_email = match &request.email {
            Some(email) => Some(validate::email(email)?).filter(|e| *e != current.email),
            None => None,
        };

        let updated = if let Some(email) = new_email {
            if self.email_taken(&email, id)? {
                return Err(ServiceError::Conflict(format!("email {email} is already registered")));
            }
            let guard = email_guard(&email);
            partial.insert("email".into(), Value::String(email));
            self.users.update_unique(id, partial, &guard)?
        } else {
            self.users.update(id, partial)?
        };

        updated.ok_or_else(|| ServiceError::not_found("user", id))
    }

    /// Deactivate a profile (admin). The email becomes available again.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound` for unknown ids.
    pub async fn deactivate(&self, caller: &Caller, id: &str) -> Result<()> {
        authz::require_admin(caller)?;
        self.users
            .soft_delete(id)?
            .ok_or_else(|| ServiceError::not_found("user", id))?;
        tracing::info!(user_id = %id, "Deactivated user");
        Ok(())
    }
}
