//! Content categories.

use std::sync::Arc;

use haven_core::time::now_timestamp;
use haven_core::{new_key, Caller};
use haven_store::{
    EntitySchema, ListQuery, Page, PageRequest, Predicate, Record, Repository, Store, UniqueGuard,
};
use serde::{Deserialize, Serialize};

use crate::authz;
use crate::error::{Result, ServiceError};
use crate::schemas::CATEGORIES;
use crate::validate;

/// What a category groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Blog posts.
    #[default]
    Blog,
    /// Videos and reels.
    Video,
    /// Downloadable materials.
    Material,
}

impl CategoryKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Blog => "blog",
            Self::Video => "video",
            Self::Material => "material",
        }
    }
}

/// A category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique URL slug.
    pub slug: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// What it groups.
    #[serde(default)]
    pub kind: CategoryKind,
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

impl Record for Category {
    const SCHEMA: &'static EntitySchema = &CATEGORIES;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Request to create a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCategoryRequest {
    /// Display name.
    pub name: String,
    /// Slug; derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// What it groups.
    #[serde(default)]
    pub kind: CategoryKind,
}

/// Partial category update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    /// New name.
    pub name: Option<String>,
    /// New slug.
    pub slug: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New kind.
    pub kind: Option<CategoryKind>,
}

/// Category list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryFilters {
    /// Exact kind.
    pub kind: Option<CategoryKind>,
    /// Free-text search.
    pub search: Option<String>,
}

fn slug_guard(slug: &str) -> UniqueGuard {
    UniqueGuard::new(
        format!("slug#{slug}"),
        Predicate::new().eq("slug", slug).eq("isActive", true),
    )
}

/// Category management.
pub struct CategoryService<S: Store> {
    categories: Repository<S, Category>,
}

impl<S: Store> Clone for CategoryService<S> {
    fn clone(&self) -> Self {
        Self {
            categories: self.categories.clone(),
        }
    }
}

impl<S: Store + 'static> CategoryService<S> {
    /// Create a category service.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            categories: Repository::new(store),
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<&str>) -> Result<bool> {
        let holder = self.categories.find_one_by_index(
            "slug",
            slug,
            &Predicate::new().eq("isActive", true),
        )?;
        Ok(holder.is_some_and(|c| Some(c.id.as_str()) != except))
    }

    /// Add a category.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `Conflict` for a used slug.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateCategoryRequest,
    ) -> Result<Category> {
        authz::require_admin(caller)?;

        let name = validate::required("name", &request.name)?;
        let slug = validate::slug(request.slug.as_deref().unwrap_or(&name))?;
        if self.slug_taken(&slug, None)? {
            return Err(ServiceError::Conflict(format!("slug {slug} is already in use")));
        }

        let now = now_timestamp();
        let category = Category {
            id: new_key(),
            name,
            slug,
            description: validate::optional(request.description),
            kind: request.kind,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let guard = slug_guard(&category.slug);
        let category = self.categories.put_unique(&category, &guard)?;
        tracing::info!(category_id = %category.id, slug = %category.slug, "Created category");
        Ok(category)
    }

    /// Fetch an active category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`.
    pub async fn get(&self, id: &str) -> Result<Category> {
        match self.categories.get(id)? {
            Some(c) if c.is_active => Ok(c),
            _ => Err(ServiceError::not_found("category", id)),
        }
    }

    /// List active categories, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list(
        &self,
        filters: CategoryFilters,
        page: PageRequest,
    ) -> Result<Page<Category>> {
        let query = ListQuery::new()
            .eq("isActive", true)
            .eq_opt("kind", filters.kind.map(CategoryKind::as_str))
            .search(filters.search.as_deref())
            .page(page);

        Ok(self.categories.list(&query)?)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins, `Conflict` for a used slug and
    /// `NotFound`.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        mut request: UpdateCategoryRequest,
    ) -> Result<Category> {
        authz::require_admin(caller)?;
        self.get(id).await?;

        if let Some(name) = &request.name {
            request.name = Some(validate::required("name", name)?);
        }

        let updated = match request.slug.take() {
            Some(slug) => {
                let slug = validate::slug(&slug)?;
                if self.slug_taken(&slug, Some(id))? {
                    return Err(ServiceError::Conflict(format!("slug {slug} is already in use")));
                }
                let mut partial = haven_store::to_item(&request)?;
                partial.retain(|_, v| !v.is_null());
                partial.insert("slug".into(), slug.clone().into());
                self.categories.update_unique(id, partial, &slug_guard(&slug))?
            }
            None => self.categories.patch(id, &request)?,
        };

        updated.ok_or_else(|| ServiceError::not_found("category", id))
    }

    /// Soft-delete a category. Its slug becomes available again.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound`.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<()> {
        authz::require_admin(caller)?;
        self.categories
            .soft_delete(id)?
            .ok_or_else(|| ServiceError::not_found("category", id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::{Role, UserId};
    use haven_store::RocksStore;
    use tempfile::TempDir;

    fn setup() -> (CategoryService<RocksStore>, Caller, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path(), crate::schemas::ALL).unwrap());
        let admin = Caller::new(UserId::generate(), Role::Admin);
        (CategoryService::new(store), admin, dir)
    }

    fn named(name: &str, kind: CategoryKind) -> CreateCategoryRequest {
        CreateCategoryRequest {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn slug_derived_and_unique() {
        let (categories, admin, _dir) = setup();
        let c = categories
            .create(&admin, named("Mental Health", CategoryKind::Blog))
            .await
            .unwrap();
        assert_eq!(c.slug, "mental-health");

        let clash = categories
            .create(&admin, named("Mental  health!", CategoryKind::Video))
            .await;
        assert!(matches!(clash, Err(ServiceError::Conflict(_))));

        categories.delete(&admin, &c.id).await.unwrap();
        categories
            .create(&admin, named("Mental Health", CategoryKind::Video))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_sorted_by_name_and_filtered_by_kind() {
        let (categories, admin, _dir) = setup();
        categories.create(&admin, named("Stress", CategoryKind::Blog)).await.unwrap();
        categories.create(&admin, named("Anxiety", CategoryKind::Blog)).await.unwrap();
        categories.create(&admin, named("Workbooks", CategoryKind::Material)).await.unwrap();

        let blogs = categories
            .list(
                CategoryFilters {
                    kind: Some(CategoryKind::Blog),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        let names: Vec<_> = blogs.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Anxiety", "Stress"]);
    }

    #[tokio::test]
    async fn update_rechecks_slug() {
        let (categories, admin, _dir) = setup();
        categories.create(&admin, named("Stress", CategoryKind::Blog)).await.unwrap();
        let b = categories.create(&admin, named("Sleep", CategoryKind::Blog)).await.unwrap();

        let clash = UpdateCategoryRequest {
            slug: Some("stress".into()),
            ..Default::default()
        };
        assert!(matches!(
            categories.update(&admin, &b.id, clash).await,
            Err(ServiceError::Conflict(_))
        ));

        let rename = UpdateCategoryRequest {
            name: Some("Better Sleep".into()),
            slug: Some("better-sleep".into()),
            ..Default::default()
        };
        let renamed = categories.update(&admin, &b.id, rename).await.unwrap();
        assert_eq!(renamed.slug, "better-sleep");
        assert_eq!(renamed.name, "Better Sleep");
    }
}
