//! Blog posts.
//!
//! Drafts are visible to their author and admins only. Author details are not
//! stored on the post; they are filled in from user profiles on every read,
//! one batched lookup per page.

use std::collections::HashMap;
use std::sync::Arc;

use haven_core::time::now_timestamp;
use haven_core::{new_key, Caller};
use haven_store::{
    EntitySchema, Item, ListQuery, Page, PageRequest, PostFilter, Predicate, Record, Repository,
    Store, UniqueGuard,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz;
use crate::error::{Result, ServiceError};
use crate::schemas::BLOGS;
use crate::storage::{delete_best_effort, ObjectStorage};
use crate::user::{User, UserService};
use crate::validate;

/// Public author details shown with a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInfo {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Profile image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<User> for AuthorInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            avatar_url: user.avatar_url,
        }
    }
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    /// Key.
    pub id: String,
    /// Headline.
    pub title: String,
    /// Unique URL slug.
    pub slug: String,
    /// Teaser text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Body.
    pub content: String,
    /// Category slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    /// Writer.
    pub author_id: String,
    /// Writer's profile, filled in on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorInfo>,
    /// Publication flag.
    #[serde(default)]
    pub is_published: bool,
    /// Last publication time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Page views.
    #[serde(default)]
    pub views: u64,
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

impl Record for Blog {
    const SCHEMA: &'static EntitySchema = &BLOGS;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Request to write a post.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogRequest {
    /// Headline.
    pub title: String,
    /// Slug; derived from the title when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Teaser text.
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Body.
    pub content: String,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Cover image.
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Publish immediately.
    #[serde(default)]
    pub is_published: bool,
}

/// Partial post update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogRequest {
    /// New headline.
    pub title: Option<String>,
    /// New slug.
    pub slug: Option<String>,
    /// New teaser.
    pub excerpt: Option<String>,
    /// New body.
    pub content: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New tags.
    pub tags: Option<Vec<String>>,
    /// New cover image.
    pub cover_image_url: Option<String>,
}

/// Blog list filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogFilters {
    /// Category, case-insensitive.
    pub category: Option<String>,
    /// Tag, case-insensitive.
    pub tag: Option<String>,
    /// Author.
    pub author_id: Option<String>,
    /// Publication flag; honored for staff, public callers always get
    /// published posts.
    pub published: Option<bool>,
    /// Free-text search.
    pub search: Option<String>,
}

fn slug_guard(slug: &str) -> UniqueGuard {
    UniqueGuard::new(
        format!("slug#{slug}"),
        Predicate::new().eq("slug", slug).eq("isActive", true),
    )
}

/// Blog management.
pub struct BlogService<S: Store> {
    blogs: Repository<S, Blog>,
    users: UserService<S>,
    storage: Arc<dyn ObjectStorage>,
}

impl<S: Store> Clone for BlogService<S> {
    fn clone(&self) -> Self {
        Self {
            blogs: self.blogs.clone(),
            users: self.users.clone(),
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Store + 'static> BlogService<S> {
    /// Create a blog service.
    #[must_use]
    pub fn new(store: Arc<S>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            blogs: Repository::new(Arc::clone(&store)),
            users: UserService::new(store),
            storage,
        }
    }

    fn load(&self, id: &str) -> Result<Blog> {
        match self.blogs.get(id)? {
            Some(blog) if blog.is_active => Ok(blog),
            _ => Err(ServiceError::not_found("blog", id)),
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<&str>) -> Result<bool> {
        let holder = self
            .blogs
            .find_one_by_index("slug", slug, &Predicate::new().eq("isActive", true))?;
        Ok(holder.is_some_and(|b| Some(b.id.as_str()) != except))
    }

    /// Fill in author details for a batch of posts.
    fn with_authors(&self, mut blogs: Vec<Blog>) -> Result<Vec<Blog>> {
        let mut ids: Vec<String> = blogs.iter().map(|b| b.author_id.clone()).collect();
        ids.sort_unstable();
        ids.dedup();

        let authors: HashMap<String, AuthorInfo> = self
            .users
            .lookup(&ids)?
            .into_iter()
            .map(|(id, user)| (id, user.into()))
            .collect();

        for blog in &mut blogs {
            blog.author = authors.get(&blog.author_id).cloned();
        }
        Ok(blogs)
    }

    fn with_author(&self, blog: Blog) -> Result<Blog> {
        self.with_authors(vec![blog])?
            .pop()
            .ok_or_else(|| ServiceError::Internal("author lookup dropped a post".into()))
    }

    /// Write a post.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers, `Validation` for empty
    /// fields and `Conflict` for a used slug.
    pub async fn create(&self, caller: &Caller, request: CreateBlogRequest) -> Result<Blog> {
        authz::require_staff(caller)?;

        let title = validate::required("title", &request.title)?;
        let content = validate::required("content", &request.content)?;
        let slug = validate::slug(request.slug.as_deref().unwrap_or(&title))?;
        if self.slug_taken(&slug, None)? {
            return Err(ServiceError::Conflict(format!("slug {slug} is already in use")));
        }

        let now = now_timestamp();
        let blog = Blog {
            id: new_key(),
            title,
            slug,
            excerpt: validate::optional(request.excerpt),
            content,
            category: validate::optional(request.category),
            tags: request.tags,
            cover_image_url: validate::optional(request.cover_image_url),
            author_id: caller.user_id.to_string(),
            author: None,
            is_published: request.is_published,
            published_at: request.is_published.then(|| now.clone()),
            views: 0,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let blog = self.blogs.put_unique(&blog, &slug_guard(&blog.slug))?;
        tracing::info!(blog_id = %blog.id, slug = %blog.slug, "Created blog post");
        self.with_author(blog)
    }

    /// Fetch a post by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown posts and for drafts the caller may
    /// not see.
    pub async fn get(&self, caller: Option<&Caller>, id: &str) -> Result<Blog> {
        let blog = visible(caller, self.blogs.get(id)?, id)?;
        self.with_author(blog)
    }

    /// Fetch a post by slug.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown slugs and for drafts the caller may
    /// not see.
    pub async fn get_by_slug(&self, caller: Option<&Caller>, slug: &str) -> Result<Blog> {
        let found = self
            .blogs
            .find_one_by_index("slug", slug, &Predicate::new().eq("isActive", true))?;
        let blog = visible(caller, found, slug)?;
        self.with_author(blog)
    }

    /// Count one view of a published post and return the new count.
    ///
    /// Concurrent views may be lost; the count is advisory.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown or unpublished posts.
    pub async fn record_view(&self, id: &str) -> Result<u64> {
        let blog = visible(None, self.blogs.get(id)?, id)?;
        let views = blog.views + 1;

        let mut partial = Item::new();
        partial.insert("views".into(), Value::from(views));
        self.blogs.update(id, partial)?;
        Ok(views)
    }

    /// List posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list(
        &self,
        caller: Option<&Caller>,
        filters: BlogFilters,
        page: PageRequest,
    ) -> Result<Page<Blog>> {
        let published = if authz::is_staff(caller) {
            filters.published
        } else {
            Some(true)
        };

        let mut query = ListQuery::new();
        if let Some(author) = filters.author_id {
            query = query.by_index("authorId", author);
        }
        let query = query
            .eq("isActive", true)
            .eq_opt("isPublished", published)
            .filter_opt(
                filters
                    .category
                    .as_deref()
                    .map(|c| PostFilter::eq_ignore_case("category", c)),
            )
            .filter_opt(filters.tag.as_deref().map(|t| PostFilter::has_tag("tags", t)))
            .search(filters.search.as_deref())
            .page(page);

        let page = self.blogs.list(&query)?;
        let Page {
            items,
            total,
            page,
            total_pages,
        } = page;
        Ok(Page {
            items: self.with_authors(items)?,
            total,
            page,
            total_pages,
        })
    }

    /// Edit a post. Only its author or an admin may.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `Validation`, `Conflict` for a used slug and
    /// `NotFound`.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        mut request: UpdateBlogRequest,
    ) -> Result<Blog> {
        let blog = self.load(id)?;
        authz::require_owner_or_admin(caller, &blog.author_id)?;

        if let Some(title) = &request.title {
            request.title = Some(validate::required("title", title)?);
        }
        if let Some(content) = &request.content {
            request.content = Some(validate::required("content", content)?);
        }

        let new_slug = match request.slug.take() {
            Some(slug) => Some(validate::slug(&slug)?).filter(|s| *s != blog.slug),
            None => None,
        };

        let updated = match new_slug {
            Some(slug) => {
                if self.slug_taken(&slug, Some(id))? {
                    return Err(ServiceError::Conflict(format!("slug {slug} is already in use")));
                }
                let mut partial = haven_store::to_item(&request)?;
                partial.retain(|_, v| !v.is_null());
                partial.insert("slug".into(), Value::String(slug.clone()));
                self.blogs.update_unique(id, partial, &slug_guard(&slug))?
            }
            None => self.blogs.patch(id, &request)?,
        };

        let updated = updated.ok_or_else(|| ServiceError::not_found("blog", id))?;
        self.with_author(updated)
    }

    fn set_published(&self, caller: &Caller, id: &str, published: bool) -> Result<Blog> {
        let blog = self.load(id)?;
        authz::require_owner_or_admin(caller, &blog.author_id)?;

        let mut partial = Item::new();
        partial.insert("isPublished".into(), Value::Bool(published));
        if published {
            partial.insert("publishedAt".into(), Value::String(now_timestamp()));
        }

        let updated = self
            .blogs
            .update(id, partial)?
            .ok_or_else(|| ServiceError::not_found("blog", id))?;
        tracing::info!(blog_id = %id, published, "Changed blog publication");
        self.with_author(updated)
    }

    /// Publish a post.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn publish(&self, caller: &Caller, id: &str) -> Result<Blog> {
        self.set_published(caller, id, true)
    }

    /// Take a post back to draft.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn unpublish(&self, caller: &Caller, id: &str) -> Result<Blog> {
        self.set_published(caller, id, false)
    }

    /// Soft-delete a post. Only its author or an admin may.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<()> {
        let blog = self.load(id)?;
        authz::require_owner_or_admin(caller, &blog.author_id)?;
        self.blogs.soft_delete(id)?;
        Ok(())
    }

    /// Remove a post for good (admin), including its cover image.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound`.
    pub async fn hard_delete(&self, caller: &Caller, id: &str) -> Result<()> {
        authz::require_admin(caller)?;
        let blog = self
            .blogs
            .get(id)?
            .ok_or_else(|| ServiceError::not_found("blog", id))?;

        self.blogs.hard_delete(id)?;
        if let Some(url) = &blog.cover_image_url {
            delete_best_effort(self.storage.as_ref(), url).await;
        }
        tracing::info!(blog_id = %id, "Removed blog post");
        Ok(())
    }
}

fn can_edit(caller: Option<&Caller>, blog: &Blog) -> bool {
    caller.is_some_and(|c| c.is_admin() || c.owns(&blog.author_id))
}

/// The post, if the caller may see it.
fn visible(caller: Option<&Caller>, blog: Option<Blog>, id: &str) -> Result<Blog> {
    match blog {
        Some(b) if b.is_active && (b.is_published || can_edit(caller, &b)) => Ok(b),
        _ => Err(ServiceError::not_found("blog", id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RecordingObjectStorage;
    use crate::user::RegisterProfileRequest;
    use haven_core::{Role, UserId};
    use haven_store::RocksStore;
    use tempfile::TempDir;

    struct Fixture {
        blogs: BlogService<RocksStore>,
        storage: Arc<RecordingObjectStorage>,
        author: Caller,
        admin: Caller,
        _dir: TempDir,
    }

    async fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path(), crate::schemas::ALL).unwrap());
        let storage = Arc::new(RecordingObjectStorage::default());
        let author = Caller::new(UserId::generate(), Role::Counselor);

        UserService::new(Arc::clone(&store))
            .register_profile(
                &author,
                RegisterProfileRequest {
                    name: "Dr. Rao".into(),
                    email: "rao@example.com".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        Fixture {
            blogs: BlogService::new(store, storage.clone()),
            storage,
            author,
            admin: Caller::new(UserId::generate(), Role::Admin),
            _dir: dir,
        }
    }

    fn post(title: &str) -> CreateBlogRequest {
        CreateBlogRequest {
            title: title.into(),
            content: "Body".into(),
            tags: vec!["Sleep".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_populates_author() {
        let f = setup().await;
        let blog = f.blogs.create(&f.author, post("Design Basics")).await.unwrap();
        assert_eq!(blog.slug, "design-basics");
        assert_eq!(blog.author.as_ref().map(|a| a.name.as_str()), Some("Dr. Rao"));
        assert!(!blog.is_published);

        let clash = f.blogs.create(&f.admin, post("Design basics")).await;
        assert!(matches!(clash, Err(ServiceError::Conflict(_))));

        let user = Caller::new(UserId::generate(), Role::User);
        assert!(matches!(
            f.blogs.create(&user, post("Nope")).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn drafts_are_hidden_from_the_public() {
        let f = setup().await;
        let draft = f.blogs.create(&f.author, post("Draft")).await.unwrap();

        assert!(f.blogs.get(None, &draft.id).await.is_err());
        assert!(f.blogs.get_by_slug(None, "draft").await.is_err());
        assert!(f.blogs.get(Some(&f.author), &draft.id).await.is_ok());

        let public = f
            .blogs
            .list(None, BlogFilters::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(public.total, 0);

        f.blogs.publish(&f.author, &draft.id).await.unwrap();
        let by_slug = f.blogs.get_by_slug(None, "draft").await.unwrap();
        assert!(by_slug.published_at.is_some());

        let public = f
            .blogs
            .list(None, BlogFilters::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(public.total, 1);
        assert!(public.items[0].author.is_some());
    }

    #[tokio::test]
    async fn search_and_tag_filters() {
        let f = setup().await;
        for title in ["Design Basics", "Sleep Hygiene"] {
            let mut request = post(title);
            request.is_published = true;
            f.blogs.create(&f.author, request).await.unwrap();
        }

        let found = f
            .blogs
            .list(
                None,
                BlogFilters {
                    search: Some("DESIGN".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].title, "Design Basics");

        let tagged = f
            .blogs
            .list(
                None,
                BlogFilters {
                    tag: Some("sleep".into()),
                    author_id: Some(f.author.user_id.to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(tagged.total, 2);
    }

    #[tokio::test]
    async fn only_owner_or_admin_edits() {
        let f = setup().await;
        let blog = f.blogs.create(&f.author, post("Mine")).await.unwrap();
        let other = Caller::new(UserId::generate(), Role::Counselor);

        let edit = UpdateBlogRequest {
            title: Some("Changed".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.blogs.update(&other, &blog.id, edit.clone()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.blogs.publish(&other, &blog.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        let edited = f.blogs.update(&f.admin, &blog.id, edit).await.unwrap();
        assert_eq!(edited.title, "Changed");
        assert_eq!(edited.slug, "mine");
    }

    #[tokio::test]
    async fn slug_change_is_rechecked() {
        let f = setup().await;
        f.blogs.create(&f.author, post("First")).await.unwrap();
        let second = f.blogs.create(&f.author, post("Second")).await.unwrap();

        let clash = UpdateBlogRequest {
            slug: Some("first".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.blogs.update(&f.author, &second.id, clash).await,
            Err(ServiceError::Conflict(_))
        ));

        let moved = UpdateBlogRequest {
            slug: Some("Second Post".into()),
            ..Default::default()
        };
        let updated = f.blogs.update(&f.author, &second.id, moved).await.unwrap();
        assert_eq!(updated.slug, "second-post");
    }

    #[tokio::test]
    async fn views_count_on_published_posts() {
        let f = setup().await;
        let mut request = post("Counted");
        request.is_published = true;
        let blog = f.blogs.create(&f.author, request).await.unwrap();

        assert_eq!(f.blogs.record_view(&blog.id).await.unwrap(), 1);
        assert_eq!(f.blogs.record_view(&blog.id).await.unwrap(), 2);
        assert_eq!(f.blogs.get(None, &blog.id).await.unwrap().views, 2);
    }

    #[tokio::test]
    async fn hard_delete_cleans_up_cover() {
        let f = setup().await;
        let mut request = post("Pictured");
        request.cover_image_url = Some("memory://blogs/cover.png".into());
        let blog = f.blogs.create(&f.author, request).await.unwrap();

        assert!(matches!(
            f.blogs.hard_delete(&f.author, &blog.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        f.blogs.hard_delete(&f.admin, &blog.id).await.unwrap();

        assert_eq!(f.storage.deleted(), vec!["memory://blogs/cover.png".to_string()]);
        assert!(f.blogs.get(Some(&f.admin), &blog.id).await.is_err());
    }

    #[tokio::test]
    async fn soft_delete_hides_post() {
        let f = setup().await;
        let blog = f.blogs.create(&f.author, post("Temp")).await.unwrap();
        f.blogs.delete(&f.author, &blog.id).await.unwrap();
        assert!(f.blogs.get(Some(&f.author), &blog.id).await.is_err());
        // The slug is free again
        f.blogs.create(&f.author, post("Temp")).await.unwrap();
    }
}
