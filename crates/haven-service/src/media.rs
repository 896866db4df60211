//! Media collections: videos, reels, banners, team members and materials.
//!
//! All five share one record shape and one service. Each collection has its
//! own namespace and picks which title attribute and which asset URL it
//! requires. Collection-specific attributes ride along in
//! [`MediaItem::extra`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use haven_core::time::now_timestamp;
use haven_core::{new_key, Caller};
use haven_store::query::execute;
use haven_store::{
    from_item, to_item, EntitySchema, Item, ListQuery, Page, PageRequest, PostFilter, Store,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz;
use crate::error::{Result, ServiceError};
use crate::exclusive;
use crate::schemas::{BANNERS, MATERIALS, REELS, TEAM, VIDEOS};
use crate::storage::{delete_best_effort, ObjectStorage};
use crate::validate;

/// One of the media collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCollection {
    /// Long-form videos.
    Videos,
    /// Short vertical videos.
    Reels,
    /// Homepage banners; at most one published.
    Banners,
    /// Team member cards.
    Team,
    /// Downloadable documents.
    Materials,
}

impl MediaCollection {
    /// Every collection.
    pub const ALL: [Self; 5] = [
        Self::Videos,
        Self::Reels,
        Self::Banners,
        Self::Team,
        Self::Materials,
    ];

    /// Path segment and namespace name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Videos => "videos",
            Self::Reels => "reels",
            Self::Banners => "banners",
            Self::Team => "team",
            Self::Materials => "materials",
        }
    }

    /// Storage schema.
    #[must_use]
    pub const fn schema(self) -> &'static EntitySchema {
        match self {
            Self::Videos => &VIDEOS,
            Self::Reels => &REELS,
            Self::Banners => &BANNERS,
            Self::Team => &TEAM,
            Self::Materials => &MATERIALS,
        }
    }

    /// Singular noun for error messages.
    const fn entity(self) -> &'static str {
        match self {
            Self::Videos => "video",
            Self::Reels => "reel",
            Self::Banners => "banner",
            Self::Team => "team member",
            Self::Materials => "material",
        }
    }

    /// Attribute every item is headed by.
    const fn heading(self) -> &'static str {
        match self {
            Self::Team => "name",
            _ => "title",
        }
    }

    /// Asset attribute every item must carry.
    const fn required_asset(self) -> Option<&'static str> {
        match self {
            Self::Videos | Self::Reels => Some("mediaUrl"),
            Self::Banners => Some("imageUrl"),
            Self::Materials => Some("fileUrl"),
            Self::Team => None,
        }
    }

    /// Whether publishing one item unpublishes the rest.
    const fn exclusive_publish(self) -> bool {
        matches!(self, Self::Banners)
    }
}

impl fmt::Display for MediaCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCollection {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ServiceError::Validation(format!("unknown media collection: {s}")))
    }
}

/// An item in a media collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Key.
    pub id: String,
    /// Heading for everything except team members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Heading for team members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Video or reel file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Preview image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Banner or portrait image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Downloadable document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Category slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Position in listings.
    #[serde(default)]
    pub display_order: i64,
    /// Shown publicly.
    #[serde(default)]
    pub is_published: bool,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_active: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Last update time.
    #[serde(default)]
    pub updated_at: String,
    /// Collection-specific attributes (a team member's designation, a
    /// banner's link target, a video's duration).
    #[serde(flatten)]
    pub extra: Item,
}

impl MediaItem {
    fn asset_urls(&self) -> impl Iterator<Item = &str> {
        [
            &self.media_url,
            &self.thumbnail_url,
            &self.image_url,
            &self.file_url,
        ]
        .into_iter()
        .filter_map(Option::as_deref)
    }
}

/// Request to add or change an item. On create, absent fields take their
/// defaults; on update, absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRequest {
    /// Heading.
    pub title: Option<String>,
    /// Team member name.
    pub name: Option<String>,
    /// Body text.
    pub description: Option<String>,
    /// Video file.
    pub media_url: Option<String>,
    /// Preview image.
    pub thumbnail_url: Option<String>,
    /// Image.
    pub image_url: Option<String>,
    /// Document.
    pub file_url: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Tags.
    pub tags: Option<Vec<String>>,
    /// Position.
    pub display_order: Option<i64>,
    /// Collection-specific attributes.
    #[serde(flatten)]
    pub extra: Item,
}

/// Media list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFilters {
    /// Category, case-insensitive.
    pub category: Option<String>,
    /// Tag, case-insensitive.
    pub tag: Option<String>,
    /// Publication flag; honored for admins only.
    pub published: Option<bool>,
    /// Free-text search.
    pub search: Option<String>,
}

/// Attributes the service owns; requests may not set them through `extra`.
const RESERVED: [&str; 5] = ["id", "isPublished", "isActive", "createdAt", "updatedAt"];

/// Turn a request into stored attributes: drop absent and reserved fields,
/// trim strings and check the heading.
fn request_attrs(collection: MediaCollection, request: &MediaRequest) -> Result<Item> {
    let mut attrs = to_item(request)?;
    attrs.retain(|name, value| !value.is_null() && !RESERVED.contains(&name.as_str()));

    for value in attrs.values_mut() {
        if let Value::String(s) = value {
            *s = s.trim().to_string();
        }
    }

    let heading = collection.heading();
    if let Some(value) = attrs.get(heading).and_then(Value::as_str) {
        validate::required(heading, value)?;
    }
    Ok(attrs)
}

fn require_present(attrs: &Item, attribute: &str) -> Result<()> {
    match attrs.get(attribute).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(()),
        _ => Err(ServiceError::Validation(format!("{attribute} is required"))),
    }
}

/// Management of every media collection.
pub struct MediaService<S: Store> {
    store: Arc<S>,
    storage: Arc<dyn ObjectStorage>,
}

impl<S: Store> Clone for MediaService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Store + 'static> MediaService<S> {
    /// Create a media service.
    #[must_use]
    pub fn new(store: Arc<S>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { store, storage }
    }

    fn load(&self, collection: MediaCollection, id: &str) -> Result<MediaItem> {
        match self.store.get(collection.schema(), id)? {
            Some(item) => {
                let media: MediaItem = from_item(item)?;
                if media.is_active {
                    Ok(media)
                } else {
                    Err(ServiceError::not_found(collection.entity(), id))
                }
            }
            None => Err(ServiceError::not_found(collection.entity(), id)),
        }
    }

    fn write(&self, collection: MediaCollection, id: &str, partial: Item) -> Result<MediaItem> {
        let item = self
            .store
            .update(collection.schema(), id, partial)?
            .ok_or_else(|| ServiceError::not_found(collection.entity(), id))?;
        Ok(from_item(item)?)
    }

    /// Add an item (admin). New items start unpublished.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `Validation` when the heading or
    /// the collection's asset is missing.
    pub async fn create(
        &self,
        caller: &Caller,
        collection: MediaCollection,
        request: MediaRequest,
    ) -> Result<MediaItem> {
        authz::require_admin(caller)?;

        let mut attrs = request_attrs(collection, &request)?;
        require_present(&attrs, collection.heading())?;
        if let Some(asset) = collection.required_asset() {
            require_present(&attrs, asset)?;
        }

        let now = now_timestamp();
        let id = new_key();
        attrs.insert("id".into(), Value::String(id.clone()));
        attrs.insert("isPublished".into(), Value::Bool(false));
        attrs.insert("isActive".into(), Value::Bool(true));
        attrs.insert("createdAt".into(), Value::String(now.clone()));
        attrs.insert("updatedAt".into(), Value::String(now));
        attrs.entry("displayOrder").or_insert(Value::from(0));
        attrs.entry("tags").or_insert(Value::Array(Vec::new()));

        let item: MediaItem = from_item(self.store.put(collection.schema(), attrs)?)?;
        tracing::info!(collection = %collection, id = %id, "Created media item");
        Ok(item)
    }

    /// Fetch an item. Unpublished items are visible to admins only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`.
    pub async fn get(
        &self,
        caller: Option<&Caller>,
        collection: MediaCollection,
        id: &str,
    ) -> Result<MediaItem> {
        let item = self.load(collection, id)?;
        if item.is_published || authz::is_admin(caller) {
            Ok(item)
        } else {
            Err(ServiceError::not_found(collection.entity(), id))
        }
    }

    /// List a collection. The public sees published items only.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list(
        &self,
        caller: Option<&Caller>,
        collection: MediaCollection,
        filters: MediaFilters,
        page: PageRequest,
    ) -> Result<Page<MediaItem>> {
        let published = if authz::is_admin(caller) {
            filters.published
        } else {
            Some(true)
        };

        let query = ListQuery::new()
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

        Ok(execute(self.store.as_ref(), collection.schema(), &query)?.try_map(from_item)?)
    }

    /// Change an item (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `Validation` and `NotFound`.
    pub async fn update(
        &self,
        caller: &Caller,
        collection: MediaCollection,
        id: &str,
        request: MediaRequest,
    ) -> Result<MediaItem> {
        authz::require_admin(caller)?;
        self.load(collection, id)?;

        let attrs = request_attrs(collection, &request)?;
        if let Some(asset) = collection.required_asset() {
            if attrs.contains_key(asset) {
                require_present(&attrs, asset)?;
            }
        }
        self.write(collection, id, attrs)
    }

    /// Show an item publicly (admin). Publishing a banner takes every other
    /// banner down.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn publish(
        &self,
        caller: &Caller,
        collection: MediaCollection,
        id: &str,
    ) -> Result<MediaItem> {
        authz::require_admin(caller)?;
        self.load(collection, id)?;

        if collection.exclusive_publish() {
            let item = exclusive::set(
                self.store.as_ref(),
                collection.schema(),
                "isPublished",
                id,
                collection.entity(),
            )?;
            return Ok(from_item(item)?);
        }

        let mut partial = Item::new();
        partial.insert("isPublished".into(), Value::Bool(true));
        self.write(collection, id, partial)
    }

    /// Hide an item (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn unpublish(
        &self,
        caller: &Caller,
        collection: MediaCollection,
        id: &str,
    ) -> Result<MediaItem> {
        authz::require_admin(caller)?;
        self.load(collection, id)?;

        let mut partial = Item::new();
        partial.insert("isPublished".into(), Value::Bool(false));
        self.write(collection, id, partial)
    }

    /// Assign `displayOrder` 0, 1, 2, ... following `ids` (admin).
    ///
    /// Every id is checked before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `Validation` for duplicates and `NotFound` for
    /// unknown ids.
    pub async fn reorder(
        &self,
        caller: &Caller,
        collection: MediaCollection,
        ids: &[String],
    ) -> Result<Vec<MediaItem>> {
        authz::require_admin(caller)?;

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ServiceError::Validation(format!("duplicate id in order: {dup}")));
        }
        for id in ids {
            self.load(collection, id)?;
        }

        let mut reordered = Vec::with_capacity(ids.len());
        for (position, id) in (0_i64..).zip(ids) {
            let mut partial = Item::new();
            partial.insert("displayOrder".into(), Value::from(position));
            reordered.push(self.write(collection, id, partial)?);
        }

        tracing::info!(collection = %collection, count = ids.len(), "Reordered media");
        Ok(reordered)
    }

    /// Soft-delete an item (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn delete(
        &self,
        caller: &Caller,
        collection: MediaCollection,
        id: &str,
    ) -> Result<()> {
        authz::require_admin(caller)?;
        self.store
            .soft_delete(collection.schema(), id)?
            .ok_or_else(|| ServiceError::not_found(collection.entity(), id))?;
        Ok(())
    }

    /// Remove an item for good (admin), deleting its stored assets.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` and `NotFound`.
    pub async fn hard_delete(
        &self,
        caller: &Caller,
        collection: MediaCollection,
        id: &str,
    ) -> Result<()> {
        authz::require_admin(caller)?;
        let item: MediaItem = match self.store.get(collection.schema(), id)? {
            Some(item) => from_item(item)?,
            None => return Err(ServiceError::not_found(collection.entity(), id)),
        };

        self.store.hard_delete(collection.schema(), id)?;
        for url in item.asset_urls() {
            delete_best_effort(self.storage.as_ref(), url).await;
        }

        tracing::info!(collection = %collection, id = %id, "Removed media item");
        Ok(())
    }

    /// Repair a collection whose exclusive publication was broken by
    /// concurrent publishes. Returns how many items were taken down.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `Validation` for collections
    /// without exclusive publication.
    pub async fn reconcile_published(
        &self,
        caller: &Caller,
        collection: MediaCollection,
    ) -> Result<usize> {
        authz::require_admin(caller)?;
        if !collection.exclusive_publish() {
            return Err(ServiceError::Validation(format!(
                "{collection} may have any number of published items"
            )));
        }
        exclusive::reconcile(self.store.as_ref(), collection.schema(), "isPublished")
    }

}
