//! `RocksDB` item store and query pipeline for Haven.
//!
//! This crate provides the one storage engine every entity shares:
//!
//! - [`Store`]: a wide-table item store with one namespace per entity,
//!   supporting upsert, get, attribute merge, soft and hard delete, filtered
//!   scans, index queries and guarded (unique-claim) writes.
//! - [`query`]: the filter → search → sort → paginate pipeline layered on top
//!   of scans and index queries.
//! - [`Repository`]: a typed view of one namespace for any [`Record`].
//!
//! # Architecture
//!
//! Each namespace is a column family keyed by the item's primary key. Every
//! declared index is a column family keyed by `value || 0x00 || key`. Unique
//! claims live in one shared `claims` column family.
//!
//! # Example
//!
//! ```no_run
//! use haven_store::{EntitySchema, IndexDef, Predicate, RocksStore, SortOrder, Store};
//!
//! const NOTES: EntitySchema = EntitySchema {
//!     namespace: "notes",
//!     key_attr: "id",
//!     searchable: &["title"],
//!     default_sort: "createdAt",
//!     default_order: SortOrder::Desc,
//!     indexes: &[IndexDef::on("ownerId")],
//! };
//!
//! let store = RocksStore::open("/tmp/haven-db", &[&NOTES]).unwrap();
//! let active = store.scan(&NOTES, &Predicate::new().eq("isActive", true)).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod item;
pub mod keys;
pub mod query;
pub mod repo;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use item::{Condition, Item, Predicate, UniqueGuard};
pub use query::{ListQuery, Page, PageRequest, PostFilter, SortOrder};
pub use repo::{from_item, to_item, Record, Repository};
pub use rocks::RocksStore;
pub use schema::{EntitySchema, IndexDef};

use serde_json::Value;

/// The storage trait defining all item operations.
///
/// Every operation is scoped to the namespace described by `schema`. Storage
/// failures are returned unchanged; nothing is retried at this layer.
pub trait Store: Send + Sync {
    /// Insert or replace an item.
    ///
    /// Missing `createdAt`/`updatedAt` are stamped and a missing `isActive`
    /// defaults to `true`. Index entries are maintained. There is no version
    /// check: concurrent writers overwrite each other.
    ///
    /// # Errors
    ///
    /// Returns an error if the item has no key or the database write fails.
    fn put(&self, schema: &EntitySchema, item: Item) -> Result<Item>;

    /// Get an item by key. Absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get(&self, schema: &EntitySchema, key: &str) -> Result<Option<Item>>;

    /// Get several items in one round trip, preserving the order of `keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_many(&self, schema: &EntitySchema, keys: &[String]) -> Result<Vec<Option<Item>>>;

    /// Merge `partial` into an existing item and refresh `updatedAt`.
    ///
    /// The key attribute is never changed. Returns `Ok(None)` when the key
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn update(&self, schema: &EntitySchema, key: &str, partial: Item) -> Result<Option<Item>>;

    /// Flip `isActive` to false. Calling it twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn soft_delete(&self, schema: &EntitySchema, key: &str) -> Result<Option<Item>> {
        let mut partial = Item::new();
        partial.insert(item::IS_ACTIVE.to_string(), Value::Bool(false));
        self.update(schema, key, partial)
    }

    /// Physically remove an item. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn hard_delete(&self, schema: &EntitySchema, key: &str) -> Result<()>;

    /// Return every item of the namespace matching `predicate`.
    ///
    /// This reads the whole namespace. Substring, membership and other
    /// non-equality filters are the caller's job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn scan(&self, schema: &EntitySchema, predicate: &Predicate) -> Result<Vec<Item>>;

    /// Like [`Store::scan`], but candidates come from one partition of a
    /// declared index.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownIndex` if the schema declares no such index.
    fn query(
        &self,
        schema: &EntitySchema,
        index: &str,
        partition: &Value,
        predicate: &Predicate,
    ) -> Result<Vec<Item>>;

    /// Insert an item only if the guard's claim is free.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionFailed` if another live item holds the claim.
    fn put_unique(&self, schema: &EntitySchema, item: Item, guard: &UniqueGuard) -> Result<Item>;

    /// Merge `partial` into an existing item only if the guard's claim is free
    /// (or already held by this item).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionFailed` if another live item holds the claim.
    fn update_unique(
        &self,
        schema: &EntitySchema,
        key: &str,
        partial: Item,
        guard: &UniqueGuard,
    ) -> Result<Option<Item>>;
}
