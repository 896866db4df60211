//! Typed repositories over the generic item store.
//!
//! A [`Record`] is a serde type bound to one [`EntitySchema`]. A
//! [`Repository`] converts between records and items so callers never touch
//! raw attribute maps except for partial updates.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::item::{Item, Predicate, UniqueGuard};
use crate::query::{self, ListQuery, Page};
use crate::schema::EntitySchema;
use crate::Store;

/// A typed entity stored in one namespace.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Schema of the namespace holding this record.
    const SCHEMA: &'static EntitySchema;

    /// The record's primary key.
    fn key(&self) -> &str;
}

/// Convert any serializable value into an item.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the value does not serialize to a
/// JSON object.
pub fn to_item<T: Serialize>(value: &T) -> Result<Item> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Serialization(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(StoreError::Serialization(e.to_string())),
    }
}

/// Convert an item back into a typed value.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the item does not match `T`.
pub fn from_item<T: DeserializeOwned>(item: Item) -> Result<T> {
    serde_json::from_value(Value::Object(item)).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Typed access to the namespace of `T`.
pub struct Repository<S, T> {
    store: Arc<S>,
    _record: PhantomData<fn() -> T>,
}

impl<S, T> Clone for Repository<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<S: Store, T: Record> Repository<S, T> {
    /// Create a repository over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn create(&self, record: &T) -> Result<T> {
        from_item(self.store.put(T::SCHEMA, to_item(record)?)?)
    }

    /// Get a record by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn get(&self, key: &str) -> Result<Option<T>> {
        self.store.get(T::SCHEMA, key)?.map(from_item).transpose()
    }

    /// Get several records, preserving the order of `keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn get_many(&self, keys: &[String]) -> Result<Vec<Option<T>>> {
        self.store
            .get_many(T::SCHEMA, keys)?
            .into_iter()
            .map(|item| item.map(from_item).transpose())
            .collect()
    }

    /// Merge raw attributes into a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn update(&self, key: &str, partial: Item) -> Result<Option<T>> {
        self.store
            .update(T::SCHEMA, key, partial)?
            .map(from_item)
            .transpose()
    }

    /// Merge the non-null fields of a serializable patch into a record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn patch<P: Serialize>(&self, key: &str, patch: &P) -> Result<Option<T>> {
        let mut partial = to_item(patch)?;
        partial.retain(|_, value| !value.is_null());
        self.update(key, partial)
    }

    /// Flip `isActive` off.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn soft_delete(&self, key: &str) -> Result<Option<T>> {
        self.store
            .soft_delete(T::SCHEMA, key)?
            .map(from_item)
            .transpose()
    }

    /// Remove a record physically.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn hard_delete(&self, key: &str) -> Result<()> {
        self.store.hard_delete(T::SCHEMA, key)
    }

    /// All records matching `predicate`, in scan order.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn find(&self, predicate: &Predicate) -> Result<Vec<T>> {
        self.store
            .scan(T::SCHEMA, predicate)?
            .into_iter()
            .map(from_item)
            .collect()
    }

    /// All records of one index partition matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is unknown or the read fails.
    pub fn find_by_index(
        &self,
        index: &str,
        partition: impl Into<Value>,
        predicate: &Predicate,
    ) -> Result<Vec<T>> {
        self.store
            .query(T::SCHEMA, index, &partition.into(), predicate)?
            .into_iter()
            .map(from_item)
            .collect()
    }

    /// The first record of one index partition matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is unknown or the read fails.
    pub fn find_one_by_index(
        &self,
        index: &str,
        partition: impl Into<Value>,
        predicate: &Predicate,
    ) -> Result<Option<T>> {
        Ok(self
            .find_by_index(index, partition, predicate)?
            .into_iter()
            .next())
    }

    /// Run the list pipeline and return one typed page.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or an item does not match `T`.
    pub fn list(&self, query: &ListQuery) -> Result<Page<T>> {
        query::execute(self.store.as_ref(), T::SCHEMA, query)?.try_map(from_item)
    }

    /// Insert a record if the guard's claim is free.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionFailed` if the claim is taken.
    pub fn put_unique(&self, record: &T, guard: &UniqueGuard) -> Result<T> {
        from_item(self.store.put_unique(T::SCHEMA, to_item(record)?, guard)?)
    }

    /// Merge raw attributes into a record if the guard's claim is free.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionFailed` if the claim is taken.
    pub fn update_unique(
        &self,
        key: &str,
        partial: Item,
        guard: &UniqueGuard,
    ) -> Result<Option<T>> {
        self.store
            .update_unique(T::SCHEMA, key, partial, guard)?
            .map(from_item)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{PageRequest, SortOrder};
    use crate::schema::IndexDef;
    use crate::RocksStore;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    const NOTES: EntitySchema = EntitySchema {
        namespace: "notes",
        key_attr: "id",
        searchable: &["body"],
        default_sort: "createdAt",
        default_order: SortOrder::Desc,
        indexes: &[IndexDef::on("ownerId")],
    };

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        id: String,
        owner_id: String,
        body: String,
        #[serde(default)]
        pinned: bool,
        #[serde(default)]
        is_active: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<String>,
    }

    impl Record for Note {
        const SCHEMA: &'static EntitySchema = &NOTES;

        fn key(&self) -> &str {
            &self.id
        }
    }

    #[derive(Serialize)]
    struct NotePatch {
        body: Option<String>,
        pinned: Option<bool>,
    }

    fn note(id: &str, owner: &str, body: &str) -> Note {
        Note {
            id: id.into(),
            owner_id: owner.into(),
            body: body.into(),
            pinned: false,
            is_active: true,
            created_at: None,
        }
    }

    fn repo() -> (Repository<RocksStore, Note>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path(), &[&NOTES]).unwrap();
        (Repository::new(Arc::new(store)), dir)
    }

    #[test]
    fn typed_crud() {
        let (repo, _dir) = repo();
        let created = repo.create(&note("n1", "u1", "hello")).unwrap();
        assert!(created.created_at.is_some());
        assert_eq!(created.key(), "n1");

        let fetched = repo.get("n1").unwrap().unwrap();
        assert_eq!(fetched.body, "hello");

        let patched = repo
            .patch(
                "n1",
                &NotePatch {
                    body: None,
                    pinned: Some(true),
                },
            )
            .unwrap()
            .unwrap();
        assert!(patched.pinned);
        assert_eq!(patched.body, "hello");

        let deleted = repo.soft_delete("n1").unwrap().unwrap();
        assert!(!deleted.is_active);

        repo.hard_delete("n1").unwrap();
        assert!(repo.get("n1").unwrap().is_none());
    }

    #[test]
    fn list_and_index_lookup() {
        let (repo, _dir) = repo();
        repo.create(&note("a", "u1", "Grief support")).unwrap();
        repo.create(&note("b", "u1", "Study tips")).unwrap();
        repo.create(&note("c", "u2", "grief and loss")).unwrap();

        let mine = repo.find_by_index("ownerId", "u1", &Predicate::new()).unwrap();
        assert_eq!(mine.len(), 2);

        let page = repo
            .list(&ListQuery::new().search(Some("GRIEF")).page(PageRequest::new(1, 10)))
            .unwrap();
        assert_eq!(page.total, 2);

        let many = repo
            .get_many(&["c".to_string(), "zzz".to_string()])
            .unwrap();
        assert_eq!(many[0].as_ref().unwrap().owner_id, "u2");
        assert!(many[1].is_none());
    }

    #[test]
    fn to_item_rejects_non_objects() {
        assert!(to_item(&json!([1, 2])).is_err());
        assert!(to_item(&json!({"id": "x"})).is_ok());
    }
}
