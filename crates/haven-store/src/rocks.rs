//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use haven_core::time::now_timestamp;
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::item::{self, Item, Predicate, UniqueGuard};
use crate::keys;
use crate::schema::{all_column_families, cf, EntitySchema};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Held across every read-merge-write so a merge never commits over a
    /// newer version of the item. Guarded writes also check claims under it.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path with column
    /// families for every namespace and index in `schemas`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P, schemas: &[&EntitySchema]) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families(schemas)
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(StoreError::db)?;

        tracing::debug!(namespaces = schemas.len(), "Opened RocksDB item store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get the column family of a namespace.
    fn namespace_cf(&self, schema: &EntitySchema) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(schema.namespace)
            .ok_or_else(|| StoreError::UnknownNamespace(schema.namespace.to_string()))
    }

    /// Get a column family handle by name.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize an item using CBOR.
    fn serialize(item: &Item) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(item, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize an item from CBOR.
    fn deserialize(data: &[u8]) -> Result<Item> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read_item(&self, schema: &EntitySchema, key: &str) -> Result<Option<Item>> {
        let cf = self.namespace_cf(schema)?;
        self.db
            .get_cf(&cf, keys::item_key(key))
            .map_err(StoreError::db)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Stage the main record and every index entry of `new` into `batch`,
    /// removing index entries of `old` whose value changed.
    fn stage_write(
        &self,
        batch: &mut WriteBatch,
        schema: &EntitySchema,
        old: Option<&Item>,
        new: &Item,
    ) -> Result<()> {
        let key = item::key_of(schema, new)?;
        let cf_items = self.namespace_cf(schema)?;
        batch.put_cf(&cf_items, keys::item_key(key), Self::serialize(new)?);

        for index in schema.indexes {
            let cf_index = self.cf(&schema.index_cf(index))?;
            let old_token = old.and_then(|o| keys::index_token(o.get(index.attribute)));
            let new_token = keys::index_token(new.get(index.attribute));

            if let Some(old_token) = &old_token {
                if new_token.as_ref() != Some(old_token) {
                    batch.delete_cf(&cf_index, keys::index_key(old_token, key));
                }
            }
            if let Some(new_token) = &new_token {
                batch.put_cf(&cf_index, keys::index_key(new_token, key), []);
            }
        }

        Ok(())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch).map_err(StoreError::db)
    }

    /// Fail if the claim is held by another item that still satisfies the
    /// guard's liveness predicate.
    fn check_claim(&self, schema: &EntitySchema, guard: &UniqueGuard, own_key: &str) -> Result<()> {
        let cf_claims = self.cf(cf::CLAIMS)?;
        let Some(raw) = self
            .db
            .get_cf(&cf_claims, keys::claim_key(schema.namespace, &guard.claim))
            .map_err(StoreError::db)?
        else {
            return Ok(());
        };

        let holder =
            String::from_utf8(raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if holder == own_key {
            return Ok(());
        }

        match self.read_item(schema, &holder)? {
            Some(current) if guard.live_when.matches(&current) => {
                Err(StoreError::ConditionFailed {
                    claim: guard.claim.clone(),
                    holder,
                })
            }
            // Stale claim: the holder is gone or no longer live.
            _ => Ok(()),
        }
    }

    fn stage_claim(
        &self,
        batch: &mut WriteBatch,
        schema: &EntitySchema,
        guard: &UniqueGuard,
        key: &str,
    ) -> Result<()> {
        let cf_claims = self.cf(cf::CLAIMS)?;
        batch.put_cf(
            &cf_claims,
            keys::claim_key(schema.namespace, &guard.claim),
            key.as_bytes(),
        );
        Ok(())
    }
}

impl Store for RocksStore {
    fn put(&self, schema: &EntitySchema, mut item: Item) -> Result<Item> {
        item::stamp_new(&mut item, &now_timestamp());
        let key = item::key_of(schema, &item)?.to_string();

        let _write = self.write_lock.lock();
        // Check if the item exists to handle index updates
        let old = self.read_item(schema, &key)?;

        let mut batch = WriteBatch::default();
        self.stage_write(&mut batch, schema, old.as_ref(), &item)?;
        self.commit(batch)?;

        Ok(item)
    }

    fn get(&self, schema: &EntitySchema, key: &str) -> Result<Option<Item>> {
        self.read_item(schema, key)
    }

    fn get_many(&self, schema: &EntitySchema, keys: &[String]) -> Result<Vec<Option<Item>>> {
        let cf = self.namespace_cf(schema)?;
        self.db
            .multi_get_cf(keys.iter().map(|key| (&cf, keys::item_key(key))))
            .into_iter()
            .map(|result| {
                result
                    .map_err(StoreError::db)?
                    .map(|data| Self::deserialize(&data))
                    .transpose()
            })
            .collect()
    }

    fn update(&self, schema: &EntitySchema, key: &str, partial: Item) -> Result<Option<Item>> {
        let _write = self.write_lock.lock();
        let Some(existing) = self.read_item(schema, key)? else {
            return Ok(None);
        };

        let merged = item::merge(schema, &existing, partial, &now_timestamp());

        let mut batch = WriteBatch::default();
        self.stage_write(&mut batch, schema, Some(&existing), &merged)?;
        self.commit(batch)?;

        Ok(Some(merged))
    }

    fn hard_delete(&self, schema: &EntitySchema, key: &str) -> Result<()> {
        let _write = self.write_lock.lock();
        let Some(existing) = self.read_item(schema, key)? else {
            return Ok(());
        };

        let cf_items = self.namespace_cf(schema)?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_items, keys::item_key(key));

        for index in schema.indexes {
            if let Some(token) = keys::index_token(existing.get(index.attribute)) {
                let cf_index = self.cf(&schema.index_cf(index))?;
                batch.delete_cf(&cf_index, keys::index_key(&token, key));
            }
        }

        self.commit(batch)
    }

    fn scan(&self, schema: &EntitySchema, predicate: &Predicate) -> Result<Vec<Item>> {
        let cf = self.namespace_cf(schema)?;

        let mut items = Vec::new();
        for entry in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = entry.map_err(StoreError::db)?;
            let item = Self::deserialize(&value)?;
            if predicate.matches(&item) {
                items.push(item);
            }
        }

        Ok(items)
    }

    fn query(
        &self,
        schema: &EntitySchema,
        index: &str,
        partition: &Value,
        predicate: &Predicate,
    ) -> Result<Vec<Item>> {
        let index_def = schema.index(index).ok_or_else(|| StoreError::UnknownIndex {
            namespace: schema.namespace,
            index: index.to_string(),
        })?;

        let Some(token) = keys::index_token(Some(partition)) else {
            return Ok(Vec::new());
        };

        let cf_index = self.cf(&schema.index_cf(index_def))?;
        let prefix = keys::index_prefix(&token);

        let mut item_keys = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_index, IteratorMode::From(&prefix, Direction::Forward));
        for entry in iter {
            let (key, _) = entry.map_err(StoreError::db)?;

            // Stop if we're past the prefix
            if !key.starts_with(&prefix) {
                break;
            }

            if let Some(item_key) = keys::extract_item_key(&key, prefix.len()) {
                item_keys.push(item_key);
            }
        }

        let items = self
            .get_many(schema, &item_keys)?
            .into_iter()
            .flatten()
            .filter(|item| keys::in_partition(item.get(index_def.attribute), partition))
            .filter(|item| predicate.matches(item))
            .collect();

        Ok(items)
    }

    fn put_unique(
        &self,
        schema: &EntitySchema,
        mut item: Item,
        guard: &UniqueGuard,
    ) -> Result<Item> {
        let _write = self.write_lock.lock();

        item::stamp_new(&mut item, &now_timestamp());
        let key = item::key_of(schema, &item)?.to_string();
        self.check_claim(schema, guard, &key)?;

        let old = self.read_item(schema, &key)?;

        let mut batch = WriteBatch::default();
        self.stage_write(&mut batch, schema, old.as_ref(), &item)?;
        self.stage_claim(&mut batch, schema, guard, &key)?;
        self.commit(batch)?;

        Ok(item)
    }

    fn update_unique(
        &self,
        schema: &EntitySchema,
        key: &str,
        partial: Item,
        guard: &UniqueGuard,
    ) -> Result<Option<Item>> {
        let _write = self.write_lock.lock();

        let Some(existing) = self.read_item(schema, key)? else {
            return Ok(None);
        };
        self.check_claim(schema, guard, key)?;

        let merged = item::merge(schema, &existing, partial, &now_timestamp());

        let mut batch = WriteBatch::default();
        self.stage_write(&mut batch, schema, Some(&existing), &merged)?;
        self.stage_claim(&mut batch, schema, guard, key)?;
        self.commit(batch)?;

        Ok(Some(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use crate::schema::IndexDef;
    use serde_json::json;
    use tempfile::TempDir;

    const SESSIONS: EntitySchema = EntitySchema {
        namespace: "sessions",
        key_attr: "id",
        searchable: &["title"],
        default_sort: "createdAt",
        default_order: SortOrder::Desc,
        indexes: &[IndexDef::on("hostId"), IndexDef::on("status")],
    };

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path(), &[&SESSIONS]).unwrap();
        (store, dir)
    }

    fn session(id: &str, host: &str, status: &str) -> Item {
        json!({"id": id, "hostId": host, "status": status, "title": format!("session {id}")})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn attrs(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    fn live_slot(host: &str, at: &str) -> UniqueGuard {
        UniqueGuard::new(
            format!("{host}#{at}"),
            Predicate::new()
                .eq("hostId", host)
                .eq("at", at)
                .one_of("status", ["pending", "confirmed"]),
        )
    }

    #[test]
    fn item_crud() {
        let (store, _dir) = create_test_store();

        // Create
        let stored = store.put(&SESSIONS, session("s1", "h1", "pending")).unwrap();
        assert_eq!(stored["isActive"], true);
        assert!(stored.contains_key("createdAt"));

        // Read
        let retrieved = store.get(&SESSIONS, "s1").unwrap().unwrap();
        assert_eq!(retrieved["title"], "session s1");

        // Update merges and refreshes updatedAt
        let updated = store
            .update(&SESSIONS, "s1", attrs(json!({"status": "confirmed"})))
            .unwrap()
            .unwrap();
        assert_eq!(updated["status"], "confirmed");
        assert_eq!(updated["title"], "session s1");
        assert_eq!(updated["createdAt"], stored["createdAt"]);

        // Delete
        store.hard_delete(&SESSIONS, "s1").unwrap();
        assert!(store.get(&SESSIONS, "s1").unwrap().is_none());
    }

    #[test]
    fn update_missing_returns_none() {
        let (store, _dir) = create_test_store();
        let result = store
            .update(&SESSIONS, "nope", attrs(json!({"status": "x"})))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn concurrent_merges_keep_every_attribute() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("s1", "h1", "confirmed")).unwrap();

        std::thread::scope(|scope| {
            for writer in ["a", "b"] {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..200 {
                        let partial = attrs(json!({ format!("{writer}{i}"): true }));
                        store.update(&SESSIONS, "s1", partial).unwrap().unwrap();
                    }
                });
            }
        });

        let item = store.get(&SESSIONS, "s1").unwrap().unwrap();
        for writer in ["a", "b"] {
            for i in 0..200 {
                assert_eq!(item[&format!("{writer}{i}")], true, "lost {writer}{i}");
            }
        }
        assert_eq!(item["status"], "confirmed");
    }

    #[test]
    fn flag_merge_keeps_newer_status() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("s1", "h1", "confirmed")).unwrap();

        // A background flag write lands after the status changed.
        store
            .update(&SESSIONS, "s1", attrs(json!({"status": "cancelled"})))
            .unwrap();
        let merged = store
            .update(&SESSIONS, "s1", attrs(json!({"reminderSent": true})))
            .unwrap()
            .unwrap();

        assert_eq!(merged["status"], "cancelled");
        assert_eq!(merged["reminderSent"], true);
    }

    #[test]
    fn soft_delete_is_idempotent() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("s1", "h1", "pending")).unwrap();

        let first = store.soft_delete(&SESSIONS, "s1").unwrap().unwrap();
        let second = store.soft_delete(&SESSIONS, "s1").unwrap().unwrap();
        assert_eq!(first["isActive"], false);
        assert_eq!(second["isActive"], false);
    }

    #[test]
    fn hard_delete_is_idempotent() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("s1", "h1", "pending")).unwrap();
        store.hard_delete(&SESSIONS, "s1").unwrap();
        store.hard_delete(&SESSIONS, "s1").unwrap();
        assert!(store
            .query(&SESSIONS, "hostId", &json!("h1"), &Predicate::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn put_requires_key() {
        let (store, _dir) = create_test_store();
        let result = store.put(&SESSIONS, attrs(json!({"title": "keyless"})));
        assert!(matches!(result, Err(StoreError::MissingKey { .. })));
    }

    #[test]
    fn scan_with_predicate() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("a", "h1", "pending")).unwrap();
        store.put(&SESSIONS, session("b", "h1", "confirmed")).unwrap();
        store.put(&SESSIONS, session("c", "h2", "pending")).unwrap();

        let all = store.scan(&SESSIONS, &Predicate::new()).unwrap();
        assert_eq!(all.len(), 3);

        let pending = store
            .scan(&SESSIONS, &Predicate::new().eq("status", "pending"))
            .unwrap();
        assert_eq!(pending.len(), 2);

        let h1_pending = store
            .scan(
                &SESSIONS,
                &Predicate::new().eq("status", "pending").eq("hostId", "h1"),
            )
            .unwrap();
        assert_eq!(h1_pending.len(), 1);
        assert_eq!(h1_pending[0]["id"], "a");
    }

    #[test]
    fn query_by_index() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("a", "h1", "pending")).unwrap();
        store.put(&SESSIONS, session("b", "h1", "confirmed")).unwrap();
        store.put(&SESSIONS, session("c", "h2", "pending")).unwrap();

        let h1 = store
            .query(&SESSIONS, "hostId", &json!("h1"), &Predicate::new())
            .unwrap();
        assert_eq!(h1.len(), 2);

        let h1_confirmed = store
            .query(
                &SESSIONS,
                "hostId",
                &json!("h1"),
                &Predicate::new().eq("status", "confirmed"),
            )
            .unwrap();
        assert_eq!(h1_confirmed.len(), 1);

        let unknown = store.query(&SESSIONS, "title", &json!("x"), &Predicate::new());
        assert!(matches!(unknown, Err(StoreError::UnknownIndex { .. })));
    }

    #[test]
    fn numeric_partition_matches_by_value() {
        let (store, _dir) = create_test_store();
        let mut item = session("a", "h1", "pending");
        item.insert("status".into(), json!(1.0));
        store.put(&SESSIONS, item).unwrap();

        let found = store
            .query(&SESSIONS, "status", &json!(1), &Predicate::new())
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn index_updated_on_change() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("a", "h1", "pending")).unwrap();

        store
            .update(&SESSIONS, "a", attrs(json!({"status": "confirmed"})))
            .unwrap();

        let pending = store
            .query(&SESSIONS, "status", &json!("pending"), &Predicate::new())
            .unwrap();
        assert!(pending.is_empty());

        let confirmed = store
            .query(&SESSIONS, "status", &json!("confirmed"), &Predicate::new())
            .unwrap();
        assert_eq!(confirmed.len(), 1);
    }

    #[test]
    fn get_many_preserves_order() {
        let (store, _dir) = create_test_store();
        store.put(&SESSIONS, session("a", "h1", "pending")).unwrap();
        store.put(&SESSIONS, session("b", "h1", "pending")).unwrap();

        let keys = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let found = store.get_many(&SESSIONS, &keys).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].as_ref().unwrap()["id"], "b");
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().unwrap()["id"], "a");
    }

    #[test]
    fn unique_claim_blocks_second_live_holder() {
        let (store, _dir) = create_test_store();
        let mut first = session("a", "h1", "pending");
        first.insert("at".into(), json!("10:00"));
        store
            .put_unique(&SESSIONS, first, &live_slot("h1", "10:00"))
            .unwrap();

        let mut second = session("b", "h1", "pending");
        second.insert("at".into(), json!("10:00"));
        let result = store.put_unique(&SESSIONS, second.clone(), &live_slot("h1", "10:00"));
        match result {
            Err(StoreError::ConditionFailed { holder, .. }) => assert_eq!(holder, "a"),
            other => panic!("expected ConditionFailed, got {other:?}"),
        }
        assert!(store.get(&SESSIONS, "b").unwrap().is_none());

        // Once the holder is no longer live, the claim can be taken over
        store
            .update(&SESSIONS, "a", attrs(json!({"status": "cancelled"})))
            .unwrap();
        store
            .put_unique(&SESSIONS, second, &live_slot("h1", "10:00"))
            .unwrap();
        assert!(store.get(&SESSIONS, "b").unwrap().is_some());
    }

    #[test]
    fn update_unique_moves_claim() {
        let (store, _dir) = create_test_store();
        let mut first = session("a", "h1", "pending");
        first.insert("at".into(), json!("10:00"));
        store
            .put_unique(&SESSIONS, first, &live_slot("h1", "10:00"))
            .unwrap();

        // Re-asserting its own claim is allowed
        store
            .update_unique(
                &SESSIONS,
                "a",
                attrs(json!({"title": "renamed"})),
                &live_slot("h1", "10:00"),
            )
            .unwrap()
            .unwrap();

        // Move to 11:00; the 10:00 claim is now stale
        store
            .update_unique(
                &SESSIONS,
                "a",
                attrs(json!({"at": "11:00"})),
                &live_slot("h1", "11:00"),
            )
            .unwrap()
            .unwrap();

        let mut second = session("b", "h1", "pending");
        second.insert("at".into(), json!("10:00"));
        store
            .put_unique(&SESSIONS, second, &live_slot("h1", "10:00"))
            .unwrap();

        let mut third = session("c", "h1", "pending");
        third.insert("at".into(), json!("11:00"));
        let result = store.put_unique(&SESSIONS, third, &live_slot("h1", "11:00"));
        assert!(matches!(result, Err(StoreError::ConditionFailed { .. })));
    }

    #[test]
    fn unknown_namespace_is_reported() {
        let (store, _dir) = create_test_store();
        let other = EntitySchema {
            namespace: "elsewhere",
            ..SESSIONS
        };
        let result = store.get(&other, "x");
        assert!(matches!(result, Err(StoreError::UnknownNamespace(_))));
    }
}
