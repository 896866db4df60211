//! Flags that at most one item of a namespace may carry.
//!
//! Setting the flag is two passes over the store: clear it everywhere else,
//! then set it on the target. Neither pass is atomic with the other, so two
//! concurrent calls can leave two flagged items. [`reconcile`] repairs that by
//! keeping the most recently updated holder.

use haven_store::item::key_of;
use haven_store::{EntitySchema, Item, Predicate, Store};
use serde_json::Value;

use crate::error::{Result, ServiceError};

fn flag(attribute: &str, on: bool) -> Item {
    let mut partial = Item::new();
    partial.insert(attribute.to_string(), Value::Bool(on));
    partial
}

fn holders<S: Store + ?Sized>(
    store: &S,
    schema: &EntitySchema,
    attribute: &str,
) -> Result<Vec<Item>> {
    Ok(store.scan(
        schema,
        &Predicate::new().eq(attribute, true).eq("isActive", true),
    )?)
}

/// Set `attribute` on `key` and clear it on every other active item.
///
/// # Errors
///
/// Returns `NotFound` if `key` is absent, or a store error from either pass.
pub fn set<S: Store + ?Sized>(
    store: &S,
    schema: &'static EntitySchema,
    attribute: &str,
    key: &str,
    entity: &'static str,
) -> Result<Item> {
    let mut cleared = 0usize;
    for holder in holders(store, schema, attribute)? {
        let holder_key = key_of(schema, &holder)?;
        if holder_key != key {
            store.update(schema, holder_key, flag(attribute, false))?;
            cleared += 1;
        }
    }

    let item = store
        .update(schema, key, flag(attribute, true))?
        .ok_or_else(|| ServiceError::not_found(entity, key))?;

    tracing::info!(
        namespace = schema.namespace,
        attribute,
        key,
        cleared,
        "Moved exclusive flag"
    );
    Ok(item)
}

/// Keep `attribute` only on the most recently updated holder.
///
/// Returns how many items lost the flag.
///
/// # Errors
///
/// Returns a store error if the scan or an update fails.
pub fn reconcile<S: Store + ?Sized>(
    store: &S,
    schema: &'static EntitySchema,
    attribute: &str,
) -> Result<usize> {
    let mut flagged = holders(store, schema, attribute)?;
    if flagged.len() <= 1 {
        return Ok(0);
    }

    // Timestamps are fixed-width ISO strings, so string order is time order.
    flagged.sort_by(|a, b| {
        let at = |item: &Item| item.get("updatedAt").and_then(Value::as_str).map(str::to_string);
        at(b).cmp(&at(a))
    });

    let mut demoted = 0;
    for stale in &flagged[1..] {
        store.update(schema, key_of(schema, stale)?, flag(attribute, false))?;
        demoted += 1;
    }

    tracing::warn!(
        namespace = schema.namespace,
        attribute,
        demoted,
        "Repaired exclusive flag"
    );
    Ok(demoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::BANNERS;
    use haven_store::RocksStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn banner(store: &RocksStore, id: &str, published: bool) {
        let item = json!({"id": id, "title": id, "isPublished": published, "isActive": true});
        store
            .put(&BANNERS, item.as_object().cloned().unwrap())
            .unwrap();
    }

    fn published(store: &RocksStore) -> Vec<String> {
        holders(store, &BANNERS, "isPublished")
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn set_moves_the_flag() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path(), crate::schemas::ALL).unwrap();
        banner(&store, "a", true);
        banner(&store, "b", false);

        set(&store, &BANNERS, "isPublished", "b", "banner").unwrap();
        assert_eq!(published(&store), vec!["b".to_string()]);

        assert!(matches!(
            set(&store, &BANNERS, "isPublished", "zzz", "banner"),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn reconcile_keeps_latest() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path(), crate::schemas::ALL).unwrap();
        banner(&store, "a", true);
        banner(&store, "b", true);
        banner(&store, "c", true);

        // Touch "a" last so it wins
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .update(&BANNERS, "a", flag("isPublished", true))
            .unwrap();

        assert_eq!(reconcile(&store, &BANNERS, "isPublished").unwrap(), 2);
        assert_eq!(published(&store), vec!["a".to_string()]);
        assert_eq!(reconcile(&store, &BANNERS, "isPublished").unwrap(), 0);
    }
}
