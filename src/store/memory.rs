//! In-process [`GridStore`] backed by ordered maps.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::{Collection, GridStore, RecordKey};
use crate::error::{GridError, Result};

/// Store that keeps every collection in memory.
///
/// Has the same open/close lifecycle as a real database handle: every
/// operation on a closed store fails with [`GridError::StoreUnavailable`].
#[derive(Debug)]
pub struct MemoryStore {
    is_open: Cell<bool>,
    collections: RefCell<HashMap<Collection, BTreeMap<RecordKey, Value>>>,
}

impl MemoryStore {
    /// Open an empty store.
    pub fn open() -> Self {
        Self {
            is_open: Cell::new(true),
            collections: RefCell::new(HashMap::new()),
        }
    }

    /// Close the handle. Records are kept so a test can inspect them.
    pub fn close(&self) {
        self.is_open.set(false);
    }

    pub fn is_open(&self) -> bool {
        self.is_open.get()
    }

    /// Number of records in a collection.
    pub fn record_count(&self, collection: Collection) -> usize {
        self.collections
            .borrow()
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open.get() {
            Ok(())
        } else {
            Err(GridError::StoreUnavailable("memory store is closed".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::open()
    }
}

impl GridStore for MemoryStore {
    async fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>> {
        self.ensure_open()?;
        Ok(self
            .collections
            .borrow()
            .get(&collection)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        self.ensure_open()?;
        Ok(self
            .collections
            .borrow()
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_many(&self, collection: Collection, keys: &[RecordKey]) -> Result<Vec<Value>> {
        self.ensure_open()?;
        let collections = self.collections.borrow();
        let Some(records) = collections.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| records.get(key))
            .cloned()
            .collect())
    }

    async fn put(&self, collection: Collection, record: Value) -> Result<()> {
        self.ensure_open()?;
        let key = RecordKey::of(&record)
            .ok_or_else(|| GridError::operation_failed("put", collection, "record has no usable id"))?;
        self.collections
            .borrow_mut()
            .entry(collection)
            .or_default()
            .insert(key, record);
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::open();
        store
            .put(Collection::Cells, json!({"id": "1:2", "value": "x"}))
            .await
            .unwrap();
        let record = store
            .get(Collection::Cells, &RecordKey::from("1:2"))
            .await
            .unwrap();
        assert_eq!(record, Some(json!({"id": "1:2", "value": "x"})));
        assert_eq!(
            store.get(Collection::Cells, &RecordKey::from("9:9")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_put_upserts_by_id() {
        let store = MemoryStore::open();
        store
            .put(Collection::ColumnWidths, json!({"id": 3, "width": 80.0}))
            .await
            .unwrap();
        store
            .put(Collection::ColumnWidths, json!({"id": 3, "width": 120.0}))
            .await
            .unwrap();
        assert_eq!(store.record_count(Collection::ColumnWidths), 1);
        let all = store.get_all(Collection::ColumnWidths).await.unwrap();
        assert_eq!(all, vec![json!({"id": 3, "width": 120.0})]);
    }

    #[tokio::test]
    async fn test_get_many_omits_missing() {
        let store = MemoryStore::open();
        store
            .put(Collection::Cells, json!({"id": "0:0", "value": "a"}))
            .await
            .unwrap();
        let keys = vec![RecordKey::from("0:0"), RecordKey::from("0:1")];
        let found = store.get_many(Collection::Cells, &keys).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(store
            .get_many(Collection::RowHeights, &keys)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_put_without_id_fails() {
        let store = MemoryStore::open();
        let err = store
            .put(Collection::Cells, json!({"value": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GridError::StoreOperationFailed {
                operation: "put",
                collection: Collection::Cells,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let store = MemoryStore::open();
        store.close();
        assert!(!store.is_open());
        let err = store.get_all(Collection::Cells).await.unwrap_err();
        assert!(matches!(err, GridError::StoreUnavailable(_)));
    }
}
