//! Axis sizes backed by a store collection.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use super::AxisIndex;
use crate::error::Result;
use crate::store::{self, Collection, ColumnWidthRecord, GridStore, RowHeightRecord};

/// Which axis a [`PersistedAxis`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisKind {
    /// Column widths, stored in `colWidths` as `{id, width}`.
    Columns,
    /// Row heights, stored in `rowHeights` as `{id, height}`.
    Rows,
}

impl AxisKind {
    pub fn collection(self) -> Collection {
        match self {
            AxisKind::Columns => Collection::ColumnWidths,
            AxisKind::Rows => Collection::RowHeights,
        }
    }

    fn encode(self, index: u32, size: f64) -> Result<Value> {
        match self {
            AxisKind::Columns => store::encode(&ColumnWidthRecord { id: index, width: size }),
            AxisKind::Rows => store::encode(&RowHeightRecord { id: index, height: size }),
        }
    }

    fn decode(self, record: Value) -> Result<(u32, f64)> {
        let collection = self.collection();
        match self {
            AxisKind::Columns => {
                let record: ColumnWidthRecord = store::decode(collection, record)?;
                Ok((record.id, record.width))
            }
            AxisKind::Rows => {
                let record: RowHeightRecord = store::decode(collection, record)?;
                Ok((record.id, record.height))
            }
        }
    }
}

/// An [`AxisIndex`] whose overrides are loaded from and written through to a store.
///
/// Queries run against the in-memory index and never touch the store.
pub struct PersistedAxis<S> {
    kind: AxisKind,
    store: Rc<S>,
    index: RefCell<AxisIndex>,
}

impl<S: GridStore> PersistedAxis<S> {
    pub fn new(store: Rc<S>, kind: AxisKind, index: AxisIndex) -> Self {
        Self {
            kind,
            store,
            index: RefCell::new(index),
        }
    }

    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    /// Replace the in-memory overrides with everything persisted.
    ///
    /// Returns the number of overrides loaded.
    pub async fn load(&self) -> Result<usize> {
        let records = self.store.get_all(self.kind.collection()).await?;
        let overrides = records
            .into_iter()
            .map(|record| self.kind.decode(record))
            .collect::<Result<Vec<_>>>()?;
        let count = overrides.len();
        self.index.borrow_mut().replace_overrides(overrides);
        log::debug!("loaded {count} {} overrides", self.kind.collection());
        Ok(count)
    }

    /// Resize one entry.
    ///
    /// The in-memory index changes before the write is issued, so layout
    /// queries see the new size even if the write later fails.
    pub async fn set_size(&self, index: u32, size: f64) -> Result<()> {
        self.index.borrow_mut().set_size(index, size);
        let record = self.kind.encode(index, size)?;
        self.store.put(self.kind.collection(), record).await
    }

    pub fn size(&self, index: u32) -> f64 {
        self.index.borrow().size(index)
    }

    pub fn position(&self, index: u32, origin: f64) -> f64 {
        self.index.borrow_mut().position(index, origin)
    }

    pub fn index_at(&self, position: f64, origin: f64) -> Option<u32> {
        self.index.borrow_mut().index_at(position, origin)
    }

    pub fn total(&self) -> u32 {
        self.index.borrow().total()
    }

    /// Run `f` against the underlying index.
    pub fn with_index<R>(&self, f: impl FnOnce(&mut AxisIndex) -> R) -> R {
        f(&mut self.index.borrow_mut())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::store::{MemoryStore, RecordKey};
    use serde_json::json;

    fn columns(store: &Rc<MemoryStore>) -> PersistedAxis<MemoryStore> {
        PersistedAxis::new(Rc::clone(store), AxisKind::Columns, AxisIndex::new(1000, 65.0))
    }

    #[tokio::test]
    async fn test_set_size_writes_through() {
        let store = Rc::new(MemoryStore::open());
        let axis = columns(&store);
        axis.set_size(2, 100.0).await.unwrap();

        assert_eq!(axis.size(2), 100.0);
        assert_eq!(axis.position(3, 42.0), 277.0);
        let record = store
            .get(Collection::ColumnWidths, &RecordKey::Index(2))
            .await
            .unwrap();
        assert_eq!(record, Some(json!({"id": 2, "width": 100.0})));
    }

    #[tokio::test]
    async fn test_load_replaces_overrides() {
        let store = Rc::new(MemoryStore::open());
        store
            .put(Collection::RowHeights, json!({"id": 4, "height": 40.0}))
            .await
            .unwrap();
        store
            .put(Collection::RowHeights, json!({"id": 9, "height": 10.0}))
            .await
            .unwrap();

        let rows = PersistedAxis::new(Rc::clone(&store), AxisKind::Rows, AxisIndex::new(100, 23.0));
        assert_eq!(rows.load().await.unwrap(), 2);
        assert_eq!(rows.size(4), 40.0);
        assert_eq!(rows.size(9), 10.0);
        assert_eq!(rows.position(10, 0.0), 230.0 + 17.0 - 13.0);
        assert_eq!(rows.with_index(|index| index.override_count()), 2);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_record() {
        let store = Rc::new(MemoryStore::open());
        store
            .put(Collection::ColumnWidths, json!({"id": 1, "height": 40.0}))
            .await
            .unwrap();
        let err = columns(&store).load().await.unwrap_err();
        assert!(matches!(err, GridError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_memory_update() {
        let store = Rc::new(MemoryStore::open());
        let axis = columns(&store);
        store.close();
        assert!(axis.set_size(0, 10.0).await.is_err());
        assert_eq!(axis.size(0), 10.0);
        assert_eq!(axis.index_at(42.0 + 10.0, 42.0), Some(1));
    }
}
