//! Persistent-store contract consumed by the grid core.
//!
//! The core needs four asynchronous operations over a handful of keyed
//! collections: single get, get-all, batched get and upsert. Records are JSON
//! objects carrying an `id` field. Typed views of those records live in
//! [`records`].
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`] - in-process maps, used natively and in tests
//! - `IndexedDbStore` (wasm32 only) - the browser's IndexedDB

pub mod memory;
pub mod records;

#[cfg(target_arch = "wasm32")]
pub mod indexed_db;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{GridError, Result};

pub use memory::MemoryStore;
pub use records::{CellRecord, ColumnWidthRecord, HighWaterRecord, RowHeightRecord};

#[cfg(target_arch = "wasm32")]
pub use indexed_db::IndexedDbStore;

/// Keyed collections the core reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Cell values keyed by `"row:col"`.
    Cells,
    /// Column width overrides keyed by column index.
    ColumnWidths,
    /// Row height overrides keyed by row index.
    RowHeights,
    /// Singleton high-water-mark record.
    MaxEditedCell,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Cells,
        Collection::ColumnWidths,
        Collection::RowHeights,
        Collection::MaxEditedCell,
    ];

    /// Object store name.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Cells => "cells",
            Collection::ColumnWidths => "colWidths",
            Collection::RowHeights => "rowHeights",
            Collection::MaxEditedCell => "maxEditedCell",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary key of a record. Cells use text ids, axis overrides use indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Text(String),
    Index(u32),
}

impl RecordKey {
    /// Read the `id` field of a record.
    pub fn of(record: &Value) -> Option<RecordKey> {
        match record.get("id")? {
            Value::String(s) => Some(RecordKey::Text(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(RecordKey::Index),
            _ => None,
        }
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<u32> for RecordKey {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Text(s) => f.write_str(s),
            RecordKey::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Asynchronous keyed record store.
///
/// Implementations run on a single logical thread; futures need not be
/// `Send`. Every call is one suspension point and runs to completion once
/// issued. Failures are reported as [`GridError::StoreUnavailable`] or
/// [`GridError::StoreOperationFailed`] and are never retried by the core.
#[allow(async_fn_in_trait)]
pub trait GridStore {
    /// Fetch one record, `None` if the key is absent.
    async fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>>;

    /// Fetch every record of a collection.
    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Fetch several records. Missing keys are omitted; order is unspecified.
    async fn get_many(&self, collection: Collection, keys: &[RecordKey]) -> Result<Vec<Value>>;

    /// Insert or replace a record keyed by its `id` field.
    async fn put(&self, collection: Collection, record: Value) -> Result<()>;
}

/// Decode a record into its typed form.
pub fn decode<T: DeserializeOwned>(collection: Collection, record: Value) -> Result<T> {
    serde_json::from_value(record)
        .map_err(|e| GridError::InvalidRecord(format!("{collection}: {e}")))
}

/// Encode a typed record for [`GridStore::put`].
pub fn encode<T: Serialize>(record: &T) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

/// Typed single-record read.
pub async fn get_record<S, T>(store: &S, collection: Collection, key: &RecordKey) -> Result<Option<T>>
where
    S: GridStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .get(collection, key)
        .await?
        .map(|record| decode(collection, record))
        .transpose()
}

/// Typed upsert.
pub async fn put_record<S, T>(store: &S, collection: Collection, record: &T) -> Result<()>
where
    S: GridStore + ?Sized,
    T: Serialize,
{
    store.put(collection, encode(record)?).await
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

    #[test]
    fn test_record_key_of() {
        assert_eq!(
            RecordKey::of(&json!({"id": "3:4", "value": "x"})),
            Some(RecordKey::Text("3:4".into()))
        );
        assert_eq!(
            RecordKey::of(&json!({"id": 7, "width": 90.0})),
            Some(RecordKey::Index(7))
        );
        assert_eq!(RecordKey::of(&json!({"id": -1})), None);
        assert_eq!(RecordKey::of(&json!({"value": "x"})), None);
    }

    #[test]
    fn test_collection_names() {
        let names: Vec<_> = Collection::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["cells", "colWidths", "rowHeights", "maxEditedCell"]);
    }

    #[test]
    fn test_decode_reports_collection() {
        let err = decode::<ColumnWidthRecord>(Collection::ColumnWidths, json!({"id": "x"})).unwrap_err();
        assert!(matches!(err, GridError::InvalidRecord(ref msg) if msg.starts_with("colWidths")));
    }
}
