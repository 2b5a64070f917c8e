//! Write-through cell value cache with deduplicated range prefetch.
//!
//! Entries are never evicted. A fetched coordinate is cached even when the
//! store has nothing for it (`CacheEntry::Empty`), so empty regions of the
//! grid cost one read per session. The render path reads through
//! [`CellValueCache::visible_sync`], which never touches the store; an
//! asynchronous [`CellValueCache::prefetch_range`] warms the cache for the
//! next frame.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cell_ref;
use crate::error::Result;
use crate::store::{self, CellRecord, Collection, GridStore, HighWaterRecord, RecordKey};
use crate::types::{CacheEntry, CellCoord, CellRange};

/// Furthest row and column ever written.
///
/// Only grows during a session; persisted whenever it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HighWaterMark {
    pub row: u32,
    pub col: u32,
}

impl HighWaterMark {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// The mark after a write to `cell`.
    pub fn raised_to(self, cell: CellCoord) -> Self {
        Self {
            row: self.row.max(cell.row),
            col: self.col.max(cell.col),
        }
    }
}

/// Identity of an outstanding prefetch, derived from the range bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefetchKey(CellRange);

impl From<CellRange> for PrefetchKey {
    fn from(range: CellRange) -> Self {
        Self(range)
    }
}

impl fmt::Display for PrefetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        write!(f, "{}:{}-{}:{}", r.start_row, r.start_col, r.end_row, r.end_col)
    }
}

/// Marks a prefetch as outstanding until dropped.
///
/// Dropping covers success, failure and the prefetch future itself being
/// dropped mid-flight.
struct PendingGuard<'a> {
    pending: &'a RefCell<HashSet<PrefetchKey>>,
    key: PrefetchKey,
}

impl<'a> PendingGuard<'a> {
    fn mark(pending: &'a RefCell<HashSet<PrefetchKey>>, key: PrefetchKey) -> Self {
        pending.borrow_mut().insert(key);
        Self { pending, key }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.borrow_mut().remove(&self.key);
    }
}

/// Cache of cell values in front of a [`GridStore`].
pub struct CellValueCache<S> {
    store: Rc<S>,
    /// Packed coordinate -> `Empty` or `Value`. Absent means unfetched.
    entries: RefCell<HashMap<u64, CacheEntry>>,
    pending: RefCell<HashSet<PrefetchKey>>,
    high_water: Cell<HighWaterMark>,
}

impl<S: GridStore> CellValueCache<S> {
    pub fn new(store: Rc<S>, initial_high_water: HighWaterMark) -> Self {
        Self {
            store,
            entries: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashSet::new()),
            high_water: Cell::new(initial_high_water),
        }
    }

    /// Value of a cell, reading the store only on a cache miss.
    ///
    /// Returns `None` for an empty cell. A failed read caches nothing.
    pub async fn get(&self, row: u32, col: u32) -> Result<Option<String>> {
        let cell = CellCoord::new(row, col);
        let cached = self
            .entries
            .borrow()
            .get(&cell.packed())
            .map(|entry| entry.value().map(str::to_string));
        if let Some(value) = cached {
            return Ok(value);
        }

        let key = RecordKey::Text(cell.record_id());
        let record = self
            .store
            .get(Collection::Cells, &key)
            .await
            .map_err(|e| {
                log::warn!("failed to read cell {key}: {e}");
                e
            })?;

        // A write that landed while the read was in flight wins.
        let fetched = CacheEntry::fetched(record.and_then(decode_cell).and_then(|r| r.value));
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(cell.packed()).or_insert(fetched);
        Ok(entry.value().map(str::to_string))
    }

    /// Write a cell value.
    ///
    /// The cache is updated before the store write is issued, so reads see
    /// the new value immediately. The high-water mark is persisted only after
    /// the cell write succeeds, only if it changed, and is raised in memory
    /// once that write lands.
    pub async fn set(&self, row: u32, col: u32, value: impl Into<String>) -> Result<()> {
        let cell = CellCoord::new(row, col);
        let value = value.into();
        self.entries
            .borrow_mut()
            .insert(cell.packed(), CacheEntry::fetched(Some(value.clone())));

        store::put_record(&*self.store, Collection::Cells, &CellRecord::new(cell, value)).await?;
        self.raise_high_water(cell).await
    }

    async fn raise_high_water(&self, cell: CellCoord) -> Result<()> {
        let current = self.high_water.get();
        let raised = current.raised_to(cell);
        if raised == current {
            return Ok(());
        }
        let record = HighWaterRecord::new(raised.row, raised.col);
        store::put_record(&*self.store, Collection::MaxEditedCell, &record).await?;
        // Raised only after the record is written.
        self.high_water.set(self.high_water.get().raised_to(cell));
        Ok(())
    }

    /// Non-empty values in the rectangle spanned by `start` and `end`.
    ///
    /// Cached values come first, then values fetched in one batch read for
    /// every uncached coordinate. Order within each group is unspecified.
    pub async fn get_range_values(&self, start: CellCoord, end: CellCoord) -> Result<Vec<String>> {
        let range = CellRange::from_corners(start, end);
        let mut values = Vec::new();
        let mut missing = Vec::new();
        {
            let entries = self.entries.borrow();
            for cell in range.coords() {
                match entries.get(&cell.packed()) {
                    Some(entry) => values.extend(entry.value().map(str::to_string)),
                    None => missing.push(cell),
                }
            }
        }
        if missing.is_empty() {
            return Ok(values);
        }

        let fetched = self.fetch(&missing).await?;
        self.merge(&missing, &fetched);
        values.extend(
            fetched
                .into_iter()
                .filter_map(|(_, entry)| entry.value().map(str::to_string)),
        );
        Ok(values)
    }

    /// Non-empty cached values in `range`. Never touches the store.
    pub fn visible_sync(&self, range: CellRange) -> HashMap<CellCoord, String> {
        let entries = self.entries.borrow();
        range
            .coords()
            .filter_map(|cell| {
                let value = entries.get(&cell.packed())?.value()?;
                Some((cell, value.to_string()))
            })
            .collect()
    }

    /// Warm the cache for `range`.
    ///
    /// Returns `true` when at least one newly cached value is non-empty, i.e.
    /// a redraw would show something new. Returns `false` without reading
    /// when an identical prefetch is outstanding or nothing is uncached.
    /// Entries populated while the read was in flight are left alone.
    pub async fn prefetch_range(&self, range: CellRange) -> Result<bool> {
        let key = PrefetchKey::from(range);
        if self.pending.borrow().contains(&key) {
            log::debug!("prefetch {key} already in flight");
            return Ok(false);
        }

        let missing = self.uncached(range);
        if missing.is_empty() {
            return Ok(false);
        }

        let _guard = PendingGuard::mark(&self.pending, key);
        log::debug!("prefetching {} cells for {key}", missing.len());
        let fetched = self.fetch(&missing).await?;
        Ok(self.merge(&missing, &fetched))
    }

    /// Whether the cell has been fetched or written.
    pub fn has(&self, row: u32, col: u32) -> bool {
        self.entries
            .borrow()
            .contains_key(&CellCoord::new(row, col).packed())
    }

    pub fn entry(&self, row: u32, col: u32) -> CacheEntry {
        self.entries
            .borrow()
            .get(&CellCoord::new(row, col).packed())
            .cloned()
            .unwrap_or_default()
    }

    pub fn high_water(&self) -> HighWaterMark {
        self.high_water.get()
    }

    /// Replace the high-water mark with the persisted one, if any.
    pub async fn load_high_water(&self) -> Result<HighWaterMark> {
        let key = RecordKey::from(store::records::HIGH_WATER_ID);
        let record: Option<HighWaterRecord> =
            store::get_record(&*self.store, Collection::MaxEditedCell, &key).await?;
        if let Some(record) = record {
            self.high_water.set(HighWaterMark::new(record.row, record.col));
        }
        Ok(self.high_water.get())
    }

    /// Number of cached coordinates, empty ones included.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn uncached(&self, range: CellRange) -> Vec<CellCoord> {
        let entries = self.entries.borrow();
        range
            .coords()
            .filter(|cell| !entries.contains_key(&cell.packed()))
            .collect()
    }

    /// One batch read for `cells`. Only cells the store has are returned.
    async fn fetch(&self, cells: &[CellCoord]) -> Result<Vec<(CellCoord, CacheEntry)>> {
        let keys: Vec<RecordKey> = cells
            .iter()
            .map(|cell| RecordKey::Text(cell.record_id()))
            .collect();
        let records = self
            .store
            .get_many(Collection::Cells, &keys)
            .await
            .map_err(|e| {
                log::warn!("failed to read {} cells: {e}", keys.len());
                e
            })?;

        // A malformed record is dropped on its own; `merge` caches it as empty.
        let mut fetched = Vec::with_capacity(records.len());
        for record in records {
            let Some(record) = decode_cell(record) else {
                continue;
            };
            match cell_ref::parse_record_id(&record.id) {
                Some(cell) => fetched.push((cell, CacheEntry::fetched(record.value))),
                None => log::debug!("ignoring cell record with id {:?}", record.id),
            }
        }
        Ok(fetched)
    }

    /// Cache every coordinate in `requested` that is still uncached, `Empty`
    /// unless `fetched` has it. Returns whether any new entry has a value.
    fn merge(&self, requested: &[CellCoord], fetched: &[(CellCoord, CacheEntry)]) -> bool {
        let mut found: HashMap<u64, &CacheEntry> = fetched
            .iter()
            .map(|(cell, entry)| (cell.packed(), entry))
            .collect();
        let mut entries = self.entries.borrow_mut();
        let mut loaded = false;
        for cell in requested {
            if let Entry::Vacant(slot) = entries.entry(cell.packed()) {
                let entry = found
                    .remove(&cell.packed())
                    .cloned()
                    .unwrap_or(CacheEntry::Empty);
                loaded |= entry.value().is_some();
                slot.insert(entry);
            }
        }
        loaded
    }
}

/// Typed view of a cell record, `None` (logged) when it is malformed.
fn decode_cell(record: Value) -> Option<CellRecord> {
    match store::decode::<CellRecord>(Collection::Cells, record) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("treating malformed cell record as empty: {e}");
            None
        }
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
    use crate::error::GridError;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn cache_with(records: &[(&str, &str)]) -> (Rc<MemoryStore>, CellValueCache<MemoryStore>) {
        let store = Rc::new(MemoryStore::open());
        for (id, value) in records {
            store
                .put(Collection::Cells, json!({"id": id, "value": value}))
                .await
                .unwrap();
        }
        let cache = CellValueCache::new(Rc::clone(&store), HighWaterMark::new(100, 100));
        (store, cache)
    }

    #[tokio::test]
    async fn test_get_caches_misses_as_empty() {
        let (_store, cache) = cache_with(&[("1:1", "x")]).await;
        assert_eq!(cache.get(1, 1).await.unwrap(), Some("x".to_string()));
        assert_eq!(cache.get(2, 2).await.unwrap(), None);
        assert_eq!(cache.entry(2, 2), CacheEntry::Empty);
        assert_eq!(cache.entry(3, 3), CacheEntry::Unfetched);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_string_reads_as_empty() {
        let (_store, cache) = cache_with(&[("0:0", "")]).await;
        assert_eq!(cache.get(0, 0).await.unwrap(), None);
        assert_eq!(cache.entry(0, 0), CacheEntry::Empty);
    }

    #[tokio::test]
    async fn test_set_is_read_your_writes() {
        let (store, cache) = cache_with(&[]).await;
        cache.set(0, 0, "42").await.unwrap();
        store.close();
        // Served from cache even though the store is now unavailable.
        assert_eq!(cache.get(0, 0).await.unwrap(), Some("42".to_string()));
    }

    #[tokio::test]
    async fn test_set_raises_and_persists_high_water() {
        let (store, cache) = cache_with(&[]).await;
        cache.set(5, 5, "a").await.unwrap();
        assert_eq!(store.record_count(Collection::MaxEditedCell), 0);

        cache.set(250, 7, "b").await.unwrap();
        assert_eq!(cache.high_water(), HighWaterMark::new(250, 100));
        let record = store
            .get(Collection::MaxEditedCell, &RecordKey::from("maxEdited"))
            .await
            .unwrap();
        assert_eq!(record, Some(json!({"id": "maxEdited", "row": 250, "col": 100})));
    }

    #[tokio::test]
    async fn test_load_high_water() {
        let (store, cache) = cache_with(&[]).await;
        assert_eq!(cache.load_high_water().await.unwrap(), HighWaterMark::new(100, 100));
        store
            .put(
                Collection::MaxEditedCell,
                json!({"id": "maxEdited", "row": 7, "col": 300}),
            )
            .await
            .unwrap();
        assert_eq!(cache.load_high_water().await.unwrap(), HighWaterMark::new(7, 300));
    }

    #[tokio::test]
    async fn test_get_range_values_mixes_cached_and_fetched() {
        let (_store, cache) = cache_with(&[("0:1", "10"), ("1:1", "")]).await;
        cache.set(0, 0, "").await.unwrap();
        let values = cache
            .get_range_values(CellCoord::new(0, 0), CellCoord::new(1, 1))
            .await
            .unwrap();
        assert_eq!(values, vec!["10".to_string()]);
        // Every coordinate in the range is now cached.
        assert!(cache.has(1, 0));
        assert_eq!(cache.entry(1, 1), CacheEntry::Empty);
    }

    #[tokio::test]
    async fn test_visible_sync_skips_empty_and_unfetched() {
        let (_store, cache) = cache_with(&[]).await;
        cache.set(0, 0, "a").await.unwrap();
        cache.set(0, 1, "").await.unwrap();
        let visible = cache.visible_sync(CellRange::new(0, 2, 0, 2));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[&CellCoord::new(0, 0)], "a");
    }

    #[tokio::test]
    async fn test_prefetch_reports_new_values() {
        let (_store, cache) = cache_with(&[("3:3", "v")]).await;
        let range = CellRange::new(0, 4, 0, 4);
        assert!(cache.prefetch_range(range).await.unwrap());
        assert_eq!(cache.len(), 25);
        // Fully cached now.
        assert!(!cache.prefetch_range(range).await.unwrap());
    }

    #[tokio::test]
    async fn test_prefetch_of_empty_region_reports_nothing_new() {
        let (_store, cache) = cache_with(&[]).await;
        assert!(!cache.prefetch_range(CellRange::new(0, 1, 0, 1)).await.unwrap());
        assert_eq!(cache.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_prefetch_caches_nothing_and_clears_marker() {
        let (store, cache) = cache_with(&[]).await;
        store.close();
        let range = CellRange::new(0, 1, 0, 1);
        assert!(matches!(
            cache.prefetch_range(range).await,
            Err(GridError::StoreUnavailable(_))
        ));
        assert!(cache.is_empty());
        assert!(cache.pending.borrow().is_empty());
    }

    #[test]
    fn test_prefetch_key_display() {
        let key = PrefetchKey::from(CellRange::new(1, 3, 2, 4));
        assert_eq!(key.to_string(), "1:2-3:4");
    }
}
