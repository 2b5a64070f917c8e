//! Cell cache behaviour against an instrumented store: read counts,
//! concurrent prefetches, failures and write ordering.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;

use std::rc::Rc;
use std::time::Duration;

use common::ProbeStore;
use sparsegrid::{CacheEntry, CellCoord, CellRange, CellValueCache, Collection, GridError, HighWaterMark};

fn cache_over(store: &Rc<ProbeStore>) -> CellValueCache<ProbeStore> {
    CellValueCache::new(Rc::clone(store), HighWaterMark::new(100, 100))
}

#[tokio::test]
async fn set_then_get_needs_no_reads() {
    let store = Rc::new(ProbeStore::new());
    let cache = cache_over(&store);
    cache.set(0, 0, "42").await.unwrap();
    assert_eq!(cache.get(0, 0).await.unwrap(), Some("42".to_string()));
    assert_eq!(store.reads(), 0);
    assert_eq!(store.puts.get(), 1);
}

#[tokio::test]
async fn cached_empty_is_not_refetched() {
    let store = Rc::new(ProbeStore::new());
    let cache = cache_over(&store);
    assert_eq!(cache.get(7, 7).await.unwrap(), None);
    assert_eq!(cache.get(7, 7).await.unwrap(), None);
    assert_eq!(store.gets.get(), 1);
}

#[tokio::test]
async fn range_values_skip_cached_empty_and_fetch_the_rest() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(0, 1, "10").await;
    let cache = cache_over(&store);
    cache.set(0, 0, "").await.unwrap();

    let values = cache
        .get_range_values(CellCoord::new(0, 0), CellCoord::new(0, 1))
        .await
        .unwrap();
    assert_eq!(values, vec!["10".to_string()]);
    assert_eq!(store.get_manys.get(), 1);

    // Second call is served entirely from cache.
    let again = cache
        .get_range_values(CellCoord::new(0, 0), CellCoord::new(0, 1))
        .await
        .unwrap();
    assert_eq!(again, vec!["10".to_string()]);
    assert_eq!(store.get_manys.get(), 1);
}

#[tokio::test]
async fn range_values_accept_corners_in_any_order() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(2, 2, "x").await;
    store.seed_cell(3, 1, "y").await;
    let cache = cache_over(&store);
    let mut values = cache
        .get_range_values(CellCoord::new(3, 2), CellCoord::new(2, 1))
        .await
        .unwrap();
    values.sort();
    assert_eq!(values, ["x", "y"]);
}

#[tokio::test]
async fn identical_prefetches_collapse_into_one_read() {
    let store = Rc::new(ProbeStore::yielding());
    store.seed_cell(1, 1, "v").await;
    let cache = cache_over(&store);
    let range = CellRange::new(0, 3, 0, 3);

    let (first, second) = tokio::join!(cache.prefetch_range(range), cache.prefetch_range(range));
    assert!(first.unwrap());
    assert!(!second.unwrap());
    assert_eq!(store.get_manys.get(), 1);
    assert_eq!(cache.len(), 16);
}

#[tokio::test]
async fn different_prefetches_both_read() {
    let store = Rc::new(ProbeStore::yielding());
    let cache = cache_over(&store);
    let (a, b) = tokio::join!(
        cache.prefetch_range(CellRange::new(0, 1, 0, 1)),
        cache.prefetch_range(CellRange::new(0, 2, 0, 2)),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(store.get_manys.get(), 2);
    assert_eq!(cache.len(), 9);
}

#[tokio::test]
async fn prefetch_does_not_overwrite_concurrent_write() {
    let store = Rc::new(ProbeStore::yielding());
    store.seed_cell(0, 0, "stale").await;
    let cache = cache_over(&store);

    let (prefetched, written) = tokio::join!(
        cache.prefetch_range(CellRange::new(0, 0, 0, 1)),
        cache.set(0, 0, "fresh"),
    );
    written.unwrap();
    // The only stored value belonged to a coordinate that was written meanwhile.
    assert!(!prefetched.unwrap());
    assert_eq!(cache.entry(0, 0), CacheEntry::Value("fresh".into()));
    assert_eq!(cache.entry(0, 1), CacheEntry::Empty);
}

#[tokio::test]
async fn dropped_prefetch_releases_its_key() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(0, 0, "v").await;
    let cache = cache_over(&store);
    let range = CellRange::new(0, 1, 0, 1);

    store.set_stalled(true);
    let timed_out = tokio::time::timeout(Duration::from_millis(10), cache.prefetch_range(range)).await;
    assert!(timed_out.is_err());
    assert!(cache.is_empty());

    store.set_stalled(false);
    assert!(cache.prefetch_range(range).await.unwrap());
    assert_eq!(store.get_manys.get(), 2);
}

#[tokio::test]
async fn failed_reads_leave_cells_unfetched() {
    let store = Rc::new(ProbeStore::new());
    let cache = cache_over(&store);
    store.set_fail_reads(true);

    let err = cache.get(1, 1).await.unwrap_err();
    assert!(matches!(
        err,
        GridError::StoreOperationFailed {
            operation: "get",
            collection: Collection::Cells,
            ..
        }
    ));
    assert!(cache
        .prefetch_range(CellRange::new(0, 2, 0, 2))
        .await
        .is_err());
    assert!(cache.is_empty());
    assert_eq!(cache.entry(1, 1), CacheEntry::Unfetched);

    // No retry happens on its own; the next call reads again.
    store.set_fail_reads(false);
    assert_eq!(cache.get(1, 1).await.unwrap(), None);
    assert_eq!(store.gets.get(), 2);
}

#[tokio::test]
async fn failed_write_keeps_cached_value_and_high_water() {
    let store = Rc::new(ProbeStore::new());
    let cache = cache_over(&store);
    store.set_fail_writes(true);

    assert!(cache.set(500, 3, "x").await.is_err());
    assert_eq!(cache.entry(500, 3), CacheEntry::Value("x".into()));
    assert_eq!(cache.high_water(), HighWaterMark::new(100, 100));
}

#[tokio::test]
async fn high_water_is_persisted_only_on_change() {
    let store = Rc::new(ProbeStore::new());
    let cache = cache_over(&store);
    cache.set(150, 2, "a").await.unwrap();
    cache.set(120, 200, "b").await.unwrap();
    cache.set(3, 3, "c").await.unwrap();

    assert_eq!(cache.high_water(), HighWaterMark::new(150, 200));
    // Three cell writes plus two high-water writes.
    assert_eq!(store.puts.get(), 5);
    let record = store.peek(Collection::MaxEditedCell, "maxEdited").await.unwrap();
    assert_eq!(record["row"], 150);
    assert_eq!(record["col"], 200);
}

#[tokio::test]
async fn visible_sync_never_reads() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(0, 0, "stored").await;
    let cache = cache_over(&store);
    assert!(cache.visible_sync(CellRange::new(0, 10, 0, 10)).is_empty());
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn malformed_record_does_not_spoil_its_neighbours() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(0, 0, "visible").await;
    store
        .seed(Collection::Cells, serde_json::json!({"id": "2:2", "value": 5}))
        .await;
    let cache = cache_over(&store);
    let range = CellRange::new(0, 3, 0, 3);

    assert!(cache.prefetch_range(range).await.unwrap());
    assert_eq!(cache.len(), 16);
    assert_eq!(cache.entry(0, 0), CacheEntry::Value("visible".into()));
    assert_eq!(cache.entry(2, 2), CacheEntry::Empty);
    assert_eq!(cache.visible_sync(range).len(), 1);

    let values = cache
        .get_range_values(CellCoord::new(0, 0), CellCoord::new(3, 3))
        .await
        .unwrap();
    assert_eq!(values, ["visible"]);
    assert_eq!(store.get_manys.get(), 1);
}

#[tokio::test]
async fn malformed_record_reads_as_empty_on_single_get() {
    let store = Rc::new(ProbeStore::new());
    store
        .seed(Collection::Cells, serde_json::json!({"id": "4:4", "value": ["x"]}))
        .await;
    let cache = cache_over(&store);
    assert_eq!(cache.get(4, 4).await.unwrap(), None);
    assert_eq!(cache.entry(4, 4), CacheEntry::Empty);
}

#[tokio::test]
async fn failed_high_water_write_is_retried_by_next_edit() {
    let store = Rc::new(ProbeStore::new());
    let cache = cache_over(&store);

    store.set_fail_writes_to(Some(Collection::MaxEditedCell));
    assert!(cache.set(300, 0, "a").await.is_err());
    assert_eq!(cache.entry(300, 0), CacheEntry::Value("a".into()));
    assert_eq!(cache.high_water(), HighWaterMark::new(100, 100));
    assert_eq!(store.peek(Collection::MaxEditedCell, "maxEdited").await, None);

    // An edit that raises the mark no further than the lost one still persists it.
    store.set_fail_writes_to(None);
    cache.set(250, 0, "b").await.unwrap();
    assert_eq!(cache.high_water(), HighWaterMark::new(250, 100));
    cache.set(300, 0, "a").await.unwrap();
    assert_eq!(cache.high_water(), HighWaterMark::new(300, 100));
    let record = store.peek(Collection::MaxEditedCell, "maxEdited").await.unwrap();
    assert_eq!(record["row"], 300);
}
