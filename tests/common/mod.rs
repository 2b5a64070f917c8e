//! Common test utilities: an instrumented store and grid builders.
//!
//! `ProbeStore` wraps a `MemoryStore` and can count calls, yield to the
//! scheduler before each call (so `tokio::join!` interleaves), stall forever,
//! or fail reads and writes on demand.
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

use std::cell::Cell;
use std::rc::Rc;

use serde_json::{json, Value};
use sparsegrid::{Collection, Grid, GridConfig, GridError, GridStore, MemoryStore, RecordKey, Result};

#[derive(Debug, Default)]
pub struct ProbeStore {
    inner: MemoryStore,
    pub gets: Cell<usize>,
    pub get_alls: Cell<usize>,
    pub get_manys: Cell<usize>,
    pub puts: Cell<usize>,
    yielding: Cell<bool>,
    stalled: Cell<bool>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    fail_writes_to: Cell<Option<Collection>>,
}

impl ProbeStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::open(),
            ..Self::default()
        }
    }

    /// A store that yields once before every operation.
    pub fn yielding() -> Self {
        let store = Self::new();
        store.yielding.set(true);
        store
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.set(stalled);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Fail writes to one collection only.
    pub fn set_fail_writes_to(&self, collection: Option<Collection>) {
        self.fail_writes_to.set(collection);
    }

    pub fn reads(&self) -> usize {
        self.gets.get() + self.get_alls.get() + self.get_manys.get()
    }

    pub fn reset_counts(&self) {
        self.gets.set(0);
        self.get_alls.set(0);
        self.get_manys.set(0);
        self.puts.set(0);
    }

    /// Put a cell record directly, bypassing the counters.
    pub async fn seed_cell(&self, row: u32, col: u32, value: &str) {
        self.inner
            .put(Collection::Cells, json!({"id": format!("{row}:{col}"), "value": value}))
            .await
            .unwrap();
    }

    pub async fn seed(&self, collection: Collection, record: Value) {
        self.inner.put(collection, record).await.unwrap();
    }

    /// Read a record directly, bypassing the counters.
    pub async fn peek(&self, collection: Collection, key: impl Into<RecordKey>) -> Option<Value> {
        self.inner.get(collection, &key.into()).await.unwrap()
    }

    async fn pause(&self) {
        if self.stalled.get() {
            std::future::pending::<()>().await;
        }
        if self.yielding.get() {
            tokio::task::yield_now().await;
        }
    }

    fn check(&self, fail: bool, operation: &'static str, collection: Collection) -> Result<()> {
        if fail {
            Err(GridError::StoreOperationFailed {
                operation,
                collection,
                message: "injected failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

impl GridStore for ProbeStore {
    async fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>> {
        bump(&self.gets);
        self.pause().await;
        self.check(self.fail_reads.get(), "get", collection)?;
        self.inner.get(collection, key).await
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        bump(&self.get_alls);
        self.pause().await;
        self.check(self.fail_reads.get(), "get_all", collection)?;
        self.inner.get_all(collection).await
    }

    async fn get_many(&self, collection: Collection, keys: &[RecordKey]) -> Result<Vec<Value>> {
        bump(&self.get_manys);
        self.pause().await;
        self.check(self.fail_reads.get(), "get_many", collection)?;
        self.inner.get_many(collection, keys).await
    }

    async fn put(&self, collection: Collection, record: Value) -> Result<()> {
        bump(&self.puts);
        self.pause().await;
        let fail = self.fail_writes.get() || self.fail_writes_to.get() == Some(collection);
        self.check(fail, "put", collection)?;
        self.inner.put(collection, record).await
    }
}

/// Default-config grid over `store`, sized 800x600.
pub fn grid_over(store: &Rc<ProbeStore>) -> Grid<ProbeStore> {
    let grid = Grid::new(GridConfig::default(), Rc::clone(store)).unwrap();
    grid.set_viewport_size(800.0, 600.0);
    grid
}
