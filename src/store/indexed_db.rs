//! IndexedDB-backed [`GridStore`] for browser hosts (wasm32 only).
//!
//! Each [`Collection`] maps to one object store with key path `id`. Requests
//! are bridged to futures by wrapping their success/error events in a
//! `Promise`; the handlers are attached when the request is issued, so a
//! batch can issue every read inside one transaction before awaiting any.

use std::cell::RefCell;

use js_sys::{Array, Function, Promise};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Event, IdbDatabase, IdbObjectStore, IdbObjectStoreParameters, IdbOpenDbRequest, IdbRequest,
    IdbTransactionMode, IdbVersionChangeEvent,
};

use super::{Collection, GridStore, RecordKey};
use crate::error::{GridError, Result};

/// Database name used by [`IndexedDbStore::open_default`].
pub const DEFAULT_DB_NAME: &str = "GridDB";

/// Schema version; bumping it re-runs the upgrade that creates missing stores.
pub const DB_VERSION: u32 = 3;

/// Handle to an open IndexedDB database.
pub struct IndexedDbStore {
    db: RefCell<Option<IdbDatabase>>,
}

impl IndexedDbStore {
    /// Open [`DEFAULT_DB_NAME`].
    pub async fn open_default() -> Result<Self> {
        Self::open(DEFAULT_DB_NAME).await
    }

    /// Open (and if needed create or upgrade) the named database.
    pub async fn open(name: &str) -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| GridError::StoreUnavailable("no window object".into()))?;
        let factory = window
            .indexed_db()
            .map_err(|e| unavailable(&e))?
            .ok_or_else(|| GridError::StoreUnavailable("IndexedDB is not supported".into()))?;
        let request: IdbOpenDbRequest = factory
            .open_with_u32(name, DB_VERSION)
            .map_err(|e| unavailable(&e))?;

        let on_upgrade = Closure::<dyn FnMut(IdbVersionChangeEvent)>::new(
            |event: IdbVersionChangeEvent| create_missing_stores(&event),
        );
        request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

        let opened = request_future(&request).await;
        request.set_onupgradeneeded(None);
        drop(on_upgrade);

        let db = opened
            .map_err(|e| unavailable(&e))?
            .dyn_into::<IdbDatabase>()
            .map_err(|_| GridError::StoreUnavailable("open did not yield a database".into()))?;
        log::info!("opened IndexedDB store {name} (version {DB_VERSION})");
        Ok(Self {
            db: RefCell::new(Some(db)),
        })
    }

    /// Close the database. Later operations fail with `StoreUnavailable`.
    pub fn close(&self) {
        if let Some(db) = self.db.borrow_mut().take() {
            db.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.db.borrow().is_some()
    }

    fn object_store(
        &self,
        collection: Collection,
        mode: IdbTransactionMode,
        operation: &'static str,
    ) -> Result<IdbObjectStore> {
        let db = self
            .db
            .borrow()
            .clone()
            .ok_or_else(|| GridError::StoreUnavailable("IndexedDB store is closed".into()))?;
        let transaction = db
            .transaction_with_str_and_mode(collection.name(), mode)
            .map_err(|e| failed(operation, collection, &e))?;
        transaction
            .object_store(collection.name())
            .map_err(|e| failed(operation, collection, &e))
    }
}

impl GridStore for IndexedDbStore {
    async fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>> {
        let store = self.object_store(collection, IdbTransactionMode::Readonly, "get")?;
        let request = store
            .get(&key_to_js(key))
            .map_err(|e| failed("get", collection, &e))?;
        let result = request_future(&request)
            .await
            .map_err(|e| failed("get", collection, &e))?;
        record_from_js(collection, result)
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let store = self.object_store(collection, IdbTransactionMode::Readonly, "get_all")?;
        let request = store
            .get_all()
            .map_err(|e| failed("get_all", collection, &e))?;
        let result = request_future(&request)
            .await
            .map_err(|e| failed("get_all", collection, &e))?;
        let items = result
            .dyn_into::<Array>()
            .map_err(|_| failed("get_all", collection, &JsValue::from_str("result is not an array")))?;

        let mut records = Vec::new();
        for item in items.iter() {
            if let Some(record) = record_from_js(collection, item)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn get_many(&self, collection: Collection, keys: &[RecordKey]) -> Result<Vec<Value>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let store = self.object_store(collection, IdbTransactionMode::Readonly, "get_many")?;
        let pending = keys
            .iter()
            .map(|key| store.get(&key_to_js(key)).map(|request| request_future(&request)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| failed("get_many", collection, &e))?;

        let mut records = Vec::new();
        for future in pending {
            let result = future
                .await
                .map_err(|e| failed("get_many", collection, &e))?;
            if let Some(record) = record_from_js(collection, result)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn put(&self, collection: Collection, record: Value) -> Result<()> {
        let value = record
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| GridError::InvalidRecord(format!("{collection}: {e}")))?;
        let store = self.object_store(collection, IdbTransactionMode::Readwrite, "put")?;
        let request = store
            .put(&value)
            .map_err(|e| failed("put", collection, &e))?;
        request_future(&request)
            .await
            .map_err(|e| failed("put", collection, &e))?;
        Ok(())
    }
}

/// Create any object store missing from the database being upgraded.
fn create_missing_stores(event: &IdbVersionChangeEvent) {
    let Some(request) = event
        .target()
        .and_then(|target| target.dyn_into::<IdbOpenDbRequest>().ok())
    else {
        return;
    };
    let Ok(db) = request
        .result()
        .and_then(|result| result.dyn_into::<IdbDatabase>())
    else {
        return;
    };

    let existing = db.object_store_names();
    for collection in Collection::ALL {
        if existing.contains(collection.name()) {
            continue;
        }
        let params = IdbObjectStoreParameters::new();
        params.set_key_path(&JsValue::from_str("id"));
        if let Err(e) = db.create_object_store_with_optional_parameters(collection.name(), &params) {
            log::warn!("failed to create object store {collection}: {e:?}");
        }
    }
}

/// Future that settles with the request's result or error.
///
/// Handlers are attached immediately; the returned future may be awaited later.
fn request_future(request: &IdbRequest) -> JsFuture {
    let promise = Promise::new(&mut |resolve: Function, reject: Function| {
        let source = request.clone();
        let on_success = Closure::once_into_js(move |_event: Event| {
            let result = source.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::NULL, &result);
        });
        let source = request.clone();
        let on_error = Closure::once_into_js(move |_event: Event| {
            let error = source
                .error()
                .ok()
                .flatten()
                .map_or_else(|| JsValue::from_str("request failed"), JsValue::from);
            let _ = reject.call1(&JsValue::NULL, &error);
        });
        request.set_onsuccess(Some(on_success.unchecked_ref()));
        request.set_onerror(Some(on_error.unchecked_ref()));
    });
    JsFuture::from(promise)
}

fn key_to_js(key: &RecordKey) -> JsValue {
    match key {
        RecordKey::Text(s) => JsValue::from_str(s),
        RecordKey::Index(i) => JsValue::from_f64(f64::from(*i)),
    }
}

fn record_from_js(collection: Collection, value: JsValue) -> Result<Option<Value>> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(value)
        .map(Some)
        .map_err(|e| GridError::InvalidRecord(format!("{collection}: {e}")))
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn unavailable(value: &JsValue) -> GridError {
    GridError::StoreUnavailable(describe(value))
}

fn failed(operation: &'static str, collection: Collection, value: &JsValue) -> GridError {
    let message = describe(value);
    log::warn!("IndexedDB {operation} on {collection} failed: {message}");
    GridError::operation_failed(operation, collection, message)
}
