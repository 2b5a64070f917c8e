//! Structured error types for sparsegrid.
//!
//! Only the store-facing paths are fallible. Axis and selection queries take
//! structurally valid input and never fail.

use crate::store::Collection;

/// All errors that can surface from the grid core.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The store handle was never opened, or has been closed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An individual get/get_all/get_many/put was rejected by the store.
    #[error("Store {operation} on {collection} failed: {message}")]
    StoreOperationFailed {
        operation: &'static str,
        collection: Collection,
        message: String,
    },

    /// A record read from the store does not have the expected shape.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// JSON (de)serialization error from serde_json.
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GridError {
    pub(crate) fn operation_failed(
        operation: &'static str,
        collection: Collection,
        message: impl Into<String>,
    ) -> Self {
        Self::StoreOperationFailed {
            operation,
            collection,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(target_arch = "wasm32")]
impl From<GridError> for wasm_bindgen::JsValue {
    fn from(e: GridError) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}
