//! sparsegrid - virtualized sparse grid core for the web
//!
//! Addressing, caching, selection and undo/redo for a very large, mostly
//! empty spreadsheet-style grid whose data lives in a persistent store:
//! - Sparse per-axis size overrides with exact position/index hit-testing
//! - Write-through, null-caching cell cache with deduplicated range prefetch
//! - Cell, row, column and range selection with anchor/focus semantics
//! - Linear undo/redo over edits and resizes
//! - IndexedDB persistence in the browser, an in-memory store elsewhere
//!
//! Painting and event wiring stay with the host.
//!
//! # Usage (Rust)
//!
//! ```ignore
//! let grid = Grid::new(GridConfig::default(), Rc::new(MemoryStore::open()))?;
//! grid.load().await?;
//! grid.set_viewport_size(800.0, 600.0);
//! grid.commit_cell_edit(0, 0, "", "42").await?;
//! let frame = grid.frame();
//! ```

pub mod cache;
pub mod cell_ref;
pub mod config;
pub mod editor;
pub mod error;
pub mod grid;
pub mod layout;
pub mod selection;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

use wasm_bindgen::prelude::*;

pub use cache::{CellValueCache, HighWaterMark};
pub use config::GridConfig;
pub use editor::{Command, CommandHistory, EditCellCommand, ResizeColumnCommand, ResizeRowCommand};
pub use error::{GridError, Result};
pub use grid::{Frame, Grid};
pub use layout::{AxisIndex, AxisKind, PersistedAxis, Viewport};
pub use selection::{GridBounds, SelectionModel};
pub use stats::RangeStats;
pub use store::{Collection, GridStore, MemoryStore, RecordKey};
pub use types::*;

#[cfg(target_arch = "wasm32")]
pub use store::IndexedDbStore;
#[cfg(target_arch = "wasm32")]
pub use wasm::GridHandle;

/// Get the library version
#[must_use]
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
