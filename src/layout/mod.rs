//! Layout engine: axis sizes, positions and viewport state.
//!
//! This module handles:
//! - Sparse per-axis size overrides and position/index queries
//! - Persisting overrides to the store
//! - Scroll state and the visible cell range

mod axis_index;
mod persisted;
mod viewport;

pub use axis_index::AxisIndex;
pub use persisted::{AxisKind, PersistedAxis};
pub use viewport::Viewport;
