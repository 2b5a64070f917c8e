//! Undo/redo through the grid, checked against what the store ends up holding.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;

use std::rc::Rc;

use common::{grid_over, ProbeStore};
use serde_json::json;
use sparsegrid::Collection;

#[tokio::test]
async fn edit_undo_redo_sequence() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);

    grid.commit_cell_edit(0, 0, "", "1").await.unwrap();
    grid.commit_cell_edit(0, 0, "1", "2").await.unwrap();
    assert_eq!(grid.cell_value(0, 0).await.unwrap().as_deref(), Some("2"));

    assert!(grid.undo().await.unwrap());
    assert_eq!(grid.cell_value(0, 0).await.unwrap().as_deref(), Some("1"));
    assert!(grid.undo().await.unwrap());
    assert_eq!(grid.cell_value(0, 0).await.unwrap(), None);
    // Undoing back to empty still writes a record, with an empty value.
    assert_eq!(
        store.peek(Collection::Cells, "0:0").await,
        Some(json!({"id": "0:0", "value": ""}))
    );

    assert!(grid.redo().await.unwrap());
    assert_eq!(grid.cell_value(0, 0).await.unwrap().as_deref(), Some("1"));
    assert_eq!(grid.history().redo_len(), 1);

    // A new edit discards what was left to redo.
    grid.commit_cell_edit(1, 1, "", "B").await.unwrap();
    assert!(!grid.history().can_redo());
    assert!(!grid.redo().await.unwrap());
    assert_eq!(grid.cell_value(0, 0).await.unwrap().as_deref(), Some("1"));
    assert_eq!(
        store.peek(Collection::Cells, "1:1").await,
        Some(json!({"id": "1:1", "value": "B"}))
    );
    // Values come from the cache; the store was never read.
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn nothing_to_undo_or_redo() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    assert!(!grid.undo().await.unwrap());
    assert!(!grid.redo().await.unwrap());
    assert_eq!(store.puts.get(), 0);
}

#[tokio::test]
async fn resize_undo_redo_persists_each_step() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);

    assert!(grid.resize_column(2, 120.0).await.unwrap());
    assert!(grid.resize_row(4, 40.0).await.unwrap());
    assert_eq!(grid.columns().position(3, 42.0), 42.0 + 2.0 * 65.0 + 120.0);

    assert!(grid.undo().await.unwrap());
    assert_eq!(grid.rows().size(4), 23.0);
    assert_eq!(
        store.peek(Collection::RowHeights, 4_u32).await,
        Some(json!({"id": 4, "height": 23.0}))
    );

    assert!(grid.undo().await.unwrap());
    assert_eq!(grid.columns().size(2), 65.0);

    assert!(grid.redo().await.unwrap());
    assert_eq!(grid.columns().size(2), 120.0);
    assert_eq!(
        store.peek(Collection::ColumnWidths, 2_u32).await,
        Some(json!({"id": 2, "width": 120.0}))
    );
}

#[tokio::test]
async fn failed_edit_is_still_recorded() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    store.set_fail_writes(true);

    assert!(grid.commit_cell_edit(0, 0, "", "x").await.is_err());
    // The cache took the value and the command is on the undo stack.
    assert_eq!(grid.cell_value(0, 0).await.unwrap().as_deref(), Some("x"));
    assert!(grid.history().can_undo());

    store.set_fail_writes(false);
    assert!(grid.undo().await.unwrap());
    assert_eq!(grid.cell_value(0, 0).await.unwrap(), None);
}

#[tokio::test]
async fn edits_request_a_redraw() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    grid.take_redraw_request();

    grid.commit_cell_edit(3, 3, "", "v").await.unwrap();
    assert!(grid.take_redraw_request());
    assert!(!grid.take_redraw_request());

    grid.undo().await.unwrap();
    assert!(grid.take_redraw_request());
}
