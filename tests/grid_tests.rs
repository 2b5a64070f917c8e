//! End-to-end grid scenarios over an instrumented in-memory store.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{grid_over, ProbeStore};
use serde_json::json;
use sparsegrid::{
    CellCoord, CellRange, Collection, Direction, Grid, GridConfig, HighWaterMark, Selection, SelectionMode,
};

#[tokio::test]
async fn load_restores_sizes_and_high_water() {
    let store = Rc::new(ProbeStore::new());
    store
        .seed(Collection::ColumnWidths, json!({"id": 1, "width": 100.0}))
        .await;
    store
        .seed(Collection::RowHeights, json!({"id": 0, "height": 50.0}))
        .await;
    store
        .seed(
            Collection::MaxEditedCell,
            json!({"id": "maxEdited", "row": 500, "col": 20}),
        )
        .await;

    let grid = grid_over(&store);
    grid.load().await.unwrap();

    assert_eq!(grid.columns().size(1), 100.0);
    assert_eq!(grid.columns().position(2, 42.0), 42.0 + 65.0 + 100.0);
    assert_eq!(grid.rows().position(1, 30.0), 80.0);
    assert_eq!(grid.cache().high_water(), HighWaterMark::new(500, 20));
    assert_eq!(grid.effective_max_row(), 500);
    assert!(grid.visible_range().end_col < 20);
    assert_eq!(grid.effective_max_col(), 20);
    assert_eq!(store.get_alls.get(), 2);
    assert_eq!(store.gets.get(), 1);
}

#[tokio::test]
async fn load_of_empty_store_keeps_defaults() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    grid.load().await.unwrap();
    assert_eq!(grid.cache().high_water(), HighWaterMark::new(100, 100));
    assert_eq!(grid.columns().size(0), 65.0);
    assert_eq!(grid.rows().size(0), 23.0);
}

#[tokio::test]
async fn load_rejects_malformed_records() {
    let store = Rc::new(ProbeStore::new());
    store
        .seed(Collection::ColumnWidths, json!({"id": 1, "width": "wide"}))
        .await;
    let grid = grid_over(&store);
    assert!(matches!(
        grid.load().await,
        Err(sparsegrid::GridError::InvalidRecord(_))
    ));
}

#[tokio::test]
async fn prefetch_then_paint() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(0, 0, "a").await;
    store.seed_cell(5, 5, "b").await;
    store.seed_cell(200, 0, "far").await;
    let grid = grid_over(&store);

    assert!(grid.frame().cells.is_empty());
    assert!(grid.prefetch_visible().await);
    assert!(grid.take_redraw_request());

    let frame = grid.frame();
    assert_eq!(frame.range, CellRange::new(0, 29, 0, 16));
    assert_eq!(frame.cells.len(), 2);
    assert_eq!(frame.cells[&CellCoord::new(5, 5)], "b");

    // Everything visible is cached now, empties included.
    assert!(!grid.prefetch_visible().await);
    assert_eq!(store.get_manys.get(), 1);
}

#[tokio::test]
async fn scrolled_prefetch_reads_only_new_cells() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(40, 0, "below").await;
    let grid = grid_over(&store);

    assert!(!grid.prefetch_visible().await);
    grid.scroll_by(0.0, 23.0 * 20.0);
    assert!(grid.prefetch_visible().await);
    assert_eq!(store.get_manys.get(), 2);
    assert_eq!(grid.frame().cells[&CellCoord::new(40, 0)], "below");
}

#[tokio::test]
async fn failing_prefetch_reports_no_redraw() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(1, 1, "x").await;
    let grid = grid_over(&store);
    grid.take_redraw_request();

    store.set_fail_reads(true);
    assert!(!grid.prefetch_visible().await);
    assert!(!grid.take_redraw_request());
    assert!(grid.cache().is_empty());

    store.set_fail_reads(false);
    assert!(grid.prefetch_visible().await);
}

#[tokio::test]
async fn selection_stats_over_mixed_values() {
    let store = Rc::new(ProbeStore::new());
    store.seed_cell(0, 0, "10").await;
    store.seed_cell(1, 0, "20").await;
    store.seed_cell(2, 0, "abc").await;
    let grid = grid_over(&store);

    assert_eq!(grid.selection_stats().await.unwrap().count, 0);

    grid.set_anchor(0, 0, false);
    grid.extend_to(Some(3), Some(0));
    let stats = grid.selection_stats().await.unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.numeric_count, 2);
    assert_eq!(stats.sum, 30.0);
    assert_eq!(stats.average, Some(15.0));
    assert_eq!(stats.min, Some(10.0));
    assert_eq!(stats.max, Some(20.0));

    // Served from cache the second time.
    grid.selection_stats().await.unwrap();
    assert_eq!(store.get_manys.get(), 1);
}

#[tokio::test]
async fn stats_see_unsaved_edits() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    grid.commit_cell_edit(0, 0, "", "4").await.unwrap();
    grid.commit_cell_edit(0, 1, "", "6").await.unwrap();
    grid.select_row(0, false);
    let stats = grid.selection_stats().await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.average, Some(5.0));
}

#[test]
fn row_selection_ignores_column_only_extension() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);

    grid.select_row(5, false);
    let selected = Selection::Range(CellRange::new(5, 5, 0, 100));
    assert_eq!(grid.selection(), Some(selected));
    assert_eq!(grid.selection_mode(), SelectionMode::Row);

    // Pointer over the row header: no row coordinate.
    grid.extend_to(None, Some(3));
    assert_eq!(grid.selection(), Some(selected));

    grid.extend_to(Some(8), None);
    assert_eq!(
        grid.selection(),
        Some(Selection::Range(CellRange::new(5, 8, 0, 100)))
    );
    assert_eq!(grid.active_cell(), Some(CellCoord::new(5, 0)));
    assert_eq!(grid.focus_cell(), Some(CellCoord::new(8, 0)));
}

#[test]
fn column_selection_grows_as_rows_scroll_into_view() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    grid.on_selection_change(move |selection| sink.borrow_mut().push(selection.copied()));

    grid.select_col(3, false);
    assert_eq!(
        grid.selection(),
        Some(Selection::Range(CellRange::new(0, 100, 3, 3)))
    );

    // Nothing changed yet, so painting does not notify.
    grid.frame();
    assert_eq!(seen.borrow().len(), 1);

    grid.scroll_to(0.0, f64::MAX);
    let end_row = grid.visible_range().end_row;
    assert!(end_row > 100);
    grid.frame();
    let grown = Some(Selection::Range(CellRange::new(0, end_row, 3, 3)));
    assert_eq!(grid.selection(), grown);
    assert_eq!(*seen.borrow(), [Some(Selection::Range(CellRange::new(0, 100, 3, 3))), grown]);
}

#[tokio::test]
async fn editing_the_active_cell_reannounces_the_selection() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    let events = Rc::new(RefCell::new(0_usize));
    let sink = Rc::clone(&events);
    grid.on_selection_change(move |_| *sink.borrow_mut() += 1);

    grid.set_anchor(2, 2, false);
    assert_eq!(*events.borrow(), 1);

    grid.commit_cell_edit(2, 2, "", "x").await.unwrap();
    assert_eq!(*events.borrow(), 2);

    grid.commit_cell_edit(7, 7, "", "y").await.unwrap();
    assert_eq!(*events.borrow(), 2);

    grid.undo().await.unwrap();
    grid.undo().await.unwrap();
    assert_eq!(*events.borrow(), 3);
}

#[tokio::test]
async fn edits_beyond_high_water_extend_content() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    let before = grid.content_height();

    grid.commit_cell_edit(300, 0, "", "deep").await.unwrap();
    assert_eq!(grid.cache().high_water(), HighWaterMark::new(300, 100));
    assert_eq!(grid.content_height(), 30.0 + 310.0 * 23.0);
    assert!(grid.content_height() > before);
    assert_eq!(
        store.peek(Collection::MaxEditedCell, "maxEdited").await,
        Some(json!({"id": "maxEdited", "row": 300, "col": 100}))
    );
}

#[test]
fn select_all_and_move_anchor() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);

    // Moving the anchor needs a range selection.
    grid.set_anchor(1, 1, false);
    grid.move_anchor(4, 4);
    assert_eq!(grid.active_cell(), Some(CellCoord::new(1, 1)));

    grid.select_all();
    assert_eq!(
        grid.selection(),
        Some(Selection::Range(CellRange::new(0, 100, 0, 100)))
    );
    grid.move_anchor(4, 4);
    assert_eq!(grid.active_cell(), Some(CellCoord::new(4, 4)));
    assert_eq!(
        grid.selection(),
        Some(Selection::Range(CellRange::new(0, 100, 0, 100)))
    );

    grid.clear_selection();
    assert_eq!(grid.selection(), None);
    assert_eq!(grid.active_cell(), None);
}

#[test]
fn observer_may_change_the_selection() {
    let store = Rc::new(ProbeStore::new());
    let grid = Rc::new(grid_over(&store));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (weak, sink) = (Rc::downgrade(&grid), Rc::clone(&seen));
    grid.on_selection_change(move |selection| {
        sink.borrow_mut().push(selection.copied());
        // Collapse any range back to a single cell.
        if selection.is_some_and(Selection::is_range) {
            if let Some(grid) = weak.upgrade() {
                grid.set_anchor(9, 9, false);
            }
        }
    });

    grid.set_anchor(1, 1, false);
    grid.set_anchor(3, 3, true);
    assert_eq!(
        *seen.borrow(),
        [
            Some(Selection::Cell(CellCoord::new(1, 1))),
            Some(Selection::Range(CellRange::new(1, 3, 1, 3))),
            Some(Selection::Cell(CellCoord::new(9, 9))),
        ]
    );
    assert_eq!(grid.selection(), Some(Selection::Cell(CellCoord::new(9, 9))));

    // The observer is still registered afterwards.
    grid.set_anchor(2, 2, false);
    assert_eq!(seen.borrow().len(), 4);
}

fn small_grid(store: &Rc<ProbeStore>) -> Grid<ProbeStore> {
    let config = GridConfig {
        total_rows: 3,
        total_cols: 4,
        initial_max_edited_row: 2,
        initial_max_edited_col: 3,
        ..GridConfig::default()
    };
    let grid = Grid::new(config, Rc::clone(store)).unwrap();
    grid.set_viewport_size(800.0, 600.0);
    grid
}

#[test]
fn arrow_keys_clamp_at_the_grid_edges() {
    let store = Rc::new(ProbeStore::new());
    let grid = small_grid(&store);
    assert_eq!(grid.move_active(Direction::Down, false), None);

    grid.set_anchor(0, 0, false);
    assert_eq!(grid.move_active(Direction::Up, false), Some(CellCoord::new(0, 0)));
    assert_eq!(grid.move_active(Direction::Left, false), Some(CellCoord::new(0, 0)));
    grid.move_active(Direction::Down, false);
    grid.move_active(Direction::Down, false);
    assert_eq!(grid.move_active(Direction::Down, false), Some(CellCoord::new(2, 0)));
    for _ in 0..5 {
        grid.move_active(Direction::Right, false);
    }
    assert_eq!(grid.selection(), Some(Selection::Cell(CellCoord::new(2, 3))));
}

#[test]
fn shift_arrows_extend_from_the_focus() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    grid.set_anchor(5, 5, false);

    grid.move_active(Direction::Down, true);
    grid.move_active(Direction::Right, true);
    assert_eq!(grid.move_active(Direction::Right, true), Some(CellCoord::new(6, 7)));
    assert_eq!(
        grid.selection(),
        Some(Selection::Range(CellRange::new(5, 6, 5, 7)))
    );
    assert_eq!(grid.active_cell(), Some(CellCoord::new(5, 5)));

    // A plain arrow collapses to a cell next to the active one.
    assert_eq!(grid.move_active(Direction::Up, false), Some(CellCoord::new(4, 5)));
    assert_eq!(grid.selection(), Some(Selection::Cell(CellCoord::new(4, 5))));
}

#[test]
fn arrow_keys_scroll_the_cell_into_view() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    grid.set_anchor(24, 0, false);
    assert_eq!(grid.viewport().scroll_y, 0.0);

    // Row 25 ends at 30 + 26 * 23 = 628, past the 600px viewport.
    grid.move_active(Direction::Down, false);
    assert_eq!(grid.viewport().scroll_y, 28.0);
}

#[test]
fn tab_cycles_through_a_range_and_wraps() {
    let store = Rc::new(ProbeStore::new());
    let grid = grid_over(&store);
    grid.set_anchor(1, 3, false);
    grid.extend_to(Some(2), Some(4));
    let range = Some(Selection::Range(CellRange::new(1, 2, 3, 4)));

    let forward: Vec<_> = (0..4).map(|_| grid.tab(false)).collect();
    assert_eq!(
        forward,
        [
            Some(CellCoord::new(1, 4)),
            Some(CellCoord::new(2, 3)),
            Some(CellCoord::new(2, 4)),
            Some(CellCoord::new(1, 3)),
        ]
    );
    assert_eq!(grid.selection(), range);

    assert_eq!(grid.tab(true), Some(CellCoord::new(2, 4)));
    assert_eq!(grid.active_cell(), Some(CellCoord::new(2, 4)));
    assert_eq!(grid.selection(), range);
}

#[test]
fn tab_on_a_single_cell_moves_sideways_and_clamps() {
    let store = Rc::new(ProbeStore::new());
    let grid = small_grid(&store);
    assert_eq!(grid.tab(false), None);

    grid.set_anchor(1, 2, false);
    assert_eq!(grid.tab(false), Some(CellCoord::new(1, 3)));
    assert_eq!(grid.tab(false), Some(CellCoord::new(1, 3)));
    assert_eq!(grid.tab(true), Some(CellCoord::new(1, 2)));
    assert_eq!(grid.selection(), Some(Selection::Cell(CellCoord::new(1, 2))));
}

#[test]
fn configured_initial_cell_is_selected() {
    let store = Rc::new(ProbeStore::new());
    let config = GridConfig {
        initial_active_cell: Some(CellCoord::new(4, 7)),
        ..GridConfig::default()
    };
    let grid = Grid::new(config, Rc::clone(&store)).unwrap();
    assert_eq!(grid.selection(), Some(Selection::Cell(CellCoord::new(4, 7))));
    assert_eq!(grid.active_cell(), Some(CellCoord::new(4, 7)));
    assert!(grid.take_redraw_request());

    assert_eq!(grid_over(&store).selection(), None);
}
