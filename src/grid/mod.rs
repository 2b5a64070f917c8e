//! Grid host: wires the axes, cache, selection and history together.
//!
//! `Grid` owns the scroll state and answers the questions a renderer asks
//! each frame (what is visible, how large is the scrollable content, what
//! values are cached for the viewport). Edits and resizes go through the
//! command history so they can be undone.
//!
//! All methods take `&self`; state lives in `Cell`/`RefCell`s so a host can
//! share the grid through an `Rc` and drive async operations from its event
//! loop. No borrow is held across an `.await`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::cache::{CellValueCache, HighWaterMark};
use crate::cell_ref;
use crate::config::GridConfig;
use crate::editor::{CommandHistory, EditCellCommand, ResizeColumnCommand, ResizeRowCommand};
use crate::error::Result;
use crate::layout::{AxisIndex, AxisKind, PersistedAxis, Viewport};
use crate::selection::{GridBounds, SelectionModel};
use crate::stats::RangeStats;
use crate::store::GridStore;
use crate::types::{CellCoord, CellRange, Direction, Selection, SelectionMode};

type SelectionObserver = Box<dyn FnMut(Option<&Selection>)>;

/// Selection snapshot waiting to be delivered to the host observer.
type PendingSelection = Rc<Cell<Option<Option<Selection>>>>;

/// What a renderer needs to paint one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Visible cells (padded by the configured margin).
    pub range: CellRange,
    /// Non-empty cached values inside `range`.
    pub cells: HashMap<CellCoord, String>,
}

/// A virtualized grid over a [`GridStore`].
pub struct Grid<S> {
    config: GridConfig,
    store: Rc<S>,
    columns: Rc<PersistedAxis<S>>,
    rows: Rc<PersistedAxis<S>>,
    cache: Rc<CellValueCache<S>>,
    history: CommandHistory,
    selection: Rc<RefCell<SelectionModel>>,
    pending_selection: PendingSelection,
    observer: RefCell<Option<SelectionObserver>>,
    dispatching: Cell<bool>,
    viewport: Cell<Viewport>,
    redraw_requested: Rc<Cell<bool>>,
}

impl<S: GridStore + 'static> Grid<S> {
    /// Build a grid over `store`, selecting the configured initial cell.
    /// Nothing is read until [`Grid::load`].
    pub fn new(config: GridConfig, store: Rc<S>) -> Result<Self> {
        config.validate()?;

        let columns = PersistedAxis::new(
            Rc::clone(&store),
            AxisKind::Columns,
            AxisIndex::new(config.total_cols, config.default_col_width),
        );
        let rows = PersistedAxis::new(
            Rc::clone(&store),
            AxisKind::Rows,
            AxisIndex::new(config.total_rows, config.default_row_height),
        );
        let cache = CellValueCache::new(
            Rc::clone(&store),
            HighWaterMark::new(config.initial_max_edited_row, config.initial_max_edited_col),
        );

        let pending_selection: PendingSelection = Rc::new(Cell::new(None));
        let mut selection = SelectionModel::new();
        let sink = Rc::clone(&pending_selection);
        selection.on_change(move |snapshot| sink.set(Some(snapshot.copied())));

        let grid = Self {
            config,
            store,
            columns: Rc::new(columns),
            rows: Rc::new(rows),
            cache: Rc::new(cache),
            history: CommandHistory::new(),
            selection: Rc::new(RefCell::new(selection)),
            pending_selection,
            observer: RefCell::new(None),
            dispatching: Cell::new(false),
            viewport: Cell::new(Viewport::default()),
            redraw_requested: Rc::new(Cell::new(false)),
        };
        if let Some(cell) = grid.config.initial_active_cell {
            grid.set_anchor(cell.row, cell.col, false);
        }
        Ok(grid)
    }

    /// Load persisted column widths, row heights and the high-water mark.
    pub async fn load(&self) -> Result<()> {
        let widths = self.columns.load().await?;
        let heights = self.rows.load().await?;
        let high_water = self.cache.load_high_water().await?;
        log::info!(
            "grid loaded: {widths} column widths, {heights} row heights, high water {}:{}",
            high_water.row,
            high_water.col
        );
        self.request_redraw();
        Ok(())
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn store(&self) -> &Rc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Rc<CellValueCache<S>> {
        &self.cache
    }

    pub fn columns(&self) -> &Rc<PersistedAxis<S>> {
        &self.columns
    }

    pub fn rows(&self) -> &Rc<PersistedAxis<S>> {
        &self.rows
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    // ---- redraw ----

    fn request_redraw(&self) {
        self.redraw_requested.set(true);
    }

    /// Whether something changed since the last call. Clears the request.
    pub fn take_redraw_request(&self) -> bool {
        self.redraw_requested.replace(false)
    }

    // ---- viewport ----

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    pub fn set_viewport_size(&self, width: f64, height: f64) {
        let mut viewport = self.viewport.get();
        viewport.width = width;
        viewport.height = height;
        self.viewport.set(viewport);
        self.request_redraw();
    }

    /// Scroll to an absolute position, clamped to the content size.
    pub fn scroll_to(&self, x: f64, y: f64) {
        let (content_width, content_height) = (self.content_width(), self.content_height());
        let mut viewport = self.viewport.get();
        viewport.scroll_x = x;
        viewport.scroll_y = y;
        viewport.clamp_scroll(content_width, content_height);
        self.viewport.set(viewport);
        self.request_redraw();
    }

    /// Scroll by a delta (wheel or scrollbar drag), clamped to the content size.
    pub fn scroll_by(&self, dx: f64, dy: f64) {
        let viewport = self.viewport.get();
        self.scroll_to(viewport.scroll_x + dx, viewport.scroll_y + dy);
    }

    /// Cells intersecting the viewport, padded past the far edges.
    pub fn visible_range(&self) -> CellRange {
        let viewport = self.viewport.get();
        let margin = self.config.visible_margin;
        let (start_row, end_row) = self
            .rows
            .with_index(|rows| viewport.visible_rows(rows, self.config.header_height, margin));
        let (start_col, end_col) = self
            .columns
            .with_index(|cols| viewport.visible_cols(cols, self.config.header_width, margin));
        CellRange::new(start_row, end_row, start_col, end_col)
    }

    /// Larger of the high-water row and the last visible row.
    pub fn effective_max_row(&self) -> u32 {
        self.cache.high_water().row.max(self.visible_range().end_row)
    }

    /// Larger of the high-water column and the last visible column.
    pub fn effective_max_col(&self) -> u32 {
        self.cache.high_water().col.max(self.visible_range().end_col)
    }

    /// Scrollable width: up to a few columns past the effective extent.
    pub fn content_width(&self) -> f64 {
        let visible = self.visible_range();
        let furthest = visible.end_col.max(self.cache.high_water().col);
        let cols = self
            .config
            .total_cols
            .min(furthest.saturating_add(self.config.content_slack));
        self.columns.position(cols, self.config.header_width)
    }

    /// Scrollable height: up to a few rows past the effective extent.
    pub fn content_height(&self) -> f64 {
        let visible = self.visible_range();
        let furthest = visible.end_row.max(self.cache.high_water().row);
        let rows = self
            .config
            .total_rows
            .min(furthest.saturating_add(self.config.content_slack));
        self.rows.position(rows, self.config.header_height)
    }

    /// Scroll the minimum amount needed to show the whole cell below the headers.
    pub fn ensure_cell_visible(&self, row: u32, col: u32) {
        let header_width = self.config.header_width;
        let header_height = self.config.header_height;
        let x = self.columns.position(col, header_width);
        let w = self.columns.size(col);
        let y = self.rows.position(row, header_height);
        let h = self.rows.size(row);

        let mut viewport = self.viewport.get();
        if x < viewport.scroll_x + header_width {
            viewport.scroll_x = x - header_width;
        } else if x + w > viewport.scroll_x + viewport.width {
            viewport.scroll_x = x + w - viewport.width;
        }
        if y < viewport.scroll_y + header_height {
            viewport.scroll_y = y - header_height;
        } else if y + h > viewport.scroll_y + viewport.height {
            viewport.scroll_y = y + h - viewport.height;
        }
        self.viewport.set(viewport);

        // Content size depends on the new visible range.
        viewport.clamp_scroll(self.content_width(), self.content_height());
        self.viewport.set(viewport);
        self.request_redraw();
    }

    // ---- per-frame ----

    /// Stretch full-row/column selections to the current extent and collect
    /// the cached values to paint. Never touches the store.
    pub fn frame(&self) -> Frame {
        self.update_selection(|selection, grid| selection.grow_bounds_on_demand(grid));
        let range = self.visible_range();
        Frame {
            range,
            cells: self.cache.visible_sync(range),
        }
    }

    /// Warm the cache for the visible range.
    ///
    /// Returns whether new values arrived and the frame should be redrawn.
    /// A failed read is logged and reported as `false`.
    pub async fn prefetch_visible(&self) -> bool {
        let range = self.visible_range();
        match self.cache.prefetch_range(range).await {
            Ok(loaded) => {
                if loaded {
                    self.request_redraw();
                }
                loaded
            }
            Err(e) => {
                log::warn!("prefetch of visible range failed: {e}");
                false
            }
        }
    }

    // ---- cells ----

    /// Current value of a cell (`None` when empty).
    pub async fn cell_value(&self, row: u32, col: u32) -> Result<Option<String>> {
        self.cache.get(row, col).await
    }

    /// Commit an in-place edit as an undoable command. Does nothing when the
    /// value is unchanged.
    pub async fn commit_cell_edit(&self, row: u32, col: u32, old_value: &str, new_value: &str) -> Result<()> {
        if old_value == new_value {
            return Ok(());
        }
        let command = EditCellCommand::new(Rc::clone(&self.cache), row, col, old_value, new_value)
            .with_notifier(self.edit_notifier(CellCoord::new(row, col)));
        let result = self.history.execute(Box::new(command)).await;
        self.dispatch_selection_event();
        result
    }

    /// After an edit lands: redraw, and re-announce the selection if the
    /// edited cell is the active one so value displays refresh.
    fn edit_notifier(&self, cell: CellCoord) -> impl Fn() + 'static {
        let redraw = Rc::clone(&self.redraw_requested);
        let selection = Rc::clone(&self.selection);
        move || {
            redraw.set(true);
            if let Ok(mut selection) = selection.try_borrow_mut() {
                if selection.active_cell() == Some(cell) {
                    selection.refresh();
                }
            }
        }
    }

    fn redraw_notifier(&self) -> impl Fn() + 'static {
        let redraw = Rc::clone(&self.redraw_requested);
        move || redraw.set(true)
    }

    /// Resize a column as an undoable command.
    ///
    /// The size is clamped to the configured minimum. Returns `false` when
    /// that leaves the width unchanged.
    pub async fn resize_column(&self, col: u32, width: f64) -> Result<bool> {
        let old = self.columns.size(col);
        let new = width.max(self.config.min_resize);
        if (new - old).abs() < f64::EPSILON {
            return Ok(false);
        }
        let command = ResizeColumnCommand::new(Rc::clone(&self.columns), col, old, new)
            .with_notifier(self.redraw_notifier());
        self.history.execute(Box::new(command)).await?;
        Ok(true)
    }

    /// Resize a row as an undoable command. See [`Grid::resize_column`].
    pub async fn resize_row(&self, row: u32, height: f64) -> Result<bool> {
        let old = self.rows.size(row);
        let new = height.max(self.config.min_resize);
        if (new - old).abs() < f64::EPSILON {
            return Ok(false);
        }
        let command = ResizeRowCommand::new(Rc::clone(&self.rows), row, old, new)
            .with_notifier(self.redraw_notifier());
        self.history.execute(Box::new(command)).await?;
        Ok(true)
    }

    pub async fn undo(&self) -> Result<bool> {
        let result = self.history.undo().await;
        self.dispatch_selection_event();
        result
    }

    pub async fn redo(&self) -> Result<bool> {
        let result = self.history.redo().await;
        self.dispatch_selection_event();
        result
    }

    // ---- selection ----

    /// Observe selection changes. The observer runs after the selection has
    /// been updated and may query the grid.
    pub fn on_selection_change(&self, observer: impl FnMut(Option<&Selection>) + 'static) {
        *self.observer.borrow_mut() = Some(Box::new(observer));
    }

    fn update_selection<R>(&self, f: impl FnOnce(&mut SelectionModel, &Self) -> R) -> R {
        let result = f(&mut self.selection.borrow_mut(), self);
        self.dispatch_selection_event();
        result
    }

    fn dispatch_selection_event(&self) {
        // Changes made by the observer itself are delivered by the loop below.
        if self.dispatching.get() {
            return;
        }
        let Some(mut observer) = self.observer.borrow_mut().take() else {
            if self.pending_selection.take().is_some() {
                self.request_redraw();
            }
            return;
        };
        self.dispatching.set(true);
        while let Some(snapshot) = self.pending_selection.take() {
            self.request_redraw();
            observer(snapshot.as_ref());
        }
        self.dispatching.set(false);
        // Taken out for the calls so the observer may use the grid; keep a
        // replacement it registered meanwhile.
        let mut slot = self.observer.borrow_mut();
        if slot.is_none() {
            *slot = Some(observer);
        }
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection.borrow().selection().copied()
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selection.borrow().mode()
    }

    pub fn active_cell(&self) -> Option<CellCoord> {
        self.selection.borrow().active_cell()
    }

    pub fn focus_cell(&self) -> Option<CellCoord> {
        self.selection.borrow().focus_cell()
    }

    pub fn set_anchor(&self, row: u32, col: u32, extend: bool) {
        self.update_selection(|selection, grid| selection.set_anchor(row, col, extend, grid));
    }

    pub fn extend_to(&self, row: Option<u32>, col: Option<u32>) {
        self.update_selection(|selection, grid| selection.extend_to(row, col, grid));
    }

    pub fn select_row(&self, row: u32, extend: bool) {
        self.update_selection(|selection, grid| selection.select_row(row, extend, grid));
    }

    pub fn select_col(&self, col: u32, extend: bool) {
        self.update_selection(|selection, grid| selection.select_col(col, extend, grid));
    }

    pub fn select_all(&self) {
        self.update_selection(|selection, grid| selection.select_all(grid));
    }

    pub fn move_anchor(&self, row: u32, col: u32) {
        self.update_selection(|selection, _| selection.move_anchor(row, col));
    }

    pub fn clear_selection(&self) {
        self.update_selection(|selection, _| selection.clear());
    }

    // ---- keyboard ----

    /// Arrow-key navigation, clamped to the grid.
    ///
    /// Moves the active cell one step, or with `extend` grows the selection
    /// from its focus. Scrolls the new cell into view and returns it; does
    /// nothing without a selection.
    pub fn move_active(&self, direction: Direction, extend: bool) -> Option<CellCoord> {
        let from = if extend { self.focus_cell() } else { self.active_cell() }?;
        let next = direction.step(from, self.config.total_rows, self.config.total_cols);
        if extend {
            self.extend_to(Some(next.row), Some(next.col));
        } else {
            self.set_anchor(next.row, next.col, false);
        }
        self.ensure_cell_visible(next.row, next.col);
        Some(next)
    }

    /// Tab navigation.
    ///
    /// Inside a range the active cell cycles row-major through it and the
    /// range is kept. Otherwise Tab moves right and `backward` moves left.
    pub fn tab(&self, backward: bool) -> Option<CellCoord> {
        let Some(Selection::Range(range)) = self.selection() else {
            let direction = if backward { Direction::Left } else { Direction::Right };
            return self.move_active(direction, false);
        };
        let next = range.cycle(self.active_cell()?, backward);
        self.move_anchor(next.row, next.col);
        self.ensure_cell_visible(next.row, next.col);
        Some(next)
    }

    /// Statistics over the non-empty values in the current selection.
    pub async fn selection_stats(&self) -> Result<RangeStats> {
        let Some(range) = self.selection.borrow().selected_range() else {
            return Ok(RangeStats::default());
        };
        let values = self.cache.get_range_values(range.start(), range.end()).await?;
        Ok(RangeStats::from_values(values))
    }

    // ---- addressing ----

    /// A1-style address, e.g. `(0, 27)` -> `AB1`.
    pub fn cell_address(&self, row: u32, col: u32) -> String {
        cell_ref::cell_address(row, col)
    }

    /// Parse an A1-style address, rejecting cells outside the grid.
    pub fn parse_cell_address(&self, address: &str) -> Option<CellCoord> {
        cell_ref::parse_cell_address(address, self.config.total_rows, self.config.total_cols)
    }
}

impl<S: GridStore + 'static> GridBounds for Grid<S> {
    fn effective_max_row(&self) -> u32 {
        Grid::effective_max_row(self)
    }

    fn effective_max_col(&self) -> u32 {
        Grid::effective_max_col(self)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn grid() -> Grid<MemoryStore> {
        let grid = Grid::new(GridConfig::default(), Rc::new(MemoryStore::open())).unwrap();
        grid.set_viewport_size(800.0, 600.0);
        grid
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = GridConfig {
            total_rows: 0,
            ..GridConfig::default()
        };
        assert!(Grid::new(config, Rc::new(MemoryStore::open())).is_err());
    }

    #[test]
    fn test_visible_range_and_effective_extent() {
        let grid = grid();
        // Rows: (600 - 30) / 23 -> 24, cols: (800 - 42) / 65 -> 11, plus 5 each.
        assert_eq!(grid.visible_range(), CellRange::new(0, 29, 0, 16));
        // The initial high-water mark (100, 100) dominates.
        assert_eq!(grid.effective_max_row(), 100);
        assert_eq!(grid.effective_max_col(), 100);
    }

    #[test]
    fn test_content_size_tracks_high_water() {
        let grid = grid();
        assert_eq!(grid.content_width(), 42.0 + 110.0 * 65.0);
        assert_eq!(grid.content_height(), 30.0 + 110.0 * 23.0);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let grid = grid();
        let max_y = grid.content_height() - 600.0;
        grid.scroll_by(-50.0, 1.0e9);
        let viewport = grid.viewport();
        assert_eq!(viewport.scroll_x, 0.0);
        assert_eq!(viewport.scroll_y, max_y);
        // Scrolling down exposed more rows, so there is now room to go further.
        assert!(grid.content_height() - 600.0 > max_y);
    }

    #[test]
    fn test_ensure_cell_visible() {
        let grid = grid();
        grid.ensure_cell_visible(40, 0);
        // Row 40 ends at 30 + 41 * 23 = 973; the viewport bottom must reach it.
        assert_eq!(grid.viewport().scroll_y, 973.0 - 600.0);

        grid.ensure_cell_visible(2, 0);
        assert_eq!(grid.viewport().scroll_y, 2.0 * 23.0);
    }

    #[test]
    fn test_selection_observer_can_query_grid() {
        let grid = Rc::new(grid());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (weak, sink) = (Rc::downgrade(&grid), Rc::clone(&seen));
        grid.on_selection_change(move |_| {
            if let Some(grid) = weak.upgrade() {
                sink.borrow_mut().push(grid.active_cell());
            }
        });
        grid.set_anchor(3, 3, false);
        grid.select_col(2, false);
        assert_eq!(
            *seen.borrow(),
            [Some(CellCoord::new(3, 3)), Some(CellCoord::new(0, 2))]
        );
    }

    #[test]
    fn test_addresses() {
        let grid = grid();
        assert_eq!(grid.cell_address(0, 27), "AB1");
        assert_eq!(grid.parse_cell_address("ab1"), Some(CellCoord::new(0, 27)));
        assert_eq!(grid.parse_cell_address("A50001"), None);
    }

    #[tokio::test]
    async fn test_commit_cell_edit_skips_unchanged() {
        let grid = grid();
        grid.commit_cell_edit(0, 0, "x", "x").await.unwrap();
        assert!(!grid.history().can_undo());
        grid.commit_cell_edit(0, 0, "", "x").await.unwrap();
        assert!(grid.history().can_undo());
        assert_eq!(grid.cell_value(0, 0).await.unwrap(), Some("x".to_string()));
    }

    #[tokio::test]
    async fn test_resize_clamps_to_minimum() {
        let grid = grid();
        assert!(grid.resize_column(1, 5.0).await.unwrap());
        assert_eq!(grid.columns().size(1), 20.0);
        assert!(!grid.resize_column(1, 20.0).await.unwrap());
        assert!(grid.undo().await.unwrap());
        assert_eq!(grid.columns().size(1), 65.0);
    }
}
