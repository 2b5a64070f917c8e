//! JavaScript bindings.
//!
//! `GridHandle` exposes a [`Grid`] over IndexedDB to a browser host. The host
//! owns the canvas and the event wiring; it calls in here to move the
//! selection, scroll, commit edits and fetch what to paint. Async operations
//! return `Promise`s.
//!
//! # Usage (JavaScript)
//!
//! ```javascript
//! import init, { GridHandle } from 'sparsegrid';
//! await init();
//! const grid = await GridHandle.open({ totalRows: 50000 });
//! grid.set_viewport_size(canvas.clientWidth, canvas.clientHeight);
//! const frame = grid.frame();
//! if (await grid.prefetch_visible()) requestAnimationFrame(draw);
//! ```

use std::rc::Rc;

use js_sys::{Function, Promise};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::config::GridConfig;
use crate::error::GridError;
use crate::grid::Grid;
use crate::store::indexed_db::{IndexedDbStore, DEFAULT_DB_NAME};
use crate::types::{CellRange, Direction};

#[derive(Serialize)]
struct CellView<'a> {
    row: u32,
    col: u32,
    value: &'a str,
}

#[derive(Serialize)]
struct FrameView<'a> {
    range: CellRange,
    cells: Vec<CellView<'a>>,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// A grid bound to an IndexedDB database, exported to JavaScript.
#[wasm_bindgen]
pub struct GridHandle {
    grid: Rc<Grid<IndexedDbStore>>,
}

#[wasm_bindgen]
impl GridHandle {
    /// Open the database, build the grid and load persisted sizes.
    ///
    /// `config` is a partial `GridConfig` object (missing fields take their
    /// defaults) or `undefined`.
    #[wasm_bindgen(js_name = "open")]
    pub async fn open(config: JsValue, db_name: Option<String>) -> Result<GridHandle, JsValue> {
        console_error_panic_hook::set_once();

        let config: GridConfig = if config.is_undefined() || config.is_null() {
            GridConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| GridError::Config(e.to_string()))?
        };
        let store = IndexedDbStore::open(db_name.as_deref().unwrap_or(DEFAULT_DB_NAME)).await?;
        let grid = Grid::new(config, Rc::new(store))?;
        grid.load().await?;
        Ok(Self {
            grid: Rc::new(grid),
        })
    }

    /// Close the database. Later store operations fail.
    #[wasm_bindgen]
    pub fn close(&self) {
        self.grid.store().close();
    }

    // ---- viewport ----

    #[wasm_bindgen]
    pub fn set_viewport_size(&self, width: f64, height: f64) {
        self.grid.set_viewport_size(width, height);
    }

    #[wasm_bindgen]
    pub fn scroll_by(&self, dx: f64, dy: f64) {
        self.grid.scroll_by(dx, dy);
    }

    #[wasm_bindgen]
    pub fn scroll_to(&self, x: f64, y: f64) {
        self.grid.scroll_to(x, y);
    }

    /// Current scroll offsets as `[x, y]`.
    #[wasm_bindgen]
    pub fn scroll_position(&self) -> Vec<f64> {
        let viewport = self.grid.viewport();
        vec![viewport.scroll_x, viewport.scroll_y]
    }

    #[wasm_bindgen]
    pub fn ensure_cell_visible(&self, row: u32, col: u32) {
        self.grid.ensure_cell_visible(row, col);
    }

    #[wasm_bindgen]
    pub fn visible_range(&self) -> Result<JsValue, JsValue> {
        to_js(&self.grid.visible_range())
    }

    #[wasm_bindgen]
    pub fn content_width(&self) -> f64 {
        self.grid.content_width()
    }

    #[wasm_bindgen]
    pub fn content_height(&self) -> f64 {
        self.grid.content_height()
    }

    // ---- layout ----

    #[wasm_bindgen]
    pub fn column_width(&self, col: u32) -> f64 {
        self.grid.columns().size(col)
    }

    #[wasm_bindgen]
    pub fn row_height(&self, row: u32) -> f64 {
        self.grid.rows().size(row)
    }

    /// Left edge of a column in sheet coordinates (header included).
    #[wasm_bindgen]
    pub fn column_position(&self, col: u32) -> f64 {
        self.grid.columns().position(col, self.grid.config().header_width)
    }

    /// Top edge of a row in sheet coordinates (header included).
    #[wasm_bindgen]
    pub fn row_position(&self, row: u32) -> f64 {
        self.grid.rows().position(row, self.grid.config().header_height)
    }

    /// Column under a screen x coordinate, `undefined` over the row header.
    #[wasm_bindgen]
    pub fn column_at(&self, x: f64) -> Option<u32> {
        let header_width = self.grid.config().header_width;
        if x < header_width {
            return None;
        }
        let (sheet_x, _) = self.grid.viewport().to_sheet(x, 0.0);
        self.grid.columns().index_at(sheet_x, header_width)
    }

    /// Row under a screen y coordinate, `undefined` over the column header.
    #[wasm_bindgen]
    pub fn row_at(&self, y: f64) -> Option<u32> {
        let header_height = self.grid.config().header_height;
        if y < header_height {
            return None;
        }
        let (_, sheet_y) = self.grid.viewport().to_sheet(0.0, y);
        self.grid.rows().index_at(sheet_y, header_height)
    }

    // ---- painting ----

    /// Visible range plus the cached values to paint, as
    /// `{ range, cells: [{ row, col, value }] }`.
    #[wasm_bindgen]
    pub fn frame(&self) -> Result<JsValue, JsValue> {
        let frame = self.grid.frame();
        let cells = frame
            .cells
            .iter()
            .map(|(cell, value)| CellView {
                row: cell.row,
                col: cell.col,
                value,
            })
            .collect();
        to_js(&FrameView {
            range: frame.range,
            cells,
        })
    }

    /// Resolves to `true` when new values arrived and a redraw is due.
    #[wasm_bindgen]
    pub fn prefetch_visible(&self) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move { Ok(JsValue::from_bool(grid.prefetch_visible().await)) })
    }

    #[wasm_bindgen]
    pub fn take_redraw_request(&self) -> bool {
        self.grid.take_redraw_request()
    }

    // ---- cells and history ----

    /// Resolves to the cell's value, or `undefined` when empty.
    #[wasm_bindgen]
    pub fn cell_value(&self, row: u32, col: u32) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move {
            let value = grid.cell_value(row, col).await?;
            Ok(value.map_or(JsValue::UNDEFINED, |v| JsValue::from_str(&v)))
        })
    }

    #[wasm_bindgen]
    pub fn commit_cell_edit(&self, row: u32, col: u32, old_value: String, new_value: String) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move {
            grid.commit_cell_edit(row, col, &old_value, &new_value).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen]
    pub fn resize_column(&self, col: u32, width: f64) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move { Ok(JsValue::from_bool(grid.resize_column(col, width).await?)) })
    }

    #[wasm_bindgen]
    pub fn resize_row(&self, row: u32, height: f64) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move { Ok(JsValue::from_bool(grid.resize_row(row, height).await?)) })
    }

    #[wasm_bindgen]
    pub fn undo(&self) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move { Ok(JsValue::from_bool(grid.undo().await?)) })
    }

    #[wasm_bindgen]
    pub fn redo(&self) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move { Ok(JsValue::from_bool(grid.redo().await?)) })
    }

    // ---- selection ----

    /// Call `callback(selection)` after every selection change.
    #[wasm_bindgen]
    pub fn on_selection_change(&self, callback: Function) {
        self.grid.on_selection_change(move |selection| {
            let value = selection
                .and_then(|s| serde_wasm_bindgen::to_value(s).ok())
                .unwrap_or(JsValue::NULL);
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                log::warn!("selection callback threw: {e:?}");
            }
        });
    }

    #[wasm_bindgen]
    pub fn selection(&self) -> Result<JsValue, JsValue> {
        match self.grid.selection() {
            Some(selection) => to_js(&selection),
            None => Ok(JsValue::NULL),
        }
    }

    /// Active cell as `[row, col]`.
    #[wasm_bindgen]
    pub fn active_cell(&self) -> Option<Vec<u32>> {
        self.grid.active_cell().map(|c| vec![c.row, c.col])
    }

    /// Focus cell as `[row, col]`.
    #[wasm_bindgen]
    pub fn focus_cell(&self) -> Option<Vec<u32>> {
        self.grid.focus_cell().map(|c| vec![c.row, c.col])
    }

    #[wasm_bindgen]
    pub fn set_anchor(&self, row: u32, col: u32, extend: bool) {
        self.grid.set_anchor(row, col, extend);
    }

    /// Extend to `(row, col)`; pass `undefined` for a coordinate outside the grid.
    #[wasm_bindgen]
    pub fn extend_to(&self, row: Option<u32>, col: Option<u32>) {
        self.grid.extend_to(row, col);
    }

    #[wasm_bindgen]
    pub fn select_row(&self, row: u32, extend: bool) {
        self.grid.select_row(row, extend);
    }

    #[wasm_bindgen]
    pub fn select_col(&self, col: u32, extend: bool) {
        self.grid.select_col(col, extend);
    }

    #[wasm_bindgen]
    pub fn select_all(&self) {
        self.grid.select_all();
    }

    #[wasm_bindgen]
    pub fn move_anchor(&self, row: u32, col: u32) {
        self.grid.move_anchor(row, col);
    }

    #[wasm_bindgen]
    pub fn clear_selection(&self) {
        self.grid.clear_selection();
    }

    /// Arrow-key move by `KeyboardEvent.key` name; resolves the new cell as
    /// `[row, col]`.
    #[wasm_bindgen]
    pub fn move_active(&self, key: &str, extend: bool) -> Result<Option<Vec<u32>>, JsValue> {
        let direction =
            Direction::from_key(key).ok_or_else(|| JsValue::from_str(&format!("not an arrow key: {key}")))?;
        Ok(self.grid.move_active(direction, extend).map(|c| vec![c.row, c.col]))
    }

    #[wasm_bindgen]
    pub fn tab(&self, backward: bool) -> Option<Vec<u32>> {
        self.grid.tab(backward).map(|c| vec![c.row, c.col])
    }

    /// Resolves to `{ count, numericCount, sum, average, min, max }`.
    #[wasm_bindgen]
    pub fn selection_stats(&self) -> Promise {
        let grid = Rc::clone(&self.grid);
        future_to_promise(async move {
            let stats = grid.selection_stats().await?;
            to_js(&stats)
        })
    }

    // ---- addressing ----

    #[wasm_bindgen]
    pub fn cell_address(&self, row: u32, col: u32) -> String {
        self.grid.cell_address(row, col)
    }

    /// `[row, col]` for an A1 address inside the grid.
    #[wasm_bindgen]
    pub fn parse_cell_address(&self, address: &str) -> Option<Vec<u32>> {
        self.grid
            .parse_cell_address(address)
            .map(|c| vec![c.row, c.col])
    }
}
