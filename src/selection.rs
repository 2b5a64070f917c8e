//! Selection state machine.
//!
//! Tracks an anchor (where the selection started), a focus (where it was
//! extended to) and the resulting [`Selection`]. Full-row and full-column
//! selections extend to the grid's *effective* extent, which grows as the
//! user scrolls or edits further out, so [`SelectionModel::grow_bounds_on_demand`]
//! re-derives their far edge once per frame instead of selecting every row
//! and column up front.

use std::fmt;

use crate::types::{CellCoord, CellRange, Selection, SelectionMode};

/// Current extent of the grid as far as selections are concerned.
///
/// Usually the larger of the high-water mark and the visible range.
pub trait GridBounds {
    fn effective_max_row(&self) -> u32;
    fn effective_max_col(&self) -> u32;
}

/// Fixed `(max_row, max_col)` bounds.
impl GridBounds for (u32, u32) {
    fn effective_max_row(&self) -> u32 {
        self.0
    }

    fn effective_max_col(&self) -> u32 {
        self.1
    }
}

type ChangeCallback = Box<dyn FnMut(Option<&Selection>)>;

/// Anchor/focus selection with row, column and cell modes.
///
/// Every call that changes the selection invokes the change callback with
/// the new snapshot before returning. The callback runs while the model is
/// mutably borrowed and must not call back into it.
#[derive(Default)]
pub struct SelectionModel {
    selection: Option<Selection>,
    anchor: Option<CellCoord>,
    focus: Option<CellCoord>,
    mode: SelectionMode,
    on_change: Option<ChangeCallback>,
}

impl fmt::Debug for SelectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionModel")
            .field("selection", &self.selection)
            .field("anchor", &self.anchor)
            .field("focus", &self.focus)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SelectionModel {
    /// Empty selection in cell mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the change callback, replacing any previous one.
    pub fn on_change(&mut self, callback: impl FnMut(Option<&Selection>) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    fn notify(&mut self) {
        let selection = self.selection;
        if let Some(callback) = self.on_change.as_mut() {
            callback(selection.as_ref());
        }
    }

    /// Re-send the current snapshot, e.g. after the active cell's value changed.
    pub fn refresh(&mut self) {
        self.notify();
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn anchor(&self) -> Option<CellCoord> {
        self.anchor
    }

    /// The cell edits apply to: the selected cell, or the anchor of a range.
    pub fn active_cell(&self) -> Option<CellCoord> {
        match self.selection? {
            Selection::Cell(cell) => Some(cell),
            Selection::Range(_) => self.anchor,
        }
    }

    /// Where the last extension ended, falling back to the active cell.
    pub fn focus_cell(&self) -> Option<CellCoord> {
        self.focus.or_else(|| self.active_cell())
    }

    /// Rectangle covered by the current selection.
    pub fn selected_range(&self) -> Option<CellRange> {
        self.selection.as_ref().map(Selection::bounds)
    }

    /// Drop the selection, anchor and focus.
    pub fn clear(&mut self) {
        self.selection = None;
        self.anchor = None;
        self.focus = None;
        self.notify();
    }

    /// Start a cell selection at `(row, col)`, or extend the current one when
    /// `extend` is set and an anchor exists. Always switches to cell mode.
    pub fn set_anchor(&mut self, row: u32, col: u32, extend: bool, bounds: &impl GridBounds) {
        self.mode = SelectionMode::Cell;
        if extend && self.anchor.is_some() {
            self.extend_to(Some(row), Some(col), bounds);
            return;
        }
        let cell = CellCoord::new(row, col);
        self.anchor = Some(cell);
        self.focus = Some(cell);
        self.selection = Some(Selection::Cell(cell));
        self.notify();
    }

    /// Move the focus and recompute the selection from the anchor.
    ///
    /// `None` stands for "outside the grid" (e.g. the pointer is over a
    /// header). The call is ignored without an anchor, or when the coordinate
    /// the current mode needs is `None`: the row in row mode, the column in
    /// column mode, either in cell mode.
    pub fn extend_to(&mut self, row: Option<u32>, col: Option<u32>, bounds: &impl GridBounds) {
        let Some(anchor) = self.anchor else {
            return;
        };
        let focus = match (self.mode, row, col) {
            (SelectionMode::Row, Some(row), col) => CellCoord::new(row, col.unwrap_or(anchor.col)),
            (SelectionMode::Col, row, Some(col)) => CellCoord::new(row.unwrap_or(anchor.row), col),
            (SelectionMode::Cell, Some(row), Some(col)) => CellCoord::new(row, col),
            _ => return,
        };
        self.focus = Some(focus);

        let selection = match self.mode {
            SelectionMode::Row => Selection::Range(CellRange::new(
                anchor.row.min(focus.row),
                anchor.row.max(focus.row),
                0,
                bounds.effective_max_col(),
            )),
            SelectionMode::Col => Selection::Range(CellRange::new(
                0,
                bounds.effective_max_row(),
                anchor.col.min(focus.col),
                anchor.col.max(focus.col),
            )),
            SelectionMode::Cell if focus == anchor => Selection::Cell(anchor),
            SelectionMode::Cell => Selection::Range(CellRange::from_corners(anchor, focus)),
        };
        self.selection = Some(selection);
        self.notify();
    }

    /// Select a whole column, or extend a column selection to it.
    pub fn select_col(&mut self, col: u32, extend: bool, bounds: &impl GridBounds) {
        self.mode = SelectionMode::Col;
        if let (true, Some(anchor)) = (extend, self.anchor) {
            self.extend_to(Some(anchor.row), Some(col), bounds);
            return;
        }
        let max_row = bounds.effective_max_row();
        self.anchor = Some(CellCoord::new(0, col));
        self.focus = Some(CellCoord::new(max_row, col));
        self.selection = Some(Selection::Range(CellRange::new(0, max_row, col, col)));
        self.notify();
    }

    /// Select a whole row, or extend a row selection to it.
    pub fn select_row(&mut self, row: u32, extend: bool, bounds: &impl GridBounds) {
        self.mode = SelectionMode::Row;
        if let (true, Some(anchor)) = (extend, self.anchor) {
            self.extend_to(Some(row), Some(anchor.col), bounds);
            return;
        }
        let max_col = bounds.effective_max_col();
        self.anchor = Some(CellCoord::new(row, 0));
        self.focus = Some(CellCoord::new(row, max_col));
        self.selection = Some(Selection::Range(CellRange::new(row, row, 0, max_col)));
        self.notify();
    }

    /// Select everything up to the effective extent, anchored at the origin.
    pub fn select_all(&mut self, bounds: &impl GridBounds) {
        self.mode = SelectionMode::Cell;
        let origin = CellCoord::new(0, 0);
        self.anchor = Some(origin);
        self.focus = Some(origin);
        self.selection = Some(Selection::Range(CellRange::new(
            0,
            bounds.effective_max_row(),
            0,
            bounds.effective_max_col(),
        )));
        self.notify();
    }

    /// Move the active cell inside a range selection without changing the range.
    pub fn move_anchor(&mut self, row: u32, col: u32) {
        if !self.selection.is_some_and(|s| s.is_range()) {
            return;
        }
        let cell = CellCoord::new(row, col);
        self.anchor = Some(cell);
        self.focus = Some(cell);
        self.notify();
    }

    /// Keep full-row, full-column and select-all ranges stretched to the
    /// effective extent. Notifies only when the range changed.
    pub fn grow_bounds_on_demand(&mut self, bounds: &impl GridBounds) {
        let Some(Selection::Range(range)) = self.selection else {
            return;
        };
        let mut grown = range;
        match self.mode {
            SelectionMode::Col if range.start_row == 0 => {
                grown.end_row = bounds.effective_max_row();
            }
            SelectionMode::Row if range.start_col == 0 => {
                grown.end_col = bounds.effective_max_col();
            }
            SelectionMode::Cell if range.start_row == 0 && range.start_col == 0 => {
                grown.end_row = bounds.effective_max_row();
                grown.end_col = bounds.effective_max_col();
            }
            _ => return,
        }
        if grown != range {
            self.selection = Some(Selection::Range(grown));
            self.notify();
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const BOUNDS: (u32, u32) = (120, 30);

    fn recorded() -> (SelectionModel, Rc<RefCell<Vec<Option<Selection>>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = SelectionModel::new();
        let sink = Rc::clone(&log);
        model.on_change(move |selection| sink.borrow_mut().push(selection.copied()));
        (model, log)
    }

    #[test]
    fn test_starts_empty() {
        let model = SelectionModel::new();
        assert_eq!(model.selection(), None);
        assert_eq!(model.anchor(), None);
        assert_eq!(model.focus_cell(), None);
        assert_eq!(model.mode(), SelectionMode::Cell);
    }

    #[test]
    fn test_set_anchor_selects_cell() {
        let (mut model, log) = recorded();
        model.set_anchor(3, 4, false, &BOUNDS);
        let cell = CellCoord::new(3, 4);
        assert_eq!(model.selection(), Some(&Selection::Cell(cell)));
        assert_eq!(model.active_cell(), Some(cell));
        assert_eq!(log.borrow().as_slice(), &[Some(Selection::Cell(cell))]);
    }

    #[test]
    fn test_shift_click_extends_to_rectangle() {
        let mut model = SelectionModel::new();
        model.set_anchor(5, 5, false, &BOUNDS);
        model.set_anchor(2, 8, true, &BOUNDS);
        assert_eq!(
            model.selection(),
            Some(&Selection::Range(CellRange::new(2, 5, 5, 8)))
        );
        assert_eq!(model.anchor(), Some(CellCoord::new(5, 5)));
        assert_eq!(model.focus_cell(), Some(CellCoord::new(2, 8)));
        assert_eq!(model.active_cell(), Some(CellCoord::new(5, 5)));
    }

    #[test]
    fn test_extend_back_to_anchor_collapses() {
        let mut model = SelectionModel::new();
        model.set_anchor(5, 5, false, &BOUNDS);
        model.extend_to(Some(7), Some(7), &BOUNDS);
        model.extend_to(Some(5), Some(5), &BOUNDS);
        assert_eq!(
            model.selection(),
            Some(&Selection::Cell(CellCoord::new(5, 5)))
        );
    }

    #[test]
    fn test_extend_without_anchor_is_ignored() {
        let (mut model, log) = recorded();
        model.extend_to(Some(1), Some(1), &BOUNDS);
        assert_eq!(model.selection(), None);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_select_row_then_extend_outside_grid_is_ignored() {
        let (mut model, log) = recorded();
        model.select_row(5, false, &BOUNDS);
        model.extend_to(None, Some(3), &BOUNDS);
        assert_eq!(
            model.selection(),
            Some(&Selection::Range(CellRange::new(5, 5, 0, 30)))
        );
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_row_mode_extension_ignores_missing_col() {
        let mut model = SelectionModel::new();
        model.select_row(5, false, &BOUNDS);
        model.extend_to(Some(2), None, &BOUNDS);
        assert_eq!(
            model.selection(),
            Some(&Selection::Range(CellRange::new(2, 5, 0, 30)))
        );
        assert_eq!(model.focus_cell(), Some(CellCoord::new(2, 0)));
    }

    #[test]
    fn test_select_col_with_extend() {
        let mut model = SelectionModel::new();
        model.select_col(6, false, &BOUNDS);
        model.select_col(2, true, &BOUNDS);
        assert_eq!(model.mode(), SelectionMode::Col);
        assert_eq!(
            model.selection(),
            Some(&Selection::Range(CellRange::new(0, 120, 2, 6)))
        );
    }

    #[test]
    fn test_set_anchor_extend_switches_to_cell_mode() {
        let mut model = SelectionModel::new();
        model.select_col(2, false, &BOUNDS);
        model.set_anchor(4, 4, true, &BOUNDS);
        assert_eq!(model.mode(), SelectionMode::Cell);
        assert_eq!(
            model.selection(),
            Some(&Selection::Range(CellRange::new(0, 4, 2, 4)))
        );
    }

    #[test]
    fn test_select_all() {
        let mut model = SelectionModel::new();
        model.select_all(&BOUNDS);
        assert_eq!(
            model.selected_range(),
            Some(CellRange::new(0, 120, 0, 30))
        );
        assert_eq!(model.active_cell(), Some(CellCoord::new(0, 0)));
    }

    #[test]
    fn test_move_anchor_only_in_range() {
        let (mut model, log) = recorded();
        model.set_anchor(1, 1, false, &BOUNDS);
        model.move_anchor(2, 2);
        assert_eq!(model.anchor(), Some(CellCoord::new(1, 1)));
        assert_eq!(log.borrow().len(), 1);

        model.set_anchor(3, 3, true, &BOUNDS);
        model.move_anchor(2, 2);
        assert_eq!(model.active_cell(), Some(CellCoord::new(2, 2)));
        assert_eq!(
            model.selection(),
            Some(&Selection::Range(CellRange::new(1, 3, 1, 3)))
        );
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_grow_bounds_for_column_selection() {
        let (mut model, log) = recorded();
        model.select_col(3, false, &BOUNDS);
        model.grow_bounds_on_demand(&BOUNDS);
        assert_eq!(log.borrow().len(), 1);

        model.grow_bounds_on_demand(&(400_u32, 30_u32));
        assert_eq!(
            model.selection(),
            Some(&Selection::Range(CellRange::new(0, 400, 3, 3)))
        );
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_grow_bounds_for_select_all() {
        let mut model = SelectionModel::new();
        model.select_all(&BOUNDS);
        model.grow_bounds_on_demand(&(200_u32, 60_u32));
        assert_eq!(
            model.selected_range(),
            Some(CellRange::new(0, 200, 0, 60))
        );
    }

    #[test]
    fn test_grow_bounds_leaves_plain_ranges_alone() {
        let (mut model, log) = recorded();
        model.set_anchor(2, 2, false, &BOUNDS);
        model.extend_to(Some(4), Some(4), &BOUNDS);
        model.grow_bounds_on_demand(&(999_u32, 999_u32));
        assert_eq!(
            model.selected_range(),
            Some(CellRange::new(2, 4, 2, 4))
        );
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_clear_notifies_none() {
        let (mut model, log) = recorded();
        model.set_anchor(0, 0, false, &BOUNDS);
        model.clear();
        assert_eq!(model.selection(), None);
        assert_eq!(model.anchor(), None);
        assert_eq!(log.borrow().last(), Some(&None));
    }
}
