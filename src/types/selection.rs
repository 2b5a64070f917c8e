use serde::{Deserialize, Serialize};

use super::{CellCoord, CellRange};

/// How a range selection is recomputed on extension and growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Standard cell selection (default)
    #[default]
    Cell,
    /// Entire row(s) selected
    Row,
    /// Entire column(s) selected
    Col,
}

/// Current selection shape. "Nothing selected" is `Option::<Selection>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Selection {
    Cell(CellCoord),
    Range(CellRange),
}

impl Selection {
    /// Rectangle covered by this selection.
    pub fn bounds(&self) -> CellRange {
        match *self {
            Selection::Cell(cell) => CellRange::single(cell),
            Selection::Range(range) => range,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Selection::Range(_))
    }
}

/// One step of keyboard navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Parse a `KeyboardEvent.key` arrow name (`"ArrowUp"`) or a plain
    /// direction (`"up"`).
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" | "up" => Some(Self::Up),
            "ArrowDown" | "down" => Some(Self::Down),
            "ArrowLeft" | "left" => Some(Self::Left),
            "ArrowRight" | "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// The neighbouring cell, clamped to a `total_rows` x `total_cols` grid.
    pub fn step(self, cell: CellCoord, total_rows: u32, total_cols: u32) -> CellCoord {
        let last_row = total_rows.saturating_sub(1);
        let last_col = total_cols.saturating_sub(1);
        match self {
            Self::Up => CellCoord::new(cell.row.saturating_sub(1), cell.col),
            Self::Down => CellCoord::new(cell.row.saturating_add(1).min(last_row), cell.col),
            Self::Left => CellCoord::new(cell.row, cell.col.saturating_sub(1)),
            Self::Right => CellCoord::new(cell.row, cell.col.saturating_add(1).min(last_col)),
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
    use test_case::test_case;

    #[test_case(Direction::Up, (0, 3) => (0, 3); "up at top edge")]
    #[test_case(Direction::Up, (5, 3) => (4, 3); "up")]
    #[test_case(Direction::Down, (9, 3) => (9, 3); "down at last row")]
    #[test_case(Direction::Left, (2, 0) => (2, 0); "left at first col")]
    #[test_case(Direction::Right, (2, 4) => (2, 4); "right at last col")]
    #[test_case(Direction::Right, (2, 1) => (2, 2); "right")]
    fn test_step_clamps(direction: Direction, from: (u32, u32)) -> (u32, u32) {
        let next = direction.step(CellCoord::new(from.0, from.1), 10, 5);
        (next.row, next.col)
    }

    #[test]
    fn test_from_key() {
        assert_eq!(Direction::from_key("ArrowLeft"), Some(Direction::Left));
        assert_eq!(Direction::from_key("down"), Some(Direction::Down));
        assert_eq!(Direction::from_key("Tab"), None);
    }

    #[test]
    fn test_cycle_wraps_rows_and_range() {
        let range = CellRange::new(1, 2, 3, 4);
        assert_eq!(range.cycle(CellCoord::new(1, 3), false), CellCoord::new(1, 4));
        assert_eq!(range.cycle(CellCoord::new(1, 4), false), CellCoord::new(2, 3));
        assert_eq!(range.cycle(CellCoord::new(2, 4), false), CellCoord::new(1, 3));
        assert_eq!(range.cycle(CellCoord::new(2, 3), true), CellCoord::new(1, 4));
        assert_eq!(range.cycle(CellCoord::new(1, 3), true), CellCoord::new(2, 4));
    }
}
