use serde::{Deserialize, Serialize};

use crate::cell_ref;

/// A single grid coordinate (0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Pack into a single `u64` cache key: row in the high half, col in the low half.
    pub const fn packed(self) -> u64 {
        ((self.row as u64) << 32) | self.col as u64
    }

    /// Inverse of [`CellCoord::packed`].
    pub fn from_packed(key: u64) -> Self {
        let row = u32::try_from(key >> 32).unwrap_or(u32::MAX);
        let col = u32::try_from(key & u64::from(u32::MAX)).unwrap_or(u32::MAX);
        Self { row, col }
    }

    /// Store record id, `"row:col"`.
    pub fn record_id(self) -> String {
        cell_ref::format_record_id(self.row, self.col)
    }
}

/// Inclusive rectangle of cells in index space.
///
/// This is both the viewport contract consumed from the rendering layer and
/// the bounds of a range selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRange {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl CellRange {
    pub const fn new(start_row: u32, end_row: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start_row,
            end_row,
            start_col,
            end_col,
        }
    }

    /// Build a normalized range from two corners in any order.
    pub fn from_corners(a: CellCoord, b: CellCoord) -> Self {
        Self {
            start_row: a.row.min(b.row),
            end_row: a.row.max(b.row),
            start_col: a.col.min(b.col),
            end_col: a.col.max(b.col),
        }
    }

    pub fn single(cell: CellCoord) -> Self {
        Self::from_corners(cell, cell)
    }

    /// Top-left corner.
    pub const fn start(&self) -> CellCoord {
        CellCoord::new(self.start_row, self.start_col)
    }

    /// Bottom-right corner.
    pub const fn end(&self) -> CellCoord {
        CellCoord::new(self.end_row, self.end_col)
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        (self.start_row..=self.end_row).contains(&cell.row)
            && (self.start_col..=self.end_col).contains(&cell.col)
    }

    /// Number of cells covered (0 for an inverted range).
    pub fn cell_count(&self) -> u64 {
        if self.start_row > self.end_row || self.start_col > self.end_col {
            return 0;
        }
        let rows = u64::from(self.end_row - self.start_row) + 1;
        let cols = u64::from(self.end_col - self.start_col) + 1;
        rows.saturating_mul(cols)
    }

    /// Row-major iteration over every coordinate in the rectangle.
    pub fn coords(&self) -> impl Iterator<Item = CellCoord> {
        let (start_col, end_col) = (self.start_col, self.end_col);
        (self.start_row..=self.end_row)
            .flat_map(move |row| (start_col..=end_col).map(move |col| CellCoord::new(row, col)))
    }

    /// The cell after `cell` in row-major order, wrapping to the start of the
    /// next row and from the last cell back to the first. `backward` walks
    /// the other way.
    pub fn cycle(&self, cell: CellCoord, backward: bool) -> CellCoord {
        let (row, col) = (cell.row, cell.col);
        if backward {
            if col > self.start_col {
                CellCoord::new(row, col - 1)
            } else if row > self.start_row {
                CellCoord::new(row - 1, self.end_col)
            } else {
                self.end()
            }
        } else if col < self.end_col {
            CellCoord::new(row, col + 1)
        } else if row < self.end_row {
            CellCoord::new(row + 1, self.start_col)
        } else {
            self.start()
        }
    }
}

/// Cached state of a single cell.
///
/// `Unfetched` is never stored; it is what the cache reports for a coordinate
/// it has no entry for. A store `null` and the empty string both become
/// `Empty`, so render and statistics paths only see real content in `Value`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheEntry {
    #[default]
    Unfetched,
    Empty,
    Value(String),
}

impl CacheEntry {
    /// Entry for a fetched or written value.
    pub fn fetched(value: Option<String>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self::Value(v),
            _ => Self::Empty,
        }
    }

    pub fn is_fetched(&self) -> bool {
        !matches!(self, Self::Unfetched)
    }

    /// The non-empty value, if any.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
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

    #[test]
    fn test_packed_roundtrip_extremes() {
        for cell in [
            CellCoord::new(0, 0),
            CellCoord::new(49_999, 999),
            CellCoord::new(u32::MAX, u32::MAX),
            CellCoord::new(1, 0),
        ] {
            assert_eq!(CellCoord::from_packed(cell.packed()), cell);
        }
        assert_ne!(CellCoord::new(1, 0).packed(), CellCoord::new(0, 1).packed());
    }

    #[test]
    fn test_from_corners_normalizes() {
        let range = CellRange::from_corners(CellCoord::new(7, 2), CellCoord::new(3, 9));
        assert_eq!(range, CellRange::new(3, 7, 2, 9));
        assert_eq!(range.start(), CellCoord::new(3, 2));
        assert_eq!(range.end(), CellCoord::new(7, 9));
    }

    #[test]
    fn test_coords_row_major() {
        let coords: Vec<_> = CellRange::new(1, 2, 5, 6).coords().collect();
        assert_eq!(
            coords,
            vec![
                CellCoord::new(1, 5),
                CellCoord::new(1, 6),
                CellCoord::new(2, 5),
                CellCoord::new(2, 6),
            ]
        );
        assert_eq!(CellRange::new(1, 2, 5, 6).cell_count(), 4);
        assert_eq!(CellRange::new(3, 2, 0, 0).cell_count(), 0);
        assert_eq!(CellRange::new(3, 2, 0, 0).coords().count(), 0);
    }

    #[test]
    fn test_cache_entry_collapses_empty_string() {
        assert_eq!(CacheEntry::fetched(None), CacheEntry::Empty);
        assert_eq!(CacheEntry::fetched(Some(String::new())), CacheEntry::Empty);
        assert_eq!(
            CacheEntry::fetched(Some("x".to_string())),
            CacheEntry::Value("x".to_string())
        );
        assert!(!CacheEntry::Unfetched.is_fetched());
        assert!(CacheEntry::Empty.is_fetched());
    }

    #[test]
    fn test_range_serde_uses_camel_case() {
        let json = serde_json::to_value(CellRange::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json["startRow"], 1);
        assert_eq!(json["endCol"], 4);
    }
}
