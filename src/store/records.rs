//! Typed records stored in each [`Collection`](super::Collection).

use serde::{Deserialize, Serialize};

use crate::types::CellCoord;

/// Id of the singleton high-water-mark record.
pub const HIGH_WATER_ID: &str = "maxEdited";

/// One cell value, `{id: "row:col", value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl CellRecord {
    pub fn new(cell: CellCoord, value: impl Into<String>) -> Self {
        Self {
            id: cell.record_id(),
            value: Some(value.into()),
        }
    }
}

/// Column width override, `{id: col, width}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnWidthRecord {
    pub id: u32,
    pub width: f64,
}

/// Row height override, `{id: row, height}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowHeightRecord {
    pub id: u32,
    pub height: f64,
}

/// Furthest row/column ever written, `{id: "maxEdited", row, col}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighWaterRecord {
    pub id: String,
    #[serde(default)]
    pub row: u32,
    #[serde(default)]
    pub col: u32,
}

impl HighWaterRecord {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            id: HIGH_WATER_ID.to_string(),
            row,
            col,
        }
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
    use serde_json::json;

    #[test]
    fn test_cell_record_shape() {
        let record = CellRecord::new(CellCoord::new(3, 4), "hello");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"id": "3:4", "value": "hello"})
        );
    }

    #[test]
    fn test_cell_record_null_value() {
        let record: CellRecord = serde_json::from_value(json!({"id": "0:0", "value": null})).unwrap();
        assert_eq!(record.value, None);
        let record: CellRecord = serde_json::from_value(json!({"id": "0:0"})).unwrap();
        assert_eq!(record.value, None);
    }

    #[test]
    fn test_size_records_use_axis_field_names() {
        assert_eq!(
            serde_json::to_value(ColumnWidthRecord { id: 2, width: 90.0 }).unwrap(),
            json!({"id": 2, "width": 90.0})
        );
        let row: RowHeightRecord =
            serde_json::from_value(json!({"id": 5, "height": 40})).unwrap();
        assert_eq!(row.height, 40.0);
    }

    #[test]
    fn test_high_water_record_defaults_missing_fields() {
        let record: HighWaterRecord = serde_json::from_value(json!({"id": "maxEdited"})).unwrap();
        assert_eq!((record.row, record.col), (0, 0));
    }
}
