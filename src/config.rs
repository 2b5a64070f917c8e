//! Grid configuration.
//!
//! Hosts usually deserialize this from JSON (or a JS object on wasm32);
//! missing fields take the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::types::CellCoord;

/// Dimensions and tuning knobs for a [`Grid`](crate::grid::Grid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridConfig {
    pub total_rows: u32,
    pub total_cols: u32,
    /// Row height used for rows without an override.
    pub default_row_height: f64,
    /// Column width used for columns without an override.
    pub default_col_width: f64,
    /// Height of the column header band (the row axis origin).
    pub header_height: f64,
    /// Width of the row header band (the column axis origin).
    pub header_width: f64,
    /// High-water mark assumed before one is loaded from the store.
    pub initial_max_edited_row: u32,
    pub initial_max_edited_col: u32,
    /// Extra rows/cols included past the visible edge when computing the visible range.
    pub visible_margin: u32,
    /// Rows/cols of scrollable slack past the effective extent.
    pub content_slack: u32,
    /// Smallest width or height an interactive resize may set.
    pub min_resize: f64,
    /// Cell selected when the grid is created; `None` starts with no selection.
    pub initial_active_cell: Option<CellCoord>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            total_rows: 50_000,
            total_cols: 1_000,
            default_row_height: 23.0,
            default_col_width: 65.0,
            header_height: 30.0,
            header_width: 42.0,
            initial_max_edited_row: 100,
            initial_max_edited_col: 100,
            visible_margin: 5,
            content_slack: 10,
            min_resize: 20.0,
            initial_active_cell: None,
        }
    }
}

impl GridConfig {
    /// Reject configurations the axis math cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.total_rows == 0 || self.total_cols == 0 {
            return Err(GridError::Config("grid must have at least one row and column".into()));
        }
        for (name, value) in [
            ("defaultRowHeight", self.default_row_height),
            ("defaultColWidth", self.default_col_width),
            ("minResize", self.min_resize),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(GridError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        for (name, value) in [
            ("headerHeight", self.header_height),
            ("headerWidth", self.header_width),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GridError::Config(format!("{name} must not be negative, got {value}")));
            }
        }
        if let Some(cell) = self.initial_active_cell {
            if cell.row >= self.total_rows || cell.col >= self.total_cols {
                return Err(GridError::Config(format!(
                    "initialActiveCell {}:{} is outside the grid",
                    cell.row, cell.col
                )));
            }
        }
        Ok(())
    }

    /// Parse from JSON, filling missing fields with defaults, and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
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

    #[test]
    fn test_defaults_are_valid() {
        let config = GridConfig::default();
        config.validate().unwrap();
        assert_eq!(config.total_rows, 50_000);
        assert_eq!(config.default_col_width, 65.0);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = GridConfig::from_json(r#"{"totalRows": 200, "defaultRowHeight": 20}"#).unwrap();
        assert_eq!(config.total_rows, 200);
        assert_eq!(config.default_row_height, 20.0);
        assert_eq!(config.total_cols, 1_000);
        assert_eq!(config.header_width, 42.0);
    }

    #[test]
    fn test_rejects_non_positive_sizes() {
        let err = GridConfig::from_json(r#"{"defaultColWidth": 0}"#).unwrap_err();
        assert!(matches!(err, GridError::Config(ref msg) if msg.contains("defaultColWidth")));
        assert!(GridConfig::from_json(r#"{"totalCols": 0}"#).is_err());
        assert!(GridConfig::from_json(r#"{"headerHeight": -1}"#).is_err());
    }

    #[test]
    fn test_initial_active_cell() {
        assert_eq!(GridConfig::default().initial_active_cell, None);
        let config = GridConfig::from_json(r#"{"initialActiveCell": {"row": 4, "col": 7}}"#).unwrap();
        assert_eq!(config.initial_active_cell, Some(CellCoord::new(4, 7)));

        let err = GridConfig::from_json(r#"{"totalCols": 5, "initialActiveCell": {"row": 0, "col": 5}}"#)
            .unwrap_err();
        assert!(matches!(err, GridError::Config(ref msg) if msg.contains("initialActiveCell")));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            GridConfig::from_json("{"),
            Err(GridError::Json(_))
        ));
    }
}
