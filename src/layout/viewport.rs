//! Viewport state: scroll offsets and the canvas size.

use super::AxisIndex;

/// Visible area of the grid.
///
/// Scroll offsets are in sheet coordinates; the headers stay pinned, so the
/// cell at sheet position `p` is drawn at `p - scroll`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Horizontal scroll position
    pub scroll_x: f64,
    /// Vertical scroll position
    pub scroll_y: f64,
    /// Viewport width in pixels, headers included
    pub width: f64,
    /// Viewport height in pixels, headers included
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            scroll_x: 0.0,
            scroll_y: 0.0,
            width,
            height,
        }
    }

    /// Rows intersecting the viewport, inclusive, padded by `margin` past the bottom edge.
    pub fn visible_rows(&self, rows: &mut AxisIndex, header_height: f64, margin: u32) -> (u32, u32) {
        visible_span(rows, self.scroll_y, self.height, header_height, margin)
    }

    /// Columns intersecting the viewport, inclusive, padded by `margin` past the right edge.
    pub fn visible_cols(&self, cols: &mut AxisIndex, header_width: f64, margin: u32) -> (u32, u32) {
        visible_span(cols, self.scroll_x, self.width, header_width, margin)
    }

    /// Convert screen coordinates to sheet coordinates.
    pub fn to_sheet(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (screen_x + self.scroll_x, screen_y + self.scroll_y)
    }

    /// Convert sheet coordinates to screen coordinates.
    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.scroll_x, y - self.scroll_y)
    }

    /// Clamp scroll to `[0, content - viewport]` on each axis.
    pub fn clamp_scroll(&mut self, content_width: f64, content_height: f64) {
        let max_x = (content_width - self.width).max(0.0);
        let max_y = (content_height - self.height).max(0.0);
        self.scroll_x = self.scroll_x.clamp(0.0, max_x);
        self.scroll_y = self.scroll_y.clamp(0.0, max_y);
    }
}

/// Hit-test the first cell past the header and the far edge on one axis.
///
/// A viewport no larger than the header shows nothing past `start`.
fn visible_span(axis: &mut AxisIndex, scroll: f64, extent: f64, header: f64, margin: u32) -> (u32, u32) {
    let last = axis.total().saturating_sub(1);
    let start = axis.index_at(scroll + header + 1.0, header).unwrap_or(0);
    let end = axis.index_at(scroll + extent, header).unwrap_or(start).max(start);
    (start, end.saturating_add(margin).min(last))
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
    fn test_visible_rows_at_top() {
        let mut rows = AxisIndex::new(50_000, 23.0);
        let viewport = Viewport::new(800.0, 600.0);
        // (600 - 30) / 23 = 24.8, so row 24 is the last partially visible row.
        assert_eq!(viewport.visible_rows(&mut rows, 30.0, 5), (0, 29));
    }

    #[test]
    fn test_visible_cols_after_scroll() {
        let mut cols = AxisIndex::new(1000, 65.0);
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.scroll_x = 650.0;
        // First visible col: 650 + 1 / 65 -> 10. Far edge: (650 + 800 - 42) / 65 = 21.6.
        assert_eq!(viewport.visible_cols(&mut cols, 42.0, 5), (10, 26));
    }

    #[test]
    fn test_visible_span_clamps_to_total() {
        let mut cols = AxisIndex::new(8, 65.0);
        let viewport = Viewport::new(2000.0, 600.0);
        assert_eq!(viewport.visible_cols(&mut cols, 42.0, 5), (0, 7));
    }

    #[test]
    fn test_viewport_smaller_than_header() {
        let mut rows = AxisIndex::new(100, 23.0);
        let viewport = Viewport::new(0.0, 0.0);
        assert_eq!(viewport.visible_rows(&mut rows, 30.0, 5), (0, 5));
    }

    #[test]
    fn test_coordinate_conversion() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.scroll_x = 100.0;
        viewport.scroll_y = 50.0;
        assert_eq!(viewport.to_sheet(10.0, 20.0), (110.0, 70.0));
        assert_eq!(viewport.to_screen(110.0, 70.0), (10.0, 20.0));
    }

    #[test]
    fn test_clamp_scroll() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.scroll_x = -20.0;
        viewport.scroll_y = 5000.0;
        viewport.clamp_scroll(1000.0, 1000.0);
        assert_eq!(viewport.scroll_x, 0.0);
        assert_eq!(viewport.scroll_y, 400.0);

        viewport.clamp_scroll(100.0, 100.0);
        assert_eq!((viewport.scroll_x, viewport.scroll_y), (0.0, 0.0));
    }
}
