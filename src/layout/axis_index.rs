//! Sparse size overrides for one axis, mapped to cumulative positions.
//!
//! Unlike a fully materialized prefix-sum table, this keeps only the indices
//! whose size differs from the default, so a 50k-row axis with a handful of
//! resized rows costs a handful of entries. Positions are memoized per index
//! and the memo is dropped wholesale on every override change.

use std::collections::HashMap;

/// Position/size/index queries over one axis (rows or columns).
#[derive(Debug, Clone)]
pub struct AxisIndex {
    total: u32,
    default_size: f64,
    overrides: HashMap<u32, f64>,
    /// Origin-relative start offset per index; cleared on every override change.
    position_cache: HashMap<u32, f64>,
    /// Overrides in ascending index order, rebuilt lazily after invalidation.
    sorted_overrides: Option<Vec<(u32, f64)>>,
}

impl AxisIndex {
    /// Create an axis of `total` entries, each `default_size` long unless overridden.
    ///
    /// `default_size` must be positive.
    pub fn new(total: u32, default_size: f64) -> Self {
        Self {
            total,
            default_size,
            overrides: HashMap::new(),
            position_cache: HashMap::new(),
            sorted_overrides: None,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn default_size(&self) -> f64 {
        self.default_size
    }

    /// Number of indices with an explicit size.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Iterate over `(index, size)` overrides in no particular order.
    pub fn overrides(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.overrides.iter().map(|(&index, &size)| (index, size))
    }

    /// Size of the entry at `index`.
    pub fn size(&self, index: u32) -> f64 {
        self.overrides
            .get(&index)
            .copied()
            .unwrap_or(self.default_size)
    }

    /// Override the size at `index`.
    ///
    /// Always invalidates the position memo, even when the size is unchanged.
    pub fn set_size(&mut self, index: u32, size: f64) {
        self.overrides.insert(index, size);
        self.invalidate();
    }

    /// Replace every override at once (used when loading persisted sizes).
    pub fn replace_overrides(&mut self, overrides: impl IntoIterator<Item = (u32, f64)>) {
        self.overrides.clear();
        self.overrides.extend(overrides);
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.position_cache.clear();
        self.sorted_overrides = None;
    }

    fn sorted_overrides(&mut self) -> &[(u32, f64)] {
        self.sorted_overrides.get_or_insert_with(|| {
            let mut sorted: Vec<(u32, f64)> = self
                .overrides
                .iter()
                .map(|(&index, &size)| (index, size))
                .collect();
            sorted.sort_unstable_by_key(|&(index, _)| index);
            sorted
        })
    }

    /// Start of `index` relative to the axis origin.
    fn offset(&mut self, index: u32) -> f64 {
        if let Some(&offset) = self.position_cache.get(&index) {
            return offset;
        }

        let default_size = self.default_size;
        let mut offset = f64::from(index) * default_size;
        for &(overridden, size) in self.sorted_overrides() {
            // Sorted ascending, so nothing past this point is below `index`.
            if overridden >= index {
                break;
            }
            offset += size - default_size;
        }

        self.position_cache.insert(index, offset);
        offset
    }

    /// Start position of `index`, measured from `origin` (e.g. the header size).
    ///
    /// `index` may equal `total` to get the far edge of the last entry.
    pub fn position(&mut self, index: u32, origin: f64) -> f64 {
        origin + self.offset(index)
    }

    /// Position just past the first `count` entries.
    pub fn extent(&mut self, count: u32, origin: f64) -> f64 {
        self.position(count.min(self.total), origin)
    }

    /// Index of the entry containing `position`, or `None` when `position` is
    /// before `origin`.
    ///
    /// Starts from the uniform-size estimate and walks toward the target, so
    /// the cost is proportional to how far overrides near the target pull the
    /// estimate off. Positions past the end resolve to the last index.
    pub fn index_at(&mut self, position: f64, origin: f64) -> Option<u32> {
        if position < origin || self.total == 0 {
            return None;
        }
        let target = position - origin;
        let last = self.total - 1;

        let mut index = estimate_index(target / self.default_size, last);

        let mut start = self.offset(index);
        if start > target {
            while start > target && index > 0 {
                index -= 1;
                start -= self.size(index);
            }
        } else {
            while index < last {
                let next = start + self.size(index);
                if next > target {
                    break;
                }
                start = next;
                index += 1;
            }
        }
        Some(index)
    }
}

/// Clamp a fractional uniform-size estimate to `[0, last]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn estimate_index(estimate: f64, last: u32) -> u32 {
    let estimate = estimate.floor();
    if estimate.is_nan() || estimate <= 0.0 {
        0
    } else if estimate >= f64::from(last) {
        last
    } else {
        estimate as u32
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
    use test_case::test_case;

    const ORIGIN: f64 = 42.0;

    #[test_case(0 => 42.0)]
    #[test_case(1 => 107.0)]
    #[test_case(3 => 237.0)]
    fn test_position_without_overrides(index: u32) -> f64 {
        let mut axis = AxisIndex::new(1000, 65.0);
        axis.position(index, ORIGIN)
    }

    #[test]
    fn test_position_with_override() {
        let mut axis = AxisIndex::new(1000, 65.0);
        axis.set_size(2, 100.0);
        assert_eq!(axis.position(2, ORIGIN), 42.0 + 2.0 * 65.0);
        assert_eq!(axis.position(3, ORIGIN), 42.0 + 3.0 * 65.0 + (100.0 - 65.0));
        assert_eq!(axis.position(3, ORIGIN), 277.0);
    }

    #[test]
    fn test_size_falls_back_to_default() {
        let mut axis = AxisIndex::new(10, 23.0);
        axis.set_size(4, 50.0);
        assert_eq!(axis.size(4), 50.0);
        assert_eq!(axis.size(5), 23.0);
        assert_eq!(axis.override_count(), 1);
    }

    #[test]
    fn test_position_is_memoized_until_override_changes() {
        let mut axis = AxisIndex::new(1000, 65.0);
        axis.set_size(1, 80.0);
        let first = axis.position(10, ORIGIN);
        assert_eq!(axis.position(10, ORIGIN), first);
        assert!(axis.position_cache.contains_key(&10));
        assert!(axis.sorted_overrides.is_some());

        axis.set_size(5, 10.0);
        assert!(axis.position_cache.is_empty());
        assert!(axis.sorted_overrides.is_none());
        assert_eq!(axis.position(10, ORIGIN), first - 55.0);
    }

    #[test]
    fn test_identical_set_size_still_invalidates() {
        let mut axis = AxisIndex::new(100, 20.0);
        axis.set_size(3, 40.0);
        axis.position(50, 0.0);
        axis.set_size(3, 40.0);
        assert!(axis.position_cache.is_empty());
    }

    #[test]
    fn test_memo_is_origin_independent() {
        let mut axis = AxisIndex::new(100, 20.0);
        assert_eq!(axis.position(5, 0.0), 100.0);
        assert_eq!(axis.position(5, 30.0), 130.0);
    }

    #[test]
    fn test_index_at_before_origin() {
        let mut axis = AxisIndex::new(100, 20.0);
        assert_eq!(axis.index_at(41.9, ORIGIN), None);
        assert_eq!(axis.index_at(ORIGIN, ORIGIN), Some(0));
    }

    #[test]
    fn test_index_at_clamps_to_last() {
        let mut axis = AxisIndex::new(100, 20.0);
        assert_eq!(axis.index_at(1.0e9, 0.0), Some(99));
        assert_eq!(AxisIndex::new(0, 20.0).index_at(10.0, 0.0), None);
    }

    #[test]
    fn test_index_at_inside_wide_override() {
        let mut axis = AxisIndex::new(100, 20.0);
        axis.set_size(0, 500.0);
        // Estimate is 12, true answer is 0.
        assert_eq!(axis.index_at(250.0, 0.0), Some(0));
        assert_eq!(axis.index_at(499.0, 0.0), Some(0));
        assert_eq!(axis.index_at(500.0, 0.0), Some(1));
    }

    #[test]
    fn test_index_at_after_narrow_overrides() {
        let mut axis = AxisIndex::new(100, 65.0);
        for i in 0..3 {
            axis.set_size(i, 10.0);
        }
        // Estimate is 0, true answer is 3 (cols 0..3 span 0..30).
        assert_eq!(axis.index_at(30.0, 0.0), Some(3));
        assert_eq!(axis.index_at(29.0, 0.0), Some(2));
        assert_eq!(axis.index_at(94.0, 0.0), Some(3));
        assert_eq!(axis.index_at(95.0, 0.0), Some(4));
    }

    #[test]
    fn test_position_index_roundtrip_for_override_sets() {
        let override_sets: Vec<Vec<(u32, f64)>> = vec![
            vec![],
            vec![(2, 100.0)],
            vec![(0, 1.0), (1, 1.0), (2, 1.0)],
            vec![(10, 300.0), (11, 5.0), (12, 300.0), (400, 2.0)],
            (0..200).step_by(3).map(|i| (i, 7.0)).collect(),
            (50..120).map(|i| (i, 150.0)).collect(),
        ];

        for overrides in override_sets {
            let mut axis = AxisIndex::new(500, 23.0);
            for &(index, size) in &overrides {
                axis.set_size(index, size);
            }
            for i in 0..500 {
                let pos = axis.position(i, 30.0);
                assert_eq!(axis.index_at(pos, 30.0), Some(i), "overrides {overrides:?}");
                // A point in the middle of the entry resolves to it as well.
                let mid = pos + axis.size(i) / 2.0;
                assert_eq!(axis.index_at(mid, 30.0), Some(i));
            }
        }
    }

    #[test]
    fn test_replace_overrides() {
        let mut axis = AxisIndex::new(100, 20.0);
        axis.set_size(1, 99.0);
        axis.position(10, 0.0);
        axis.replace_overrides([(3, 40.0), (4, 40.0)]);
        assert_eq!(axis.size(1), 20.0);
        assert_eq!(axis.position(10, 0.0), 240.0);
        assert_eq!(axis.override_count(), 2);
    }

    #[test]
    fn test_extent() {
        let mut axis = AxisIndex::new(10, 20.0);
        axis.set_size(9, 50.0);
        assert_eq!(axis.extent(10, 0.0), 230.0);
        assert_eq!(axis.extent(1000, 0.0), 230.0);
    }
}
