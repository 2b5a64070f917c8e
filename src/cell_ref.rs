//! Utilities for A1-style cell addresses and store record ids.

use crate::types::CellCoord;

/// Convert a 0-based column index to letters (A, B, ..., Z, AA, AB, ...)
pub fn column_label(col: u32) -> String {
    let mut result = String::new();
    let mut n = u64::from(col) + 1; // Convert to 1-based
    while n > 0 {
        n -= 1;
        let offset = u8::try_from(n % 26).unwrap_or(0);
        result.insert(0, char::from(b'A' + offset));
        n /= 26;
    }
    result
}

/// Format a coordinate as an A1 address, e.g. `(0, 27)` -> `"AB1"`.
pub fn cell_address(row: u32, col: u32) -> String {
    format!("{}{}", column_label(col), u64::from(row) + 1)
}

/// Parse an address like "B12" into a 0-indexed coordinate.
///
/// Letters must precede digits, both parts are required, and the result must
/// fall inside `total_rows` x `total_cols`.
pub fn parse_cell_address(address: &str, total_rows: u32, total_cols: u32) -> Option<CellCoord> {
    let address = address.trim();
    let split = address.find(|ch: char| !ch.is_ascii_alphabetic())?;
    let (letters, digits) = address.split_at(split);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut col: u64 = 0;
    for b in letters.bytes() {
        let upper = b.to_ascii_uppercase();
        col = col.checked_mul(26)?.checked_add(u64::from(upper - b'A') + 1)?;
    }
    let row: u64 = digits.parse().ok()?;

    let row = u32::try_from(row.checked_sub(1)?).ok()?;
    let col = u32::try_from(col.checked_sub(1)?).ok()?;
    if row >= total_rows || col >= total_cols {
        return None;
    }
    Some(CellCoord::new(row, col))
}

/// Cell record id used by the store, `"row:col"`.
pub fn format_record_id(row: u32, col: u32) -> String {
    format!("{row}:{col}")
}

/// Parse a `"row:col"` record id.
pub fn parse_record_id(id: &str) -> Option<CellCoord> {
    let (row, col) = id.split_once(':')?;
    Some(CellCoord::new(row.parse().ok()?, col.parse().ok()?))
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

    #[test_case(0 => "A")]
    #[test_case(25 => "Z")]
    #[test_case(26 => "AA")]
    #[test_case(27 => "AB")]
    #[test_case(701 => "ZZ")]
    #[test_case(702 => "AAA")]
    fn test_column_label(col: u32) -> String {
        column_label(col)
    }

    #[test]
    fn test_cell_address_roundtrip() {
        for (row, col) in [(0, 0), (4, 7), (49_999, 999), (10, 26)] {
            let address = cell_address(row, col);
            assert_eq!(
                parse_cell_address(&address, 50_000, 1_000),
                Some(CellCoord::new(row, col)),
                "{address}"
            );
        }
    }

    #[test_case("a1" => Some(CellCoord::new(0, 0)); "lowercase")]
    #[test_case(" H5 " => Some(CellCoord::new(4, 7)); "trimmed")]
    #[test_case("A0" => None; "row zero")]
    #[test_case("1A" => None; "digits first")]
    #[test_case("A" => None; "no row")]
    #[test_case("A1B" => None; "trailing letters")]
    #[test_case("" => None; "empty")]
    #[test_case("ALM1" => None; "column past total")]
    #[test_case("A50001" => None; "row past total")]
    fn test_parse_cell_address(address: &str) -> Option<CellCoord> {
        parse_cell_address(address, 50_000, 1_000)
    }

    #[test]
    fn test_record_id() {
        assert_eq!(format_record_id(12, 3), "12:3");
        assert_eq!(parse_record_id("12:3"), Some(CellCoord::new(12, 3)));
        assert_eq!(parse_record_id("12-3"), None);
        assert_eq!(parse_record_id("x:3"), None);
    }
}
