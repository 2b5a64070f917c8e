//! Summary statistics over selected values, for a status display.

use serde::Serialize;

/// Count, sum, average and extremes of a set of cell values.
///
/// `count` includes every non-empty value; the numeric fields only consider
/// values that parse as finite numbers and are `None` when there are none.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeStats {
    pub count: usize,
    pub numeric_count: usize,
    pub sum: f64,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeStats {
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let mut stats = Self::default();
        for value in values {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            stats.count += 1;
            let Some(number) = parse_number(value) else {
                continue;
            };
            stats.numeric_count += 1;
            stats.sum += number;
            stats.min = Some(stats.min.map_or(number, |m| m.min(number)));
            stats.max = Some(stats.max.map_or(number, |m| m.max(number)));
        }
        if stats.numeric_count > 0 {
            #[allow(clippy::cast_precision_loss)]
            let n = stats.numeric_count as f64;
            stats.average = Some(stats.sum / n);
        }
        stats
    }
}

/// Numeric value of the longest leading number in `value`, ignoring leading
/// whitespace and anything after the number ("12abc" is 12). Values whose
/// number overflows to infinity count as text.
fn parse_number(value: &str) -> Option<f64> {
    leading_number(value.trim_start())?
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// `[sign] digits [. digits] [e [sign] digits]`, needing a digit in the
/// mantissa. An exponent marker without digits is left out.
fn leading_number(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits_from(sign);
    let mut has_digits = end > sign;
    if bytes.get(end) == Some(&b'.') {
        let fraction_end = digits_from(end + 1);
        has_digits |= fraction_end > end + 1;
        end = fraction_end;
    }
    if !has_digits {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_end = digits_from(exponent);
        if exponent_end > exponent {
            end = exponent_end;
        }
    }
    s.get(..end)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_mixed_values() {
        let stats = RangeStats::from_values(["10", "abc", " 2.5 ", "-4"]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.numeric_count, 3);
        assert_eq!(stats.sum, 8.5);
        assert_eq!(stats.min, Some(-4.0));
        assert_eq!(stats.max, Some(10.0));
        assert!((stats.average.unwrap() - 8.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_numbers() {
        let stats = RangeStats::from_values(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.numeric_count, 0);
        assert_eq!(stats.average, None);
        assert_eq!(stats.min, None);
    }

    #[test]
    fn test_empty_and_non_finite() {
        let stats = RangeStats::from_values(["", "inf", "NaN"]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.numeric_count, 0);
        assert_eq!(RangeStats::from_values(Vec::<String>::new()), RangeStats::default());
    }

    #[test_case("12abc" => Some(12.0); "trailing text")]
    #[test_case("  3.5e2x" => Some(350.0); "exponent then text")]
    #[test_case("-.5" => Some(-0.5); "bare fraction")]
    #[test_case("+7." => Some(7.0); "trailing point")]
    #[test_case("4e" => Some(4.0); "exponent without digits")]
    #[test_case("1e-3kg" => Some(0.001); "negative exponent")]
    #[test_case("abc" => None; "text")]
    #[test_case("-" => None; "sign only")]
    #[test_case(". 5" => None; "point only")]
    #[test_case("1e400" => None; "overflow")]
    fn test_leading_number(value: &str) -> Option<f64> {
        parse_number(value)
    }

    #[test]
    fn test_units_count_by_their_number() {
        let stats = RangeStats::from_values(["12abc", "8 kg", "n/a"]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.numeric_count, 2);
        assert_eq!(stats.sum, 20.0);
        assert_eq!(stats.average, Some(10.0));
    }
}
