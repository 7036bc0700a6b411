//! Indent quantity calculation.
//!
//! The requested quantity is derived one-way from the stock ceiling and the
//! counted balance: `max(max_qty - balance, 0)`. Editors re-run this on every
//! max/balance change, overwriting whatever quantity was typed before.

/// Parse the leading integer of a free-text field.
///
/// Skips leading whitespace, accepts an optional sign, then reads digits up to
/// the first non-digit. Anything without leading digits parses as `0`, so
/// `"12 boxes"` is 12 and `""` is 0.
pub fn parse_leading_int(input: &str) -> i64 {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for c in digits.chars() {
        match c.to_digit(10) {
            Some(d) => {
                seen_digit = true;
                value = value.saturating_mul(10).saturating_add(d as i64);
            }
            None => break,
        }
    }

    if !seen_digit {
        return 0;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Indent quantity from raw editor inputs, as the string the quantity field shows.
pub fn calculate_indent_qty(max_qty: &str, current_balance: &str) -> String {
    let result = parse_leading_int(max_qty).saturating_sub(parse_leading_int(current_balance));
    if result > 0 {
        result.to_string()
    } else {
        "0".to_string()
    }
}

/// Indent quantity from typed stock values.
pub fn indent_qty(max_qty: u32, balance: u32) -> u32 {
    max_qty.saturating_sub(balance)
}

/// Whether a requested quantity is blank or a plain number no greater than zero.
///
/// Free-text quantities such as `"5x30's"` count as non-zero.
pub fn is_blank_or_zero(requested: &str) -> bool {
    let trimmed = requested.trim();
    trimmed.is_empty() || plain_number(trimmed).is_some_and(|n| n <= 0.0)
}

/// `[+-]digits[.digits]`, nothing else.
fn plain_number(input: &str) -> Option<f64> {
    let unsigned = input.strip_prefix(['+', '-']).unwrap_or(input);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !digits_only(whole) || !digits_only(fraction) {
        return None;
    }
    input.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_examples() {
        assert_eq!(calculate_indent_qty("50", "20"), "30");
        assert_eq!(calculate_indent_qty("20", "50"), "0");
        assert_eq!(calculate_indent_qty("", ""), "0");
        assert_eq!(calculate_indent_qty("40", "40"), "0");
    }

    #[test]
    fn test_non_numeric_is_zero() {
        assert_eq!(calculate_indent_qty("abc", "5"), "0");
        assert_eq!(calculate_indent_qty("10", "n/a"), "10");
        assert_eq!(calculate_indent_qty(" 12 boxes", "2.9"), "10");
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("  42"), 42);
        assert_eq!(parse_leading_int("-7x"), -7);
        assert_eq!(parse_leading_int("+3"), 3);
        assert_eq!(parse_leading_int("-"), 0);
        assert_eq!(parse_leading_int("x1"), 0);
    }

    #[test]
    fn test_blank_or_zero() {
        assert!(is_blank_or_zero(""));
        assert!(is_blank_or_zero("  "));
        assert!(is_blank_or_zero("0"));
        assert!(is_blank_or_zero("000"));
        assert!(!is_blank_or_zero("5x30's"));
        assert!(!is_blank_or_zero("12"));
    }

    #[test]
    fn test_signed_and_decimal_zero() {
        for zero in ["0.0", "-0", "+0", ".0", "0.", "-3", "-0.5", " -12 "] {
            assert!(is_blank_or_zero(zero), "{zero:?} should count as zero");
        }
        for valid in ["0.5", "+2", "1.", "3x10", "-", ".", "1e5", "inf", "1.2.3"] {
            assert!(!is_blank_or_zero(valid), "{valid:?} should be accepted");
        }
    }

    proptest! {
        #[test]
        fn prop_matches_clamped_difference(max in 0u32..1_000_000, bal in 0u32..1_000_000) {
            let got = calculate_indent_qty(&max.to_string(), &bal.to_string());
            if bal >= max {
                prop_assert_eq!(got, "0");
            } else {
                prop_assert_eq!(got, (max - bal).to_string());
            }
        }

        #[test]
        fn prop_string_and_typed_agree(max in 0u32..100_000, bal in 0u32..100_000) {
            let got = calculate_indent_qty(&max.to_string(), &bal.to_string());
            prop_assert_eq!(got, indent_qty(max, bal).to_string());
        }
    }
}
