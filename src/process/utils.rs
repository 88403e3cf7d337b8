use rust_decimal::Decimal;
use std::str::FromStr;

use crate::model::Sign;

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// 2) Parse a locale amount (`1.234,56`, `-100,50`, `100.5`) into magnitude + sign.
///
/// With a comma present, dots are thousands separators. Without one, the value is
/// already dot-decimal.
pub fn parse_amount(raw: &str) -> Option<(Decimal, Sign)> {
    let s = clean_str(raw);
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (Sign::Negative, rest.trim_start()),
        None => (Sign::Positive, s.strip_prefix('+').unwrap_or(s).trim_start()),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }

    let dotted = if digits.contains(',') {
        if digits.matches(',').count() > 1 {
            return None;
        }
        digits.replace('.', "").replace(',', ".")
    } else {
        digits.to_string()
    };

    let value = Decimal::from_str(&dotted).ok()?;
    // "-0,00" is still zero
    let sign = if value.is_zero() { Sign::Positive } else { sign };
    Some((value, sign))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_str_strips_quotes_and_spaces() {
        assert_eq!(clean_str("  \"411\"  "), "411");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_str(" abc "), "abc");
    }

    #[test]
    fn comma_decimal_becomes_dot_decimal() {
        assert_eq!(parse_amount("100,50"), Some((Decimal::new(10050, 2), Sign::Positive)));
        assert_eq!(parse_amount("200,00"), Some((Decimal::new(200, 0), Sign::Positive)));
        assert_eq!(
            parse_amount("1.234.567,89"),
            Some((Decimal::new(123456789, 2), Sign::Positive))
        );
    }

    #[test]
    fn sign_is_kept_apart_from_magnitude() {
        assert_eq!(parse_amount("-100,50"), Some((Decimal::new(10050, 2), Sign::Negative)));
        assert_eq!(parse_amount("+7"), Some((Decimal::new(7, 0), Sign::Positive)));
        assert_eq!(parse_amount("-0,00"), Some((Decimal::ZERO, Sign::Positive)));
    }

    #[test]
    fn dot_decimal_is_accepted_as_is() {
        assert_eq!(parse_amount("100.5"), Some((Decimal::new(1005, 1), Sign::Positive)));
    }

    #[test]
    fn garbage_is_rejected() {
        for bad in ["", "-", "abc", "12a,00", "1,2,3", "1 000,00", "--1"] {
            assert_eq!(parse_amount(bad), None, "{bad:?}");
        }
    }
}
