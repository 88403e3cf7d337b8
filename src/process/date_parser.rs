use chrono::NaiveDate;

use crate::process::utils::clean_str;

/// Parse `"YYYY-MM-DD"` or `"DD/MM/YYYY"`, ignoring any trailing time part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = clean_str(s);
    let day_part = s.split(|c: char| c == ' ' || c == 'T').next()?;

    NaiveDate::parse_from_str(day_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day_part, "%d/%m/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_and_brazilian_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(parse_date("2025-01-31"), Some(d));
        assert_eq!(parse_date("31/01/2025"), Some(d));
        assert_eq!(parse_date("\"2025-01-31\""), Some(d));
        assert_eq!(parse_date("2025-01-31 00:00:00"), Some(d));
        assert_eq!(parse_date("2025-01-31T00:00:00"), Some(d));
    }

    #[test]
    fn malformed_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2025-13-01"), None);
        assert_eq!(parse_date("31/02/2025"), None);
        assert_eq!(parse_date("yesterday"), None);
    }
}
