//! Date and amount parsing for the locale conventions that show up in the
//! supported statement formats: Italian decimal-comma amounts, US
//! decimal-dot amounts, DD/MM/YYYY dates and Excel serial dates.

/// Convert DD/MM/YYYY to YYYY-MM-DD. Returns None on anything else.
pub fn parse_italian_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let d: u32 = parts[0].parse().ok()?;
    let m: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Convert an Excel date serial to YYYY-MM-DD.
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    let date = base + chrono::Duration::days(serial as i64);
    date.format("%Y-%m-%d").to_string()
}

/// Accept a date that is already ISO or in DD/MM/YYYY form.
pub fn to_iso_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let bytes = raw.as_bytes();
    let is_iso = raw.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && raw.chars().filter(|c| c.is_ascii_digit()).count() == 8;
    if is_iso {
        return Some(raw.to_string());
    }
    parse_italian_date(raw)
}

/// Parse an Italian-formatted amount ("1.234,56", "-1.234,56 €").
/// Empty and placeholder inputs ("", "-") yield None, never an error.
pub fn parse_italian_amount(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let cleaned = s.replace('€', "").replace(char::is_whitespace, "");
    let cleaned = cleaned.replace('.', "").replace(',', ".");
    cleaned.parse().ok()
}

/// Parse a US-formatted amount ("1,234.56", "$500.00").
pub fn parse_us_amount(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|&c| c != '$' && c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse().ok()
}

/// Auto-detect the convention from the separators present. When both appear
/// the rightmost one is the decimal separator; a lone comma means the
/// Italian convention, a lone dot (or none) the US one.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');
    match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            if c > d {
                parse_italian_amount(s)
            } else {
                parse_us_amount(s)
            }
        }
        (Some(_), None) => parse_italian_amount(s),
        _ => parse_us_amount(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_italian_date() {
        assert_eq!(parse_italian_date("25/12/2024"), Some("2024-12-25".to_string()));
        assert_eq!(parse_italian_date("01/01/2025"), Some("2025-01-01".to_string()));
        assert_eq!(parse_italian_date("2024-12-25"), None);
        assert_eq!(parse_italian_date("invalid"), None);
    }

    #[test]
    fn test_parse_italian_date_rejects_invalid_dates() {
        assert_eq!(parse_italian_date("32/01/2025"), None); // day 32
        assert_eq!(parse_italian_date("30/02/2025"), None); // Feb 30
        assert_eq!(parse_italian_date("15/00/2025"), None); // month 0
    }

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(excel_serial_to_date(45667.0), "2025-01-10");
        assert_eq!(excel_serial_to_date(1.0), "1899-12-31");
    }

    #[test]
    fn test_to_iso_date() {
        assert_eq!(to_iso_date("2024-12-25"), Some("2024-12-25".to_string()));
        assert_eq!(to_iso_date("25/12/2024"), Some("2024-12-25".to_string()));
        assert_eq!(to_iso_date(""), None);
        assert_eq!(to_iso_date("yesterday"), None);
    }

    #[test]
    fn test_parse_italian_amount() {
        assert_eq!(parse_italian_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_italian_amount("-1.234,56"), Some(-1234.56));
        assert_eq!(parse_italian_amount("234,56"), Some(234.56));
        assert_eq!(parse_italian_amount("1.234,56 €"), Some(1234.56));
        assert_eq!(parse_italian_amount(""), None);
        assert_eq!(parse_italian_amount("-"), None);
        assert_eq!(parse_italian_amount("abc"), None);
    }

    #[test]
    fn test_parse_us_amount() {
        assert_eq!(parse_us_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_us_amount("$500.00"), Some(500.0));
        assert_eq!(parse_us_amount("-42.5"), Some(-42.5));
        assert_eq!(parse_us_amount("-"), None);
    }

    #[test]
    fn test_parse_amount_auto_detects_convention() {
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("234,56"), Some(234.56));
        assert_eq!(parse_amount("234.56"), Some(234.56));
        assert_eq!(parse_amount("234"), Some(234.0));
        assert_eq!(parse_amount(""), None);
    }
}
