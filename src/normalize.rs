use rust_decimal::Decimal;
use std::str::FromStr;

/// Amount of characters the join key is made of.
const KEY_LEN: usize = 8;

/// Strip all whitespace from `raw` and recover the digit string of numeric identifiers.
///
/// Spreadsheet tools like to turn long card numbers into floats, so `"3.08103E+17"` comes back
/// as `"308103000000000000"`. Anything that isn't a finite number is returned uppercased.
pub fn normalize_identifier(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match stripped.parse::<f64>() {
        Ok(number) if number.is_finite() => {
            let integer = number.trunc();
            if integer == 0.0 {
                "0".into()
            } else {
                format!("{integer:.0}")
            }
        }
        _ => stripped.to_uppercase(),
    }
}

/// Extract the join key from a normalized card or account identifier.
///
/// Identifiers of 9 characters or more carry a trailing check character, and the key is made of
/// the 8 characters before it, i.e. `30810324975248MC` yields `4975248M`.
/// Shorter identifiers are used as they are.
pub fn extract_join_key(normalized: &str) -> String {
    let normalized = normalized.trim().to_uppercase();
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();
    if len > KEY_LEN {
        chars[len - KEY_LEN - 1..len - 1].iter().collect()
    } else {
        normalized
    }
}

/// Normalize a value that already is the join key, without applying the key window.
pub fn normalize_direct_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Return the last whitespace-separated token of `full_name`, uppercased, or an empty string.
pub fn extract_surname(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .last()
        .map(str::to_uppercase)
        .unwrap_or_default()
}

/// Trim and uppercase a name that is already a surname, keeping all of its tokens.
pub fn normalize_full_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Turn a decimal comma into a decimal point.
pub fn normalize_decimal_literal(raw: &str) -> String {
    raw.replace(',', ".")
}

/// Parse an amount, returning `None` for empty or unparsable input.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let literal = normalize_decimal_literal(raw);
    let literal = literal.trim();
    if literal.is_empty() {
        return None;
    }
    Decimal::from_str(literal)
        .or_else(|_| Decimal::from_scientific(literal))
        .ok()
}

/// Parse a date as it appears in the exports, returning `None` if it can't be understood.
///
/// Supported are spreadsheet serial day numbers, ISO dates and day-first dates separated by
/// `.`, `/` or `-`. A time of day following the date is ignored.
pub fn parse_date(raw: &str) -> Option<time::Date> {
    use time::macros::format_description;
    static FORMATS: &[&[time::format_description::FormatItem<'static>]] = &[
        format_description!("[year]-[month]-[day]"),
        format_description!("[day padding:none].[month padding:none].[year]"),
        format_description!("[day padding:none]/[month padding:none]/[year]"),
        format_description!("[day padding:none]-[month padding:none]-[year]"),
    ];

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit() || b == b'.') && raw.bytes().filter(|b| *b == b'.').count() <= 1 {
        if let Ok(serial) = raw.parse::<f64>() {
            return from_serial_day(serial);
        }
    }
    let date = raw.split_whitespace().next()?;
    FORMATS
        .iter()
        .find_map(|format| time::Date::parse(date, format).ok())
}

fn from_serial_day(serial: f64) -> Option<time::Date> {
    let epoch = time::macros::date!(1899 - 12 - 30);
    let days = serial.trunc();
    if !(0.0..=2_958_465.0).contains(&days) {
        return None;
    }
    epoch.checked_add(time::Duration::days(days as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_in_scientific_notation_become_digit_strings() {
        assert_eq!(normalize_identifier("3.08103E+17"), "308103000000000000");
        assert_eq!(normalize_identifier(" 3081 0324 "), "30810324");
        assert_eq!(normalize_identifier("30810324975248mc"), "30810324975248MC");
        assert_eq!(normalize_identifier("12.9"), "12");
        assert_eq!(normalize_identifier("-0.4"), "0");
        assert_eq!(normalize_identifier("nan"), "NAN");
        assert_eq!(normalize_identifier(""), "");
    }

    #[test]
    fn join_key_window() {
        assert_eq!(extract_join_key("30810324975248MC"), "4975248M");
        assert_eq!(extract_join_key("123456789"), "12345678");
        assert_eq!(extract_join_key("ABCDEFGH"), "ABCDEFGH");
        assert_eq!(extract_join_key("ABC"), "ABC");
        assert_eq!(extract_join_key(""), "");
    }

    #[test]
    fn surnames() {
        assert_eq!(extract_surname("  John  Smith "), "SMITH");
        assert_eq!(extract_surname("kowalski"), "KOWALSKI");
        assert_eq!(extract_surname("   "), "");
        assert_eq!(normalize_full_name(" van dyke "), "VAN DYKE");
    }

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("100,05"), Some(Decimal::new(10005, 2)));
        assert_eq!(parse_amount(" 250.00 "), Some(Decimal::new(25000, 2)));
        assert_eq!(parse_amount("1e2"), Some(Decimal::new(100, 0)));
        assert_eq!(parse_amount("1.234,56"), None);
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn dates() {
        use time::macros::date;
        assert_eq!(parse_date("2025-08-03"), Some(date!(2025 - 08 - 03)));
        assert_eq!(parse_date("3.8.2025"), Some(date!(2025 - 08 - 03)));
        assert_eq!(parse_date("03/08/2025 14:00"), Some(date!(2025 - 08 - 03)));
        assert_eq!(parse_date("45000"), Some(date!(2023 - 03 - 15)));
        assert_eq!(parse_date("45000.75"), Some(date!(2023 - 03 - 15)));
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }
}
