// src/dataset/utils.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// Numbers written with comma thousands grouping, e.g. `12,345.5`.
static GROUPED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?\d{1,3}(?:,\d{3})+(?:\.\d+)?$").expect("grouped number pattern is valid")
});

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Parse a raw cell into a finite number.
///
/// Returns `None` ("missing") for empty cells, placeholders such as `N/A`,
/// and anything that parses to NaN or infinity.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cell = clean_str(raw);
    if cell.is_empty() {
        return None;
    }
    let parsed = match cell.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) if GROUPED_NUMBER.is_match(cell) => cell.replace(',', "").parse::<f64>().ok(),
        Err(_) => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Case-insensitive comparison of two cleaned cell values.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    let (a, b) = (clean_str(a), clean_str(b));
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Column keys such as `2015` are treated as numeric (year) columns.
pub fn is_numeric_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
}
