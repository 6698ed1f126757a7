//! Text and value normalization shared by every pass.
//!
//! All functions are total: garbage in maps to `None`, never a panic.

/// Trim + lowercase. Absent or blank input is `None`.
pub fn normalize_text(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Parse a number, tolerating surrounding whitespace and thousands separators.
pub fn parse_numeric(raw: Option<&str>) -> Option<f64> {
    let cleaned: String = raw?.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse `"21%"` / `"21"` as a fraction (`0.21`).
pub fn parse_percentage(raw: Option<&str>) -> Option<f64> {
    let cleaned = raw?.replace('%', "");
    parse_numeric(Some(&cleaned)).map(|v| v / 100.0)
}

/// Identifier-like field: all ASCII digits after trimming. Leading zeros kept.
pub fn parse_digit_string(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// True when a raw cell is absent or whitespace only.
pub fn is_blank(raw: Option<&str>) -> bool {
    raw.map_or(true, |s| s.trim().is_empty())
}
