//! Display formatting for metric values.
//!
//! One placeholder rule: any unset value renders as [`NOT_AVAILABLE`],
//! without its unit suffix.

/// Placeholder for unset values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Plain number, e.g. `1234.5` or `12`.
pub fn number(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Plain number followed by a unit, e.g. `1234.5 tonnes`.
pub fn quantity(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v} {unit}"))
}

/// Two-decimal percentage, e.g. `35.50%`.
pub fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.2}%"))
}

/// Integer count, no separators.
pub fn count(value: Option<i64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Rounded with thousands separators, e.g. `12,345`.
pub fn thousands(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), group_thousands)
}

/// Rounded with thousands separators and a unit, e.g. `1,200 hours`.
pub fn thousands_with_unit(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |v| format!("{} {unit}", group_thousands(v)),
    )
}

/// Free text, or the placeholder.
pub fn text(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if grouped == "0" {
        // Avoid "-0" for small negative values.
        return grouped;
    }
    format!("{sign}{grouped}")
}
