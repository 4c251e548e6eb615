//! pt-BR number formatting for counts, BRL amounts and coordinates.

/// Groups the digits of `value` with `.` every three places.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// `1234567` -> `1.234.567`.
pub fn format_number(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Whole-real BRL amount, e.g. `R$ 12.346`. Non-finite values print as zero.
pub fn format_currency(value: f64) -> String {
    let safe = if value.is_finite() { value } else { 0.0 };
    let rounded = safe.abs().round();
    let sign = if safe < 0.0 && rounded > 0.0 { "-" } else { "" };
    format!("{sign}R$ {}", group_thousands(&format!("{rounded:.0}")))
}

/// `lat, lon` with four decimals, or a placeholder when unknown.
pub fn format_coordinates(coords: Option<(f64, f64)>) -> String {
    match coords {
        Some((lat, lon)) => format!("{lat:.4}, {lon:.4}"),
        None => "Not provided".to_string(),
    }
}

/// Cuts `text` to `max_chars` characters, appending `...` when shortened.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
