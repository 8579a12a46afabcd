/// Keeps the first `max_chars` characters, appending "..." when something was cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Keeps the first `max_chars` characters without a marker.
pub fn take_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Rounds to two decimal places, as every reported average is.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
