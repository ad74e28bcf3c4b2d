//! Terminal styling for `scmlink` output.

use console::Style;

/// Verdict line for a check that passed (green checkmark).
pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

/// Verdict line for a check that failed (red cross).
pub fn error(msg: &str) -> String {
    format!("{} {}", Style::new().red().apply_to("✗"), msg)
}

/// Bold heading above a block of `key: value` lines.
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// Dimmed annotation, such as the zone after a formatted timestamp or a
/// summary under a table.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}
