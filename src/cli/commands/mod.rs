//! Command implementations.

pub mod completions;
pub mod conversations;
pub mod messages;
pub mod people;
pub mod status;
pub mod version;

/// Format a byte count as a human-readable size.
pub(crate) fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
