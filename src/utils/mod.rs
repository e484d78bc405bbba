//! Common utilities and helpers

pub mod logging;

/// Utility functions for framecut
pub struct Utils;

impl Utils {
    /// Format file size for display
    pub fn format_file_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Mask a secret for display, keeping a short prefix
    pub fn redact(secret: &str) -> String {
        if secret.is_empty() {
            return "(not set)".to_string();
        }
        let prefix: String = secret.chars().take(4).collect();
        format!("{}****", prefix)
    }
}
