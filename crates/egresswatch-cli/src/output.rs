//! Formatted output helpers for CLI commands.

/// Bold ANSI prefix.
pub const BOLD: &str = "\x1b[1m";
/// Dim ANSI prefix.
pub const DIM: &str = "\x1b[2m";
/// Green ANSI prefix.
pub const GREEN: &str = "\x1b[32m";
/// Yellow ANSI prefix.
pub const YELLOW: &str = "\x1b[33m";
/// ANSI reset.
pub const RESET: &str = "\x1b[0m";

/// Formats a 0..1 rate as a percentage with one decimal.
#[must_use]
pub fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_percent_one_decimal() {
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(0.5), "50.0%");
        assert_eq!(format_percent(6.0 / 51.0), "11.8%");
    }
}
