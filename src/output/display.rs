//! Styled terminal display helpers.
//!
//! Pure string builders so the styling can be tested; [`super::Output`]
//! decides whether color is on and where the text goes.

use std::io::IsTerminal;

use unicode_width::UnicodeWidthStr;

/// ANSI color codes.
pub mod colors {
    /// Reset all formatting
    pub const RESET: &str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &str = "\x1b[1m";
    /// Dimmed text
    pub const DIM: &str = "\x1b[2m";
    /// Cyan text (headers)
    pub const CYAN: &str = "\x1b[36m";
    /// Green text (success, values)
    pub const GREEN: &str = "\x1b[32m";
    /// Yellow text (warnings)
    pub const YELLOW: &str = "\x1b[33m";
    /// Red text (errors)
    pub const RED: &str = "\x1b[31m";
}

/// Check if stdout is a terminal (TTY)
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if color { format!("{code}{text}{}", colors::RESET) } else { text.to_string() }
}

/// A title underlined to its display width.
pub fn header(title: &str, color: bool) -> String {
    let rule = "─".repeat(title.width());
    format!(
        "{}\n{}",
        paint(title, &format!("{}{}", colors::BOLD, colors::CYAN), color),
        paint(&rule, colors::DIM, color)
    )
}

/// `key: value` lines with the values aligned.
pub fn key_values(pairs: &[(&str, &str)], color: bool) -> String {
    let width = pairs.iter().map(|(k, _)| k.width()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in pairs {
        let label = format!("{key}:{}", " ".repeat(width - key.width()));
        out.push_str(&format!(
            "{} {}\n",
            paint(&label, colors::DIM, color),
            paint(value, colors::GREEN, color)
        ));
    }
    out
}

/// A status line prefixed with a symbol.
pub fn status(symbol: &str, code: &str, message: &str, color: bool) -> String {
    format!("{} {message}", paint(symbol, code, color))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_values_aligned() {
        let text = key_values(&[("URL", "https://hub.example.com"), ("Password", "x")], false);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "URL:      https://hub.example.com");
        assert_eq!(lines[1], "Password: x");
    }

    #[test]
    fn test_header_without_color() {
        assert_eq!(header("Plan", false), "Plan\n────");
    }

    #[test]
    fn test_color_codes() {
        assert!(status("✓", colors::GREEN, "done", true).starts_with(colors::GREEN));
        assert_eq!(status("✓", colors::GREEN, "done", false), "✓ done");
    }
}
