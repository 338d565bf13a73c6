//! Output formatting for the CLI.
//!
//! Supports multiple output formats:
//! - `table` - Human-readable table (default)
//! - `json` - Structured JSON
//! - `yaml` - YAML format
//! - `jsonl` - JSON Lines (one object per line)

mod display;
mod table;

pub use display::{colors, is_terminal};
pub use table::TableFormatter;

use serde::Serialize;

use crate::error::Result;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
    /// JSON Lines format (one object per line).
    JsonLines,
}

impl OutputFormat {
    /// Parse an output format from a string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "jsonl" | "jsonlines" => Ok(Self::JsonLines),
            _ => Err(crate::error::Error::invalid_arg(format!(
                "Unknown output format '{s}'. Use: table, json, yaml, jsonl"
            ))),
        }
    }
}

/// Types that can be displayed as table rows.
pub trait Displayable {
    /// Display as a table row.
    fn table_row(&self) -> Vec<String>;

    /// Get column headers for table display.
    fn table_headers() -> Vec<&'static str>;

    /// Per-column width caps; longer cells are truncated.
    fn column_widths() -> Vec<Option<usize>> {
        Vec::new()
    }
}

/// Render items as a table with their headers and column caps.
pub fn render_table<T: Displayable>(items: &[T]) -> String {
    let mut formatter = TableFormatter::new();
    formatter.headers(T::table_headers()).max_widths(T::column_widths());
    for item in items {
        formatter.row(item.table_row());
    }
    formatter.render()
}

/// Output writer that handles format selection and terminal capabilities.
#[derive(Debug, Clone)]
pub struct Output {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Output {
    /// Create a new output writer.
    pub fn new(format: OutputFormat, color: bool, quiet: bool) -> Self {
        Self { format, color, quiet }
    }

    /// Create an output writer from CLI options.
    pub fn from_cli(format: &str, color: &str, quiet: bool) -> Result<Self> {
        let format = OutputFormat::parse(format)?;

        let color = match color {
            "always" => true,
            "never" => false,
            _ => is_terminal(),
        };

        Ok(Self::new(format, color, quiet))
    }

    /// Output a single serializable value.
    ///
    /// Table mode has no generic rendering, so it falls back to YAML.
    pub fn value<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.json(value),
            OutputFormat::Yaml | OutputFormat::Table => self.yaml(value),
            OutputFormat::JsonLines => self.jsonl(value),
        }
    }

    /// Output a list of items as a table.
    pub fn table<T: Displayable + Serialize>(&self, items: &[T]) -> Result<()> {
        match self.format {
            OutputFormat::Table => {
                print!("{}", render_table(items));
                Ok(())
            }
            OutputFormat::Json => self.json(items),
            OutputFormat::Yaml => self.yaml(items),
            OutputFormat::JsonLines => {
                for item in items {
                    self.jsonl(item)?;
                }
                Ok(())
            }
        }
    }

    /// Output labelled values; structured formats get `structured` instead.
    pub fn key_values<T: Serialize + ?Sized>(
        &self,
        title: &str,
        pairs: &[(&str, &str)],
        structured: &T,
    ) -> Result<()> {
        if self.format == OutputFormat::Table {
            println!("{}", display::header(title, self.color));
            print!("{}", display::key_values(pairs, self.color));
            Ok(())
        } else {
            self.value(structured)
        }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn yaml<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        print!("{}", serde_yaml::to_string(value)?);
        Ok(())
    }

    fn jsonl<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }

    /// Print a message to stderr (info, progress).
    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }

    /// Print a success message.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", display::status("✓", colors::GREEN, message, self.color));
        }
    }

    /// Print a warning message.
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", display::status("⚠", colors::YELLOW, message, self.color));
        }
    }

    /// Check if color is enabled.
    pub fn has_color(&self) -> bool {
        self.color
    }

    /// Get the current output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new(OutputFormat::Table, false, false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("table").unwrap(), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("yaml").unwrap(), OutputFormat::Yaml);
        assert_eq!(OutputFormat::parse("jsonl").unwrap(), OutputFormat::JsonLines);
        assert!(OutputFormat::parse("invalid").is_err());
    }

    #[test]
    fn test_from_cli_color_modes() {
        assert!(Output::from_cli("table", "always", false).unwrap().has_color());
        assert!(!Output::from_cli("table", "never", false).unwrap().has_color());
        assert!(Output::from_cli("xml", "never", false).is_err());
    }
}
