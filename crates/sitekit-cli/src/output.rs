//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print a single item in the selected format
///
/// Tables print one `key: value` line per top-level field.
pub fn print_item<T: Serialize>(item: &T, format: OutputFormat) {
    let value = serde_json::to_value(item).unwrap_or(Value::Null);
    match format {
        OutputFormat::Table => match &value {
            Value::Object(fields) => {
                for (key, field) in fields {
                    print_kv(key, &display_value(field));
                }
            }
            other => println!("{}", display_value(other)),
        },
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
    }
}

/// Renders a JSON value for a table cell.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}
