//! Rendering of command results.
//!
//! Results go to stdout in the selected [`OutputFormat`]; status lines go to
//! stderr so `--format json` output can be piped.

use serde::Serialize;
use serde_json::{Map, Value};
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

/// Print rows as a table or a JSON array.
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table if items.is_empty() => println!("(none)"),
        OutputFormat::Table => println!("{}", Table::new(items)),
        OutputFormat::Json => print_json(&items),
    }
}

/// Print one record: pretty JSON in both formats.
pub fn print_item<T: Serialize>(item: &T, _format: OutputFormat) {
    print_json(item);
}

/// Print labelled counters, aligned in table mode or as one JSON object.
pub fn print_summary(title: &str, fields: &[(&str, Value)], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{title}:");
            for (key, value) in fields {
                let shown = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                println!("  {:<16} {shown}", format!("{key}:"));
            }
        }
        OutputFormat::Json => {
            let object: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| (key.to_lowercase().replace(' ', "_"), value.clone()))
                .collect();
            print_json(&object);
        }
    }
}

pub fn print_success(msg: &str) {
    eprintln!("✓ {msg}");
}

pub fn print_warning(msg: &str) {
    eprintln!("⚠ {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("✗ could not serialize output: {e}"),
    }
}
