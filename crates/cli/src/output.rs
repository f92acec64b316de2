//! Terminal rendering for command results
//!
//! Every `print_*` helper is a thin wrapper over a `render_*` function that
//! builds the full text first, so layouts can be checked without a terminal.

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Bordered tables
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// `key: value` lines
    Plain,
}

/// Rows a result contributes to a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

const EMPTY: &str = "No items found.";

/// Machine formats serialize the value as-is; human formats return `None`
fn serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Option<String> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| e.to_string()),
        OutputFormat::Table | OutputFormat::Plain => return None,
    };
    Some(text.unwrap_or_else(|e| format!("<unserializable: {}>", e)))
}

fn tabulate<H: ToString>(headers: &[H], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(ToString::to_string).collect::<Vec<_>>());
    for row in rows {
        table.add_row(row);
    }
    table.to_string()
}

fn key_values<K: AsRef<str>>(pairs: impl IntoIterator<Item = (K, String)>) -> String {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}: {}", k.as_ref(), v))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) -> String {
    if let Some(text) = serialized(item, format) {
        return text;
    }
    match format {
        OutputFormat::Plain => key_values(T::headers().into_iter().zip(item.row())),
        _ => tabulate(&T::headers(), [item.row()]),
    }
}

/// Plain output separates items with `---`
pub fn render_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    if items.is_empty() {
        return EMPTY.to_string();
    }
    if let Some(text) = serialized(items, format) {
        return text;
    }
    match format {
        OutputFormat::Plain => items
            .iter()
            .map(|item| key_values(T::headers().into_iter().zip(item.row())))
            .collect::<Vec<_>>()
            .join("\n---\n"),
        _ => tabulate(&T::headers(), items.iter().map(TableDisplay::row)),
    }
}

/// Two-column summary for humans; machine formats get the whole `value`
pub fn render_details<T: Serialize>(title: &str, rows: &[(&str, String)], value: &T, format: OutputFormat) -> String {
    if let Some(text) = serialized(value, format) {
        return text;
    }
    let pairs = rows.iter().map(|(k, v)| (*k, v.clone()));
    match format {
        OutputFormat::Plain => key_values(pairs),
        _ => tabulate(&[title, ""], pairs.map(|(k, v)| vec![k.to_string(), v])),
    }
}

pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    println!("{}", render_item(item, format));
}

pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    println!("{}", render_list(items, format));
}

pub fn print_details<T: Serialize>(title: &str, rows: &[(&str, String)], value: &T, format: OutputFormat) {
    println!("{}", render_details(title, rows, value, format));
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "i".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        workers: u32,
    }

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["Name", "Workers"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.name.to_string(), self.workers.to_string()]
        }
    }

    fn rows() -> Vec<Row> {
        vec![Row { name: "smoke", workers: 4 }, Row { name: "nightly", workers: 8 }]
    }

    #[test]
    fn test_plain_list_separates_items() {
        assert_eq!(
            render_list(&rows(), OutputFormat::Plain),
            "Name: smoke\nWorkers: 4\n---\nName: nightly\nWorkers: 8"
        );
    }

    #[test]
    fn test_empty_list_in_every_format() {
        for format in [OutputFormat::Table, OutputFormat::Json, OutputFormat::Yaml, OutputFormat::Plain] {
            assert_eq!(render_list::<Row>(&[], format), EMPTY);
        }
    }

    #[test]
    fn test_table_contains_headers_and_cells() {
        let table = render_list(&rows(), OutputFormat::Table);
        for cell in ["Name", "Workers", "smoke", "nightly", "8"] {
            assert!(table.contains(cell), "missing {cell}");
        }
    }

    #[test]
    fn test_details_serialize_whole_value() {
        let row = Row { name: "smoke", workers: 4 };
        let summary = [("Workers", "4".to_string())];

        let json: serde_json::Value =
            serde_json::from_str(&render_details("Plan", &summary, &row, OutputFormat::Json)).unwrap();
        assert_eq!(json, serde_json::json!({"name": "smoke", "workers": 4}));

        assert_eq!(render_details("Plan", &summary, &row, OutputFormat::Yaml), "name: smoke\nworkers: 4");
        assert_eq!(render_details("Plan", &summary, &row, OutputFormat::Plain), "Workers: 4");
        assert!(render_details("Plan", &summary, &row, OutputFormat::Table).contains("Plan"));
    }

    #[test]
    fn test_item_plain_pairs_headers() {
        let row = Row { name: "smoke", workers: 4 };
        assert_eq!(render_item(&row, OutputFormat::Plain), "Name: smoke\nWorkers: 4");
    }
}
