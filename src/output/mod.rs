//! Output formatting for query results.

use crate::resultset::{ExecStats, ResultSet};
use schemars::JsonSchema;
use serde::Serialize;
use std::io::Write;

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    /// Plain text table (default)
    #[default]
    Text,
    /// JSON document with column order, rows and statistics
    Json,
    /// JSON lines format (one object per line)
    JsonLines,
    /// CSV format
    Csv,
    /// Tab-separated values
    Tsv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" | "ndjson" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            _ => Err(format!(
                "Unknown format: {}. Valid: text, json, jsonl, csv, tsv",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Tsv => write!(f, "tsv"),
        }
    }
}

impl OutputFormat {
    /// File extension used when exporting to the destination directory.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::JsonLines => "jsonl",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        }
    }
}

/// Machine-readable query output: column order, row objects and the
/// execution statistics. This is what notebook-style frontends consume.
#[derive(Serialize, JsonSchema)]
pub struct QueryJsonOutput {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub rows: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub statistics: ExecStats,
}

impl QueryJsonOutput {
    pub fn from_result(result: &ResultSet) -> Self {
        Self {
            columns: result.columns.clone(),
            row_count: result.row_count(),
            rows: (0..result.row_count())
                .map(|i| row_object(result, i))
                .collect(),
            warnings: result.warnings.iter().map(|w| w.to_string()).collect(),
            statistics: result.stats.clone(),
        }
    }
}

fn row_object(result: &ResultSet, idx: usize) -> serde_json::Value {
    let obj: serde_json::Map<String, serde_json::Value> = result
        .named_row(idx)
        .map(|(col, val)| (col.to_string(), json_value(val)))
        .collect();
    serde_json::Value::Object(obj)
}

/// Convert a cell to the closest JSON type.
fn json_value(val: &str) -> serde_json::Value {
    if val.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(n) = val.parse::<i64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Ok(n) = val.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return serde_json::Value::Number(num);
        }
    }
    if val.eq_ignore_ascii_case("true") {
        return serde_json::Value::Bool(true);
    }
    if val.eq_ignore_ascii_case("false") {
        return serde_json::Value::Bool(false);
    }
    serde_json::Value::String(val.to_string())
}

/// Formatter for query results
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format(result: &ResultSet, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => Self::format_text(result),
            OutputFormat::Json => Self::format_json(result),
            OutputFormat::JsonLines => Self::format_jsonl(result),
            OutputFormat::Csv => Self::format_csv(result),
            OutputFormat::Tsv => Self::format_tsv(result),
        }
    }

    /// Write formatted result to a writer
    pub fn write<W: Write>(
        result: &ResultSet,
        format: OutputFormat,
        writer: &mut W,
    ) -> std::io::Result<()> {
        let output = Self::format(result, format);
        writer.write_all(output.as_bytes())
    }

    /// Plain text: left-aligned pipe-separated columns, a dashes line
    /// under the headers, and a trailing row count.
    fn format_text(result: &ResultSet) -> String {
        if result.columns.is_empty() {
            return format!("{}\n", row_count_line(result.row_count()));
        }

        let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
        for row in &result.rows {
            for (i, width) in widths.iter_mut().enumerate() {
                *width = (*width).max(row.value(i).chars().count());
            }
        }

        let mut output = String::new();

        for (i, col) in result.columns.iter().enumerate() {
            if i > 0 {
                output.push_str(" | ");
            }
            output.push_str(&pad(col, widths[i]));
        }
        output.push('\n');

        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                output.push_str(" | ");
            }
            output.push_str(&"-".repeat(*width));
        }
        output.push('\n');

        for row in &result.rows {
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    output.push_str(" | ");
                }
                output.push_str(&pad(row.value(i), *width));
            }
            output.push('\n');
        }

        output.push_str(&row_count_line(result.row_count()));
        output.push('\n');
        output
    }

    fn format_json(result: &ResultSet) -> String {
        serde_json::to_string_pretty(&QueryJsonOutput::from_result(result))
            .unwrap_or_else(|_| "{}".to_string())
    }

    fn format_jsonl(result: &ResultSet) -> String {
        (0..result.row_count())
            .map(|i| {
                serde_json::to_string(&row_object(result, i)).unwrap_or_else(|_| "{}".to_string())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_csv(result: &ResultSet) -> String {
        let mut output = String::new();
        output.push_str(&csv_row(result.columns.iter().map(|c| c.as_str())));
        output.push('\n');
        for row in &result.rows {
            output.push_str(&csv_row(
                (0..result.columns.len()).map(|i| row.value(i)),
            ));
            output.push('\n');
        }
        output
    }

    fn format_tsv(result: &ResultSet) -> String {
        let mut output = String::new();
        output.push_str(&result.columns.join("\t"));
        output.push('\n');
        for row in &result.rows {
            let escaped: Vec<String> = (0..result.columns.len())
                .map(|i| row.value(i).replace('\t', "\\t").replace('\n', "\\n"))
                .collect();
            output.push_str(&escaped.join("\t"));
            output.push('\n');
        }
        output
    }
}

fn row_count_line(count: usize) -> String {
    format!("{} row(s) returned.", count)
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s.to_string()
    } else {
        let mut out = String::with_capacity(width);
        out.push_str(s);
        out.extend(std::iter::repeat(' ').take(width - len));
        out
    }
}

fn csv_row<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.map(csv_escape).collect::<Vec<_>>().join(",")
}

fn csv_escape(val: &str) -> String {
    if val.contains(',') || val.contains('"') || val.contains('\n') || val.contains('\r') {
        format!("\"{}\"", val.replace('"', "\"\""))
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resultset::{ResultRow, ResultSet};

    fn sample_result() -> ResultSet {
        ResultSet {
            columns: vec!["name".to_string(), "price".to_string()],
            rows: vec![
                ResultRow::new(vec![
                    Some("Belgian Waffles".to_string()),
                    Some("5.95".to_string()),
                ]),
                ResultRow::new(vec![Some("French Toast".to_string()), Some("4.50".to_string())]),
            ],
            ..ResultSet::default()
        }
    }

    #[test]
    fn test_format_text_layout() {
        let output = ResultFormatter::format(&sample_result(), OutputFormat::Text);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "name            | price");
        assert_eq!(lines[1], "--------------- | -----");
        assert_eq!(lines[2], "Belgian Waffles | 5.95 ");
        assert_eq!(lines[3], "French Toast    | 4.50 ");
        assert_eq!(lines[4], "2 row(s) returned.");
    }

    #[test]
    fn test_format_text_empty() {
        let result = ResultSet {
            columns: vec!["x".to_string()],
            ..ResultSet::default()
        };
        let output = ResultFormatter::format(&result, OutputFormat::Text);
        assert!(output.ends_with("0 row(s) returned.\n"));
    }

    #[test]
    fn test_format_json_structure() {
        let output = ResultFormatter::format(&sample_result(), OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["columns"][0], "name");
        assert_eq!(parsed["row_count"], 2);
        assert_eq!(parsed["rows"][0]["name"], "Belgian Waffles");
        assert_eq!(parsed["rows"][1]["price"], 4.50);
    }

    #[test]
    fn test_format_csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_format_tsv() {
        let output = ResultFormatter::format(&sample_result(), OutputFormat::Tsv);
        assert!(output.starts_with("name\tprice\n"));
        assert!(output.contains("Belgian Waffles\t5.95"));
    }

    #[test]
    fn test_json_value_conversion() {
        assert_eq!(json_value(""), serde_json::Value::Null);
        assert_eq!(json_value("42"), serde_json::json!(42));
        assert_eq!(json_value("3.5"), serde_json::json!(3.5));
        assert_eq!(json_value("true"), serde_json::json!(true));
        assert_eq!(json_value("hello"), serde_json::json!("hello"));
    }

    #[test]
    fn test_format_round_trip_names() {
        for name in ["text", "json", "jsonl", "csv", "tsv"] {
            let fmt: OutputFormat = name.parse().unwrap();
            assert_eq!(fmt.to_string(), name);
        }
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
