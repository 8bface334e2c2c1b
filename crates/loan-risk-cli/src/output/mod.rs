pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Pretty-print JSON to stdout.
fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// The data part of an output envelope; bare values pass through.
pub fn payload(value: &Value) -> &Value {
    value.get("result").unwrap_or(value)
}

/// Flatten nested objects into dotted column names, e.g.
/// `risk_breakdown.No Risk.pct`. Arrays stay as single cells.
pub fn flatten(map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into("", map, &mut out);
    out
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => flatten_into(&name, inner, out),
            other => out.push((name, other.clone())),
        }
    }
}

/// Header row and string cells for an array of objects. Headers come from
/// the first row.
pub fn array_rows(arr: &[Value]) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let Some(Value::Object(first)) = arr.first() else {
        return None;
    };
    let headers: Vec<String> = flatten(first).into_iter().map(|(k, _)| k).collect();
    let rows = arr
        .iter()
        .filter_map(|item| item.as_object())
        .map(|obj| {
            let flat: Map<String, Value> = flatten(obj).into_iter().collect();
            headers
                .iter()
                .map(|h| flat.get(h).map(format_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    Some((headers, rows))
}

pub fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_cell).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
