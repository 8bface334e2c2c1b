use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{array_rows, flatten, format_cell, payload};

/// Format output as tables using the tabled crate.
///
/// Scalar fields of the result go in one Field/Value table; every array of
/// records in the result gets its own table underneath.
pub fn print_table(value: &Value) {
    match payload(value) {
        Value::Object(map) => print_object(map),
        Value::Array(arr) => print_array_table(arr),
        other => println!("{}", format_cell(other)),
    }

    if let Some(Value::Array(warnings)) = value.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = value.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_object(map: &Map<String, Value>) {
    let (tables, scalars): (Vec<_>, Vec<_>) =
        flatten(map).into_iter().partition(|(_, v)| is_record_array(v));

    if !scalars.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in &scalars {
            builder.push_record([key.as_str(), &format_cell(val)]);
        }
        println!("{}", Table::from(builder));
    }

    for (key, val) in tables {
        if let Value::Array(arr) = val {
            println!("\n{}:", key);
            print_array_table(&arr);
        }
    }
}

fn is_record_array(value: &Value) -> bool {
    matches!(value, Value::Array(a) if a.first().is_some_and(Value::is_object))
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    match array_rows(arr) {
        Some((headers, rows)) => {
            let mut builder = Builder::default();
            builder.push_record(headers);
            for row in rows {
                builder.push_record(row);
            }
            println!("{}", Table::from(builder));
        }
        None => {
            for item in arr {
                println!("{}", format_cell(item));
            }
        }
    }
}
