use serde_json::Value;
use std::io;

use super::{array_rows, flatten, format_cell, payload};

/// Write output as CSV to stdout.
///
/// Arrays of records become one row per record with flattened column
/// names; a single record becomes two-column `field,value` CSV.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match payload(value) {
        Value::Array(arr) => match array_rows(arr) {
            Some((headers, rows)) => {
                let _ = wtr.write_record(&headers);
                for row in rows {
                    let _ = wtr.write_record(&row);
                }
            }
            None => {
                for item in arr {
                    let _ = wtr.write_record([format_cell(item)]);
                }
            }
        },
        Value::Object(map) => {
            let _ = wtr.write_record(["field", "value"]);
            for (key, val) in flatten(map) {
                let _ = wtr.write_record([key.as_str(), &format_cell(&val)]);
            }
        }
        other => {
            let _ = wtr.write_record([format_cell(other)]);
        }
    }

    let _ = wtr.flush();
}
