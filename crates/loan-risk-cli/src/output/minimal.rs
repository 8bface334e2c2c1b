use serde_json::Value;

use super::{format_cell, payload};

/// Print just the headline number from the output.
///
/// Looks for well-known result fields in priority order, then falls back to
/// the first field (or the length of an array result).
pub fn print_minimal(value: &Value) {
    let result = payload(value);

    let priority_paths: [&[&str]; 6] = [
        &["metrics", "total_at_risk"],
        &["overall_repayment_rate"],
        &["report", "rows_kept"],
        &["highest_vintage_loans"],
        &["rows"],
        &["repayment_rate"],
    ];

    if let Value::Object(map) = result {
        for path in priority_paths {
            if let Some(val) = lookup(result, path) {
                if !val.is_null() {
                    println!("{}", headline(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, headline(val));
            return;
        }
    }

    println!("{}", headline(result));
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn headline(value: &Value) -> String {
    match value {
        Value::Array(arr) => arr.len().to_string(),
        Value::Null => "null".to_string(),
        other => format_cell(other),
    }
}
