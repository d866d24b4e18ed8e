pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Fields whose value is a list of records worth laying out as rows.
const ROW_FIELDS: [&str; 4] = ["rows", "installments", "slots", "violations"];

/// The payload inside the computation envelope, or the value itself.
pub(crate) fn payload(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// The first list of records in a result object, with its field name.
pub(crate) fn record_rows(result: &Map<String, Value>) -> Option<(&str, &Vec<Value>)> {
    ROW_FIELDS.iter().find_map(|key| match result.get(*key) {
        Some(Value::Array(items)) if items.iter().all(Value::is_object) => Some((*key, items)),
        _ => None,
    })
}

/// Render a scalar for a table cell or CSV field.
pub(crate) fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => {
            items.iter().map(cell).collect::<Vec<_>>().join(", ")
        }
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Flatten scalar fields and one level of nested objects into
/// `(field, value)` pairs, skipping the record list shown separately.
pub(crate) fn field_pairs(result: &Map<String, Value>, skip: Option<&str>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, val) in result {
        if Some(key.as_str()) == skip {
            continue;
        }
        match val {
            Value::Object(inner) => {
                for (inner_key, inner_val) in inner {
                    pairs.push((format!("{}.{}", key, inner_key), cell(inner_val)));
                }
            }
            _ => pairs.push((key.clone(), cell(val))),
        }
    }
    pairs
}
