use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell, field_pairs, payload, record_rows};

/// Format output as tables: record lists (allocation rows, request line
/// items, slots, violations) as one row each, remaining fields as a
/// Field/Value table.
pub fn print_table(value: &Value) {
    match payload(value) {
        Value::Object(result) => {
            let skip = print_records(result);
            let pairs = field_pairs(result, skip);
            if !pairs.is_empty() {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                for (field, val) in pairs {
                    builder.push_record([field, val]);
                }
                println!("{}", Table::from(builder));
            }
        }
        other => println!("{}", cell(other)),
    }

    if let Some(envelope) = value.as_object() {
        print_envelope_notes(envelope);
    }
}

fn print_records(result: &Map<String, Value>) -> Option<&str> {
    let (name, records) = record_rows(result)?;
    if records.is_empty() {
        println!("{}: (none)", name);
        return Some(name);
    }

    let headers: Vec<String> = records
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|m| m.keys().cloned())
        .fold(Vec::new(), |mut acc, k| {
            if !acc.contains(&k) {
                acc.push(k);
            }
            acc
        });

    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for record in records.iter().filter_map(Value::as_object) {
        builder.push_record(
            headers
                .iter()
                .map(|h| record.get(h).map(cell).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
    Some(name)
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
