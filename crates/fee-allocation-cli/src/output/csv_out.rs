use serde_json::Value;
use std::io;

use super::{cell, field_pairs, payload, record_rows};

/// Write output as CSV to stdout.
///
/// A result holding a record list is written one record per line; any
/// other result becomes two-column `field,value` CSV.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match payload(value) {
        Value::Object(result) => {
            if let Some((_, records)) = record_rows(result) {
                write_records(&mut wtr, records);
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (field, val) in field_pairs(result, None) {
                    let _ = wtr.write_record([field, val]);
                }
            }
        }
        Value::Array(records) => write_records(&mut wtr, records),
        other => {
            let _ = wtr.write_record([cell(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_records<W: io::Write>(wtr: &mut csv::Writer<W>, records: &[Value]) {
    let Some(Value::Object(first)) = records.first() else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);

    for record in records.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| record.get(*h).map(cell).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&row);
    }
}
