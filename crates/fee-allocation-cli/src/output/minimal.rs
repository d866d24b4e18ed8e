use serde_json::{Map, Value};

use super::{cell, payload};

/// Print a one-line answer for the result.
///
/// Recognises allocation results, allocation summaries, payment requests,
/// day schedules and timetable reports; anything else prints its first
/// field.
pub fn print_minimal(value: &Value) {
    let result = payload(value);
    match result.as_object() {
        Some(map) => println!("{}", summarize(map)),
        None => println!("{}", cell(result)),
    }
}

fn summarize(map: &Map<String, Value>) -> String {
    let field = |m: &Map<String, Value>, key: &str| m.get(key).map(cell).unwrap_or_default();

    if let Some(Value::Object(summary)) = map.get("summary") {
        let status = if map.get("is_valid").and_then(Value::as_bool) == Some(true) {
            "valid"
        } else {
            "invalid"
        };
        return format!("{} ({})", allocation_line(summary), status);
    }
    if map.contains_key("total_allocated") {
        return allocation_line(map);
    }
    if let (Some(Value::Array(items)), true) =
        (map.get("installments"), map.contains_key("student_id"))
    {
        return format!(
            "{} line items for {} in {}",
            items.len(),
            field(map, "student_id"),
            field(map, "academic_session_id")
        );
    }
    if let Some(Value::Array(slots)) = map.get("slots") {
        return format!("{} slots, day ends {}", slots.len(), field(map, "day_end"));
    }
    if let Some(Value::Array(violations)) = map.get("violations") {
        return if violations.is_empty() {
            "valid".to_string()
        } else {
            format!("{} violations", violations.len())
        };
    }

    match map.iter().next() {
        Some((key, val)) => format!("{}: {}", key, cell(val)),
        None => String::new(),
    }
}

fn allocation_line(summary: &Map<String, Value>) -> String {
    let get = |key: &str| summary.get(key).map(cell).unwrap_or_default();
    format!(
        "allocated {} of {} across {} installments",
        get("total_allocated"),
        get("payment_amount"),
        get("selected_count")
    )
}
