use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{flatten, format_scalar, headers};

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => print_result(result, map),
            None => print_object(map),
        },
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", format_scalar(value)),
    }
}

fn print_result(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(map) => print_object(map),
        Value::Array(rows) => print_rows(rows),
        other => println!("{}", format_scalar(other)),
    }

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

fn print_object(map: &Map<String, Value>) {
    let flat = flatten(map);

    if !flat.fields.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in &flat.fields {
            builder.push_record([key.clone(), format_scalar(val)]);
        }
        println!("{}", Table::from(builder));
    }

    for (title, rows) in flat.sections {
        println!("\n{}:", title);
        print_rows(rows);
    }
}

fn print_rows(rows: &[Value]) {
    if rows.is_empty() {
        println!("(empty)");
        return;
    }
    if !rows.iter().all(Value::is_object) {
        for item in rows {
            println!("{}", format_scalar(item));
        }
        return;
    }

    let headers = headers(rows);
    let mut builder = Builder::default();
    builder.push_record(headers.iter().cloned());
    for row in rows {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(h).map(format_scalar).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
}
