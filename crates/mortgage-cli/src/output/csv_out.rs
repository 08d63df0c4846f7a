use serde_json::{Map, Value};
use std::io;

use super::{flatten, format_scalar, headers};

/// Write output as CSV to stdout.
///
/// Tabular results (schedule rows, milestones, profile lists) are written as
/// one record per row; anything else becomes `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Array(rows) => write_rows(&mut wtr, rows),
        Value::Object(map) => write_object(&mut wtr, map),
        other => {
            let _ = wtr.write_record([format_scalar(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_object<W: io::Write>(wtr: &mut csv::Writer<W>, map: &Map<String, Value>) {
    let flat = flatten(map);
    if let Some((_, rows)) = flat.sections.first() {
        write_rows(wtr, rows);
        return;
    }

    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in &flat.fields {
        let _ = wtr.write_record([key.clone(), format_scalar(val)]);
    }
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    if rows.is_empty() {
        return;
    }
    if !rows.iter().all(Value::is_object) {
        for item in rows {
            let _ = wtr.write_record([format_scalar(item)]);
        }
        return;
    }

    let headers = headers(rows);
    let _ = wtr.write_record(&headers);
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map(format_scalar).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}
