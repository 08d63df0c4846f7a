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

/// Nested objects become dotted keys; arrays of objects are split out
/// as named sections so they can be rendered on their own.
pub(crate) struct Flattened<'a> {
    pub fields: Vec<(String, &'a Value)>,
    pub sections: Vec<(String, &'a [Value])>,
}

pub(crate) fn flatten(map: &Map<String, Value>) -> Flattened<'_> {
    let mut out = Flattened {
        fields: Vec::new(),
        sections: Vec::new(),
    };
    flatten_into(map, "", &mut out);
    out
}

fn flatten_into<'a>(map: &'a Map<String, Value>, prefix: &str, out: &mut Flattened<'a>) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => flatten_into(inner, &name, out),
            Value::Array(items) if items.first().is_some_and(Value::is_object) => {
                out.sections.push((name, items.as_slice()))
            }
            _ => out.fields.push((name, val)),
        }
    }
}

pub(crate) fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => arr.iter().map(format_scalar).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Column headers for an array of objects, in first-seen order.
pub(crate) fn headers(rows: &[Value]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
    }
    headers
}
