use serde_json::Value;
use std::io;

type Writer<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// Simulation paths become a matrix (one row per path); everything else
/// is flattened to `field,value` rows with dotted field names.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result.get("paths") {
        Some(Value::Array(paths)) if !paths.is_empty() => write_paths(&mut wtr, paths),
        _ => {
            let _ = wtr.write_record(["field", "value"]);
            let mut rows = Vec::new();
            flatten("", result, &mut rows);
            for (field, val) in rows {
                let _ = wtr.write_record([field, val]);
            }
        }
    }

    let _ = wtr.flush();
}

fn write_paths(wtr: &mut Writer<'_>, paths: &[Value]) {
    let steps = paths
        .first()
        .and_then(|p| p.as_array())
        .map(|p| p.len())
        .unwrap_or(0);
    let header = std::iter::once("simulation".to_string()).chain((0..steps).map(|t| format!("t{t}")));
    let _ = wtr.write_record(header);
    for (i, path) in paths.iter().enumerate() {
        if let Value::Array(values) = path {
            let row = std::iter::once(i.to_string()).chain(values.iter().map(format_csv_value));
            let _ = wtr.write_record(row);
        }
    }
}

fn flatten(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{prefix}.{k}")
        }
    };
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(&key(k), v, rows);
            }
        }
        Value::Array(items) if items.iter().any(|v| v.is_object()) => {
            for (i, item) in items.iter().enumerate() {
                flatten(&key(&i.to_string()), item, rows);
            }
        }
        other => rows.push((prefix.to_string(), format_csv_value(other))),
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(format_csv_value).collect::<Vec<_>>().join(";"),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
