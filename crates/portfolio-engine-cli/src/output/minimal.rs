use serde_json::Value;

/// Headline value per command, first match wins. Dotted keys descend into
/// nested objects.
const HEADLINE_KEYS: [&str; 6] = [
    "sharpe_ratio",
    "risk_summary.overall_risk_rating",
    "distribution_stats.median",
    "max_sharpe.sharpe_ratio",
    "market_crash.dollar_impact",
    "min_volatility.volatility",
];

/// Print just the key answer from the output.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    for key in HEADLINE_KEYS {
        if let Some(v) = lookup(result, key).filter(|v| !v.is_null()) {
            println!("{}", format_minimal(v));
            return;
        }
    }

    match result {
        Value::Object(map) => {
            if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, format_minimal(val));
            }
        }
        other => println!("{}", format_minimal(other)),
    }
}

fn lookup<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(value, |v, key| v.as_object().and_then(|m| m.get(key)))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
