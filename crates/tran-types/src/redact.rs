//! Redaction of user text and credentials before they reach a log line.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static SENSITIVE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(api.?key|authorization|token|secret|text|content|prompt)")
        .expect("sensitive key pattern is a valid regex")
});

fn is_sensitive(key: &str) -> bool {
    !key.is_empty() && SENSITIVE_KEY.is_match(key)
}

fn redact_string(value: &str) -> Value {
    let len = value.chars().count();
    if len <= 6 {
        Value::String("[redacted]".to_string())
    } else {
        Value::String(format!("[redacted:{len}]"))
    }
}

/// Returns a copy of `value` with sensitive fields redacted.
///
/// Strings under a sensitive key become `[redacted]` (six chars or fewer) or
/// `[redacted:N]`; non-string values under a sensitive key become
/// `[redacted]`. Arrays inherit the key of their parent.
pub fn sanitize_for_log(value: &Value) -> Value {
    sanitize_with_key(value, "")
}

fn sanitize_with_key(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive(key) => redact_string(s),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_with_key(item, key))
                .collect(),
        ),
        Value::Object(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (k, v) in entries {
                let sanitized = if is_sensitive(k) {
                    match v {
                        Value::String(s) => redact_string(s),
                        _ => Value::String("[redacted]".to_string()),
                    }
                } else {
                    sanitize_with_key(v, k)
                };
                out.insert(k.clone(), sanitized);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
