//! Rendering of API error bodies into readable messages.
//!
//! The API reports failures as `{"detail": ...}` where `detail` is either a
//! plain string or a list of validation entries shaped like
//! `{"msg": "...", "loc": ["body", "email"]}`.

use serde_json::Value;

/// Separator placed between the segments of a validation location.
const LOCATION_SEPARATOR: &str = " → ";

/// Extract a message from a decoded error body.
///
/// `detail` wins over `message`; non-object bodies yield nothing.
pub fn message_from_body(body: &Value) -> Option<String> {
    let object = body.as_object()?;

    if let Some(message) = object.get("detail").and_then(format_error_detail) {
        return Some(message);
    }

    object
        .get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Format a `detail` value into a single message.
///
/// Validation entries render as `msg (loc → path)`, one per line.
pub fn format_error_detail(detail: &Value) -> Option<String> {
    match detail {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(entries) => {
            let messages: Vec<String> = entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::Object(_) => format_entry(entry),
                    other => format_error_detail(other),
                })
                .filter(|message| !message.is_empty())
                .collect();

            if messages.is_empty() {
                None
            } else {
                Some(messages.join("\n"))
            }
        }
        Value::Object(object) => {
            if object.get("msg").is_some_and(Value::is_string) {
                return format_entry(detail);
            }
            if let Some(nested) = object.get("detail") {
                return format_error_detail(nested);
            }
            serde_json::to_string(detail).ok()
        }
    }
}

fn format_entry(entry: &Value) -> Option<String> {
    match entry.get("msg").and_then(Value::as_str) {
        Some(msg) => match entry.get("loc").and_then(join_location) {
            Some(path) => Some(format!("{msg} ({path})")),
            None => Some(msg.to_string()),
        },
        None => {
            if let Some(nested) = entry.get("detail") {
                return format_error_detail(nested);
            }
            serde_json::to_string(entry).ok()
        }
    }
}

fn join_location(loc: &Value) -> Option<String> {
    let path = match loc {
        Value::Array(segments) => segments
            .iter()
            .filter_map(|segment| match segment {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(LOCATION_SEPARATOR),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    (!path.is_empty()).then_some(path)
}
