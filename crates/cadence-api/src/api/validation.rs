// Input validation for event APIs
//
// Payloads arrive as raw JSON so every field can be checked and reported
// together. Each field stops at its first failing rule.

use cadence_core::{EventDraft, Frequency, ValidationErrors};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

/// Maximum length of an event title, in characters
pub const MAX_TITLE_CHARS: usize = 50;

/// Maximum length of an event description, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 255;

/// Timestamp layout accepted and rendered by the API
pub const TIMESTAMP_FORMAT: &str = "Y-m-d\\TH:i:sP";

/// Parse a timestamp in [`TIMESTAMP_FORMAT`]: whole seconds and an explicit
/// offset (`Z` is read as `+00:00`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if raw.contains('.') {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok()
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn required(field: &str) -> String {
    format!("The {} field is required.", label(field))
}

fn present<'a>(body: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    match body.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(value),
    }
}

fn text(
    body: &Map<String, Value>,
    field: &str,
    max_chars: usize,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match present(body, field)? {
        Value::String(s) if s.chars().count() > max_chars => {
            errors.add(
                field,
                format!(
                    "The {} field must not be greater than {max_chars} characters.",
                    label(field)
                ),
            );
            None
        }
        Value::String(s) => Some(s.clone()),
        _ => {
            errors.add(field, format!("The {} field must be a string.", label(field)));
            None
        }
    }
}

fn timestamp(
    body: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<DateTime<FixedOffset>> {
    let Some(value) = present(body, field) else {
        errors.add(field, required(field));
        return None;
    };
    match value.as_str().and_then(parse_timestamp) {
        Some(parsed) => Some(parsed),
        None => {
            errors.add(
                field,
                format!(
                    "The {} field must match the format {TIMESTAMP_FORMAT}.",
                    label(field)
                ),
            );
            None
        }
    }
}

fn after(
    field: &str,
    value: Option<DateTime<FixedOffset>>,
    other: &str,
    bound: Option<DateTime<FixedOffset>>,
    errors: &mut ValidationErrors,
) -> Option<DateTime<FixedOffset>> {
    match (value, bound) {
        (Some(value), Some(bound)) if value <= bound => {
            errors.add(
                field,
                format!(
                    "The {} field must be a date after {}.",
                    label(field),
                    label(other)
                ),
            );
            None
        }
        (value, _) => value,
    }
}

fn boolean(body: &Map<String, Value>, field: &str, errors: &mut ValidationErrors) -> Option<bool> {
    let Some(value) = present(body, field) else {
        errors.add(field, required(field));
        return None;
    };
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
        _ => None,
    };
    if parsed.is_none() {
        errors.add(
            field,
            format!("The {} field must be true or false.", label(field)),
        );
    }
    parsed
}

fn frequency(
    body: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<Frequency> {
    let Some(value) = present(body, field) else {
        errors.add(field, required(field));
        return None;
    };
    match value.as_str().map(str::parse::<Frequency>) {
        Some(Ok(frequency)) => Some(frequency),
        _ => {
            errors.add(field, format!("The selected {} is invalid.", label(field)));
            None
        }
    }
}

/// Validate a full event payload into a draft.
///
/// `frequency` and `repeat_until` are only read when `recurrent` is true.
pub fn parse_event_payload(payload: &Value) -> Result<EventDraft, ValidationErrors> {
    let empty = Map::new();
    let body = payload.as_object().unwrap_or(&empty);
    let mut errors = ValidationErrors::new();

    let title = match present(body, "title") {
        Some(_) => text(body, "title", MAX_TITLE_CHARS, &mut errors),
        None => {
            errors.add("title", required("title"));
            None
        }
    };
    let description = text(body, "description", MAX_DESCRIPTION_CHARS, &mut errors);

    let starts_at = timestamp(body, "starts_at", &mut errors);
    let ends_at = timestamp(body, "ends_at", &mut errors);
    let ends_at = after("ends_at", ends_at, "starts_at", starts_at, &mut errors);

    let recurrent = boolean(body, "recurrent", &mut errors);
    let (frequency, repeat_until) = if recurrent == Some(true) {
        let frequency = frequency(body, "frequency", &mut errors);
        let repeat_until = timestamp(body, "repeat_until", &mut errors);
        let repeat_until = after("repeat_until", repeat_until, "ends_at", ends_at, &mut errors);
        (frequency, repeat_until)
    } else {
        (None, None)
    };

    match (title, starts_at, ends_at, recurrent) {
        (Some(title), Some(starts_at), Some(ends_at), Some(recurrent)) if errors.is_empty() => {
            Ok(EventDraft {
                title,
                description,
                starts_at,
                ends_at,
                recurrent,
                frequency,
                repeat_until,
            })
        }
        _ => Err(errors),
    }
}
