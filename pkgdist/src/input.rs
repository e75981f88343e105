// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

//! Lenient field access for incoming JSON records.
//!
//! Requests are never rejected for missing or mistyped fields. Every
//! accessor falls back to a default instead.

use std::sync::LazyLock;

use serde_json::{Map, Value};

static EMPTY_OBJECT: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

/// Views a JSON value as an object.
///
/// Anything else is treated like `{}`.
#[must_use]
pub(crate) fn as_object(value: &Value) -> &Map<String, Value> {
    value.as_object().unwrap_or(&EMPTY_OBJECT)
}

/// Reads a text field.
///
/// Numbers and booleans are rendered as text. Missing fields, `null`,
/// arrays and objects yield an empty string.
#[must_use]
pub(crate) fn text(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Null | Value::Array(_) | Value::Object(_)) | None => String::new(),
    }
}

/// Reads a boolean field according to JSON truthiness.
#[must_use]
pub(crate) fn flag(object: &Map<String, Value>, key: &str, default: bool) -> bool {
    object.get(key).map_or(default, is_truthy)
}

#[must_use]
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Reads the entries of an array field.
///
/// Returns `None` if the field is missing or not an array.
#[must_use]
pub(crate) fn array<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a [Value]> {
    object.get(key).and_then(Value::as_array).map(Vec::as_slice)
}

/// Parses a request body.
///
/// Empty or malformed input is treated like `{}`.
#[must_use]
pub fn parse_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        log::debug!("Treating malformed JSON body as empty object: {err}");
        Value::Object(Map::new())
    })
}
