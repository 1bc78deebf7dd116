//! Structured payload parsing
//!
//! Parses JSON text coming back from the generation service and checks that
//! the required top-level fields are present, with error messages that say
//! exactly what was wrong.

use crate::error::{PhraseError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Maximum number of characters of the offending payload quoted in errors
const PREVIEW_CHARS: usize = 100;

/// Parse `text` as JSON and check that every field in `required_fields` is a
/// top-level key of the result.
///
/// Surrounding whitespace is ignored. The parsed value is returned as-is.
pub fn parse(text: &str, required_fields: Option<&[&str]>) -> Result<Value> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(PhraseError::EmptyInput);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| PhraseError::malformed(e.to_string(), preview(trimmed)))?;

    if let Some(required) = required_fields {
        check_required_fields(&value, required)?;
    }

    Ok(value)
}

/// Same as `parse` for raw bytes. Bytes that are not UTF-8 text are
/// rejected as invalid input.
pub fn parse_bytes(bytes: &[u8], required_fields: Option<&[&str]>) -> Result<Value> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        PhraseError::invalid_input(format!("expected UTF-8 text, got binary data ({})", e))
    })?;

    parse(text, required_fields)
}

/// Parse, check required fields, then deserialize into `T`.
pub fn parse_as<T: DeserializeOwned>(text: &str, required_fields: &[&str]) -> Result<T> {
    let value = parse(text, Some(required_fields))?;

    serde_json::from_value(value)
        .map_err(|e| PhraseError::malformed(e.to_string(), preview(text.trim())))
}

fn check_required_fields(value: &Value, required: &[&str]) -> Result<()> {
    let object = value.as_object();

    let missing: Vec<String> = required
        .iter()
        .filter(|field| !object.is_some_and(|obj| obj.contains_key(**field)))
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let present = object
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default();

    Err(PhraseError::MissingFields { missing, present })
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();

    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
