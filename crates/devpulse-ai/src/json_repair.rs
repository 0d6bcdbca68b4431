//! Recovery of a JSON object from free-form model output.
//!
//! Strict parse of the reply, or of its body when a fence wraps the whole
//! reply, then strict parse of the outermost `{...}` span of the raw text.
//! A malformed span is terminal.

use devpulse_core::PulseError;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```$").unwrap();
    static ref OUTER_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Remove a markdown code fence that wraps the whole text, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Parse a JSON object out of model output.
pub fn parse_model_json(raw: &str) -> Result<Map<String, Value>, PulseError> {
    let trimmed = raw.trim();
    if let Some(map) = parse_object(trimmed) {
        return Ok(map);
    }

    let unfenced = strip_code_fence(trimmed);
    if unfenced != trimmed {
        if let Some(map) = parse_object(unfenced) {
            return Ok(map);
        }
    }

    let span = OUTER_OBJECT
        .find(trimmed)
        .ok_or_else(|| parse_error("no JSON object found in model output", raw))?;

    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(parse_error("extracted span is not a JSON object", raw)),
        Err(e) => Err(parse_error(
            &format!("extracted span is not valid JSON: {}", e),
            raw,
        )),
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_error(reason: &str, raw: &str) -> PulseError {
    PulseError::ResponseParse {
        reason: reason.to_string(),
        raw: raw.to_string(),
    }
}
