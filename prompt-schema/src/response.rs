//! Structured parsing of raw model responses.

use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};

const EXCERPT_CHARS: usize = 120;

/// Parses a raw model response as JSON.
///
/// Surrounding whitespace and a single Markdown code fence (```` ```json ````
/// or plain ```` ``` ````) are stripped first, since models frequently wrap
/// their answer that way.
///
/// # Errors
///
/// Returns [`SchemaError::ResponseParse`] when the remaining text is not JSON.
pub fn parse_response(raw: &str) -> SchemaResult<Value> {
    let body = strip_fence(raw.trim());
    serde_json::from_str(body).map_err(|err| SchemaError::ResponseParse {
        reason: err.to_string(),
        excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
    })
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with(['{', '[']) => body.trim(),
        _ => inner.trim(),
    }
}
