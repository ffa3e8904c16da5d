//! Validation of client input and normalization of upstream answers.
//!
//! Everything here is pure: the network lives in [`crate::upstream`].

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::model::{ParsedRecipe, Step, Transcript, Upload};
use crate::routes::{NonJson, Output, Route};
use crate::upstream::UpstreamResponse;

/// Success body sent back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Normalized {
    Text(Transcript),
    Recipe(ParsedRecipe),
}

/// Read `field` out of a JSON request body as a trimmed, non-empty string.
pub fn require_json_field(body: &[u8], field: &str) -> Result<String, GatewayError> {
    let missing = || GatewayError::Validation(format!("Missing '{field}' (string) in request body."));

    let value: Value = serde_json::from_slice(body).map_err(|_| missing())?;
    match value.get(field).and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(missing()),
    }
}

/// Reject empty uploads and uploads above `limit` bytes.
pub fn check_upload(upload: &Upload, limit: u64) -> Result<(), GatewayError> {
    if upload.data.is_empty() {
        return Err(GatewayError::Validation(format!(
            "Uploaded file '{}' is empty.",
            upload.file_name
        )));
    }
    if upload.size() > limit {
        return Err(GatewayError::PayloadTooLarge {
            subject: "File",
            size: format_size(upload.size()),
            limit: format_size(limit),
        });
    }
    Ok(())
}

pub fn format_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

/// First `max_chars` characters of an upstream body.
pub fn preview(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

/// Map an upstream response to the route's result shape or a gateway error.
pub fn normalize(
    route: &Route,
    response: &UpstreamResponse,
    preview_chars: usize,
) -> Result<Normalized, GatewayError> {
    let raw = String::from_utf8_lossy(&response.body);
    let declared_json = response
        .content_type
        .as_deref()
        .is_some_and(is_json_content_type);

    let data: Option<Value> = match route.non_json {
        NonJson::Reject => serde_json::from_slice(&response.body).ok(),
        NonJson::RawText if declared_json => serde_json::from_slice(&response.body).ok(),
        NonJson::RawText => None,
    };

    if !response.is_success() {
        return Err(upstream_error(
            response.status,
            data.as_ref(),
            &raw,
            preview_chars,
        ));
    }

    let data = match (data, route.non_json) {
        (Some(data), _) => Some(data),
        (None, NonJson::Reject) => {
            return Err(GatewayError::UpstreamProtocol {
                message: "Upstream returned a non-JSON response.".to_string(),
                preview: preview(&raw, preview_chars),
            })
        }
        (None, NonJson::RawText) if declared_json => {
            return Err(GatewayError::UpstreamProtocol {
                message: "Upstream declared JSON but parsing failed.".to_string(),
                preview: preview(&raw, preview_chars),
            })
        }
        (None, NonJson::RawText) => None,
    };

    Ok(match route.output {
        Output::Text => {
            let field = data.as_ref().and_then(|d| d.get("text"));
            if let Some(other) = field.filter(|v| !v.is_string() && !v.is_null()) {
                debug!("{}: ignoring non-string 'text' from upstream: {}", route.name, other);
            }
            let text = field.and_then(Value::as_str);
            let text = match (text, route.non_json) {
                (Some(text), _) => text.to_string(),
                (None, NonJson::RawText) => raw.into_owned(),
                (None, NonJson::Reject) => String::new(),
            };
            Normalized::Text(Transcript { text })
        }
        Output::Recipe => Normalized::Recipe(recipe_from(data.as_ref())),
    })
}

/// Build the error for a non-2xx upstream answer.
///
/// Message precedence: `detail`, then `error`, then a synthesized message.
pub fn upstream_error(
    status: u16,
    data: Option<&Value>,
    raw: &str,
    preview_chars: usize,
) -> GatewayError {
    let message = data
        .and_then(|d| provided(d.get("detail")).or_else(|| provided(d.get("error"))))
        .unwrap_or_else(|| format!("Upstream error (status {status})."));

    GatewayError::Upstream {
        status,
        message,
        preview: (!raw.is_empty()).then(|| preview(raw, preview_chars)),
    }
}

fn provided(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn recipe_from(data: Option<&Value>) -> ParsedRecipe {
    let ingredients = data
        .and_then(|d| d.get("ingredients"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let steps = data
        .and_then(|d| d.get("steps"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| step_from(i, item))
                .collect()
        })
        .unwrap_or_default();

    ParsedRecipe { ingredients, steps }
}

fn step_from(index: usize, item: &Value) -> Option<Step> {
    let position = index as u64 + 1;
    match item {
        Value::String(s) => Some(Step {
            step: position,
            instruction: s.clone(),
        }),
        Value::Object(fields) => Some(Step {
            step: fields.get("step").and_then(Value::as_u64).unwrap_or(position),
            instruction: fields
                .get("instruction")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ => None,
    }
}
