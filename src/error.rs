use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while forwarding a request upstream
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Client input is missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Uploaded file or request body exceeds the configured ceiling
    #[error("{subject} too large ({size}). Max is {limit}.")]
    PayloadTooLarge {
        subject: &'static str,
        size: String,
        limit: String,
    },

    /// Could not connect to the upstream service
    #[error("Failed to reach upstream service at {url}")]
    UpstreamUnreachable { url: String, cause: String },

    /// Upstream accepted the connection but did not answer in time
    #[error("Upstream service at {url} timed out after {secs}s")]
    UpstreamTimeout { url: String, secs: u64 },

    /// Upstream answered with a success status but an unusable body
    #[error("{message}")]
    UpstreamProtocol { message: String, preview: String },

    /// Upstream answered with a non-success status
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        preview: Option<String>,
    },

    /// Anything else that went wrong inside the gateway
    #[error("Unknown error: {0}")]
    Internal(String),
}

/// JSON body returned to the client on every failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamProtocol { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Upstream { status, .. } => reflected_status(*status),
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            GatewayError::UpstreamUnreachable { url, cause } => ErrorEnvelope {
                error: self.to_string(),
                detail: Some(format!(
                    "{cause}. Is the upstream service running at {url}? Try opening {url}/health."
                )),
                status: None,
            },
            GatewayError::UpstreamProtocol { message, preview } => ErrorEnvelope {
                error: message.clone(),
                detail: Some(preview.clone()),
                status: None,
            },
            GatewayError::Upstream {
                status,
                message,
                preview,
            } => ErrorEnvelope {
                error: message.clone(),
                detail: preview.clone(),
                status: Some(*status),
            },
            GatewayError::Internal(message) => ErrorEnvelope {
                error: "Unknown error".to_string(),
                detail: Some(message.clone()),
                status: None,
            },
            _ => ErrorEnvelope {
                error: self.to_string(),
                detail: None,
                status: None,
            },
        }
    }
}

/// Upstream 4xx/5xx codes are passed through; anything else becomes 502.
fn reflected_status(status: u16) -> StatusCode {
    match StatusCode::from_u16(status) {
        Ok(code) if code.is_client_error() || code.is_server_error() => code,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = GatewayError::Validation("Missing 'url' (string) in request body.".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.envelope(),
            ErrorEnvelope {
                error: "Missing 'url' (string) in request body.".to_string(),
                detail: None,
                status: None,
            }
        );
    }

    #[test]
    fn test_upstream_status_is_reflected() {
        let err = GatewayError::Upstream {
            status: 404,
            message: "no route".to_string(),
            preview: None,
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.envelope().status, Some(404));
    }

    #[test]
    fn test_non_error_upstream_status_becomes_bad_gateway() {
        let err = GatewayError::Upstream {
            status: 302,
            message: "Upstream error (status 302).".to_string(),
            preview: None,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_unreachable_names_upstream_and_health() {
        let err = GatewayError::UpstreamUnreachable {
            url: "http://127.0.0.1:8000".to_string(),
            cause: "connection refused".to_string(),
        };
        let envelope = err.envelope();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(envelope.error.contains("http://127.0.0.1:8000"));
        assert!(envelope
            .detail
            .unwrap()
            .contains("http://127.0.0.1:8000/health"));
    }

    #[test]
    fn test_internal_hides_message_behind_generic_error() {
        let err = GatewayError::Internal("boom".to_string());
        let envelope = err.envelope();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.error, "Unknown error");
        assert_eq!(envelope.detail.as_deref(), Some("boom"));
    }

    #[test]
    fn test_envelope_skips_absent_fields() {
        let json = serde_json::to_value(ErrorEnvelope {
            error: "x".to_string(),
            detail: None,
            status: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"error": "x"}));
    }
}
