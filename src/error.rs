//! Error types for the gateway.
//!
//! Every error that reaches a client before an SSE stream is opened is rendered
//! as an `OpenAI`-style error envelope via [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::translate::openai_types::ChatErrorResponse;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Missing required parameter: {field}")]
    MissingParameter { field: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Route {method} {path} not found")]
    NotFound { method: String, path: String },

    #[error("No image data returned from provider")]
    UpstreamEmptyResponse,

    #[error("Provider API error ({status}): {message}")]
    UpstreamApi {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Request to provider timed out: {message}")]
    UpstreamTimeout { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GatewayError {
    pub fn missing_parameter(field: impl Into<String>) -> Self {
        Self::MissingParameter {
            field: field.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication {
            message: msg.into(),
        }
    }

    pub fn upstream_api(status: u16, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UpstreamApi {
            status,
            code: code.into(),
            message: msg.into(),
        }
    }

    pub fn upstream_timeout(msg: impl Into<String>) -> Self {
        Self::UpstreamTimeout {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// HTTP status used when this error is returned as an ordinary response.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter { .. } | Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::UpstreamEmptyResponse => StatusCode::BAD_GATEWAY,
            Self::UpstreamApi { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Config { .. }
            | Self::Http(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingParameter { .. } | Self::InvalidRequest { .. } | Self::NotFound { .. } => {
                "invalid_request_error"
            }
            Self::Authentication { .. } => "authentication_error",
            Self::UpstreamEmptyResponse
            | Self::UpstreamApi { .. }
            | Self::UpstreamTimeout { .. } => "api_error",
            Self::Config { .. }
            | Self::Http(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => "internal_error",
        }
    }

    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::MissingParameter { .. } => "missing_parameter".to_string(),
            Self::InvalidRequest { .. } => "invalid_request".to_string(),
            Self::Authentication { .. } => "authentication_error".to_string(),
            Self::NotFound { .. } => "not_found".to_string(),
            Self::UpstreamEmptyResponse => "empty_response".to_string(),
            Self::UpstreamApi { code, .. } => code.clone(),
            Self::UpstreamTimeout { .. } => "timeout".to_string(),
            _ => "internal_error".to_string(),
        }
    }

    /// Message safe to show to API consumers. Provider messages pass through verbatim.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::UpstreamApi { message, .. } => message.clone(),
            Self::UpstreamTimeout { .. } => "Request to Volcano Engine API timed out".to_string(),
            _ => self.to_string(),
        }
    }

    #[must_use]
    pub fn to_error_response(&self) -> ChatErrorResponse {
        ChatErrorResponse::new(self.client_message(), self.error_type(), self.code())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_is_client_error() {
        let err = GatewayError::missing_parameter("model");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "invalid_request_error");
        assert_eq!(err.to_string(), "Missing required parameter: model");
    }

    #[test]
    fn test_upstream_errors_map_to_gateway_statuses() {
        assert_eq!(
            GatewayError::UpstreamEmptyResponse.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::upstream_timeout("connect refused").status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );

        let api = GatewayError::upstream_api(429, "RateLimitExceeded", "slow down");
        assert_eq!(api.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api.code(), "RateLimitExceeded");
        assert_eq!(api.client_message(), "slow down");
    }

    #[test]
    fn test_bogus_upstream_status_falls_back_to_bad_gateway() {
        let api = GatewayError::upstream_api(1000, "weird", "?");
        assert_eq!(api.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = GatewayError::missing_parameter("messages").to_error_response();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["code"], "missing_parameter");
        assert!(json["error"]["param"].is_null());
    }
}
