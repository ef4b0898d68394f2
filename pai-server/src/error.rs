//! Error Types for the pai-server ambient surface
//!
//! Maps the workspace's `PaiError` (and a handful of server-local failure
//! modes) onto structured JSON responses for the `/healthz` and `/metrics`
//! endpoints. All errors are serialized as JSON with an appropriate HTTP
//! status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pai_core::{AgentError, BusError, ConfigError, ContextError, LlmError, MemoryError, PaiError, ToolError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code categorizing the error, independent of the underlying
/// `PaiError` variant so the wire format stays stable as the error enum
/// grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request validation failed
    InvalidInput,
    /// Requested resource not found
    NotFound,
    /// Internal server error
    InternalError,
    /// A dependency (bus, vector store, kv store) is unavailable
    ServiceUnavailable,
    /// Operation timed out
    Timeout,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structured error response returned by every `pai-server` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(ErrorCode::Timeout, format!("Operation '{}' timed out", operation))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Implements `IntoResponse` for `ApiError` so it can be returned directly
/// from Axum handlers.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

/// Classify a `PaiError` from a dependency (bus, storage, agent runtime)
/// into the server's error surface. Transport/config/bug-class errors map
/// to 500/503; everything else is treated as a bad request from the
/// caller's perspective.
impl From<PaiError> for ApiError {
    fn from(err: PaiError) -> Self {
        match &err {
            PaiError::Bus(BusError::NoSubscribers { .. })
            | PaiError::Bus(BusError::SubscriptionClosed { .. }) => {
                ApiError::service_unavailable(err.to_string())
            }
            PaiError::Bus(BusError::PublishFailed { .. }) => {
                ApiError::internal_error(err.to_string())
            }
            PaiError::Memory(MemoryError::VectorStore { .. })
            | PaiError::Memory(MemoryError::KeyValueStore { .. })
            | PaiError::Memory(MemoryError::ColdArchive { .. }) => {
                ApiError::service_unavailable(err.to_string())
            }
            PaiError::Memory(MemoryError::NotFound { .. }) => ApiError::not_found(err.to_string()),
            PaiError::Memory(MemoryError::InvalidScope { .. })
            | PaiError::Memory(MemoryError::QualityGateRejected { .. }) => {
                ApiError::invalid_input(err.to_string())
            }
            PaiError::Llm(LlmError::RateLimited { .. }) | PaiError::Llm(LlmError::CircuitOpen { .. }) => {
                ApiError::service_unavailable(err.to_string())
            }
            PaiError::Llm(_) | PaiError::Context(ContextError::SummarizationFailed { .. }) => {
                ApiError::internal_error(err.to_string())
            }
            PaiError::Context(_) => ApiError::invalid_input(err.to_string()),
            PaiError::Tool(ToolError::UnknownTool { .. }) => ApiError::not_found(err.to_string()),
            PaiError::Tool(ToolError::PermissionDenied { .. })
            | PaiError::Tool(ToolError::SecurityBlocked { .. }) => {
                ApiError::invalid_input(err.to_string())
            }
            PaiError::Tool(_) => ApiError::internal_error(err.to_string()),
            PaiError::Config(ConfigError::MissingRequired { .. })
            | PaiError::Config(ConfigError::InvalidValue { .. }) => {
                ApiError::invalid_input(err.to_string())
            }
            PaiError::Agent(AgentError::TaskNotRunning { .. }) => ApiError::not_found(err.to_string()),
            PaiError::Agent(_) => ApiError::internal_error(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::internal_error(format!("I/O error: {}", err))
    }
}

/// Result type alias for the server's own handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_constructors() {
        let err = ApiError::invalid_input("bad request");
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_bus_error_maps_to_service_unavailable() {
        let err: ApiError = PaiError::Bus(BusError::NoSubscribers {
            topic: "agent.events".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
    }

    #[test]
    fn test_error_serialization_round_trips() -> Result<(), serde_json::Error> {
        let err = ApiError::not_found("learning not found");
        let json = serde_json::to_string(&err)?;
        assert!(json.contains("NOT_FOUND"));
        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
