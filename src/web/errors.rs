//! # Web API Error Types
//!
//! Errors raised while handling a registration request and their plain-text
//! HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error::BridgeError;
use crate::parser::ParseError;

/// Body returned when the consumer cannot answer
pub const CONSUMER_UNAVAILABLE_MESSAGE: &str = "Core server not responding";

/// Body returned for a missing or non-JSON content type
pub const INCORRECT_CONTENT_TYPE_MESSAGE: &str = "Incorrect content type";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unrecognized HTTP method. Please use [PUT] to register a device")]
    MethodNotAllowed,

    #[error("{message}")]
    BadRequest { message: String },

    #[error("{}", CONSUMER_UNAVAILABLE_MESSAGE)]
    ConsumerUnavailable,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Create a BadRequest error with a custom message
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::ConsumerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

impl From<ParseError> for ApiError {
    fn from(error: ParseError) -> Self {
        ApiError::bad_request(error.to_string())
    }
}

impl From<BridgeError> for ApiError {
    fn from(error: BridgeError) -> Self {
        if error.is_consumer_unavailable() {
            ApiError::ConsumerUnavailable
        } else {
            ApiError::Internal
        }
    }
}

/// Result type alias for registration handlers
pub type ApiResult<T> = Result<T, ApiError>;
