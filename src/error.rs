//! Error types for the registration adapter.

use thiserror::Error;

use crate::parser::ParseError;

/// Failures of the registration hand-off between HTTP callers and the consumer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The consumer dropped the request (or its acknowledger) without answering
    #[error("Consumer unavailable: no response was delivered for the registration")]
    ConsumerUnavailable,
    /// The bridge was closed during shutdown
    #[error("Registration bridge is closed")]
    Closed,
    /// A bounded submit ran out of time before the consumer answered
    #[error("Timed out after {elapsed_ms}ms waiting for the consumer")]
    Timeout { elapsed_ms: u64 },
    /// Ack or nack was called on a request that already received its outcome
    #[error("Registration {request_id} was already answered")]
    AlreadyResponded { request_id: u64 },
}

impl BridgeError {
    /// Whether this failure means the consumer side cannot answer the caller
    pub fn is_consumer_unavailable(&self) -> bool {
        matches!(
            self,
            BridgeError::ConsumerUnavailable | BridgeError::Closed | BridgeError::Timeout { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(String),
    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        ConfigurationError::Load(error.to_string())
    }
}

/// Top-level error for adapter construction and operation
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;
