//! # Registration Parsing
//!
//! The [`Parser`] trait turns a raw inbound request into a [`Registration`].
//! The bridge depends only on the trait, so new wire formats plug in without
//! touching the hand-off logic. [`JsonRegistrationParser`] handles the JSON
//! bodies accepted on `/end-devices/`.

use axum::http::Method;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::registration::{AppEui, DevAddr, NwkSKey, Registration};

/// Path prefix under which device registrations are accepted
pub const END_DEVICES_PATH: &str = "/end-devices";

/// Transport-neutral view of an inbound registration request
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl InboundRequest {
    /// Build a JSON `PUT` request, mostly useful for parsers under test
    pub fn json_put(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    /// The device address segment of `/end-devices/:devAddr`, if present
    pub fn path_dev_addr(&self) -> Option<&str> {
        let rest = self.path.strip_prefix(END_DEVICES_PATH)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .next_back()
    }
}

/// Why a request body could not be interpreted as a registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("devAddr in path ({path}) does not match body ({body})")]
    DevAddrMismatch { path: String, body: String },
}

impl ParseError {
    pub fn invalid_field(field: &'static str, reason: impl ToString) -> Self {
        Self::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

/// Converts an inbound request into a domain registration
///
/// Implementations must not have side effects beyond reading the request.
pub trait Parser: Send + Sync + 'static {
    fn parse(&self, request: &InboundRequest) -> Result<Registration, ParseError>;
}

impl<F> Parser for F
where
    F: Fn(&InboundRequest) -> Result<Registration, ParseError> + Send + Sync + 'static,
{
    fn parse(&self, request: &InboundRequest) -> Result<Registration, ParseError> {
        self(request)
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationBody {
    #[serde(rename = "devAddr")]
    dev_addr: Option<String>,
    #[serde(rename = "appEUI")]
    app_eui: Option<String>,
    #[serde(rename = "nwkSKey")]
    nwk_s_key: Option<String>,
}

/// Parses `{"devAddr": "...", "appEUI": "...", "nwkSKey": "..."}` bodies
///
/// `devAddr` may come from the body or from the request path; when both are
/// given they must name the same device.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRegistrationParser;

impl JsonRegistrationParser {
    pub fn new() -> Self {
        Self
    }

    fn resolve_dev_addr(
        path_value: Option<&str>,
        body_value: Option<&str>,
    ) -> Result<DevAddr, ParseError> {
        let parse = |raw: &str| {
            raw.parse::<DevAddr>()
                .map_err(|e| ParseError::invalid_field("devAddr", e))
        };

        match (path_value, body_value) {
            (None, None) => Err(ParseError::MissingField("devAddr")),
            (Some(raw), None) | (None, Some(raw)) => parse(raw),
            (Some(from_path), Some(from_body)) => {
                let path_addr = parse(from_path)?;
                let body_addr = parse(from_body)?;
                if path_addr != body_addr {
                    return Err(ParseError::DevAddrMismatch {
                        path: path_addr.to_string(),
                        body: body_addr.to_string(),
                    });
                }
                Ok(body_addr)
            }
        }
    }
}

impl Parser for JsonRegistrationParser {
    fn parse(&self, request: &InboundRequest) -> Result<Registration, ParseError> {
        let body: RegistrationBody = serde_json::from_slice(&request.body)
            .map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        let dev_addr =
            Self::resolve_dev_addr(request.path_dev_addr(), body.dev_addr.as_deref())?;
        let mut registration = Registration::new(dev_addr);

        if let Some(raw) = body.app_eui.as_deref() {
            let app_eui = raw
                .parse::<AppEui>()
                .map_err(|e| ParseError::invalid_field("appEUI", e))?;
            registration = registration.with_app_eui(app_eui);
        }

        if let Some(raw) = body.nwk_s_key.as_deref() {
            let key = raw
                .parse::<NwkSKey>()
                .map_err(|e| ParseError::invalid_field("nwkSKey", e))?;
            registration = registration.with_nwk_s_key(key);
        }

        Ok(registration)
    }
}
