//! # Device Registration Handler
//!
//! `PUT /end-devices/` and `PUT /end-devices/:devAddr`. Each request is
//! validated, parsed, then suspended on the bridge until the consumer acks or
//! nacks it.

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

use crate::bridge::Outcome;
use crate::logging::log_registration_operation;
use crate::parser::InboundRequest;
use crate::web::errors::{ApiError, ApiResult, INCORRECT_CONTENT_TYPE_MESSAGE};
use crate::web::state::AppState;

/// Whether a `Content-Type` header declares JSON, ignoring parameters
pub fn is_json_content_type(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Register an end device: PUT /end-devices/:devAddr
pub async fn put_end_device(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let sender = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    debug!(sender = %sender, "Receiving new registration request");

    if method != Method::PUT {
        warn!(sender = %sender, method = %method, "Rejected registration with unsupported method");
        return Err(ApiError::MethodNotAllowed);
    }

    let content_type = headers.get(header::CONTENT_TYPE);
    if !is_json_content_type(content_type) {
        warn!(sender = %sender, "Received invalid content-type in request");
        return Err(ApiError::bad_request(INCORRECT_CONTENT_TYPE_MESSAGE));
    }

    let request = InboundRequest {
        method,
        path: uri.path().to_string(),
        content_type: content_type
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    };

    let registration = state.parser.parse(&request).map_err(|e| {
        warn!(sender = %sender, error = %e, "Received invalid body in request");
        ApiError::from(e)
    })?;

    let dev_addr = registration.dev_addr.to_string();
    log_registration_operation("submit", Some(&dev_addr), None, "pending", None);

    let submitted = match state.config.submit_timeout() {
        Some(deadline) => state.bridge.submit_with_deadline(registration, deadline).await,
        None => state.bridge.submit(registration).await,
    };

    let outcome = submitted.map_err(|e| {
        error!(sender = %sender, dev_addr = %dev_addr, error = %e, "Core server not responding");
        ApiError::from(e)
    })?;

    info!(
        sender = %sender,
        dev_addr = %dev_addr,
        status_code = outcome.status_code,
        "Registration answered by consumer"
    );

    Ok(outcome_response(outcome))
}

/// Write a consumer outcome verbatim
fn outcome_response(outcome: Outcome) -> Response {
    match StatusCode::from_u16(outcome.status_code) {
        Ok(status) => (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            outcome.content,
        )
            .into_response(),
        Err(_) => {
            error!(
                status_code = outcome.status_code,
                "Consumer answered with an invalid HTTP status"
            );
            ApiError::Internal.into_response()
        }
    }
}
