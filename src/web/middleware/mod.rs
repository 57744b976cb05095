//! # Web Middleware
//!
//! Request ID tagging and HTTP tracing applied around the registration routes.

pub mod request_id;

use axum::extract::Request;
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::web::state::AppState;
use request_id::RequestId;

/// Apply the middleware stack for a router with app state
///
/// Order, outermost first:
/// 1. Request ID generation
/// 2. Tracing, with the request ID recorded on the span
pub fn apply_middleware_stack(router: Router<AppState>) -> Router<AppState> {
    router
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(RequestId::as_str)
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(middleware::from_fn(request_id::add_request_id))
}
