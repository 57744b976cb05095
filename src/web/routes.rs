//! # Route Definitions
//!
//! The adapter exposes one registration subtree. Every method is routed to the
//! handler so that wrong methods receive the adapter's own 405 body.

use axum::routing::any;
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Create registration routes
///
/// - `/end-devices` and `/end-devices/` - device address carried in the body
/// - `/end-devices/*dev_addr` - device address carried in the path
pub fn registration_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/end-devices",
            any(handlers::registrations::put_end_device),
        )
        .route(
            "/end-devices/",
            any(handlers::registrations::put_end_device),
        )
        .route(
            "/end-devices/*dev_addr",
            any(handlers::registrations::put_end_device),
        )
}
