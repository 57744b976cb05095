//! # Web Module
//!
//! Axum front end of the adapter: routes, the registration handler, error
//! responses and middleware.
//!
//! - [`routes`] - HTTP route definitions
//! - [`handlers`] - Registration request handler
//! - [`middleware`] - Request IDs and tracing
//! - [`state`] - Shared application state
//! - [`errors`] - Plain-text error responses

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

/// Create the Axum application with routes and middleware
pub fn create_app(app_state: AppState) -> Router {
    let router = Router::new().merge(routes::registration_routes());

    middleware::apply_middleware_stack(router).with_state(app_state)
}
