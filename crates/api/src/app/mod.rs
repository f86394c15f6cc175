//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, order engine, identity and per-session carts
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let session_state = middleware::SessionState {
        sessions: services.sessions.clone(),
    };

    // Session-scoped routes: require a live `x-session-id`.
    let protected = routes::session_router().layer(axum::middleware::from_fn_with_state(
        session_state,
        middleware::session_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
