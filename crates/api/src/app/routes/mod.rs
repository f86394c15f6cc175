use axum::{
    Router,
    routing::{get, post},
};

pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod system;

/// Endpoints reachable without a session.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .nest("/products", products::router())
}

/// Endpoints that act on behalf of the session's user.
pub fn session_router() -> Router {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .nest("/cart", cart::router())
        .route("/orders", get(orders::list_orders))
}
