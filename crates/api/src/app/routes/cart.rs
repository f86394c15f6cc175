use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use campuscart_core::ProductId;
use campuscart_infra::CommerceStore;
use campuscart_sales::{Destination, PlaceOrder};

use crate::app::{AppServices, dto, errors};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:id", patch(adjust_item))
        .route("/sync", post(sync_cart))
        .route("/checkout", post(checkout))
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    let cart = services.cart(session.session_id());
    let snapshot = cart.lock().await.snapshot();
    Json(snapshot).into_response()
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    let cart = services.cart(session.session_id());
    let mut cart = cart.lock().await;
    cart.clear();
    Json(cart.snapshot()).into_response()
}

/// Add one unit. Adds beyond the product's stock are ignored, not rejected.
pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    let product_id = match ProductId::parse(&body.product_id) {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    let product = match services.store().get_product(&product_id).await {
        Ok(Some(p)) => p,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let cart = services.cart(session.session_id());
    let mut cart = cart.lock().await;
    cart.add(&product);
    Json(cart.snapshot()).into_response()
}

pub async fn adjust_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustCartItemRequest>,
) -> axum::response::Response {
    let product_id = match ProductId::parse(&id) {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    let cart = services.cart(session.session_id());
    let mut cart = cart.lock().await;
    cart.set_quantity(&product_id, body.delta);
    Json(cart.snapshot()).into_response()
}

/// Re-read every cart line from the store: prices are refreshed, quantities
/// are clamped to current stock, and sold-out or withdrawn products drop out.
/// This is the recovery step after a `409` from checkout.
pub async fn sync_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    let cart = services.cart(session.session_id());
    let mut cart = cart.lock().await;

    let ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id().clone()).collect();
    let mut fresh = Vec::with_capacity(ids.len());
    let mut gone = Vec::new();
    for id in ids {
        match services.store().get_product(&id).await {
            Ok(Some(p)) => fresh.push(p),
            Ok(None) => gone.push(id),
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    cart.sync(&fresh);
    for id in &gone {
        cart.remove(id);
    }
    Json(cart.snapshot()).into_response()
}

/// Place an order for the cart's contents. The cart is cleared only after
/// the order commits; on any failure it is left exactly as it was.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    let cart = services.cart(session.session_id());
    let mut cart = cart.lock().await;

    let request = PlaceOrder {
        user_id: session.user_id().clone(),
        lines: cart.checkout_lines(),
        destination: Destination::new(body.hostel, body.room),
        expected_total: body.expected_total.unwrap_or_else(|| cart.total_amount()),
    };

    match services.engine.place_order(request).await {
        Ok(order) => {
            cart.complete_checkout();
            (StatusCode::CREATED, Json(order)).into_response()
        }
        Err(e) => errors::order_error_to_response(e),
    }
}
