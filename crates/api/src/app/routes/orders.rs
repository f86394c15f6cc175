use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::{AppServices, errors};
use crate::context::SessionContext;

/// Order history for the session's user, most recent first.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    match services.engine.list_orders_for_user(session.user_id()).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}
