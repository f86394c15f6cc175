use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use campuscart_auth::AuthError;
use campuscart_infra::{OrderError, StoreError};

pub fn order_error_to_response(err: OrderError) -> axum::response::Response {
    match err {
        OrderError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        OrderError::StockInsufficient {
            product_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "stock_insufficient",
                "message": format!("only {available} of {product_id} left"),
                "product_id": product_id,
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        OrderError::PriceChanged {
            product_id,
            expected,
            actual,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "price_changed",
                "message": format!("price of {product_id} is now {actual}; refresh the cart"),
                "product_id": product_id,
                "expected": expected,
                "actual": actual,
            })),
        )
            .into_response(),
        OrderError::StoreUnavailable(e) => store_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "store failure");
    json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", err.to_string())
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid credentials")
        }
        AuthError::EmailTaken => json_error(StatusCode::CONFLICT, "email_taken", err.to_string()),
        AuthError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AuthError::PasswordHash => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "failed to process password",
        ),
        AuthError::Store(msg) => {
            tracing::error!(error = %msg, "identity store failure");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
