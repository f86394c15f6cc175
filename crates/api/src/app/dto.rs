use serde::{Deserialize, Serialize};

use campuscart_core::{SessionId, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustCartItemRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub hostel: String,
    pub room: String,
    /// Client-computed total; defaults to the cart's own total.
    pub expected_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub user_id: UserId,
}
