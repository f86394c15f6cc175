//! Order transaction engine.
//!
//! ## Execution Flow
//!
//! ```text
//! PlaceOrder
//!   ↓
//! 0. Shape validation (no store access)
//!   ↓  -- commit lock acquired, store transaction opened --
//! 1. Read authoritative stock for every referenced product
//!   ↓
//! 2. Check every line (first failing line aborts everything)
//!   ↓
//! 3. Apply all stock decrements as one batch
//!   ↓
//! 4. Build the confirmed order and append it
//!   ↓  -- commit --
//! Order
//! ```
//!
//! Steps 1-4 run inside a single store transaction while holding the
//! engine's commit lock. Any failure after `begin()` rolls the transaction
//! back, so readers either see all decrements plus the order, or neither.

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

use campuscart_core::{DomainError, Entity, OrderId, ProductId, UserId};
use campuscart_products::stock;
use campuscart_sales::{Order, OrderLine, PlaceOrder};

use crate::store::{CommerceStore, StockUpdate, StoreError, StoreTransaction};

#[derive(Debug, Error)]
pub enum OrderError {
    /// Malformed request; nothing was read or written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A line's unit price no longer matches the catalog; nothing was
    /// written. Refresh the cart and resubmit.
    #[error("price for {product_id} changed from {expected} to {actual}")]
    PriceChanged {
        product_id: ProductId,
        expected: u64,
        actual: u64,
    },

    /// Authoritative stock check failed; nothing was written.
    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    StockInsufficient {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The store could not be reached or refused to commit. The transaction
    /// was rolled back.
    #[error("order could not be committed: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl From<DomainError> for OrderError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => OrderError::Validation(msg),
            DomainError::InvariantViolation(msg) => OrderError::Validation(msg),
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(value: StoreError) -> Self {
        OrderError::StoreUnavailable(value)
    }
}

/// Serialises order placement against a `CommerceStore`.
#[derive(Debug)]
pub struct OrderEngine<S> {
    store: S,
    commit_lock: Mutex<()>,
}

impl<S> OrderEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> OrderEngine<S>
where
    S: CommerceStore,
{
    /// Validate, check stock, decrement and record an order atomically.
    #[instrument(
        skip(self, request),
        fields(user_id = %request.user_id, lines = request.lines.len())
    )]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<Order, OrderError> {
        let total = request.validate().map_err(|e| {
            tracing::debug!(error = %e, "order rejected by validation");
            OrderError::from(e)
        })?;

        let _guard = self.commit_lock.lock().await;

        let mut tx = self.store.begin().await.map_err(|e| {
            tracing::error!(error = %e, "failed to open order transaction");
            OrderError::from(e)
        })?;

        match run_transaction(tx.as_mut(), &request, total).await {
            Ok(order) => {
                if let Err(e) = tx.commit().await {
                    tracing::error!(error = %e, order_id = %order.id(), "order commit failed");
                    return Err(e.into());
                }
                tracing::info!(
                    order_id = %order.id(),
                    total = order.total(),
                    line_count = order.line_count(),
                    "order committed"
                );
                Ok(order)
            }
            Err(err) => {
                match &err {
                    OrderError::StockInsufficient {
                        product_id,
                        requested,
                        available,
                    } => tracing::warn!(%product_id, requested, available, "insufficient stock"),
                    OrderError::PriceChanged {
                        product_id,
                        expected,
                        actual,
                    } => tracing::info!(%product_id, expected, actual, "price changed since cart snapshot"),
                    OrderError::Validation(msg) => tracing::debug!(error = %msg, "order rejected"),
                    OrderError::StoreUnavailable(e) => tracing::error!(error = %e, "order transaction failed"),
                }
                if let Err(e) = tx.rollback().await {
                    tracing::error!(error = %e, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Orders for `user_id`, most recent first. Does not take the commit lock.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, OrderError> {
        self.store.orders_by_user(user_id).await.map_err(|e| {
            tracing::error!(error = %e, "failed to load order history");
            OrderError::from(e)
        })
    }
}

async fn run_transaction(
    tx: &mut dyn StoreTransaction,
    request: &PlaceOrder,
    total: u64,
) -> Result<Order, OrderError> {
    // 1. authoritative read
    let ids: Vec<ProductId> = request.lines.iter().map(|l| l.product_id.clone()).collect();
    let products = tx.read_products(&ids).await?;

    // 2. every line must be satisfiable before anything is written
    let mut updates = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let Some(product) = products.get(&line.product_id) else {
            return Err(OrderError::StockInsufficient {
                product_id: line.product_id.clone(),
                requested: line.quantity,
                available: 0,
            });
        };
        let Some(new_stock) = stock::remaining_after(product.stock(), line.quantity) else {
            return Err(OrderError::StockInsufficient {
                product_id: line.product_id.clone(),
                requested: line.quantity,
                available: product.stock(),
            });
        };
        updates.push(StockUpdate {
            product_id: line.product_id.clone(),
            expected: product.stock(),
            new_stock,
        });
    }

    for line in &request.lines {
        if let Some(product) = products.get(&line.product_id) {
            if product.price() != line.unit_price {
                return Err(OrderError::PriceChanged {
                    product_id: line.product_id.clone(),
                    expected: line.unit_price,
                    actual: product.price(),
                });
            }
        }
    }

    // 3. batch decrement
    tx.apply_stock(&updates).await?;

    // 4. immutable order record
    let lines = request
        .lines
        .iter()
        .map(|line| {
            let mut snapshot = OrderLine::from(line);
            if let Some(product) = products.get(&line.product_id) {
                snapshot.name = product.name().to_string();
            }
            snapshot
        })
        .collect();
    let order = Order::confirmed(
        OrderId::generate(),
        request.user_id.clone(),
        lines,
        request.destination.clone(),
        total,
        Utc::now(),
    )?;
    tx.append_order(&order).await?;
    Ok(order)
}
