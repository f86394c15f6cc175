//! Cart notifications.

use campuscart_core::ProductId;

/// Something that happened to a cart.
///
/// Rejected adds are silent for the caller of `CartManager::add`; observers
/// are the only place they surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    Added { product_id: ProductId, quantity: u32 },
    QuantityChanged { product_id: ProductId, from: u32, to: u32 },
    Removed { product_id: ProductId },
    /// An add was ignored because it would exceed the known stock.
    AddRejected { product_id: ProductId, stock: u32 },
    Cleared,
}

/// Receives cart events synchronously, in the order they happen.
pub trait CartObserver: Send + Sync {
    fn on_event(&self, event: &CartEvent);
}

impl<F> CartObserver for F
where
    F: Fn(&CartEvent) + Send + Sync,
{
    fn on_event(&self, event: &CartEvent) {
        self(event)
    }
}
