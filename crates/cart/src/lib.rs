//! Per-session shopping cart.
//!
//! The cart keeps desired quantities within the last known stock of each
//! product. That ceiling is advisory: the order engine re-checks against the
//! store at commit time.

pub mod cart;
pub mod events;

pub use cart::{CartLine, CartManager, CartSnapshot};
pub use events::{CartEvent, CartObserver};
