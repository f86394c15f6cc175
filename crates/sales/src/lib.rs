//! Orders domain module.
//!
//! Committed orders, their line snapshots and the request shape the order
//! engine consumes. Pure domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{Destination, LineItem, Order, OrderLine, OrderStatus, PlaceOrder};
