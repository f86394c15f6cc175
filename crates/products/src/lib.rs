//! Catalog domain module.
//!
//! Products plus the stock arithmetic shared by the cart and the order engine.
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod stock;

pub use product::{Category, Product};
