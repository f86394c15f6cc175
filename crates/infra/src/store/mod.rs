//! Commerce persistence.
//!
//! - `trait`: the store boundary (`CommerceStore`, `StoreTransaction`)
//! - `in_memory`: mutex-guarded implementation for tests/dev
//! - `sqlite`: durable implementation (sqlx)

pub mod in_memory;
pub mod sqlite;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use r#trait::{CommerceStore, StockUpdate, StoreError, StoreTransaction};
