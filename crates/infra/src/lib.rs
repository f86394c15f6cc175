//! Infrastructure layer: persistence, order transactions, identity, seeding.

pub mod identity;
pub mod order_engine;
pub mod seed;
pub mod store;


pub use identity::StoreIdentity;
pub use order_engine::{OrderEngine, OrderError};
pub use seed::{SeedError, SeedOutcome, default_catalog, load_catalog, seed_catalog};
pub use store::{CommerceStore, InMemoryStore, SqliteStore, StoreError};
