//! One-time catalog seeding.

use std::path::Path;

use thiserror::Error;
use tracing::instrument;

use campuscart_products::Product;

use crate::store::{CommerceStore, StoreError};

const DEFAULT_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The store was empty; this many products were written.
    Seeded(usize),
    /// The store already held this many products; nothing was written.
    Skipped(u64),
}

/// The campus catalog bundled with this crate.
pub fn default_catalog() -> Result<Vec<Product>, SeedError> {
    parse_catalog(DEFAULT_CATALOG)
}

/// Load a JSON array of products from disk.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<Product>, SeedError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_catalog(&raw)
}

pub fn parse_catalog(raw: &str) -> Result<Vec<Product>, SeedError> {
    Ok(serde_json::from_str(raw)?)
}

/// Bulk-load `products` if (and only if) the store has no products yet.
#[instrument(skip(store, products), fields(count = products.len()))]
pub async fn seed_catalog<S>(store: &S, products: &[Product]) -> Result<SeedOutcome, SeedError>
where
    S: CommerceStore + ?Sized,
{
    let existing = store.product_count().await?;
    if existing > 0 {
        tracing::info!(existing, "catalog already present; skipping seed");
        return Ok(SeedOutcome::Skipped(existing));
    }
    store.put_products(products).await?;
    tracing::info!(seeded = products.len(), "catalog seeded");
    Ok(SeedOutcome::Seeded(products.len()))
}
