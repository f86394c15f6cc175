//! Infrastructure wiring for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{Duration, Utc};

use campuscart_auth::{IdentityOracle, SessionRegistry};
use campuscart_cart::CartManager;
use campuscart_core::SessionId;
use campuscart_infra::{
    CommerceStore, InMemoryStore, OrderEngine, SeedOutcome, SqliteStore, StoreIdentity,
    default_catalog, load_catalog, seed_catalog,
};

use crate::config::{AppConfig, DatabaseConfig};

pub type SharedStore = Arc<dyn CommerceStore>;

const SWEEP_PERIOD: std::time::Duration = std::time::Duration::from_secs(60);

/// A session's cart. Held across the checkout await so a concurrent edit
/// cannot slip in between building the order and clearing the cart.
pub type SharedCart = Arc<tokio::sync::Mutex<CartManager>>;

pub struct AppServices {
    pub engine: OrderEngine<SharedStore>,
    pub identity: Arc<dyn IdentityOracle>,
    pub sessions: Arc<SessionRegistry>,
    carts: Mutex<HashMap<SessionId, SharedCart>>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("sessions", &self.sessions.len())
            .field("carts", &self.cart_count())
            .finish_non_exhaustive()
    }
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            engine: OrderEngine::new(store.clone()),
            identity: Arc::new(StoreIdentity::new(store)),
            sessions: Arc::new(SessionRegistry::new()),
            carts: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &SharedStore {
        self.engine.store()
    }

    /// The cart for `session_id`, created empty on first use.
    pub fn cart(&self, session_id: &SessionId) -> SharedCart {
        let mut carts = match self.carts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        carts
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(CartManager::new())))
            .clone()
    }

    /// Drop a session's cart (logout).
    pub fn discard_cart(&self, session_id: &SessionId) {
        let mut carts = match self.carts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        carts.remove(session_id);
    }

    /// Expire sessions idle for longer than `max_idle` and drop their carts.
    pub fn expire_idle_sessions(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let expired = self.sessions.expire_idle(cutoff);
        for id in &expired {
            self.discard_cart(id);
        }
        expired.len()
    }

    pub fn cart_count(&self) -> usize {
        match self.carts.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Periodically expire idle sessions until the task is aborted.
pub fn spawn_session_sweeper(
    services: Arc<AppServices>,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    let period = max_idle
        .to_std()
        .unwrap_or(SWEEP_PERIOD)
        .min(SWEEP_PERIOD)
        .max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let expired = services.expire_idle_sessions(max_idle);
            if expired > 0 {
                tracing::debug!(expired, remaining = services.sessions.len(), "session sweep");
            }
        }
    })
}

/// Open the configured store and seed the catalog.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match &config.database {
        DatabaseConfig::InMemory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Arc::new(InMemoryStore::new())
        }
        DatabaseConfig::Sqlite(url) => Arc::new(
            SqliteStore::connect(url)
                .await
                .with_context(|| format!("failed to open database {url}"))?,
        ),
    };

    let catalog = match &config.catalog {
        Some(path) => load_catalog(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => default_catalog().context("bundled catalog is invalid")?,
    };

    match seed_catalog(store.as_ref(), &catalog)
        .await
        .context("failed to seed catalog")?
    {
        SeedOutcome::Seeded(n) => tracing::info!(products = n, "catalog seeded"),
        SeedOutcome::Skipped(n) => tracing::info!(products = n, "catalog already present"),
    }

    Ok(AppServices::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use campuscart_core::UserId;

    #[tokio::test]
    async fn idle_sweep_drops_sessions_and_their_carts() {
        let services = AppServices::new(Arc::new(InMemoryStore::new()));
        let stale = services.sessions.create(UserId::parse("usr_stale").unwrap());
        services.cart(stale.id());

        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        let fresh = services.sessions.create(UserId::parse("usr_fresh").unwrap());
        services.cart(fresh.id());

        assert_eq!(services.expire_idle_sessions(Duration::milliseconds(150)), 1);
        assert!(services.sessions.get(stale.id()).is_none());
        assert!(services.sessions.get(fresh.id()).is_some());
        assert_eq!(services.cart_count(), 1);
    }
}
