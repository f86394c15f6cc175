use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use campuscart_auth::UserAccount;
use campuscart_core::{Entity, OrderId, ProductId, UserId};
use campuscart_products::{Category, Product};
use campuscart_sales::Order;

use super::r#trait::{
    CommerceStore, StockUpdate, StoreError, StoreTransaction, sort_most_recent_first,
};

#[derive(Debug, Default, Clone)]
struct State {
    products: HashMap<ProductId, Product>,
    orders: Vec<Order>,
    users: HashMap<UserId, UserAccount>,
}

/// In-memory store.
///
/// Intended for tests/dev. One async mutex guards the whole state: a
/// transaction holds it from `begin` until commit/rollback, so transactions
/// are fully serialized and plain reads wait for them.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    /// Only ever set by tests.
    fail_next_commit: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next transaction fail at commit time (its writes are discarded).
    #[cfg(test)]
    pub(crate) fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn all_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(products)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(id).cloned())
    }

    async fn products_by_category(&self, category: &Category) -> Result<Vec<Product>, StoreError> {
        let mut products = self.all_products().await?;
        products.retain(|p| p.category() == category);
        Ok(products)
    }

    async fn product_count(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.products.len() as u64)
    }

    async fn put_product(&self, product: &Product) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .products
            .insert(product.id().clone(), product.clone());
        Ok(())
    }

    async fn put_products(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        for p in products {
            state.products.insert(p.id().clone(), p.clone());
        }
        Ok(())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id() == id).cloned())
    }

    async fn orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        sort_most_recent_first(&mut orders);
        Ok(orders)
    }

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.state.lock().await.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let fail_commit = self.fail_next_commit.swap(false, Ordering::SeqCst);
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged_stock: HashMap::new(),
            staged_orders: Vec::new(),
            fail_commit,
        }))
    }
}

/// Transaction over the locked state; writes are staged until commit.
struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    staged_stock: HashMap<ProductId, u32>,
    staged_orders: Vec<Order>,
    fail_commit: bool,
}

impl InMemoryTransaction {
    fn current_stock(&self, id: &ProductId) -> Option<u32> {
        self.staged_stock
            .get(id)
            .copied()
            .or_else(|| self.guard.products.get(id).map(Product::stock))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn read_products(
        &mut self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, StoreError> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            let Some(product) = self.guard.products.get(id) else {
                continue;
            };
            let mut product = product.clone();
            if let Some(&staged) = self.staged_stock.get(id) {
                // Staged values only ever come from a successful compare-and-set.
                let current = product.stock();
                if staged < current {
                    product
                        .withdraw(current - staged)
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                } else {
                    product
                        .restock(staged - current)
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                }
            }
            out.insert(id.clone(), product);
        }
        Ok(out)
    }

    async fn apply_stock(&mut self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        // Check everything first so a failing batch stages nothing.
        for u in updates {
            match self.current_stock(&u.product_id) {
                Some(current) if current == u.expected => {}
                Some(current) => {
                    return Err(StoreError::Conflict(format!(
                        "stock for {} is {current}, expected {}",
                        u.product_id, u.expected
                    )));
                }
                None => {
                    return Err(StoreError::Conflict(format!(
                        "product {} does not exist",
                        u.product_id
                    )));
                }
            }
        }
        for u in updates {
            self.staged_stock.insert(u.product_id.clone(), u.new_stock);
        }
        Ok(())
    }

    async fn append_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let exists = self
            .guard
            .orders
            .iter()
            .chain(self.staged_orders.iter())
            .any(|o| o.id() == order.id());
        if exists {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id())));
        }
        self.staged_orders.push(order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = *self;
        if this.fail_commit {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        // Validate every staged write before touching state, then apply.
        let mut updated = Vec::with_capacity(this.staged_stock.len());
        for (id, new_stock) in &this.staged_stock {
            let Some(product) = this.guard.products.get(id) else {
                return Err(StoreError::Conflict(format!("product {id} disappeared")));
            };
            let mut product = product.clone();
            let current = product.stock();
            let result = if *new_stock <= current {
                product.withdraw(current - new_stock)
            } else {
                product.restock(new_stock - current)
            };
            result.map_err(|e| StoreError::Corrupt(e.to_string()))?;
            updated.push(product);
        }

        let staged_orders = std::mem::take(&mut this.staged_orders);
        let state = &mut *this.guard;
        for product in updated {
            state.products.insert(product.id().clone(), product);
        }
        state.orders.extend(staged_orders);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged writes die with the transaction; dropping releases the lock.
        Ok(())
    }
}
