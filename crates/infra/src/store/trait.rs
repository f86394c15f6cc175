use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use campuscart_auth::UserAccount;
use campuscart_core::{OrderId, ProductId, UserId};
use campuscart_products::{Category, Product};
use campuscart_sales::Order;

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, stock). Every variant leaves the store unchanged: a failed
/// transaction is never partially visible.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused to commit.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// A write lost a race (duplicate key, stock changed underneath a transaction).
    #[error("write conflict: {0}")]
    Conflict(String),
}

/// Compare-and-set stock write used inside a transaction.
///
/// Applied only if the product's stock still equals `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpdate {
    pub product_id: ProductId,
    pub expected: u32,
    pub new_stock: u32,
}

/// An open, serializable unit of work.
///
/// Writes are invisible to other readers until `commit` succeeds. Dropping a
/// transaction without committing rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Read the current products for `ids`. Unknown ids are simply absent.
    async fn read_products(
        &mut self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, StoreError>;

    /// Apply a batch of stock writes. Fails with `Conflict` if any
    /// `expected` value no longer matches.
    async fn apply_stock(&mut self, updates: &[StockUpdate]) -> Result<(), StoreError>;

    /// Append a new order. Fails with `Conflict` if the id already exists.
    async fn append_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Durable collections for products, orders and users.
///
/// ## Collections
///
/// - **products**: keyed by `ProductId`, upserted by seeding/restocking,
///   stock lowered only through a transaction
/// - **orders**: append-only, indexed by user id
/// - **users**: keyed by `UserId`, unique by (lowercased) email
///
/// ## Ordering
///
/// `orders_by_user` returns most-recent-first (`created_at` descending, ties
/// broken by order id descending). Id matching is exact and case-sensitive.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn all_products(&self) -> Result<Vec<Product>, StoreError>;

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    async fn products_by_category(&self, category: &Category) -> Result<Vec<Product>, StoreError>;

    async fn product_count(&self) -> Result<u64, StoreError>;

    /// Upsert a single product.
    async fn put_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Upsert a batch of products atomically.
    async fn put_products(&self, products: &[Product]) -> Result<(), StoreError>;

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError>;

    /// Insert a user. Fails with `Conflict` on a duplicate id or email.
    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError>;

    async fn get_user(&self, id: &UserId) -> Result<Option<UserAccount>, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;

    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

#[async_trait]
impl<S> CommerceStore for Arc<S>
where
    S: CommerceStore + ?Sized,
{
    async fn all_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).all_products().await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }

    async fn products_by_category(&self, category: &Category) -> Result<Vec<Product>, StoreError> {
        (**self).products_by_category(category).await
    }

    async fn product_count(&self) -> Result<u64, StoreError> {
        (**self).product_count().await
    }

    async fn put_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).put_product(product).await
    }

    async fn put_products(&self, products: &[Product]) -> Result<(), StoreError> {
        (**self).put_products(products).await
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get_order(id).await
    }

    async fn orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        (**self).orders_by_user(user_id).await
    }

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        (**self).insert_user(user).await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<UserAccount>, StoreError> {
        (**self).get_user(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        (**self).get_user_by_email(email).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        (**self).begin().await
    }
}

/// Most-recent-first ordering shared by every backend.
pub(crate) fn sort_most_recent_first(orders: &mut [Order]) {
    use campuscart_core::Entity;
    orders.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
}
