//! SQLite-backed commerce store.
//!
//! ## Schema
//!
//! | Table      | Key  | Notes |
//! |------------|------|-------|
//! | `products` | `id` | `stock >= 0` enforced by a CHECK constraint |
//! | `orders`   | `id` | line snapshots stored as JSON text, indexed by `(user_id, created_at)` |
//! | `users`    | `id` | `email` is UNIQUE |
//!
//! Timestamps are RFC3339 strings with nanosecond precision and a `Z` suffix,
//! so lexicographic order equals chronological order.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database (unique violation) | `Conflict` |
//! | Database (other), PoolTimedOut, PoolClosed, Io | `Unavailable` |
//! | ColumnDecode, Decode, ColumnNotFound | `Corrupt` |
//!
//! ## Concurrency
//!
//! Stock writes inside a transaction are compare-and-set
//! (`UPDATE ... WHERE id = ? AND stock = ?expected`); zero affected rows
//! is reported as `Conflict` and the caller rolls back.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

use campuscart_auth::UserAccount;
use campuscart_core::{Entity, OrderId, ProductId, UserId};
use campuscart_products::{Category, Product};
use campuscart_sales::{Destination, Order, OrderLine, OrderStatus};

use super::r#trait::{CommerceStore, StockUpdate, StoreError, StoreTransaction};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id          TEXT PRIMARY KEY NOT NULL,
        name        TEXT NOT NULL,
        price       INTEGER NOT NULL CHECK (price >= 0),
        category    TEXT NOT NULL,
        stock       INTEGER NOT NULL CHECK (stock >= 0),
        description TEXT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products (category)",
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id         TEXT PRIMARY KEY NOT NULL,
        user_id    TEXT NOT NULL,
        lines      TEXT NOT NULL,
        total      INTEGER NOT NULL,
        status     TEXT NOT NULL,
        hostel     TEXT NOT NULL,
        room       TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_user_created ON orders (user_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            TEXT PRIMARY KEY NOT NULL,
        name          TEXT NOT NULL,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at    TEXT NOT NULL
    )
    "#,
];

/// SQLite-backed store. Cheap to clone (the pool is reference-counted).
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("parse_url", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database.
    ///
    /// Every connection to `sqlite::memory:` is a separate database, so the
    /// pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| map_sqlx_error("parse_url", e))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CommerceStore for SqliteStore {
    async fn all_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("all_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn products_by_category(&self, category: &Category) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query("SELECT * FROM products WHERE category = ?1 ORDER BY id")
            .bind(category.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("products_by_category", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn product_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("product_count", e))?;
        from_db_int("product_count", count)
    }

    async fn put_product(&self, product: &Product) -> Result<(), StoreError> {
        upsert_product(&self.pool, product).await
    }

    #[instrument(skip(self, products), fields(count = products.len()), err)]
    async fn put_products(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        for product in products {
            upsert_product(&mut *tx, product).await?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("orders_by_user", e))?;
        rows.iter().map(order_from_row).collect()
    }

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(to_db_timestamp(user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn read_products(
        &mut self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, StoreError> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query("SELECT * FROM products WHERE id = ?1")
                .bind(id.as_str())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("read_products", e))?;
            if let Some(row) = row {
                out.insert(id.clone(), product_from_row(&row)?);
            }
        }
        Ok(out)
    }

    async fn apply_stock(&mut self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        for update in updates {
            let result = sqlx::query("UPDATE products SET stock = ?1 WHERE id = ?2 AND stock = ?3")
                .bind(i64::from(update.new_stock))
                .bind(update.product_id.as_str())
                .bind(i64::from(update.expected))
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("apply_stock", e))?;
            if result.rows_affected() != 1 {
                return Err(StoreError::Conflict(format!(
                    "stock for {} changed underneath the transaction (expected {})",
                    update.product_id, update.expected
                )));
            }
        }
        Ok(())
    }

    async fn append_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let lines = serde_json::to_string(order.lines())
            .map_err(|e| StoreError::Corrupt(format!("failed to encode order lines: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, lines, total, status, hostel, room, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(order.id().as_str())
        .bind(order.user_id().as_str())
        .bind(lines)
        .bind(to_db_int("total", order.total())?)
        .bind(order.status().as_str())
        .bind(&order.destination().hostel)
        .bind(&order.destination().room)
        .bind(to_db_timestamp(order.created_at()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_order", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

async fn upsert_product<'e, E>(executor: E, product: &Product) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO products (id, name, price, category, stock, description)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            price = excluded.price,
            category = excluded.category,
            stock = excluded.stock,
            description = excluded.description
        "#,
    )
    .bind(product.id().as_str())
    .bind(product.name())
    .bind(to_db_int("price", product.price())?)
    .bind(product.category().as_str())
    .bind(i64::from(product.stock()))
    .bind(product.description())
    .execute(executor)
    .await
    .map_err(|e| map_sqlx_error("put_product", e))?;
    Ok(())
}

fn product_from_row(row: &SqliteRow) -> Result<Product, StoreError> {
    let decode = |e| map_sqlx_error("decode_product", e);
    let id: String = row.try_get("id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let price: i64 = row.try_get("price").map_err(decode)?;
    let category: String = row.try_get("category").map_err(decode)?;
    let stock: i64 = row.try_get("stock").map_err(decode)?;
    let description: Option<String> = row.try_get("description").map_err(decode)?;

    let stock = u32::try_from(stock)
        .map_err(|_| StoreError::Corrupt(format!("product {id} has invalid stock {stock}")))?;
    let product = Product::new(
        ProductId::parse(&id).map_err(corrupt)?,
        name,
        from_db_int("price", price)?,
        Category::new(category).map_err(corrupt)?,
        stock,
    )
    .map_err(corrupt)?;

    Ok(match description {
        Some(d) => product.with_description(d),
        None => product,
    })
}

fn order_from_row(row: &SqliteRow) -> Result<Order, StoreError> {
    let decode = |e| map_sqlx_error("decode_order", e);
    let id: String = row.try_get("id").map_err(decode)?;
    let user_id: String = row.try_get("user_id").map_err(decode)?;
    let lines: String = row.try_get("lines").map_err(decode)?;
    let total: i64 = row.try_get("total").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let hostel: String = row.try_get("hostel").map_err(decode)?;
    let room: String = row.try_get("room").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;

    let lines: Vec<OrderLine> = serde_json::from_str(&lines)
        .map_err(|e| StoreError::Corrupt(format!("order {id} has invalid lines: {e}")))?;
    let status = OrderStatus::from_str(&status).map_err(corrupt)?;

    let order = Order::confirmed(
        OrderId::parse(&id).map_err(corrupt)?,
        UserId::parse(&user_id).map_err(corrupt)?,
        lines,
        Destination::new(hostel, room),
        from_db_int("total", total)?,
        from_db_timestamp(&created_at)?,
    )
    .map_err(corrupt)?;
    Ok(order.with_status(status))
}

fn user_from_row(row: &SqliteRow) -> Result<UserAccount, StoreError> {
    let decode = |e| map_sqlx_error("decode_user", e);
    let id: String = row.try_get("id").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    Ok(UserAccount {
        id: UserId::parse(&id).map_err(corrupt)?,
        name: row.try_get("name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        created_at: from_db_timestamp(&created_at)?,
    })
}

fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn from_db_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{raw}': {e}")))
}

fn to_db_int(field: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Conflict(format!("{field} {value} exceeds storage range")))
}

fn from_db_int(field: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {field} {value}")))
}

fn corrupt(err: campuscart_core::DomainError) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            if db_err.is_unique_violation() {
                StoreError::Conflict(msg)
            } else {
                StoreError::Unavailable(msg)
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("failed to decode row in {operation}: {err}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
