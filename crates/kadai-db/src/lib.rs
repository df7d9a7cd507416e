//! Document store for the two storefront collections.
//!
//! [`DocumentStore`] is the seam every workflow talks to. Two backends:
//! [`MemoryStore`] (tests, dev without a database) and [`PgStore`]
//! (Postgres via sqlx, with LISTEN/NOTIFY feeding the [`ChangeFeed`]).

use anyhow::{Context, Result};
use async_trait::async_trait;
use kadai_lifecycle::{OrderQueue, OrderStatus};
use kadai_schemas::{GeoPoint, NewOrder, NewProduct, Order, Product, ProductPatch};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod error;
mod feed;
mod memory;
mod pg;

pub use error::{RecordKind, StoreError};
pub use feed::{ChangeFeed, OrderSubscription};
pub use memory::MemoryStore;
pub use pg::PgStore;

pub const ENV_DB_URL: &str = "KADAI_DATABASE_URL";

/// NOTIFY channel carrying order ids after every insert/update.
pub const ORDER_CHANNEL: &str = "kadai_orders";

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Which orders a list view wants. Results are always newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Owner equality ("My Orders").
    pub owner: Option<String>,
    pub queue: OrderQueue,
}

impl OrderFilter {
    pub fn queue(queue: OrderQueue) -> Self {
        Self { owner: None, queue }
    }

    pub fn owner(owner: &str) -> Self {
        Self {
            owner: Some(owner.to_string()),
            queue: OrderQueue::All,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.owner.as_deref().map_or(true, |o| o == order.user_id) && self.queue.matches(order.status)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Newest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn get_product(&self, id: &str) -> Result<Product, StoreError>;
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;
    async fn update_product(&self, id: &str, patch: ProductPatch) -> Result<Product, StoreError>;
    /// Removes the record only; referenced objects are untouched.
    async fn delete_product(&self, id: &str) -> Result<(), StoreError>;

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;
    async fn get_order(&self, id: &str) -> Result<Order, StoreError>;
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Single-field status write, applied only if the stored status still
    /// equals `expected`. Otherwise [`StoreError::StatusConflict`].
    async fn update_order_status(
        &self,
        id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError>;

    /// Single-field, last-write-wins overwrite of `delivery_location`.
    async fn set_delivery_location(&self, id: &str, at: GeoPoint) -> Result<Order, StoreError>;

    fn changes(&self) -> &ChangeFeed;

    fn backend_name(&self) -> &'static str;

    fn subscribe(&self, order_id: &str) -> OrderSubscription {
        self.changes().subscribe(order_id)
    }
}

// ---------------------------------------------------------------------------
// Postgres plumbing
// ---------------------------------------------------------------------------

/// Connect to Postgres using KADAI_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
    pub has_products_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (orders, products): (bool, bool) = sqlx::query_as::<_, (bool, bool)>(
        r#"
        select
          exists (select 1 from information_schema.tables
                  where table_schema = 'public' and table_name = 'orders'),
          exists (select 1 from information_schema.tables
                  where table_schema = 'public' and table_name = 'products')
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: orders,
        has_products_table: products,
    })
}
