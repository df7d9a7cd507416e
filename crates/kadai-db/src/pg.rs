use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kadai_lifecycle::OrderStatus;
use kadai_schemas::{
    new_record_id, GeoPoint, NewOrder, NewProduct, Order, OrderItem, Product, ProductPatch,
};
use sqlx::postgres::{PgListener, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tokio::task::JoinHandle;

use crate::{ChangeFeed, DocumentStore, OrderFilter, StoreError, ORDER_CHANNEL};

const PRODUCT_COLUMNS: &str = "id, name, description, price, image_url, created_at";

const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_phone, customer_address, \
     location, delivery_location, order_date, order_items, total_price, \
     payment_screenshot_url, status";

const LISTENER_RETRY: Duration = Duration::from_secs(2);

/// Postgres-backed store.
///
/// Writes never publish directly: the `orders_notify_change` trigger emits a
/// NOTIFY and the listener task re-reads the row, so writes from other
/// processes (the CLI) reach subscribers the same way.
pub struct PgStore {
    pool: PgPool,
    feed: ChangeFeed,
    listener: JoinHandle<()>,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = crate::connect(url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Must be called inside a Tokio runtime; spawns the NOTIFY listener.
    pub fn from_pool(pool: PgPool) -> Self {
        let feed = ChangeFeed::default();
        let listener = tokio::spawn(run_listener(pool.clone(), feed.clone()));
        Self {
            pool,
            feed,
            listener,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_order(&self, id: &str) -> Result<Option<Order>> {
        fetch_order(&self.pool, id).await
    }
}

impl Drop for PgStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn product_from_row(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        customer_address: row.try_get("customer_address")?,
        location: row
            .try_get::<Option<Json<GeoPoint>>, _>("location")?
            .map(|j| j.0),
        delivery_location: row
            .try_get::<Option<Json<GeoPoint>>, _>("delivery_location")?
            .map(|j| j.0),
        order_date: row.try_get("order_date")?,
        order_items: row.try_get::<Json<Vec<OrderItem>>, _>("order_items")?.0,
        total_price: row.try_get("total_price")?,
        payment_screenshot_url: row.try_get("payment_screenshot_url")?,
        status: status.parse::<OrderStatus>()?,
    })
}

async fn fetch_order(pool: &PgPool, id: &str) -> Result<Option<Order>> {
    let row = sqlx::query(&format!("select {ORDER_COLUMNS} from orders where id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("fetch_order failed")?;
    row.as_ref().map(order_from_row).transpose()
}

// ---------------------------------------------------------------------------
// NOTIFY listener
// ---------------------------------------------------------------------------

async fn run_listener(pool: PgPool, feed: ChangeFeed) {
    loop {
        if let Err(e) = listen(&pool, &feed).await {
            tracing::warn!(error = %format!("{e:#}"), "order change listener failed; retrying");
        }
        tokio::time::sleep(LISTENER_RETRY).await;
    }
}

async fn listen(pool: &PgPool, feed: &ChangeFeed) -> Result<()> {
    let mut listener = PgListener::connect_with(pool)
        .await
        .context("listener connect failed")?;
    listener
        .listen(ORDER_CHANNEL)
        .await
        .with_context(|| format!("LISTEN {ORDER_CHANNEL} failed"))?;

    loop {
        let note = listener.recv().await.context("listener recv failed")?;
        match fetch_order(pool, note.payload()).await {
            Ok(Some(order)) => feed.publish(order),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(order_id = note.payload(), error = %format!("{e:#}"), "re-read after notify failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "select {PRODUCT_COLUMNS} from products order by created_at desc, id desc"
        ))
        .fetch_all(&self.pool)
        .await
        .context("list_products failed")?;
        Ok(rows.iter().map(product_from_row).collect::<Result<_>>()?)
    }

    async fn get_product(&self, id: &str) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            "select {PRODUCT_COLUMNS} from products where id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("get_product failed")?;
        match row {
            Some(r) => Ok(product_from_row(&r)?),
            None => Err(StoreError::product_not_found(id)),
        }
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            insert into products (id, name, description, price, image_url)
            values ($1, $2, $3, $4, $5)
            returning {PRODUCT_COLUMNS}
            "#
        ))
        .bind(new_record_id())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image_url)
        .fetch_one(&self.pool)
        .await
        .context("insert_product failed")?;
        Ok(product_from_row(&row)?)
    }

    async fn update_product(&self, id: &str, patch: ProductPatch) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            update products
            set name = $2,
                description = $3,
                price = $4,
                image_url = coalesce($5, image_url)
            where id = $1
            returning {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.price)
        .bind(&patch.image_url)
        .fetch_optional(&self.pool)
        .await
        .context("update_product failed")?;
        match row {
            Some(r) => Ok(product_from_row(&r)?),
            None => Err(StoreError::product_not_found(id)),
        }
    }

    async fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        let res = sqlx::query("delete from products where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete_product failed")?;
        if res.rows_affected() == 0 {
            return Err(StoreError::product_not_found(id));
        }
        Ok(())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            insert into orders (
              id, user_id, customer_name, customer_phone, customer_address,
              location, order_items, total_price, payment_screenshot_url, status
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            )
            returning {ORDER_COLUMNS}
            "#
        ))
        .bind(new_record_id())
        .bind(&order.user_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_address)
        .bind(order.location.map(Json))
        .bind(Json(&order.order_items))
        .bind(order.total_price)
        .bind(&order.payment_screenshot_url)
        .bind(order.status.as_str())
        .fetch_one(&self.pool)
        .await
        .context("insert_order failed")?;
        Ok(order_from_row(&row)?)
    }

    async fn get_order(&self, id: &str) -> Result<Order, StoreError> {
        self.fetch_order(id)
            .await?
            .ok_or_else(|| StoreError::order_not_found(id))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let statuses: Vec<String> = filter
            .queue
            .statuses()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let rows = sqlx::query(&format!(
            r#"
            select {ORDER_COLUMNS}
            from orders
            where ($1::text is null or user_id = $1)
              and status = any($2)
            order by order_date desc, id desc
            "#
        ))
        .bind(&filter.owner)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .context("list_orders failed")?;
        Ok(rows.iter().map(order_from_row).collect::<Result<_>>()?)
    }

    async fn update_order_status(
        &self,
        id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            update orders
            set status = $3
            where id = $1 and status = $2
            returning {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("update_order_status failed")?;

        if let Some(r) = row {
            return Ok(order_from_row(&r)?);
        }
        match self.fetch_order(id).await? {
            None => Err(StoreError::order_not_found(id)),
            Some(current) => Err(StoreError::StatusConflict {
                expected,
                actual: current.status,
            }),
        }
    }

    async fn set_delivery_location(&self, id: &str, at: GeoPoint) -> Result<Order, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            update orders
            set delivery_location = $2
            where id = $1
            returning {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(at))
        .fetch_optional(&self.pool)
        .await
        .context("set_delivery_location failed")?;
        match row {
            Some(r) => Ok(order_from_row(&r)?),
            None => Err(StoreError::order_not_found(id)),
        }
    }

    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
