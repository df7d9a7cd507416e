use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kadai_lifecycle::OrderStatus;
use kadai_schemas::{
    new_record_id, GeoPoint, NewOrder, NewProduct, Order, Product, ProductPatch,
};
use tokio::sync::RwLock;

use crate::{ChangeFeed, DocumentStore, OrderFilter, StoreError};

#[derive(Default)]
struct Collections {
    products: BTreeMap<String, Product>,
    orders: BTreeMap<String, Order>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Collections {
    /// Server timestamp, strictly increasing so newest-first is a total order.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_stamp {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(ts);
        ts
    }
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let g = self.inner.read().await;
        let mut out: Vec<Product> = g.products.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get_product(&self, id: &str) -> Result<Product, StoreError> {
        let g = self.inner.read().await;
        g.products
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::product_not_found(id))
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut g = self.inner.write().await;
        let created = g.stamp();
        let p = Product::from_new(new_record_id(), created, product);
        g.products.insert(p.id.clone(), p.clone());
        Ok(p)
    }

    async fn update_product(&self, id: &str, patch: ProductPatch) -> Result<Product, StoreError> {
        let mut g = self.inner.write().await;
        let p = g
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::product_not_found(id))?;
        p.apply_patch(patch);
        Ok(p.clone())
    }

    async fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        let mut g = self.inner.write().await;
        g.products
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::product_not_found(id))
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let o = {
            let mut g = self.inner.write().await;
            let date = g.stamp();
            let o = Order::from_new(new_record_id(), date, order);
            g.orders.insert(o.id.clone(), o.clone());
            o
        };
        self.feed.publish(o.clone());
        Ok(o)
    }

    async fn get_order(&self, id: &str) -> Result<Order, StoreError> {
        let g = self.inner.read().await;
        g.orders
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::order_not_found(id))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let g = self.inner.read().await;
        let mut out: Vec<Order> = g
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(out)
    }

    async fn update_order_status(
        &self,
        id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let o = {
            let mut g = self.inner.write().await;
            let o = g
                .orders
                .get_mut(id)
                .ok_or_else(|| StoreError::order_not_found(id))?;
            if o.status != expected {
                return Err(StoreError::StatusConflict {
                    expected,
                    actual: o.status,
                });
            }
            o.status = next;
            o.clone()
        };
        self.feed.publish(o.clone());
        Ok(o)
    }

    async fn set_delivery_location(&self, id: &str, at: GeoPoint) -> Result<Order, StoreError> {
        let o = {
            let mut g = self.inner.write().await;
            let o = g
                .orders
                .get_mut(id)
                .ok_or_else(|| StoreError::order_not_found(id))?;
            o.delivery_location = Some(at);
            o.clone()
        };
        self.feed.publish(o.clone());
        Ok(o)
    }

    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stamps_are_strictly_increasing() {
        let mut c = Collections::default();
        let a = c.stamp();
        let b = c.stamp();
        let d = c.stamp();
        assert!(a < b && b < d);
    }

    #[tokio::test]
    async fn delete_missing_product_is_not_found() {
        let s = MemoryStore::new();
        let err = s.delete_product("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
