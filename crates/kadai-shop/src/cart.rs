//! Session-local shopping cart.
//!
//! A cart holds product snapshots taken when the item was added; later catalog
//! edits do not reprice what is already in the cart. Carts have no persistent
//! identity; a successful checkout takes out exactly the lines it ordered.

use std::collections::{HashMap, HashSet};

use kadai_schemas::{prices, OrderItem, Product};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    /// Minor units, as snapshotted from the product.
    pub price: i64,
    pub image_url: String,
    pub quantity: u32,
}

impl CartItem {
    fn from_product(p: &Product, quantity: u32) -> Self {
        Self {
            product_id: p.id.clone(),
            name: p.name.clone(),
            price: p.price,
            image_url: p.image_url.clone(),
            quantity,
        }
    }

    fn to_order_item(&self) -> OrderItem {
        OrderItem {
            product_id: self.product_id.clone(),
            name: self.name.clone(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds `quantity` of `product`; an existing line is topped up instead of
    /// duplicated. Zero is a no-op.
    pub fn add(&mut self, product: &Product, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.items.iter_mut().find(|i| i.product_id == product.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.items.push(CartItem::from_product(product, quantity)),
        }
    }

    /// Sets the quantity of a line; zero removes it. Returns `false` when the
    /// product is not in the cart.
    pub fn update_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total_items(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    pub fn total_price(&self) -> i64 {
        prices::order_total(&self.to_order_items())
    }

    /// Takes what an order bought out of the cart. Lines or quantities added
    /// after the order was snapshotted stay.
    pub fn remove_ordered(&mut self, ordered: &[OrderItem]) {
        for bought in ordered {
            if let Some(line) = self
                .items
                .iter_mut()
                .find(|i| i.product_id == bought.product_id)
            {
                line.quantity = line.quantity.saturating_sub(bought.quantity);
            }
        }
        self.items.retain(|i| i.quantity > 0);
    }

    /// Line items for an order, in cart order.
    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.items.iter().map(CartItem::to_order_item).collect()
    }
}

// ---------------------------------------------------------------------------
// CartStore
// ---------------------------------------------------------------------------

/// Carts keyed by customer id, held in process memory.
#[derive(Debug, Default)]
pub struct CartStore {
    carts: Mutex<HashMap<String, Cart>>,
    /// Owners with a checkout in flight.
    checkouts: std::sync::Mutex<HashSet<String>>,
}

/// Marks an owner's checkout as in flight until dropped.
#[derive(Debug)]
pub struct CheckoutGuard<'a> {
    store: &'a CartStore,
    owner: String,
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        self.store.checkouts_in_flight().remove(&self.owner);
    }
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the owner's cart (empty when none exists yet).
    pub async fn get(&self, owner: &str) -> Cart {
        self.carts
            .lock()
            .await
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Run `f` against the owner's cart under the lock and return the cart
    /// as it stands afterwards together with `f`'s result.
    pub async fn update<R>(&self, owner: &str, f: impl FnOnce(&mut Cart) -> R) -> (Cart, R) {
        let mut carts = self.carts.lock().await;
        let cart = carts.entry(owner.to_string()).or_default();
        let out = f(cart);
        let snapshot = cart.clone();
        if cart.is_empty() {
            carts.remove(owner);
        }
        (snapshot, out)
    }

    pub async fn clear(&self, owner: &str) {
        self.carts.lock().await.remove(owner);
    }

    /// `None` while another checkout for `owner` is still running.
    pub fn begin_checkout(&self, owner: &str) -> Option<CheckoutGuard<'_>> {
        if !self.checkouts_in_flight().insert(owner.to_string()) {
            return None;
        }
        Some(CheckoutGuard {
            store: self,
            owner: owner.to_string(),
        })
    }

    /// Removes the ordered lines from the owner's current cart, keeping
    /// anything added while the order was being placed.
    pub async fn settle(&self, owner: &str, ordered: &[OrderItem]) -> Cart {
        self.update(owner, |c| c.remove_ordered(ordered)).await.0
    }

    fn checkouts_in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        match self.checkouts.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.into(),
            name: format!("item {id}"),
            description: "a description".into(),
            price,
            image_url: format!("http://img/{id}.png"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn add_tops_up_existing_line() {
        let mut c = Cart::new();
        c.add(&product("a", 100), 1);
        c.add(&product("a", 100), 2);
        assert_eq!(c.items().len(), 1);
        assert_eq!(c.total_items(), 3);
    }

    #[test]
    fn totals_follow_quantities() {
        let mut c = Cart::new();
        c.add(&product("a", 100), 2);
        c.add(&product("b", 50), 1);
        assert_eq!(c.total_price(), 250);
        assert_eq!(c.total_items(), 3);

        assert!(c.update_quantity("b", 3));
        assert_eq!(c.total_price(), 350);

        assert!(c.update_quantity("a", 0));
        assert_eq!(c.items().len(), 1);
        assert!(!c.update_quantity("a", 1));
    }

    #[test]
    fn snapshot_price_survives_catalog_edit() {
        let mut c = Cart::new();
        let mut p = product("a", 100);
        c.add(&p, 1);
        p.price = 999;
        c.add(&p, 1);
        assert_eq!(c.total_price(), 200);
    }

    #[tokio::test]
    async fn store_keeps_carts_per_owner() {
        let store = CartStore::new();
        store.update("u1", |c| c.add(&product("a", 10), 1)).await;
        store.update("u2", |c| c.add(&product("b", 20), 2)).await;
        assert_eq!(store.get("u1").await.total_price(), 10);
        assert_eq!(store.get("u2").await.total_price(), 40);

        store.clear("u1").await;
        assert!(store.get("u1").await.is_empty());
        assert!(!store.get("u2").await.is_empty());
    }

    #[test]
    fn remove_ordered_keeps_later_additions() {
        let mut c = Cart::new();
        c.add(&product("a", 100), 2);
        let ordered = c.to_order_items();
        c.add(&product("a", 100), 1);
        c.add(&product("b", 50), 1);

        c.remove_ordered(&ordered);
        assert_eq!(c.items().len(), 2);
        assert_eq!(c.items()[0].product_id, "a");
        assert_eq!(c.items()[0].quantity, 1);
        assert_eq!(c.items()[1].product_id, "b");
    }

    #[tokio::test]
    async fn one_checkout_per_owner_at_a_time() {
        let store = CartStore::new();
        let guard = store.begin_checkout("u-1").unwrap();
        assert!(store.begin_checkout("u-1").is_none());
        assert!(store.begin_checkout("u-2").is_some());
        drop(guard);
        assert!(store.begin_checkout("u-1").is_some());
    }
}
