//! Shared record types for the storefront.
//!
//! Field names serialize in camelCase, matching the stored documents the
//! storefront and admin console read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use kadai_lifecycle::OrderStatus;

pub mod prices;

// ---------------------------------------------------------------------------
// Geo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// `None` when either coordinate is outside the WGS84 range or not finite.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let ok = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        ok.then_some(GeoPoint { lat, lng })
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Minor units.
    pub price: i64,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_url: String,
}

/// Edit payload. `image_url: None` keeps the stored reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_url: Option<String>,
}

impl Product {
    pub fn from_new(id: String, created_at: DateTime<Utc>, p: NewProduct) -> Self {
        Product {
            id,
            name: p.name,
            description: p.description,
            price: p.price,
            image_url: p.image_url,
            created_at,
        }
    }

    pub fn apply_patch(&mut self, patch: ProductPatch) {
        self.name = patch.name;
        self.description = patch.description;
        self.price = patch.price;
        if let Some(url) = patch.image_url {
            self.image_url = url;
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// A line item. `name` and `price` are snapshots taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.price.saturating_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    /// Destination chosen by the customer at checkout.
    pub location: Option<GeoPoint>,
    /// Last position written by the delivery relay.
    pub delivery_location: Option<GeoPoint>,
    pub order_date: DateTime<Utc>,
    pub order_items: Vec<OrderItem>,
    /// Fixed at creation; never recomputed.
    pub total_price: i64,
    pub payment_screenshot_url: Option<String>,
    pub status: OrderStatus,
}

/// Everything checkout supplies; the store assigns `id` and `order_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub location: Option<GeoPoint>,
    pub order_items: Vec<OrderItem>,
    pub total_price: i64,
    pub payment_screenshot_url: Option<String>,
    pub status: OrderStatus,
}

impl Order {
    pub fn from_new(id: String, order_date: DateTime<Utc>, o: NewOrder) -> Self {
        Order {
            id,
            user_id: o.user_id,
            customer_name: o.customer_name,
            customer_phone: o.customer_phone,
            customer_address: o.customer_address,
            location: o.location,
            delivery_location: None,
            order_date,
            order_items: o.order_items,
            total_price: o.total_price,
            payment_screenshot_url: o.payment_screenshot_url,
            status: o.status,
        }
    }

    pub fn item_count(&self) -> u32 {
        self.order_items.iter().map(|i| i.quantity).sum()
    }
}

/// Fresh record id.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::from_new(
            "o-1".into(),
            Utc::now(),
            NewOrder {
                user_id: "u-1".into(),
                customer_name: "Asha".into(),
                customer_phone: "9000000000".into(),
                customer_address: "12 Market Rd".into(),
                location: GeoPoint::new(12.97, 77.59),
                order_items: vec![OrderItem {
                    product_id: "p-1".into(),
                    name: "Rice".into(),
                    price: 5_000,
                    quantity: 2,
                }],
                total_price: 10_000,
                payment_screenshot_url: None,
                status: OrderStatus::Pending,
            },
        )
    }

    #[test]
    fn order_serializes_with_document_field_names() {
        let v = serde_json::to_value(sample_order()).unwrap();
        assert_eq!(v["customerName"], "Asha");
        assert_eq!(v["totalPrice"], 10_000);
        assert_eq!(v["status"], "pending");
        assert_eq!(v["orderItems"][0]["productId"], "p-1");
        assert!(v["deliveryLocation"].is_null());
    }

    #[test]
    fn new_order_starts_without_courier_position() {
        let o = sample_order();
        assert!(o.delivery_location.is_none());
        assert_eq!(o.item_count(), 2);
    }

    #[test]
    fn geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, f64::NAN).is_none());
        assert!(GeoPoint::new(-33.9, 151.2).is_some());
    }

    #[test]
    fn patch_without_image_keeps_reference() {
        let mut p = Product::from_new(
            "p-1".into(),
            Utc::now(),
            NewProduct {
                name: "Rice".into(),
                description: "Sona masoori 5kg".into(),
                price: 50_000,
                image_url: "http://x/products/1_rice.jpg".into(),
            },
        );
        p.apply_patch(ProductPatch {
            name: "Rice XL".into(),
            description: "Sona masoori 10kg".into(),
            price: 95_000,
            image_url: None,
        });
        assert_eq!(p.name, "Rice XL");
        assert_eq!(p.image_url, "http://x/products/1_rice.jpg");
    }
}
