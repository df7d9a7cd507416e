//! Request and response types for the kadai-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use kadai_lifecycle::{AdminAction, Audience, OrderQueue, OrderStatus};
use kadai_schemas::{prices, Order};
use kadai_shop::{Cart, CartItem, FieldError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable: "validation_failed" | "not_found" | "unauthorized" |
    /// "illegal_transition" | "status_conflict" | "upload_failed" | ...
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

// ---------------------------------------------------------------------------
// /v1/health, /v1/session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub store: String,
    pub objects: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub total_items: u32,
    pub total_price: i64,
    pub total_label: String,
}

impl From<&Cart> for CartView {
    fn from(c: &Cart) -> Self {
        let total_price = c.total_price();
        Self {
            items: c.items().to_vec(),
            total_items: c.total_items(),
            total_price,
            total_label: prices::format_minor(total_price),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

// ---------------------------------------------------------------------------
// Checkout / orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub message: String,
}

/// An order as the customer "my orders" list shows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: String,
    pub trackable: bool,
}

impl From<Order> for CustomerOrderView {
    fn from(order: Order) -> Self {
        Self {
            status_label: order.status.label(Audience::Customer).to_string(),
            trackable: kadai_lifecycle::tracking_is_live(order.status),
            order,
        }
    }
}

/// An order as the admin review lists show it, with the buttons it offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: String,
    pub allowed_actions: Vec<AdminAction>,
}

impl From<Order> for AdminOrderView {
    fn from(order: Order) -> Self {
        Self {
            status_label: order.status.label(Audience::Admin).to_string(),
            allowed_actions: kadai_lifecycle::allowed_actions(order.status),
            order,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersQuery {
    #[serde(default)]
    pub queue: Option<String>,
}

impl OrdersQuery {
    pub fn parse_queue(&self) -> Result<OrderQueue, String> {
        match &self.queue {
            Some(q) => q.parse(),
            None => Ok(OrderQueue::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub allowed_actions: Vec<AdminAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyActionRequest {
    pub action: String,
}

// ---------------------------------------------------------------------------
// Delivery relay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAck {
    pub order_id: String,
    pub status: OrderStatus,
    pub lat: f64,
    pub lng: f64,
}

// ---------------------------------------------------------------------------
// Admin session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub id: String,
    pub deleted: bool,
}
