//! Checkout: validate, upload the payment proof, write the order, settle the cart.

use std::sync::Arc;

use chrono::Utc;
use kadai_config::ImagesConfig;
use kadai_db::{DocumentStore, StoreError};
use kadai_lifecycle::CheckoutFlow;
use kadai_schemas::{prices, GeoPoint, NewOrder, Order};
use kadai_storage::{ObjectKey, ObjectStore, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cart::{Cart, CartStore};
use crate::validation::{check_image, require_text, ImageUpload, ValidationErrors};

pub const SUCCESS_MESSAGE: &str = "Thank you for your order. We will be in touch shortly.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub phone: String,
    pub address: String,
    /// Destination picked on the map, if any.
    pub location: Option<GeoPoint>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("payment screenshot upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("order write failed: {0}")]
    Store(#[from] StoreError),

    #[error("A checkout for this cart is already in progress.")]
    InProgress,
}

/// All field checks, run before any upload or write.
pub fn validate_checkout(
    customer: &CustomerDetails,
    cart: &Cart,
    screenshot: Option<&ImageUpload>,
    flow: CheckoutFlow,
    images: &ImagesConfig,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    require_text(&mut errors, "name", &customer.name, "Name is required.");
    require_text(&mut errors, "phone", &customer.phone, "Phone number is required.");
    require_text(&mut errors, "address", &customer.address, "Address is required.");
    if cart.is_empty() {
        errors.push("cart", "Your Cart is Empty");
    }
    if flow.requires_payment_proof() {
        match screenshot {
            Some(img) => check_image(&mut errors, "paymentScreenshot", img, images),
            None => errors.push("paymentScreenshot", "Please upload a payment screenshot."),
        }
    }
    errors.into_result()
}

pub struct CheckoutService {
    store: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    flow: CheckoutFlow,
    images: ImagesConfig,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        flow: CheckoutFlow,
        images: ImagesConfig,
    ) -> Self {
        Self {
            store,
            objects,
            flow,
            images,
        }
    }

    pub fn flow(&self) -> CheckoutFlow {
        self.flow
    }

    /// Field checks against the owner's current cart, without placing anything.
    pub async fn validate(
        &self,
        carts: &CartStore,
        owner: &str,
        customer: &CustomerDetails,
        screenshot: Option<&ImageUpload>,
    ) -> Result<(), ValidationErrors> {
        let cart = carts.get(owner).await;
        validate_checkout(customer, &cart, screenshot, self.flow, &self.images)
    }

    /// Places an order from the owner's current cart.
    ///
    /// Only the ordered lines leave the cart, and only after the order record
    /// is written; anything added meanwhile stays. Any failure leaves the cart
    /// as it was so the customer can retry. A second checkout for the same
    /// owner while one is running gets [`CheckoutError::InProgress`].
    pub async fn place_order(
        &self,
        carts: &CartStore,
        owner: &str,
        customer: CustomerDetails,
        screenshot: Option<ImageUpload>,
    ) -> Result<Order, CheckoutError> {
        let _guard = carts.begin_checkout(owner).ok_or_else(|| {
            warn!(owner = %owner, "checkout already in progress");
            CheckoutError::InProgress
        })?;
        let cart = carts.get(owner).await;
        validate_checkout(&customer, &cart, screenshot.as_ref(), self.flow, &self.images)?;

        // Direct flow ignores a stray screenshot.
        let payment_screenshot_url = match (self.flow.requires_payment_proof(), screenshot) {
            (true, Some(img)) => {
                let key = ObjectKey::payment_screenshot(
                    owner,
                    Utc::now().timestamp_millis(),
                    &img.filename,
                );
                let url = self
                    .objects
                    .put(&key, img.bytes, &img.content_type)
                    .await
                    .map_err(|e| {
                        warn!(owner = %owner, key = %key, error = %e, "payment screenshot upload failed");
                        e
                    })?;
                Some(url)
            }
            _ => None,
        };

        let order_items = cart.to_order_items();
        let new_order = NewOrder {
            user_id: owner.to_string(),
            customer_name: customer.name.trim().to_string(),
            customer_phone: customer.phone.trim().to_string(),
            customer_address: customer.address.trim().to_string(),
            location: customer.location,
            total_price: prices::order_total(&order_items),
            order_items,
            payment_screenshot_url,
            status: self.flow.initial_status(),
        };

        let order = self.store.insert_order(new_order).await?;
        let left = carts.settle(owner, &order.order_items).await;

        info!(
            order_id = %order.id,
            owner = %owner,
            status = %order.status,
            total = order.total_price,
            items = order.item_count(),
            cart_left = left.total_items(),
            "order placed"
        );
        Ok(order)
    }
}
