//! Scenario: checkout writes exactly one order with the snapshotted total,
//! and leaves the cart alone whenever validation, upload or write fails.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kadai_config::ImagesConfig;
use kadai_db::{DocumentStore, MemoryStore, OrderFilter};
use kadai_lifecycle::{CheckoutFlow, OrderQueue, OrderStatus};
use kadai_schemas::{GeoPoint, Product};
use kadai_shop::{CartStore, CheckoutError, CheckoutService, CustomerDetails, ImageUpload};
use kadai_storage::{LocalObjectStore, ObjectKey, ObjectStore, StorageError};

struct RefusingStore;

#[async_trait]
impl ObjectStore for RefusingStore {
    async fn put(&self, _: &ObjectKey, _: Vec<u8>, _: &str) -> Result<String, StorageError> {
        Err(StorageError::Rejected("Image upload failed.".into()))
    }

    fn backend_name(&self) -> &'static str {
        "refusing"
    }
}

fn product(id: &str, price: i64) -> Product {
    Product {
        id: id.into(),
        name: format!("Product {id}"),
        description: "Something from the shop".into(),
        price,
        image_url: format!("http://img/{id}.png"),
        created_at: Utc::now(),
    }
}

fn customer(phone: &str) -> CustomerDetails {
    CustomerDetails {
        name: "Asha".into(),
        phone: phone.into(),
        address: "12 Market Rd".into(),
        location: GeoPoint::new(12.97, 77.59),
    }
}

fn screenshot() -> ImageUpload {
    ImageUpload {
        filename: "upi receipt.png".into(),
        content_type: "image/png".into(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

async fn fill_cart(carts: &CartStore, owner: &str) {
    carts
        .update(owner, |c| {
            c.add(&product("a", 100), 2);
            c.add(&product("b", 50), 1);
        })
        .await;
}

async fn order_count(store: &MemoryStore) -> usize {
    store
        .list_orders(&OrderFilter::queue(OrderQueue::All))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn payment_proof_checkout_totals_250_and_clears_cart() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(LocalObjectStore::new(dir.path(), "http://shop/objects"));
    let svc = CheckoutService::new(
        store.clone(),
        objects,
        CheckoutFlow::PaymentProof,
        ImagesConfig::default(),
    );
    let carts = CartStore::new();
    fill_cart(&carts, "u-1").await;

    let order = svc
        .place_order(&carts, "u-1", customer("9000000000"), Some(screenshot()))
        .await
        .unwrap();

    assert_eq!(order.total_price, 250);
    assert_eq!(order.order_items.len(), 2);
    assert_eq!(order.status, OrderStatus::AwaitingPaymentVerification);
    assert_eq!(order.user_id, "u-1");
    let url = order.payment_screenshot_url.as_deref().unwrap();
    assert!(
        url.starts_with("http://shop/objects/payment_screenshots/u-1/"),
        "unexpected url {url}"
    );
    assert!(url.ends_with("_upi_receipt.png"));

    assert!(carts.get("u-1").await.is_empty());
    assert_eq!(order_count(&store).await, 1);
}

#[tokio::test]
async fn direct_checkout_starts_pending_without_upload() {
    let store = Arc::new(MemoryStore::new());
    let svc = CheckoutService::new(
        store.clone(),
        Arc::new(RefusingStore),
        CheckoutFlow::Direct,
        ImagesConfig::default(),
    );
    let carts = CartStore::new();
    fill_cart(&carts, "u-1").await;

    let order = svc
        .place_order(&carts, "u-1", customer("9000000000"), None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment_screenshot_url.is_none());
}

#[tokio::test]
async fn empty_phone_is_rejected_before_any_write() {
    let store = Arc::new(MemoryStore::new());
    let svc = CheckoutService::new(
        store.clone(),
        Arc::new(RefusingStore),
        CheckoutFlow::Direct,
        ImagesConfig::default(),
    );
    let carts = CartStore::new();
    fill_cart(&carts, "u-1").await;

    let err = svc
        .place_order(&carts, "u-1", customer("   "), None)
        .await
        .unwrap_err();
    match err {
        CheckoutError::Invalid(v) => {
            assert!(v.has("phone"));
            assert_eq!(v.fields.len(), 1);
        }
        other => panic!("expected validation error, got {other}"),
    }
    assert_eq!(order_count(&store).await, 0);
    assert_eq!(carts.get("u-1").await.total_items(), 3);
}

#[tokio::test]
async fn upload_failure_keeps_cart_and_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let svc = CheckoutService::new(
        store.clone(),
        Arc::new(RefusingStore),
        CheckoutFlow::PaymentProof,
        ImagesConfig::default(),
    );
    let carts = CartStore::new();
    fill_cart(&carts, "u-1").await;

    let err = svc
        .place_order(&carts, "u-1", customer("9000000000"), Some(screenshot()))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Upload(_)));
    assert_eq!(order_count(&store).await, 0);
    assert_eq!(carts.get("u-1").await.total_price(), 250);
}
