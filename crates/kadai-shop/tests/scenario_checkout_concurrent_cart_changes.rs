//! Scenario: the cart keeps changing while a checkout is uploading. Only the
//! ordered lines leave the cart, and a second submit is turned away.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use kadai_config::ImagesConfig;
use kadai_db::{DocumentStore, MemoryStore, OrderFilter};
use kadai_lifecycle::{CheckoutFlow, OrderQueue};
use kadai_schemas::Product;
use kadai_shop::{CartStore, CheckoutError, CheckoutService, CustomerDetails, ImageUpload};
use kadai_storage::{ObjectKey, ObjectStore, StorageError};

/// Accepts every upload after a fixed delay.
struct SlowStore(Duration);

#[async_trait]
impl ObjectStore for SlowStore {
    async fn put(&self, key: &ObjectKey, _: Vec<u8>, _: &str) -> Result<String, StorageError> {
        tokio::time::sleep(self.0).await;
        Ok(format!("http://slow/{key}"))
    }

    fn backend_name(&self) -> &'static str {
        "slow"
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

fn customer() -> CustomerDetails {
    CustomerDetails {
        name: "Asha".into(),
        phone: "9000000000".into(),
        address: "12 Market Rd".into(),
        location: None,
    }
}

fn screenshot() -> ImageUpload {
    ImageUpload {
        filename: "pay.png".into(),
        content_type: "image/png".into(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

fn slow_service(store: Arc<MemoryStore>) -> CheckoutService {
    CheckoutService::new(
        store,
        Arc::new(SlowStore(Duration::from_millis(200))),
        CheckoutFlow::PaymentProof,
        ImagesConfig::default(),
    )
}

async fn order_count(store: &MemoryStore) -> usize {
    store
        .list_orders(&OrderFilter::queue(OrderQueue::All))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn item_added_during_upload_stays_in_cart() {
    let store = Arc::new(MemoryStore::new());
    let svc = slow_service(store.clone());
    let carts = CartStore::new();
    carts.update("u-1", |c| c.add(&product("a", 100), 1)).await;

    let shopping = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        carts.update("u-1", |c| c.add(&product("b", 50), 1)).await;
    };
    let (placed, _) = tokio::join!(
        svc.place_order(&carts, "u-1", customer(), Some(screenshot())),
        shopping
    );
    let order = placed.unwrap();

    let ordered: Vec<_> = order.order_items.iter().map(|i| i.product_id.as_str()).collect();
    assert_eq!(ordered, ["a"]);
    assert_eq!(order.total_price, 100);

    let left = carts.get("u-1").await;
    assert_eq!(left.items().len(), 1);
    assert_eq!(left.items()[0].product_id, "b");
}

#[tokio::test]
async fn extra_quantity_added_during_upload_stays_in_cart() {
    let store = Arc::new(MemoryStore::new());
    let svc = slow_service(store.clone());
    let carts = CartStore::new();
    carts.update("u-1", |c| c.add(&product("a", 100), 2)).await;

    let shopping = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        carts.update("u-1", |c| c.add(&product("a", 100), 1)).await;
    };
    let (placed, _) = tokio::join!(
        svc.place_order(&carts, "u-1", customer(), Some(screenshot())),
        shopping
    );
    assert_eq!(placed.unwrap().item_count(), 2);

    let left = carts.get("u-1").await;
    assert_eq!(left.total_items(), 1);
}

#[tokio::test]
async fn double_submit_places_one_order() {
    let store = Arc::new(MemoryStore::new());
    let svc = slow_service(store.clone());
    let carts = CartStore::new();
    carts.update("u-1", |c| c.add(&product("a", 100), 1)).await;

    let (first, second) = tokio::join!(
        svc.place_order(&carts, "u-1", customer(), Some(screenshot())),
        svc.place_order(&carts, "u-1", customer(), Some(screenshot()))
    );

    let (ok, rejected) = match (first, second) {
        (Ok(o), Err(e)) | (Err(e), Ok(o)) => (o, e),
        (a, b) => panic!("expected one order and one rejection, got {a:?} / {b:?}"),
    };
    assert!(matches!(rejected, CheckoutError::InProgress));
    assert_eq!(ok.total_price, 100);
    assert_eq!(order_count(&store).await, 1);
    assert!(carts.get("u-1").await.is_empty());

    // Once the first checkout is done the owner can check out again.
    carts.update("u-1", |c| c.add(&product("a", 100), 1)).await;
    svc.place_order(&carts, "u-1", customer(), Some(screenshot()))
        .await
        .unwrap();
    assert_eq!(order_count(&store).await, 2);
}

#[tokio::test]
async fn checkouts_for_different_owners_run_side_by_side() {
    let store = Arc::new(MemoryStore::new());
    let svc = slow_service(store.clone());
    let carts = CartStore::new();
    carts.update("u-1", |c| c.add(&product("a", 100), 1)).await;
    carts.update("u-2", |c| c.add(&product("b", 50), 1)).await;

    let (one, two) = tokio::join!(
        svc.place_order(&carts, "u-1", customer(), Some(screenshot())),
        svc.place_order(&carts, "u-2", customer(), Some(screenshot()))
    );
    one.unwrap();
    two.unwrap();
    assert_eq!(order_count(&store).await, 2);
}
