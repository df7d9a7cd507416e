//! Scenario: the three order views read the same records, newest first,
//! and status writes are compare-and-swap.

use kadai_db::{DocumentStore, MemoryStore, OrderFilter, StoreError};
use kadai_lifecycle::{OrderQueue, OrderStatus};
use kadai_schemas::{GeoPoint, NewOrder, OrderItem};

fn new_order(owner: &str, status: OrderStatus) -> NewOrder {
    let items = vec![OrderItem {
        product_id: "p-1".into(),
        name: "Rice".into(),
        price: 100,
        quantity: 2,
    }];
    NewOrder {
        user_id: owner.into(),
        customer_name: "Asha".into(),
        customer_phone: "9000000000".into(),
        customer_address: "12 Market Rd".into(),
        location: GeoPoint::new(12.97, 77.59),
        total_price: kadai_schemas::prices::order_total(&items),
        order_items: items,
        payment_screenshot_url: None,
        status,
    }
}

#[tokio::test]
async fn views_partition_and_sort_newest_first() {
    let store = MemoryStore::new();
    let a = store
        .insert_order(new_order("u-1", OrderStatus::AwaitingPaymentVerification))
        .await
        .unwrap();
    let b = store.insert_order(new_order("u-2", OrderStatus::Pending)).await.unwrap();
    let c = store.insert_order(new_order("u-1", OrderStatus::Pending)).await.unwrap();

    let payments = store
        .list_orders(&OrderFilter::queue(OrderQueue::Payments))
        .await
        .unwrap();
    assert_eq!(payments.iter().map(|o| &o.id).collect::<Vec<_>>(), vec![&a.id]);

    let fulfillment = store
        .list_orders(&OrderFilter::queue(OrderQueue::Fulfillment))
        .await
        .unwrap();
    assert_eq!(
        fulfillment.iter().map(|o| &o.id).collect::<Vec<_>>(),
        vec![&c.id, &b.id]
    );

    let mine = store.list_orders(&OrderFilter::owner("u-1")).await.unwrap();
    assert_eq!(mine.iter().map(|o| &o.id).collect::<Vec<_>>(), vec![&c.id, &a.id]);
}

#[tokio::test]
async fn stale_expected_status_is_a_conflict_not_a_skip() {
    let store = MemoryStore::new();
    let o = store.insert_order(new_order("u-1", OrderStatus::Pending)).await.unwrap();

    store
        .update_order_status(&o.id, OrderStatus::Pending, OrderStatus::Approved)
        .await
        .unwrap();

    // A second admin still looking at "pending" tries to reject.
    let err = store
        .update_order_status(&o.id, OrderStatus::Pending, OrderStatus::Rejected)
        .await
        .unwrap_err();
    match err {
        StoreError::StatusConflict { expected, actual } => {
            assert_eq!(expected, OrderStatus::Pending);
            assert_eq!(actual, OrderStatus::Approved);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(store.get_order(&o.id).await.unwrap().status, OrderStatus::Approved);
}

#[tokio::test]
async fn location_write_touches_only_delivery_location() {
    let store = MemoryStore::new();
    let o = store.insert_order(new_order("u-1", OrderStatus::Approved)).await.unwrap();
    let mut sub = store.subscribe(&o.id);

    let at = GeoPoint::new(12.98, 77.60).unwrap();
    store.set_delivery_location(&o.id, at).await.unwrap();

    let seen = sub.next().await.unwrap();
    assert_eq!(seen.delivery_location, Some(at));
    assert_eq!(seen.status, OrderStatus::Approved);
    assert_eq!(seen.location, o.location);
    assert_eq!(seen.total_price, 200);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let store = MemoryStore::new();
    let err = store.get_order("missing").await.unwrap_err();
    assert!(err.is_not_found());
    let err = store
        .set_delivery_location("missing", GeoPoint::new(0.0, 0.0).unwrap())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
