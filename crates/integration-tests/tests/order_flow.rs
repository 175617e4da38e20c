//! Order lifecycle flows: bucket counts and monotonic transitions.

use marketbag_core::{Order, OrderId, OrderStatus, Price};
use marketbag_integration_tests::TestHarness;

fn seeded_order(id: &str, status: OrderStatus) -> Order {
    let (is_paid, is_delivered) = status.flags();
    Order::from_flags(
        OrderId::new(id),
        vec![],
        Price::from_cents(4200),
        is_paid,
        is_delivered,
    )
    .unwrap()
}

#[tokio::test]
async fn bucket_counts_follow_mark_paid() {
    let h = TestHarness::new("u-1");
    h.orders.push_order(seeded_order("1", OrderStatus::New)).await;
    h.orders.push_order(seeded_order("2", OrderStatus::Paid)).await;

    let lifecycle = h.context.orders();
    let book = lifecycle.refresh().await.unwrap();
    assert_eq!(book.count_by_status(OrderStatus::New), 1);
    assert_eq!(book.count_by_status(OrderStatus::Paid), 1);
    assert_eq!(book.count_by_status(OrderStatus::Delivered), 0);

    let book = lifecycle.mark_paid(&OrderId::new("1")).await.unwrap();
    assert_eq!(book.count_by_status(OrderStatus::New), 0);
    assert_eq!(book.count_by_status(OrderStatus::Paid), 2);
    assert_eq!(book.count_by_status(OrderStatus::Delivered), 0);
}

#[tokio::test]
async fn delivery_requires_payment_first() {
    let h = TestHarness::new("u-1");
    h.orders.push_order(seeded_order("1", OrderStatus::New)).await;
    let lifecycle = h.context.orders();
    lifecycle.refresh().await.unwrap();

    let err = lifecycle.mark_delivered(&OrderId::new("1")).await.unwrap_err();
    assert!(err.to_string().contains("cannot go from new to delivered"));
    assert_eq!(h.orders.update_calls(), 0, "rejected before any network call");

    // State is unchanged and the legal path still works.
    assert_eq!(lifecycle.count_by_status(OrderStatus::New), 1);
    lifecycle.mark_paid(&OrderId::new("1")).await.unwrap();
    let book = lifecycle.mark_delivered(&OrderId::new("1")).await.unwrap();
    assert_eq!(book.count_by_status(OrderStatus::Delivered), 1);
}

#[tokio::test]
async fn order_list_survives_offline_via_the_mirror() {
    let h = TestHarness::new("u-1");
    h.orders.push_order(seeded_order("1", OrderStatus::Paid)).await;
    h.context.orders().refresh().await.unwrap();

    // A new session over the same storage, with the backend down.
    let h2 = TestHarness::over_storage("u-1", h.storage);
    h2.orders.set_fail_list(true);

    let cached = h2.context.orders().load_cached().await;
    assert_eq!(cached.count_by_status(OrderStatus::Paid), 1);
    assert!(h2.context.orders().refresh().await.is_err());
    assert_eq!(h2.context.orders().count_by_status(OrderStatus::Paid), 1);
}
