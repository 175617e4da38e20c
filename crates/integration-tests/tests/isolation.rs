//! Per-user partitioning and sign-out behavior.

use std::sync::Arc;

use marketbag_client::storage::{KeyValueStore, StorageKey};
use marketbag_core::{ProductId, UserId};
use marketbag_integration_tests::TestHarness;

#[tokio::test]
async fn carts_are_partitioned_per_user() {
    let h_a = TestHarness::new("alice");
    h_a.context.cart().add(&ProductId::new("p1"), 2).await.unwrap();
    h_a.context.sign_out().await.unwrap();

    // A different user over the same device storage sees an empty cart.
    let h_b = TestHarness::over_storage("bob", Arc::clone(&h_a.storage));
    let snapshot = h_b
        .context
        .cart()
        .load_cart()
        .await
        .unwrap()
        .expect("not superseded");
    assert!(snapshot.is_empty());

    // Alice's durable cart is untouched and restored on her next sign-in.
    let h_a2 = TestHarness::over_storage("alice", h_b.storage);
    let snapshot = h_a2
        .context
        .cart()
        .load_cart()
        .await
        .unwrap()
        .expect("not superseded");
    assert_eq!(snapshot.total_items(), 2);
}

#[tokio::test]
async fn sign_out_clears_the_reactive_store_and_session_keys() {
    let h = TestHarness::new("u-1");
    marketbag_client::session::save(h.storage.as_ref(), h.context.session())
        .await
        .unwrap();

    let store = h.context.cart().store().clone();
    h.context.cart().add(&ProductId::new("p1"), 1).await.unwrap();
    assert_eq!(store.snapshot().total_items(), 1);

    let storage = Arc::clone(&h.storage);
    h.context.sign_out().await.unwrap();

    assert!(store.snapshot().is_empty());
    assert!(storage.get(&StorageKey::User).await.unwrap().is_none());
    assert!(storage.get(&StorageKey::Token).await.unwrap().is_none());
    assert!(
        storage
            .get(&StorageKey::Cart(UserId::new("u-1")))
            .await
            .unwrap()
            .is_some(),
        "durable cart is kept for the next sign-in"
    );
}
