//! The offline order flow end to end: connectivity drops, an order is
//! queued locally, connectivity returns, the application layer flushes the
//! queue and marks each order synchronized.

#![allow(clippy::unwrap_used)]

use pomelo_offline_store::{
    Collection, ConnectivityCallbacks, ConnectivityMonitor, OfflineStore,
};
use serde_json::json;

#[tokio::test]
async fn test_order_queued_offline_is_flushed_after_reconnect() {
    let store = OfflineStore::in_memory().await.unwrap();
    let monitor = ConnectivityMonitor::new(true);

    // The application layer wires the relay to a channel; the relay itself
    // never touches the store.
    let (online_tx, mut online_rx) = tokio::sync::mpsc::unbounded_channel();
    let _sub = monitor.subscribe(ConnectivityCallbacks::new().on_online(move || {
        let _ = online_tx.send(());
    }));

    // Connectivity drops; an order placed now is queued locally.
    monitor.set_online(false);
    assert!(!monitor.is_online());
    let order_id = store
        .append_pending_order(&json!({"items": [{"id": "p-1", "qty": 1}], "total": 39.90}))
        .await
        .unwrap();

    // Connectivity returns; the subscriber is notified.
    monitor.set_online(true);
    online_rx.recv().await.unwrap();

    // The application layer flushes the unsynchronized set.
    let pending = store.orders_by_status(false).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, order_id);

    for order in pending {
        // (submission to the backend happens here)
        store.mark_synchronized(order.id).await.unwrap();
    }

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert!(order.synchronized);
    assert!(order.synchronized_at.is_some());
    assert!(store.orders_by_status(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_synced_online_is_readable_offline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offline.db");

    let catalog = vec![
        json!({"id": "p-1", "name": "Solar charger", "category": "gadgets"}),
        json!({"id": "p-2", "name": "Desk lamp", "category": "home"}),
    ];

    // Online session: the backend sync bulk-replaces the catalog.
    {
        let store = OfflineStore::open(&path).await.unwrap();
        store.replace_all(Collection::Catalog, &catalog).await.unwrap();
        store
            .replace_all(Collection::Cart, &[json!({"id": "p-2", "qty": 1})])
            .await
            .unwrap();
    }

    // Offline session after a reload: everything is still there.
    let store = OfflineStore::open(&path).await.unwrap();
    let monitor = ConnectivityMonitor::new(false);
    assert!(!monitor.is_online());

    assert_eq!(store.get_all(Collection::Catalog).await.unwrap(), catalog);
    assert_eq!(store.get_all(Collection::Cart).await.unwrap().len(), 1);
}
