//! Order submission through the scheduler

use std::sync::Arc;
use std::time::Duration;

use order_dashboard::{
    DashboardStats, NotificationLevel, OrderLedger, OrderRequest, OrderStatus, SchedulerHandle,
};
use pretty_assertions::assert_eq;
use tokio_test::assert_ok;
use wiremock::MockServer;

use crate::helpers::*;

#[tokio::test]
async fn test_successful_order_lands_at_ledger_head_and_refreshes_stats() {
    let server = healthy_stack().await;
    let sink = Arc::new(RecordingSink::default());
    let handle = SchedulerHandle::spawn(&test_config(&server.uri()), sink.clone()).unwrap();

    // startup tick fetches the stats once
    assert!(wait_for_requests(&server, STATS_PATH, 1, Duration::from_secs(2)).await);
    let before = requests_to(&server, STATS_PATH).await;

    let request = OrderRequest::new("ORD123", "Laptop", 999.99).unwrap();
    let record = handle.submit_order(request).await.unwrap();

    assert_eq!(record.order_id, "ORD123");
    assert_eq!(record.product, "Laptop");
    assert_eq!(record.price, 999.99);
    assert_eq!(record.status, OrderStatus::Success);

    let head = handle.recent_orders().await.unwrap().remove(0);
    assert_eq!(head, record);

    // debounce is 200ms
    assert!(
        wait_for_requests(&server, STATS_PATH, before + 1, Duration::from_secs(2)).await,
        "a stats refresh should follow a successful order"
    );

    let notifications = sink.notifications();
    assert_eq!(notifications[0].level, NotificationLevel::Success);
    assert!(notifications[0].message.contains("ORD123"));

    assert_ok!(handle.shutdown().await);
}

#[tokio::test]
async fn test_failed_order_is_recorded_with_error_status() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    mount_consumer_stats(&server, consumer_stats_json(0, 0.0, 0.0, 0)).await;
    mount_orders(&server, 500).await;

    let sink = Arc::new(RecordingSink::default());
    let handle = SchedulerHandle::spawn(&test_config(&server.uri()), sink.clone()).unwrap();
    assert!(wait_for_requests(&server, STATS_PATH, 1, Duration::from_secs(2)).await);

    let request = OrderRequest::new("ORD500", "Monitor", 149.0).unwrap();
    let record = handle.submit_order(request).await.unwrap();

    assert_eq!(record.status, OrderStatus::Error);
    assert_eq!(record.error.as_deref(), Some("unexpected status code: 500"));

    let notifications = sink.notifications();
    let failure = notifications
        .iter()
        .find(|n| n.level == NotificationLevel::Error)
        .expect("an error notification");
    assert!(failure.message.contains("ORD500"));
    assert!(failure.message.contains("500"));

    // no debounced refresh after a failure
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(requests_to(&server, STATS_PATH).await, 1);

    let export = handle.export().await.unwrap();
    assert_eq!(export.orders.len(), 1);
    assert_eq!(export.orders[0].status, OrderStatus::Error);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_display_view_keeps_twenty_most_recent() {
    let server = healthy_stack().await;
    let handle = SchedulerHandle::spawn(
        &test_config(&server.uri()),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    for i in 0..25 {
        let request = OrderRequest::new(format!("ORD{i}"), "Mouse", 10.0 + i as f64).unwrap();
        handle.submit_order(request).await.unwrap();
    }

    let view = handle.recent_orders().await.unwrap();
    let expected: Vec<String> = (5..25).rev().map(|i| format!("ORD{i}")).collect();
    assert_eq!(
        view.iter().map(|o| o.order_id.clone()).collect::<Vec<_>>(),
        expected
    );

    let export = handle.export().await.unwrap();
    assert_eq!(export.orders.len(), 25);
    assert_eq!(export.orders[0].order_id, "ORD24");
    assert_eq!(export.orders[24].order_id, "ORD0");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batch_records_every_order() {
    let server = healthy_stack().await;
    let sink = Arc::new(RecordingSink::default());
    let handle = SchedulerHandle::spawn(&test_config(&server.uri()), sink.clone()).unwrap();

    let summary = handle.submit_batch(3).await.unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(requests_to(&server, ORDERS_PATH).await, 3);

    let view = handle.recent_orders().await.unwrap();
    assert_eq!(view.len(), 3);
    assert!(view.iter().all(|o| o.order_id.starts_with("BATCH")));
    assert!(view[0].order_id.ends_with("-2"));

    let notifications = sink.notifications();
    assert!(notifications.iter().any(|n| n.title == "Batch Complete"));
    // batch orders are not notified one by one
    assert!(!notifications.iter().any(|n| n.title == "Order Created Successfully!"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_clear_resets_ledger_and_stats() {
    let server = healthy_stack().await;
    let handle = SchedulerHandle::spawn(
        &test_config(&server.uri()),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    let mut stats_rx = handle.subscribe_stats();
    tokio::time::timeout(Duration::from_secs(2), stats_rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.latest_stats().orders_processed, 4);

    handle
        .submit_order(OrderRequest::new("ORD1", "Speaker", 59.0).unwrap())
        .await
        .unwrap();

    // let the debounced refresh land so nothing repopulates the view later
    assert!(wait_for_requests(&server, STATS_PATH, 2, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.clear().await.unwrap();

    assert!(handle.recent_orders().await.unwrap().is_empty());
    let export = handle.export().await.unwrap();
    assert!(export.orders.is_empty());
    assert_eq!(export.stats, DashboardStats::default());
    assert_eq!(handle.latest_stats(), DashboardStats::default());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_to_file() {
    let server = healthy_stack().await;
    let handle = SchedulerHandle::spawn(
        &test_config(&server.uri()),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    handle
        .submit_order(OrderRequest::new("ORD9", "Router", 89.9).unwrap())
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let snapshot = handle.export().await.unwrap();
    let path = snapshot.write_to_dir(dir.path()).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["orders"][0]["orderId"], "ORD9");
    assert!(value["stats"].get("successRate").is_some());
    assert!(
        path.file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("dashboard-export-")
    );

    handle.shutdown().await.unwrap();
}

#[test]
fn test_standalone_ledger_record() {
    let mut ledger = OrderLedger::default();
    let record = ledger
        .record("ORD123", "Laptop", 999.99, OrderStatus::Success)
        .clone();

    assert_eq!(ledger.latest(), Some(&record));
    assert_eq!(ledger.display_view(), vec![record]);
}
