//! Dashboard behaviour when the pipeline misbehaves

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use order_dashboard::{
    DashboardStats, FetchFailure, OrderRequest, OrderStatus, SchedulerHandle,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_everything_unreachable() {
    let sink = Arc::new(RecordingSink::default());
    let handle = SchedulerHandle::spawn(&test_config(UNREACHABLE), sink.clone()).unwrap();

    let status = handle.check_status_now().await.unwrap();

    assert!(!status.overall_healthy);
    assert_eq!(status.per_service.len(), 8);
    assert_eq!(
        status.unhealthy_services().collect::<Vec<_>>(),
        vec!["broker-ui", "consumer", "producer", "schema-registry"]
    );

    let outcome = handle.refresh_stats_now().await.unwrap();
    assert_matches!(outcome.failure, Some(FetchFailure::Transport(_)));
    assert_eq!(outcome.stats, DashboardStats::default());
    assert_eq!(handle.latest_stats(), DashboardStats::default());
    // a failed fetch never re-renders the stats
    assert_eq!(sink.stats_count(), 0);

    let record = handle
        .submit_order(OrderRequest::new("ORD1", "Keyboard", 79.0).unwrap())
        .await
        .unwrap();
    assert_eq!(record.status, OrderStatus::Error);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_garbage_stats_body_keeps_last_good_values() {
    let server = healthy_stack().await;
    let handle = SchedulerHandle::spawn(
        &test_config(&server.uri()),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    let good = handle.refresh_stats_now().await.unwrap();
    assert_eq!(good.stats.orders_processed, 4);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(STATS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let bad = handle.refresh_stats_now().await.unwrap();

    assert_matches!(bad.failure, Some(FetchFailure::Parse(_)));
    assert_eq!(bad.stats, good.stats);
    assert_eq!(handle.latest_stats(), good.stats);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_consumer_error_status_is_protocol_failure() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    Mock::given(method("GET"))
        .and(path(STATS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let handle = SchedulerHandle::spawn(
        &test_config(&server.uri()),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    let outcome = handle.refresh_stats_now().await.unwrap();

    assert_eq!(outcome.failure, Some(FetchFailure::Protocol { status: 503 }));
    assert_eq!(outcome.stats.success_rate, 100.0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_calls_after_shutdown_fail() {
    let server = healthy_stack().await;
    let handle = SchedulerHandle::spawn(
        &test_config(&server.uri()),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    handle.shutdown().await.unwrap();

    assert!(handle.check_status_now().await.is_err());
    assert!(handle.recent_orders().await.is_err());
    assert!(handle.clear().await.is_err());
    assert!(handle.shutdown().await.is_err());
}

#[tokio::test]
async fn test_batch_with_failing_producer() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    mount_consumer_stats(&server, consumer_stats_json(0, 0.0, 0.0, 0)).await;
    mount_orders(&server, 500).await;

    let sink = Arc::new(RecordingSink::default());
    let handle = SchedulerHandle::spawn(&test_config(&server.uri()), sink.clone()).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), handle.submit_batch(2))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 2);

    let view = handle.recent_orders().await.unwrap();
    assert!(view.iter().all(|o| o.status == OrderStatus::Error));

    let batch = sink
        .notifications()
        .into_iter()
        .find(|n| n.title == "Batch Complete")
        .expect("batch notification");
    assert_eq!(batch.message, "Success: 0, Failed: 2");

    handle.shutdown().await.unwrap();
}
