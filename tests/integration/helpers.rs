//! Helper functions for integration tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use order_dashboard::{
    Config, DashboardStats, Notification, OrderRecord, RenderSink, SystemStatus,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STATS_PATH: &str = "/api/consumer/stats";
pub const ORDERS_PATH: &str = "/api/orders";

/// A base URL where nothing is listening
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Config pointing every service at `base`, with timers slow enough that only
/// the startup tick fires during a test
pub fn test_config(base: &str) -> Config {
    Config {
        producer_url: base.to_string(),
        consumer_url: base.to_string(),
        schema_registry_url: base.to_string(),
        broker_ui_url: base.to_string(),
        status_interval_secs: 3600,
        stats_interval_secs: 3600,
        clock_interval_millis: 1000,
        probe_timeout_secs: 2,
        stats_debounce_millis: 200,
        batch_debounce_millis: 200,
        ..Config::default()
    }
}

pub fn consumer_stats_json(
    processed: u64,
    average: f64,
    total: f64,
    errors: u64,
) -> serde_json::Value {
    serde_json::json!({
        "ordersProcessed": processed,
        "runningAverage": average,
        "totalAmount": total,
        "errorCount": errors
    })
}

/// Mount health endpoints for every service on one mock server
pub async fn mount_health(server: &MockServer, status: u16) {
    for p in ["/actuator/health", "/subjects", "/"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }
}

pub async fn mount_consumer_stats(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(STATS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_orders(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(ORDERS_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "success": status < 300
        })))
        .mount(server)
        .await;
}

/// A mock server answering every endpoint successfully
pub async fn healthy_stack() -> MockServer {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    mount_consumer_stats(&server, consumer_stats_json(4, 250.0, 1000.0, 1)).await;
    mount_orders(&server, 200).await;
    server
}

pub async fn requests_to(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .count()
}

/// Wait until `server` has seen at least `count` requests to `request_path`
pub async fn wait_for_requests(
    server: &MockServer,
    request_path: &str,
    count: usize,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if requests_to(server, request_path).await >= count {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Poll `check` every 20ms until it holds or `timeout` elapses
pub async fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Sink that remembers everything it was given
#[derive(Default)]
pub struct RecordingSink {
    pub statuses: Mutex<Vec<SystemStatus>>,
    pub stats: Mutex<Vec<DashboardStats>>,
    pub orders: Mutex<Vec<Vec<OrderRecord>>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub clock_ticks: AtomicUsize,
}

impl RecordingSink {
    pub fn status_count(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn stats_count(&self) -> usize {
        self.stats.lock().unwrap().len()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderSink for RecordingSink {
    async fn render_status(&self, status: &SystemStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    async fn render_stats(&self, stats: &DashboardStats) {
        self.stats.lock().unwrap().push(*stats);
    }

    async fn render_orders(&self, orders: &[OrderRecord]) {
        self.orders.lock().unwrap().push(orders.to_vec());
    }

    async fn notify(&self, notification: &Notification) {
        self.notifications.lock().unwrap().push(notification.clone());
    }

    async fn render_clock(&self, _now: DateTime<Utc>) {
        self.clock_ticks.fetch_add(1, Ordering::SeqCst);
    }
}
