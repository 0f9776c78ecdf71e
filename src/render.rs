//! Render sinks consuming published dashboard snapshots
//!
//! The scheduler hands each snapshot to the sink by reference at the moment
//! it is published. Sinks only read; they never feed anything back.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, trace};

use crate::ledger::OrderRecord;
use crate::stats::DashboardStats;
use crate::status::SystemStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
}

/// A user-facing notice, e.g. the outcome of an order submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Consumer of published snapshots
///
/// Implementations must be `Send + Sync`; the scheduler holds the sink behind
/// an `Arc` on its own task.
#[async_trait]
pub trait RenderSink: Send + Sync {
    async fn render_status(&self, status: &SystemStatus);

    async fn render_stats(&self, stats: &DashboardStats);

    /// The display view of the ledger, newest first
    async fn render_orders(&self, orders: &[OrderRecord]);

    async fn notify(&self, notification: &Notification);

    /// Cosmetic clock tick
    async fn render_clock(&self, _now: DateTime<Utc>) {}
}

/// Emits every snapshot as a tracing event
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl RenderSink for LogSink {
    async fn render_status(&self, status: &SystemStatus) {
        let down: Vec<_> = status.unhealthy_services().collect();
        info!(
            overall_healthy = status.overall_healthy,
            services = status.per_service.len(),
            "{} {down:?}",
            status.summary()
        );
    }

    async fn render_stats(&self, stats: &DashboardStats) {
        info!(
            orders_processed = stats.orders_processed,
            running_average = stats.running_average,
            total_revenue = stats.total_revenue,
            success_rate = stats.success_rate,
            "stats updated"
        );
    }

    async fn render_orders(&self, orders: &[OrderRecord]) {
        trace!("{} orders in view", orders.len());
    }

    async fn notify(&self, notification: &Notification) {
        match notification.level {
            NotificationLevel::Error => error!("{}: {}", notification.title, notification.message),
            _ => info!("{}: {}", notification.title, notification.message),
        }
    }
}

/// Plain text output on stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    /// Print the clock tick as well
    pub show_clock: bool,
}

#[async_trait]
impl RenderSink for ConsoleSink {
    async fn render_status(&self, status: &SystemStatus) {
        println!(
            "[{}] {}",
            status.last_checked_at.with_timezone(&Local).format("%H:%M:%S"),
            status.summary()
        );
        for result in status.per_service.values() {
            let state = match (result.monitored, result.healthy) {
                (false, _) => "Unmonitored",
                (true, true) => "Healthy",
                (true, false) => "Unhealthy",
            };
            match &result.error {
                Some(error) => println!("  {:<18} {state} ({error})", result.endpoint),
                None => println!("  {:<18} {state}", result.endpoint),
            }
        }
    }

    async fn render_stats(&self, stats: &DashboardStats) {
        println!(
            "orders: {} | avg: {:.2} | revenue: {:.2} | success: {:.2}% | errors: {} | retries: {} | dlq: {}",
            stats.orders_processed,
            stats.running_average,
            stats.total_revenue,
            stats.success_rate,
            stats.error_count,
            stats.retry_count,
            stats.dlq_count
        );
    }

    async fn render_orders(&self, orders: &[OrderRecord]) {
        let Some(latest) = orders.first() else {
            println!("No orders yet.");
            return;
        };

        println!(
            "{} {} {} ${:.2} {} ({} shown)",
            latest.submitted_at.with_timezone(&Local).format("%H:%M:%S"),
            latest.order_id,
            latest.product,
            latest.price,
            latest.status.label(),
            orders.len()
        );
    }

    async fn notify(&self, notification: &Notification) {
        let marker = match notification.level {
            NotificationLevel::Success => "+",
            NotificationLevel::Error => "!",
            NotificationLevel::Info => "i",
        };
        println!("[{marker}] {}: {}", notification.title, notification.message);
    }

    async fn render_clock(&self, now: DateTime<Utc>) {
        if self.show_clock {
            println!("last update {}", now.with_timezone(&Local).format("%H:%M:%S"));
        }
    }
}
