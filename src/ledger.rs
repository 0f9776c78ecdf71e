//! OrderLedger - append-only record of submitted orders
//!
//! New entries go to the head, so iteration is newest first. The full history
//! since startup is kept for export; the rendered view is the most recent
//! `display_limit` entries. Entries are never edited after insertion.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::stats::DashboardStats;

/// Number of orders shown on the dashboard
pub const DEFAULT_DISPLAY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Success,
    Error,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Success => "SUCCESS",
            OrderStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub product: String,
    pub price: f64,
    pub status: OrderStatus,
    pub submitted_at: DateTime<Utc>,

    /// Failure cause for orders recorded with `OrderStatus::Error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderLedger {
    /// Newest first
    history: VecDeque<OrderRecord>,
    display_limit: usize,
}

impl OrderLedger {
    pub fn new(display_limit: usize) -> Self {
        Self {
            history: VecDeque::new(),
            display_limit,
        }
    }

    /// Append an order at the head of the ledger
    pub fn record(
        &mut self,
        order_id: impl Into<String>,
        product: impl Into<String>,
        price: f64,
        status: OrderStatus,
    ) -> &OrderRecord {
        self.push(OrderRecord {
            order_id: order_id.into(),
            product: product.into(),
            price,
            status,
            submitted_at: Utc::now(),
            error: None,
        })
    }

    /// Append a fully built record at the head of the ledger
    pub fn push(&mut self, record: OrderRecord) -> &OrderRecord {
        trace!(
            order_id = %record.order_id,
            status = record.status.label(),
            "recording order"
        );
        self.history.push_front(record);
        &self.history[0]
    }

    /// The most recent orders, newest first, at most `display_limit` long
    pub fn display_view(&self) -> Vec<OrderRecord> {
        self.history
            .iter()
            .take(self.display_limit)
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<&OrderRecord> {
        self.history.front()
    }

    /// Total number of orders since startup (or since the last clear)
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Copy of the full history together with the given stats
    pub fn export_snapshot(&self, stats: &DashboardStats) -> ExportSnapshot {
        ExportSnapshot {
            timestamp: Utc::now(),
            stats: *stats,
            orders: self.history.iter().cloned().collect(),
        }
    }

    /// Drop every entry, returning the ledger to its initial state
    pub fn clear(&mut self) {
        debug!("clearing {} orders", self.history.len());
        self.history.clear();
    }
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_LIMIT)
    }
}

/// Serializable copy of the dashboard for download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub timestamp: DateTime<Utc>,
    pub stats: DashboardStats,

    /// Full history, newest first
    pub orders: Vec<OrderRecord>,
}

impl ExportSnapshot {
    pub fn file_name(&self) -> String {
        format!("dashboard-export-{}.json", self.timestamp.timestamp_millis())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize export")
    }

    /// Write the snapshot into `dir`, returning the created file
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        let content = self.to_json_pretty()?;

        std::fs::write(&path, content)
            .with_context(|| format!("failed to write export file: {}", path.display()))?;

        debug!("exported {} orders to {}", self.orders.len(), path.display());
        Ok(path)
    }
}
