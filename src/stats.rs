//! StatsReconciler - merges consumer metrics into the running dashboard record
//!
//! The consumer service exposes one JSON document with its counters. Each
//! refresh fetches it, maps whatever fields are usable onto the previous
//! [`DashboardStats`] and recomputes the derived success rate. A failed
//! refresh keeps the previous record untouched.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::error::{FetchFailure, FetchResult};
use crate::util::join_url;

pub const CONSUMER_STATS_PATH: &str = "/api/consumer/stats";

/// Compute the success rate in percent
///
/// 100 when nothing was processed yet, otherwise the share of processed
/// orders that did not error, clamped to `[0, 100]`.
pub fn success_rate(orders_processed: u64, error_count: u64) -> f64 {
    if orders_processed == 0 {
        return 100.0;
    }

    let successful = orders_processed as f64 - error_count as f64;
    (100.0 * successful / orders_processed as f64).clamp(0.0, 100.0)
}

/// Running dashboard counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub orders_processed: u64,
    pub running_average: f64,
    pub total_revenue: f64,
    pub success_rate: f64,
    pub error_count: u64,
    pub retry_count: u64,
    pub dlq_count: u64,
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self {
            orders_processed: 0,
            running_average: 0.0,
            total_revenue: 0.0,
            success_rate: 100.0,
            error_count: 0,
            retry_count: 0,
            dlq_count: 0,
        }
    }
}

impl DashboardStats {
    /// Merge a consumer payload on top of this record
    ///
    /// Fields missing from the payload keep their previous value.
    pub fn reconcile(&self, payload: &ConsumerStatsPayload) -> Self {
        let orders_processed = payload.orders_processed.unwrap_or(self.orders_processed);
        let error_count = payload.error_count.unwrap_or(self.error_count);

        Self {
            orders_processed,
            running_average: payload.running_average.unwrap_or(self.running_average),
            total_revenue: payload.total_amount.unwrap_or(self.total_revenue),
            success_rate: success_rate(orders_processed, error_count),
            error_count,
            retry_count: payload.retry_count.unwrap_or(self.retry_count),
            dlq_count: payload.dlq_count.unwrap_or(self.dlq_count),
        }
    }
}

/// Fields read from the consumer stats document
///
/// Every field is optional. A field that is absent, `null`, of the wrong type,
/// negative or non-finite is treated as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerStatsPayload {
    pub orders_processed: Option<u64>,
    pub running_average: Option<f64>,
    pub total_amount: Option<f64>,
    pub error_count: Option<u64>,
    pub retry_count: Option<u64>,
    pub dlq_count: Option<u64>,
}

impl ConsumerStatsPayload {
    /// Interpret a JSON document; only a non-object document is an error
    pub fn from_value(value: &Value) -> FetchResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            FetchFailure::Parse("consumer stats document is not a JSON object".to_string())
        })?;

        // counters may arrive float-encoded (`4.0`)
        let count = |key: &str| {
            let value = object.get(key)?;
            value.as_u64().or_else(|| {
                value
                    .as_f64()
                    .filter(|v| {
                        v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64
                    })
                    .map(|v| v as u64)
            })
        };
        let amount = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite() && *v >= 0.0)
        };

        Ok(Self {
            orders_processed: count("ordersProcessed"),
            running_average: object
                .get("runningAverage")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite()),
            total_amount: amount("totalAmount"),
            error_count: count("errorCount"),
            retry_count: count("retryCount"),
            dlq_count: count("dlqCount"),
        })
    }

    pub fn from_body(body: &str) -> FetchResult<Self> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(&value)
    }
}

/// Result of one refresh: the stats to show plus the failure, if any
///
/// On failure `stats` is the previous record, unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub stats: DashboardStats,
    pub failure: Option<FetchFailure>,

    /// The fetch completed after a newer one (or a clear) and was not applied
    pub superseded: bool,
}

impl RefreshOutcome {
    /// The fetched document was merged into `stats`
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && !self.superseded
    }
}

/// Fetches the consumer stats document
///
/// Cloning is cheap, so a fetch can run on its own task while the
/// reconciler stays with its owner.
#[derive(Debug, Clone)]
pub struct StatsFetcher {
    client: reqwest::Client,
    url: String,
}

impl StatsFetcher {
    pub fn new(consumer_base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build stats HTTP client")?;

        Ok(Self {
            client,
            url: join_url(consumer_base_url, CONSUMER_STATS_PATH),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&self) -> FetchResult<ConsumerStatsPayload> {
        trace!("requesting consumer stats");

        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FetchFailure::Protocol {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        ConsumerStatsPayload::from_body(&body)
    }
}

/// Owns the live [`DashboardStats`] record
///
/// The only component that overwrites the record in bulk.
#[derive(Debug, Clone)]
pub struct StatsReconciler {
    fetcher: StatsFetcher,
    current: DashboardStats,
}

impl StatsReconciler {
    pub fn new(fetcher: StatsFetcher) -> Self {
        Self {
            fetcher,
            current: DashboardStats::default(),
        }
    }

    pub fn fetcher(&self) -> &StatsFetcher {
        &self.fetcher
    }

    pub fn current(&self) -> &DashboardStats {
        &self.current
    }

    /// Fetch and merge in one step
    pub async fn refresh(&mut self) -> RefreshOutcome {
        let fetched = self.fetcher.fetch().await;
        self.apply(fetched)
    }

    /// Merge the outcome of a fetch that ran elsewhere
    pub fn apply(&mut self, fetched: FetchResult<ConsumerStatsPayload>) -> RefreshOutcome {
        match fetched {
            Ok(payload) => {
                self.current = self.current.reconcile(&payload);
                trace!(
                    orders_processed = self.current.orders_processed,
                    "stats reconciled"
                );
                RefreshOutcome {
                    stats: self.current,
                    failure: None,
                    superseded: false,
                }
            }
            Err(failure) => {
                debug!("stats refresh failed, keeping previous values: {failure}");
                RefreshOutcome {
                    stats: self.current,
                    failure: Some(failure),
                    superseded: false,
                }
            }
        }
    }

    /// Return to the initial record
    pub fn reset(&mut self) -> DashboardStats {
        self.current = DashboardStats::default();
        self.current
    }
}
