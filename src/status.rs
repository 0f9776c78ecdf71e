//! StatusAggregator - folds concurrent probes into one system snapshot
//!
//! All probes of a cycle run concurrently, so a hung endpoint delays the
//! cycle by at most the per-probe timeout. The snapshot is only built once
//! every probe has settled; readers never observe a partial cycle.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::probe::{EndpointDescriptor, EndpointProbe, ProbeResult};

/// Health of the whole system at one point in time
///
/// Rebuilt wholesale on every cycle, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Probe result per endpoint name
    pub per_service: BTreeMap<String, ProbeResult>,

    /// Logical AND of every `per_service[*].healthy`
    pub overall_healthy: bool,

    pub last_checked_at: DateTime<Utc>,
}

impl SystemStatus {
    /// Build a snapshot from a complete set of probe results
    ///
    /// An empty set is vacuously healthy.
    pub fn from_results(
        results: impl IntoIterator<Item = ProbeResult>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let mut per_service = BTreeMap::new();

        for result in results {
            if let Some(previous) = per_service.insert(result.endpoint.clone(), result) {
                warn!("duplicate endpoint name '{}' in one cycle", previous.endpoint);
            }
        }

        let overall_healthy = per_service.values().all(|result| result.healthy);

        Self {
            per_service,
            overall_healthy,
            last_checked_at: checked_at,
        }
    }

    pub fn get(&self, endpoint: &str) -> Option<&ProbeResult> {
        self.per_service.get(endpoint)
    }

    pub fn unhealthy_services(&self) -> impl Iterator<Item = &str> {
        self.per_service
            .values()
            .filter(|result| !result.healthy)
            .map(|result| result.endpoint.as_str())
    }

    /// Components listed without a direct check
    pub fn unmonitored_services(&self) -> impl Iterator<Item = &str> {
        self.per_service
            .values()
            .filter(|result| !result.monitored)
            .map(|result| result.endpoint.as_str())
    }

    /// Compare the health verdicts of two snapshots, ignoring timing
    /// (observation timestamps and response times)
    pub fn same_health_as(&self, other: &SystemStatus) -> bool {
        self.overall_healthy == other.overall_healthy
            && self.per_service.len() == other.per_service.len()
            && self
                .per_service
                .iter()
                .zip(other.per_service.iter())
                .all(|((name_a, a), (name_b, b))| {
                    name_a == name_b
                        && a.healthy == b.healthy
                        && a.monitored == b.monitored
                        && a.http_status == b.http_status
                        && a.error == b.error
                        && a.payload == b.payload
                })
    }

    /// Short human readable verdict
    pub fn summary(&self) -> &'static str {
        if self.overall_healthy {
            "All Systems Operational"
        } else {
            "Some Services Down"
        }
    }
}

/// Runs a set of probes concurrently and combines them
#[derive(Debug, Clone)]
pub struct StatusAggregator {
    probe: EndpointProbe,
}

impl StatusAggregator {
    pub fn new(probe: EndpointProbe) -> Self {
        Self { probe }
    }

    /// Probe every descriptor and fold the results into one snapshot
    ///
    /// Always completes: if every probe fails the snapshot is simply all
    /// unhealthy.
    #[instrument(skip_all, fields(endpoints = descriptors.len()))]
    pub async fn probe_all(&self, descriptors: &[EndpointDescriptor]) -> SystemStatus {
        let probes = descriptors
            .iter()
            .map(|descriptor| self.probe.probe(descriptor));

        let results = join_all(probes).await;
        let status = SystemStatus::from_results(results, Utc::now());

        debug!(
            overall_healthy = status.overall_healthy,
            "status cycle complete"
        );

        status
    }
}
