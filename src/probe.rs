//! EndpointProbe - a single bounded-time health or data fetch
//!
//! A probe issues exactly one HTTP request against one named service and
//! reduces the outcome to a [`ProbeResult`]. It never returns an error to its
//! caller: transport failures, timeouts, non-2xx statuses and unreadable
//! bodies are all captured in the result, so one unreachable dependency can
//! never abort a whole status cycle.
//!
//! ```text
//! EndpointDescriptor → GET url (timeout) → status 2xx? → body checks → ProbeResult
//! ```

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::error::{FetchFailure, FetchResult};

/// How an endpoint is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Healthy iff the endpoint answers with a 2xx status
    HealthCheck,

    /// Like `HealthCheck`, but the body must also be valid JSON, which is kept
    /// as the result payload
    MetricFetch,

    /// No direct check exists; the component is listed but never contacted
    Unmonitored,
}

/// A named remote service, configured once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub url: String,
    pub kind: EndpointKind,

    /// Optional regex the response body has to match
    #[serde(default)]
    pub body_pattern: Option<String>,
}

impl EndpointDescriptor {
    pub fn health_check(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: EndpointKind::HealthCheck,
            body_pattern: None,
        }
    }

    pub fn metric_fetch(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: EndpointKind::MetricFetch,
            body_pattern: None,
        }
    }

    pub fn unmonitored(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: String::new(),
            kind: EndpointKind::Unmonitored,
            body_pattern: None,
        }
    }

    pub fn with_body_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.body_pattern = Some(pattern.into());
        self
    }
}

/// Outcome of one probe. Created fresh on every probe and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Name of the probed endpoint
    pub endpoint: String,

    pub healthy: bool,

    /// `false` for components that are listed without being checked
    pub monitored: bool,

    /// Parsed body of a successful metric fetch
    pub payload: Option<serde_json::Value>,

    /// Failure cause when `healthy` is false
    pub error: Option<String>,

    /// HTTP status, if a response arrived at all
    pub http_status: Option<u16>,

    pub response_time_ms: Option<u64>,

    pub observed_at: DateTime<Utc>,
}

impl ProbeResult {
    /// Result for a component that has no direct check
    pub fn unmonitored(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            healthy: true,
            monitored: false,
            payload: None,
            error: None,
            http_status: None,
            response_time_ms: None,
            observed_at: Utc::now(),
        }
    }

    /// Result for a monitored endpoint whose check failed
    pub fn failed(endpoint: impl Into<String>, failure: &FetchFailure) -> Self {
        Self {
            endpoint: endpoint.into(),
            healthy: false,
            monitored: true,
            payload: None,
            error: Some(failure.to_string()),
            http_status: match failure {
                FetchFailure::Protocol { status } => Some(*status),
                _ => None,
            },
            response_time_ms: None,
            observed_at: Utc::now(),
        }
    }
}

/// Issues single health/data fetches with a fixed timeout
///
/// Cloning is cheap; the underlying HTTP client is shared.
#[derive(Debug, Clone)]
pub struct EndpointProbe {
    client: reqwest::Client,
}

impl EndpointProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build probe HTTP client")?;

        Ok(Self { client })
    }

    /// Probe one endpoint and classify the outcome
    #[instrument(skip(self, descriptor), fields(endpoint = %descriptor.name))]
    pub async fn probe(&self, descriptor: &EndpointDescriptor) -> ProbeResult {
        if descriptor.kind == EndpointKind::Unmonitored {
            trace!("endpoint is unmonitored, skipping request");
            return ProbeResult::unmonitored(&descriptor.name);
        }

        trace!("probing {}", descriptor.url);

        let start = Instant::now();
        let response = self.execute_request(&descriptor.url).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let (status_code, body) = match response {
            Ok(response) => response,
            Err(failure) => {
                warn!("probe failed: {failure}");
                return ProbeResult::failed(&descriptor.name, &failure);
            }
        };

        let mut result = match evaluate_response(descriptor, status_code, &body) {
            Ok(payload) => ProbeResult {
                endpoint: descriptor.name.clone(),
                healthy: true,
                monitored: true,
                payload,
                error: None,
                http_status: Some(status_code),
                response_time_ms: None,
                observed_at: Utc::now(),
            },
            Err(failure) => {
                warn!("probe failed: {failure}");
                let mut result = ProbeResult::failed(&descriptor.name, &failure);
                result.http_status = Some(status_code);
                result
            }
        };
        result.response_time_ms = Some(response_time_ms);

        debug!(
            healthy = result.healthy,
            "probe finished in {response_time_ms}ms"
        );

        result
    }

    /// Execute the GET request, returning (status_code, body)
    async fn execute_request(&self, url: &str) -> FetchResult<(u16, String)> {
        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        let body = response.text().await?;

        Ok((status_code, body))
    }
}

/// Decide whether a response counts as healthy
///
/// Checks:
/// 1. Status code is 2xx
/// 2. Body matches the configured pattern (if any)
/// 3. Body is valid JSON (metric fetches only)
///
/// Health checks keep their body as payload when it happens to be JSON.
fn evaluate_response(
    descriptor: &EndpointDescriptor,
    status_code: u16,
    body: &str,
) -> FetchResult<Option<serde_json::Value>> {
    if !(200..300).contains(&status_code) {
        return Err(FetchFailure::Protocol {
            status: status_code,
        });
    }

    if let Some(pattern) = &descriptor.body_pattern {
        let re = regex::Regex::new(pattern)
            .map_err(|e| FetchFailure::Parse(format!("invalid body pattern '{pattern}': {e}")))?;
        if !re.is_match(body) {
            return Err(FetchFailure::Parse(format!(
                "body does not match pattern '{pattern}'"
            )));
        }
    }

    match descriptor.kind {
        EndpointKind::MetricFetch => Ok(Some(serde_json::from_str(body)?)),
        _ => Ok(serde_json::from_str(body).ok()),
    }
}
