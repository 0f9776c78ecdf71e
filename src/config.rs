//! Dashboard configuration
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every field has a default, so an empty file (or none at all)
//! points the dashboard at a local development stack.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ledger::DEFAULT_DISPLAY_LIMIT;
use crate::probe::EndpointDescriptor;
use crate::util::{self, join_url};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Order producer base URL
    pub producer_url: String,

    /// Order consumer base URL
    pub consumer_url: String,

    pub schema_registry_url: String,

    /// Message broker UI base URL
    pub broker_ui_url: String,

    /// Status check cadence in seconds
    pub status_interval_secs: u64,

    /// Stats refresh cadence in seconds
    pub stats_interval_secs: u64,

    /// Cosmetic clock cadence in milliseconds
    pub clock_interval_millis: u64,

    /// Per-request timeout in seconds
    pub probe_timeout_secs: u64,

    /// Delay between a successful order and the stats refresh it triggers
    pub stats_debounce_millis: u64,

    /// Delay between the end of a batch and the stats refresh it triggers
    pub batch_debounce_millis: u64,

    /// Number of orders in the rendered view
    pub display_limit: usize,

    /// Components shown without a direct health check
    pub unmonitored: Vec<String>,

    /// Optional regex that producer and consumer health bodies must match
    pub health_body_pattern: Option<String>,

    /// Directory export files are written to
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            producer_url: "http://localhost:8090".to_string(),
            consumer_url: "http://localhost:8082".to_string(),
            schema_registry_url: "http://localhost:8081".to_string(),
            broker_ui_url: "http://localhost:8080".to_string(),
            status_interval_secs: 5,
            stats_interval_secs: 5,
            clock_interval_millis: 1000,
            probe_timeout_secs: 4,
            stats_debounce_millis: 1000,
            batch_debounce_millis: 2000,
            display_limit: DEFAULT_DISPLAY_LIMIT,
            unmonitored: vec![
                "broker-1".to_string(),
                "broker-2".to_string(),
                "broker-3".to_string(),
                "zookeeper".to_string(),
            ],
            health_body_pattern: None,
            export_dir: PathBuf::from("."),
        }
    }
}

/// Timer cadences derived from a [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub status_interval: Duration,
    pub stats_interval: Duration,
    pub clock_interval: Duration,
    pub stats_debounce: Duration,
    pub batch_debounce: Duration,
}

impl Config {
    /// Load configuration from file, or use defaults if no file exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            let default_path = dirs::config_dir()?
                .join("order-dashboard")
                .join("config.toml");
            default_path.exists().then_some(default_path)
        });

        let config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        let config = config.with_env_overrides();
        config.validate()?;

        trace!("loaded config: {config:?}");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `DASHBOARD_*_URL` environment variables
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = util::get_env(util::PRODUCER_URL) {
            self.producer_url = url;
        }
        if let Some(url) = util::get_env(util::CONSUMER_URL) {
            self.consumer_url = url;
        }
        if let Some(url) = util::get_env(util::SCHEMA_REGISTRY_URL) {
            self.schema_registry_url = url;
        }
        if let Some(url) = util::get_env(util::BROKER_UI_URL) {
            self.broker_ui_url = url;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("producer_url", &self.producer_url),
            ("consumer_url", &self.consumer_url),
            ("schema_registry_url", &self.schema_registry_url),
            ("broker_ui_url", &self.broker_ui_url),
        ] {
            reqwest::Url::parse(url).with_context(|| format!("invalid {name}: '{url}'"))?;
        }

        if self.status_interval_secs == 0 || self.stats_interval_secs == 0 {
            anyhow::bail!("status and stats intervals must be at least one second");
        }
        if self.clock_interval_millis == 0 {
            anyhow::bail!("clock interval must be positive");
        }
        if self.probe_timeout_secs == 0 {
            anyhow::bail!("probe timeout must be at least one second");
        }
        if self.display_limit == 0 {
            anyhow::bail!("display limit must be positive");
        }

        let mut names = HashSet::new();
        for descriptor in self.endpoints() {
            if !names.insert(descriptor.name.clone()) {
                anyhow::bail!("duplicate endpoint name '{}'", descriptor.name);
            }
        }

        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn schedule(&self) -> ScheduleSettings {
        ScheduleSettings {
            status_interval: Duration::from_secs(self.status_interval_secs),
            stats_interval: Duration::from_secs(self.stats_interval_secs),
            clock_interval: Duration::from_millis(self.clock_interval_millis),
            stats_debounce: Duration::from_millis(self.stats_debounce_millis),
            batch_debounce: Duration::from_millis(self.batch_debounce_millis),
        }
    }

    /// The status check table
    pub fn endpoints(&self) -> Vec<EndpointDescriptor> {
        let with_pattern = |descriptor: EndpointDescriptor| match &self.health_body_pattern {
            Some(pattern) => descriptor.with_body_pattern(pattern.clone()),
            None => descriptor,
        };

        let mut endpoints = vec![
            with_pattern(EndpointDescriptor::health_check(
                "producer",
                join_url(&self.producer_url, "/actuator/health"),
            )),
            with_pattern(EndpointDescriptor::health_check(
                "consumer",
                join_url(&self.consumer_url, "/actuator/health"),
            )),
            EndpointDescriptor::health_check(
                "schema-registry",
                join_url(&self.schema_registry_url, "/subjects"),
            ),
            EndpointDescriptor::health_check("broker-ui", self.broker_ui_url.clone()),
        ];

        endpoints.extend(
            self.unmonitored
                .iter()
                .map(|name| EndpointDescriptor::unmonitored(name.clone())),
        );

        endpoints
    }
}
