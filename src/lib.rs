//! Polling and reconciliation engine for an order-processing dashboard
//!
//! The dashboard watches an order producer, an order consumer, a schema
//! registry and a message-broker UI. It periodically probes their health,
//! pulls consumer metrics into a running stats record, keeps a ledger of
//! submitted orders, and publishes consistent snapshots to a render sink.
//!
//! ```text
//! status tick → StatusAggregator::probe_all → SystemStatus   ─┐
//! stats tick  → StatsReconciler (fetch + apply) → DashboardStats ─┼→ RenderSink
//! order       → OrderSubmitter → OrderLedger::push ─────────────┘
//! ```
//!
//! [`scheduler::SchedulerHandle`] is the entry point for running the whole
//! thing; the components can also be used on their own.

pub mod config;
pub mod error;
pub mod ledger;
pub mod orders;
pub mod probe;
pub mod render;
pub mod scheduler;
pub mod stats;
pub mod status;
pub mod util;

pub use config::Config;
pub use error::{FailureKind, FetchFailure};
pub use ledger::{ExportSnapshot, OrderLedger, OrderRecord, OrderStatus};
pub use orders::{BatchSummary, OrderRequest, OrderSubmitter};
pub use probe::{EndpointDescriptor, EndpointKind, EndpointProbe, ProbeResult};
pub use render::{ConsoleSink, LogSink, Notification, NotificationLevel, RenderSink};
pub use scheduler::{DashboardScheduler, SchedulerHandle};
pub use stats::{DashboardStats, RefreshOutcome, StatsFetcher, StatsReconciler};
pub use status::{StatusAggregator, SystemStatus};
