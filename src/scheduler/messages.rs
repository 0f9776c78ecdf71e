//! Message types for the dashboard scheduler
//!
//! Two channels feed the scheduler loop:
//!
//! 1. **Commands**: requests from a [`super::SchedulerHandle`], answered over
//!    oneshot channels
//! 2. **Task outcomes**: results of network work the scheduler spawned off its
//!    own task, carried back so that every state change happens on the
//!    scheduler task itself

use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::FetchResult;
use crate::ledger::{ExportSnapshot, OrderRecord};
use crate::orders::{BatchSummary, OrderRequest};
use crate::stats::{ConsumerStatsPayload, RefreshOutcome};
use crate::status::SystemStatus;

/// Commands that can be sent to the DashboardScheduler
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Submit one order; answered with the ledger entry once it settled
    SubmitOrder {
        request: OrderRequest,
        respond_to: oneshot::Sender<OrderRecord>,
    },

    /// Submit `count` generated orders one after another
    SubmitBatch {
        count: usize,
        respond_to: oneshot::Sender<BatchSummary>,
    },

    /// Run a status cycle immediately (bypassing the interval timer)
    CheckStatusNow {
        respond_to: oneshot::Sender<SystemStatus>,
    },

    /// Refresh the stats immediately (bypassing the interval timer)
    RefreshStatsNow {
        respond_to: oneshot::Sender<RefreshOutcome>,
    },

    /// Get the display view of the ledger
    RecentOrders {
        respond_to: oneshot::Sender<Vec<OrderRecord>>,
    },

    /// Get the full history plus current stats
    Export {
        respond_to: oneshot::Sender<ExportSnapshot>,
    },

    /// Reset ledger and stats to their initial state
    Clear { respond_to: oneshot::Sender<()> },

    /// Stop all timers and exit
    ///
    /// Work still in flight completes, but its results are dropped.
    Shutdown,
}

/// Where a settled order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrderOrigin {
    /// Notified individually; a success schedules a debounced stats refresh
    Single { debounce: Duration },

    /// Part of a batch; the batch as a whole is notified and refreshes once
    Batch,
}

/// Results of spawned network work
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Status {
        seq: u64,
        status: SystemStatus,
        respond_to: Option<oneshot::Sender<SystemStatus>>,
    },

    Stats {
        seq: u64,
        fetched: FetchResult<ConsumerStatsPayload>,
        respond_to: Option<oneshot::Sender<RefreshOutcome>>,
    },

    OrderSettled {
        request: OrderRequest,
        outcome: FetchResult<()>,
        origin: OrderOrigin,
        respond_to: Option<oneshot::Sender<OrderRecord>>,
    },

    BatchFinished {
        summary: BatchSummary,
        respond_to: oneshot::Sender<BatchSummary>,
    },
}
