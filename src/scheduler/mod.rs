//! DashboardScheduler - drives the polling lifecycle
//!
//! The scheduler is a single actor task owning every piece of mutable
//! dashboard state: the ledger, the stats record and the latest published
//! status. Network work (status cycles, stats fetches, order submissions) is
//! spawned onto separate tasks so that a slow endpoint never holds up another
//! timer; the results come back over a channel and are applied on the actor
//! task, one at a time.
//!
//! ## Message Flow
//!
//! ```text
//! clock tick  ─────────────────────────────────────────────→ sink.render_clock
//! status tick → spawn probe_all ──┐
//! stats tick  → spawn fetch ──────┼→ TaskOutcome → apply → publish → [sink, watch]
//! debounce    → spawn fetch ──────┤
//! SubmitOrder → spawn submit ─────┘
//!     ↑
//!     └─── Commands (SubmitOrder, CheckStatusNow, Export, Clear, Shutdown, ...)
//! ```
//!
//! ## Ordering
//!
//! Every status cycle and stats fetch is numbered when dispatched. An outcome
//! older than the last one applied is dropped, so a slow early cycle can never
//! overwrite a newer snapshot. After shutdown the outcome channel is gone and
//! in-flight work is discarded on completion.

mod messages;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep, sleep_until};
use tracing::{debug, instrument, trace, warn};

use crate::config::{Config, ScheduleSettings};
use crate::error::FetchResult;
use crate::ledger::{ExportSnapshot, OrderLedger, OrderRecord, OrderStatus};
use crate::orders::{BATCH_SPACING, BatchSummary, OrderRequest, OrderSubmitter};
use crate::probe::{EndpointDescriptor, EndpointProbe};
use crate::render::{Notification, RenderSink};
use crate::stats::{DashboardStats, RefreshOutcome, StatsFetcher, StatsReconciler};
use crate::status::{StatusAggregator, SystemStatus};

pub use messages::SchedulerCommand;
use messages::{OrderOrigin, TaskOutcome};

/// Actor owning the dashboard state and its timers
pub struct DashboardScheduler {
    settings: ScheduleSettings,

    /// Status check table, shared with in-flight cycles
    descriptors: Arc<[EndpointDescriptor]>,

    aggregator: StatusAggregator,

    reconciler: StatsReconciler,

    submitter: OrderSubmitter,

    ledger: OrderLedger,

    sink: Arc<dyn RenderSink>,

    command_rx: mpsc::Receiver<SchedulerCommand>,

    /// Outcomes of spawned network work
    task_tx: mpsc::Sender<TaskOutcome>,
    task_rx: mpsc::Receiver<TaskOutcome>,

    /// Latest published snapshots for readers outside the actor
    status_tx: watch::Sender<Option<SystemStatus>>,
    stats_tx: watch::Sender<DashboardStats>,

    next_status_seq: u64,
    published_status_seq: u64,

    next_stats_seq: u64,
    applied_stats_seq: u64,

    /// Deadline of the debounced stats refresh, if one is pending
    pending_refresh: Option<Instant>,
}

impl DashboardScheduler {
    /// Create a new scheduler from configuration
    pub fn new(
        config: &Config,
        sink: Arc<dyn RenderSink>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        status_tx: watch::Sender<Option<SystemStatus>>,
        stats_tx: watch::Sender<DashboardStats>,
    ) -> Result<Self> {
        let timeout = config.probe_timeout();
        let (task_tx, task_rx) = mpsc::channel(64);

        Ok(Self {
            settings: config.schedule(),
            descriptors: config.endpoints().into(),
            aggregator: StatusAggregator::new(EndpointProbe::new(timeout)?),
            reconciler: StatsReconciler::new(StatsFetcher::new(&config.consumer_url, timeout)?),
            submitter: OrderSubmitter::new(&config.producer_url, timeout)?,
            ledger: OrderLedger::new(config.display_limit),
            sink,
            command_rx,
            task_tx,
            task_rx,
            status_tx,
            stats_tx,
            next_status_seq: 0,
            published_status_seq: 0,
            next_stats_seq: 0,
            applied_stats_seq: 0,
            pending_refresh: None,
        })
    }

    /// Run the scheduler's main loop
    ///
    /// All three timers fire once immediately, so the dashboard is populated
    /// right after startup. Runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting dashboard scheduler");

        let mut clock = interval(self.settings.clock_interval);
        let mut status_ticker = interval(self.settings.status_interval);
        let mut stats_ticker = interval(self.settings.stats_interval);

        for ticker in [&mut clock, &mut status_ticker, &mut stats_ticker] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        loop {
            tokio::select! {
                _ = clock.tick() => {
                    self.sink.render_clock(Utc::now()).await;
                }

                _ = status_ticker.tick() => {
                    self.dispatch_status_check(None);
                }

                _ = stats_ticker.tick() => {
                    self.dispatch_stats_fetch(None);
                }

                _ = debounce_elapsed(self.pending_refresh), if self.pending_refresh.is_some() => {
                    trace!("debounced stats refresh due");
                    self.pending_refresh = None;
                    self.dispatch_stats_fetch(None);
                }

                Some(outcome) = self.task_rx.recv() => {
                    self.handle_outcome(outcome).await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("dashboard scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::SubmitOrder {
                request,
                respond_to,
            } => {
                debug!(order_id = %request.order_id, "received SubmitOrder command");
                self.dispatch_order(request, respond_to);
            }

            SchedulerCommand::SubmitBatch { count, respond_to } => {
                debug!("received SubmitBatch command for {count} orders");
                self.sink
                    .notify(&Notification::info(
                        "Sending Batch Orders",
                        format!("Creating {count} random orders..."),
                    ))
                    .await;
                self.dispatch_batch(count, respond_to);
            }

            SchedulerCommand::CheckStatusNow { respond_to } => {
                debug!("received CheckStatusNow command");
                self.dispatch_status_check(Some(respond_to));
            }

            SchedulerCommand::RefreshStatsNow { respond_to } => {
                debug!("received RefreshStatsNow command");
                self.dispatch_stats_fetch(Some(respond_to));
            }

            SchedulerCommand::RecentOrders { respond_to } => {
                let _ = respond_to.send(self.ledger.display_view());
            }

            SchedulerCommand::Export { respond_to } => {
                let snapshot = self.ledger.export_snapshot(self.reconciler.current());
                let _ = respond_to.send(snapshot);
            }

            SchedulerCommand::Clear { respond_to } => {
                debug!("received Clear command");
                self.clear().await;
                let _ = respond_to.send(());
            }

            // handled by the run loop
            SchedulerCommand::Shutdown => {}
        }
    }

    async fn handle_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Status {
                seq,
                status,
                respond_to,
            } => {
                if seq > self.published_status_seq {
                    self.published_status_seq = seq;
                    self.sink.render_status(&status).await;
                    self.status_tx.send_replace(Some(status.clone()));
                } else {
                    debug!(seq, "discarding superseded status snapshot");
                }

                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(status);
                }
            }

            TaskOutcome::Stats {
                seq,
                fetched,
                respond_to,
            } => {
                let outcome = if seq > self.applied_stats_seq {
                    self.applied_stats_seq = seq;
                    let outcome = self.reconciler.apply(fetched);
                    if outcome.is_success() {
                        self.publish_stats().await;
                    }
                    outcome
                } else {
                    debug!(seq, "discarding superseded stats fetch");
                    RefreshOutcome {
                        stats: *self.reconciler.current(),
                        failure: fetched.err(),
                        superseded: true,
                    }
                };

                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(outcome);
                }
            }

            TaskOutcome::OrderSettled {
                request,
                outcome,
                origin,
                respond_to,
            } => {
                let record = self.settle_order(request, outcome, origin).await;

                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(record);
                }
            }

            TaskOutcome::BatchFinished {
                summary,
                respond_to,
            } => {
                self.sink
                    .notify(&Notification::success(
                        "Batch Complete",
                        format!("Success: {}, Failed: {}", summary.succeeded, summary.failed),
                    ))
                    .await;
                self.schedule_refresh(self.settings.batch_debounce);

                let _ = respond_to.send(summary);
            }
        }
    }

    fn dispatch_status_check(&mut self, respond_to: Option<oneshot::Sender<SystemStatus>>) {
        self.next_status_seq += 1;
        let seq = self.next_status_seq;
        trace!(seq, "dispatching status check");

        let aggregator = self.aggregator.clone();
        let descriptors = Arc::clone(&self.descriptors);
        let task_tx = self.task_tx.clone();

        tokio::spawn(async move {
            let status = aggregator.probe_all(&descriptors).await;
            let _ = task_tx
                .send(TaskOutcome::Status {
                    seq,
                    status,
                    respond_to,
                })
                .await;
        });
    }

    fn dispatch_stats_fetch(&mut self, respond_to: Option<oneshot::Sender<RefreshOutcome>>) {
        self.next_stats_seq += 1;
        let seq = self.next_stats_seq;
        trace!(seq, "dispatching stats fetch");

        let fetcher = self.reconciler.fetcher().clone();
        let task_tx = self.task_tx.clone();

        tokio::spawn(async move {
            let fetched = fetcher.fetch().await;
            let _ = task_tx
                .send(TaskOutcome::Stats {
                    seq,
                    fetched,
                    respond_to,
                })
                .await;
        });
    }

    fn dispatch_order(&self, request: OrderRequest, respond_to: oneshot::Sender<OrderRecord>) {
        let submitter = self.submitter.clone();
        let task_tx = self.task_tx.clone();
        let origin = OrderOrigin::Single {
            debounce: self.settings.stats_debounce,
        };

        tokio::spawn(async move {
            let outcome = submitter.submit(&request).await;
            let _ = task_tx
                .send(TaskOutcome::OrderSettled {
                    request,
                    outcome,
                    origin,
                    respond_to: Some(respond_to),
                })
                .await;
        });
    }

    fn dispatch_batch(&self, count: usize, respond_to: oneshot::Sender<BatchSummary>) {
        let requests = OrderRequest::batch(count, Utc::now().timestamp_millis());
        let submitter = self.submitter.clone();
        let task_tx = self.task_tx.clone();

        tokio::spawn(async move {
            let mut summary = BatchSummary::default();

            for (i, request) in requests.into_iter().enumerate() {
                if i > 0 {
                    sleep(BATCH_SPACING).await;
                }

                let outcome = submitter.submit(&request).await;
                match outcome {
                    Ok(()) => summary.succeeded += 1,
                    Err(_) => summary.failed += 1,
                }

                let settled = TaskOutcome::OrderSettled {
                    request,
                    outcome,
                    origin: OrderOrigin::Batch,
                    respond_to: None,
                };
                if task_tx.send(settled).await.is_err() {
                    // scheduler stopped
                    return;
                }
            }

            let _ = task_tx
                .send(TaskOutcome::BatchFinished {
                    summary,
                    respond_to,
                })
                .await;
        });
    }

    /// Record a submitted order, whatever its outcome
    async fn settle_order(
        &mut self,
        request: OrderRequest,
        outcome: FetchResult<()>,
        origin: OrderOrigin,
    ) -> OrderRecord {
        let (status, error) = match &outcome {
            Ok(()) => (OrderStatus::Success, None),
            Err(failure) => (OrderStatus::Error, Some(failure.to_string())),
        };

        let record = self
            .ledger
            .push(OrderRecord {
                order_id: request.order_id,
                product: request.product,
                price: request.price,
                status,
                submitted_at: Utc::now(),
                error,
            })
            .clone();

        self.sink.render_orders(&self.ledger.display_view()).await;

        if let OrderOrigin::Single { debounce } = origin {
            match &record.error {
                None => {
                    self.sink
                        .notify(&Notification::success(
                            "Order Created Successfully!",
                            format!("Order {} sent to the producer", record.order_id),
                        ))
                        .await;
                    self.schedule_refresh(debounce);
                }
                Some(error) => {
                    warn!(order_id = %record.order_id, "order submission failed: {error}");
                    self.sink
                        .notify(&Notification::error(
                            "Order Failed",
                            format!("Order {}: {error}", record.order_id),
                        ))
                        .await;
                }
            }
        }

        record
    }

    /// Arm (or push out) the debounced stats refresh
    fn schedule_refresh(&mut self, delay: Duration) {
        let deadline = Instant::now() + delay;
        self.pending_refresh = Some(match self.pending_refresh {
            Some(existing) => existing.max(deadline),
            None => deadline,
        });
        trace!("stats refresh scheduled in {delay:?}");
    }

    async fn publish_stats(&mut self) {
        let stats = *self.reconciler.current();
        self.sink.render_stats(&stats).await;
        self.stats_tx.send_replace(stats);
    }

    async fn clear(&mut self) {
        self.ledger.clear();
        self.reconciler.reset();
        // fetches already in flight belong to the old view
        self.applied_stats_seq = self.next_stats_seq;

        self.publish_stats().await;
        self.sink.render_orders(&[]).await;
        self.sink
            .notify(&Notification::info(
                "Statistics Cleared",
                "Dashboard has been reset",
            ))
            .await;
    }
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle for controlling a DashboardScheduler
///
/// This handle provides a typed API for sending commands to the actor.
/// It can be cloned and shared across tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
    status_rx: watch::Receiver<Option<SystemStatus>>,
    stats_rx: watch::Receiver<DashboardStats>,
}

impl SchedulerHandle {
    /// Spawn a new scheduler
    ///
    /// This creates the actor, spawns it as a tokio task, and returns a handle.
    pub fn spawn(config: &Config, sink: Arc<dyn RenderSink>) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(None);
        let (stats_tx, stats_rx) = watch::channel(DashboardStats::default());

        let actor = DashboardScheduler::new(config, sink, cmd_rx, status_tx, stats_tx)?;

        tokio::spawn(actor.run());

        Ok(Self {
            sender: cmd_tx,
            status_rx,
            stats_rx,
        })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(command(tx))
            .await
            .context("dashboard scheduler is not running")?;

        rx.await
            .context("dashboard scheduler stopped before responding")
    }

    /// Submit an order and wait until it is recorded in the ledger
    ///
    /// A failed submission is not an error here: it comes back as a record
    /// with `OrderStatus::Error`.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<OrderRecord> {
        self.request(|respond_to| SchedulerCommand::SubmitOrder {
            request,
            respond_to,
        })
        .await
    }

    /// Submit `count` generated orders, 200ms apart
    pub async fn submit_batch(&self, count: usize) -> Result<BatchSummary> {
        self.request(|respond_to| SchedulerCommand::SubmitBatch { count, respond_to })
            .await
    }

    /// Run a status cycle now and wait for its snapshot
    pub async fn check_status_now(&self) -> Result<SystemStatus> {
        self.request(|respond_to| SchedulerCommand::CheckStatusNow { respond_to })
            .await
    }

    /// Refresh the stats now and wait for the outcome
    pub async fn refresh_stats_now(&self) -> Result<RefreshOutcome> {
        self.request(|respond_to| SchedulerCommand::RefreshStatsNow { respond_to })
            .await
    }

    /// Status check and stats refresh at once
    pub async fn refresh_now(&self) -> Result<(SystemStatus, RefreshOutcome)> {
        let (status, stats) = tokio::join!(self.check_status_now(), self.refresh_stats_now());
        Ok((status?, stats?))
    }

    /// The orders currently in view, newest first
    pub async fn recent_orders(&self) -> Result<Vec<OrderRecord>> {
        self.request(|respond_to| SchedulerCommand::RecentOrders { respond_to })
            .await
    }

    pub async fn export(&self) -> Result<ExportSnapshot> {
        self.request(|respond_to| SchedulerCommand::Export { respond_to })
            .await
    }

    /// Reset the ledger and the stats record
    pub async fn clear(&self) -> Result<()> {
        self.request(|respond_to| SchedulerCommand::Clear { respond_to })
            .await
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Option<SystemStatus>> {
        self.status_rx.clone()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<DashboardStats> {
        self.stats_rx.clone()
    }

    /// Latest published status snapshot (`None` before the first cycle)
    pub fn latest_status(&self) -> Option<SystemStatus> {
        self.status_rx.borrow().clone()
    }

    pub fn latest_stats(&self) -> DashboardStats {
        *self.stats_rx.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Stop the scheduler and wait until its loop has exited
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;

        self.sender.closed().await;
        Ok(())
    }
}
