//! Order dashboard CLI
//!
//! Runs the polling scheduler against the order pipeline, or performs one-shot
//! checks and submissions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use order_dashboard::{
    Config, ConsoleSink, EndpointProbe, LogSink, OrderRequest, RenderSink, SchedulerHandle,
    StatsFetcher, StatsReconciler, StatusAggregator,
};
use tracing::{debug, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(name = "order-dashboard")]
#[command(about = "Health and throughput dashboard for the order pipeline", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Producer base URL (overrides config file and environment)
    #[arg(long, value_name = "URL", global = true)]
    producer_url: Option<String>,

    /// Consumer base URL (overrides config file and environment)
    #[arg(long, value_name = "URL", global = true)]
    consumer_url: Option<String>,

    /// Schema registry base URL (overrides config file and environment)
    #[arg(long, value_name = "URL", global = true)]
    schema_registry_url: Option<String>,

    /// Broker UI base URL (overrides config file and environment)
    #[arg(long, value_name = "URL", global = true)]
    broker_ui_url: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Poll continuously until interrupted
    Watch {
        /// Write an export file when stopping
        #[arg(long)]
        export_on_exit: bool,

        /// Print the clock tick every second
        #[arg(long)]
        clock: bool,

        /// Emit snapshots as log events instead of console lines
        #[arg(long, conflicts_with = "clock")]
        log: bool,
    },

    /// Probe every service once and print the snapshot as JSON
    Status,

    /// Fetch the consumer stats once and print them as JSON
    Stats,

    /// Submit a single order
    Submit {
        #[arg(long)]
        order_id: Option<String>,

        #[arg(long)]
        product: Option<String>,

        #[arg(long)]
        price: Option<f64>,
    },

    /// Submit a batch of random orders
    Batch {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

impl Args {
    /// URL flags win over the config file and the environment
    fn apply_overrides(&self, config: &mut Config) {
        for (flag, target) in [
            (&self.producer_url, &mut config.producer_url),
            (&self.consumer_url, &mut config.consumer_url),
            (&self.schema_registry_url, &mut config.schema_registry_url),
            (&self.broker_ui_url, &mut config.broker_ui_url),
        ] {
            if let Some(url) = flag {
                *target = url.clone();
            }
        }
    }
}

/// Library and binary both log under the `order_dashboard` target
fn log_filter(verbose: u8) -> filter::Targets {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    filter::Targets::new().with_target("order_dashboard", level)
}

fn init(verbose: u8) {
    let filter = log_filter(verbose);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let mut config = Config::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;

    match args.command {
        Command::Watch {
            export_on_exit,
            clock,
            log,
        } => {
            let sink: Arc<dyn RenderSink> = if log {
                Arc::new(LogSink)
            } else {
                Arc::new(ConsoleSink { show_clock: clock })
            };
            watch(&config, sink, export_on_exit).await
        }
        Command::Status => status(&config).await,
        Command::Stats => stats(&config).await,
        Command::Submit {
            order_id,
            product,
            price,
        } => {
            let random = OrderRequest::random();
            let request = OrderRequest::new(
                order_id.unwrap_or(random.order_id),
                product.unwrap_or(random.product),
                price.unwrap_or(random.price),
            )?;
            submit(&config, request).await
        }
        Command::Batch { count } => batch(&config, count).await,
    }
}

async fn watch(config: &Config, sink: Arc<dyn RenderSink>, export_on_exit: bool) -> Result<()> {
    let handle = SchedulerHandle::spawn(config, sink)?;

    tokio::signal::ctrl_c().await?;
    debug!("interrupted, stopping scheduler");

    if export_on_exit {
        let snapshot = handle.export().await?;
        let path = snapshot.write_to_dir(&config.export_dir)?;
        println!("exported {} orders to {}", snapshot.orders.len(), path.display());
    }

    handle.shutdown().await
}

async fn status(config: &Config) -> Result<()> {
    let aggregator = StatusAggregator::new(EndpointProbe::new(config.probe_timeout())?);
    let status = aggregator.probe_all(&config.endpoints()).await;

    for name in status.unmonitored_services() {
        warn!("{name} is not monitored");
    }

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn stats(config: &Config) -> Result<()> {
    let fetcher = StatsFetcher::new(&config.consumer_url, config.probe_timeout())?;
    let mut reconciler = StatsReconciler::new(fetcher);

    let outcome = reconciler.refresh().await;
    if let Some(failure) = &outcome.failure {
        warn!("could not fetch consumer stats: {failure}");
    }

    println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
    Ok(())
}

async fn submit(config: &Config, request: OrderRequest) -> Result<()> {
    let handle = SchedulerHandle::spawn(config, Arc::new(ConsoleSink::default()))?;

    handle.submit_order(request).await?;

    // let the debounced stats refresh land before exiting
    tokio::time::sleep(config.schedule().stats_debounce + Duration::from_millis(500)).await;

    handle.shutdown().await
}

async fn batch(config: &Config, count: usize) -> Result<()> {
    let handle = SchedulerHandle::spawn(config, Arc::new(ConsoleSink::default()))?;

    let summary = handle.submit_batch(count).await?;
    debug!(
        "batch finished: {} of {} orders accepted",
        summary.succeeded,
        summary.total()
    );

    tokio::time::sleep(config.schedule().batch_debounce + Duration::from_millis(500)).await;

    handle.shutdown().await
}
