//! # SQS Monitor Entry Point
//!
//! `serve` runs the dashboard API, `fetch-monitor` polls the monitoring queue
//! once or continuously, and `refresh` ingests one batch from every queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use sqs_monitor::{
    config::{AppConfig, BatchSettings, ConfigLoader},
    dashboard::DashboardService,
    db,
    ingest::IngestionPipeline,
    poller::MonitorPoller,
    queue::{
        SnsTopicClient, SqsQueueClient, TopicSubscriptionResolver, aws::load_sdk_config,
    },
    repositories::MessageRepository,
    server::{AppState, run_server},
    telemetry,
};

#[derive(Debug, Parser)]
#[command(name = "sqs-monitor", version, about = "Queue and topic message monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the dashboard API
    Serve,
    /// Fetch messages from the monitoring queue
    FetchMonitor(FetchMonitorArgs),
    /// Ingest one batch from every queue
    Refresh,
}

#[derive(Debug, Args)]
struct FetchMonitorArgs {
    /// Keep polling until interrupted
    #[arg(long)]
    continuous: bool,
    /// Seconds to sleep between cycles in continuous mode
    #[arg(long)]
    interval: Option<u64>,
    /// Maximum messages per receive call (1-10)
    #[arg(long)]
    max_messages: Option<u32>,
    /// Long-poll wait in seconds (0-20)
    #[arg(long)]
    wait_time: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;
    telemetry::init_tracing(&config).context("Failed to initialize tracing")?;

    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Loaded configuration");
    }

    let config = Arc::new(config);
    let db = Arc::new(db::init_pool(&config).await?);
    db::run_migrations(&db).await?;

    let pipeline = build_pipeline(&config, db.clone()).await;

    match cli.command {
        Command::Serve => serve(config, db, pipeline).await,
        Command::FetchMonitor(args) => fetch_monitor(&config, pipeline, args).await,
        Command::Refresh => {
            let summary = pipeline.ingest_from_all_queues().await?;
            println!(
                "Polled {} queues ({} failed), received {} messages",
                summary.queues_polled, summary.queues_failed, summary.messages_received
            );
            Ok(())
        }
    }
}

async fn build_pipeline(config: &AppConfig, db: Arc<DatabaseConnection>) -> IngestionPipeline {
    let sdk_config = load_sdk_config(&config.aws).await;
    let queues = Arc::new(SqsQueueClient::new(&sdk_config));
    let topics = Arc::new(SnsTopicClient::new(&sdk_config));
    let resolver = TopicSubscriptionResolver::new(topics, queues.clone());

    IngestionPipeline::new(
        queues,
        resolver,
        MessageRepository::new(db),
        config.refresh,
    )
}

async fn serve(
    config: Arc<AppConfig>,
    db: Arc<DatabaseConnection>,
    pipeline: IngestionPipeline,
) -> Result<()> {
    let shutdown = shutdown_on_ctrl_c();
    let state = AppState {
        config,
        db,
        dashboard: DashboardService::new(pipeline),
    };

    run_server(state, shutdown).await
}

async fn fetch_monitor(
    config: &AppConfig,
    pipeline: IngestionPipeline,
    args: FetchMonitorArgs,
) -> Result<()> {
    let queue_url = config.monitor_queue_url()?.to_string();

    let settings = BatchSettings::new(
        args.max_messages.unwrap_or(config.monitor.batch.max_messages),
        args.wait_time.unwrap_or(config.monitor.batch.wait_time_seconds),
    );
    settings
        .validate("fetch-monitor")
        .context("Invalid fetch-monitor arguments")?;

    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.monitor.interval());
    if interval.is_zero() {
        bail!("--interval must be at least 1 second");
    }

    let poller = MonitorPoller::new(pipeline, queue_url, settings, interval);

    if args.continuous {
        println!(
            "Starting continuous monitoring (interval: {}s). Press Ctrl+C to stop.",
            interval.as_secs()
        );
        let shutdown = shutdown_on_ctrl_c();
        poller
            .run(shutdown, |report| println!("{}", report.summary()))
            .await?;
        println!("Stopped monitoring");
    } else {
        let report = poller.run_once().await?;
        println!("{}", report.summary());
    }

    Ok(())
}

/// Token cancelled on the first Ctrl+C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Shutdown requested");
        trigger.cancel();
    });
    token
}
