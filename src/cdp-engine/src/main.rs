//! CDP engine daemon: runs the event pipeline, automation executor and
//! cart-abandonment scanners against in-memory stores.

mod demo;

use std::net::SocketAddr;
use std::sync::Arc;

use cdp_core::config::{AppConfig, OverflowPolicy};
use cdp_core::sender::Senders;
use cdp_pipeline::{CdpService, LoggingSender, Repositories};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "cdp-engine")]
#[command(about = "Customer event processing and marketing automation engine")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CDP_ENGINE__NODE_ID")]
    node_id: Option<String>,

    /// Tenants to scan for abandoned carts, comma separated (overrides config)
    #[arg(long, value_delimiter = ',')]
    tenants: Vec<String>,

    /// Seconds between cart-abandonment scans (overrides config)
    #[arg(long)]
    scan_interval_secs: Option<u64>,

    /// Number of event queue shards (overrides config)
    #[arg(long)]
    event_shards: Option<usize>,

    /// Number of execution queue shards (overrides config)
    #[arg(long)]
    execution_shards: Option<usize>,

    /// Drop automation executions when their queue is full instead of
    /// running them inline
    #[arg(long, default_value_t = false)]
    drop_on_overflow: bool,

    /// Seed a demo tenant with customers and automations
    #[arg(long, default_value_t = false)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdp_engine=info,cdp_pipeline=info,cdp_automation=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("CDP engine starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if !cli.tenants.is_empty() {
        config.scanner.tenants = cli.tenants;
    }
    if let Some(secs) = cli.scan_interval_secs {
        config.scanner.interval_secs = secs;
    }
    if let Some(shards) = cli.event_shards {
        config.pipeline.event_shards = shards;
    }
    if let Some(shards) = cli.execution_shards {
        config.pipeline.execution_shards = shards;
    }
    if cli.drop_on_overflow {
        config.pipeline.execution_overflow = OverflowPolicy::Drop;
    }
    if cli.demo && !config.scanner.tenants.iter().any(|t| t == demo::TENANT) {
        config.scanner.tenants.push(demo::TENANT.to_string());
    }

    info!(
        node_id = %config.node_id,
        event_shards = config.pipeline.event_shards,
        execution_shards = config.pipeline.execution_shards,
        scan_tenants = ?config.scanner.tenants,
        scan_interval_secs = config.scanner.interval_secs,
        "Configuration loaded"
    );

    if let Err(e) = start_metrics(&config) {
        error!(error = %e, "Failed to start metrics exporter");
    }

    let senders = Senders::default()
        .with_email(Arc::new(LoggingSender::new("email")))
        .with_sms(Arc::new(LoggingSender::new("sms")))
        .with_push(Arc::new(LoggingSender::new("push")))
        .with_telegram(Arc::new(LoggingSender::new("telegram")))
        .with_webhook(Arc::new(LoggingSender::new("webhook")));

    let service = CdpService::start(&config, Repositories::in_memory(), senders);

    if cli.demo {
        demo::seed(&service).await?;
    }

    info!("CDP engine is ready to accept events");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    service.shutdown().await;

    Ok(())
}

fn start_metrics(config: &AppConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::new(config.metrics.host.parse()?, config.metrics.port);
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(port = config.metrics.port, "Metrics exporter started");
    Ok(())
}
