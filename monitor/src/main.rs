//! Passive LTE DCI Monitor
//!
//! Subscribes to aligned subframes from the synchronization layer, blind decodes
//! the PDCCH of every configured carrier and logs the recovered grants.

mod config;

use anyhow::Result;
use clap::Parser;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use common::types::CarrierId;
use config::MonitorConfig;
use interfaces::dci_log::{DciSink, FanoutSink, TsvFileSink};
use interfaces::subframe_feed::{SubframeFeedConfig, ZmqSubframeFeed};
use interfaces::zmq_handler::{SocketType, ZmqConfig, ZmqHandler};
use layers::engine::{MonitorEngine, ShutdownFlag};
use layers::status::CarrierGroup;

/// Passive LTE PDCCH blind decoder
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "monitor.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Decoder threads per carrier
    #[arg(long)]
    threads: Option<usize>,

    /// RNTI whose grants fill the UE usage columns
    #[arg(long)]
    target_rnti: Option<u16>,

    /// Tab-separated DCI log file
    #[arg(long)]
    tsv: Option<String>,
}

fn build_sink(config: &MonitorConfig) -> Result<FanoutSink> {
    let mut sink = FanoutSink::default();
    if let Some(path) = &config.output.tsv_path {
        sink.push(Box::new(TsvFileSink::create(path)?));
    }
    if let Some(address) = &config.output.dci_publish {
        let mut publisher = ZmqHandler::new(ZmqConfig {
            socket_type: SocketType::Pub,
            bind_address: address.clone(),
            hwm: 10_000,
        });
        publisher.initialize()?;
        sink.push(Box::new(publisher));
    }
    if sink.is_empty() {
        warn!("No DCI output configured; decoded grants are only counted");
    }
    Ok(sink)
}

fn log_statistics(group: &CarrierGroup, window: usize) {
    for carrier in group.carriers() {
        let stats = carrier.stats().snapshot();
        info!(
            "{}: SFN {:?}, {} subframes, {} grants, {} ambiguous, {} pruned, {} refused, \
             {} stale, {} active UEs",
            carrier.id(),
            carrier.current_sfn(),
            stats.subframes,
            stats.messages,
            stats.location_discards,
            stats.budget_pruned,
            stats.token_refusals,
            stats.stale_subframes,
            carrier.nof_active()
        );
    }
    match group.rate_estimate(window) {
        Some(rate) => info!(
            "Cell usage {:.1}%, UE {:?} us/pkt, probe {:?} us/pkt, full load {:?} us/pkt",
            rate.cell_usage_pct,
            rate.ue_us_per_pkt,
            rate.probe_us_per_pkt,
            rate.full_load_us_per_pkt
        ),
        None => info!("Carriers not yet synchronized, no rate estimate"),
    }
}

/// Resolves once the shutdown flag is raised
async fn watch_shutdown(shutdown: Arc<ShutdownFlag>) {
    let watch = tokio::task::spawn_blocking(move || {
        while !shutdown.wait_timeout(Duration::from_secs(1)) {}
    });
    if let Err(e) = watch.await {
        error!("Shutdown watch failed: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = MonitorConfig::from_toml_file(&args.config)?;
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if let Some(threads) = args.threads {
        config.decoder.threads = threads;
    }
    if args.target_rnti.is_some() {
        config.target_rnti = args.target_rnti;
    }
    if args.tsv.is_some() {
        config.output.tsv_path = args.tsv;
    }

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting DCI monitor");
    info!("Configuration file: {}", args.config);
    info!("  Carriers: {}", config.carriers.len());
    info!("  Decoder threads per carrier: {}", config.decoder.threads);
    info!("  Formats: {:?}", config.decoder.formats);
    if let Some(rnti) = config.target_rnti {
        info!("  Target RNTI: {}", rnti);
    }

    let pipeline = config.pipeline()?;
    let sink = build_sink(&config)?;

    let mut feeds = Vec::with_capacity(config.carriers.len());
    let mut queues = Vec::with_capacity(config.carriers.len());
    for (i, carrier) in config.carriers.iter().enumerate() {
        let (tx, rx) = sync_channel(carrier.queue_depth);
        let feed_config = SubframeFeedConfig::new(CarrierId(i), &carrier.address);
        feeds.push(ZmqSubframeFeed::spawn(feed_config, tx)?);
        queues.push(rx);
    }

    let engine = MonitorEngine::start(pipeline, queues, Box::new(sink) as Box<dyn DciSink>)?;
    let group = Arc::clone(engine.group());
    let shutdown = Arc::clone(engine.shutdown_flag());
    info!("DCI monitor running");

    // Start statistics reporting
    let stats_handle = {
        let group = Arc::clone(&group);
        let window = config.status.report_window;
        let period = Duration::from_secs(config.status.stats_interval_secs.max(1));
        let mut publisher = match &config.output.status_publish {
            Some(address) => {
                let mut handler = ZmqHandler::new(ZmqConfig {
                    socket_type: SocketType::Pub,
                    bind_address: address.clone(),
                    hwm: 100,
                });
                handler.initialize()?;
                Some(handler)
            }
            None => None,
        };

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                log_statistics(&group, window);
                if let Some(publisher) = publisher.as_mut() {
                    if let Err(e) = publisher.publish_json(&group.report(window)) {
                        warn!("Failed to publish status report: {}", e);
                    }
                }
            }
        })
    };

    // A decoder that cannot initialize raises the shutdown flag itself
    let fatal_watch = watch_shutdown(Arc::clone(&shutdown));

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = fatal_watch => {
            error!("Decoder failure, shutting down");
        }
    }

    // Shutdown
    info!("Shutting down DCI monitor");
    shutdown.request();
    stats_handle.abort();

    for feed in feeds {
        let carrier = feed.carrier();
        let stats = feed.shutdown();
        info!(
            "{}: feed received {} subframes ({} malformed, {} dropped)",
            carrier, stats.subframes, stats.malformed, stats.dropped
        );
    }

    let mut engine = engine;
    let stopped = tokio::task::spawn_blocking(move || {
        engine.stop();
        engine
    });
    match tokio::time::timeout(Duration::from_secs(5), stopped).await {
        Ok(Ok(engine)) => log_statistics(engine.group(), config.status.report_window),
        Ok(Err(e)) => error!("Engine shutdown task failed: {}", e),
        Err(_) => warn!("Decoder threads did not stop within 5 s"),
    }

    info!("DCI monitor shutdown complete");
    Ok(())
}
