//! Boot — logging init, config load, statsd connection, pipeline assembly.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::{Cli, StatConfig};
use crate::parser::metrics::PipelineMetrics;
use crate::pipeline::Pipeline;
use crate::stats::sink::expand_prefix;
use crate::stats::{MetricsSink, StatsdHandler, StatsdSink};

/// Everything `serve` needs, built but not yet running.
pub struct Service {
    pub config: StatConfig,
    pub pipeline: Pipeline,
    pub sink: Arc<dyn MetricsSink>,
    pub metrics: Arc<PipelineMetrics>,
}

/// Initialise the tracing / logging subsystem.
///
/// `RUST_LOG` wins; otherwise `level` applies to this crate.
pub fn init_logging(level: Option<&str>) {
    let default = format!("haproxystat={}", level.unwrap_or("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config and connect to statsd.
///
/// An unusable statsd destination is fatal.
pub fn boot(cli: &Cli) -> Result<Service, Box<dyn std::error::Error>> {
    info!("Starting haproxystat v{}", env!("CARGO_PKG_VERSION"));

    let config = StatConfig::load(cli).map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    info!(
        "Loaded configuration: listen={}, udp={}, statsd={}:{}",
        config.listen_address(),
        config.udp,
        config.statsd_host,
        config.statsd_port
    );

    let prefix = expand_prefix(&config.stat_prefix);
    let sink = StatsdSink::connect(
        &config.statsd_host,
        config.statsd_port,
        &prefix,
        config.metrics_queue_capacity,
    )
    .map_err(|e| {
        error!("Failed to set up statsd client: {}", e);
        e
    })?;

    Ok(assemble(config, Arc::new(sink)))
}

/// Wire the pipeline to a sink.
pub fn assemble(config: StatConfig, sink: Arc<dyn MetricsSink>) -> Service {
    let metrics = Arc::new(PipelineMetrics::new());
    let mut pipeline = Pipeline::new(Arc::clone(&metrics));
    pipeline.add_handler(StatsdHandler::new(Arc::clone(&sink)));
    info!("Initialized pipeline with {} handler(s)", pipeline.handler_count());

    Service {
        config,
        pipeline,
        sink,
        metrics,
    }
}
