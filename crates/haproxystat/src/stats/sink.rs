//! Sink — the statsd boundary.
//!
//! Emission is fire-and-forget: the `MetricsSink` methods return nothing and
//! never block on the network. Failures are logged and the metric is lost.

use std::net::{ToSocketAddrs, UdpSocket};

use cadence::prelude::*;
use cadence::{BufferedUdpMetricSink, MetricError, MetricSink, QueuingMetricSink, StatsdClient};
use thiserror::Error;
use tracing::{debug, info};

use super::key::sanitize;

/// Placeholder in the configured prefix replaced with the local hostname.
pub const HOST_PLACEHOLDER: &str = "%HOST%";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Invalid statsd address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Statsd address {0} did not resolve")]
    Unresolved(String),

    #[error("Failed to create statsd socket: {0}")]
    Socket(#[from] std::io::Error),

    #[error("Failed to create statsd sink: {0}")]
    Metric(#[from] MetricError),
}

/// The two emission operations the metric handler needs.
pub trait MetricsSink: Send + Sync {
    fn incr(&self, name: &str, delta: i64);

    fn timing(&self, name: &str, millis: u64);

    /// Push out anything buffered. No-op by default.
    fn flush(&self) {}
}

/// Statsd client writing over UDP.
///
/// Metrics are queued (bounded; new metrics are dropped while full) and
/// written from a background thread into a packet buffer that is sent when
/// full or on [`MetricsSink::flush`].
pub struct StatsdSink {
    client: StatsdClient,
}

impl StatsdSink {
    /// Bind a local UDP socket and point it at `host:port`.
    ///
    /// Fails if the address does not resolve or the socket cannot be
    /// created; the service has no use without a metrics destination.
    pub fn connect(host: &str, port: u16, prefix: &str, queue_capacity: usize) -> Result<Self, SinkError> {
        let address = format!("{}:{}", host, port);
        let target = address
            .to_socket_addrs()
            .map_err(|source| SinkError::Address { address: address.clone(), source })?
            .next()
            .ok_or_else(|| SinkError::Unresolved(address.clone()))?;

        let bind = if target.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;

        let buffered = BufferedUdpMetricSink::from(target, socket)?;
        let queuing = QueuingMetricSink::with_capacity(buffered, queue_capacity);

        info!("Reporting metrics to statsd at {} (prefix: {:?})", target, prefix);
        Ok(Self::from_sink(prefix, queuing))
    }

    /// Build on any cadence sink. Used with `SpyMetricSink` in tests.
    pub fn from_sink<T>(prefix: &str, sink: T) -> Self
    where
        T: MetricSink + Sync + Send + std::panic::RefUnwindSafe + 'static,
    {
        let client = StatsdClient::builder(prefix, sink)
            .with_error_handler(|error| debug!(%error, "Error sending a metric"))
            .build();
        Self { client }
    }
}

impl MetricsSink for StatsdSink {
    fn incr(&self, name: &str, delta: i64) {
        if let Err(error) = self.client.count(name, delta) {
            debug!(%error, metric = name, "Dropped counter");
        }
    }

    fn timing(&self, name: &str, millis: u64) {
        if let Err(error) = self.client.time(name, millis) {
            debug!(%error, metric = name, "Dropped timer");
        }
    }

    fn flush(&self) {
        if let Err(error) = self.client.flush() {
            debug!(%error, "Failed to flush metrics");
        }
    }
}

/// Replace [`HOST_PLACEHOLDER`] with the sanitized local hostname.
///
/// The hostname is sanitized so its dots do not add hierarchy levels.
pub fn expand_prefix(prefix: &str) -> String {
    if !prefix.contains(HOST_PLACEHOLDER) {
        return prefix.to_string();
    }
    let host = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!("Could not determine hostname for stat prefix: {}", e);
            "unknown".to_string()
        }
    };
    expand_prefix_with(prefix, &host)
}

fn expand_prefix_with(prefix: &str, host: &str) -> String {
    prefix.replace(HOST_PLACEHOLDER, &sanitize(host))
}
