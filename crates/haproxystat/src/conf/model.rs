//! Model — StatConfig and its defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatConfig {
    /// Address the syslog listeners bind to
    pub bind_address: String,
    pub port: u16,
    /// Also listen for syslog datagrams on the same address and port
    pub udp: bool,
    pub statsd_host: String,
    pub statsd_port: u16,
    /// Prepended to every metric; `%HOST%` is replaced with the hostname
    pub stat_prefix: String,
    /// Lines buffered between the listeners and the pipeline worker
    pub intake_capacity: usize,
    /// Metrics buffered between the handler and the statsd socket
    pub metrics_queue_capacity: usize,
    pub flush_interval_ms: u64,
    pub report_interval_secs: u64,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 10514,
            udp: false,
            statsd_host: "localhost".to_string(),
            statsd_port: 8125,
            stat_prefix: "haproxy".to_string(),
            intake_capacity: 10_000,
            metrics_queue_capacity: 100_000,
            flush_interval_ms: 1000,
            report_interval_secs: 60,
        }
    }
}

impl StatConfig {
    /// `host:port` for the syslog listeners, bracketing bare IPv6 hosts.
    pub fn listen_address(&self) -> String {
        join_host_port(&self.bind_address, self.port)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
