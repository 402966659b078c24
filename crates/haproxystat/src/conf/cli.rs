//! Cli — command-line flags. Every flag overrides the file and environment.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "haproxystat",
    version,
    about = "Receive HAProxy HTTP logs over syslog and report them to statsd"
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on for syslog
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Port to listen on for syslog
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Also accept syslog datagrams over UDP
    #[arg(long)]
    pub udp: bool,

    /// Host to send statsd metrics to
    #[arg(long)]
    pub statsd_host: Option<String>,

    /// Port to send statsd metrics to
    #[arg(long)]
    pub statsd_port: Option<u16>,

    /// Prefix for every metric; %HOST% expands to the local hostname
    #[arg(long)]
    pub stat_prefix: Option<String>,

    /// Default log level when RUST_LOG is not set
    #[arg(long)]
    pub log_level: Option<String>,
}
