//! Load — config loading from file, environment variables, and flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use super::cli::Cli;
use super::model::StatConfig;

pub const CONFIG_FILE_VAR: &str = "HAPROXYSTAT_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "/etc/haproxystat/haproxystat.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl StatConfig {
    /// Load configuration.
    /// Priority: Command-line flags > Environment Variables > Config File > Defaults
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let explicit = cli.config.clone();
        let config_path = explicit
            .clone()
            .or_else(|| std::env::var(CONFIG_FILE_VAR).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if config_path.exists() || explicit.is_some() {
            tracing::info!("Loading configuration from: {}", config_path.display());
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using defaults", config_path.display());
            Self::default()
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from `HAPROXYSTAT_*` variables found by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("HAPROXYSTAT_BIND_ADDRESS") {
            self.bind_address = bind;
        }
        if let Some(port) = parse_var(&lookup, "HAPROXYSTAT_PORT")? {
            self.port = port;
        }
        if let Some(udp) = parse_var(&lookup, "HAPROXYSTAT_UDP")? {
            self.udp = udp;
        }
        if let Some(host) = lookup("HAPROXYSTAT_STATSD_HOST") {
            self.statsd_host = host;
        }
        if let Some(port) = parse_var(&lookup, "HAPROXYSTAT_STATSD_PORT")? {
            self.statsd_port = port;
        }
        if let Some(prefix) = lookup("HAPROXYSTAT_STAT_PREFIX") {
            self.stat_prefix = prefix;
        }
        Ok(())
    }

    /// Override fields from command-line flags. `--log-level` is read by
    /// the logging setup, not here.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind_addr {
            self.bind_address = bind.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if cli.udp {
            self.udp = true;
        }
        if let Some(host) = &cli.statsd_host {
            self.statsd_host = host.clone();
        }
        if let Some(port) = cli.statsd_port {
            self.statsd_port = port;
        }
        if let Some(prefix) = &cli.stat_prefix {
            self.stat_prefix = prefix.clone();
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.bind_address.is_empty() {
            return invalid("bind_address must not be empty");
        }
        if self.port == 0 {
            return invalid("port must be > 0");
        }
        if self.statsd_host.is_empty() {
            return invalid("statsd_host must not be empty");
        }
        if self.statsd_port == 0 {
            return invalid("statsd_port must be > 0");
        }
        if self.intake_capacity == 0 {
            return invalid("intake_capacity must be > 0");
        }
        if self.metrics_queue_capacity == 0 {
            return invalid("metrics_queue_capacity must be > 0");
        }
        if self.flush_interval_ms == 0 {
            return invalid("flush_interval_ms must be > 0");
        }
        if self.report_interval_secs == 0 {
            return invalid("report_interval_secs must be > 0");
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        None => Ok(None),
    }
}
