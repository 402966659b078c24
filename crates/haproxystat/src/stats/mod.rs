//! Stats — metric names derived from HTTP logs and the statsd sink.

pub mod key;
pub mod sink;
pub mod handler;

pub use handler::StatsdHandler;
pub use key::{emissions, sanitize, sanitize_lower, Emission, MetricKind};
pub use sink::{MetricsSink, SinkError, StatsdSink};
