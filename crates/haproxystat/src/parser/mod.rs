/// HAProxy HTTP log parsing
///
/// Turns one syslog frame into a typed [`HttpLog`].
///
/// # Architecture
///
/// - `syslog.rs`: strips the syslog header, leaving the HAProxy message
/// - `grammar.rs`: the compiled line grammar and its named captures
/// - `decode.rs`: field-by-field conversion of captures into an `HttpLog`
/// - `model.rs`: the record types and `DecodeError`
/// - `metrics.rs`: pipeline counters
///
/// # Outcomes
///
/// A line either decodes, does not match (routine, never an error), or
/// matches with a malformed request segment (`DecodeError`). Nothing in
/// this module panics on arbitrary input or performs I/O.

pub mod grammar;
pub mod decode;
pub mod model;
pub mod metrics;
pub mod syslog;

// Re-export commonly used types
pub use decode::parse_http;
pub use model::{DecodeError, Elapsed, HttpLog, HttpRequest, SslInfo};

// Constants
pub const MAX_LINE_SIZE: usize = 65_536; // 64KiB
