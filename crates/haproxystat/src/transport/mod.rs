//! Transport — syslog listeners feeding the intake queue.
//!
//! HAProxy ships its logs as syslog frames. The TCP listener reads
//! newline-delimited frames; the optional UDP listener takes one or more
//! frames per datagram. Either way the syslog header is stripped and the
//! remaining message is offered to the pipeline.

pub mod tcp;
pub mod udp;

use thiserror::Error;
use tokio::sync::watch;
use tracing::trace;

use crate::parser::syslog;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to bind {protocol} listener on {address}: {source}")]
    Bind {
        protocol: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Turn one raw frame into the HAProxy message it carries.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
/// Returns `None` for blank frames.
pub fn frame_to_line(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let message = syslog::parse(text.trim_end_matches(['\r', '\n', '\0']));
    if message.content.trim().is_empty() {
        return None;
    }
    trace!(
        priority = message.priority,
        hostname = message.hostname,
        app = message.app_name,
        "Received syslog frame"
    );
    Some(message.content.to_string())
}

/// Resolves once shutdown has been requested or the sender is gone.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
