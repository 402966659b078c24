use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::{debug, info, warn};

use super::{frame_to_line, stopped, ServeError};
use crate::parser::MAX_LINE_SIZE;
use crate::pipeline::Intake;

/// Newline-framed syslog over TCP.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    pub async fn bind(address: &str) -> Result<Self, ServeError> {
        let listener = TcpListener::bind(address).await.map_err(|source| ServeError::Bind {
            protocol: "TCP",
            address: address.to_string(),
            source,
        })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown, then wait for every connection
    /// task to finish.
    pub async fn run(self, intake: Intake, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = self.local_addr() {
            info!("Listening for syslog over TCP on {}", addr);
        }

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Accepted syslog connection");
                        connections.spawn(read_connection(stream, peer, intake.clone(), shutdown.clone()));
                    }
                    Err(e) => warn!("TCP accept error: {}", e),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(self.listener);
        while connections.join_next().await.is_some() {}
        info!("TCP listener stopped");
    }
}

async fn read_connection(
    stream: TcpStream,
    peer: SocketAddr,
    intake: Intake,
    mut shutdown: watch::Receiver<bool>,
) {
    let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), MAX_LINE_SIZE);
    let mut frames = FramedRead::new(stream, codec);

    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            frame = frames.next() => match frame {
                Some(Ok(bytes)) => {
                    if let Some(line) = frame_to_line(&bytes) {
                        intake.offer(line);
                    }
                }
                Some(Err(e)) => {
                    warn!(%peer, error = %e, "Closing syslog connection");
                    break;
                }
                None => break,
            },
        }
    }
    debug!(%peer, "Syslog connection closed");
}
