use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{info, warn};

use super::{frame_to_line, stopped, ServeError};
use crate::pipeline::Intake;

// Largest UDP payload
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Syslog over UDP, one or more newline-separated frames per datagram.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(address: &str) -> Result<Self, ServeError> {
        let socket = UdpSocket::bind(address).await.map_err(|source| ServeError::Bind {
            protocol: "UDP",
            address: address.to_string(),
            source,
        })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(self, intake: Intake, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = self.local_addr() {
            info!("Listening for syslog over UDP on {}", addr);
        }

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, _peer)) => {
                        for frame in buf[..len].split(|&b| b == b'\n') {
                            if let Some(line) = frame_to_line(frame) {
                                intake.offer(line);
                            }
                        }
                    }
                    Err(e) => warn!("UDP receive error: {}", e),
                },
            }
        }
        info!("UDP listener stopped");
    }
}
