//! Serve — bind the syslog listeners, run the pipeline, shut down cleanly.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::conf::StatConfig;
use crate::job;
use crate::pipeline::Intake;
use crate::runtime::boot::Service;
use crate::runtime::stop::shutdown_signal;
use crate::transport::{ServeError, TcpTransport, UdpTransport};

/// Bound but not yet accepting.
pub struct Listeners {
    tcp: TcpTransport,
    udp: Option<UdpTransport>,
}

impl Listeners {
    /// Bind TCP, and UDP when enabled, on the configured address.
    pub async fn bind(config: &StatConfig) -> Result<Self, ServeError> {
        let address = config.listen_address();
        let tcp = TcpTransport::bind(&address).await?;
        let udp = if config.udp {
            Some(UdpTransport::bind(&address).await?)
        } else {
            None
        };
        Ok(Self { tcp, udp })
    }

    pub fn tcp_addr(&self) -> std::io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn udp_addr(&self) -> Option<std::io::Result<SocketAddr>> {
        self.udp.as_ref().map(|udp| udp.local_addr())
    }
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(service: Service) -> Result<(), Box<dyn std::error::Error>> {
    let listeners = Listeners::bind(&service.config).await.map_err(|e| {
        error!("{}", e);
        e
    })?;
    run(service, listeners, shutdown_signal()).await?;
    Ok(())
}

/// Run until `signal` resolves, then stop the listeners, drain the intake
/// queue through the pipeline, and flush the sink.
pub async fn run<S>(service: Service, listeners: Listeners, signal: S) -> Result<(), ServeError>
where
    S: Future<Output = ()>,
{
    let Service {
        config,
        pipeline,
        sink,
        metrics,
    } = service;

    let (intake, rx) = Intake::channel(config.intake_capacity, Arc::clone(&metrics));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = tokio::spawn(pipeline.run(rx));

    let mut tasks = JoinSet::new();
    tasks.spawn(listeners.tcp.run(intake.clone(), shutdown_rx.clone()));
    if let Some(udp) = listeners.udp {
        tasks.spawn(udp.run(intake.clone(), shutdown_rx.clone()));
    }
    // Only the listeners hold the intake now; the worker ends once they do
    drop(intake);

    tasks.spawn(job::flush_metrics(
        Arc::clone(&sink),
        Duration::from_millis(config.flush_interval_ms),
        shutdown_rx.clone(),
    ));
    tasks.spawn(job::report_pipeline_stats(
        Arc::clone(&metrics),
        Duration::from_secs(config.report_interval_secs),
        shutdown_rx,
    ));

    info!("========================================");
    info!("haproxystat is ready!");
    info!("Syslog: {} (tcp{})", config.listen_address(), if config.udp { "+udp" } else { "" });
    info!("Statsd: {}:{}", config.statsd_host, config.statsd_port);
    info!("Press Ctrl+C to shutdown gracefully");
    info!("========================================");

    signal.await;
    // Receivers are owned by the tasks; a send error only means they are gone
    let _ = shutdown_tx.send(true);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Background task failed: {}", e);
        }
    }

    worker.await?;
    sink.flush();

    let snap = metrics.snapshot();
    info!(
        received = snap.lines_received,
        dispatched = snap.records_dispatched,
        dropped = snap.lines_dropped,
        "Shutdown complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::metrics::PipelineMetrics;
    use crate::runtime::boot::assemble;
    use crate::stats::StatsdSink;
    use cadence::SpyMetricSink;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpStream, UdpSocket};
    use tokio::sync::oneshot;

    const LINE: &str = r#"192.168.9.185:56276 [29/May/2015:10:36:47.766] Service1~ Service1/host-1 2/0/0/10/12 200 423 - - ---- 282/36/0/0/0 0/0 {d7d9b784} {d7d9b784} "POST /path/to/app HTTP/1.1" ECDHE-RSA-AES128-GCM-SHA256/TLSv1.2"#;

    fn test_config(udp: bool) -> StatConfig {
        StatConfig {
            port: 0,
            udp,
            ..Default::default()
        }
    }

    async fn wait_for_received(metrics: &PipelineMetrics, count: u64) {
        for _ in 0..200 {
            if metrics.snapshot().lines_received >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("lines never arrived");
    }

    #[tokio::test]
    async fn test_tcp_line_becomes_statsd_metrics() {
        let (packets, spy) = SpyMetricSink::new();
        let service = assemble(test_config(false), Arc::new(StatsdSink::from_sink("haproxy", spy)));
        let metrics = Arc::clone(&service.metrics);

        let listeners = Listeners::bind(&service.config).await.unwrap();
        let addr = listeners.tcp_addr().unwrap();
        assert!(listeners.udp_addr().is_none());

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(run(service, listeners, async move {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let frame = format!("<134>May 29 10:36:47 lb-01 haproxy[1234]: {}\nnot an http log\n", LINE);
        client.write_all(frame.as_bytes()).await.unwrap();
        wait_for_received(&metrics, 2).await;

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.records_dispatched, 1);
        assert_eq!(snap.lines_unmatched, 1);

        let sent: Vec<String> = packets
            .try_iter()
            .map(|bytes| String::from_utf8(bytes).unwrap())
            .collect();
        assert!(sent.contains(&"haproxy.Service1.Service1.host-1.hits:1|c".to_string()));
        assert!(sent.contains(&"haproxy.Service1.ssl.TLSv1_2.ECDHE-RSA-AES128-GCM-SHA256:1|c".to_string()));
    }

    #[tokio::test]
    async fn test_udp_listener_enabled() {
        let (packets, spy) = SpyMetricSink::new();
        let service = assemble(test_config(true), Arc::new(StatsdSink::from_sink("", spy)));
        let metrics = Arc::clone(&service.metrics);

        let listeners = Listeners::bind(&service.config).await.unwrap();
        let addr = listeners.udp_addr().unwrap().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(run(service, listeners, async move {
            let _ = stop_rx.await;
        }));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(LINE.as_bytes(), addr).await.unwrap();
        wait_for_received(&metrics, 1).await;

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();

        assert_eq!(metrics.snapshot().records_dispatched, 1);
        assert!(packets.try_iter().count() > 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = Listeners::bind(&test_config(false)).await.unwrap();
        let taken = first.tcp_addr().unwrap();
        let config = StatConfig {
            bind_address: taken.ip().to_string(),
            port: taken.port(),
            ..Default::default()
        };
        assert!(Listeners::bind(&config).await.is_err());
    }
}
