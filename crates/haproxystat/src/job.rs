//! Job — periodic background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::parser::metrics::PipelineMetrics;
use crate::stats::MetricsSink;
use crate::transport::stopped;

/// Flush the metrics sink on a fixed interval so quiet periods still
/// deliver whatever is buffered. Flushes once more on shutdown.
pub async fn flush_metrics(sink: Arc<dyn MetricsSink>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            _ = ticker.tick() => sink.flush(),
        }
    }
    sink.flush();
}

/// Log a pipeline snapshot every `interval`.
///
/// Warns when lines were dropped since the previous report.
pub async fn report_pipeline_stats(
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    let mut last_dropped: u64 = 0;
    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            _ = ticker.tick() => {
                let snap = metrics.snapshot();
                info!(
                    received = snap.lines_received,
                    dispatched = snap.records_dispatched,
                    unmatched = snap.lines_unmatched,
                    decode_errors = snap.decode_errors,
                    handler_panics = snap.handler_panics,
                    avg_decode_us = snap.avg_decode_time_us,
                    "Pipeline stats"
                );
                let dropped = snap.lines_dropped.saturating_sub(last_dropped);
                if dropped > 0 {
                    warn!("Intake queue full: dropped {} line(s) since last report", dropped);
                }
                last_dropped = snap.lines_dropped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        flushes: AtomicUsize,
    }

    impl MetricsSink for CountingSink {
        fn incr(&self, _: &str, _: i64) {}

        fn timing(&self, _: &str, _: u64) {}

        fn flush(&self) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_ticks_and_final_flush() {
        let sink = Arc::new(CountingSink::default());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(flush_metrics(sink.clone(), Duration::from_millis(100), rx));

        time::sleep(Duration::from_millis(250)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Ticks at 0, 100 and 200 ms, then the final flush
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_stops_on_shutdown() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(report_pipeline_stats(metrics, Duration::from_secs(60), rx));

        time::sleep(Duration::from_secs(61)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
