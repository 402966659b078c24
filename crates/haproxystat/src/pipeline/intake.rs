use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use crate::parser::metrics::{LineRejection, PipelineMetrics};

/// Producer side of the bounded line queue.
///
/// Cloned into every transport task. When the queue is full the newest line
/// is dropped and counted; producers never wait on the worker.
#[derive(Clone)]
pub struct Intake {
    tx: mpsc::Sender<String>,
    metrics: Arc<PipelineMetrics>,
}

impl Intake {
    /// Create the queue. The receiver goes to [`super::Pipeline::run`].
    pub fn channel(capacity: usize, metrics: Arc<PipelineMetrics>) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, metrics }, rx)
    }

    /// Enqueue a line without waiting. Returns `false` if it was dropped.
    pub fn offer(&self, line: String) -> bool {
        self.metrics.record_received();
        match self.tx.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Intake queue full, dropping line");
                self.metrics.record_rejection(LineRejection::Dropped);
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Intake queue closed, dropping line");
                self.metrics.record_rejection(LineRejection::Dropped);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offer_delivers_in_order() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (intake, mut rx) = Intake::channel(4, Arc::clone(&metrics));

        assert!(intake.offer("a".to_string()));
        assert!(intake.offer("b".to_string()));

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
        assert_eq!(metrics.snapshot().lines_received, 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (intake, mut rx) = Intake::channel(2, Arc::clone(&metrics));

        assert!(intake.offer("1".to_string()));
        assert!(intake.offer("2".to_string()));
        assert!(!intake.offer("3".to_string()));

        let snap = metrics.snapshot();
        assert_eq!(snap.lines_received, 3);
        assert_eq!(snap.lines_dropped, 1);

        assert_eq!(rx.recv().await.as_deref(), Some("1"));
        assert_eq!(rx.recv().await.as_deref(), Some("2"));
        drop(intake);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_closed_queue_counts_drop() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (intake, rx) = Intake::channel(2, Arc::clone(&metrics));
        drop(rx);

        assert!(!intake.offer("late".to_string()));
        assert_eq!(metrics.snapshot().lines_dropped, 1);
    }
}
