use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::parser::metrics::{LineRejection, PipelineMetrics};
use crate::parser::{parse_http, HttpLog};

/// A consumer of decoded records.
///
/// Handlers run synchronously on the pipeline worker, in registration
/// order, and must not block for long.
pub trait RecordHandler: Send + Sync {
    fn handle(&self, log: &HttpLog);

    /// Name used when reporting a panic.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> RecordHandler for F
where
    F: Fn(&HttpLog) + Send + Sync,
{
    fn handle(&self, log: &HttpLog) {
        self(log)
    }
}

/// What happened to one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Decoded and handed to every handler
    Dispatched,
    /// Not an HTTP log line
    NoMatch,
    /// HTTP log line with a malformed request segment
    DecodeFailed,
}

pub struct Pipeline {
    handlers: Vec<Box<dyn RecordHandler>>,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            handlers: Vec::new(),
            metrics,
        }
    }

    /// Append a handler; it runs after every handler added before it.
    pub fn add_handler<H>(&mut self, handler: H)
    where
        H: RecordHandler + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Parse, decode and dispatch one line.
    ///
    /// Never fails: unmatched and malformed lines are counted and dropped.
    pub fn process_line(&self, line: &str) -> LineOutcome {
        let started = Instant::now();
        match parse_http(line) {
            Ok(Some(log)) => {
                let elapsed = started.elapsed().as_nanos() as u64;
                self.metrics.record_dispatch(elapsed);
                self.dispatch(&log);
                LineOutcome::Dispatched
            }
            Ok(None) => {
                trace!(line, "Skipping line that is not an HTTP log");
                self.metrics.record_rejection(LineRejection::NoMatch);
                LineOutcome::NoMatch
            }
            Err(e) => {
                debug!(error = %e, "Dropping malformed HTTP log line");
                self.metrics.record_rejection(LineRejection::DecodeError);
                LineOutcome::DecodeFailed
            }
        }
    }

    /// Invoke every handler; a panicking handler is logged and skipped.
    fn dispatch(&self, log: &HttpLog) {
        for handler in &self.handlers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(log)));
            if let Err(payload) = result {
                self.metrics.record_handler_panic();
                error!(
                    handler = handler.name(),
                    panic = panic_message(payload.as_ref()),
                    "Record handler panicked"
                );
            }
        }
    }

    /// Drain the intake until every producer is gone.
    pub async fn run(self, mut rx: mpsc::Receiver<String>) {
        info!("Pipeline worker started with {} handler(s)", self.handlers.len());
        while let Some(line) = rx.recv().await {
            self.process_line(&line);
        }
        info!("Intake closed, pipeline worker drained");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const LINE: &str = r#"192.168.9.185:56276 [29/May/2015:10:36:47.766] Service1~ Service1/host-1 2/0/0/10/12 200 423 - - ---- 282/36/0/0/0 0/0 {d7d9b784} {d7d9b784} "POST /path/to/app HTTP/1.1" ECDHE-RSA-AES128-GCM-SHA256/TLSv1.2"#;

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(PipelineMetrics::new()))
    }

    #[test]
    fn test_dispatches_to_handlers_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = pipeline();

        let first = Arc::clone(&seen);
        pipeline.add_handler(move |log: &HttpLog| {
            first.lock().unwrap().push(format!("first:{}", log.request.method));
        });
        let second = Arc::clone(&seen);
        pipeline.add_handler(move |log: &HttpLog| {
            second.lock().unwrap().push(format!("second:{}", log.status_code));
        });

        assert_eq!(pipeline.process_line(LINE), LineOutcome::Dispatched);
        assert_eq!(*seen.lock().unwrap(), vec!["first:POST", "second:200"]);
        assert_eq!(pipeline.metrics().snapshot().records_dispatched, 1);
    }

    #[test]
    fn test_no_match_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline();
        let c = Arc::clone(&calls);
        pipeline.add_handler(move |_: &HttpLog| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(pipeline.process_line("Proxy fe started."), LineOutcome::NoMatch);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.metrics().snapshot().lines_unmatched, 1);
    }

    #[test]
    fn test_badreq_does_not_panic_and_pipeline_continues() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline();
        let c = Arc::clone(&calls);
        pipeline.add_handler(move |_: &HttpLog| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let bad = LINE.replace("POST /path/to/app HTTP/1.1", "<BADREQ>");
        assert_eq!(pipeline.process_line(&bad), LineOutcome::DecodeFailed);
        assert_eq!(pipeline.process_line(LINE), LineOutcome::Dispatched);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snap = pipeline.metrics().snapshot();
        assert_eq!(snap.decode_errors, 1);
        assert_eq!(snap.records_dispatched, 1);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline();
        pipeline.add_handler(|log: &HttpLog| {
            if log.status_code == 200 {
                panic!("boom");
            }
        });
        let c = Arc::clone(&calls);
        pipeline.add_handler(move |_: &HttpLog| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(pipeline.process_line(LINE), LineOutcome::Dispatched);
        assert_eq!(pipeline.process_line(LINE), LineOutcome::Dispatched);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.metrics().snapshot().handler_panics, 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[tokio::test]
    async fn test_run_drains_queue_after_close() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline();
        let c = Arc::clone(&calls);
        pipeline.add_handler(move |_: &HttpLog| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let (tx, rx) = mpsc::channel(8);
        tx.send(LINE.to_string()).await.unwrap();
        tx.send("noise".to_string()).await.unwrap();
        tx.send(LINE.to_string()).await.unwrap();
        drop(tx);

        pipeline.run(rx).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
