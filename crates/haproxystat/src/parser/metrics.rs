use std::sync::atomic::{AtomicU64, Ordering};

/// Why a line left the pipeline without reaching the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRejection {
    /// Did not match the HTTP log grammar
    NoMatch,
    /// Matched, but a required segment was malformed
    DecodeError,
    /// Intake queue was full or closed
    Dropped,
}

/// A wrapper that forces the wrapped data onto its own cache line(s).
///
/// The intake counters are bumped by every connection task while the
/// outcome counters are bumped by the worker; keeping the groups on
/// separate 64-byte lines stops them from invalidating each other.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Updated by transport tasks (many producers)
#[derive(Debug, Default)]
pub struct IntakeMetrics {
    pub received: AtomicU64,
    pub dropped: AtomicU64,
}

/// Updated by the worker, once per line
#[derive(Debug, Default)]
pub struct OutcomeMetrics {
    pub dispatched: AtomicU64,
    pub unmatched: AtomicU64,
    pub decode_errors: AtomicU64,
}

#[derive(Debug, Default)]
pub struct TotalMetrics {
    pub decode_time_nanos: AtomicU64,
    pub decoded: AtomicU64,
}

#[derive(Debug, Default)]
pub struct HandlerMetrics {
    pub panics: AtomicU64,
}

/// Counters describing what the pipeline did with the lines it was given.
///
/// All operations use `Ordering::Relaxed`; `snapshot()` is not transactional
/// across fields, which is fine for periodic reporting.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub intake: CacheAligned<IntakeMetrics>,
    pub outcomes: CacheAligned<OutcomeMetrics>,
    pub totals: CacheAligned<TotalMetrics>,
    pub handlers: CacheAligned<HandlerMetrics>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_received(&self) {
        self.intake.0.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded line that was handed to the handlers.
    #[inline]
    pub fn record_dispatch(&self, decode_nanos: u64) {
        self.outcomes.0.dispatched.fetch_add(1, Ordering::Relaxed);
        self.totals.0.decoded.fetch_add(1, Ordering::Relaxed);
        self.totals.0.decode_time_nanos.fetch_add(decode_nanos, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejection(&self, rejection: LineRejection) {
        match rejection {
            LineRejection::NoMatch => self.outcomes.0.unmatched.fetch_add(1, Ordering::Relaxed),
            LineRejection::DecodeError => self.outcomes.0.decode_errors.fetch_add(1, Ordering::Relaxed),
            LineRejection::Dropped => self.intake.0.dropped.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub fn record_handler_panic(&self) {
        self.handlers.0.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let dispatched = self.outcomes.0.dispatched.load(Ordering::Relaxed);
        let unmatched = self.outcomes.0.unmatched.load(Ordering::Relaxed);
        let decode_errors = self.outcomes.0.decode_errors.load(Ordering::Relaxed);
        let decoded = self.totals.0.decoded.load(Ordering::Relaxed);
        let decode_time_ns = self.totals.0.decode_time_nanos.load(Ordering::Relaxed);

        // Unmatched lines are expected noise; only count lines that looked
        // like HTTP logs.
        let http_lines = dispatched + decode_errors;

        PipelineSnapshot {
            lines_received: self.intake.0.received.load(Ordering::Relaxed),
            lines_dropped: self.intake.0.dropped.load(Ordering::Relaxed),
            records_dispatched: dispatched,
            lines_unmatched: unmatched,
            decode_errors,
            handler_panics: self.handlers.0.panics.load(Ordering::Relaxed),
            avg_decode_time_us: if decoded > 0 {
                (decode_time_ns as f64 / decoded as f64) / 1000.0
            } else {
                0.0
            },
            decode_success_rate: if http_lines > 0 {
                dispatched as f64 / http_lines as f64
            } else {
                1.0
            },
        }
    }
}

/// A read-only snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub lines_received: u64,
    pub lines_dropped: u64,
    pub records_dispatched: u64,
    pub lines_unmatched: u64,
    pub decode_errors: u64,
    pub handler_panics: u64,
    pub avg_decode_time_us: f64,
    pub decode_success_rate: f64,
}
