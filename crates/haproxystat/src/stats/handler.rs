use std::sync::Arc;

use super::key::{emissions, MetricKind};
use super::sink::MetricsSink;
use crate::parser::HttpLog;
use crate::pipeline::RecordHandler;

/// Turns each record into statsd counters and timers.
pub struct StatsdHandler {
    sink: Arc<dyn MetricsSink>,
}

impl StatsdHandler {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }
}

impl RecordHandler for StatsdHandler {
    fn handle(&self, log: &HttpLog) {
        for emission in emissions(log) {
            match emission.kind {
                MetricKind::Counter => self.sink.incr(&emission.name, emission.value),
                // Timer values are never negative; sentinels are filtered in `emissions`
                MetricKind::Timer => self.sink.timing(&emission.name, emission.value.max(0) as u64),
            }
        }
    }

    fn name(&self) -> &str {
        "statsd"
    }
}
