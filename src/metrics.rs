use std::sync::Arc;
use std::time::{Duration, Instant};

/// Observer for engine-level events.
///
/// Implementations must be cheap; they run inline on the query path.
pub trait EngineMetrics: Send + Sync {
    fn record_ingest(&self, latency: Duration, accepted: usize, rejected: usize);
    fn record_rebuild(&self, latency: Duration, vectors: usize);
    fn record_query(&self, latency: Duration, sources: usize, degraded: bool);
    /// A zero-vector embedding or a degraded generator result; `stage` names where.
    fn record_degraded(&self, stage: &'static str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl EngineMetrics for NoopMetrics {
    fn record_ingest(&self, _: Duration, _: usize, _: usize) {}
    fn record_rebuild(&self, _: Duration, _: usize) {}
    fn record_query(&self, _: Duration, _: usize, _: bool) {}
    fn record_degraded(&self, _: &'static str) {}
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn EngineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start(recorder: &Arc<dyn EngineMetrics>) -> Self {
        Self {
            recorder: Arc::clone(recorder),
            start: Instant::now(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub(crate) fn record_ingest(self, accepted: usize, rejected: usize) {
        self.recorder
            .record_ingest(self.start.elapsed(), accepted, rejected);
    }

    pub(crate) fn record_rebuild(self, vectors: usize) {
        self.recorder.record_rebuild(self.start.elapsed(), vectors);
    }

    pub(crate) fn record_query(self, sources: usize, degraded: bool) {
        self.recorder
            .record_query(self.start.elapsed(), sources, degraded);
    }
}
