use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::instrument::InstrumentSpec;
use crate::labels::LabelSet;

/// Monotonic counter handle.
pub trait CounterInstrument: Send + Sync {
    fn add(&self, value: u64, labels: &LabelSet);
}

/// Distribution handle.
pub trait HistogramInstrument: Send + Sync {
    fn record(&self, value: f64, labels: &LabelSet);
}

/// Source of instruments. Implemented by the OTLP pipeline and by the
/// in-process registry.
///
/// Implementations must validate the spec and refuse a kind that does not
/// match `spec.kind`.
pub trait MetricSink: Send + Sync {
    fn counter(&self, spec: &InstrumentSpec) -> Result<Arc<dyn CounterInstrument>>;
    fn histogram(&self, spec: &InstrumentSpec) -> Result<Arc<dyn HistogramInstrument>>;
}

/// Delay source between two samples.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}
