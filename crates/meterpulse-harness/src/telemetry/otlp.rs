//! `MetricSink` over an OpenTelemetry `Meter`.

use std::sync::Arc;

use meterpulse_core::error::Result;
use meterpulse_core::instrument::{InstrumentKind, InstrumentSpec};
use meterpulse_core::labels::LabelSet;
use meterpulse_core::sink::{CounterInstrument, HistogramInstrument, MetricSink};
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

/// Prefix scheme-less endpoints with `http://` (plaintext gRPC).
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

pub fn key_values(labels: &LabelSet) -> Vec<KeyValue> {
    labels
        .iter()
        .map(|(k, v)| KeyValue::new(k.to_string(), v.to_string()))
        .collect()
}

struct OtelCounter(Counter<u64>);

impl CounterInstrument for OtelCounter {
    fn add(&self, value: u64, labels: &LabelSet) {
        self.0.add(value, &key_values(labels));
    }
}

struct OtelHistogram(Histogram<f64>);

impl HistogramInstrument for OtelHistogram {
    fn record(&self, value: f64, labels: &LabelSet) {
        self.0.record(value, &key_values(labels));
    }
}

/// Instruments created from one pipeline meter. The SDK deduplicates by name.
#[derive(Clone)]
pub struct OtelSink {
    meter: Meter,
}

impl OtelSink {
    pub fn new(meter: Meter) -> Self {
        Self { meter }
    }
}

impl MetricSink for OtelSink {
    fn counter(&self, spec: &InstrumentSpec) -> Result<Arc<dyn CounterInstrument>> {
        spec.validate()?;
        spec.expect_kind(InstrumentKind::Counter)?;
        let counter = self
            .meter
            .u64_counter(spec.name)
            .with_description(spec.description)
            .build();
        Ok(Arc::new(OtelCounter(counter)))
    }

    fn histogram(&self, spec: &InstrumentSpec) -> Result<Arc<dyn HistogramInstrument>> {
        spec.validate()?;
        spec.expect_kind(InstrumentKind::Histogram)?;
        let histogram = self
            .meter
            .f64_histogram(spec.name)
            .with_description(spec.description)
            .build();
        Ok(Arc::new(OtelHistogram(histogram)))
    }
}
