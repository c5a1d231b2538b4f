//! Metric sinks and the OTLP pipeline behind them.

pub mod local;
pub mod otlp;
pub mod pipeline;
pub mod probe;

pub use local::LocalRegistry;
pub use otlp::OtelSink;
pub use pipeline::{MetricsPipeline, PipelineState};
