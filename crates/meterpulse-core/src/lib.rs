//! meterpulse core: instrument catalogue, label sets, and the emission loops
//! that drive synthetic samples into a metric sink.
//!
//! This crate knows nothing about OpenTelemetry, gRPC, or a runtime. The
//! harness crate supplies a [`sink::MetricSink`] backed by the OTLP pipeline
//! (or by an in-process registry) and a [`sink::Pacer`] backed by tokio.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Instrument creation failures surface as `PulseError::Instrument`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod instrument;
pub mod labels;
pub mod scenario;
pub mod sink;

/// Shared result type.
pub use error::{PulseError, Result, Stage};
pub use instrument::{InstrumentKind, InstrumentSpec};
pub use labels::LabelSet;
pub use scenario::{EmissionPlan, EmissionReport, Scenario};
pub use sink::{CounterInstrument, HistogramInstrument, MetricSink, Pacer};
