//! Emission loops.
//!
//! Each scenario obtains one instrument from a [`MetricSink`] and records one
//! sample per iteration, pausing through a [`Pacer`] in between. The four
//! scenarios differ only in the instrument and in how the value and labels of
//! a sample are drawn.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::error::{PulseError, Result};
use crate::instrument::{
    InstrumentKind, InstrumentSpec, EXPLICIT_BOUNDARY_LATENCY, MDVAR_COUNTS, REQUEST_COUNTS, REQUEST_LATENCY,
};
use crate::labels::{LabelSet, SQL_HASH};
use crate::sink::{CounterInstrument, HistogramInstrument, MetricSink, Pacer};

pub const DEFAULT_ITERATIONS: u32 = 2500;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Values of the randomized `sqlhash` dimension.
pub const DIMENSION_RANGE: Range<u32> = 0..1500;
/// Values recorded by the histogram scenarios (integral, as `f64`).
pub const LATENCY_RANGE: Range<u32> = 1..15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Counter, static labels.
    FixedLabelCounter,
    /// Counter, static labels plus one random `sqlhash` label.
    VariableDimensionCounter,
    /// Histogram, static labels.
    DefaultHistogram,
    /// Histogram whose name signals the pipeline's explicit boundaries.
    ExplicitBoundaryHistogram,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::FixedLabelCounter,
        Scenario::VariableDimensionCounter,
        Scenario::DefaultHistogram,
        Scenario::ExplicitBoundaryHistogram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::FixedLabelCounter => "fixed_label_counter",
            Scenario::VariableDimensionCounter => "variable_dimension_counter",
            Scenario::DefaultHistogram => "default_histogram",
            Scenario::ExplicitBoundaryHistogram => "explicit_boundary_histogram",
        }
    }

    pub fn instrument(self) -> InstrumentSpec {
        match self {
            Scenario::FixedLabelCounter => REQUEST_COUNTS,
            Scenario::VariableDimensionCounter => MDVAR_COUNTS,
            Scenario::DefaultHistogram => REQUEST_LATENCY,
            Scenario::ExplicitBoundaryHistogram => EXPLICIT_BOUNDARY_LATENCY,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.as_str() == s)
            .ok_or_else(|| PulseError::Config(format!("unknown scenario: {s}")))
    }
}

/// Iteration count and pacing of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionPlan {
    pub iterations: u32,
    pub delay: Duration,
}

impl Default for EmissionPlan {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            delay: DEFAULT_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionReport {
    pub scenario: Scenario,
    pub instrument: &'static str,
    pub recorded: u32,
}

enum Recorder {
    Counter(Arc<dyn CounterInstrument>),
    Histogram(Arc<dyn HistogramInstrument>),
}

/// Run `scenario` to completion against `sink`.
///
/// Records exactly `plan.iterations` samples and pauses `plan.delay` after
/// each one. Instrument creation errors are returned before anything is
/// recorded.
pub async fn run<S, P, R>(
    scenario: Scenario,
    sink: &S,
    pacer: &P,
    rng: &mut R,
    plan: EmissionPlan,
) -> Result<EmissionReport>
where
    S: MetricSink + ?Sized,
    P: Pacer + ?Sized,
    R: Rng + Send,
{
    let spec = scenario.instrument();
    let recorder = match spec.kind {
        InstrumentKind::Counter => Recorder::Counter(sink.counter(&spec)?),
        InstrumentKind::Histogram => Recorder::Histogram(sink.histogram(&spec)?),
    };

    tracing::info!(
        scenario = %scenario,
        instrument = spec.name,
        iterations = plan.iterations,
        delay_ms = plan.delay.as_millis() as u64,
        "emission started"
    );

    let common = LabelSet::common();
    for i in 1..=plan.iterations {
        match &recorder {
            Recorder::Counter(counter) => {
                if scenario == Scenario::VariableDimensionCounter {
                    let hash = rng.gen_range(DIMENSION_RANGE);
                    counter.add(1, &common.clone().with(SQL_HASH, hash.to_string()));
                } else {
                    counter.add(1, &common);
                }
            }
            Recorder::Histogram(histogram) => {
                let value = f64::from(rng.gen_range(LATENCY_RANGE));
                histogram.record(value, &common);
            }
        }

        pacer.pause(plan.delay).await;
        tracing::info!(scenario = %scenario, iteration = i, "sample recorded");
    }

    Ok(EmissionReport {
        scenario,
        instrument: spec.name,
        recorded: plan.iterations,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::labels::{CLIENT, METHOD};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sample {
        Add(&'static str, u64, LabelSet),
        Record(&'static str, f64, LabelSet),
    }

    #[derive(Default)]
    struct RecordingSink {
        samples: Arc<Mutex<Vec<Sample>>>,
    }

    struct RecCounter(&'static str, Arc<Mutex<Vec<Sample>>>);
    struct RecHistogram(&'static str, Arc<Mutex<Vec<Sample>>>);

    impl CounterInstrument for RecCounter {
        fn add(&self, value: u64, labels: &LabelSet) {
            self.1.lock().unwrap().push(Sample::Add(self.0, value, labels.clone()));
        }
    }

    impl HistogramInstrument for RecHistogram {
        fn record(&self, value: f64, labels: &LabelSet) {
            self.1.lock().unwrap().push(Sample::Record(self.0, value, labels.clone()));
        }
    }

    impl MetricSink for RecordingSink {
        fn counter(&self, spec: &InstrumentSpec) -> Result<Arc<dyn CounterInstrument>> {
            spec.expect_kind(InstrumentKind::Counter)?;
            Ok(Arc::new(RecCounter(spec.name, self.samples.clone())))
        }
        fn histogram(&self, spec: &InstrumentSpec) -> Result<Arc<dyn HistogramInstrument>> {
            spec.expect_kind(InstrumentKind::Histogram)?;
            Ok(Arc::new(RecHistogram(spec.name, self.samples.clone())))
        }
    }

    impl RecordingSink {
        fn take(&self) -> Vec<Sample> {
            std::mem::take(&mut *self.samples.lock().unwrap())
        }
    }

    #[derive(Default)]
    struct RecordingPacer {
        pauses: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, delay: Duration) {
            self.pauses.lock().unwrap().push(delay);
        }
    }

    struct RejectingSink;

    impl MetricSink for RejectingSink {
        fn counter(&self, spec: &InstrumentSpec) -> Result<Arc<dyn CounterInstrument>> {
            Err(PulseError::instrument(spec.name, "registry closed"))
        }
        fn histogram(&self, spec: &InstrumentSpec) -> Result<Arc<dyn HistogramInstrument>> {
            Err(PulseError::instrument(spec.name, "registry closed"))
        }
    }

    fn plan(iterations: u32) -> EmissionPlan {
        EmissionPlan {
            iterations,
            ..EmissionPlan::default()
        }
    }

    fn is_common(labels: &LabelSet) -> bool {
        labels.get(METHOD) == Some("repl") && labels.get(CLIENT) == Some("cli")
    }

    #[tokio::test]
    async fn fixed_label_counter_three_iterations() {
        let sink = RecordingSink::default();
        let pacer = RecordingPacer::default();
        let mut rng = StdRng::seed_from_u64(7);

        let report = run(Scenario::FixedLabelCounter, &sink, &pacer, &mut rng, plan(3))
            .await
            .unwrap();

        assert_eq!(report.recorded, 3);
        assert_eq!(report.instrument, "herapoc_demo_client_request_counts");
        let expected = Sample::Add(REQUEST_COUNTS.name, 1, LabelSet::common());
        assert_eq!(sink.take(), vec![expected.clone(), expected.clone(), expected]);
        assert_eq!(*pacer.pauses.lock().unwrap(), vec![DEFAULT_DELAY; 3]);
    }

    #[tokio::test]
    async fn every_scenario_runs_the_default_plan() {
        for scenario in Scenario::ALL {
            let sink = RecordingSink::default();
            let pacer = RecordingPacer::default();
            let mut rng = StdRng::seed_from_u64(11);

            let report = run(scenario, &sink, &pacer, &mut rng, EmissionPlan::default())
                .await
                .unwrap();

            assert_eq!(report.recorded, 2500, "{scenario}");
            assert_eq!(sink.take().len(), 2500, "{scenario}");
            let pauses = pacer.pauses.lock().unwrap();
            assert_eq!(pauses.len(), 2500, "{scenario}");
            assert!(pauses.iter().all(|d| *d == Duration::from_millis(50)));
        }
    }

    #[tokio::test]
    async fn variable_dimension_adds_one_bounded_label() {
        let sink = RecordingSink::default();
        let pacer = RecordingPacer::default();
        let mut rng = StdRng::seed_from_u64(3);

        run(Scenario::VariableDimensionCounter, &sink, &pacer, &mut rng, plan(500))
            .await
            .unwrap();

        for sample in sink.take() {
            let (name, labels) = match sample {
                Sample::Add(name, 1, labels) => (name, labels),
                other => unreachable!("counter scenario recorded {other:?}"),
            };
            assert_eq!(name, MDVAR_COUNTS.name);
            assert_eq!(labels.len(), 3);
            assert!(is_common(&labels));
            let hash: u32 = labels.get(SQL_HASH).unwrap().parse().unwrap();
            assert!(DIMENSION_RANGE.contains(&hash));
        }
    }

    #[tokio::test]
    async fn histogram_values_stay_in_range() {
        for scenario in [Scenario::DefaultHistogram, Scenario::ExplicitBoundaryHistogram] {
            let sink = RecordingSink::default();
            let pacer = RecordingPacer::default();
            let mut rng = StdRng::seed_from_u64(5);

            run(scenario, &sink, &pacer, &mut rng, plan(500)).await.unwrap();

            for sample in sink.take() {
                let (name, value, labels) = match sample {
                    Sample::Record(name, value, labels) => (name, value, labels),
                    other => unreachable!("histogram scenario recorded {other:?}"),
                };
                assert_eq!(name, scenario.instrument().name);
                assert!((1.0..15.0).contains(&value), "{value}");
                assert_eq!(value.fract(), 0.0);
                assert_eq!(labels, LabelSet::common());
            }
        }
    }

    #[tokio::test]
    async fn instrument_errors_are_propagated() {
        let pacer = RecordingPacer::default();
        let mut rng = StdRng::seed_from_u64(1);

        let err = run(Scenario::DefaultHistogram, &RejectingSink, &pacer, &mut rng, plan(3))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Instrument);
        assert!(pacer.pauses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_iterations_records_nothing() {
        let sink = RecordingSink::default();
        let pacer = RecordingPacer::default();
        let mut rng = StdRng::seed_from_u64(1);

        let report = run(Scenario::FixedLabelCounter, &sink, &pacer, &mut rng, plan(0))
            .await
            .unwrap();

        assert_eq!(report.recorded, 0);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn scenario_names_parse_back() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.as_str().parse::<Scenario>().unwrap(), scenario);
        }
        let err = "histogram".parse::<Scenario>().unwrap_err();
        assert_eq!(err.stage(), Stage::Config);
    }
}
