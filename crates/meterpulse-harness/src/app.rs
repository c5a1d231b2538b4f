//! Harness runner: one pipeline per scenario, scoped like a test fixture.

use std::sync::Arc;

use meterpulse_core::error::Result;
use meterpulse_core::scenario::{self, EmissionReport, Scenario};
use meterpulse_core::sink::MetricSink;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{HarnessConfig, SinkMode};
use crate::pacer::TokioPacer;
use crate::telemetry::{LocalRegistry, MetricsPipeline};

#[derive(Clone)]
pub struct Harness {
    cfg: Arc<HarnessConfig>,
}

impl Harness {
    /// Returns Result so main decides how to surface a bad config.
    pub fn new(cfg: HarnessConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg: Arc::new(cfg) })
    }

    pub fn cfg(&self) -> &HarnessConfig {
        &self.cfg
    }

    /// Initialize a pipeline, run `scenario` on it, then shut it down.
    ///
    /// Boot errors abort the scenario. Shutdown errors are logged and the
    /// emission result is returned regardless.
    pub async fn run_scenario(&self, scenario: Scenario) -> Result<EmissionReport> {
        match self.cfg.sink {
            SinkMode::Otlp => {
                let mut pipeline =
                    MetricsPipeline::initialize(&self.cfg.exporter, &self.cfg.meter).await?;
                let report = self.run_on(scenario, &pipeline.sink()).await;
                if let Err(error) = pipeline.shutdown() {
                    tracing::warn!(
                        scenario = %scenario,
                        stage = error.stage().as_str(),
                        %error,
                        "final flush failed"
                    );
                }
                report
            }
            SinkMode::Local => {
                let registry = LocalRegistry::new(&self.cfg.exporter.histogram_boundaries);
                let report = self.run_on(scenario, &registry).await?;
                tracing::info!(scenario = %scenario, "local registry snapshot:\n{}", registry.render());
                Ok(report)
            }
        }
    }

    /// Run `scenario` with the configured plan against an arbitrary sink.
    pub async fn run_on<S>(&self, scenario: Scenario, sink: &S) -> Result<EmissionReport>
    where
        S: MetricSink + ?Sized,
    {
        let mut rng = StdRng::from_entropy();
        scenario::run(scenario, sink, &TokioPacer, &mut rng, self.cfg.emission.plan()).await
    }

    /// Run scenarios one after another, stopping at the first error.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Result<Vec<EmissionReport>> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for &scenario in scenarios {
            let report = self.run_scenario(scenario).await?;
            tracing::info!(
                scenario = %report.scenario,
                instrument = report.instrument,
                recorded = report.recorded,
                "scenario finished"
            );
            reports.push(report);
        }
        Ok(reports)
    }
}
