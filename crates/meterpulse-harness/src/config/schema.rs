use std::time::Duration;

use serde::Deserialize;
use meterpulse_core::error::{PulseError, Result};
use meterpulse_core::instrument::METER_NAME;
use meterpulse_core::scenario::{EmissionPlan, Scenario, DEFAULT_DELAY, DEFAULT_ITERATIONS};

/// Environment variable overriding `exporter.endpoint`.
pub const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    pub version: u32,

    #[serde(default)]
    pub sink: SinkMode,

    #[serde(default)]
    pub exporter: ExporterSection,

    #[serde(default)]
    pub meter: MeterSection,

    #[serde(default)]
    pub emission: EmissionSection,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            version: 1,
            sink: SinkMode::default(),
            exporter: ExporterSection::default(),
            meter: MeterSection::default(),
            emission: EmissionSection::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PulseError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.exporter.validate()?;
        self.meter.validate()?;
        self.emission.validate()?;
        Ok(())
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            self.exporter.endpoint = endpoint.trim().to_string();
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }
}

/// Where samples go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkMode {
    /// OTLP/gRPC push pipeline.
    #[default]
    Otlp,
    /// In-process registry, rendered to the log at the end of a run.
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_collect_period_ms")]
    pub collect_period_ms: u64,

    #[serde(default = "default_export_timeout_ms")]
    pub export_timeout_ms: u64,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    #[serde(default = "default_histogram_boundaries")]
    pub histogram_boundaries: Vec<f64>,

    #[serde(default = "default_true")]
    pub probe: bool,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default)]
    pub install_global: bool,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            collect_period_ms: default_collect_period_ms(),
            export_timeout_ms: default_export_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            histogram_boundaries: default_histogram_boundaries(),
            probe: true,
            probe_timeout_ms: default_probe_timeout_ms(),
            install_global: false,
        }
    }
}

impl ExporterSection {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(PulseError::Config("exporter.endpoint must not be empty".into()));
        }
        if !(1..=60_000).contains(&self.collect_period_ms) {
            return Err(PulseError::Config(
                "exporter.collect_period_ms must be between 1 and 60000".into(),
            ));
        }
        if !(1..=120_000).contains(&self.export_timeout_ms) {
            return Err(PulseError::Config(
                "exporter.export_timeout_ms must be between 1 and 120000".into(),
            ));
        }
        if !(1..=60_000).contains(&self.shutdown_timeout_ms) {
            return Err(PulseError::Config(
                "exporter.shutdown_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        if !(1..=60_000).contains(&self.probe_timeout_ms) {
            return Err(PulseError::Config(
                "exporter.probe_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        validate_boundaries(&self.histogram_boundaries)
    }

    pub fn collect_period(&self) -> Duration {
        Duration::from_millis(self.collect_period_ms)
    }
    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn validate_boundaries(bounds: &[f64]) -> Result<()> {
    if bounds.is_empty() {
        return Err(PulseError::Config(
            "exporter.histogram_boundaries must not be empty".into(),
        ));
    }
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(PulseError::Config(
            "exporter.histogram_boundaries must be finite".into(),
        ));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(PulseError::Config(
            "exporter.histogram_boundaries must be strictly increasing".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeterSection {
    #[serde(default = "default_meter_name")]
    pub name: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for MeterSection {
    fn default() -> Self {
        Self {
            name: default_meter_name(),
            service_name: default_service_name(),
        }
    }
}

impl MeterSection {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PulseError::Config("meter.name must not be empty".into()));
        }
        if self.service_name.trim().is_empty() {
            return Err(PulseError::Config("meter.service_name must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmissionSection {
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<Scenario>,
}

impl Default for EmissionSection {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            delay_ms: default_delay_ms(),
            scenarios: default_scenarios(),
        }
    }
}

impl EmissionSection {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(PulseError::Config("emission.iterations must be at least 1".into()));
        }
        if self.scenarios.is_empty() {
            return Err(PulseError::Config("emission.scenarios must not be empty".into()));
        }
        Ok(())
    }

    pub fn plan(&self) -> EmissionPlan {
        EmissionPlan {
            iterations: self.iterations,
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

fn default_endpoint() -> String {
    "0.0.0.0:4317".into()
}
fn default_collect_period_ms() -> u64 {
    20
}
fn default_export_timeout_ms() -> u64 {
    10_000
}
fn default_shutdown_timeout_ms() -> u64 {
    1_000
}
fn default_histogram_boundaries() -> Vec<f64> {
    vec![5.0, 10.0, 15.0]
}
fn default_true() -> bool {
    true
}
fn default_probe_timeout_ms() -> u64 {
    1_000
}
fn default_meter_name() -> String {
    METER_NAME.into()
}
fn default_service_name() -> String {
    "meterpulse".into()
}
fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}
fn default_delay_ms() -> u64 {
    DEFAULT_DELAY.as_millis() as u64
}
fn default_scenarios() -> Vec<Scenario> {
    Scenario::ALL.to_vec()
}
