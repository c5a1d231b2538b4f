//! Instrument catalogue.
//!
//! Names are contract strings consumed by the collector; they must not change
//! between releases.

use crate::error::{PulseError, Result};

/// Default instrumentation scope name for the harness meter.
pub const METER_NAME: &str = "herapoc-demo-client-meter";

const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Monotonic `u64` counter.
    Counter,
    /// `f64` distribution.
    Histogram,
}

impl InstrumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::Histogram => "histogram",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrumentSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: InstrumentKind,
}

impl InstrumentSpec {
    pub const fn counter(name: &'static str, description: &'static str) -> Self {
        Self { name, description, kind: InstrumentKind::Counter }
    }

    pub const fn histogram(name: &'static str, description: &'static str) -> Self {
        Self { name, description, kind: InstrumentKind::Histogram }
    }

    /// Check the OpenTelemetry instrument name syntax: an ASCII letter, then
    /// up to 254 of `[A-Za-z0-9_.-/]`.
    pub fn validate(&self) -> Result<()> {
        let name = self.name;
        if name.is_empty() {
            return Err(PulseError::instrument(name, "name must not be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(PulseError::instrument(
                name,
                format!("name longer than {MAX_NAME_LEN} characters"),
            ));
        }
        let mut chars = name.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Err(PulseError::instrument(name, "name must start with a letter"));
        }
        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || "_.-/".contains(*c))) {
            return Err(PulseError::instrument(name, format!("invalid character {bad:?}")));
        }
        Ok(())
    }

    /// Reject use of this spec as a different kind of instrument.
    pub fn expect_kind(&self, kind: InstrumentKind) -> Result<()> {
        if self.kind != kind {
            return Err(PulseError::instrument(
                self.name,
                format!("declared as {}, requested as {}", self.kind.as_str(), kind.as_str()),
            ));
        }
        Ok(())
    }
}

pub const REQUEST_COUNTS: InstrumentSpec = InstrumentSpec::counter(
    "herapoc_demo_client_request_counts",
    "The number of requests processed",
);

pub const MDVAR_COUNTS: InstrumentSpec =
    InstrumentSpec::counter("herapoc_demo_mdvar_counts", "The number of requests processed");

pub const REQUEST_LATENCY: InstrumentSpec = InstrumentSpec::histogram(
    "herapoc_demo_request_latency",
    "The latency of requests processed",
);

/// Bucket boundaries for this one are set by the pipeline view, not here.
pub const EXPLICIT_BOUNDARY_LATENCY: InstrumentSpec = InstrumentSpec::histogram(
    "herapoc_demo_ExplicitBoundry_request_latency",
    "The latency of requests processed",
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn catalogue_names_are_valid_and_distinct() {
        let all = [REQUEST_COUNTS, MDVAR_COUNTS, REQUEST_LATENCY, EXPLICIT_BOUNDARY_LATENCY];
        for spec in &all {
            assert!(spec.validate().is_ok(), "{} should be valid", spec.name);
        }
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "1counter", "req counts", "latency{ms}"] {
            let spec = InstrumentSpec::counter(name, "");
            let err = spec.validate().expect_err("must fail");
            assert_eq!(err.stage(), Stage::Instrument);
        }
    }

    #[test]
    fn kind_mismatch_is_an_instrument_error() {
        let err = REQUEST_LATENCY
            .expect_kind(InstrumentKind::Counter)
            .expect_err("histogram used as counter");
        assert!(err.to_string().contains("declared as histogram"));
    }
}
