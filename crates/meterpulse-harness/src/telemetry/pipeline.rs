//! Metric export pipeline lifecycle.
//!
//! A [`MetricsPipeline`] owns one `SdkMeterProvider` wired to a periodic
//! reader (the "pusher") and an explicit-bucket view for every histogram.
//! Construction is initialization: a pipeline handle is always `Running`
//! until [`MetricsPipeline::shutdown`] or `Drop` stops it.
//!
//! Installing the provider as the OpenTelemetry global is opt-in. Only one
//! pipeline may hold the global slot at a time; shutting it down frees the
//! slot and resets the global to an empty provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use meterpulse_core::error::{PulseError, Result};
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::{global, InstrumentationScope};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{
    new_view, Aggregation, Instrument, InstrumentKind, PeriodicReader, SdkMeterProvider, Stream,
};
use opentelemetry_sdk::Resource;

use crate::config::{ExporterSection, MeterSection};

use super::otlp::{normalize_endpoint, OtelSink};
use super::probe;

static GLOBAL_SLOT: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Stopped,
}

pub struct MetricsPipeline {
    provider: SdkMeterProvider,
    meter: Meter,
    endpoint: Option<String>,
    shutdown_timeout: Duration,
    holds_global: bool,
    state: PipelineState,
}

impl MetricsPipeline {
    /// Build an OTLP/gRPC pipeline for `exporter_cfg.endpoint`.
    ///
    /// Must run inside a multi-threaded tokio runtime: the gRPC channel
    /// spawns its worker on the current runtime and exports are driven by it.
    pub async fn initialize(exporter_cfg: &ExporterSection, meter_cfg: &MeterSection) -> Result<Self> {
        let endpoint = normalize_endpoint(&exporter_cfg.endpoint);

        if exporter_cfg.probe {
            probe::ensure_reachable(&endpoint, exporter_cfg.probe_timeout()).await?;
        }

        let exporter = MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint.clone())
            .with_timeout(exporter_cfg.export_timeout())
            .build()
            .map_err(|e| PulseError::ClientCreate(e.to_string()))?;

        let mut pipeline = Self::with_exporter(exporter, exporter_cfg, meter_cfg)?;
        tracing::info!(
            %endpoint,
            collect_period_ms = exporter_cfg.collect_period_ms,
            global = pipeline.holds_global,
            "metrics pipeline running"
        );
        pipeline.endpoint = Some(endpoint);
        Ok(pipeline)
    }

    /// Same pipeline over any push exporter.
    pub fn with_exporter<E>(
        exporter: E,
        exporter_cfg: &ExporterSection,
        meter_cfg: &MeterSection,
    ) -> Result<Self>
    where
        E: PushMetricExporter,
    {
        // `kind` has no builder method; the wildcard keeps the instrument's own name.
        let mut criteria = Instrument::new().name("*");
        criteria.kind = Some(InstrumentKind::Histogram);
        let view = new_view(
            criteria,
            Stream::new().aggregation(Aggregation::ExplicitBucketHistogram {
                boundaries: exporter_cfg.histogram_boundaries.clone(),
                record_min_max: true,
            }),
        )
        .map_err(|e| PulseError::PusherStart(format!("histogram view rejected: {e}")))?;

        let holds_global = exporter_cfg.install_global;
        if holds_global
            && GLOBAL_SLOT
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Err(PulseError::AlreadyInitialized);
        }

        let reader = PeriodicReader::builder(exporter)
            .with_interval(exporter_cfg.collect_period())
            .build();

        let resource = Resource::builder()
            .with_service_name(meter_cfg.service_name.clone())
            .build();

        let provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .with_view(view)
            .build();

        if holds_global {
            global::set_meter_provider(provider.clone());
        }

        let scope = InstrumentationScope::builder(meter_cfg.name.clone()).build();
        let meter = provider.meter_with_scope(scope);

        Ok(Self {
            provider,
            meter,
            endpoint: None,
            shutdown_timeout: exporter_cfg.shutdown_timeout(),
            holds_global,
            state: PipelineState::Running,
        })
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn sink(&self) -> OtelSink {
        OtelSink::new(self.meter.clone())
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Normalized collector URL; `None` for pipelines built over a custom exporter.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn holds_global(&self) -> bool {
        self.holds_global
    }

    /// Collect and export now without stopping the pipeline.
    pub fn flush(&self) -> Result<()> {
        if self.state == PipelineState::Stopped {
            return Err(PulseError::Flush("pipeline already stopped".into()));
        }
        self.provider
            .force_flush()
            .map_err(|e| PulseError::Flush(e.to_string()))
    }

    /// Push the last batch and stop, waiting at most the configured shutdown
    /// timeout. A stopped pipeline returns `Ok(())`.
    ///
    /// The pipeline counts as stopped even when this returns an error.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == PipelineState::Stopped {
            return Ok(());
        }
        self.state = PipelineState::Stopped;
        self.release_global();

        let provider = self.provider.clone();
        let timeout = self.shutdown_timeout;
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("meterpulse-shutdown".into())
            .spawn(move || {
                let _ = tx.send(provider.shutdown().map_err(|e| e.to_string()));
            })
            .map_err(|e| PulseError::Shutdown(format!("spawn flush thread: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(())) => {
                tracing::info!("metrics pipeline stopped");
                Ok(())
            }
            Ok(Err(reason)) => Err(PulseError::Shutdown(reason)),
            Err(RecvTimeoutError::Timeout) => Err(PulseError::ShutdownTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(PulseError::Shutdown(
                "flush thread exited without a result".into(),
            )),
        }
    }

    /// Points the OpenTelemetry global back at an empty provider before
    /// freeing the slot, so global instruments never reach a stopped pipeline.
    fn release_global(&mut self) {
        if self.holds_global {
            global::set_meter_provider(SdkMeterProvider::builder().build());
            GLOBAL_SLOT.store(false, Ordering::Release);
            self.holds_global = false;
        }
    }
}

impl Drop for MetricsPipeline {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            tracing::warn!(
                stage = error.stage().as_str(),
                %error,
                "metrics pipeline shutdown failed, pending samples may be lost"
            );
        }
    }
}
