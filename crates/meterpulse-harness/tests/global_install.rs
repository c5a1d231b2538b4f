//! Global provider slot. Lives in its own test binary because the slot is
//! process-wide.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use meterpulse_core::Stage;
use meterpulse_harness::config::{ExporterSection, MeterSection};
use meterpulse_harness::telemetry::MetricsPipeline;
use opentelemetry::global;
use opentelemetry_sdk::metrics::InMemoryMetricExporter;

fn global_cfg() -> ExporterSection {
    ExporterSection {
        install_global: true,
        ..ExporterSection::default()
    }
}

fn install() -> meterpulse_core::Result<MetricsPipeline> {
    install_into(InMemoryMetricExporter::default())
}

fn install_into(exporter: InMemoryMetricExporter) -> meterpulse_core::Result<MetricsPipeline> {
    MetricsPipeline::with_exporter(exporter, &global_cfg(), &MeterSection::default())
}

fn exported_names(exporter: &InMemoryMetricExporter) -> Vec<String> {
    let mut names = Vec::new();
    for resource in exporter.get_finished_metrics().unwrap() {
        for scope in resource.scope_metrics {
            for metric in scope.metrics {
                names.push(metric.name.to_string());
            }
        }
    }
    names
}

#[test]
fn second_global_install_is_rejected_until_shutdown() {
    let mut first = install().expect("first install");
    assert!(first.holds_global());

    let err = install().err().expect("slot is taken");
    assert_eq!(err.stage(), Stage::AlreadyInitialized);

    // Local pipelines are unaffected by the slot.
    let local = MetricsPipeline::with_exporter(
        InMemoryMetricExporter::default(),
        &ExporterSection::default(),
        &MeterSection::default(),
    )
    .expect("non-global pipeline");
    assert!(!local.holds_global());

    first.shutdown().unwrap();
    assert!(!first.holds_global());

    // Between installs the global is an empty provider.
    global::meter("between-installs")
        .u64_counter("orphan_counts")
        .build()
        .add(1, &[]);

    let exporter = InMemoryMetricExporter::default();
    let again = install_into(exporter.clone()).expect("slot released by shutdown");
    assert!(again.holds_global());

    global::meter("after-reinstall")
        .u64_counter("global_counts")
        .build()
        .add(1, &[]);
    again.flush().unwrap();

    let names = exported_names(&exporter);
    assert!(names.iter().any(|n| n == "global_counts"), "{names:?}");
    assert!(!names.iter().any(|n| n == "orphan_counts"), "{names:?}");
}
