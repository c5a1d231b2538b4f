//! meterpulse harness binary
//!
//! - Config: `METERPULSE_CONFIG` or `./meterpulse.yaml`, else built-in defaults
//! - Endpoint override: `OTEL_EXPORTER_OTLP_ENDPOINT`
//! - Arguments: scenario names to run (default: `emission.scenarios`)
//! - Ctrl+C / SIGTERM stops the current scenario; its pipeline still flushes

use meterpulse_core::error::Result;
use meterpulse_core::scenario::Scenario;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meterpulse_harness::{app::Harness, config};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Boot failures are fatal for the process, not for the library.
    if let Err(error) = run().await {
        tracing::error!(stage = error.stage().as_str(), %error, "meterpulse-harness aborted");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cfg = config::load_effective()?;
    let requested = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<Scenario>())
        .collect::<Result<Vec<_>>>()?;
    let scenarios = if requested.is_empty() {
        cfg.emission.scenarios.clone()
    } else {
        requested
    };

    let harness = Harness::new(cfg)?;
    tracing::info!(
        endpoint = %harness.cfg().exporter.endpoint,
        sink = ?harness.cfg().sink,
        scenarios = scenarios.len(),
        "meterpulse-harness starting"
    );

    tokio::select! {
        reports = harness.run_all(&scenarios) => {
            let reports = reports?;
            tracing::info!(completed = reports.len(), "all scenarios finished");
        }
        _ = shutdown_signal() => {
            tracing::info!("run interrupted");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, flushing metrics pipeline");
}
