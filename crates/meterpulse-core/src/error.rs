//! Shared error type across meterpulse crates.

use std::time::Duration;

use thiserror::Error;

/// Pipeline stage an error originated from (stable log code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Config file or environment could not be loaded/validated.
    Config,
    /// Exporter client construction, including the endpoint probe.
    ClientCreate,
    /// Reader/view/provider registration.
    PusherStart,
    /// A global pipeline is already installed.
    AlreadyInitialized,
    /// Instrument creation rejected.
    Instrument,
    /// Force flush failed.
    Flush,
    /// Final flush/stop failed or timed out.
    Shutdown,
    /// Anything else.
    Internal,
}

impl Stage {
    /// String representation used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Config => "CONFIG",
            Stage::ClientCreate => "CLIENT_CREATE",
            Stage::PusherStart => "PUSHER_START",
            Stage::AlreadyInitialized => "ALREADY_INITIALIZED",
            Stage::Instrument => "INSTRUMENT",
            Stage::Flush => "FLUSH",
            Stage::Shutdown => "SHUTDOWN",
            Stage::Internal => "INTERNAL",
        }
    }

    /// Boot-time stages abort the run; the rest are reported and tolerated.
    pub fn is_boot(self) -> bool {
        matches!(
            self,
            Stage::Config | Stage::ClientCreate | Stage::PusherStart | Stage::AlreadyInitialized
        )
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Unified error type used by core and harness.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("invalid config: {0}")]
    Config(String),
    #[error("failed to create the collector metric exporter: {0}")]
    ClientCreate(String),
    #[error("failed to start metric pusher: {0}")]
    PusherStart(String),
    #[error("metrics pipeline already installed as the global provider")]
    AlreadyInitialized,
    #[error("instrument {name} rejected: {reason}")]
    Instrument { name: String, reason: String },
    #[error("metric flush failed: {0}")]
    Flush(String),
    #[error("shutdown flush failed: {0}")]
    Shutdown(String),
    #[error("shutdown flush did not finish within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("internal: {0}")]
    Internal(String),
}

impl PulseError {
    /// Map the error to the stage that produced it.
    pub fn stage(&self) -> Stage {
        match self {
            PulseError::Config(_) => Stage::Config,
            PulseError::ClientCreate(_) => Stage::ClientCreate,
            PulseError::PusherStart(_) => Stage::PusherStart,
            PulseError::AlreadyInitialized => Stage::AlreadyInitialized,
            PulseError::Instrument { .. } => Stage::Instrument,
            PulseError::Flush(_) => Stage::Flush,
            PulseError::Shutdown(_) | PulseError::ShutdownTimeout(_) => Stage::Shutdown,
            PulseError::Internal(_) => Stage::Internal,
        }
    }

    pub fn instrument(name: &str, reason: impl Into<String>) -> Self {
        PulseError::Instrument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
