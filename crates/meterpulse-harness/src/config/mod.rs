//! Harness config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use meterpulse_core::error::{PulseError, Result};

pub use schema::{
    EmissionSection, ExporterSection, HarnessConfig, MeterSection, SinkMode, ENDPOINT_ENV,
};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "METERPULSE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "meterpulse.yaml";

pub fn load_from_file(path: impl AsRef<Path>) -> Result<HarnessConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| PulseError::Config(format!("read {} failed: {e}", path.display())))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HarnessConfig> {
    let cfg: HarnessConfig = serde_yaml::from_str(s)
        .map_err(|e| PulseError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the config the binary runs with.
///
/// An explicitly named file (`METERPULSE_CONFIG`) must exist; the default
/// `meterpulse.yaml` is optional and built-in defaults apply without it.
/// Environment overrides are applied last.
pub fn load_effective() -> Result<HarnessConfig> {
    let mut cfg = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(path)?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH)?,
        Err(_) => HarnessConfig::default(),
    };
    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}
