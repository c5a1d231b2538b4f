//! Boot-time reachability check for the collector endpoint.
//!
//! The gRPC channel connects lazily, so without this an unreachable collector
//! only shows up as failed exports later on.

use std::time::Duration;

use meterpulse_core::error::{PulseError, Result};
use tokio::net::TcpStream;

const DEFAULT_OTLP_GRPC_PORT: u16 = 4317;

/// `host:port` part of an endpoint URL. A missing port means the OTLP/gRPC
/// default.
pub fn authority(endpoint: &str) -> String {
    let rest = endpoint
        .split_once("://")
        .map_or(endpoint, |(_, rest)| rest);
    let host = rest.split('/').next().unwrap_or(rest);
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:{DEFAULT_OTLP_GRPC_PORT}")
    }
}

pub async fn ensure_reachable(endpoint: &str, timeout: Duration) -> Result<()> {
    let target = authority(endpoint);
    match tokio::time::timeout(timeout, TcpStream::connect(target.as_str())).await {
        Ok(Ok(_)) => {
            tracing::debug!(%target, "collector endpoint reachable");
            Ok(())
        }
        Ok(Err(e)) => Err(PulseError::ClientCreate(format!("{target} unreachable: {e}"))),
        Err(_) => Err(PulseError::ClientCreate(format!(
            "{target} did not accept a connection within {timeout:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_strips_scheme_and_path() {
        assert_eq!(authority("http://0.0.0.0:4317"), "0.0.0.0:4317");
        assert_eq!(authority("https://otel.example:443/v1/metrics"), "otel.example:443");
        assert_eq!(authority("collector"), "collector:4317");
    }

    #[tokio::test]
    async fn open_listener_is_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        ensure_reachable(&format!("http://{addr}"), Duration::from_secs(1))
            .await
            .unwrap();
    }
}
