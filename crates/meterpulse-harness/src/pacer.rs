use std::time::Duration;

use async_trait::async_trait;
use meterpulse_core::sink::Pacer;

/// Sleeps on the tokio timer, so paused-clock tests advance it instantly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
