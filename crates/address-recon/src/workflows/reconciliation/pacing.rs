use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep_until, Instant};

/// Rate policy consulted by the batch driver before each dispatch.
#[async_trait]
pub trait DispatchPacer: Send + Sync {
    /// Waits until the next dispatch is allowed and records it as taken.
    async fn ready(&mut self);
}

/// Guarantees at least `interval` between consecutive dispatches.
#[derive(Debug, Clone)]
pub struct MinIntervalPacer {
    interval: Duration,
    last_dispatch: Option<Instant>,
}

impl MinIntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl DispatchPacer for MinIntervalPacer {
    async fn ready(&mut self) {
        if let Some(last) = self.last_dispatch {
            let earliest = last + self.interval;
            if Instant::now() < earliest {
                sleep_until(earliest).await;
            }
        }
        self.last_dispatch = Some(Instant::now());
    }
}
