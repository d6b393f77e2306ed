//! Polling fallback for job progress.
//!
//! Periodic status fetches over HTTP, used while the push channel is down
//! or gone for good. Individual fetch failures are absorbed and retried on
//! the next tick; only a run of consecutive failures exhausts the poller.

use crate::client::AnalysisClient;
use crate::models::ProgressEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Interval-driven status poller for one job id.
///
/// The interval handle is owned by the poller, so dropping it (which the
/// controller does on any terminal state) stops the cadence with nothing
/// left running.
pub struct JobPoller {
    client: Arc<AnalysisClient>,
    job_id: String,
    ticker: Interval,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
}

impl JobPoller {
    pub fn new(
        client: Arc<AnalysisClient>,
        job_id: String,
        poll_interval: Duration,
        max_consecutive_failures: u32,
    ) -> Self {
        let mut ticker = interval(poll_interval);
        // The first tick of a tokio interval fires immediately; skip it so
        // the poller waits one full period before its first fetch.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        Self {
            client,
            job_id,
            ticker,
            consecutive_failures: 0,
            max_consecutive_failures,
        }
    }

    /// Wait for the next poll slot.
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    /// Fetch the job status once. Returns `None` on failure; the error is
    /// logged and counted, never escalated from here.
    pub async fn poll_once(&mut self) -> Option<ProgressEvent> {
        match self.client.fetch_status(&self.job_id).await {
            Ok(event) => {
                self.consecutive_failures = 0;
                debug!("Poll for job {} returned an event", self.job_id);
                Some(event)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Poll {}/{} for job {} failed: {}",
                    self.consecutive_failures, self.max_consecutive_failures, self.job_id, e
                );
                None
            }
        }
    }

    /// Whether the failure budget is spent. Meaningful once polling is the
    /// only remaining progress source.
    pub fn exhausted(&self) -> bool {
        self.consecutive_failures >= self.max_consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_poller(max_failures: u32) -> JobPoller {
        // Nothing listens on port 1; every fetch fails fast.
        let client = Arc::new(AnalysisClient::new("http://127.0.0.1:1", 1));
        JobPoller::new(
            client,
            "job-1".to_string(),
            Duration::from_millis(10),
            max_failures,
        )
    }

    #[tokio::test]
    async fn test_failures_accumulate_to_exhaustion() {
        let mut poller = unreachable_poller(2);
        assert!(!poller.exhausted());

        assert!(poller.poll_once().await.is_none());
        assert!(!poller.exhausted());

        assert!(poller.poll_once().await.is_none());
        assert!(poller.exhausted());
    }

    #[tokio::test]
    async fn test_tick_respects_interval() {
        let mut poller = unreachable_poller(5);

        let start = tokio::time::Instant::now();
        poller.tick().await;
        // First tick waits a full period (no immediate fire).
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
