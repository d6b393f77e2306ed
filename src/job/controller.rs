//! The analysis job state machine.
//!
//! One controller owns one job for its whole lifetime: submission, in-flight
//! tracking over the push channel and/or the polling fallback, and resolution
//! to a terminal state. Consumers only ever see read-only snapshots.

use crate::client::AnalysisClient;
use crate::error::AnalysisError;
use crate::job::poller::JobPoller;
use crate::models::{AnalysisJob, JobFailure, JobInput, JobSnapshot, JobStatus, ProgressEvent};
use crate::progress::ProgressChannel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Tunables for job tracking.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Cadence of the polling fallback.
    pub poll_interval: Duration,
    /// Overall deadline; a job with no terminal event by then is failed.
    pub job_timeout: Duration,
    /// Consecutive poll failures tolerated once the channel is lost.
    pub max_poll_failures: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            job_timeout: Duration::from_secs(300),
            max_poll_failures: 5,
        }
    }
}

/// Drives one [`AnalysisJob`] from submission to a terminal state.
pub struct AnalysisJobController {
    client: Arc<AnalysisClient>,
    channel: ProgressChannel,
    config: ControllerConfig,
    job: AnalysisJob,
    /// Subscription taken before the channel opens, so no event sent
    /// during connection setup can be missed.
    events: Option<broadcast::Receiver<ProgressEvent>>,
}

impl AnalysisJobController {
    pub fn new(
        client: Arc<AnalysisClient>,
        channel: ProgressChannel,
        config: ControllerConfig,
    ) -> Self {
        Self {
            client,
            channel,
            config,
            job: AnalysisJob::new(),
            events: None,
        }
    }

    /// Read-only view of the current job state.
    pub fn snapshot(&self) -> JobSnapshot {
        self.job.snapshot()
    }

    /// Submit a pitch for analysis.
    ///
    /// On success the job is `Processing`, the push channel is open for the
    /// returned id, and [`run_to_completion`](Self::run_to_completion) may
    /// be called. An empty pitch fails validation and leaves the job
    /// `Idle`. A creation failure leaves the job `Failed` but, since no job
    /// id was ever assigned, the controller accepts a fresh `submit`. A
    /// second submission while a job is in flight (or finished) is rejected
    /// outright: one controller, one job.
    pub async fn submit(
        &mut self,
        pitch: &str,
        website_url: Option<String>,
    ) -> Result<String, AnalysisError> {
        match self.job.status {
            JobStatus::Idle => {}
            // A submission that never produced a job id may be retried on
            // the same controller.
            JobStatus::Failed if self.job.id.is_none() => {
                self.job = AnalysisJob::new();
            }
            status => {
                return Err(AnalysisError::JobActive(format!(
                    "job {} is {}",
                    self.job.id.as_deref().unwrap_or("<unassigned>"),
                    status
                )));
            }
        }

        let pitch = pitch.trim();
        if pitch.is_empty() {
            return Err(AnalysisError::Validation(
                "pitch must not be empty".to_string(),
            ));
        }

        self.job.input = JobInput {
            pitch: pitch.to_string(),
            website_url,
        };
        self.job.status = JobStatus::Submitting;

        match self.client.create_job(&self.job.input).await {
            Ok(created) => {
                info!("Job created: {}", created.job_id);
                self.job.id = Some(created.job_id.clone());
                self.job.status = JobStatus::Processing;
                self.events = Some(self.channel.subscribe());
                self.channel.open(&created.job_id);
                Ok(created.job_id)
            }
            Err(e) => {
                warn!("Submission failed: {}", e);
                let retryable = e.retryable();
                self.job.fail(JobFailure {
                    message: e.to_string(),
                    retryable,
                });
                Err(e)
            }
        }
    }

    /// Drive a `Processing` job to its terminal state.
    ///
    /// Multiplexes push events, poll ticks, the overall deadline, and the
    /// cancellation signal. The poller is armed immediately but stays
    /// dormant while the push channel is healthy; after the channel
    /// reports permanent loss it becomes the only source. Whichever source
    /// delivers a terminal event first wins; the job's clamping rules make
    /// the progress race harmless. On return both the channel and the
    /// poller are torn down.
    pub async fn run_to_completion<F>(
        &mut self,
        mut cancel: watch::Receiver<bool>,
        mut on_progress: F,
    ) -> JobSnapshot
    where
        F: FnMut(&JobSnapshot),
    {
        if self.job.status != JobStatus::Processing {
            return self.job.snapshot();
        }
        let job_id = match self.job.id.clone() {
            Some(id) => id,
            None => return self.job.snapshot(),
        };

        let mut events = self
            .events
            .take()
            .unwrap_or_else(|| self.channel.subscribe());
        let mut poller = JobPoller::new(
            self.client.clone(),
            job_id,
            self.config.poll_interval,
            self.config.max_poll_failures,
        );

        let deadline = tokio::time::sleep(self.config.job_timeout);
        tokio::pin!(deadline);

        let mut channel_healthy = true;
        let mut cancel_open = true;

        while !self.job.is_terminal() {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(ProgressEvent::ChannelLost) => {
                        info!("Push channel lost; progress now sourced from polling");
                        channel_healthy = false;
                    }
                    Ok(event) => {
                        if self.job.apply(event) {
                            on_progress(&self.job.snapshot());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dropped {} progress events (slow consumer)", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        channel_healthy = false;
                    }
                },
                _ = poller.tick() => {
                    // Dormant while push delivery works; the channel owns
                    // progress attribution until it gives up.
                    if channel_healthy {
                        continue;
                    }
                    if let Some(event) = poller.poll_once().await {
                        if self.job.apply(event) {
                            on_progress(&self.job.snapshot());
                        }
                    } else if poller.exhausted() {
                        let err = AnalysisError::Stream(format!(
                            "push channel lost and {} consecutive polls failed",
                            self.config.max_poll_failures
                        ));
                        self.job.fail(JobFailure {
                            message: err.to_string(),
                            retryable: true,
                        });
                    }
                },
                _ = &mut deadline => {
                    let err = AnalysisError::Timeout(self.config.job_timeout.as_secs());
                    self.job.fail(JobFailure {
                        message: err.to_string(),
                        retryable: true,
                    });
                },
                result = cancel.changed(), if cancel_open => {
                    match result {
                        Ok(()) if *cancel.borrow() => {
                            debug!("Cancellation requested");
                            self.job.fail(JobFailure {
                                message: AnalysisError::Cancelled.to_string(),
                                retryable: false,
                            });
                        }
                        Ok(()) => {}
                        // Sender gone; nobody can cancel any more.
                        Err(_) => cancel_open = false,
                    }
                },
            }
        }

        // Terminal: tear down both sources before returning. The poller's
        // interval dies with it at the end of this scope.
        self.channel.close();
        on_progress(&self.job.snapshot());
        self.job.snapshot()
    }

    /// Whether the push channel is currently bound to a job.
    pub fn channel_open(&self) -> bool {
        self.channel.job_id().is_some()
    }

    /// Test hook: place the controller directly into `Processing` for a
    /// given job id, as if submission had succeeded.
    #[cfg(test)]
    pub(crate) fn begin_processing(&mut self, job_id: &str, open_channel: bool) {
        self.job.input = JobInput {
            pitch: "test pitch".to_string(),
            website_url: None,
        };
        self.job.id = Some(job_id.to_string());
        self.job.status = JobStatus::Processing;
        if open_channel {
            self.events = Some(self.channel.subscribe());
            self.channel.open(job_id);
        }
    }
}
