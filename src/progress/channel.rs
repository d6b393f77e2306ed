//! Reconnecting WebSocket channel for job progress.
//!
//! Maintains one push connection per job id and delivers typed progress
//! events to subscribers. Transient disconnects are retried with exponential
//! backoff; once the attempt budget is spent the channel reports a permanent
//! failure exactly once and stops, leaving the polling fallback as the only
//! source.

use crate::models::{AnalysisResult, ProgressEvent};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Event broadcast channel capacity.
const CHANNEL_CAPACITY: usize = 256;

/// Settings for the push channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket base, e.g. `ws://localhost:8080/api`.
    pub ws_base: String,
    /// First reconnect delay; doubles per attempt.
    pub base_delay: Duration,
    /// Reconnect attempts before giving up permanently.
    pub max_attempts: u32,
    /// Per-attempt connection timeout.
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_base: "ws://localhost:8080/api".to_string(),
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Delay before reconnect attempt `n` (1-based): base * 2^(n-1).
///
/// With the default 1s base and 5 attempts the schedule is
/// 1s, 2s, 4s, 8s, 16s.
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16))
}

/// Progress frame as sent by the service over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame {
    Progress {
        #[serde(default)]
        progress_percent: Option<u8>,
        #[serde(default)]
        message: Option<String>,
    },
    Completed {
        result: AnalysisResult,
    },
    Failed {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        retryable: Option<bool>,
    },
}

impl WireFrame {
    fn into_event(self) -> ProgressEvent {
        match self {
            WireFrame::Progress {
                progress_percent,
                message,
            } => ProgressEvent::Progress {
                percent: progress_percent,
                message,
            },
            WireFrame::Completed { result } => ProgressEvent::Completed(result),
            WireFrame::Failed { message, retryable } => ProgressEvent::Failed {
                message: message.unwrap_or_else(|| "Analysis failed".to_string()),
                retryable: retryable.unwrap_or(true),
            },
        }
    }
}

/// Why one connection attempt ended.
enum StreamOutcome {
    /// `close()` was called; stop without reconnecting.
    Shutdown,
    /// A terminal event was delivered; nothing left to stream.
    Terminal,
    /// Unexpected closure. `connected` is true if the socket was
    /// established before it dropped.
    Disconnected { connected: bool },
}

/// Push channel scoped to one job id at a time.
///
/// The connection runs on an owned tokio task; `close()` tears it down
/// synchronously, so no timer or socket outlives the channel's owner.
pub struct ProgressChannel {
    config: ChannelConfig,
    job_id: Option<String>,
    event_tx: broadcast::Sender<ProgressEvent>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl ProgressChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let (event_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            config,
            job_id: None,
            event_tx,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Subscribe to progress events. Each receiver is independent; a
    /// lagging or dropped subscriber never blocks delivery to the others.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.event_tx.subscribe()
    }

    /// The job id this channel is currently bound to, if any.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Open the push connection for a job id.
    ///
    /// Idempotent: reopening with the same id while open is a no-op;
    /// a different id tears down the previous connection first.
    pub fn open(&mut self, job_id: &str) {
        if self.job_id.as_deref() == Some(job_id) && self.task.is_some() {
            debug!("Channel already open for job {}", job_id);
            return;
        }
        self.close();

        let url = format!(
            "{}/jobs/{}/progress",
            self.config.ws_base.trim_end_matches('/'),
            job_id
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let event_tx = self.event_tx.clone();
        let config = self.config.clone();

        info!("Opening progress channel for job {}", job_id);
        let task = tokio::spawn(run_connection(url, config, event_tx, shutdown_rx));

        self.job_id = Some(job_id.to_string());
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Release the connection and clear the job id association.
    ///
    /// Idempotent. A deliberate close never triggers reconnection.
    pub fn close(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(job_id) = self.job_id.take() {
            debug!("Closed progress channel for job {}", job_id);
        }
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connection loop: connect, stream, back off, reconnect.
async fn run_connection(
    url: String,
    config: ChannelConfig,
    event_tx: broadcast::Sender<ProgressEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        match connect_and_stream(&url, &config, &event_tx, &mut shutdown_rx).await {
            StreamOutcome::Shutdown => return,
            StreamOutcome::Terminal => {
                debug!("Progress stream delivered terminal event");
                return;
            }
            StreamOutcome::Disconnected { connected } => {
                // A connection that was established and then dropped starts
                // a fresh retry budget.
                if connected {
                    attempt = 0;
                }
                attempt += 1;

                if attempt > config.max_attempts {
                    warn!(
                        "Progress channel giving up after {} reconnect attempts",
                        config.max_attempts
                    );
                    let _ = event_tx.send(ProgressEvent::ChannelLost);
                    return;
                }

                let delay = reconnect_delay(config.base_delay, attempt);
                info!(
                    "Progress channel reconnecting in {:?} (attempt {}/{})",
                    delay, attempt, config.max_attempts
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => return,
                }
            }
        }
    }
}

/// First 120 characters of a frame, for logging. Counts characters, not
/// bytes, so multibyte text never splits mid-character.
fn frame_preview(text: &str) -> String {
    text.chars().take(120).collect()
}

/// One connection attempt: establish the socket and stream events until
/// it ends, a terminal event arrives, or shutdown is signalled.
async fn connect_and_stream(
    url: &str,
    config: &ChannelConfig,
    event_tx: &broadcast::Sender<ProgressEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> StreamOutcome {
    if let Err(e) = Url::parse(url) {
        warn!("Invalid progress channel URL {}: {}", url, e);
        return StreamOutcome::Disconnected { connected: false };
    }

    let connect = tokio::time::timeout(config.connect_timeout, connect_async(url));
    let ws_stream = tokio::select! {
        result = connect => match result {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                debug!("Progress channel connect failed: {}", e);
                return StreamOutcome::Disconnected { connected: false };
            }
            Err(_) => {
                debug!("Progress channel connect timed out");
                return StreamOutcome::Disconnected { connected: false };
            }
        },
        _ = shutdown_rx.changed() => return StreamOutcome::Shutdown,
    };

    debug!("Progress channel connected");
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WireFrame>(&text) {
                            Ok(frame) => {
                                let event = frame.into_event();
                                let terminal = matches!(
                                    event,
                                    ProgressEvent::Completed(_) | ProgressEvent::Failed { .. }
                                );
                                let _ = event_tx.send(event);
                                if terminal {
                                    return StreamOutcome::Terminal;
                                }
                            }
                            Err(e) => {
                                debug!(
                                    "Unrecognized progress frame ({}): {}",
                                    e,
                                    frame_preview(&text)
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("Progress channel received close frame");
                        return StreamOutcome::Disconnected { connected: true };
                    }
                    Some(Err(e)) => {
                        debug!("Progress channel stream error: {}", e);
                        return StreamOutcome::Disconnected { connected: true };
                    }
                    None => {
                        debug!("Progress channel stream ended");
                        return StreamOutcome::Disconnected { connected: true };
                    }
                    _ => {}
                }
            }
            _ = shutdown_rx.changed() => return StreamOutcome::Shutdown,
        }
    }
}
