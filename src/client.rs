//! HTTP client for the remote analysis service.
//!
//! Covers the request/response half of the external contract: job creation
//! and the status fetch used by the polling fallback. Push delivery lives in
//! [`crate::progress`].

use crate::error::AnalysisError;
use crate::models::{AnalysisResult, JobFailure, JobInput, ProgressEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Job-creation request body.
#[derive(Debug, Serialize)]
struct CreateJobRequest<'a> {
    pitch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    website_url: Option<&'a str>,
}

/// Job-creation response.
#[derive(Debug, Deserialize)]
pub struct JobCreated {
    pub job_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Error body the service returns on rejected submissions.
#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

/// Status-fetch response. The same event shape the push channel delivers,
/// keyed by `status` instead of a frame type.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub progress_percent: Option<u8>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<AnalysisResult>,
    #[serde(default)]
    pub error: Option<JobFailure>,
}

impl StatusResponse {
    /// Normalize into the event shape the controller consumes, so polled
    /// and pushed updates follow identical rules.
    pub fn into_event(self) -> ProgressEvent {
        match self.status.as_str() {
            "completed" => match self.result {
                Some(result) => ProgressEvent::Completed(result),
                // Completion without its payload is not a completion yet;
                // keep the job processing until the payload shows up.
                None => {
                    warn!("Status reports completed but carries no result; treating as progress");
                    ProgressEvent::Progress {
                        percent: self.progress_percent,
                        message: self.message,
                    }
                }
            },
            "failed" => {
                let failure = self.error.unwrap_or(JobFailure {
                    message: self
                        .message
                        .unwrap_or_else(|| "Analysis failed".to_string()),
                    retryable: true,
                });
                ProgressEvent::Failed {
                    message: failure.message,
                    retryable: failure.retryable,
                }
            }
            _ => ProgressEvent::Progress {
                percent: self.progress_percent,
                message: self.message,
            },
        }
    }
}

/// HTTP client for job creation and status polling.
pub struct AnalysisClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl AnalysisClient {
    /// Create a client against the given service base URL.
    pub fn new(base_url: &str, timeout_seconds: u64) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    /// Submit a pitch for analysis. Returns the service-assigned job id.
    pub async fn create_job(&self, input: &JobInput) -> Result<JobCreated, AnalysisError> {
        let url = format!("{}/api/analyze", self.base_url);

        let request = CreateJobRequest {
            pitch: &input.pitch,
            website_url: input.website_url.as_deref(),
        };

        debug!("Submitting pitch to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Submission {
                message: describe_request_error(&e, &self.base_url),
                retryable: true,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ServiceError>(&body) {
                Ok(se) => format!("Service rejected submission ({}): {}", status, se.error),
                Err(_) => format!("Service error {}: {}", status, body),
            };
            // 4xx means the input itself was rejected; resubmitting the
            // same pitch will not help.
            return Err(AnalysisError::Submission {
                message,
                retryable: !status.is_client_error(),
            });
        }

        response
            .json::<JobCreated>()
            .await
            .map_err(|e| AnalysisError::Submission {
                message: format!("Failed to parse job-creation response: {}", e),
                retryable: true,
            })
    }

    /// Fetch the current status of a job, normalized to a progress event.
    pub async fn fetch_status(&self, job_id: &str) -> Result<ProgressEvent, AnalysisError> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalysisError::Poll(describe_request_error(&e, &self.base_url)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AnalysisError::Poll(format!(
                "Status fetch for job {} returned {}",
                job_id, status
            )));
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Poll(format!("Failed to parse status response: {}", e)))?;

        Ok(status.into_event())
    }
}

/// Turn a reqwest error into something a user can act on.
fn describe_request_error(e: &reqwest::Error, base_url: &str) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        format!("Cannot connect to analysis service at {}", base_url)
    } else {
        format!("Request failed: {}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[test]
    fn test_status_processing_to_progress() {
        let status = StatusResponse {
            status: "processing".to_string(),
            progress_percent: Some(40),
            message: Some("running committee".to_string()),
            result: None,
            error: None,
        };

        match status.into_event() {
            ProgressEvent::Progress { percent, message } => {
                assert_eq!(percent, Some(40));
                assert_eq!(message.as_deref(), Some("running committee"));
            }
            other => panic!("Expected progress event, got {:?}", other),
        }
    }

    #[test]
    fn test_status_completed_requires_result() {
        let status = StatusResponse {
            status: "completed".to_string(),
            progress_percent: Some(100),
            message: None,
            result: None,
            error: None,
        };

        // No payload yet: must not terminate the job.
        assert!(matches!(
            status.into_event(),
            ProgressEvent::Progress { .. }
        ));
    }

    #[test]
    fn test_status_completed_with_result() {
        let json = r#"{
            "status": "completed",
            "result": {
                "agents": [
                    {"agent_name": "MarketExpert", "success": true, "confidence": 0.9}
                ]
            }
        }"#;

        let status: StatusResponse = serde_json::from_str(json).unwrap();
        match status.into_event() {
            ProgressEvent::Completed(result) => {
                assert_eq!(result.agents.len(), 1);
                assert_eq!(result.agents[0].agent_name, "MarketExpert");
            }
            other => panic!("Expected completed event, got {:?}", other),
        }
    }

    #[test]
    fn test_status_failed_default_failure() {
        let status = StatusResponse {
            status: "failed".to_string(),
            progress_percent: None,
            message: None,
            result: None,
            error: None,
        };

        match status.into_event() {
            ProgressEvent::Failed { message, retryable } => {
                assert_eq!(message, "Analysis failed");
                assert!(retryable);
            }
            other => panic!("Expected failed event, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_event_drives_job_to_failed() {
        let mut job = crate::models::AnalysisJob::new();
        job.status = JobStatus::Processing;

        let status = StatusResponse {
            status: "failed".to_string(),
            progress_percent: None,
            message: Some("committee service unavailable".to_string()),
            result: None,
            error: None,
        };

        job.apply(status.into_event());
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_ref().unwrap().message.contains("committee"));
    }
}
