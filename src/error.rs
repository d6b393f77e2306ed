//! Error taxonomy for the analysis client.
//!
//! Transport-level failures (`Stream`, `Poll`) are absorbed and retried by
//! their owners and only escalate to a terminal job failure once every
//! fallback path is exhausted. The view layer never needs more than the
//! message and the `retryable()` flag.

use thiserror::Error;

/// Main error type for pitch analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Bad input (e.g. empty pitch). Never retryable.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Job-creation request failed.
    #[error("Submission failed: {message}")]
    Submission { message: String, retryable: bool },

    /// The push channel exhausted its reconnect attempts and polling
    /// could not take over.
    #[error("Progress stream failed: {0}")]
    Stream(String),

    /// A single status fetch failed. Absorbed by the poller cadence.
    #[error("Status poll failed: {0}")]
    Poll(String),

    /// The job produced no terminal event within the overall deadline.
    #[error("Analysis timed out after {0}s")]
    Timeout(u64),

    /// Aggregation attempted on an empty committee.
    #[error("Committee has no members to aggregate")]
    EmptyCommittee,

    /// The caller cancelled a job in flight.
    #[error("Analysis cancelled")]
    Cancelled,

    /// A second submission was attempted while a job is in flight.
    #[error("A job is already active on this controller: {0}")]
    JobActive(String),
}

impl AnalysisError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn retryable(&self) -> bool {
        match self {
            AnalysisError::Validation(_) => false,
            AnalysisError::Submission { retryable, .. } => *retryable,
            AnalysisError::Stream(_) => true,
            AnalysisError::Poll(_) => true,
            AnalysisError::Timeout(_) => true,
            AnalysisError::EmptyCommittee => false,
            AnalysisError::Cancelled => false,
            AnalysisError::JobActive(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_flags() {
        assert!(!AnalysisError::Validation("empty".into()).retryable());
        assert!(AnalysisError::Submission {
            message: "503".into(),
            retryable: true
        }
        .retryable());
        assert!(!AnalysisError::Submission {
            message: "400".into(),
            retryable: false
        }
        .retryable());
        assert!(AnalysisError::Timeout(300).retryable());
        assert!(!AnalysisError::Cancelled.retryable());
        assert!(!AnalysisError::EmptyCommittee.retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = AnalysisError::Timeout(300);
        assert_eq!(err.to_string(), "Analysis timed out after 300s");

        let err = AnalysisError::Validation("pitch is empty".into());
        assert!(err.to_string().contains("pitch is empty"));
    }
}
