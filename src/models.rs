//! Data models for pitch analysis.
//!
//! This module contains the core data structures: the analysis job and its
//! state machine, per-agent results, committee votes, and the derived
//! consensus verdict.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job submitted yet.
    Idle,
    /// Job-creation request in flight.
    Submitting,
    /// Job accepted by the service; progress events expected.
    Processing,
    /// Terminal: full result payload attached.
    Completed,
    /// Terminal: failure attached.
    Failed,
}

impl JobStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Submitting => write!(f, "submitting"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A committee member's categorical investment vote.
///
/// Declared least-favorable first so that `Ord` ranks favorability: a more
/// favorable vote compares greater. Majority ties are broken by taking the
/// maximum, so the more favorable category wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Vote {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "HIGH_RISK")]
    HighRisk,
    #[serde(rename = "CONSIDER")]
    Consider,
    #[serde(rename = "STRONG_INVEST")]
    StrongInvest,
}

impl Vote {
    /// All vote categories, most favorable first.
    pub const ALL: [Vote; 4] = [Vote::StrongInvest, Vote::Consider, Vote::HighRisk, Vote::Pass];
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::StrongInvest => write!(f, "STRONG_INVEST"),
            Vote::Consider => write!(f, "CONSIDER"),
            Vote::HighRisk => write!(f, "HIGH_RISK"),
            Vote::Pass => write!(f, "PASS"),
        }
    }
}

/// The submitted pitch and optional auxiliary context.
///
/// Immutable once the job is submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInput {
    /// The pitch text.
    pub pitch: String,
    /// Optional website reference for additional context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
}

/// Terminal failure attached to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    /// Human-readable failure message.
    pub message: String,
    /// Whether resubmitting the same pitch could plausibly succeed.
    pub retryable: bool,
}

/// One agent's opinion on the pitch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Stable agent identifier (e.g. "MarketExpert", "FinanceExpert").
    pub agent_name: String,
    /// Whether the agent produced a usable analysis.
    pub success: bool,
    /// Agent-defined structured payload. Opaque to the core; the report
    /// layer decides what, if anything, to surface from it.
    #[serde(default)]
    pub data: Value,
    /// Error message, present only when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Confidence in [0, 1].
    #[serde(default)]
    pub confidence: f64,
}

impl AgentResult {
    /// Confidence with the failure invariant applied: a failed agent
    /// contributes zero regardless of what the payload claims.
    pub fn effective_confidence(&self) -> f64 {
        if self.success {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// One simulated investment-committee member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub personality: String,
    pub vote: Vote,
    /// Confidence in [0, 100].
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Committee half of a completed result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeData {
    pub members: Vec<CommitteeMember>,
    /// Externally adjudicated verdict. When present it overrides the
    /// computed majority (the majority is still reported for transparency).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_verdict: Option<Vote>,
    /// Pass-through free text, not computed here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_debate_points: Option<String>,
}

/// Full payload of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Raw per-agent results.
    #[serde(default)]
    pub agents: Vec<AgentResult>,
    /// Committee simulation output, when that service ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committee: Option<CommitteeData>,
    /// Recommendation from the non-committee analysis path. Pass-through;
    /// never feeds the computed verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// A normalized event about a job in flight.
///
/// Both the push channel and the poller produce this shape, so the
/// controller applies one set of rules regardless of source.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Non-terminal progress update.
    Progress {
        percent: Option<u8>,
        message: Option<String>,
    },
    /// Terminal success with the full payload.
    Completed(AnalysisResult),
    /// Terminal failure.
    Failed { message: String, retryable: bool },
    /// The push channel exhausted its reconnect attempts. Emitted exactly
    /// once; polling is the only source from this point.
    ChannelLost,
}

/// One analysis job, owned by exactly one controller for its lifetime.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    /// Service-assigned identifier; immutable once set.
    pub id: Option<String>,
    pub status: JobStatus,
    pub input: JobInput,
    /// 0–100, monotonically non-decreasing while processing.
    pub progress_percent: u8,
    /// Last human-readable status string received. May be empty.
    pub progress_message: String,
    /// Present only when `status` is `Completed`.
    pub result: Option<AnalysisResult>,
    /// Present only when `status` is `Failed`.
    pub error: Option<JobFailure>,
}

impl AnalysisJob {
    /// Create a fresh idle job.
    pub fn new() -> Self {
        Self {
            id: None,
            status: JobStatus::Idle,
            input: JobInput::default(),
            progress_percent: 0,
            progress_message: String::new(),
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one event to the job state. Returns `true` if the event was
    /// consumed, `false` if it was ignored.
    ///
    /// Rules:
    /// - Events after a terminal state are ignored (first terminal wins).
    /// - Progress percentages are clamped to 0–100 and never decrease,
    ///   since push and poll delivery may race and reconnects void any
    ///   cross-connection ordering.
    /// - A completion only transitions with its full payload attached.
    pub fn apply(&mut self, event: ProgressEvent) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }

        match event {
            ProgressEvent::Progress { percent, message } => {
                if let Some(p) = percent {
                    self.progress_percent = self.progress_percent.max(p.min(100));
                }
                if let Some(m) = message {
                    if !m.is_empty() {
                        self.progress_message = m;
                    }
                }
                true
            }
            ProgressEvent::Completed(result) => {
                self.progress_percent = 100;
                self.result = Some(result);
                self.status = JobStatus::Completed;
                true
            }
            ProgressEvent::Failed { message, retryable } => {
                self.fail(JobFailure { message, retryable });
                true
            }
            // Not a job-state event; the controller reacts by switching
            // its event source.
            ProgressEvent::ChannelLost => false,
        }
    }

    /// Force the job into `Failed` with the given failure.
    ///
    /// No-op if already terminal.
    pub fn fail(&mut self, failure: JobFailure) {
        if self.is_terminal() {
            return;
        }
        self.error = Some(failure);
        self.status = JobStatus::Failed;
    }

    /// Read-only view for consumers.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress_percent: self.progress_percent,
            progress_message: self.progress_message.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

impl Default for AnalysisJob {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only snapshot of a job, the only surface the view layer sees.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Option<String>,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub progress_message: String,
    pub result: Option<AnalysisResult>,
    pub error: Option<JobFailure>,
}

/// Per-category vote count, kept for the report layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteCount {
    pub vote: Vote,
    pub count: usize,
    /// Percentage of total members, in [0, 100].
    pub percent: f64,
}

/// The adjudicated committee verdict. Derived, never stored input.
#[derive(Debug, Clone, Serialize)]
pub struct CommitteeVerdict {
    /// Plurality vote among members (favorability tie-break).
    pub majority_vote: Vote,
    /// Equal to `majority_vote` unless the source data supplied its own
    /// adjudication, in which case the supplied value wins.
    pub final_verdict: Vote,
    /// Fraction of members agreeing with the majority, in [0, 1].
    pub consensus_score: f64,
    /// One line per dissenting member, in original member order.
    pub dissenting_opinions: Vec<String>,
    /// Pass-through from source data.
    pub key_debate_points: Option<String>,
    /// Full tally, most favorable category first.
    pub tally: Vec<VoteCount>,
}
