//! Markdown and JSON verdict reports.
//!
//! Renders a completed job's snapshot and computed committee verdict into a
//! report. Strictly a read-only consumer of the job snapshot and the
//! aggregator's output.

use crate::models::{AgentResult, CommitteeVerdict, JobSnapshot};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata about one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Base URL of the analysis service.
    pub service_url: String,
    /// Service-assigned job id.
    pub job_id: String,
    /// When the report was generated.
    pub analysis_date: DateTime<Utc>,
    /// Wall-clock duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete verdict report.
#[derive(Debug, Clone, Serialize)]
pub struct VerdictReport {
    pub metadata: ReportMetadata,
    /// Final job snapshot.
    pub job: JobSnapshot,
    /// Computed committee verdict, when committee data was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<CommitteeVerdict>,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &VerdictReport) -> String {
    let mut output = String::new();

    output.push_str("# PitchVet Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    if let Some(ref result) = report.job.result {
        output.push_str(&generate_agents_section(&result.agents));

        if let Some(ref recommendation) = result.recommendation {
            output.push_str("## Analyst Recommendation\n\n");
            output.push_str(recommendation);
            output.push_str("\n\n");
        }
    }

    if let Some(ref verdict) = report.verdict {
        output.push_str(&generate_verdict_section(verdict));
        output.push_str(&generate_dissent_section(verdict));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Service:** {}\n", metadata.service_url));
    section.push_str(&format!("- **Job:** `{}`\n", metadata.job_id));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the per-agent opinion table.
fn generate_agents_section(agents: &[AgentResult]) -> String {
    if agents.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Agent Opinions\n\n");
    section.push_str("| Agent | Status | Confidence |\n");
    section.push_str("|:---|:---:|:---:|\n");

    for agent in agents {
        let status = if agent.success {
            "✅ ok".to_string()
        } else {
            format!("❌ {}", agent.error.as_deref().unwrap_or("failed"))
        };
        section.push_str(&format!(
            "| {} | {} | {:.0}% |\n",
            agent.agent_name,
            status,
            agent.effective_confidence() * 100.0
        ));
    }
    section.push('\n');

    section
}

/// Generate the committee verdict section with the full tally.
fn generate_verdict_section(verdict: &CommitteeVerdict) -> String {
    let mut section = String::new();

    section.push_str("## Committee Verdict\n\n");
    section.push_str(&format!("- **Final Verdict:** {}\n", verdict.final_verdict));
    if verdict.final_verdict != verdict.majority_vote {
        // The adjudication overrode the raw vote; show both.
        section.push_str(&format!(
            "- **Majority Vote (overridden):** {}\n",
            verdict.majority_vote
        ));
    } else {
        section.push_str(&format!("- **Majority Vote:** {}\n", verdict.majority_vote));
    }
    section.push_str(&format!(
        "- **Consensus:** {:.0}% of members agree\n",
        verdict.consensus_score * 100.0
    ));
    section.push('\n');

    section.push_str("### Vote Tally\n\n");
    section.push_str("| Vote | Members | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for count in &verdict.tally {
        section.push_str(&format!(
            "| {} | {} | {:.0}% |\n",
            count.vote, count.count, count.percent
        ));
    }
    section.push('\n');

    if let Some(ref points) = verdict.key_debate_points {
        section.push_str("### Key Debate Points\n\n");
        section.push_str(points);
        section.push_str("\n\n");
    }

    section
}

/// Generate the dissenting opinions section.
fn generate_dissent_section(verdict: &CommitteeVerdict) -> String {
    if verdict.dissenting_opinions.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Dissenting Opinions\n\n");
    for opinion in &verdict.dissenting_opinions {
        section.push_str(&format!("- {}\n", opinion));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by PitchVet*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &VerdictReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::aggregate;
    use crate::models::{
        AnalysisJob, AnalysisResult, CommitteeData, CommitteeMember, JobStatus, ProgressEvent,
        Vote,
    };

    fn create_test_report() -> VerdictReport {
        let committee = CommitteeData {
            members: vec![
                CommitteeMember {
                    name: "Ava".to_string(),
                    role: "Growth Partner".to_string(),
                    personality: "optimist".to_string(),
                    vote: Vote::StrongInvest,
                    confidence: 90.0,
                    analysis: String::new(),
                    reasoning: "category leader potential".to_string(),
                },
                CommitteeMember {
                    name: "Bram".to_string(),
                    role: "Risk Partner".to_string(),
                    personality: "skeptic".to_string(),
                    vote: Vote::Pass,
                    confidence: 70.0,
                    analysis: String::new(),
                    reasoning: "unit economics unproven".to_string(),
                },
            ],
            final_verdict: None,
            key_debate_points: Some("Market timing vs. burn rate".to_string()),
        };

        let result = AnalysisResult {
            agents: vec![AgentResult {
                agent_name: "MarketExpert".to_string(),
                success: true,
                data: serde_json::Value::Null,
                error: None,
                confidence: 0.85,
            }],
            committee: Some(committee.clone()),
            recommendation: None,
        };

        let mut job = AnalysisJob::new();
        job.id = Some("job-42".to_string());
        job.status = JobStatus::Processing;
        job.apply(ProgressEvent::Completed(result));

        VerdictReport {
            metadata: ReportMetadata {
                service_url: "http://localhost:8080".to_string(),
                job_id: "job-42".to_string(),
                analysis_date: Utc::now(),
                duration_seconds: 42.0,
            },
            job: job.snapshot(),
            verdict: Some(aggregate(&committee).unwrap()),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# PitchVet Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Agent Opinions"));
        assert!(markdown.contains("MarketExpert"));
        assert!(markdown.contains("## Committee Verdict"));
        assert!(markdown.contains("STRONG_INVEST"));
        assert!(markdown.contains("## Dissenting Opinions"));
        assert!(markdown.contains("Bram voted PASS — unit economics unproven"));
        assert!(markdown.contains("Market timing vs. burn rate"));
    }

    #[test]
    fn test_override_shown_when_verdicts_differ() {
        let mut report = create_test_report();
        if let Some(ref mut verdict) = report.verdict {
            verdict.final_verdict = Vote::Consider;
        }

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("**Final Verdict:** CONSIDER"));
        assert!(markdown.contains("Majority Vote (overridden)"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"job_id\""));
        assert!(json.contains("\"verdict\""));
        assert!(json.contains("\"dissenting_opinions\""));
    }
}
