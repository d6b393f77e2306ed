//! Vote aggregation and dissent extraction.
//!
//! Turns a committee member list into a [`CommitteeVerdict`]: tally,
//! majority with an explicit favorability tie-break, consensus score, and
//! one traceable line per dissenting member. Deterministic, no I/O, input
//! never mutated.

use crate::error::AnalysisError;
use crate::models::{CommitteeData, CommitteeMember, CommitteeVerdict, Vote, VoteCount};

/// Count members per vote category. Categories are reported most favorable
/// first, including zero-count ones, so the report always shows the full
/// scale.
pub fn tally_votes(members: &[CommitteeMember]) -> Vec<VoteCount> {
    let total = members.len();

    Vote::ALL
        .iter()
        .map(|&vote| {
            let count = members.iter().filter(|m| m.vote == vote).count();
            let percent = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            VoteCount {
                vote,
                count,
                percent,
            }
        })
        .collect()
}

/// The plurality vote. Ties break toward the more favorable category:
/// `STRONG_INVEST > CONSIDER > HIGH_RISK > PASS`.
pub fn majority_vote(members: &[CommitteeMember]) -> Result<Vote, AnalysisError> {
    if members.is_empty() {
        return Err(AnalysisError::EmptyCommittee);
    }

    let tally = tally_votes(members);
    let max_count = tally.iter().map(|t| t.count).max().unwrap_or(0);

    // `Vote` orders by favorability, so max() picks the favorable side of
    // a tie.
    tally
        .iter()
        .filter(|t| t.count == max_count)
        .map(|t| t.vote)
        .max()
        .ok_or(AnalysisError::EmptyCommittee)
}

/// Fraction of members agreeing with the majority, in [0, 1].
///
/// Deliberately not the mean of member confidences: agreement strength is
/// about how many voted together, not how sure each felt.
pub fn consensus_score(members: &[CommitteeMember], majority: Vote) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let agreeing = members.iter().filter(|m| m.vote == majority).count();
    agreeing as f64 / members.len() as f64
}

/// One explanation line per member whose vote differs from the majority,
/// in original member order.
pub fn dissenting_opinions(members: &[CommitteeMember], majority: Vote) -> Vec<String> {
    members
        .iter()
        .filter(|m| m.vote != majority)
        .map(|m| format!("{} voted {} — {}", m.name, m.vote, m.reasoning))
        .collect()
}

/// Compute the full verdict for a committee.
///
/// When the source data carries its own `final_verdict`, that external
/// adjudication wins and the computed majority is retained alongside it.
pub fn aggregate(committee: &CommitteeData) -> Result<CommitteeVerdict, AnalysisError> {
    let members = &committee.members;
    let majority = majority_vote(members)?;

    Ok(CommitteeVerdict {
        majority_vote: majority,
        final_verdict: committee.final_verdict.unwrap_or(majority),
        consensus_score: consensus_score(members, majority),
        dissenting_opinions: dissenting_opinions(members, majority),
        key_debate_points: committee.key_debate_points.clone(),
        tally: tally_votes(members),
    })
}
