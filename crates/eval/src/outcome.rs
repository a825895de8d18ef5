//! Per-point outcomes and the per-instance evaluation result.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Final state of one decision point after evaluation.
///
/// Every point starts pending and resolves to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Addressed, unambiguous, and the chosen action's rule held.
    Correct,
    /// Addressed but the chosen action's rule did not hold.
    Incorrect,
    /// Reachable for this case but never addressed in the response.
    Skipped,
    /// Could not be judged: the match was ambiguous, a rule read
    /// missing case data, or the matcher degraded.
    Unknown,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Correct => "correct",
            DecisionOutcome::Incorrect => "incorrect",
            DecisionOutcome::Skipped => "skipped",
            DecisionOutcome::Unknown => "unknown",
        }
    }
}

/// One decision point's resolution within an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRecord {
    pub point: String,
    pub outcome: DecisionOutcome,
    /// The action the response committed to, when one was identified.
    pub action: Option<String>,
}

/// Everything produced by evaluating one response against one definition.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub case_id: String,
    pub sop_id: String,
    /// One record per reachable decision point, in traversal order.
    pub records: Vec<DecisionRecord>,
    /// Weighted compliance score, or None when no point was scorable.
    pub score: Option<f64>,
    /// Matcher references that named no decision point in the definition.
    pub extraneous: Vec<String>,
    /// True when the matcher failed or timed out and reachable points
    /// were degraded to Unknown.
    pub matcher_degraded: bool,
    /// RFC 3339 timestamp taken when evaluation finished.
    pub evaluated_at: String,
}

impl EvaluationResult {
    pub fn now_timestamp() -> String {
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::new())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "case_id": self.case_id,
            "sop_id": self.sop_id,
            "decisions": self.records.iter().map(|r| {
                serde_json::json!({
                    "point": r.point,
                    "outcome": r.outcome.as_str(),
                    "action": r.action,
                })
            }).collect::<Vec<_>>(),
            "score": self.score,
            "extraneous": self.extraneous,
            "matcher_degraded": self.matcher_degraded,
            "evaluated_at": self.evaluated_at,
        })
    }
}
