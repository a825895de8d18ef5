//! Instance scoring and corpus aggregation.

use std::collections::BTreeMap;

use maze_core::SopGraph;

use crate::outcome::{DecisionOutcome, DecisionRecord, EvaluationResult};
use crate::runner::EvalConfig;

/// Weighted compliance score for one instance.
///
/// A point whose prerequisites were mishandled (incorrect or skipped)
/// carries the configured gated weight instead of 1.0. `Unknown` points
/// are excluded from both numerator and denominator: a context gap must
/// not move the score either way. Returns None when nothing was
/// scorable.
pub fn score_outcomes(
    records: &[DecisionRecord],
    graph: &SopGraph,
    config: &EvalConfig,
) -> Option<f64> {
    let outcomes: BTreeMap<&str, DecisionOutcome> = records
        .iter()
        .map(|r| (r.point.as_str(), r.outcome))
        .collect();

    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for record in records {
        if record.outcome == DecisionOutcome::Unknown {
            continue;
        }
        let gated = graph.get(&record.point).is_some_and(|point| {
            point.prerequisites.iter().any(|prereq| {
                matches!(
                    outcomes.get(prereq.as_str()),
                    Some(DecisionOutcome::Incorrect) | Some(DecisionOutcome::Skipped)
                )
            })
        });
        let weight = if gated { config.gated_weight } else { 1.0 };

        denominator += weight;
        if record.outcome == DecisionOutcome::Correct {
            numerator += weight;
        }
    }

    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Outcome tallies for one decision point across a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub correct: usize,
    pub incorrect: usize,
    pub skipped: usize,
    pub unknown: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: DecisionOutcome) {
        match outcome {
            DecisionOutcome::Correct => self.correct += 1,
            DecisionOutcome::Incorrect => self.incorrect += 1,
            DecisionOutcome::Skipped => self.skipped += 1,
            DecisionOutcome::Unknown => self.unknown += 1,
        }
    }

    fn add(&mut self, other: &OutcomeCounts) {
        self.correct += other.correct;
        self.incorrect += other.incorrect;
        self.skipped += other.skipped;
        self.unknown += other.unknown;
    }

    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.skipped + self.unknown
    }
}

/// Corpus-level aggregate, built by folding instance results in any
/// order. `merge` is commutative so partial aggregates from concurrent
/// workers combine to the same totals.
#[derive(Debug, Clone, Default)]
pub struct CorpusAggregate {
    /// Instances evaluated.
    pub instances: usize,
    /// Instances that produced a score.
    pub scored_instances: usize,
    /// Sum of instance scores (over scored instances only).
    pub score_sum: f64,
    /// Instances where the matcher failed or timed out.
    pub degraded_instances: usize,
    /// Per-decision-point outcome tallies.
    pub per_point: BTreeMap<String, OutcomeCounts>,
}

impl CorpusAggregate {
    pub fn new() -> CorpusAggregate {
        CorpusAggregate::default()
    }

    pub fn fold(&mut self, result: &EvaluationResult) {
        self.instances += 1;
        if let Some(score) = result.score {
            self.scored_instances += 1;
            self.score_sum += score;
        }
        if result.matcher_degraded {
            self.degraded_instances += 1;
        }
        for record in &result.records {
            self.per_point
                .entry(record.point.clone())
                .or_default()
                .record(record.outcome);
        }
    }

    pub fn merge(&mut self, other: &CorpusAggregate) {
        self.instances += other.instances;
        self.scored_instances += other.scored_instances;
        self.score_sum += other.score_sum;
        self.degraded_instances += other.degraded_instances;
        for (point, counts) in &other.per_point {
            self.per_point.entry(point.clone()).or_default().add(counts);
        }
    }

    /// Mean of scored instances; None when no instance was scorable.
    pub fn mean_score(&self) -> Option<f64> {
        if self.scored_instances == 0 {
            None
        } else {
            Some(self.score_sum / self.scored_instances as f64)
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "instances": self.instances,
            "scored_instances": self.scored_instances,
            "mean_score": self.mean_score(),
            "degraded_instances": self.degraded_instances,
            "per_point": self.per_point.iter().map(|(point, c)| {
                (point.clone(), serde_json::json!({
                    "correct": c.correct,
                    "incorrect": c.incorrect,
                    "skipped": c.skipped,
                    "unknown": c.unknown,
                }))
            }).collect::<serde_json::Map<_, _>>(),
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_prereq() -> SopGraph {
        SopGraph::load(&serde_json::json!({
            "id": "prereq-sop",
            "roots": ["gate"],
            "decision_points": [
                {
                    "id": "gate",
                    "actions": [{"id": "open", "text": "open the gate", "next": "inner"}]
                },
                {
                    "id": "inner",
                    "prerequisites": ["gate"],
                    "actions": [{"id": "act", "text": "act inside"}]
                }
            ]
        }))
        .unwrap()
    }

    fn rec(point: &str, outcome: DecisionOutcome) -> DecisionRecord {
        DecisionRecord {
            point: point.to_string(),
            outcome,
            action: None,
        }
    }

    fn result(score: Option<f64>, degraded: bool, records: Vec<DecisionRecord>) -> EvaluationResult {
        EvaluationResult {
            case_id: "case".to_string(),
            sop_id: "sop".to_string(),
            records,
            score,
            extraneous: Vec::new(),
            matcher_degraded: degraded,
            evaluated_at: "2026-08-29T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn plain_ratio_without_prereqs() {
        let g = graph_with_prereq();
        let records = vec![
            rec("gate", DecisionOutcome::Correct),
            rec("inner", DecisionOutcome::Incorrect),
        ];
        let score = score_outcomes(&records, &g, &EvalConfig::default());
        assert_eq!(score, Some(0.5));
    }

    #[test]
    fn unknown_excluded_from_both_sides() {
        let g = graph_with_prereq();
        let records = vec![
            rec("gate", DecisionOutcome::Correct),
            rec("inner", DecisionOutcome::Unknown),
        ];
        assert_eq!(
            score_outcomes(&records, &g, &EvalConfig::default()),
            Some(1.0)
        );
    }

    #[test]
    fn correct_incorrect_unknown_scores_half() {
        let g = SopGraph::load(&serde_json::json!({
            "id": "trio",
            "roots": ["a"],
            "decision_points": [
                {"id": "a", "actions": [{"id": "a1", "text": "do a", "next": "b"}]},
                {"id": "b", "actions": [{"id": "b1", "text": "do b", "next": "c"}]},
                {"id": "c", "actions": [{"id": "c1", "text": "do c"}]}
            ]
        }))
        .unwrap();
        let records = vec![
            rec("a", DecisionOutcome::Correct),
            rec("b", DecisionOutcome::Incorrect),
            rec("c", DecisionOutcome::Unknown),
        ];
        assert_eq!(
            score_outcomes(&records, &g, &EvalConfig::default()),
            Some(0.5)
        );
    }

    #[test]
    fn all_unknown_is_unscorable() {
        let g = graph_with_prereq();
        let records = vec![
            rec("gate", DecisionOutcome::Unknown),
            rec("inner", DecisionOutcome::Unknown),
        ];
        assert_eq!(score_outcomes(&records, &g, &EvalConfig::default()), None);
    }

    #[test]
    fn gated_weight_applies_after_missed_prerequisite() {
        let g = graph_with_prereq();
        let config = EvalConfig {
            gated_weight: 0.5,
            ..EvalConfig::default()
        };
        // Gate skipped, inner correct: inner weighs 0.5.
        let records = vec![
            rec("gate", DecisionOutcome::Skipped),
            rec("inner", DecisionOutcome::Correct),
        ];
        // numerator 0.5, denominator 1.0 + 0.5
        let score = score_outcomes(&records, &g, &config).unwrap();
        assert!((score - 0.5 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn correct_prerequisite_keeps_full_weight() {
        let g = graph_with_prereq();
        let config = EvalConfig {
            gated_weight: 0.5,
            ..EvalConfig::default()
        };
        let records = vec![
            rec("gate", DecisionOutcome::Correct),
            rec("inner", DecisionOutcome::Correct),
        ];
        assert_eq!(score_outcomes(&records, &g, &config), Some(1.0));
    }

    #[test]
    fn aggregate_folds_and_means() {
        let mut agg = CorpusAggregate::new();
        agg.fold(&result(
            Some(1.0),
            false,
            vec![rec("gate", DecisionOutcome::Correct)],
        ));
        agg.fold(&result(
            Some(0.0),
            false,
            vec![rec("gate", DecisionOutcome::Incorrect)],
        ));
        agg.fold(&result(None, true, vec![rec("gate", DecisionOutcome::Unknown)]));

        assert_eq!(agg.instances, 3);
        assert_eq!(agg.scored_instances, 2);
        assert_eq!(agg.degraded_instances, 1);
        assert_eq!(agg.mean_score(), Some(0.5));
        let counts = agg.per_point.get("gate").unwrap();
        assert_eq!(counts.correct, 1);
        assert_eq!(counts.incorrect, 1);
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn merge_matches_sequential_fold() {
        let results = vec![
            result(Some(1.0), false, vec![rec("gate", DecisionOutcome::Correct)]),
            result(Some(0.5), false, vec![rec("inner", DecisionOutcome::Skipped)]),
            result(None, true, vec![rec("gate", DecisionOutcome::Unknown)]),
        ];

        let mut sequential = CorpusAggregate::new();
        for r in &results {
            sequential.fold(r);
        }

        let mut left = CorpusAggregate::new();
        left.fold(&results[2]);
        let mut right = CorpusAggregate::new();
        right.fold(&results[0]);
        right.fold(&results[1]);
        left.merge(&right);

        assert_eq!(left.instances, sequential.instances);
        assert_eq!(left.scored_instances, sequential.scored_instances);
        assert_eq!(left.score_sum, sequential.score_sum);
        assert_eq!(left.degraded_instances, sequential.degraded_instances);
        assert_eq!(left.per_point, sequential.per_point);
    }

    #[test]
    fn empty_aggregate_has_no_mean() {
        let agg = CorpusAggregate::new();
        assert_eq!(agg.mean_score(), None);
        assert!(agg.to_json()["mean_score"].is_null());
    }
}
