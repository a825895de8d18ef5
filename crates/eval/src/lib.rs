//! maze-eval: compliance evaluation runtime.
//!
//! Takes a loaded [`SopGraph`](maze_core::SopGraph), a case's facts, and
//! a model's free-text response, and resolves every decision point on
//! the case's branch path to correct, incorrect, skipped, or unknown.
//! Response matching is pluggable: a deterministic keyword baseline and
//! an LLM-assisted matcher ship in [`matcher`]. The [`runner`] evaluates
//! corpora concurrently and aggregates scores.

pub mod context;
pub mod evaluate;
pub mod matcher;
pub mod outcome;
pub mod rules;
pub mod runner;
pub mod score;

pub use context::{CaseContext, CaseRecord, RecordError};
pub use evaluate::{evaluate_instance, evaluate_trace, reachable_points};
pub use matcher::keyword::KeywordMatcher;
pub use matcher::llm::{LlmClient, LlmError, LlmMatcher, Message};
pub use matcher::{Choice, MatchError, ResponseMatcher, ResponseTrace, TraceEntry};
pub use outcome::{DecisionOutcome, DecisionRecord, EvaluationResult};
pub use rules::{eval_condition, History, Ternary};
pub use runner::{run_batch, BatchOutcome, CancelFlag, EvalConfig};
pub use score::{score_outcomes, CorpusAggregate, OutcomeCounts};

#[cfg(feature = "anthropic")]
pub use matcher::llm::AnthropicClient;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use maze_core::SopGraph;

    /// Linear three-point chain with a fact-gated first point.
    fn linear_graph() -> SopGraph {
        SopGraph::load(&serde_json::json!({
            "id": "escalation-sop",
            "roots": ["assess"],
            "decision_points": [
                {
                    "id": "assess",
                    "actions": [
                        {"id": "treat-high", "text": "treat as high risk",
                         "when": {"fact": "risk", "op": "=", "value": "high"},
                         "next": "confirm"},
                        {"id": "treat-low", "text": "treat as low risk",
                         "when": {"fact": "risk", "op": "=", "value": "low"},
                         "next": "confirm"}
                    ]
                },
                {
                    "id": "confirm",
                    "prerequisites": ["assess"],
                    "actions": [
                        {"id": "confirm-details", "text": "confirm the account details",
                         "next": "close"}
                    ]
                },
                {
                    "id": "close",
                    "actions": [
                        {"id": "close-low", "text": "close without review",
                         "when": {"fact": "risk", "op": "=", "value": "low"}},
                        {"id": "close-review", "text": "close after manual review",
                         "when": {"fact": "risk", "op": "=", "value": "high"}}
                    ]
                }
            ]
        }))
        .unwrap()
    }

    fn record(response: &str) -> CaseRecord {
        CaseRecord::from_json(&serde_json::json!({
            "case_id": "case-7",
            "sop_id": "escalation-sop",
            "facts": {"risk": "high"},
            "model_response": response,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn end_to_end_mixed_outcomes() {
        let graph = linear_graph();
        // Addresses the first and last points, never confirms details,
        // and closes the low-risk way on a high-risk case.
        let record = record("I would treat as high risk and then close without review.");

        let result = evaluate_instance(
            &graph,
            &record,
            &KeywordMatcher::new(),
            &EvalConfig::default(),
        )
        .await;

        let outcomes: Vec<(&str, DecisionOutcome)> = result
            .records
            .iter()
            .map(|r| (r.point.as_str(), r.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("assess", DecisionOutcome::Correct),
                ("confirm", DecisionOutcome::Skipped),
                ("close", DecisionOutcome::Incorrect),
            ]
        );
        assert_eq!(result.score, Some(1.0 / 3.0));
        assert!(!result.matcher_degraded);
        assert!(result.extraneous.is_empty());
    }

    #[tokio::test]
    async fn fully_compliant_response_scores_one() {
        let graph = linear_graph();
        let record = record(
            "Treat as high risk, confirm the account details, then close after manual review.",
        );
        let result = evaluate_instance(
            &graph,
            &record,
            &KeywordMatcher::new(),
            &EvalConfig::default(),
        )
        .await;
        assert_eq!(result.score, Some(1.0));
        assert!(result
            .records
            .iter()
            .all(|r| r.outcome == DecisionOutcome::Correct));
    }

    #[tokio::test]
    async fn missed_prerequisite_gates_downstream_weight() {
        let graph = linear_graph();
        let record = record("Treat as high risk, then close after manual review.");
        let config = EvalConfig {
            gated_weight: 0.5,
            ..EvalConfig::default()
        };
        let result = evaluate_instance(&graph, &record, &KeywordMatcher::new(), &config).await;

        // assess correct (1.0), confirm skipped (1.0), close correct but
        // its prerequisite-free weight still applies; only points listing
        // "confirm" as prerequisite would be gated. Here nothing gates
        // close, so the score is 2/3.
        assert_eq!(result.score, Some(2.0 / 3.0));

        // Same instance against a graph where close requires confirm.
        let gated_graph = SopGraph::load(&serde_json::json!({
            "id": "escalation-sop",
            "roots": ["assess"],
            "decision_points": [
                {
                    "id": "assess",
                    "actions": [
                        {"id": "treat-high", "text": "treat as high risk",
                         "when": {"fact": "risk", "op": "=", "value": "high"},
                         "next": "confirm"}
                    ]
                },
                {
                    "id": "confirm",
                    "actions": [
                        {"id": "confirm-details", "text": "confirm the account details",
                         "next": "close"}
                    ]
                },
                {
                    "id": "close",
                    "prerequisites": ["confirm"],
                    "actions": [
                        {"id": "close-review", "text": "close after manual review"}
                    ]
                }
            ]
        }))
        .unwrap();
        let result = evaluate_instance(&gated_graph, &record, &KeywordMatcher::new(), &config).await;
        // assess 1.0 correct, confirm 1.0 skipped, close 0.5 correct.
        let expected = (1.0 + 0.5) / (1.0 + 1.0 + 0.5);
        let score = result.score.unwrap();
        assert!((score - expected).abs() < 1e-12, "score {score}");
    }

    #[tokio::test]
    async fn corpus_batch_aggregates_across_cases() {
        use std::sync::Arc;

        let graph = Arc::new(linear_graph());
        let records = vec![
            record("Treat as high risk, confirm the account details, close after manual review."),
            record("Treat as low risk."),
        ];
        let outcome = run_batch(
            graph,
            records,
            Arc::new(KeywordMatcher::new()),
            EvalConfig::default(),
            CancelFlag::new(),
        )
        .await;

        assert_eq!(outcome.aggregate.instances, 2);
        assert_eq!(outcome.aggregate.mean_score(), Some(0.5));
        let assess = outcome.aggregate.per_point.get("assess").unwrap();
        assert_eq!(assess.correct, 1);
        assert_eq!(assess.incorrect, 1);
    }
}
