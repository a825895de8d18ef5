//! Batch runner: evaluate a corpus of case records concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use maze_core::SopGraph;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::context::CaseRecord;
use crate::evaluate::evaluate_instance;
use crate::matcher::ResponseMatcher;
use crate::outcome::EvaluationResult;
use crate::score::CorpusAggregate;

/// Evaluation knobs, threaded explicitly through the runner.
#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    /// Wall-clock budget for one matcher call.
    pub matcher_timeout: Duration,
    /// Instances evaluated concurrently.
    pub workers: usize,
    /// Weight applied to a point whose prerequisites were mishandled.
    pub gated_weight: f64,
}

impl Default for EvalConfig {
    fn default() -> EvalConfig {
        EvalConfig {
            matcher_timeout: Duration::from_secs(30),
            workers: 4,
            gated_weight: 1.0,
        }
    }
}

/// Cooperative cancellation for a running batch. Instances already
/// dispatched run to completion; instances not yet dispatched are
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a batch run produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Instance results in input order (cancelled instances omitted).
    pub results: Vec<EvaluationResult>,
    /// Corpus aggregate over the evaluated instances.
    pub aggregate: CorpusAggregate,
    /// True when the batch was cancelled before draining the corpus.
    pub cancelled: bool,
}

/// Evaluate every record against the definition, at most
/// `config.workers` at a time, and fold the results into a corpus
/// aggregate.
///
/// One slow or failing instance never blocks the rest: timeouts and
/// matcher failures degrade that instance, and the aggregate is reduced
/// by the single caller task, so totals match a sequential fold
/// regardless of completion order.
pub async fn run_batch(
    graph: Arc<SopGraph>,
    records: Vec<CaseRecord>,
    matcher: Arc<dyn ResponseMatcher>,
    config: EvalConfig,
    cancel: CancelFlag,
) -> BatchOutcome {
    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut tasks: JoinSet<Option<(usize, EvaluationResult)>> = JoinSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let graph = Arc::clone(&graph);
        let matcher = Arc::clone(&matcher);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            // Semaphore is never closed, so acquire cannot fail.
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            if cancel.is_cancelled() {
                return None;
            }
            let result = evaluate_instance(&graph, &record, matcher.as_ref(), &config).await;
            Some((index, result))
        });
    }

    let mut indexed: Vec<(usize, EvaluationResult)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Ok(Some(entry)) = joined {
            indexed.push(entry);
        }
    }
    indexed.sort_by_key(|(index, _)| *index);

    let mut aggregate = CorpusAggregate::new();
    let results: Vec<EvaluationResult> = indexed
        .into_iter()
        .map(|(_, result)| {
            aggregate.fold(&result);
            result
        })
        .collect();

    BatchOutcome {
        results,
        aggregate,
        cancelled: cancel.is_cancelled(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CaseContext;
    use crate::matcher::keyword::KeywordMatcher;
    use crate::matcher::{MatchError, ResponseTrace};
    use crate::outcome::DecisionOutcome;
    use async_trait::async_trait;

    fn graph() -> Arc<SopGraph> {
        Arc::new(
            SopGraph::load(&serde_json::json!({
                "id": "refund-sop",
                "roots": ["triage"],
                "decision_points": [
                    {
                        "id": "triage",
                        "actions": [
                            {"id": "escalate", "text": "escalate to a supervisor",
                             "when": {"fact": "risk", "op": "=", "value": "high"}},
                            {"id": "refund", "text": "issue a refund",
                             "when": {"fact": "risk", "op": "=", "value": "low"}}
                        ]
                    }
                ]
            }))
            .unwrap(),
        )
    }

    fn record(case_id: &str, risk: &str, response: &str) -> CaseRecord {
        CaseRecord {
            case_id: case_id.to_string(),
            sop_id: "refund-sop".to_string(),
            facts: CaseContext::load(&serde_json::json!({"risk": risk})).unwrap(),
            model_response: response.to_string(),
        }
    }

    #[tokio::test]
    async fn batch_evaluates_all_records_in_input_order() {
        let records = vec![
            record("case-1", "high", "escalate to a supervisor"),
            record("case-2", "low", "escalate to a supervisor"),
            record("case-3", "low", "issue a refund"),
        ];
        let outcome = run_batch(
            graph(),
            records,
            Arc::new(KeywordMatcher::new()),
            EvalConfig::default(),
            CancelFlag::new(),
        )
        .await;

        assert!(!outcome.cancelled);
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.case_id.as_str()).collect();
        assert_eq!(ids, vec!["case-1", "case-2", "case-3"]);
        assert_eq!(outcome.results[0].score, Some(1.0));
        assert_eq!(outcome.results[1].score, Some(0.0));
        assert_eq!(outcome.aggregate.instances, 3);
        assert_eq!(outcome.aggregate.scored_instances, 3);
        let counts = outcome.aggregate.per_point.get("triage").unwrap();
        assert_eq!(counts.correct, 2);
        assert_eq!(counts.incorrect, 1);
    }

    #[tokio::test]
    async fn single_worker_still_drains_the_corpus() {
        let records = vec![
            record("case-1", "high", "escalate"),
            record("case-2", "low", "refund"),
        ];
        let config = EvalConfig {
            workers: 1,
            ..EvalConfig::default()
        };
        let outcome = run_batch(
            graph(),
            records,
            Arc::new(KeywordMatcher::new()),
            config,
            CancelFlag::new(),
        )
        .await;
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn failing_instances_do_not_block_the_rest() {
        struct FlakyMatcher;
        #[async_trait]
        impl crate::matcher::ResponseMatcher for FlakyMatcher {
            async fn match_response(
                &self,
                response: &str,
                _graph: &SopGraph,
            ) -> Result<ResponseTrace, MatchError> {
                if response.contains("boom") {
                    Err(MatchError::Failed("backend error".to_string()))
                } else {
                    Ok(ResponseTrace::default())
                }
            }
        }

        let records = vec![
            record("case-1", "high", "boom"),
            record("case-2", "high", "fine"),
        ];
        let outcome = run_batch(
            graph(),
            records,
            Arc::new(FlakyMatcher),
            EvalConfig::default(),
            CancelFlag::new(),
        )
        .await;

        assert_eq!(outcome.aggregate.instances, 2);
        assert_eq!(outcome.aggregate.degraded_instances, 1);
        assert!(outcome.results[0].matcher_degraded);
        assert_eq!(
            outcome.results[0].records[0].outcome,
            DecisionOutcome::Unknown
        );
        // The healthy instance scored normally (skipped its only point).
        assert!(!outcome.results[1].matcher_degraded);
        assert_eq!(outcome.results[1].score, Some(0.0));
    }

    #[tokio::test]
    async fn pre_cancelled_batch_dispatches_nothing() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let records = vec![record("case-1", "high", "escalate")];
        let outcome = run_batch(
            graph(),
            records,
            Arc::new(KeywordMatcher::new()),
            EvalConfig::default(),
            cancel,
        )
        .await;
        assert!(outcome.cancelled);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.aggregate.instances, 0);
    }
}
