//! Instance evaluation: resolve every reachable decision point to an
//! outcome given the case facts and the matcher's reading of the
//! response.

use std::collections::BTreeSet;

use maze_core::SopGraph;

use crate::context::{CaseContext, CaseRecord};
use crate::matcher::{Choice, ResponseMatcher, ResponseTrace};
use crate::outcome::{DecisionOutcome, DecisionRecord, EvaluationResult};
use crate::rules::{eval_condition, History, Ternary};
use crate::runner::EvalConfig;
use crate::score::score_outcomes;

/// Decision points on the case's branch path.
///
/// Forward closure from the roots following the `next` edges of actions
/// whose applicability rule does not evaluate false against the case
/// facts. Indeterminate branches are kept: a context gap must not
/// silently shrink the set of points a response is judged on.
pub fn reachable_points(graph: &SopGraph, ctx: &CaseContext) -> BTreeSet<String> {
    let empty = History::new();
    let mut reachable: BTreeSet<String> = BTreeSet::new();
    let mut queue: Vec<&str> = graph.roots.iter().map(String::as_str).collect();

    while let Some(point_id) = queue.pop() {
        if !reachable.insert(point_id.to_string()) {
            continue;
        }
        let Some(point) = graph.get(point_id) else {
            continue;
        };
        for action in &point.actions {
            if eval_condition(&action.when, ctx, &empty) == Ternary::False {
                continue;
            }
            if let Some(next) = &action.next {
                if !reachable.contains(next) {
                    queue.push(next);
                }
            }
        }
    }

    reachable
}

/// Resolve each reachable point against the matcher's trace.
///
/// Points are visited in traversal order so that choices recorded at
/// earlier points are visible to `chose` rules at later ones. The chosen
/// action enters the history whether its rule held or not: a later rule
/// asking "did the response choose X at P" cares about what was chosen,
/// not whether it was right.
pub fn evaluate_trace(
    graph: &SopGraph,
    ctx: &CaseContext,
    trace: &ResponseTrace,
    reachable: &BTreeSet<String>,
) -> Vec<DecisionRecord> {
    let mut history = History::new();
    let mut records = Vec::new();

    for point in graph.traversal_order() {
        if !reachable.contains(&point.id) {
            continue;
        }

        let (outcome, chosen) = match trace.choice_for(&point.id) {
            None => (DecisionOutcome::Skipped, None),
            Some(Choice::Ambiguous(_)) => (DecisionOutcome::Unknown, None),
            Some(Choice::Selected(action_id)) => match point.action(action_id) {
                // Matchers validate ids against the definition, so this
                // arm only fires for a hand-built trace.
                None => (DecisionOutcome::Unknown, None),
                Some(action) => {
                    let outcome = match eval_condition(&action.when, ctx, &history) {
                        Ternary::True => DecisionOutcome::Correct,
                        Ternary::False => DecisionOutcome::Incorrect,
                        Ternary::Indeterminate => DecisionOutcome::Unknown,
                    };
                    (outcome, Some(action.id.clone()))
                }
            },
        };

        if let Some(action_id) = &chosen {
            history.insert(point.id.clone(), action_id.clone());
        }
        records.push(DecisionRecord {
            point: point.id.clone(),
            outcome,
            action: chosen,
        });
    }

    records
}

/// Evaluate one case record end to end: match the response, resolve
/// every reachable point, and score the instance.
///
/// Matcher failure or timeout never fails the instance; the reachable
/// points degrade to `Unknown` and the result is flagged.
pub async fn evaluate_instance(
    graph: &SopGraph,
    record: &CaseRecord,
    matcher: &dyn ResponseMatcher,
    config: &EvalConfig,
) -> EvaluationResult {
    let reachable = reachable_points(graph, &record.facts);

    let matched = tokio::time::timeout(
        config.matcher_timeout,
        matcher.match_response(&record.model_response, graph),
    )
    .await;

    let (records, extraneous, degraded) = match matched {
        Ok(Ok(trace)) => {
            let records = evaluate_trace(graph, &record.facts, &trace, &reachable);
            (records, trace.extraneous, false)
        }
        // Failed or timed out: every reachable point is unjudgeable.
        Ok(Err(_)) | Err(_) => {
            let records = graph
                .traversal_order()
                .into_iter()
                .filter(|p| reachable.contains(&p.id))
                .map(|point| DecisionRecord {
                    point: point.id.clone(),
                    outcome: DecisionOutcome::Unknown,
                    action: None,
                })
                .collect();
            (records, Vec::new(), true)
        }
    };

    let score = score_outcomes(&records, graph, config);

    EvaluationResult {
        case_id: record.case_id.clone(),
        sop_id: record.sop_id.clone(),
        records,
        score,
        extraneous,
        matcher_degraded: degraded,
        evaluated_at: EvaluationResult::now_timestamp(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
