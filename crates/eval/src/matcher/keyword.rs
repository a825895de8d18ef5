//! Deterministic keyword/phrase matcher.
//!
//! Both the response and every keyword are normalized (lowercased,
//! whitespace collapsed) before substring search, so casing and
//! formatting differences do not affect the outcome. Matching is pure:
//! the same response and definition always produce the same trace.
//!
//! The search is plain substring, with no word boundaries: the keyword
//! `refund` also fires inside "non-refundable". Definition authors
//! should prefer multi-word anchors for actions whose short names occur
//! inside unrelated words.

use async_trait::async_trait;
use maze_core::{normalize, SopGraph};

use super::{Choice, MatchError, ResponseMatcher, ResponseTrace, TraceEntry};

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> KeywordMatcher {
        KeywordMatcher
    }

    fn trace(&self, response: &str, graph: &SopGraph) -> ResponseTrace {
        let haystack = normalize(response);

        // For each point: earliest keyword hit per action, if any.
        // (position, point, matched action ids ordered by first hit)
        let mut hits: Vec<(usize, String, Vec<String>)> = Vec::new();

        for point in graph.points() {
            let mut matched: Vec<(usize, String)> = Vec::new();
            for action in &point.actions {
                let earliest = action
                    .keywords
                    .iter()
                    .filter_map(|kw| {
                        let needle = normalize(kw);
                        if needle.is_empty() {
                            None
                        } else {
                            haystack.find(&needle)
                        }
                    })
                    .min();
                if let Some(pos) = earliest {
                    matched.push((pos, action.id.clone()));
                }
            }
            if matched.is_empty() {
                continue;
            }
            matched.sort();
            let first_pos = matched[0].0;
            let actions: Vec<String> = matched.into_iter().map(|(_, id)| id).collect();
            hits.push((first_pos, point.id.clone(), actions));
        }

        // Order entries by where the response first commits to each point;
        // ties break on point id so traces stay deterministic.
        hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let entries = hits
            .into_iter()
            .map(|(_, point, mut actions)| {
                let choice = if actions.len() == 1 {
                    Choice::Selected(actions.remove(0))
                } else {
                    Choice::Ambiguous(actions)
                };
                TraceEntry { point, choice }
            })
            .collect();

        ResponseTrace {
            entries,
            extraneous: Vec::new(),
        }
    }
}

#[async_trait]
impl ResponseMatcher for KeywordMatcher {
    async fn match_response(
        &self,
        response: &str,
        graph: &SopGraph,
    ) -> Result<ResponseTrace, MatchError> {
        Ok(self.trace(response, graph))
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
