//! Response matching: deciding which decision points a free-text model
//! response addressed and which candidate action it committed to.
//!
//! Matchers are pluggable behind [`ResponseMatcher`]. The baseline
//! [`KeywordMatcher`](keyword::KeywordMatcher) is deterministic and
//! dependency-free; [`LlmMatcher`](llm::LlmMatcher) delegates to a
//! language model for paraphrase-robust matching.

pub mod keyword;
pub mod llm;

use std::fmt;

use async_trait::async_trait;
use maze_core::SopGraph;

/// What the matcher concluded for a single addressed decision point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Exactly one candidate action matched.
    Selected(String),
    /// More than one candidate matched and the matcher could not pick.
    /// Carries the matched action ids (may be empty when the matcher
    /// named an action the definition does not have).
    Ambiguous(Vec<String>),
}

/// A decision point the matcher found addressed in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub point: String,
    pub choice: Choice,
}

/// The matcher's full reading of one response against one definition.
///
/// `entries` lists addressed points in the order the response commits to
/// them. `extraneous` lists references the matcher produced that do not
/// correspond to any decision point in the definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTrace {
    pub entries: Vec<TraceEntry>,
    pub extraneous: Vec<String>,
}

impl ResponseTrace {
    pub fn choice_for(&self, point: &str) -> Option<&Choice> {
        self.entries
            .iter()
            .find(|e| e.point == point)
            .map(|e| &e.choice)
    }
}

/// Matching failed. The evaluator degrades affected points to `Unknown`
/// rather than propagating this as a run failure.
#[derive(Debug)]
pub enum MatchError {
    /// The backend could not produce a usable trace.
    Failed(String),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::Failed(message) => write!(f, "matching failed: {message}"),
        }
    }
}

impl std::error::Error for MatchError {}

/// Strategy interface over response-matching backends.
#[async_trait]
pub trait ResponseMatcher: Send + Sync {
    async fn match_response(
        &self,
        response: &str,
        graph: &SopGraph,
    ) -> Result<ResponseTrace, MatchError>;
}
