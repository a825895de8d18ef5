pub(crate) mod batch;
pub(crate) mod eval;
pub(crate) mod validate;

use std::path::Path;
use std::process;
use std::sync::Arc;

use maze_core::SopGraph;
use maze_eval::{KeywordMatcher, ResponseMatcher};

use crate::{report_error, MatcherKind, OutputFormat};

/// Read and parse the SOP definition, exiting with an operator message
/// on failure.
pub(crate) fn load_definition(path: &Path, output: OutputFormat, quiet: bool) -> SopGraph {
    let doc_str = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let doc: serde_json::Value = match serde_json::from_str(&doc_str) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match SopGraph::load(&doc) {
        Ok(graph) => graph,
        Err(e) => {
            let msg = format!("malformed definition '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Construct the requested matcher backend.
pub(crate) fn build_matcher(
    kind: MatcherKind,
    model: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) -> Arc<dyn ResponseMatcher> {
    match kind {
        MatcherKind::Keyword => Arc::new(KeywordMatcher::new()),
        MatcherKind::Llm => {
            #[cfg(feature = "anthropic")]
            {
                let client = match maze_eval::AnthropicClient::from_env() {
                    Ok(c) => c,
                    Err(e) => {
                        report_error(&format!("error: {}", e), output, quiet);
                        process::exit(1);
                    }
                };
                let model = model.unwrap_or("claude-sonnet-4-20250514").to_string();
                Arc::new(maze_eval::LlmMatcher::new(Box::new(client), model))
            }
            #[cfg(not(feature = "anthropic"))]
            {
                let _ = model;
                report_error(
                    "error: this build does not include the llm matcher (enable the 'anthropic' feature)",
                    output,
                    quiet,
                );
                process::exit(1)
            }
        }
    }
}
