use std::path::Path;
use std::process;
use std::time::Duration;

use maze_eval::{evaluate_instance, CaseRecord, EvalConfig, EvaluationResult};

use super::{build_matcher, load_definition};
use crate::{report_error, MatcherKind, OutputFormat};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_eval(
    definition_path: &Path,
    record_path: &Path,
    matcher: MatcherKind,
    model: Option<&str>,
    timeout_secs: u64,
    gated_weight: f64,
    output: OutputFormat,
    quiet: bool,
) {
    let graph = load_definition(definition_path, output, quiet);

    // Read and parse the record file
    let record_str = match std::fs::read_to_string(record_path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", record_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let record_json: serde_json::Value = match serde_json::from_str(&record_str) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", record_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let record = match CaseRecord::from_json(&record_json) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("bad record '{}': {}", record_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    if record.sop_id != graph.id {
        let msg = format!(
            "error: record targets SOP '{}' but the definition is '{}'",
            record.sop_id, graph.id
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    }

    let matcher = build_matcher(matcher, model, output, quiet);
    let config = EvalConfig {
        matcher_timeout: Duration::from_secs(timeout_secs),
        gated_weight,
        ..EvalConfig::default()
    };

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let result = rt.block_on(evaluate_instance(&graph, &record, matcher.as_ref(), &config));

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&result.to_json())
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => print_result(&result),
    }
}

fn print_result(result: &EvaluationResult) {
    println!("case {} against {}", result.case_id, result.sop_id);
    for record in &result.records {
        match &record.action {
            Some(action) => println!(
                "  {:<24} {:<10} ({})",
                record.point,
                record.outcome.as_str(),
                action
            ),
            None => println!("  {:<24} {}", record.point, record.outcome.as_str()),
        }
    }
    if !result.extraneous.is_empty() {
        println!("extraneous references: {}", result.extraneous.join(", "));
    }
    if result.matcher_degraded {
        println!("matcher degraded: reachable points reported as unknown");
    }
    match result.score {
        Some(score) => println!("score: {:.3}", score),
        None => println!("score: n/a (no scorable decision points)"),
    }
}
