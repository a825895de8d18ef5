use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use maze_eval::{run_batch, BatchOutcome, CancelFlag, CaseRecord, EvalConfig};

use super::{build_matcher, load_definition};
use crate::{report_error, MatcherKind, OutputFormat};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_batch(
    definition_path: &Path,
    records_dir: &Path,
    matcher: MatcherKind,
    model: Option<&str>,
    workers: usize,
    timeout_secs: u64,
    gated_weight: f64,
    output: OutputFormat,
    quiet: bool,
) {
    let graph = load_definition(definition_path, output, quiet);

    let entries = match std::fs::read_dir(records_dir) {
        Ok(entries) => entries,
        Err(e) => {
            let msg = format!(
                "error reading directory '{}': {}",
                records_dir.display(),
                e
            );
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let mut paths: Vec<std::path::PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    // Bad record files are reported and skipped; one broken file must
    // not sink the corpus run.
    let mut records: Vec<CaseRecord> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    for path in &paths {
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).map_err(|e| e.to_string()))
            .and_then(|v| CaseRecord::from_json(&v).map_err(|e| e.to_string()));
        match parsed {
            Ok(record) if record.sop_id == graph.id => records.push(record),
            Ok(record) => {
                skipped.push(format!(
                    "{}: targets SOP '{}', not '{}'",
                    path.display(),
                    record.sop_id,
                    graph.id
                ));
            }
            Err(e) => skipped.push(format!("{}: {}", path.display(), e)),
        }
    }

    if records.is_empty() {
        let msg = format!(
            "error: no usable records in '{}' ({} skipped)",
            records_dir.display(),
            skipped.len()
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    }

    let matcher = build_matcher(matcher, model, output, quiet);
    let config = EvalConfig {
        matcher_timeout: Duration::from_secs(timeout_secs),
        workers,
        gated_weight,
    };

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let outcome = rt.block_on(run_batch(
        Arc::new(graph),
        records,
        matcher,
        config,
        CancelFlag::new(),
    ));

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "cases": outcome.results.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
                "summary": outcome.aggregate.to_json(),
                "skipped_files": skipped,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => print_report(&outcome, &skipped),
    }
}

fn print_report(outcome: &BatchOutcome, skipped: &[String]) {
    for result in &outcome.results {
        match result.score {
            Some(score) => println!("{:<32} {:.3}", result.case_id, score),
            None => println!("{:<32} n/a", result.case_id),
        }
    }

    let agg = &outcome.aggregate;
    println!();
    println!(
        "cases: {} evaluated, {} scored, {} degraded",
        agg.instances, agg.scored_instances, agg.degraded_instances
    );
    match agg.mean_score() {
        Some(mean) => println!("mean score: {:.3}", mean),
        None => println!("mean score: n/a"),
    }

    if !agg.per_point.is_empty() {
        println!();
        println!(
            "{:<24} {:>8} {:>10} {:>8} {:>8}",
            "decision point", "correct", "incorrect", "skipped", "unknown"
        );
        for (point, counts) in &agg.per_point {
            println!(
                "{:<24} {:>8} {:>10} {:>8} {:>8}",
                point, counts.correct, counts.incorrect, counts.skipped, counts.unknown
            );
        }
    }

    if !skipped.is_empty() {
        println!();
        println!("skipped files:");
        for line in skipped {
            println!("  - {}", line);
        }
    }
}
