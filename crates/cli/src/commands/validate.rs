use std::path::Path;
use std::process;

use maze_core::SopGraph;

use crate::{report_error, OutputFormat};

static DEFINITION_SCHEMA_STR: &str = include_str!("../../schemas/sop-definition.schema.json");

pub(crate) fn cmd_validate(definition_path: &Path, output: OutputFormat, quiet: bool) {
    // Parse the embedded definition schema
    let schema: serde_json::Value = match serde_json::from_str(DEFINITION_SCHEMA_STR) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!(
                "internal error: failed to parse embedded definition schema: {}",
                e
            );
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    // Read and parse the definition file
    let doc_str = match std::fs::read_to_string(definition_path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", definition_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let doc: serde_json::Value = match serde_json::from_str(&doc_str) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!(
                "error parsing JSON in '{}': {}",
                definition_path.display(),
                e
            );
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("internal error: failed to compile schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let mut errors: Vec<String> = validator
        .iter_errors(&doc)
        .map(|e| format!("{}", e))
        .collect();

    // Structural rules the schema cannot express: dangling references,
    // duplicate ids, cycles, unreachable-root defects.
    if errors.is_empty() {
        if let Err(e) = SopGraph::load(&doc) {
            errors.push(e.to_string());
        }
    }

    if errors.is_empty() {
        if !quiet {
            match output {
                OutputFormat::Text => println!("valid"),
                OutputFormat::Json => println!("{{\"valid\": true}}"),
            }
        }
    } else {
        match output {
            OutputFormat::Text => {
                if !quiet {
                    eprintln!("invalid definition");
                    for err in &errors {
                        eprintln!("  - {}", err);
                    }
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            }
        }
        process::exit(1);
    }
}
