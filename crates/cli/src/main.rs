mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use commands::batch::cmd_batch;
use commands::eval::cmd_eval;
use commands::validate::cmd_validate;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Response-matching backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum MatcherKind {
    /// Deterministic keyword/phrase matching.
    Keyword,
    /// LLM-assisted matching (requires the `anthropic` build feature
    /// and `ANTHROPIC_API_KEY`).
    Llm,
}

/// SOP compliance scoring toolchain.
#[derive(Parser)]
#[command(name = "maze", version, about = "SOP compliance scoring toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an SOP definition against the formal JSON Schema and
    /// structural rules
    Validate {
        /// Path to the SOP definition JSON file
        definition: PathBuf,
    },

    /// Evaluate one case record against an SOP definition
    Eval {
        /// Path to the SOP definition JSON file
        definition: PathBuf,
        /// Path to the case record JSON file
        #[arg(long)]
        record: PathBuf,
        /// Response-matching backend
        #[arg(long, default_value = "keyword", value_enum)]
        matcher: MatcherKind,
        /// LLM model name (llm matcher only)
        #[arg(long)]
        model: Option<String>,
        /// Wall-clock budget for one matcher call, in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
        /// Weight for points whose prerequisites were mishandled
        #[arg(long, default_value = "1.0")]
        gated_weight: f64,
    },

    /// Evaluate a directory of case records and report corpus scores
    Batch {
        /// Path to the SOP definition JSON file
        definition: PathBuf,
        /// Directory of case record JSON files
        records_dir: PathBuf,
        /// Response-matching backend
        #[arg(long, default_value = "keyword", value_enum)]
        matcher: MatcherKind,
        /// LLM model name (llm matcher only)
        #[arg(long)]
        model: Option<String>,
        /// Records evaluated concurrently
        #[arg(long, default_value = "4")]
        workers: usize,
        /// Wall-clock budget for one matcher call, in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
        /// Weight for points whose prerequisites were mishandled
        #[arg(long, default_value = "1.0")]
        gated_weight: f64,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { definition } => {
            cmd_validate(&definition, cli.output, cli.quiet);
        }
        Commands::Eval {
            definition,
            record,
            matcher,
            model,
            timeout_secs,
            gated_weight,
        } => {
            cmd_eval(
                &definition,
                &record,
                matcher,
                model.as_deref(),
                timeout_secs,
                gated_weight,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Batch {
            definition,
            records_dir,
            matcher,
            model,
            workers,
            timeout_secs,
            gated_weight,
        } => {
            cmd_batch(
                &definition,
                &records_dir,
                matcher,
                model.as_deref(),
                workers,
                timeout_secs,
                gated_weight,
                cli.output,
                cli.quiet,
            );
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{{\"error\": \"{}\"}}", msg.replace('"', "\\\""));
        }
    }
}
