//! CLI command definitions for reward-forge.
//!
//! `score` runs the standard rubric over a JSONL file of scoring records;
//! `decode` prints how a ground-truth call expression is understood.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use crate::calls::FunctionCall;
use crate::config::RubricConfig;
use crate::rubric::{RewardFunc, ToolExecutionScorer, UnifiedScorer};
use crate::trajectory::{RecordStorage, ScoreRecord};

/// Reward rubrics for multi-turn tool-calling trajectories.
#[derive(Parser)]
#[command(name = "reward-forge")]
#[command(about = "Score tool-calling agent trajectories against ground-truth calls and state")]
#[command(version)]
#[command(
    long_about = "reward-forge scores multi-turn tool-calling trajectories.\n\nEach record is scored by the tool-execution reward and the unified state/function/format reward.\n\nExample usage:\n  reward-forge score --input rollouts.jsonl --output scores.jsonl --breakdown"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Score a JSONL file of trajectories.
    Score(ScoreArgs),

    /// Decode a ground-truth call expression and print it as JSON.
    Decode(DecodeArgs),
}

/// Arguments for `reward-forge score`.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// JSONL file with one scoring record per line.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output JSONL file. Scores go to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// YAML rubric configuration.
    #[arg(short, long, env = "REWARD_FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log per-turn diagnostics for the first record.
    #[arg(long)]
    pub debug: bool,

    /// Include the unified score breakdown in every output record.
    #[arg(long)]
    pub breakdown: bool,

    /// Override the tool-execution budget.
    #[arg(long)]
    pub tool_execution_max_score: Option<f64>,

    /// Override the function-call match budget.
    #[arg(long)]
    pub func_match_max_score: Option<f64>,

    /// Override the state match budget.
    #[arg(long)]
    pub state_match_max_score: Option<f64>,

    /// Override the format budget.
    #[arg(long)]
    pub format_max_score: Option<f64>,
}

/// Arguments for `reward-forge decode`.
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Call expression, e.g. "cd(folder='docs')".
    pub expression: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Score(args) => run_score_command(args).await?,
        Commands::Decode(args) => run_decode_command(args)?,
    }
    Ok(())
}

/// Builds the rubric configuration from the optional file plus overrides.
fn resolve_config(args: &ScoreArgs) -> anyhow::Result<RubricConfig> {
    let mut config = match &args.config {
        Some(path) => RubricConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RubricConfig::default(),
    };

    if args.debug {
        config = config.with_debug(true);
    }
    if let Some(value) = args.tool_execution_max_score {
        config = config.with_tool_execution_max_score(value);
    }
    if let Some(value) = args.func_match_max_score {
        config = config.with_func_match_max_score(value);
    }
    if let Some(value) = args.state_match_max_score {
        config = config.with_state_match_max_score(value);
    }
    if let Some(value) = args.format_max_score {
        config = config.with_format_max_score(value);
    }

    config.validate()?;
    Ok(config)
}

/// Aggregate figures over one scoring run.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoreSummary {
    records: usize,
    gate_passed: usize,
    mean_tool_execution: f64,
    mean_unified: f64,
}

fn summarize(scores: &[ScoreRecord]) -> ScoreSummary {
    let n = scores.len().max(1) as f64;
    ScoreSummary {
        records: scores.len(),
        gate_passed: scores.iter().filter(|s| s.gate_passed).count(),
        mean_tool_execution: scores.iter().map(|s| s.tool_execution).sum::<f64>() / n,
        mean_unified: scores.iter().map(|s| s.unified).sum::<f64>() / n,
    }
}

async fn run_score_command(args: ScoreArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let tool_scorer = ToolExecutionScorer::new(&config.tool_execution);
    let unified_scorer = UnifiedScorer::new(config.unified.clone());

    let input = RecordStorage::new(&args.input);
    let records = input
        .load_records()
        .await
        .with_context(|| format!("Failed to load records from {}", args.input.display()))?;
    if records.is_empty() {
        warn!("No records found in {}", args.input.display());
    }
    info!("Scoring {} records", records.len());

    let mut scores = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let label = record
            .id
            .clone()
            .unwrap_or_else(|| format!("#{}", index));
        let debug = config.debug && index == 0;

        let tool_execution =
            RewardFunc::score(&tool_scorer, &record.messages, &record.state, debug)
                .with_context(|| format!("Failed to score record {}", label))?;
        let breakdown = unified_scorer
            .evaluate(&record.messages, &record.state, debug)
            .with_context(|| format!("Failed to score record {}", label))?;

        scores.push(ScoreRecord {
            id: record.id.clone(),
            index,
            tool_execution,
            unified: breakdown.total(),
            gate_passed: breakdown.gate_passed,
            breakdown: args.breakdown.then_some(breakdown),
            scored_at: Utc::now(),
        });
    }

    if !scores.is_empty() {
        let summary = summarize(&scores);
        info!(
            "Mean tool_execution {:.4}, mean unified {:.4}, gate passed for {} of {}",
            summary.mean_tool_execution,
            summary.mean_unified,
            summary.gate_passed,
            summary.records
        );
    }

    match &args.output {
        Some(path) => {
            RecordStorage::new(path)
                .save_scores(&scores)
                .await
                .with_context(|| format!("Failed to write scores to {}", path.display()))?;
            info!("Wrote {} scores to {}", scores.len(), path.display());
        }
        None => {
            for score in &scores {
                println!("{}", serde_json::to_string(score)?);
            }
        }
    }

    Ok(())
}

fn run_decode_command(args: DecodeArgs) -> anyhow::Result<()> {
    let call = FunctionCall::parse(&args.expression)
        .with_context(|| format!("Failed to decode '{}'", args.expression))?;
    println!("{}", serde_json::to_string_pretty(&call)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_score_command_defaults() {
        let cli = Cli::try_parse_from(["reward-forge", "score", "--input", "in.jsonl"])
            .expect("should parse");

        match cli.command {
            Commands::Score(args) => {
                assert_eq!(args.input, PathBuf::from("in.jsonl"));
                assert!(args.output.is_none());
                assert!(!args.debug);
                assert!(!args.breakdown);
                assert!(args.format_max_score.is_none());
            }
            _ => panic!("Expected Score command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_decode_command() {
        let cli = Cli::try_parse_from(["reward-forge", "decode", "ls(a=True)", "-l", "debug"])
            .expect("should parse");
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Decode(args) => assert_eq!(args.expression, "ls(a=True)"),
            _ => panic!("Expected Decode command"),
        }
        assert!(Cli::try_parse_from(["reward-forge", "decode"]).is_err());
    }

    #[test]
    fn test_overrides_are_applied_and_validated() {
        let cli = Cli::try_parse_from([
            "reward-forge",
            "score",
            "--input",
            "in.jsonl",
            "--debug",
            "--format-max-score",
            "0.4",
        ])
        .expect("should parse");
        let Commands::Score(args) = cli.command else {
            panic!("Expected Score command");
        };
        let config = resolve_config(&args).expect("valid config");
        assert!(config.debug);
        assert!((config.unified.format_max_score - 0.4).abs() < f64::EPSILON);

        let cli = Cli::try_parse_from([
            "reward-forge",
            "score",
            "--input",
            "in.jsonl",
            "--state-match-max-score=-1",
        ])
        .expect("should parse");
        let Commands::Score(args) = cli.command else {
            panic!("Expected Score command");
        };
        assert!(resolve_config(&args).is_err());
    }

    fn docs_record() -> serde_json::Value {
        json!({
            "id": "fs-1",
            "messages": [
                {"role": "user", "content": "Go to docs"},
                {"role": "assistant", "content": "<reasoning>cd first</reasoning><tool>cd(folder='docs')</tool>"},
                {"role": "system", "content": "<tool_result>[\"{\\\"current_working_directory\\\": \\\"docs\\\"}\"]</tool_result>"}
            ],
            "state": {
                "environment": {"fs": {"kind": "GorillaFileSystem", "attributes": {"cwd": "/docs"}}},
                "ground_truth_environment": {"fs": {"kind": "GorillaFileSystem", "attributes": {"cwd": "/docs"}}},
                "successful_func_calls": [[{"name": "cd", "args": {"folder": "docs"}}]],
                "dataset_row": {"answer": "[[\"cd(folder='docs')\"]]"}
            }
        })
    }

    fn score_args(input: PathBuf, output: PathBuf) -> ScoreArgs {
        ScoreArgs {
            input,
            output: Some(output),
            config: None,
            debug: false,
            breakdown: true,
            tool_execution_max_score: None,
            func_match_max_score: None,
            state_match_max_score: None,
            format_max_score: None,
        }
    }

    async fn read_scores(path: &std::path::Path) -> Vec<ScoreRecord> {
        let written = tokio::fs::read_to_string(path).await.expect("output exists");
        written
            .lines()
            .map(|line| serde_json::from_str(line).expect("score record"))
            .collect()
    }

    #[tokio::test]
    async fn test_score_command_writes_output() {
        let dir = TempDir::new().expect("temp dir");
        let input = dir.path().join("records.jsonl");
        let output = dir.path().join("out").join("scores.jsonl");
        std::fs::write(&input, format!("{}\n", docs_record())).expect("write input");

        run_score_command(score_args(input, output.clone()))
            .await
            .expect("scoring succeeds");

        let scores = read_scores(&output).await;
        assert_eq!(scores.len(), 1);
        let score = &scores[0];
        assert_eq!(score.id.as_deref(), Some("fs-1"));
        assert!((score.tool_execution - 0.2).abs() < 1e-9);
        assert!((score.unified - 1.2).abs() < 1e-9);
        assert!(score.gate_passed);
        let breakdown = score.breakdown.as_ref().expect("breakdown requested");
        assert!(breakdown.gate_passed);
        assert_eq!(breakdown.total(), score.unified);
    }

    #[tokio::test]
    async fn test_gate_is_counted_with_zero_budgets() {
        let dir = TempDir::new().expect("temp dir");
        let input = dir.path().join("records.jsonl");
        let output = dir.path().join("scores.jsonl");
        let mut failing = docs_record();
        failing["id"] = json!("fs-2");
        failing["state"]["environment"]["fs"]["attributes"]["cwd"] = json!("/");
        std::fs::write(&input, format!("{}\n{}\n", docs_record(), failing))
            .expect("write input");

        let mut args = score_args(input, output.clone());
        args.breakdown = false;
        args.func_match_max_score = Some(0.0);
        args.state_match_max_score = Some(0.0);
        args.format_max_score = Some(0.0);
        run_score_command(args).await.expect("scoring succeeds");

        let scores = read_scores(&output).await;
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.unified == 0.0));
        assert!(scores.iter().all(|s| s.breakdown.is_none()));
        assert!(scores[0].gate_passed);
        assert!(!scores[1].gate_passed);

        let summary = summarize(&scores);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.gate_passed, 1);
        assert_eq!(summary.mean_unified, 0.0);
    }

    #[tokio::test]
    async fn test_score_command_names_failing_record() {
        let dir = TempDir::new().expect("temp dir");
        let input = dir.path().join("records.jsonl");
        let record = json!({
            "id": "broken",
            "messages": [],
            "state": {
                "successful_func_calls": [],
                "dataset_row": {"answer": "[[\"cd(folder=docs)\"]]"}
            }
        });
        std::fs::write(&input, record.to_string()).expect("write input");

        let args = ScoreArgs {
            input,
            output: None,
            config: None,
            debug: false,
            breakdown: false,
            tool_execution_max_score: None,
            func_match_max_score: None,
            state_match_max_score: None,
            format_max_score: None,
        };
        let err = run_score_command(args).await.expect_err("misaligned record");
        assert!(format!("{:#}", err).contains("broken"));
    }

    #[test]
    fn test_decode_rejects_non_literal() {
        let err = run_decode_command(DecodeArgs {
            expression: "cd(folder=docs)".to_string(),
        })
        .expect_err("non-literal argument");
        assert!(err.to_string().contains("cd(folder=docs)"));
    }
}
