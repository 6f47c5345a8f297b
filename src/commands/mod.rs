//! Command-line surface over the pipeline

use crate::calculator;
use crate::config::CoachConfig;
use crate::corpus::CorpusError;
use crate::extractor;
use crate::models::{Mode, RawQuery};
use crate::normalizer;
use crate::pipeline::{Pipeline, PipelineResult};
use crate::scorer;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum CommandError {
  #[error("Corpus error: {0}")]
  Corpus(#[from] CorpusError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

/// ---------------------------------------------------------------------------
/// Arguments
/// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "interval-coach")]
#[command(about = "Turns free-text cycling workout descriptions into structured .zwo files")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Run the full pipeline and print the result
  Generate(GenerateArgs),
  /// Show normalization, extraction, calculations and score
  Parse { query: String },
  /// Rank reference workouts against a query
  Corpus {
    query: String,
    #[arg(short, default_value_t = 3)]
    k: usize,
  },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Json,
  Zwo,
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
  /// Workout description, as typed
  pub query: String,

  /// `standard`, or `expert` (alias `coach`): never reject, no physiological validation
  #[arg(long, default_value_t = Mode::Standard)]
  pub mode: Mode,

  /// Reference power in watts (defaults to COACH_FTP_WATTS)
  #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
  pub ftp: Option<u32>,

  #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
  pub format: OutputFormat,

  /// Also write the .zwo file into this directory
  #[arg(long)]
  pub output_dir: Option<PathBuf>,
}

/// ---------------------------------------------------------------------------
/// Handlers
/// ---------------------------------------------------------------------------

/// Returns whether the request succeeded
pub async fn run(cli: Cli, config: &CoachConfig) -> Result<bool, CommandError> {
  match cli.command {
    Command::Generate(args) => generate(&args, config).await,
    Command::Parse { query } => parse(&query),
    Command::Corpus { query, k } => corpus(&query, k, config),
  }
}

pub async fn generate(args: &GenerateArgs, config: &CoachConfig) -> Result<bool, CommandError> {
  let pipeline = Pipeline::from_config(config)?;
  let query = RawQuery::new(args.query.clone(), args.mode, args.ftp.unwrap_or(config.ftp_watts));

  let result = pipeline.process(&query).await;
  if let Some(workout) = &result.workout {
    tracing::info!(
      name = %workout.name,
      minutes = workout.total_minutes(),
      status = result.status.as_str(),
      "workout ready"
    );
  }

  if let Some(dir) = &args.output_dir {
    if let Some(path) = write_zwo(&result, dir, Utc::now())? {
      tracing::info!(path = %path.display(), "interval file written");
    }
  }

  match (args.format, &result.zwo) {
    (OutputFormat::Zwo, Some(zwo)) => print!("{}", zwo),
    (OutputFormat::Zwo, None) => eprintln!("{}", result.message),
    (OutputFormat::Json, _) => println!("{}", serde_json::to_string_pretty(&result)?),
  }

  Ok(result.success)
}

pub fn parse(query: &str) -> Result<bool, CommandError> {
  let corrected = normalizer::correct(query);
  let extracted = extractor::extract(&corrected.text);
  let calculated = calculator::calculate(&corrected.text, &extracted);
  let completeness = scorer::score(&extracted);

  let report = json!({
    "normalized": corrected,
    "extracted": extracted,
    "calculated": calculated,
    "completeness": completeness,
  });
  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(true)
}

pub fn corpus(query: &str, k: usize, config: &CoachConfig) -> Result<bool, CommandError> {
  let pipeline = Pipeline::from_config(config)?;
  let text = normalizer::correct(query).text;
  let matches = pipeline.corpus().search(&text, k);

  println!("{}", serde_json::to_string_pretty(&matches)?);
  Ok(!matches.is_empty())
}

/// ---------------------------------------------------------------------------
/// Files
/// ---------------------------------------------------------------------------

pub fn zwo_filename(now: DateTime<Utc>) -> String {
  format!("workout_{}.zwo", now.format("%Y%m%d_%H%M%S"))
}

/// Path written, or None when the result carries no workout
pub fn write_zwo(
  result: &PipelineResult,
  dir: &Path,
  now: DateTime<Utc>,
) -> Result<Option<PathBuf>, CommandError> {
  let Some(zwo) = &result.zwo else {
    return Ok(None);
  };

  std::fs::create_dir_all(dir)?;
  let path = dir.join(zwo_filename(now));
  std::fs::write(&path, zwo)?;
  Ok(Some(path))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::local_pipeline;
  use chrono::TimeZone;

  #[test]
  fn test_cli_generate_args() {
    let cli = Cli::try_parse_from([
      "interval-coach",
      "generate",
      "3x5min à 95%",
      "--mode",
      "coach",
      "--ftp",
      "280",
      "--format",
      "zwo",
    ])
    .unwrap();

    match cli.command {
      Command::Generate(args) => {
        assert_eq!(args.query, "3x5min à 95%");
        assert_eq!(args.mode, Mode::Expert);
        assert_eq!(args.ftp, Some(280));
        assert_eq!(args.format, OutputFormat::Zwo);
        assert!(args.output_dir.is_none());
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn test_cli_rejects_zero_ftp() {
    assert!(Cli::try_parse_from(["interval-coach", "generate", "3x5min", "--ftp", "0"]).is_err());
  }

  #[test]
  fn test_cli_corpus_default_k() {
    let cli = Cli::try_parse_from(["interval-coach", "corpus", "tempo"]).unwrap();
    assert!(matches!(cli.command, Command::Corpus { k: 3, .. }));
  }

  #[test]
  fn test_zwo_filename() {
    let now = Utc.with_ymd_and_hms(2026, 3, 9, 7, 5, 2).unwrap();
    assert_eq!(zwo_filename(now), "workout_20260309_070502.zwo");
  }

  #[tokio::test]
  async fn test_write_zwo() {
    let now = Utc.with_ymd_and_hms(2026, 3, 9, 7, 5, 2).unwrap();
    let dir = std::env::temp_dir().join(format!("interval-coach-test-{}", std::process::id()));
    let pipeline = local_pipeline();

    let generated = pipeline
      .process(&RawQuery::new("3x5min à 95%", Mode::Standard, 250))
      .await;
    let path = write_zwo(&generated, &dir, now).unwrap().unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(Some(written), generated.zwo);

    let rejected = pipeline
      .process(&RawQuery::new("faire du sport", Mode::Standard, 250))
      .await;
    assert!(write_zwo(&rejected, &dir, now).unwrap().is_none());

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
