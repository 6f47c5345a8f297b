use clap::Parser;
use interval_coach_lib::commands::{self, Cli, CommandError};
use interval_coach_lib::config::CoachConfig;
use interval_coach_lib::logging;
use std::process::ExitCode;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();
  logging::init();

  let cli = Cli::parse();

  let config = match CoachConfig::from_env() {
    Ok(config) => config,
    Err(e) => {
      eprintln!("Configuration error: {}", e);
      return ExitCode::from(EXIT_CONFIG);
    }
  };

  match commands::run(cli, &config).await {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::from(EXIT_FAILURE),
    Err(e @ CommandError::Corpus(_)) => {
      eprintln!("Configuration error: {}", e);
      ExitCode::from(EXIT_CONFIG)
    }
    Err(e) => {
      eprintln!("error: {}", e);
      ExitCode::from(EXIT_FAILURE)
    }
  }
}
