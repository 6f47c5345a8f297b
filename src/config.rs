use crate::llm::DEFAULT_MODEL;
use crate::router::RouterThresholds;
use crate::zwo::DEFAULT_AUTHOR;
use serde::{Serialize, Serializer};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

const DEFAULT_FTP_WATTS: u32 = 250;
const DEFAULT_ENRICHMENT_TIMEOUT_SECS: u64 = 30;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Invalid value for {key}: '{value}'")]
  Invalid { key: String, value: String },
}

impl Serialize for ConfigError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

fn invalid(key: &str, value: &str) -> ConfigError {
  ConfigError::Invalid {
    key: key.to_string(),
    value: value.to_string(),
  }
}

/// ---------------------------------------------------------------------------
/// Coach Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusStrategy {
  #[default]
  Lexical,
  Embedding,
}

impl FromStr for CorpusStrategy {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "lexical" => Ok(CorpusStrategy::Lexical),
      "embedding" => Ok(CorpusStrategy::Embedding),
      other => Err(format!("Unknown corpus strategy: {}", other)),
    }
  }
}

#[derive(Debug, Clone)]
pub struct CoachConfig {
  pub ftp_watts: u32,
  pub thresholds: RouterThresholds,
  /// Replaces the built-in reference library when set
  pub corpus_path: Option<PathBuf>,
  pub corpus_strategy: CorpusStrategy,
  pub zwo_author: String,
  /// Remote enrichment is enabled only when this is set
  pub ollama_base_url: Option<Url>,
  pub ollama_model: String,
  pub enrichment_timeout: Duration,
}

impl Default for CoachConfig {
  fn default() -> Self {
    Self {
      ftp_watts: DEFAULT_FTP_WATTS,
      thresholds: RouterThresholds::default(),
      corpus_path: None,
      corpus_strategy: CorpusStrategy::default(),
      zwo_author: DEFAULT_AUTHOR.to_string(),
      ollama_base_url: None,
      ollama_model: DEFAULT_MODEL.to_string(),
      enrichment_timeout: Duration::from_secs(DEFAULT_ENRICHMENT_TIMEOUT_SECS),
    }
  }
}

/// Set and non-blank, trimmed
fn var(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
  match var(key) {
    Some(raw) => raw.parse::<T>().map_err(|_| invalid(key, &raw)),
    None => Ok(default),
  }
}

fn threshold(key: &str, default: f64) -> Result<f64, ConfigError> {
  let value = parsed(key, default)?;
  if !(0.0..=1.0).contains(&value) {
    return Err(invalid(key, &value.to_string()));
  }
  Ok(value)
}

impl CoachConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let defaults = Self::default();

    let ftp_watts: u32 = parsed("COACH_FTP_WATTS", defaults.ftp_watts)?;
    if ftp_watts == 0 {
      return Err(invalid("COACH_FTP_WATTS", "0"));
    }

    let auto = threshold("COACH_AUTO_THRESHOLD", defaults.thresholds.auto)?;
    let enrich = threshold("COACH_ENRICH_THRESHOLD", defaults.thresholds.enrich)?;
    if enrich > auto {
      return Err(invalid("COACH_ENRICH_THRESHOLD", &enrich.to_string()));
    }

    let ollama_base_url = match var("OLLAMA_BASE_URL") {
      Some(raw) => Some(Url::parse(&raw).map_err(|_| invalid("OLLAMA_BASE_URL", &raw))?),
      None => None,
    };

    let timeout_secs: u64 = parsed("ENRICHMENT_TIMEOUT_SECS", DEFAULT_ENRICHMENT_TIMEOUT_SECS)?;
    if timeout_secs == 0 {
      return Err(invalid("ENRICHMENT_TIMEOUT_SECS", "0"));
    }

    Ok(Self {
      ftp_watts,
      thresholds: RouterThresholds { auto, enrich },
      corpus_path: var("COACH_CORPUS_PATH").map(PathBuf::from),
      corpus_strategy: parsed("COACH_CORPUS_STRATEGY", defaults.corpus_strategy)?,
      zwo_author: var("COACH_ZWO_AUTHOR").unwrap_or(defaults.zwo_author),
      ollama_base_url,
      ollama_model: var("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
      enrichment_timeout: Duration::from_secs(timeout_secs),
    })
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  const KEYS: [&str; 9] = [
    "COACH_FTP_WATTS",
    "COACH_AUTO_THRESHOLD",
    "COACH_ENRICH_THRESHOLD",
    "COACH_CORPUS_PATH",
    "COACH_CORPUS_STRATEGY",
    "COACH_ZWO_AUTHOR",
    "OLLAMA_BASE_URL",
    "OLLAMA_MODEL",
    "ENRICHMENT_TIMEOUT_SECS",
  ];

  /// Runs `f` with every config variable unset except `set`
  fn with_env<F: FnOnce()>(set: &[(&str, &str)], f: F) {
    let vars: Vec<(&str, Option<&str>)> = KEYS
      .iter()
      .map(|key| {
        let value = set.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
        (*key, value)
      })
      .collect();
    temp_env::with_vars(vars, f);
  }

  #[test]
  #[serial]
  fn test_defaults() {
    with_env(&[], || {
      let config = CoachConfig::from_env().unwrap();
      assert_eq!(config.ftp_watts, 250);
      assert_eq!(config.thresholds, RouterThresholds { auto: 0.9, enrich: 0.6 });
      assert_eq!(config.corpus_strategy, CorpusStrategy::Lexical);
      assert_eq!(config.zwo_author, "Interval Coach");
      assert!(config.ollama_base_url.is_none());
      assert_eq!(config.ollama_model, "llama3.2:3b");
      assert_eq!(config.enrichment_timeout, Duration::from_secs(30));
    });
  }

  #[test]
  #[serial]
  fn test_overrides() {
    with_env(
      &[
        ("COACH_FTP_WATTS", "310"),
        ("COACH_AUTO_THRESHOLD", "0.85"),
        ("COACH_ENRICH_THRESHOLD", "0.5"),
        ("COACH_CORPUS_PATH", "/tmp/corpus.json"),
        ("COACH_CORPUS_STRATEGY", "Embedding"),
        ("OLLAMA_BASE_URL", "http://localhost:11434"),
        ("OLLAMA_MODEL", "mistral"),
        ("ENRICHMENT_TIMEOUT_SECS", "5"),
      ],
      || {
        let config = CoachConfig::from_env().unwrap();
        assert_eq!(config.ftp_watts, 310);
        assert_eq!(config.thresholds.auto, 0.85);
        assert_eq!(config.thresholds.enrich, 0.5);
        assert_eq!(config.corpus_path, Some(PathBuf::from("/tmp/corpus.json")));
        assert_eq!(config.corpus_strategy, CorpusStrategy::Embedding);
        assert_eq!(
          config.ollama_base_url.map(|u| u.to_string()),
          Some("http://localhost:11434/".to_string())
        );
        assert_eq!(config.ollama_model, "mistral");
        assert_eq!(config.enrichment_timeout, Duration::from_secs(5));
      },
    );
  }

  #[test]
  #[serial]
  fn test_invalid_values() {
    for (key, value) in [
      ("COACH_FTP_WATTS", "0"),
      ("COACH_FTP_WATTS", "lots"),
      ("COACH_AUTO_THRESHOLD", "1.5"),
      ("COACH_ENRICH_THRESHOLD", "0.95"),
      ("COACH_CORPUS_STRATEGY", "neural"),
      ("OLLAMA_BASE_URL", "not a url"),
      ("ENRICHMENT_TIMEOUT_SECS", "0"),
    ] {
      with_env(&[(key, value)], || match CoachConfig::from_env() {
        Err(ConfigError::Invalid { key: k, .. }) => assert_eq!(k, key),
        Ok(_) => panic!("{}={} accepted", key, value),
      });
    }
  }

  #[test]
  #[serial]
  fn test_blank_values_use_defaults() {
    with_env(&[("COACH_ZWO_AUTHOR", "   "), ("OLLAMA_BASE_URL", "")], || {
      let config = CoachConfig::from_env().unwrap();
      assert_eq!(config.zwo_author, DEFAULT_AUTHOR);
      assert!(config.ollama_base_url.is_none());
    });
  }
}
