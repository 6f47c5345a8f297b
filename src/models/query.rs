use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating mode. Expert mode skips the reject branch entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  #[default]
  Standard,
  Expert,
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Mode::Standard => write!(f, "standard"),
      Mode::Expert => write!(f, "expert"),
    }
  }
}

impl FromStr for Mode {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "standard" => Ok(Mode::Standard),
      "expert" | "coach" => Ok(Mode::Expert),
      other => Err(format!("Unknown mode: {}", other)),
    }
  }
}

/// One request: the free text as typed, plus how to interpret it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuery {
  pub text: String,
  #[serde(default)]
  pub mode: Mode,
  /// FTP-equivalent reference power, watts
  pub reference_power: u32,
}

impl RawQuery {
  pub fn new(text: impl Into<String>, mode: Mode, reference_power: u32) -> Self {
    Self {
      text: text.into(),
      mode,
      reference_power,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
  Compound,
  Vocabulary,
  Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
  pub from: String,
  pub to: String,
  pub kind: CorrectionKind,
}

impl fmt::Display for Correction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "'{}' → '{}'", self.from, self.to)
  }
}

/// Query text after vocabulary normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedQuery {
  pub text: String,
  pub corrections: Vec<Correction>,
  pub confidence: f64,
}
