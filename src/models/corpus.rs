use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralCompleteness {
  Simple,
  Complex,
  Complete,
}

/// A reference workout from the fixed library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
  pub text: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub duration_minutes: u32,
  pub difficulty: u8,
  pub zone: String,
  pub completeness: StructuralCompleteness,
}
