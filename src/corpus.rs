//! Reference workout library and similarity search
//!
//! The library is loaded once at startup and passed around by reference.
//! Search is lexical by default (Jaccard over synonym-expanded token sets
//! plus fixed bonuses). An `Embedder` can replace it with cosine similarity
//! over vectors computed once for the whole library.

use crate::models::{CorpusEntry, StructuralCompleteness};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

const BUILTIN_CORPUS: &str = include_str!("data/reference_workouts.json");

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum CorpusError {
  #[error("Failed to read corpus: {0}")]
  Io(#[from] std::io::Error),

  #[error("Invalid corpus file: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("Corpus contains no entries")]
  Empty,

  #[error("Embedding failed: {0}")]
  Embedding(String),
}

/// ---------------------------------------------------------------------------
/// Lexical tables
/// ---------------------------------------------------------------------------

const SYNONYMS: &[(&str, &[&str])] = &[
  ("vo2 max", &["max", "fond", "vo2max", "vo2"]),
  ("vo2max", &["max", "fond", "vo2 max", "vo2"]),
  ("max", &["vo2 max", "vo2max", "fond"]),
  ("fond", &["max", "vo2 max", "vo2max"]),
  ("seuil", &["tempo", "threshold", "ftp"]),
  ("tempo", &["seuil", "threshold"]),
  ("echauffement", &["chauffe", "warmup", "warm"]),
  ("retour au calme", &["cool down", "cooldown", "retour calme"]),
  ("cool down", &["retour au calme", "cooldown"]),
  ("series", &["set", "fois", "repetitions"]),
  ("set", &["series", "fois"]),
  ("repos", &["pause", "recuperation", "recup"]),
  ("pause", &["repos", "recuperation"]),
];

const KEY_TERMS: &[&str] = &["vo2", "max", "seuil", "tempo", "echauffement", "series", "set"];

const KEY_TERM_BONUS: f64 = 0.15;
const COMPLETE_BONUS: f64 = 0.1;
const DURATION_BONUS: f64 = 0.05;
const EMBEDDING_COMPLETE_BONUS: f64 = 0.05;
const DURATION_TOLERANCE_MINUTES: i64 = 10;

static WORD_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\w+").ok());

static MINUTES_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(\d+)\s*(?:min|minute)").ok());

/// ---------------------------------------------------------------------------
/// Embeddings
/// ---------------------------------------------------------------------------

pub trait Embedder: Send + Sync {
  fn name(&self) -> &str;

  /// Unit-length vector for `text`
  fn embed(&self, text: &str) -> Result<Vec<f32>, CorpusError>;
}

/// Deterministic local embedder: hashed character trigrams of each word,
/// L2-normalized. Needs no model download.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
  dimensions: usize,
}

impl HashingEmbedder {
  pub fn new(dimensions: usize) -> Self {
    Self {
      dimensions: dimensions.max(1),
    }
  }
}

impl Default for HashingEmbedder {
  fn default() -> Self {
    Self::new(256)
  }
}

fn fnv1a(bytes: &[u8]) -> u64 {
  bytes.iter().fold(0xcbf29ce484222325_u64, |hash, b| {
    (hash ^ *b as u64).wrapping_mul(0x100000001b3)
  })
}

impl Embedder for HashingEmbedder {
  fn name(&self) -> &str {
    "hashing-trigram"
  }

  fn embed(&self, text: &str) -> Result<Vec<f32>, CorpusError> {
    let mut vector = vec![0.0_f32; self.dimensions];

    for word in tokens(text) {
      let padded: Vec<char> = format!(" {} ", word).chars().collect();
      for gram in padded.windows(3) {
        let gram: String = gram.iter().collect();
        let slot = (fnv1a(gram.as_bytes()) % self.dimensions as u64) as usize;
        vector[slot] += 1.0;
      }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
      return Err(CorpusError::Embedding("text has no words".to_string()));
    }
    vector.iter_mut().for_each(|v| *v /= norm);
    Ok(vector)
  }
}

/// Zero when either vector has no magnitude
fn cosine(a: &[f32], b: &[f32]) -> f64 {
  let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
  let norm = |v: &[f32]| v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
  let (mag_a, mag_b) = (norm(a), norm(b));
  if mag_a < 1e-10 || mag_b < 1e-10 {
    return 0.0;
  }
  dot / (mag_a * mag_b)
}

struct EmbeddingIndex {
  embedder: Box<dyn Embedder>,
  vectors: Vec<Vec<f32>>,
}

/// ---------------------------------------------------------------------------
/// Corpus Matcher
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusMatch {
  pub entry: CorpusEntry,
  pub similarity: f64,
}

pub struct CorpusMatcher {
  entries: Vec<CorpusEntry>,
  embeddings: Option<EmbeddingIndex>,
}

impl CorpusMatcher {
  /// The reference library shipped with the crate
  pub fn builtin() -> Result<Self, CorpusError> {
    Self::from_json(BUILTIN_CORPUS)
  }

  pub fn from_path(path: &Path) -> Result<Self, CorpusError> {
    let raw = std::fs::read_to_string(path)?;
    Self::from_json(&raw)
  }

  pub fn from_json(raw: &str) -> Result<Self, CorpusError> {
    let entries: Vec<CorpusEntry> = serde_json::from_str(raw)?;
    if entries.is_empty() {
      return Err(CorpusError::Empty);
    }
    tracing::info!(entries = entries.len(), "corpus loaded");
    Ok(Self {
      entries,
      embeddings: None,
    })
  }

  /// Switch to embedding similarity. Library vectors are computed here, once.
  pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Result<Self, CorpusError> {
    let vectors = self
      .entries
      .iter()
      .map(|e| embedder.embed(&e.text))
      .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(embedder = embedder.name(), "corpus embeddings computed");
    self.embeddings = Some(EmbeddingIndex { embedder, vectors });
    Ok(self)
  }

  pub fn entries(&self) -> &[CorpusEntry] {
    &self.entries
  }

  pub fn strategy_name(&self) -> &str {
    self
      .embeddings
      .as_ref()
      .map_or("lexical", |index| index.embedder.name())
  }

  /// Best `k` entries, highest similarity first
  pub fn search(&self, text: &str, k: usize) -> Vec<CorpusMatch> {
    let scores = match &self.embeddings {
      Some(index) => match index.embedder.embed(text) {
        Ok(query) => self.embedding_scores(index, &query),
        Err(e) => {
          tracing::warn!(error = %e, "query embedding failed, using lexical similarity");
          self.lexical_scores(text)
        }
      },
      None => self.lexical_scores(text),
    };

    let mut matches: Vec<CorpusMatch> = self
      .entries
      .iter()
      .zip(scores)
      .map(|(entry, similarity)| CorpusMatch {
        entry: entry.clone(),
        similarity,
      })
      .collect();

    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches.truncate(k);
    matches
  }

  fn embedding_scores(&self, index: &EmbeddingIndex, query: &[f32]) -> Vec<f64> {
    self
      .entries
      .iter()
      .zip(&index.vectors)
      .map(|(entry, vector)| {
        let bonus = if entry.completeness == StructuralCompleteness::Complete {
          EMBEDDING_COMPLETE_BONUS
        } else {
          0.0
        };
        cosine(query, vector) + bonus
      })
      .collect()
  }

  fn lexical_scores(&self, text: &str) -> Vec<f64> {
    let query = text.to_lowercase();
    let query_tokens = tokens(&expand(&query));
    let query_minutes = stated_minutes(&query);

    self
      .entries
      .iter()
      .map(|entry| {
        let entry_text = entry.text.to_lowercase();
        let entry_tokens = tokens(&expand(&entry_text));

        let union = query_tokens.union(&entry_tokens).count();
        let jaccard = if union == 0 {
          0.0
        } else {
          query_tokens.intersection(&entry_tokens).count() as f64 / union as f64
        };

        let key_matches = KEY_TERMS
          .iter()
          .filter(|t| query.contains(*t) && entry_text.contains(*t))
          .count();

        let complete = if entry.completeness == StructuralCompleteness::Complete {
          COMPLETE_BONUS
        } else {
          0.0
        };

        let duration = match query_minutes {
          Some(minutes)
            if (minutes - entry.duration_minutes as i64).abs() <= DURATION_TOLERANCE_MINUTES =>
          {
            DURATION_BONUS
          }
          _ => 0.0,
        };

        (jaccard + key_matches as f64 * KEY_TERM_BONUS + complete + duration).min(1.0)
      })
      .collect()
  }
}

fn tokens(text: &str) -> BTreeSet<String> {
  WORD_RE
    .as_ref()
    .map(|re| re.find_iter(text).map(|m| m.as_str().to_string()).collect())
    .unwrap_or_default()
}

/// Append the synonyms of every table term found in `text`
fn expand(text: &str) -> String {
  let mut expanded = text.to_string();
  for (term, synonyms) in SYNONYMS {
    if text.contains(term) {
      for synonym in *synonyms {
        expanded.push(' ');
        expanded.push_str(synonym);
      }
    }
  }
  expanded
}

/// Sum of every `N min` in the query, if any
fn stated_minutes(text: &str) -> Option<i64> {
  let re = MINUTES_RE.as_ref()?;
  let values: Vec<i64> = re
    .captures_iter(text)
    .filter_map(|c| c[1].parse::<i64>().ok())
    .collect();
  (!values.is_empty()).then(|| values.iter().fold(0_i64, |acc, v| acc.saturating_add(*v)))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
