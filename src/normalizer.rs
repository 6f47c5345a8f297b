//! Domain-vocabulary spelling normalization
//!
//! Three passes over the lowercased query: compound phrases, single-token
//! table corrections, then fuzzy matching against the cycling vocabulary.
//! Substitutions happen in place, so digits and punctuation (`%`, `.`, `-`)
//! survive untouched for the extractor.

use crate::models::{CorrectedQuery, Correction, CorrectionKind};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// ---------------------------------------------------------------------------
/// Tables
/// ---------------------------------------------------------------------------

pub const VOCABULARY: &[&str] = &[
  "ftp", "seuil", "tempo", "endurance", "aerobic", "anaerobie", "vo2max", "puissance", "watts",
  "cadence", "frequence", "intervals", "series", "repetitions", "pyramide", "spirale",
  "fibonacci", "over", "under", "sweet", "spot", "threshold", "recovery", "base", "minutes",
  "secondes", "heures", "min", "sec", "facile", "modere", "dur", "maximum", "echauffement",
  "retour", "calme", "repos", "recuperation", "travail", "effort", "sprint", "zone",
  "progression", "blocs",
];

/// Every target is a fixed point: either in VOCABULARY or absent from all keys
const COMPOUND_CORRECTIONS: &[(&str, &str)] = &[
  ("cool down", "retour au calme"),
  ("warm up", "echauffement"),
  ("super dur", "maximum"),
  ("très dur", "maximum"),
  ("tres dur", "maximum"),
  ("à fond", "maximum"),
  ("a fond", "maximum"),
  ("au max", "maximum"),
];

const TOKEN_CORRECTIONS: &[(&str, &str)] = &[
  ("aerobik", "aerobic"),
  ("seuille", "seuil"),
  ("recup", "recuperation"),
  ("recupe", "recuperation"),
  ("récup", "recuperation"),
  ("récupération", "recuperation"),
  ("piramide", "pyramide"),
  ("pyramid", "pyramide"),
  ("anaerobik", "anaerobie"),
  ("chaude", "echauffement"),
  ("chauffe", "echauffement"),
  ("warm", "echauffement"),
  ("warmup", "echauffement"),
  ("échauffement", "echauffement"),
  ("echauffements", "echauffement"),
  ("échauffements", "echauffement"),
  ("cooldown", "retour au calme"),
  ("cool", "retour"),
  ("down", "calme"),
  ("set", "series"),
  ("sets", "series"),
  ("rep", "repetitions"),
  ("reps", "repetitions"),
  ("pose", "repos"),
  ("pause", "repos"),
  ("break", "repos"),
  ("fond", "maximum"),
  ("donf", "maximum"),
  ("max", "maximum"),
  ("facil", "facile"),
  ("ezpz", "facile"),
  ("modéré", "modere"),
  ("doie", "dois"),
  ("doit", "dois"),
  ("apres", "après"),
  ("avk", "avec"),
  ("avek", "avec"),
  ("minut", "minutes"),
  ("minuts", "minutes"),
  ("mn", "minutes"),
  ("fini", "finir"),
  ("finit", "finir"),
];

const FUZZY_THRESHOLD: f64 = 0.8;
const FUZZY_MIN_LEN: usize = 3;
const VOCABULARY_BONUS: f64 = 0.3;

static WORD_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\w+").ok());

static COMPOUND_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  let alternatives: Vec<String> = COMPOUND_CORRECTIONS
    .iter()
    .map(|(from, _)| regex::escape(from))
    .collect();
  Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).ok()
});

/// ---------------------------------------------------------------------------
/// Correction
/// ---------------------------------------------------------------------------

pub fn correct(text: &str) -> CorrectedQuery {
  let lowered = text.trim().to_lowercase();
  let mut corrections = Vec::new();

  let after_compounds = match COMPOUND_RE.as_ref() {
    Some(re) => re
      .replace_all(&lowered, |caps: &Captures| {
        let from = &caps[0];
        let to = lookup(COMPOUND_CORRECTIONS, from).unwrap_or(from);
        corrections.push(Correction {
          from: from.to_string(),
          to: to.to_string(),
          kind: CorrectionKind::Compound,
        });
        to.to_string()
      })
      .into_owned(),
    None => lowered,
  };

  let corrected = match WORD_RE.as_ref() {
    Some(re) => re
      .replace_all(&after_compounds, |caps: &Captures| {
        let token = &caps[0];
        let replacement = lookup(TOKEN_CORRECTIONS, token)
          .map(|to| (to, CorrectionKind::Vocabulary))
          .or_else(|| fuzzy_match(token).map(|to| (to, CorrectionKind::Fuzzy)));

        match replacement {
          Some((to, kind)) => {
            corrections.push(Correction {
              from: token.to_string(),
              to: to.to_string(),
              kind,
            });
            to.to_string()
          }
          None => token.to_string(),
        }
      })
      .into_owned(),
    None => after_compounds,
  };

  let confidence = correction_confidence(&corrected, corrections.len());

  if !corrections.is_empty() {
    tracing::debug!(count = corrections.len(), confidence, "query normalized");
  }

  CorrectedQuery {
    text: corrected,
    corrections,
    confidence,
  }
}

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
  table.iter().find(|(from, _)| *from == key).map(|(_, to)| *to)
}

fn is_correction_target(token: &str) -> bool {
  TOKEN_CORRECTIONS
    .iter()
    .chain(COMPOUND_CORRECTIONS)
    .any(|(_, to)| to.split_whitespace().any(|w| w == token))
}

/// Closest vocabulary word by normalized Levenshtein similarity
fn fuzzy_match(token: &str) -> Option<&'static str> {
  if token.chars().count() < FUZZY_MIN_LEN
    || token.chars().any(|c| c.is_ascii_digit())
    || VOCABULARY.contains(&token)
    || is_correction_target(token)
  {
    return None;
  }

  let mut best: Option<(&'static str, f64)> = None;
  for &word in VOCABULARY {
    let similarity = strsim::normalized_levenshtein(token, word);
    if similarity > FUZZY_THRESHOLD && best.map_or(true, |(_, s)| similarity > s) {
      best = Some((word, similarity));
    }
  }

  best.map(|(word, _)| word)
}

fn correction_confidence(corrected: &str, corrections: usize) -> f64 {
  if corrections == 0 {
    return 1.0;
  }

  let base = (1.0 - 0.1 * corrections as f64).max(0.5);

  let tokens: Vec<&str> = WORD_RE
    .as_ref()
    .map(|re| re.find_iter(corrected).map(|m| m.as_str()).collect())
    .unwrap_or_default();

  let fraction = if tokens.is_empty() {
    0.0
  } else {
    let known = tokens.iter().filter(|t| VOCABULARY.contains(t)).count();
    known as f64 / tokens.len() as f64
  };

  (base + VOCABULARY_BONUS * fraction).min(1.0)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
