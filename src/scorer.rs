//! Completeness scoring and the missing-information diagnostic
//!
//! The score is a pure function of `ExtractedParameters`. The message built
//! from `MissingItem`s is a stable surface: callers parse the numbered items.

use crate::models::{DurationPrecision, ExtractedParameters, IntensityPrecision};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DIAGNOSTIC_PREFIX: &str =
  "The workout description is missing required information. Please specify: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingItem {
  Duration,
  Intensity,
  Recovery,
  Structure,
}

impl MissingItem {
  pub fn index(&self) -> u8 {
    match self {
      MissingItem::Duration => 1,
      MissingItem::Intensity => 2,
      MissingItem::Recovery => 3,
      MissingItem::Structure => 4,
    }
  }

  pub fn key(&self) -> &'static str {
    match self {
      MissingItem::Duration => "duration",
      MissingItem::Intensity => "intensity",
      MissingItem::Recovery => "recovery",
      MissingItem::Structure => "structure",
    }
  }

  pub fn description(&self) -> &'static str {
    match self {
      MissingItem::Duration => "The total duration of the session",
      MissingItem::Intensity => {
        "The intensity targets for each effort (power zones, specific power values, or RPE)"
      }
      MissingItem::Recovery => "Recovery periods between intervals",
      MissingItem::Structure => "The workout structure (intervals, repetitions, or continuous effort)",
    }
  }
}

impl fmt::Display for MissingItem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}) {}", self.index(), self.description())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessScore {
  pub score: f64,
  pub missing: Vec<MissingItem>,
}

/// ---------------------------------------------------------------------------
/// Scoring
/// ---------------------------------------------------------------------------

pub fn score(extracted: &ExtractedParameters) -> CompletenessScore {
  let durations = &extracted.durations;
  let intensities = &extracted.intensities;
  let mut total: f64 = 0.0;
  let mut missing = Vec::new();

  if durations.has_main_duration() {
    total += 0.4;
    if durations.precision == DurationPrecision::Second {
      total += 0.1;
    }
  } else {
    missing.push(MissingItem::Duration);
  }

  if intensities.has_target() {
    total += 0.4;
    if intensities.precision == IntensityPrecision::Decimal {
      total += 0.1;
    }
  } else {
    missing.push(MissingItem::Intensity);
  }

  if extracted.structure.is_interval_type() {
    total += 0.1;
    if extracted.repetitions.primary.is_some() {
      total += 0.1;
    }
  }

  if extracted.repetitions.primary.is_some() && durations.recovery.is_empty() {
    missing.push(MissingItem::Recovery);
  }

  // Round away float noise so 0.6 and 0.9 land exactly on the thresholds
  let total = (total * 100.0).round() / 100.0;

  CompletenessScore {
    score: total.min(1.0),
    missing,
  }
}

/// Reject-path message. An empty list falls back to the generic request.
pub fn diagnostic(missing: &[MissingItem]) -> String {
  let items: Vec<MissingItem> = if missing.is_empty() {
    vec![MissingItem::Duration, MissingItem::Structure, MissingItem::Intensity]
  } else {
    missing.to_vec()
  };

  let listed: Vec<String> = items.iter().map(MissingItem::to_string).collect();
  format!("{}{}", DIAGNOSTIC_PREFIX, listed.join(", "))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
