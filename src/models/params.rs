use super::workout::{PeriodizationPhase, TargetSystem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// ---------------------------------------------------------------------------
/// Precision tags
/// ---------------------------------------------------------------------------

/// Ordered from loosest to tightest, so `max` keeps the tightest match
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DurationPrecision {
  #[default]
  None,
  Minute,
  Second,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IntensityPrecision {
  #[default]
  None,
  Integer,
  Decimal,
}

/// ---------------------------------------------------------------------------
/// Named intensity zones
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTag {
  Recovery,
  Endurance,
  Tempo,
  SweetSpot,
  Threshold,
  Vo2max,
  Anaerobic,
  Neuromuscular,
}

impl ZoneTag {
  pub const ALL: [ZoneTag; 8] = [
    ZoneTag::Recovery,
    ZoneTag::Endurance,
    ZoneTag::Tempo,
    ZoneTag::SweetSpot,
    ZoneTag::Threshold,
    ZoneTag::Vo2max,
    ZoneTag::Anaerobic,
    ZoneTag::Neuromuscular,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ZoneTag::Recovery => "recovery",
      ZoneTag::Endurance => "endurance",
      ZoneTag::Tempo => "tempo",
      ZoneTag::SweetSpot => "sweet_spot",
      ZoneTag::Threshold => "threshold",
      ZoneTag::Vo2max => "vo2max",
      ZoneTag::Anaerobic => "anaerobic",
      ZoneTag::Neuromuscular => "neuromuscular",
    }
  }

  /// Words and phrases (already normalized) that name this zone
  pub fn aliases(&self) -> &'static [&'static str] {
    match self {
      ZoneTag::Recovery => &["zone1", "zone 1", "z1", "recuperation active"],
      ZoneTag::Endurance => &["endurance", "aerobic", "fondamental", "zone2", "zone 2", "z2"],
      ZoneTag::Tempo => &["tempo", "zone3", "zone 3", "z3"],
      ZoneTag::SweetSpot => &["sweet spot", "sweet-spot", "sweetspot"],
      ZoneTag::Threshold => &["seuil", "threshold", "zone4", "zone 4", "z4"],
      ZoneTag::Vo2max => &["vo2max", "vo2", "maximum", "pma", "zone5", "zone 5", "z5"],
      ZoneTag::Anaerobic => &["anaerobie", "anaerobic", "zone6", "zone 6", "z6"],
      ZoneTag::Neuromuscular => &["sprint", "sprints", "neuromusculaire", "neuromuscular"],
    }
  }

  /// Percent-of-FTP band
  pub fn range(&self) -> (u32, u32) {
    match self {
      ZoneTag::Recovery => (40, 55),
      ZoneTag::Endurance => (56, 75),
      ZoneTag::Tempo => (76, 88),
      ZoneTag::SweetSpot => (84, 96),
      ZoneTag::Threshold => (91, 105),
      ZoneTag::Vo2max => (106, 120),
      ZoneTag::Anaerobic => (121, 150),
      ZoneTag::Neuromuscular => (151, 300),
    }
  }

  pub fn midpoint(&self) -> f64 {
    let (lo, hi) = self.range();
    ((lo + hi) / 2) as f64
  }

  /// Intensity prescribed for a single interpreted step in this zone
  pub fn prescription(&self) -> f64 {
    match self {
      ZoneTag::Recovery => 45.0,
      ZoneTag::Endurance => 65.0,
      ZoneTag::Tempo => 82.0,
      ZoneTag::Threshold => 95.0,
      ZoneTag::Vo2max => 110.0,
      other => other.midpoint(),
    }
  }

  pub fn system(&self) -> TargetSystem {
    match self {
      ZoneTag::Recovery => TargetSystem::Recovery,
      ZoneTag::Endurance | ZoneTag::Tempo => TargetSystem::Aerobic,
      ZoneTag::SweetSpot | ZoneTag::Threshold => TargetSystem::Threshold,
      ZoneTag::Vo2max => TargetSystem::Vo2max,
      ZoneTag::Anaerobic => TargetSystem::Anaerobic,
      ZoneTag::Neuromuscular => TargetSystem::Neuromuscular,
    }
  }
}

impl fmt::Display for ZoneTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// ---------------------------------------------------------------------------
/// Structure shapes
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
  #[default]
  Continuous,
  SimpleIntervals,
  Nested,
  Pyramid,
  Alternation,
  Fibonacci,
  Spiral,
  OverUnder,
}

impl StructureType {
  pub fn as_str(&self) -> &'static str {
    match self {
      StructureType::Continuous => "continuous",
      StructureType::SimpleIntervals => "simple_intervals",
      StructureType::Nested => "nested",
      StructureType::Pyramid => "pyramid",
      StructureType::Alternation => "alternation",
      StructureType::Fibonacci => "fibonacci",
      StructureType::Spiral => "spiral",
      StructureType::OverUnder => "over_under",
    }
  }

  pub fn is_interval_type(&self) -> bool {
    !matches!(self, StructureType::Continuous)
  }
}

impl fmt::Display for StructureType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// ---------------------------------------------------------------------------
/// Extracted Parameters
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationRole {
  Work,
  Recovery,
  Warmup,
  Cooldown,
  Total,
}

/// All durations are in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Durations {
  pub work: Vec<u32>,
  pub recovery: Vec<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub warmup: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cooldown: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub total: Option<u32>,
  pub precision: DurationPrecision,
}

impl Durations {
  pub fn has_main_duration(&self) -> bool {
    !self.work.is_empty() || self.total.is_some_and(|t| t > 0)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intensities {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub primary: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secondary: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub range: Option<(f64, f64)>,
  pub zones: BTreeSet<ZoneTag>,
  pub precision: IntensityPrecision,
}

impl Intensities {
  pub fn has_target(&self) -> bool {
    self.primary.is_some() || !self.zones.is_empty()
  }

  /// Zone with the highest midpoint, if any were named
  pub fn strongest_zone(&self) -> Option<ZoneTag> {
    self.zones.iter().copied().max_by_key(|z| z.range().1)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repetitions {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub primary: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secondary: Option<u32>,
}

/// One stated step of a pyramid or spiral sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
  pub seconds: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub intensity: Option<f64>,
}

/// Keyword cues the generator needs besides the numbers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cues {
  pub warmup: bool,
  pub cooldown: bool,
  /// Spiral sequences mirror back down
  pub descend: bool,
  pub phase: PeriodizationPhase,
  pub systems: BTreeSet<TargetSystem>,
  pub numeric_tokens: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParameters {
  pub durations: Durations,
  pub intensities: Intensities,
  pub repetitions: Repetitions,
  pub structure: StructureType,
  pub sequence: Vec<SequenceStep>,
  pub cues: Cues,
}

impl ExtractedParameters {
  pub fn complexity_flagged(&self) -> bool {
    !matches!(
      self.structure,
      StructureType::Continuous | StructureType::SimpleIntervals
    ) || self.cues.numeric_tokens > 5
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_precision_ordering() {
    assert!(DurationPrecision::Second > DurationPrecision::Minute);
    assert!(DurationPrecision::Minute > DurationPrecision::None);
    assert_eq!(
      DurationPrecision::Second.max(DurationPrecision::Minute),
      DurationPrecision::Second
    );
    assert!(IntensityPrecision::Decimal > IntensityPrecision::Integer);
  }

  #[test]
  fn test_zone_midpoints() {
    assert_eq!(ZoneTag::Tempo.midpoint(), 82.0);
    assert_eq!(ZoneTag::Vo2max.midpoint(), 113.0);
    assert_eq!(ZoneTag::Tempo.prescription(), 82.0);
    assert_eq!(ZoneTag::SweetSpot.prescription(), 90.0);
  }

  #[test]
  fn test_strongest_zone() {
    let mut intensities = Intensities::default();
    assert_eq!(intensities.strongest_zone(), None);
    intensities.zones.insert(ZoneTag::Tempo);
    intensities.zones.insert(ZoneTag::Vo2max);
    intensities.zones.insert(ZoneTag::Endurance);
    assert_eq!(intensities.strongest_zone(), Some(ZoneTag::Vo2max));
  }

  #[test]
  fn test_main_duration_ignores_zero_total() {
    let mut d = Durations::default();
    assert!(!d.has_main_duration());
    d.total = Some(0);
    assert!(!d.has_main_duration());
    d.total = Some(600);
    assert!(d.has_main_duration());
  }
}
