use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// ---------------------------------------------------------------------------
/// Segments
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
  Warmup,
  Work,
  Recovery,
  Cooldown,
  Ramp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerCurve {
  Linear,
  Exponential,
  Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSegment {
  pub name: String,

  /// Whole minutes stay multiples of 60; second-precision input keeps its seconds
  pub duration_seconds: u32,

  /// Percent of reference power
  pub intensity_start: f64,
  pub intensity_end: f64,

  pub zone: String,
  pub segment_type: SegmentType,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub cadence: Option<u32>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub power_curve: Option<PowerCurve>,
}

impl WorkoutSegment {
  pub fn mean_intensity(&self) -> f64 {
    (self.intensity_start + self.intensity_end) / 2.0
  }

  pub fn peak_intensity(&self) -> f64 {
    self.intensity_start.max(self.intensity_end)
  }

  /// TSS-equivalent load: hours x (mean intensity fraction)^2 x 100, unrounded
  pub fn training_load(&self) -> f64 {
    let hours = self.duration_seconds as f64 / 3600.0;
    let fraction = self.mean_intensity() / 100.0;
    hours * fraction * fraction * 100.0
  }
}

/// ---------------------------------------------------------------------------
/// Workout-level tags
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodizationPhase {
  Base,
  #[default]
  Build,
  Peak,
  Recovery,
}

impl PeriodizationPhase {
  pub fn as_str(&self) -> &'static str {
    match self {
      PeriodizationPhase::Base => "base",
      PeriodizationPhase::Build => "build",
      PeriodizationPhase::Peak => "peak",
      PeriodizationPhase::Recovery => "recovery",
    }
  }
}

impl fmt::Display for PeriodizationPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSystem {
  Recovery,
  Aerobic,
  Threshold,
  Vo2max,
  Anaerobic,
  Neuromuscular,
}

impl TargetSystem {
  pub fn as_str(&self) -> &'static str {
    match self {
      TargetSystem::Recovery => "recovery",
      TargetSystem::Aerobic => "aerobic",
      TargetSystem::Threshold => "threshold",
      TargetSystem::Vo2max => "vo2max",
      TargetSystem::Anaerobic => "anaerobic",
      TargetSystem::Neuromuscular => "neuromuscular",
    }
  }
}

/// ---------------------------------------------------------------------------
/// Parametric Workout
/// ---------------------------------------------------------------------------

/// A generated workout. Built once by the generator and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricWorkout {
  pub name: String,
  pub description: String,
  pub workout_type: String,
  pub segments: Vec<WorkoutSegment>,
  pub total_duration_seconds: u32,
  pub difficulty: u8,
  pub training_load: f64,
  pub target_systems: BTreeSet<TargetSystem>,
  pub periodization_phase: PeriodizationPhase,
}

impl ParametricWorkout {
  pub fn total_minutes(&self) -> f64 {
    self.total_duration_seconds as f64 / 60.0
  }

  pub fn work_segments(&self) -> impl Iterator<Item = &WorkoutSegment> {
    self
      .segments
      .iter()
      .filter(|s| s.segment_type == SegmentType::Work)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn flat(seconds: u32, pct: f64, segment_type: SegmentType) -> WorkoutSegment {
    WorkoutSegment {
      name: "block".to_string(),
      duration_seconds: seconds,
      intensity_start: pct,
      intensity_end: pct,
      zone: String::new(),
      segment_type,
      cadence: None,
      power_curve: None,
    }
  }

  #[test]
  fn test_segment_training_load() {
    // One hour at threshold is 100 by definition
    let seg = flat(3600, 100.0, SegmentType::Work);
    assert!((seg.training_load() - 100.0).abs() < 1e-9);

    let half = flat(1800, 50.0, SegmentType::Recovery);
    assert!((half.training_load() - 12.5).abs() < 1e-9);
  }

  #[test]
  fn test_ramp_mean_and_peak() {
    let mut seg = flat(600, 70.0, SegmentType::Cooldown);
    seg.intensity_end = 50.0;
    assert_eq!(seg.mean_intensity(), 60.0);
    assert_eq!(seg.peak_intensity(), 70.0);
  }

  #[test]
  fn test_work_segments_and_total_minutes() {
    let workout = ParametricWorkout {
      name: "w".to_string(),
      description: String::new(),
      workout_type: "Mixed Training".to_string(),
      segments: vec![
        flat(300, 50.0, SegmentType::Warmup),
        flat(120, 95.0, SegmentType::Work),
        flat(60, 55.0, SegmentType::Recovery),
      ],
      total_duration_seconds: 480,
      difficulty: 2,
      training_load: 0.0,
      target_systems: BTreeSet::new(),
      periodization_phase: PeriodizationPhase::Build,
    };

    assert_eq!(workout.work_segments().count(), 1);
    assert_eq!(workout.total_minutes(), 8.0);
  }
}
