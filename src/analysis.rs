//! Deterministic metrics for generated workouts
//!
//! Zone labels, cadence targets, training load and difficulty are fixed
//! functions of intensities and segments. Nothing here reads query text.

use crate::models::{StructureType, WorkoutSegment, ZoneTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// ---------------------------------------------------------------------------
/// Power Zones
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerZone {
  Z1, // Recovery: <= 55% FTP
  Z2, // Endurance: <= 75%
  Z3, // Tempo: <= 90%
  Z4, // Threshold: <= 105%
  Z5, // VO2max: <= 120%
  Z6, // Neuromuscular: > 120%
}

impl PowerZone {
  pub fn from_intensity(pct: f64) -> Self {
    match pct {
      p if p <= 55.0 => PowerZone::Z1,
      p if p <= 75.0 => PowerZone::Z2,
      p if p <= 90.0 => PowerZone::Z3,
      p if p <= 105.0 => PowerZone::Z4,
      p if p <= 120.0 => PowerZone::Z5,
      _ => PowerZone::Z6,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      PowerZone::Z1 => "Zone 1 (Recovery)",
      PowerZone::Z2 => "Zone 2 (Endurance)",
      PowerZone::Z3 => "Zone 3 (Tempo)",
      PowerZone::Z4 => "Zone 4 (Threshold)",
      PowerZone::Z5 => "Zone 5 (VO2max)",
      PowerZone::Z6 => "Zone 6 (Neuromuscular)",
    }
  }
}

/// Target cadence (rpm) by intensity band
pub fn cadence_for(pct: f64) -> u32 {
  match pct {
    p if p <= 75.0 => 85,
    p if p <= 90.0 => 90,
    p if p <= 105.0 => 95,
    p if p <= 120.0 => 105,
    _ => 110,
  }
}

/// Named zone whose band contains `pct`. Sweet spot overlaps tempo and
/// threshold, so it is never returned here.
pub fn zone_containing(pct: f64) -> Option<ZoneTag> {
  ZoneTag::ALL
    .iter()
    .copied()
    .filter(|z| *z != ZoneTag::SweetSpot)
    .find(|z| {
      let (lo, hi) = z.range();
      pct >= lo as f64 && pct < (hi + 1) as f64
    })
}

/// ---------------------------------------------------------------------------
/// Training Load and Difficulty
/// ---------------------------------------------------------------------------

pub fn round1(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

/// Sum of per-segment load, rounded once at the end
pub fn total_training_load(segments: &[WorkoutSegment]) -> f64 {
  round1(segments.iter().map(WorkoutSegment::training_load).sum())
}

pub fn difficulty(segments: &[WorkoutSegment], training_load: f64, complex: bool) -> u8 {
  let max_intensity = segments
    .iter()
    .map(WorkoutSegment::peak_intensity)
    .fold(0.0_f64, f64::max);

  let mut score: i32 = 0;

  score += match max_intensity {
    i if i >= 110.0 => 3,
    i if i >= 95.0 => 2,
    i if i >= 80.0 => 1,
    _ => 0,
  };

  score += match training_load {
    t if t >= 100.0 => 2,
    t if t >= 60.0 => 1,
    _ => 0,
  };

  if complex {
    score += 1;
  }

  score.clamp(1, 5) as u8
}

pub fn load_label(training_load: f64) -> &'static str {
  match training_load {
    t if t >= 100.0 => "Intense",
    t if t >= 60.0 => "Moderate",
    _ => "Easy",
  }
}

/// ---------------------------------------------------------------------------
/// Classification
/// ---------------------------------------------------------------------------

pub fn workout_type(zones: &BTreeSet<ZoneTag>, structure: StructureType, complex: bool) -> &'static str {
  if zones.contains(&ZoneTag::Vo2max) {
    "VO2max Intervals"
  } else if zones.contains(&ZoneTag::Threshold) {
    "Threshold Training"
  } else if zones.contains(&ZoneTag::SweetSpot) {
    "Sweet Spot"
  } else if structure == StructureType::Pyramid {
    "Pyramid Workout"
  } else if complex {
    "Complex Training"
  } else if zones.contains(&ZoneTag::Endurance) {
    "Endurance Base"
  } else {
    "Mixed Training"
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::SegmentType;

  fn seg(seconds: u32, start: f64, end: f64) -> WorkoutSegment {
    WorkoutSegment {
      name: "s".to_string(),
      duration_seconds: seconds,
      intensity_start: start,
      intensity_end: end,
      zone: PowerZone::from_intensity(start).label().to_string(),
      segment_type: SegmentType::Work,
      cadence: Some(cadence_for(start)),
      power_curve: None,
    }
  }

  #[test]
  fn test_power_zone_boundaries() {
    assert_eq!(PowerZone::from_intensity(55.0), PowerZone::Z1);
    assert_eq!(PowerZone::from_intensity(55.1), PowerZone::Z2);
    assert_eq!(PowerZone::from_intensity(82.0), PowerZone::Z3);
    assert_eq!(PowerZone::from_intensity(95.0), PowerZone::Z4);
    assert_eq!(PowerZone::from_intensity(120.0), PowerZone::Z5);
    assert_eq!(PowerZone::from_intensity(130.0), PowerZone::Z6);
    assert_eq!(PowerZone::Z3.label(), "Zone 3 (Tempo)");
  }

  #[test]
  fn test_cadence_bands() {
    assert_eq!(cadence_for(50.0), 85);
    assert_eq!(cadence_for(75.0), 85);
    assert_eq!(cadence_for(87.3), 90);
    assert_eq!(cadence_for(95.0), 95);
    assert_eq!(cadence_for(110.0), 105);
    assert_eq!(cadence_for(130.0), 110);
  }

  #[test]
  fn test_zone_containing() {
    assert_eq!(zone_containing(82.0), Some(ZoneTag::Tempo));
    assert_eq!(zone_containing(95.0), Some(ZoneTag::Threshold));
    assert_eq!(zone_containing(105.5), Some(ZoneTag::Threshold));
    assert_eq!(zone_containing(130.0), Some(ZoneTag::Anaerobic));
    assert_eq!(zone_containing(20.0), None);
  }

  #[test]
  fn test_training_load_is_sum_of_segments() {
    let segments = vec![seg(300, 95.0, 95.0), seg(150, 55.0, 55.0), seg(600, 70.0, 50.0)];
    let expected: f64 = segments.iter().map(|s| s.training_load()).sum();
    assert_eq!(total_training_load(&segments), round1(expected));
  }

  #[test]
  fn test_difficulty_clamped() {
    // Easy and short still rates at least 1
    let easy = vec![seg(600, 50.0, 50.0)];
    assert_eq!(difficulty(&easy, 4.2, false), 1);

    // 3 (intensity) + 2 (load) + 1 (complex) caps at 5
    let hard = vec![seg(7200, 115.0, 115.0)];
    assert_eq!(difficulty(&hard, 264.5, true), 5);

    // 2 (>= 95%) + 0
    let threshold = vec![seg(900, 95.0, 95.0)];
    assert_eq!(difficulty(&threshold, 22.6, false), 2);
  }

  #[test]
  fn test_workout_type_priority() {
    let mut zones = BTreeSet::new();
    assert_eq!(workout_type(&zones, StructureType::Continuous, false), "Mixed Training");
    assert_eq!(workout_type(&zones, StructureType::Pyramid, true), "Pyramid Workout");
    assert_eq!(workout_type(&zones, StructureType::Spiral, true), "Complex Training");
    zones.insert(ZoneTag::Endurance);
    assert_eq!(workout_type(&zones, StructureType::Continuous, false), "Endurance Base");
    zones.insert(ZoneTag::Threshold);
    assert_eq!(workout_type(&zones, StructureType::Pyramid, true), "Threshold Training");
    zones.insert(ZoneTag::Vo2max);
    assert_eq!(workout_type(&zones, StructureType::Continuous, false), "VO2max Intervals");
  }

  #[test]
  fn test_load_label() {
    assert_eq!(load_label(120.0), "Intense");
    assert_eq!(load_label(60.0), "Moderate");
    assert_eq!(load_label(12.0), "Easy");
  }
}
