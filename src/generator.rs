//! Parametric workout generation
//!
//! Turns extracted (and calculated) parameters into an ordered list of
//! segments: optional warm-up progression, a main block shaped by the
//! structure type, optional cooldown. Metrics (training load, difficulty,
//! type, name) are derived from the finished segment list.

use crate::analysis::{self, PowerZone};
use crate::calculator::{CalculatedValues, FIBONACCI_MINUTES};
use crate::extractor;
use crate::interpreter::{BlockStep, StepKind};
use crate::models::{
  CorpusEntry, DurationPrecision, ExtractedParameters, ParametricWorkout, PowerCurve,
  SegmentType, StructureType, TargetSystem, WorkoutSegment, ZoneTag,
};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use thiserror::Error;

pub const DEFAULT_TARGET_INTENSITY: f64 = 85.0;
pub const RECOVERY_INTENSITY: f64 = 55.0;
const DEFAULT_RECOVERY_RATIO: f64 = 0.5;
const DEFAULT_CONTINUOUS_SECONDS: u32 = 30 * 60;
const MIN_CONTINUOUS_SECONDS: u32 = 20 * 60;
/// Upper bound on expanded repetitions (outer x inner for nested blocks)
pub const MAX_REPETITIONS: u32 = 200;
pub const MAX_WORKOUT_SECONDS: u32 = 24 * 3600;
const DEFAULT_UNDER: f64 = 95.0;
const DEFAULT_OVER: f64 = 105.0;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
  #[error("Main block is empty for structure '{0}'")]
  EmptyMainBlock(StructureType),

  #[error("Segment '{0}' has a non-positive duration")]
  NonPositiveDuration(String),

  #[error("{0} repetitions exceed the limit of {max}", max = MAX_REPETITIONS)]
  TooManyRepetitions(u64),

  #[error("Workout lasts {0} s, over the limit of {max} s", max = MAX_WORKOUT_SECONDS)]
  TooLong(u64),
}

impl Serialize for GenerationError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Segment helpers
/// ---------------------------------------------------------------------------

fn flat(name: impl Into<String>, seconds: u32, pct: f64, segment_type: SegmentType) -> WorkoutSegment {
  WorkoutSegment {
    name: name.into(),
    duration_seconds: seconds,
    intensity_start: pct,
    intensity_end: pct,
    zone: PowerZone::from_intensity(pct).label().to_string(),
    segment_type,
    cadence: Some(analysis::cadence_for(pct)),
    power_curve: None,
  }
}

fn ramp(
  name: impl Into<String>,
  seconds: u32,
  start: f64,
  end: f64,
  segment_type: SegmentType,
) -> WorkoutSegment {
  let mean = (start + end) / 2.0;
  WorkoutSegment {
    name: name.into(),
    duration_seconds: seconds,
    intensity_start: start,
    intensity_end: end,
    zone: PowerZone::from_intensity(mean).label().to_string(),
    segment_type,
    cadence: Some(analysis::cadence_for(mean)),
    power_curve: Some(PowerCurve::Linear),
  }
}

fn recovery(index: usize, seconds: u32) -> WorkoutSegment {
  flat(format!("Recovery {}", index), seconds, RECOVERY_INTENSITY, SegmentType::Recovery)
}

/// Pyramid rule: half the block, never under two minutes
fn pyramid_recovery_seconds(work_seconds: u32) -> u32 {
  (work_seconds / 60 / 2).max(2) * 60
}

/// Work blocks separated by recoveries, none after the last block
fn with_recoveries<F>(blocks: Vec<WorkoutSegment>, recovery_for: F) -> Vec<WorkoutSegment>
where
  F: Fn(&WorkoutSegment) -> u32,
{
  let count = blocks.len();
  let mut segments = Vec::with_capacity(count * 2);
  for (i, block) in blocks.into_iter().enumerate() {
    let rest = recovery_for(&block);
    segments.push(block);
    if i + 1 < count {
      segments.push(recovery(i + 1, rest));
    }
  }
  segments
}

/// ---------------------------------------------------------------------------
/// Parametric Generator
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ParametricGenerator {
  /// Recovery as a fraction of work for simple intervals
  pub recovery_ratio: f64,
}

impl Default for ParametricGenerator {
  fn default() -> Self {
    Self {
      recovery_ratio: DEFAULT_RECOVERY_RATIO,
    }
  }
}

impl ParametricGenerator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn generate(
    &self,
    extracted: &ExtractedParameters,
    calculated: &CalculatedValues,
    reference_power: u32,
  ) -> Result<ParametricWorkout, GenerationError> {
    let target = target_intensity(extracted);
    check_repetitions(extracted, calculated)?;

    let main = self.main_block(extracted, calculated, target);
    if main.is_empty() {
      return Err(GenerationError::EmptyMainBlock(extracted.structure));
    }

    let mut segments = Vec::new();
    if extracted.cues.warmup {
      segments.extend(warmup_progression(extracted));
    }
    segments.extend(main);
    if extracted.cues.cooldown {
      segments.push(cooldown(extracted.durations.cooldown));
    }

    let description = format!(
      "{} at {}% FTP ({} W)",
      extracted.structure,
      target,
      watts(target, reference_power)
    );

    assemble(segments, extracted, description)
  }

  /// Expert-mode fallback: one continuous block from whatever was estimated
  pub fn minimal(
    &self,
    extracted: &ExtractedParameters,
    reference_power: u32,
  ) -> Result<ParametricWorkout, GenerationError> {
    let mut estimated = extracted.clone();
    estimated.structure = StructureType::Continuous;
    estimated.cues.warmup = false;
    estimated.cues.cooldown = false;
    estimated.repetitions = Default::default();
    let durations = &estimated.durations;
    let work: u64 = durations.work.iter().map(|&s| u64::from(s)).sum();
    let stated = work.max(durations.total.map_or(0, u64::from));
    if stated > u64::from(MAX_WORKOUT_SECONDS) {
      tracing::debug!(stated, "estimated duration out of range, using the default");
      estimated.durations.work.clear();
      estimated.durations.total = None;
    }
    self.generate(&estimated, &CalculatedValues::default(), reference_power)
  }

  /// Workout from interpreted blocks, taken as given
  pub fn from_steps(
    &self,
    steps: &[BlockStep],
    extracted: &ExtractedParameters,
    reference_power: u32,
  ) -> Result<ParametricWorkout, GenerationError> {
    let segments: Vec<WorkoutSegment> = steps
      .iter()
      .map(|step| {
        let segment_type = match step.kind {
          StepKind::Warmup => SegmentType::Warmup,
          StepKind::Work => SegmentType::Work,
          StepKind::Recovery => SegmentType::Recovery,
          StepKind::Cooldown => SegmentType::Cooldown,
        };
        flat(step.label.clone(), step.seconds, step.intensity, segment_type)
      })
      .collect();

    if !segments.iter().any(|s| s.segment_type == SegmentType::Work) {
      return Err(GenerationError::EmptyMainBlock(extracted.structure));
    }

    let peak = segments
      .iter()
      .map(WorkoutSegment::peak_intensity)
      .fold(0.0_f64, f64::max);
    let description = format!(
      "{} interpreted blocks, peak {}% FTP ({} W)",
      segments.len(),
      peak,
      watts(peak, reference_power)
    );

    assemble(segments, extracted, description)
  }

  fn main_block(
    &self,
    extracted: &ExtractedParameters,
    calculated: &CalculatedValues,
    target: f64,
  ) -> Vec<WorkoutSegment> {
    let durations = &extracted.durations;

    match extracted.structure {
      StructureType::SimpleIntervals => self.simple_intervals(extracted, target),

      StructureType::Pyramid => {
        let blocks: Vec<u32> = if extracted.sequence.is_empty() {
          durations.work.clone()
        } else {
          extracted.sequence.iter().map(|s| s.seconds).collect()
        };
        pyramid_shape("Pyramid", &blocks, durations.recovery.first().copied(), target)
      }

      StructureType::Nested => {
        let outer = extracted.repetitions.primary.unwrap_or(1);
        let inner = extracted.repetitions.secondary.unwrap_or(1);
        let blocks: Vec<u32> = (0..outer.saturating_mul(inner))
          .flat_map(|_| durations.work.iter().copied())
          .collect();
        pyramid_shape("Block", &blocks, durations.recovery.first().copied(), target)
      }

      StructureType::Fibonacci => {
        let minutes = calculated
          .fibonacci
          .as_ref()
          .map(|f| f.minutes.clone())
          .unwrap_or_else(|| FIBONACCI_MINUTES.to_vec());
        let blocks: Vec<u32> = minutes.iter().map(|m| m * 60).collect();
        pyramid_shape("Fibonacci", &blocks, None, target)
      }

      StructureType::Alternation => match &calculated.alternation {
        Some(plan) => (0..plan.repetitions)
          .flat_map(|i| {
            [
              flat(
                format!("Alternation {} high", i + 1),
                plan.interval_seconds,
                plan.intensity_high,
                SegmentType::Work,
              ),
              flat(
                format!("Alternation {} low", i + 1),
                plan.interval_seconds,
                plan.intensity_low,
                SegmentType::Work,
              ),
            ]
          })
          .collect(),
        None => {
          tracing::debug!("no alternation plan, generating a continuous block");
          continuous(extracted, target)
        }
      },

      StructureType::Spiral => {
        if extracted.sequence.is_empty() {
          return continuous(extracted, target);
        }
        let mut steps: Vec<(u32, f64)> = extracted
          .sequence
          .iter()
          .map(|s| (s.seconds, s.intensity.unwrap_or(target)))
          .collect();
        if extracted.cues.descend {
          let down: Vec<(u32, f64)> = steps.iter().rev().skip(1).copied().collect();
          steps.extend(down);
        }
        let count = steps.len();
        steps
          .into_iter()
          .enumerate()
          .map(|(i, (seconds, pct))| {
            flat(format!("Spiral {}/{}", i + 1, count), seconds, pct, SegmentType::Work)
          })
          .collect()
      }

      StructureType::OverUnder => self.over_under(extracted),

      StructureType::Continuous => continuous(extracted, target),
    }
  }

  /// Stated recovery, else whole minutes of the work ratio, at least one
  fn interval_recovery(&self, extracted: &ExtractedParameters, work_seconds: u32) -> u32 {
    if let Some(stated) = extracted.durations.recovery.first() {
      return *stated;
    }
    let minutes = (work_seconds as f64 / 60.0 * self.recovery_ratio).floor() as u32;
    minutes.max(1).saturating_mul(60)
  }

  fn simple_intervals(&self, extracted: &ExtractedParameters, target: f64) -> Vec<WorkoutSegment> {
    let reps = extracted.repetitions.primary.unwrap_or(1);
    let durations = &extracted.durations;

    let work_seconds = match (durations.work.first(), durations.total) {
      (Some(w), _) => *w,
      (None, Some(total)) if reps > 0 => total / reps,
      _ => return Vec::new(),
    };

    let blocks: Vec<WorkoutSegment> = (1..=reps)
      .map(|i| flat(format!("Interval {}/{}", i, reps), work_seconds, target, SegmentType::Work))
      .collect();

    let rest = self.interval_recovery(extracted, work_seconds);
    with_recoveries(blocks, |_| rest)
  }

  /// Each repetition: under half, then over half
  fn over_under(&self, extracted: &ExtractedParameters) -> Vec<WorkoutSegment> {
    let Some(work_seconds) = extracted.durations.work.first().copied() else {
      return Vec::new();
    };
    let reps = extracted.repetitions.primary.unwrap_or(1);

    let intensities = &extracted.intensities;
    let (under, over) = match (intensities.primary, intensities.secondary, intensities.range) {
      (Some(a), Some(b), _) => (a.min(b), a.max(b)),
      (_, _, Some(range)) => range,
      _ => (DEFAULT_UNDER, DEFAULT_OVER),
    };

    let under_seconds = work_seconds / 2;
    let over_seconds = work_seconds - under_seconds;
    let rest = self.interval_recovery(extracted, work_seconds);

    let mut segments = Vec::new();
    for i in 1..=reps {
      segments.push(flat(format!("Under {}/{}", i, reps), under_seconds, under, SegmentType::Work));
      segments.push(flat(format!("Over {}/{}", i, reps), over_seconds, over, SegmentType::Work));
      if i < reps {
        segments.push(recovery(i as usize, rest));
      }
    }
    segments
  }
}

fn pyramid_shape(
  label: &str,
  blocks: &[u32],
  stated_recovery: Option<u32>,
  target: f64,
) -> Vec<WorkoutSegment> {
  let count = blocks.len();
  let work: Vec<WorkoutSegment> = blocks
    .iter()
    .enumerate()
    .map(|(i, seconds)| {
      flat(format!("{} {}/{}", label, i + 1, count), *seconds, target, SegmentType::Work)
    })
    .collect();

  with_recoveries(work, |block| {
    stated_recovery.unwrap_or_else(|| pyramid_recovery_seconds(block.duration_seconds))
  })
}

/// At least 20 minutes of steady work; nothing stated gives 30 minutes
fn continuous(extracted: &ExtractedParameters, target: f64) -> Vec<WorkoutSegment> {
  let durations = &extracted.durations;
  let stated: u64 = durations.work.iter().map(|&s| u64::from(s)).sum();
  let stated = match (stated, durations.total) {
    (0, None) => u64::from(DEFAULT_CONTINUOUS_SECONDS),
    (0, Some(total)) => u64::from(total),
    (sum, _) => sum,
  };
  let seconds = u32::try_from(stated.max(u64::from(MIN_CONTINUOUS_SECONDS))).unwrap_or(u32::MAX);
  vec![flat("Continuous effort", seconds, target, SegmentType::Work)]
}

/// Repetition counts are bounded before any segment is built
fn check_repetitions(
  extracted: &ExtractedParameters,
  calculated: &CalculatedValues,
) -> Result<(), GenerationError> {
  let reps = &extracted.repetitions;
  let expanded = match extracted.structure {
    StructureType::Nested => {
      u64::from(reps.primary.unwrap_or(1)) * u64::from(reps.secondary.unwrap_or(1))
    }
    StructureType::Alternation => calculated
      .alternation
      .as_ref()
      .map_or(0, |plan| u64::from(plan.repetitions)),
    _ => u64::from(reps.primary.unwrap_or(1)),
  };
  if expanded > u64::from(MAX_REPETITIONS) {
    return Err(GenerationError::TooManyRepetitions(expanded));
  }
  Ok(())
}

fn targets_vo2(extracted: &ExtractedParameters) -> bool {
  extracted.intensities.zones.contains(&ZoneTag::Vo2max)
    || extracted
      .intensities
      .primary
      .is_some_and(|p| p > 105.0 && p <= 120.0)
}

fn warmup_progression(extracted: &ExtractedParameters) -> Vec<WorkoutSegment> {
  let mut segments = match extracted.durations.warmup {
    Some(stated) => vec![ramp("Warm-up", stated, 50.0, 75.0, SegmentType::Warmup)],
    None => vec![
      flat("Warm-up", 5 * 60, 50.0, SegmentType::Warmup),
      ramp("Warm-up progression", 10 * 60, 60.0, 80.0, SegmentType::Ramp),
    ],
  };

  if targets_vo2(extracted) {
    segments.push(flat("Specific preparation", 3 * 60, 90.0, SegmentType::Work));
  }
  segments
}

fn cooldown(stated: Option<u32>) -> WorkoutSegment {
  ramp("Cooldown", stated.unwrap_or(10 * 60), 70.0, 50.0, SegmentType::Cooldown)
}

/// Stated percentage, else the strongest named zone, else the default
pub fn target_intensity(extracted: &ExtractedParameters) -> f64 {
  let intensities = &extracted.intensities;
  intensities
    .primary
    .or_else(|| intensities.strongest_zone().map(|z| z.midpoint()))
    .unwrap_or(DEFAULT_TARGET_INTENSITY)
}

fn watts(pct: f64, reference_power: u32) -> u32 {
  (pct / 100.0 * reference_power as f64).round() as u32
}

fn assemble(
  segments: Vec<WorkoutSegment>,
  extracted: &ExtractedParameters,
  description: String,
) -> Result<ParametricWorkout, GenerationError> {
  if let Some(empty) = segments.iter().find(|s| s.duration_seconds == 0) {
    return Err(GenerationError::NonPositiveDuration(empty.name.clone()));
  }

  let total: u64 = segments.iter().map(|s| u64::from(s.duration_seconds)).sum();
  if total > u64::from(MAX_WORKOUT_SECONDS) {
    return Err(GenerationError::TooLong(total));
  }
  let total_duration_seconds = total as u32;
  let training_load = analysis::total_training_load(&segments);
  let complex = extracted.complexity_flagged();
  let difficulty = analysis::difficulty(&segments, training_load, complex);

  let mut zones = extracted.intensities.zones.clone();
  zones.extend(
    segments
      .iter()
      .filter(|s| s.segment_type == SegmentType::Work)
      .filter_map(|s| analysis::zone_containing(s.peak_intensity())),
  );
  let workout_type = analysis::workout_type(&zones, extracted.structure, complex);

  let mut target_systems: BTreeSet<TargetSystem> = extracted.cues.systems.clone();
  if target_systems.is_empty() {
    target_systems.insert(TargetSystem::Aerobic);
  }

  let name = format!(
    "{} {} - {}min (TSS: {})",
    workout_type,
    analysis::load_label(training_load),
    (total_duration_seconds as f64 / 60.0).round(),
    training_load
  );

  tracing::info!(
    segments = segments.len(),
    total_seconds = total_duration_seconds,
    training_load,
    difficulty,
    "workout generated"
  );

  Ok(ParametricWorkout {
    name,
    description,
    workout_type: workout_type.to_string(),
    segments,
    total_duration_seconds,
    difficulty,
    training_load,
    target_systems,
    periodization_phase: extracted.cues.phase,
  })
}

/// ---------------------------------------------------------------------------
/// Corpus gap filling
/// ---------------------------------------------------------------------------

/// Missing intensity and work duration borrowed from a reference workout.
/// Stated values are never overwritten.
pub fn fill_gaps(extracted: &ExtractedParameters, entry: &CorpusEntry) -> ExtractedParameters {
  let mut filled = extracted.clone();

  if !filled.intensities.has_target() {
    if let Some(zone) = extractor::zone_in(&entry.zone.to_lowercase()) {
      filled.intensities.zones.insert(zone);
      filled.cues.systems.insert(zone.system());
    }
  }

  if !filled.durations.has_main_duration() {
    let reps = filled.repetitions.primary.unwrap_or(1).max(1);
    let minutes = (entry.duration_minutes / reps).max(1);
    filled.durations.work.push(minutes.saturating_mul(60));
    filled.durations.precision = filled.durations.precision.max(DurationPrecision::Minute);
  }

  filled
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::calculator::calculate;
  use crate::extractor::extract;
  use crate::models::StructuralCompleteness;
  use crate::normalizer::correct;

  fn build(text: &str) -> Result<ParametricWorkout, GenerationError> {
    let corrected = correct(text).text;
    let extracted = extract(&corrected);
    let calculated = calculate(&corrected, &extracted);
    ParametricGenerator::new().generate(&extracted, &calculated, 250)
  }

  fn minutes(workout: &ParametricWorkout, segment_type: SegmentType) -> Vec<u32> {
    workout
      .segments
      .iter()
      .filter(|s| s.segment_type == segment_type)
      .map(|s| s.duration_seconds / 60)
      .collect()
  }

  #[test]
  fn test_continuous_tempo() {
    let workout = build("5 minutes tempo").unwrap();
    assert_eq!(workout.segments.len(), 1);
    let seg = &workout.segments[0];
    // Continuous work never drops under 20 minutes
    assert_eq!(seg.duration_seconds, 1200);
    assert_eq!(seg.intensity_start, 82.0);
    assert_eq!(seg.zone, "Zone 3 (Tempo)");
    assert_eq!(seg.cadence, Some(90));
    assert_eq!(workout.total_duration_seconds, 1200);

    let long = build("45 minutes tempo").unwrap();
    assert_eq!(long.segments[0].duration_seconds, 2700);
  }

  #[test]
  fn test_simple_intervals_default_recovery() {
    let workout = build("3x5min à 95%").unwrap();
    assert_eq!(minutes(&workout, SegmentType::Work), vec![5, 5, 5]);
    // 5 x 0.5 truncates to two minutes
    assert_eq!(minutes(&workout, SegmentType::Recovery), vec![2, 2]);
    assert_eq!(
      workout.segments.last().map(|s| s.segment_type),
      Some(SegmentType::Work)
    );
    assert!(workout.work_segments().all(|s| s.intensity_start == 95.0));
  }

  #[test]
  fn test_stated_recovery_wins() {
    let workout = build("4x4min à 100% avec 90sec repos").unwrap();
    let rests: Vec<u32> = workout
      .segments
      .iter()
      .filter(|s| s.segment_type == SegmentType::Recovery)
      .map(|s| s.duration_seconds)
      .collect();
    assert_eq!(rests, vec![90, 90, 90]);
  }

  #[test]
  fn test_pyramid_recovery_rule() {
    let workout = build("pyramide 1-2-3-4-3-2-1 minutes à 100%").unwrap();
    assert_eq!(minutes(&workout, SegmentType::Work), vec![1, 2, 3, 4, 3, 2, 1]);
    assert_eq!(minutes(&workout, SegmentType::Recovery), vec![2, 2, 2, 2, 2, 2]);
    assert_eq!(pyramid_recovery_seconds(8 * 60), 4 * 60);
  }

  #[test]
  fn test_nested_expansion() {
    let workout = build("2x3x1min à 120%").unwrap();
    assert_eq!(workout.work_segments().count(), 6);
    assert_eq!(minutes(&workout, SegmentType::Recovery).len(), 5);
  }

  #[test]
  fn test_fibonacci_blocks() {
    let workout = build("progression fibonacci à 95%").unwrap();
    assert_eq!(minutes(&workout, SegmentType::Work), vec![1, 1, 2, 3, 5, 8]);
  }

  #[test]
  fn test_alternation_in_seconds() {
    let workout = build("alternance 47s entre 103% et 91%ftp pendant 23min").unwrap();
    assert_eq!(workout.work_segments().count(), 28);
    assert!(workout.segments.iter().all(|s| s.duration_seconds == 47));
    assert_eq!(workout.segments[0].intensity_start, 103.0);
    assert_eq!(workout.segments[1].intensity_start, 91.0);
    assert_eq!(minutes(&workout, SegmentType::Recovery).len(), 0);
  }

  #[test]
  fn test_spiral_descends() {
    let workout = build("spirale 1min@80%, 2min@85%, 3min@90% puis redescendre").unwrap();
    let pcts: Vec<f64> = workout.segments.iter().map(|s| s.intensity_start).collect();
    assert_eq!(pcts, vec![80.0, 85.0, 90.0, 85.0, 80.0]);
  }

  #[test]
  fn test_over_under_halves() {
    let workout = build("5 fois 3min over under à 95% et 105% avec 2min repos").unwrap();
    assert_eq!(workout.work_segments().count(), 10);
    assert_eq!(workout.segments[0].duration_seconds, 90);
    assert_eq!(workout.segments[0].intensity_start, 95.0);
    assert_eq!(workout.segments[1].intensity_start, 105.0);
    assert_eq!(workout.segments[2].segment_type, SegmentType::Recovery);
  }

  #[test]
  fn test_warmup_and_cooldown_progressions() {
    let workout =
      build("echauffement puis 5x3min vo2max avec 3min repos puis retour au calme").unwrap();
    let first = &workout.segments[0];
    assert_eq!(first.segment_type, SegmentType::Warmup);
    assert_eq!(first.duration_seconds, 300);
    assert_eq!(workout.segments[1].segment_type, SegmentType::Ramp);
    assert_eq!(workout.segments[1].intensity_end, 80.0);
    assert_eq!(workout.segments[2].name, "Specific preparation");

    let last = workout.segments.last().unwrap();
    assert_eq!(last.segment_type, SegmentType::Cooldown);
    assert_eq!(last.intensity_start, 70.0);
    assert_eq!(last.intensity_end, 50.0);
    assert_eq!(last.duration_seconds, 600);
  }

  #[test]
  fn test_training_load_additive() {
    for text in [
      "5 minutes tempo",
      "3x5min à 95%",
      "13x4min33s à 87.3%ftp avec 2min47s recuperation",
      "echauffement puis pyramide 1-2-3-2-1 min à 105% puis retour au calme",
    ] {
      let workout = build(text).unwrap();
      let independent: f64 = workout
        .segments
        .iter()
        .map(|s| {
          let f = (s.intensity_start + s.intensity_end) / 2.0 / 100.0;
          s.duration_seconds as f64 / 3600.0 * f * f * 100.0
        })
        .sum();
      assert!(
        (workout.training_load - (independent * 10.0).round() / 10.0).abs() < 1e-9,
        "{}",
        text
      );
    }
  }

  #[test]
  fn test_precise_seconds_kept() {
    let workout = build("13x4min33s à 87.3%ftp avec 2min47s recuperation").unwrap();
    assert_eq!(workout.work_segments().count(), 13);
    assert!(workout.work_segments().all(|s| s.duration_seconds == 273));
    assert_eq!(workout.segments[1].duration_seconds, 167);
  }

  #[test]
  fn test_name_format() {
    let workout = build("3x5min à 95%").unwrap();
    assert!(workout.name.starts_with("Threshold Training Easy - 19min (TSS: "));
  }

  #[test]
  fn test_recovery_floor_of_one_minute() {
    let workout = build("6x1min à 120%").unwrap();
    assert_eq!(minutes(&workout, SegmentType::Recovery), vec![1; 5]);
  }

  #[test]
  fn test_specific_preparation_for_any_vo2_target() {
    let workout =
      build("echauffement puis 5x3min vo2max à 88% avec 3min repos").unwrap();
    assert_eq!(workout.segments[2].name, "Specific preparation");
    assert_eq!(workout.segments[2].intensity_start, 90.0);

    let workout = build("echauffement puis 5x3min à 88% avec 3min repos").unwrap();
    assert!(workout.segments.iter().all(|s| s.name != "Specific preparation"));
  }

  #[test]
  fn test_repetitions_bounded() {
    assert_eq!(
      build("1000000000x1min à 90%"),
      Err(GenerationError::TooManyRepetitions(1_000_000_000))
    );
    assert!(build("200x1min à 90% avec 1min repos").is_ok());
  }

  #[test]
  fn test_total_duration_bounded() {
    assert!(matches!(build("3x40000000min à 90%"), Err(GenerationError::TooLong(_))));
    assert!(matches!(build("2000 min à 90%"), Err(GenerationError::TooLong(_))));
    assert!(build("6 heures à 130%").is_ok());
  }

  #[test]
  fn test_empty_main_block() {
    let extracted = extract("3 fois à 95%");
    let result = ParametricGenerator::new().generate(&extracted, &CalculatedValues::default(), 250);
    assert_eq!(
      result,
      Err(GenerationError::EmptyMainBlock(StructureType::SimpleIntervals))
    );
  }

  #[test]
  fn test_from_steps() {
    let steps = vec![
      BlockStep::new(StepKind::Warmup, 600, 60.0, "Warm-up"),
      BlockStep::new(StepKind::Work, 300, 110.0, "Work 1"),
      BlockStep::new(StepKind::Recovery, 0, 45.0, "Recovery 1"),
    ];
    let result = ParametricGenerator::new().from_steps(&steps, &ExtractedParameters::default(), 250);
    assert_eq!(
      result,
      Err(GenerationError::NonPositiveDuration("Recovery 1".to_string()))
    );

    let steps = vec![BlockStep::new(StepKind::Work, 300, 110.0, "Work 1")];
    let workout = ParametricGenerator::new()
      .from_steps(&steps, &ExtractedParameters::default(), 250)
      .unwrap();
    assert_eq!(workout.total_duration_seconds, 300);
  }

  #[test]
  fn test_minimal_workout() {
    let workout = ParametricGenerator::new()
      .minimal(&extract("faire du sport"), 250)
      .unwrap();
    assert_eq!(workout.segments.len(), 1);
    assert_eq!(workout.segments[0].duration_seconds, 1800);
    assert_eq!(workout.segments[0].intensity_start, DEFAULT_TARGET_INTENSITY);

    // Out-of-range estimates fall back to the default block
    let workout = ParametricGenerator::new()
      .minimal(&extract("3x40000000min à 90%"), 250)
      .unwrap();
    assert_eq!(workout.segments.len(), 1);
    assert_eq!(workout.segments[0].duration_seconds, 1800);
    assert_eq!(workout.segments[0].intensity_start, 90.0);
  }

  #[test]
  fn test_fill_gaps_from_entry() {
    let entry = CorpusEntry {
      text: "8 fois 1min max avec 1min repos".to_string(),
      name: "Short VO2".to_string(),
      description: String::new(),
      duration_minutes: 16,
      difficulty: 4,
      zone: "Zone 5".to_string(),
      completeness: StructuralCompleteness::Simple,
    };

    let filled = fill_gaps(&extract("8 fois avec repos"), &entry);
    assert!(filled.intensities.zones.contains(&ZoneTag::Vo2max));
    assert_eq!(filled.durations.work, vec![120]);

    // Stated values stay
    let filled = fill_gaps(&extract("8 fois 30s à 130%"), &entry);
    assert_eq!(filled.durations.work, vec![30]);
    assert!(filled.intensities.zones.is_empty());
  }
}
