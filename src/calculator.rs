//! Forward derivation of values a query implies without stating
//!
//! Every derived quantity is recorded under a dotted name together with the
//! inputs used to compute it. Nothing here touches `ExtractedParameters`.

use crate::extractor;
use crate::models::{ExtractedParameters, StructureType};
use serde::Serialize;
use std::collections::BTreeMap;

pub const FIBONACCI_MINUTES: [u32; 6] = [1, 1, 2, 3, 5, 8];

/// ---------------------------------------------------------------------------
/// Derived values
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DerivedValue {
  Number(f64),
  Sequence(Vec<u32>),
  Tag(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Derivation {
  pub value: DerivedValue,
  pub inputs: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlternationPlan {
  pub interval_seconds: u32,
  pub total_seconds: u32,
  pub repetitions: u32,
  pub intensity_high: f64,
  pub intensity_low: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibonacciPlan {
  pub minutes: Vec<u32>,
  pub total_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalculatedValues {
  pub derived: BTreeMap<String, Derivation>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub alternation: Option<AlternationPlan>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fibonacci: Option<FibonacciPlan>,
}

impl CalculatedValues {
  pub fn get(&self, name: &str) -> Option<&DerivedValue> {
    self.derived.get(name).map(|d| &d.value)
  }

  fn record(&mut self, name: &str, value: DerivedValue, inputs: &[(&str, f64)]) {
    self.derived.insert(
      name.to_string(),
      Derivation {
        value,
        inputs: inputs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
      },
    );
  }
}

/// ---------------------------------------------------------------------------
/// Calculation
/// ---------------------------------------------------------------------------

pub fn calculate(text: &str, extracted: &ExtractedParameters) -> CalculatedValues {
  let mut values = CalculatedValues::default();

  match extracted.structure {
    StructureType::Alternation => {
      if let Some(plan) = alternation_plan(text, extracted) {
        record_alternation(&mut values, &plan);
        values.alternation = Some(plan);
      }
    }
    StructureType::Fibonacci => {
      let plan = fibonacci_plan();
      values.record(
        "fibonacci.sequence",
        DerivedValue::Sequence(plan.minutes.clone()),
        &[],
      );
      values.record(
        "fibonacci.total_seconds",
        DerivedValue::Number(plan.total_seconds as f64),
        &[("sequence_minutes", plan.minutes.iter().sum::<u32>() as f64)],
      );
      values.record(
        "fibonacci.progression",
        DerivedValue::Tag("ascending".to_string()),
        &[],
      );
      values.fibonacci = Some(plan);
    }
    _ => {}
  }

  if !values.derived.is_empty() {
    tracing::debug!(derived = ?values.derived.keys().collect::<Vec<_>>(), "values calculated");
  }

  values
}

/// An alternation cycle consumes two intervals
pub fn alternation_repetitions(total_seconds: u32, interval_seconds: u32) -> u32 {
  if interval_seconds == 0 {
    return 0;
  }
  total_seconds / interval_seconds.saturating_mul(2)
}

/// The explicit phrase wins; otherwise fall back on the extracted work
/// interval, total window and the two stated intensities
fn alternation_plan(text: &str, extracted: &ExtractedParameters) -> Option<AlternationPlan> {
  let (interval_seconds, total_seconds, high, low) = match extractor::alternation_phrase(text) {
    Some(p) => (p.interval_seconds, p.window_seconds, p.high, p.low),
    None => {
      let interval = *extracted.durations.work.first()?;
      let total = extracted.durations.total?;
      let intensities = &extracted.intensities;
      let (low, high) = match (intensities.primary, intensities.secondary) {
        (Some(a), Some(b)) => (a.min(b), a.max(b)),
        _ => intensities.range?,
      };
      (interval, total, high, low)
    }
  };

  Some(AlternationPlan {
    interval_seconds,
    total_seconds,
    repetitions: alternation_repetitions(total_seconds, interval_seconds),
    intensity_high: high,
    intensity_low: low,
  })
}

fn record_alternation(values: &mut CalculatedValues, plan: &AlternationPlan) {
  let interval = plan.interval_seconds as f64;
  let total = plan.total_seconds as f64;

  values.record(
    "alternation.interval_seconds",
    DerivedValue::Number(interval),
    &[],
  );
  values.record("alternation.total_seconds", DerivedValue::Number(total), &[]);
  values.record(
    "alternation.calculated_repetitions",
    DerivedValue::Number(plan.repetitions as f64),
    &[("interval_seconds", interval), ("total_seconds", total)],
  );
  values.record(
    "alternation.intensity_high",
    DerivedValue::Number(plan.intensity_high),
    &[],
  );
  values.record(
    "alternation.intensity_low",
    DerivedValue::Number(plan.intensity_low),
    &[],
  );
}

fn fibonacci_plan() -> FibonacciPlan {
  let minutes = FIBONACCI_MINUTES.to_vec();
  let total_seconds = minutes.iter().sum::<u32>() * 60;
  FibonacciPlan {
    minutes,
    total_seconds,
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
