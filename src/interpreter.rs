//! Block interpretation for queries that need more than direct extraction
//!
//! Strategies run in a fixed order and the first that yields steps wins:
//! remote enrichment (bounded by a timeout), hierarchical templates,
//! `BLOC n:` decomposition, compositional rules, then a deterministic
//! reject carrying the missing-information diagnostic.

use crate::extractor::{self, LabelledDuration};
use crate::generator::MAX_REPETITIONS;
use crate::llm::{self, Enricher, EnrichmentError};
use crate::models::{DurationRole, ExtractedParameters, ZoneTag};
use crate::normalizer;
use crate::scorer;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

const WARMUP_INTENSITY: f64 = 60.0;
const COOLDOWN_INTENSITY: f64 = 50.0;
const STEP_RECOVERY_INTENSITY: f64 = 45.0;
const INTER_BLOCK_RECOVERY_SECONDS: u32 = 5 * 60;
const DEFAULT_INTERVAL_RECOVERY_SECONDS: u32 = 2 * 60;
const DEFAULT_PHASE_SECONDS: u32 = 10 * 60;
const DEFAULT_BLOCK_SECONDS: u32 = 5 * 60;

/// ---------------------------------------------------------------------------
/// Steps
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
  Warmup,
  Work,
  Recovery,
  Cooldown,
}

impl StepKind {
  fn from_label(label: &str) -> Self {
    let label = label.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| label.contains(w));

    if has(&["warm", "echauffement", "chauffe"]) {
      StepKind::Warmup
    } else if has(&["cool", "retour", "calme"]) {
      StepKind::Cooldown
    } else if has(&["recup", "repos", "recovery", "rest"]) {
      StepKind::Recovery
    } else {
      StepKind::Work
    }
  }

  fn default_intensity(&self) -> f64 {
    match self {
      StepKind::Warmup => WARMUP_INTENSITY,
      StepKind::Cooldown => COOLDOWN_INTENSITY,
      StepKind::Recovery => STEP_RECOVERY_INTENSITY,
      StepKind::Work => ZoneTag::Endurance.prescription(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockStep {
  pub kind: StepKind,
  pub seconds: u32,
  /// Percent of reference power
  pub intensity: f64,
  pub label: String,
}

impl BlockStep {
  pub fn new(kind: StepKind, seconds: u32, intensity: f64, label: impl Into<String>) -> Self {
    Self {
      kind,
      seconds,
      intensity,
      label: label.into(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpretationSource {
  Enricher,
  HierarchicalTemplate,
  BlockDecomposition,
  Compositional,
}

impl InterpretationSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      InterpretationSource::Enricher => "enricher",
      InterpretationSource::HierarchicalTemplate => "hierarchical_template",
      InterpretationSource::BlockDecomposition => "block_decomposition",
      InterpretationSource::Compositional => "compositional",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Interpretation {
  Steps {
    source: InterpretationSource,
    steps: Vec<BlockStep>,
  },
  Rejected {
    diagnostic: String,
  },
}

/// Outcome of one interpretation, with the enrichment failure (if any) that
/// the local strategies recovered from
#[derive(Debug)]
pub struct Interpreted {
  pub interpretation: Interpretation,
  pub recovered: Option<EnrichmentError>,
}

/// ---------------------------------------------------------------------------
/// Patterns
/// ---------------------------------------------------------------------------

/// `2 blocs de 3 repetitions de (2 min vo2max, 1 min repos)`
static BLOCK_TEMPLATE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(
    r"(\d+)\s*blocs?\s*(?:de\s*)?(\d+)\s*(?:repetitions?|fois|series|x|×)\s*(?:de\s*)?\(([^)]*)\)",
  )
  .ok()
});

/// `3 x 5 min`, `4 series de 8 minutes`
static INTERVAL_TEMPLATE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(r"(\d+)\s*(?:x|×|fois|series|repetitions)\s*(?:de\s*)?(\d+)\s*(?:minutes?|min|mn)\b")
    .ok()
});

static BLOC_LINE_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(?i)bloc\s*(\d+)\s*:\s*([^-\n]+)-\s*([^\n]+)").ok());

static REPEAT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(r"(\d+)\s*(?:repetitions?|fois|series|x|×)\s*(?:de\s*)?\(?([^)\n]*)\)?").ok()
});

/// ---------------------------------------------------------------------------
/// Model answer
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ModelWorkout {
  workout_steps: Vec<ModelStep>,
}

#[derive(Debug, Deserialize)]
struct ModelStep {
  #[serde(default)]
  duration_seconds: Option<u32>,
  /// Minutes, as some models answer
  #[serde(default)]
  duration: Option<f64>,
  #[serde(rename = "type", default)]
  kind: String,
  power_percent: f64,
  #[serde(default)]
  description: Option<String>,
}

fn steps_from_json(answer: &str) -> Result<Vec<BlockStep>, EnrichmentError> {
  let json = llm::extract_json(answer)?;
  let workout: ModelWorkout =
    serde_json::from_str(&json).map_err(|e| EnrichmentError::Parse(format!("{}: {}", e, json)))?;

  let steps: Vec<BlockStep> = workout
    .workout_steps
    .into_iter()
    .map(|s| {
      let seconds = s
        .duration_seconds
        .or_else(|| s.duration.map(|m| (m * 60.0).round() as u32))
        .unwrap_or(0);
      let label = s.description.unwrap_or_else(|| s.kind.clone());
      BlockStep::new(StepKind::from_label(&s.kind), seconds, s.power_percent, label)
    })
    .collect();

  if steps.is_empty() || steps.iter().any(|s| s.seconds == 0 || s.intensity <= 0.0) {
    return Err(EnrichmentError::Parse("Model returned unusable steps".to_string()));
  }
  Ok(steps)
}

/// ---------------------------------------------------------------------------
/// Block Interpreter
/// ---------------------------------------------------------------------------

pub struct BlockInterpreter<'a> {
  enricher: &'a dyn Enricher,
  timeout: Duration,
}

impl<'a> BlockInterpreter<'a> {
  pub fn new(enricher: &'a dyn Enricher, timeout: Duration) -> Self {
    Self { enricher, timeout }
  }

  /// `text` is the normalized query
  pub async fn interpret(&self, text: &str) -> Interpreted {
    match self.enrich(text).await {
      Ok(steps) => Interpreted {
        interpretation: Interpretation::Steps {
          source: InterpretationSource::Enricher,
          steps,
        },
        recovered: None,
      },
      Err(e) => Interpreted {
        interpretation: interpret_locally(text),
        recovered: Some(e),
      },
    }
  }

  async fn enrich(&self, text: &str) -> Result<Vec<BlockStep>, EnrichmentError> {
    let answer = tokio::time::timeout(self.timeout, self.enricher.enrich(text))
      .await
      .map_err(|_| EnrichmentError::Timeout(self.timeout.as_secs()))??;

    steps_from_json(&answer).or_else(|json_error| {
      tracing::debug!(error = %json_error, "model answer is not JSON, reading BLOC lines");
      decompose_blocks(&normalizer::correct(&answer).text).ok_or(json_error)
    })
  }
}

type Strategy = fn(&str, &ExtractedParameters) -> Option<Vec<BlockStep>>;

/// Local strategies only, in order, ending in a reject
pub fn interpret_locally(text: &str) -> Interpretation {
  let extracted = extractor::extract(text);

  let strategies: [(InterpretationSource, Strategy); 3] = [
    (InterpretationSource::HierarchicalTemplate, hierarchical_template),
    (InterpretationSource::BlockDecomposition, block_lines),
    (InterpretationSource::Compositional, compositional),
  ];

  for (source, strategy) in strategies {
    if let Some(steps) = strategy(text, &extracted).filter(|s| !s.is_empty()) {
      tracing::info!(source = source.as_str(), steps = steps.len(), "query interpreted");
      return Interpretation::Steps { source, steps };
    }
  }

  let missing = scorer::score(&extracted).missing;
  tracing::info!(missing = missing.len(), "no interpretation, rejecting");
  Interpretation::Rejected {
    diagnostic: scorer::diagnostic(&missing),
  }
}

/// ---------------------------------------------------------------------------
/// Shared helpers
/// ---------------------------------------------------------------------------

fn stated(durations: &[LabelledDuration], role: DurationRole) -> Option<&LabelledDuration> {
  durations.iter().find(|d| d.role == role)
}

/// Intensity for a work duration: its own percentage, its own zone word,
/// then whatever the whole query states
fn work_intensity(found: &LabelledDuration, extracted: &ExtractedParameters) -> Option<f64> {
  found
    .percent
    .or_else(|| found.zone.map(|z| z.prescription()))
    .or(extracted.intensities.primary)
    .or_else(|| extracted.intensities.strongest_zone().map(|z| z.prescription()))
}

fn has_warmup_cue(text: &str) -> bool {
  extractor::contains_phrase(text, "echauffement")
}

fn has_cooldown_cue(text: &str) -> bool {
  extractor::contains_phrase(text, "retour") || extractor::contains_phrase(text, "calme")
}

fn warmup_step(found: &[LabelledDuration], text: &str) -> Option<BlockStep> {
  let seconds = match stated(found, DurationRole::Warmup) {
    Some(d) => d.seconds,
    None if has_warmup_cue(text) => DEFAULT_PHASE_SECONDS,
    None => return None,
  };
  Some(BlockStep::new(StepKind::Warmup, seconds, WARMUP_INTENSITY, "Warm-up"))
}

fn cooldown_step(found: &[LabelledDuration], text: &str) -> Option<BlockStep> {
  let seconds = match stated(found, DurationRole::Cooldown) {
    Some(d) => d.seconds,
    None if has_cooldown_cue(text) => DEFAULT_PHASE_SECONDS,
    None => return None,
  };
  Some(BlockStep::new(StepKind::Cooldown, seconds, COOLDOWN_INTENSITY, "Cooldown"))
}

/// One repetition's components: work at its intensity, recovery at the
/// step recovery level
fn components(inner: &str, extracted: &ExtractedParameters) -> Option<Vec<BlockStep>> {
  let found = extractor::scan_durations(inner);
  let zone_fallback = extractor::zone_in(inner).map(|z| z.prescription());

  let steps: Vec<BlockStep> = found
    .iter()
    .map(|d| match d.role {
      DurationRole::Recovery => Some(BlockStep::new(
        StepKind::Recovery,
        d.seconds,
        d.percent.unwrap_or(STEP_RECOVERY_INTENSITY),
        "Recovery",
      )),
      _ => {
        let pct = d
          .percent
          .or_else(|| d.zone.map(|z| z.prescription()))
          .or(zone_fallback)
          .or_else(|| work_intensity(d, extracted))?;
        Some(BlockStep::new(StepKind::Work, d.seconds, pct, "Work"))
      }
    })
    .collect::<Option<Vec<_>>>()?;

  steps.iter().any(|s| s.kind == StepKind::Work).then_some(steps)
}

/// Repetition count within the expansion limit
fn bounded(count: u64) -> Option<u32> {
  if count > u64::from(MAX_REPETITIONS) {
    tracing::debug!(count, "repetition count over the limit");
    return None;
  }
  u32::try_from(count).ok()
}

/// `reps` copies of `unit`, dropping a trailing recovery after the last one
fn repeat(unit: &[BlockStep], reps: u32, block: Option<u32>) -> Vec<BlockStep> {
  let last = unit.len().saturating_sub(1);
  let mut steps = Vec::new();
  for rep in 1..=reps {
    for (i, step) in unit.iter().enumerate() {
      if rep == reps && i == last && step.kind == StepKind::Recovery {
        continue;
      }
      let mut step = step.clone();
      step.label = match block {
        Some(b) => format!("Block {} - {} {}/{}", b, step.label, rep, reps),
        None => format!("{} {}/{}", step.label, rep, reps),
      };
      steps.push(step);
    }
  }
  steps
}

/// ---------------------------------------------------------------------------
/// Strategies
/// ---------------------------------------------------------------------------

fn hierarchical_template(text: &str, extracted: &ExtractedParameters) -> Option<Vec<BlockStep>> {
  let found = extractor::scan_durations(text);

  let main = if let Some(caps) = BLOCK_TEMPLATE_RE.as_ref().and_then(|re| re.captures(text)) {
    nested_blocks(&caps, extracted)?
  } else {
    let caps = INTERVAL_TEMPLATE_RE.as_ref()?.captures(text)?;
    interval_template(&caps, &found, extracted)?
  };

  let mut steps = Vec::new();
  steps.extend(warmup_step(&found, text));
  steps.extend(main);
  steps.extend(cooldown_step(&found, text));
  Some(steps)
}

fn nested_blocks(caps: &Captures, extracted: &ExtractedParameters) -> Option<Vec<BlockStep>> {
  let blocks: u32 = caps[1].parse().ok()?;
  let reps: u32 = caps[2].parse().ok()?;
  bounded(u64::from(blocks) * u64::from(reps))?;
  let unit = components(&caps[3], extracted)?;

  let mut steps = Vec::new();
  for block in 1..=blocks {
    steps.extend(repeat(&unit, reps, Some(block)));
    if block < blocks {
      steps.push(BlockStep::new(
        StepKind::Recovery,
        INTER_BLOCK_RECOVERY_SECONDS,
        COOLDOWN_INTENSITY,
        format!("Recovery between blocks {}/{}", block, blocks),
      ));
    }
  }
  Some(steps)
}

fn interval_template(
  caps: &Captures,
  found: &[LabelledDuration],
  extracted: &ExtractedParameters,
) -> Option<Vec<BlockStep>> {
  let reps = bounded(caps[1].parse().ok()?)?;
  let minutes: u32 = caps[2].parse().ok()?;
  let intensity = extracted
    .intensities
    .primary
    .or_else(|| extracted.intensities.strongest_zone().map(|z| z.prescription()))?;

  let rest = stated(found, DurationRole::Recovery).map_or(DEFAULT_INTERVAL_RECOVERY_SECONDS, |d| d.seconds);

  let unit = [
    BlockStep::new(StepKind::Work, minutes.checked_mul(60)?, intensity, "Interval"),
    BlockStep::new(StepKind::Recovery, rest, STEP_RECOVERY_INTENSITY, "Recovery"),
  ];
  Some(repeat(&unit, reps, None))
}

/// `BLOC n: type - description` lines, in text order
pub(crate) fn decompose_blocks(text: &str) -> Option<Vec<BlockStep>> {
  let re = BLOC_LINE_RE.as_ref()?;
  let empty = ExtractedParameters::default();
  let mut steps = Vec::new();

  for caps in re.captures_iter(text) {
    let block_type = caps[2].trim().to_lowercase();
    let description = caps[3].trim().to_lowercase();
    let kind = StepKind::from_label(&block_type);

    let repeated = REPEAT_RE
      .as_ref()
      .and_then(|r| r.captures(&description))
      .and_then(|c| {
        let reps = bounded(c[1].parse().ok()?)?;
        let unit = components(&c[2], &empty)?;
        Some(repeat(&unit, reps, None))
      });

    if let Some(expanded) = repeated.filter(|_| kind == StepKind::Work) {
      steps.extend(expanded);
      continue;
    }

    let seconds = extractor::scan_durations(&description)
      .first()
      .map(|d| d.seconds)
      .unwrap_or(match kind {
        StepKind::Warmup | StepKind::Cooldown => DEFAULT_PHASE_SECONDS,
        _ => DEFAULT_BLOCK_SECONDS,
      });

    let intensity = extract_percent(&description)
      .or_else(|| {
        extractor::zone_in(&format!("{} {}", block_type, description))
          .filter(|_| kind == StepKind::Work)
          .map(|z| z.prescription())
      })
      .unwrap_or(kind.default_intensity());

    steps.push(BlockStep::new(kind, seconds, intensity, block_type));
  }

  (!steps.is_empty()).then_some(steps)
}

fn block_lines(text: &str, _extracted: &ExtractedParameters) -> Option<Vec<BlockStep>> {
  decompose_blocks(text)
}

fn extract_percent(text: &str) -> Option<f64> {
  extractor::extract(text).intensities.primary
}

/// Role-labelled durations in text order. Every work duration needs an
/// intensity from somewhere in the query.
fn compositional(text: &str, extracted: &ExtractedParameters) -> Option<Vec<BlockStep>> {
  let found = extractor::scan_durations(text);

  let mut steps = Vec::new();
  for d in &found {
    let step = match d.role {
      DurationRole::Warmup => BlockStep::new(
        StepKind::Warmup,
        d.seconds,
        d.percent.unwrap_or(WARMUP_INTENSITY),
        "Warm-up",
      ),
      DurationRole::Cooldown => BlockStep::new(
        StepKind::Cooldown,
        d.seconds,
        d.percent.unwrap_or(COOLDOWN_INTENSITY),
        "Cooldown",
      ),
      DurationRole::Recovery => BlockStep::new(
        StepKind::Recovery,
        d.seconds,
        d.percent.unwrap_or(STEP_RECOVERY_INTENSITY),
        "Recovery",
      ),
      DurationRole::Work | DurationRole::Total => {
        BlockStep::new(StepKind::Work, d.seconds, work_intensity(d, extracted)?, "Work")
      }
    };
    steps.push(step);
  }

  steps.iter().any(|s| s.kind == StepKind::Work).then_some(steps)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
