//! End-to-end request processing
//!
//! correct → extract → calculate → score → route → generate → render.
//! Every request is independent; the corpus is built once and shared
//! read-only. Only `GenerationFailure` ever reaches the caller as a failed
//! result; the other error classes are recovered here.

use crate::calculator::{self, CalculatedValues};
use crate::config::{CoachConfig, CorpusStrategy};
use crate::corpus::{CorpusError, CorpusMatch, CorpusMatcher, HashingEmbedder};
use crate::extractor;
use crate::generator::{self, GenerationError, ParametricGenerator};
use crate::interpreter::{BlockInterpreter, Interpretation};
use crate::llm::{self, Enricher, EnrichmentError};
use crate::models::{Correction, ExtractedParameters, Mode, ParametricWorkout, RawQuery};
use crate::normalizer;
use crate::router::{self, Decision, ReportedConfidence, Route, RouterThresholds};
use crate::scorer::{self, MissingItem};
use crate::zwo;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error while generating the workout";
const CORPUS_CANDIDATES: usize = 3;
const ENRICHED_CONFIDENCE_CAP: f64 = 0.85;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("Missing information: {0:?}")]
  ParseIncomplete(Vec<MissingItem>),

  #[error("Enrichment unavailable: {0}")]
  EnrichmentUnavailable(#[from] EnrichmentError),

  #[error("No reference workout matches the query")]
  NoCorpusMatch,

  #[error("Generation failed: {0}")]
  GenerationFailure(#[from] GenerationError),
}

impl Serialize for PipelineError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Result record
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
  Generated,
  CorpusEnriched,
  CoachExpert,
  CoachMinimal,
  MissingInformation,
  InternalError,
}

impl ResultStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResultStatus::Generated => "generated",
      ResultStatus::CorpusEnriched => "corpus_enriched",
      ResultStatus::CoachExpert => "coach_expert",
      ResultStatus::CoachMinimal => "coach_minimal",
      ResultStatus::MissingInformation => "missing_information",
      ResultStatus::InternalError => "internal_error",
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
  pub success: bool,
  pub confidence: f64,
  pub message: String,
  pub status: ResultStatus,
  pub route: Route,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub workout: Option<ParametricWorkout>,
  /// Rendered interval file, present whenever `workout` is
  #[serde(skip_serializing_if = "Option::is_none")]
  pub zwo: Option<String>,
  pub corrections: Vec<Correction>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub missing: Vec<MissingItem>,
  /// Generation path: parametric, corpus, or an interpreter source
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,
}

struct Generated {
  workout: ParametricWorkout,
  status: ResultStatus,
  source: &'static str,
  confidence: f64,
  message: String,
}

fn percent(score: f64) -> u32 {
  (score * 100.0).round() as u32
}

/// ---------------------------------------------------------------------------
/// Pipeline
/// ---------------------------------------------------------------------------

pub struct Pipeline {
  corpus: Arc<CorpusMatcher>,
  enricher: Box<dyn Enricher>,
  generator: ParametricGenerator,
  thresholds: RouterThresholds,
  enrichment_timeout: Duration,
  author: String,
}

impl Pipeline {
  pub fn new(config: &CoachConfig, corpus: Arc<CorpusMatcher>, enricher: Box<dyn Enricher>) -> Self {
    Self {
      corpus,
      enricher,
      generator: ParametricGenerator::new(),
      thresholds: config.thresholds,
      enrichment_timeout: config.enrichment_timeout,
      author: config.zwo_author.clone(),
    }
  }

  /// Corpus, embedding strategy and enricher as configured
  pub fn from_config(config: &CoachConfig) -> Result<Self, CorpusError> {
    let corpus = match &config.corpus_path {
      Some(path) => CorpusMatcher::from_path(path)?,
      None => CorpusMatcher::builtin()?,
    };
    let corpus = match config.corpus_strategy {
      CorpusStrategy::Lexical => corpus,
      CorpusStrategy::Embedding => corpus.with_embedder(Box::new(HashingEmbedder::default()))?,
    };

    let enricher = llm::build_enricher(
      config.ollama_base_url.as_ref(),
      &config.ollama_model,
      config.enrichment_timeout,
    );

    tracing::info!(
      corpus = corpus.strategy_name(),
      enricher = enricher.name(),
      "pipeline ready"
    );
    Ok(Self::new(config, Arc::new(corpus), enricher))
  }

  pub fn corpus(&self) -> &CorpusMatcher {
    &self.corpus
  }

  pub async fn process(&self, query: &RawQuery) -> PipelineResult {
    let corrected = normalizer::correct(&query.text);
    let text = corrected.text.as_str();
    let extracted = extractor::extract(text);
    let calculated = calculator::calculate(text, &extracted);
    let completeness = scorer::score(&extracted);
    let decision = router::decide(completeness.score, query.mode, &self.thresholds);

    let outcome = match (query.mode, decision.route) {
      (Mode::Expert, _) => self.expert(&decision, &extracted, &calculated, query.reference_power),
      (Mode::Standard, Route::AutoGenerate) => self
        .generator
        .generate(&extracted, &calculated, query.reference_power)
        .map(|workout| Generated {
          workout,
          status: ResultStatus::Generated,
          source: "parametric",
          confidence: reported(&decision, completeness.score),
          message: format!(
            "Workout generated automatically (completeness: {}%)",
            percent(completeness.score)
          ),
        })
        .map_err(PipelineError::from),
      (Mode::Standard, Route::CorpusEnrich) => {
        self
          .corpus_enrich(text, &extracted, &calculated, completeness.score, query.reference_power)
          .await
      }
      (Mode::Standard, Route::Reject) => Err(PipelineError::ParseIncomplete(completeness.missing)),
    };

    let base = PipelineResult {
      success: false,
      confidence: 0.0,
      message: String::new(),
      status: ResultStatus::InternalError,
      route: decision.route,
      workout: None,
      zwo: None,
      corrections: corrected.corrections,
      missing: Vec::new(),
      source: None,
    };

    match outcome {
      Ok(generated) => {
        let zwo = zwo::render(&generated.workout, query.reference_power, &self.author);
        tracing::info!(
          status = generated.status.as_str(),
          source = generated.source,
          confidence = generated.confidence,
          "request completed"
        );
        PipelineResult {
          success: true,
          confidence: generated.confidence,
          message: generated.message,
          status: generated.status,
          workout: Some(generated.workout),
          zwo: Some(zwo),
          source: Some(generated.source.to_string()),
          ..base
        }
      }
      Err(PipelineError::ParseIncomplete(missing)) => {
        let keys: Vec<&str> = missing.iter().map(MissingItem::key).collect();
        tracing::info!(missing = ?keys, "request rejected");
        PipelineResult {
          confidence: completeness.score,
          message: scorer::diagnostic(&missing),
          status: ResultStatus::MissingInformation,
          missing,
          ..base
        }
      }
      Err(e) => {
        tracing::error!(error = %e, "workout generation failed");
        PipelineResult {
          message: INTERNAL_ERROR_MESSAGE.to_string(),
          ..base
        }
      }
    }
  }

  /// Never rejects: a failed or near-empty parse falls back to the minimal
  /// workout built from estimated parameters
  fn expert(
    &self,
    decision: &Decision,
    extracted: &ExtractedParameters,
    calculated: &CalculatedValues,
    reference_power: u32,
  ) -> Result<Generated, PipelineError> {
    if !decision.minimal {
      match self.generator.generate(extracted, calculated, reference_power) {
        Ok(workout) => {
          let message = format!(
            "Coach expert: workout generated without physiological validation (TSS: {})",
            workout.training_load
          );
          return Ok(Generated {
            workout,
            status: ResultStatus::CoachExpert,
            source: "parametric",
            confidence: reported(decision, 0.0),
            message,
          });
        }
        Err(e) => {
          tracing::warn!(error = %e, "expert generation failed, building minimal workout");
        }
      }
    }

    let workout = self.generator.minimal(extracted, reference_power)?;
    Ok(Generated {
      workout,
      status: ResultStatus::CoachMinimal,
      source: "parametric",
      confidence: router::EXPERT_MINIMAL_CONFIDENCE,
      message: "Coach expert: workout generated from estimated parameters".to_string(),
    })
  }

  /// Interpreter first; on reject, gap-filling from the best reference
  /// workout; with no reference, direct generation
  async fn corpus_enrich(
    &self,
    text: &str,
    extracted: &ExtractedParameters,
    calculated: &CalculatedValues,
    score: f64,
    reference_power: u32,
  ) -> Result<Generated, PipelineError> {
    let best = self
      .corpus
      .search(text, CORPUS_CANDIDATES)
      .into_iter()
      .next()
      .filter(|m| m.similarity > 0.0);
    let confidence = blended_confidence(score, best.as_ref());

    let interpreted = BlockInterpreter::new(self.enricher.as_ref(), self.enrichment_timeout)
      .interpret(text)
      .await;
    if let Some(e) = interpreted.recovered {
      recovered(PipelineError::EnrichmentUnavailable(e));
    }

    match interpreted.interpretation {
      Interpretation::Steps { source, steps } => {
        let workout = self.generator.from_steps(&steps, extracted, reference_power)?;
        Ok(Generated {
          workout,
          status: ResultStatus::CorpusEnriched,
          source: source.as_str(),
          confidence,
          message: format!(
            "Workout interpreted from {} blocks (completeness: {}%)",
            steps.len(),
            percent(score)
          ),
        })
      }
      Interpretation::Rejected { diagnostic } => {
        tracing::info!(%diagnostic, "interpretation rejected, consulting reference workouts");

        match best.ok_or(PipelineError::NoCorpusMatch) {
          Ok(reference) => {
            let filled = generator::fill_gaps(extracted, &reference.entry);
            let workout = self.generator.generate(&filled, calculated, reference_power)?;
            Ok(Generated {
              workout,
              status: ResultStatus::CorpusEnriched,
              source: "corpus",
              confidence,
              message: format!(
                "Workout completed from reference '{}' (similarity: {:.2})",
                reference.entry.name, reference.similarity
              ),
            })
          }
          Err(e) => {
            recovered(e);
            let workout = self.generator.generate(extracted, calculated, reference_power)?;
            Ok(Generated {
              workout,
              status: ResultStatus::Generated,
              source: "parametric",
              confidence: score,
              message: format!(
                "Workout generated from the stated parameters (completeness: {}%)",
                percent(score)
              ),
            })
          }
        }
      }
    }
  }
}

fn reported(decision: &Decision, score: f64) -> f64 {
  match decision.confidence {
    ReportedConfidence::Pinned(value) => value,
    ReportedConfidence::FromScore => score,
  }
}

fn blended_confidence(score: f64, best: Option<&CorpusMatch>) -> f64 {
  let blended = best.map_or(score, |m| (score + m.similarity) / 2.0);
  blended.min(ENRICHED_CONFIDENCE_CAP)
}

/// Recoverable errors are logged, never returned
fn recovered(error: PipelineError) {
  match error {
    PipelineError::EnrichmentUnavailable(EnrichmentError::Disabled) => {
      tracing::debug!("remote enrichment disabled")
    }
    other => tracing::warn!(error = %other, "recovered locally"),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::llm::LocalEnricher;
  use crate::models::SegmentType;
  use crate::test_utils::{corpus_from, local_pipeline, pipeline_with, StaticEnricher};

  fn segments_of(result: &PipelineResult, kind: SegmentType) -> Vec<(u32, f64)> {
    result
      .workout
      .as_ref()
      .map(|w| {
        w.segments
          .iter()
          .filter(|s| s.segment_type == kind)
          .map(|s| (s.duration_seconds, s.intensity_start))
          .collect()
      })
      .unwrap_or_default()
  }

  #[tokio::test]
  async fn test_five_minutes_tempo() {
    let result = local_pipeline()
      .process(&RawQuery::new("5 minutes tempo", Mode::Standard, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.route, Route::CorpusEnrich);
    assert_eq!(result.status, ResultStatus::CorpusEnriched);
    assert_eq!(result.source.as_deref(), Some("compositional"));
    assert!(result.confidence >= 0.6 && result.confidence <= 0.85, "{}", result.confidence);

    let workout = result.workout.as_ref().unwrap();
    assert_eq!(workout.segments.len(), 1);
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(300, 82.0)]);
    assert!(workout.segments[0].zone.contains("Tempo"));
  }

  #[tokio::test]
  async fn test_three_by_five_at_95() {
    let result = local_pipeline()
      .process(&RawQuery::new("3x5min à 95%", Mode::Standard, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.route, Route::AutoGenerate);
    assert_eq!(result.confidence, 0.95);
    assert_eq!(result.message, "Workout generated automatically (completeness: 100%)");
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(300, 95.0); 3]);

    let rests = segments_of(&result, SegmentType::Recovery);
    assert_eq!(rests.len(), 2);
    assert!(rests.iter().all(|(seconds, _)| *seconds == 120));

    let last = result.workout.as_ref().and_then(|w| w.segments.last()).unwrap();
    assert_eq!(last.segment_type, SegmentType::Work);
  }

  #[tokio::test]
  async fn test_short_continuous_effort_lengthened() {
    let result = local_pipeline()
      .process(&RawQuery::new("10 minutes à 88.5%", Mode::Standard, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.route, Route::AutoGenerate);
    assert_eq!(result.status, ResultStatus::Generated);
    assert_eq!(result.confidence, 0.95);
    assert_eq!(result.message, "Workout generated automatically (completeness: 90%)");
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(1200, 88.5)]);
  }

  #[tokio::test]
  async fn test_oversized_duration_rejected() {
    let result = local_pipeline()
      .process(&RawQuery::new("80000000 min à 90%", Mode::Standard, 250))
      .await;

    assert!(!result.success);
    assert_eq!(result.status, ResultStatus::MissingInformation);
    assert!(result.missing.contains(&MissingItem::Duration));
  }

  #[tokio::test]
  async fn test_oversized_workouts_never_panic() {
    let result = local_pipeline()
      .process(&RawQuery::new("3x40000000min à 90%", Mode::Expert, 250))
      .await;
    assert!(result.success);
    assert_eq!(result.status, ResultStatus::CoachMinimal);
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(1800, 90.0)]);

    let result = local_pipeline()
      .process(&RawQuery::new("1000000000x1min à 90% avec 1min repos", Mode::Standard, 250))
      .await;
    assert!(!result.success);
    assert_eq!(result.status, ResultStatus::InternalError);
    assert_eq!(result.message, INTERNAL_ERROR_MESSAGE);
  }

  #[tokio::test]
  async fn test_missing_information() {
    let result = local_pipeline()
      .process(&RawQuery::new("faire du sport", Mode::Standard, 250))
      .await;

    assert!(!result.success);
    assert_eq!(result.route, Route::Reject);
    assert_eq!(result.status, ResultStatus::MissingInformation);
    assert!(result.workout.is_none());
    assert!(result.zwo.is_none());
    assert!(result.missing.contains(&MissingItem::Duration));
    assert!(result.missing.contains(&MissingItem::Intensity));
    assert!(result.message.starts_with(scorer::DIAGNOSTIC_PREFIX));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["status"], "missing_information");
    let missing: Vec<&str> = json["missing"]
      .as_array()
      .unwrap()
      .iter()
      .filter_map(|v| v.as_str())
      .collect();
    assert!(missing.contains(&"duration"));
    assert!(missing.contains(&"intensity"));
  }

  #[tokio::test]
  async fn test_expert_six_hours() {
    let result = local_pipeline()
      .process(&RawQuery::new("6 heures à 130%FTP sans pause", Mode::Expert, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.confidence, 0.95);
    assert_eq!(result.status, ResultStatus::CoachExpert);
    assert!(result.message.starts_with("Coach expert: workout generated without physiological validation"));

    let workout = result.workout.as_ref().unwrap();
    assert_eq!(workout.segments.len(), 1);
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(21600, 130.0)]);
  }

  #[tokio::test]
  async fn test_expert_never_rejects() {
    let result = local_pipeline()
      .process(&RawQuery::new("faire du sport", Mode::Expert, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.confidence, 0.85);
    assert_eq!(result.status, ResultStatus::CoachMinimal);
    assert_eq!(
      result.message,
      "Coach expert: workout generated from estimated parameters"
    );
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(1800, 85.0)]);
  }

  #[tokio::test]
  async fn test_zwo_round_trip() {
    let result = local_pipeline()
      .process(&RawQuery::new("3x5min à 95%", Mode::Standard, 250))
      .await;

    let workout = result.workout.as_ref().unwrap();
    let steps = zwo::parse_steps(result.zwo.as_deref().unwrap()).unwrap();
    let total: u32 = steps.iter().map(|s| s.duration_seconds).sum();
    assert_eq!(total, workout.total_duration_seconds);
    assert_eq!(steps[0].power_start, 0.95);
  }

  #[tokio::test]
  async fn test_enricher_answer_used() {
    let enricher = StaticEnricher::new(
      r#"{"workout_steps": [{"duration_seconds": 300, "type": "work", "power_percent": 84, "description": "Tempo"}]}"#,
    );
    let result = pipeline_with(enricher)
      .process(&RawQuery::new("5 minutes tempo", Mode::Standard, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.source.as_deref(), Some("enricher"));
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(300, 84.0)]);
  }

  #[tokio::test]
  async fn test_corpus_fills_missing_intensity() {
    let corpus = corpus_from(
      r#"[{"text": "3x5min vo2max", "name": "Short VO2", "duration_minutes": 15,
           "difficulty": 4, "zone": "Zone 5", "completeness": "simple"}]"#,
    );
    let pipeline = Pipeline::new(&CoachConfig::default(), corpus, Box::new(LocalEnricher));

    let result = pipeline
      .process(&RawQuery::new("3x5min", Mode::Standard, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.route, Route::CorpusEnrich);
    assert_eq!(result.source.as_deref(), Some("corpus"));
    assert!(result.message.contains("Short VO2"));
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(300, 113.0); 3]);
  }

  #[tokio::test]
  async fn test_no_corpus_match_generates_directly() {
    let corpus = corpus_from(
      r#"[{"text": "endurance longue", "name": "Long ride", "duration_minutes": 120,
           "difficulty": 2, "zone": "Zone 2", "completeness": "simple"}]"#,
    );
    let pipeline = Pipeline::new(&CoachConfig::default(), corpus, Box::new(LocalEnricher));

    let result = pipeline
      .process(&RawQuery::new("3x5min", Mode::Standard, 250))
      .await;

    assert!(result.success);
    assert_eq!(result.status, ResultStatus::Generated);
    assert_eq!(result.source.as_deref(), Some("parametric"));
    assert_eq!(result.confidence, 0.6);
    assert_eq!(segments_of(&result, SegmentType::Work), vec![(300, 85.0); 3]);
  }

  #[tokio::test]
  async fn test_corrections_reported() {
    let result = local_pipeline()
      .process(&RawQuery::new("10min echauffements puis 3x5min à 95% avec 2min recup", Mode::Standard, 250))
      .await;

    assert!(result.success);
    assert!(result
      .corrections
      .iter()
      .any(|c| c.from == "recup" && c.to == "recuperation"));
  }

  #[test]
  fn test_blended_confidence_capped() {
    assert_eq!(blended_confidence(0.7, None), 0.7);
    let strong = CorpusMatch {
      entry: CorpusMatcher::builtin().unwrap().entries()[0].clone(),
      similarity: 1.0,
    };
    assert_eq!(blended_confidence(0.8, Some(&strong)), 0.85);
  }

  #[test]
  fn test_from_config_embedding() {
    let config = CoachConfig {
      corpus_strategy: CorpusStrategy::Embedding,
      ..CoachConfig::default()
    };
    let pipeline = Pipeline::from_config(&config).unwrap();
    assert_eq!(pipeline.corpus().strategy_name(), "hashing-trigram");
  }
}
