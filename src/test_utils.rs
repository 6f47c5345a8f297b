//! Test utilities shared across module tests
//!
//! - Workout generation from free text without the router
//! - Fake enrichers (fixed answer, slow answer)
//! - Pipeline and corpus builders

use crate::calculator::calculate;
use crate::config::CoachConfig;
use crate::corpus::CorpusMatcher;
use crate::extractor::extract;
use crate::generator::ParametricGenerator;
use crate::llm::{Enricher, EnrichmentError, LocalEnricher};
use crate::models::ParametricWorkout;
use crate::normalizer::correct;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_FTP: u32 = 250;

/// ---------------------------------------------------------------------------
/// Generation
/// ---------------------------------------------------------------------------

/// correct → extract → calculate → generate at the test FTP
pub fn generate_text(text: &str) -> ParametricWorkout {
  let corrected = correct(text).text;
  let extracted = extract(&corrected);
  let calculated = calculate(&corrected, &extracted);
  ParametricGenerator::new()
    .generate(&extracted, &calculated, TEST_FTP)
    .unwrap_or_else(|e| panic!("generation failed for '{}': {}", text, e))
}

/// ---------------------------------------------------------------------------
/// Fake enrichers
/// ---------------------------------------------------------------------------

/// Answers every request with the same text
pub struct StaticEnricher {
  answer: String,
}

impl StaticEnricher {
  pub fn new(answer: &str) -> Self {
    Self {
      answer: answer.to_string(),
    }
  }
}

#[async_trait]
impl Enricher for StaticEnricher {
  fn name(&self) -> &'static str {
    "static"
  }

  async fn enrich(&self, _text: &str) -> Result<String, EnrichmentError> {
    Ok(self.answer.clone())
  }
}

/// Answers only after `delay`, to trip the interpreter timeout
pub struct SlowEnricher {
  delay: Duration,
}

impl SlowEnricher {
  pub fn new(delay: Duration) -> Self {
    Self { delay }
  }
}

#[async_trait]
impl Enricher for SlowEnricher {
  fn name(&self) -> &'static str {
    "slow"
  }

  async fn enrich(&self, _text: &str) -> Result<String, EnrichmentError> {
    tokio::time::sleep(self.delay).await;
    Ok(String::new())
  }
}

/// ---------------------------------------------------------------------------
/// Builders
/// ---------------------------------------------------------------------------

pub fn corpus_from(json: &str) -> Arc<CorpusMatcher> {
  Arc::new(CorpusMatcher::from_json(json).unwrap())
}

pub fn pipeline_with<E: Enricher + 'static>(enricher: E) -> Pipeline {
  let corpus = Arc::new(CorpusMatcher::builtin().unwrap());
  Pipeline::new(&CoachConfig::default(), corpus, Box::new(enricher))
}

/// Built-in corpus, no remote enrichment, default thresholds
pub fn local_pipeline() -> Pipeline {
  pipeline_with(LocalEnricher)
}
