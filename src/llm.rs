//! Optional remote enrichment through a local language-model server
//!
//! Enrichment is a capability, never a dependency of correctness: the
//! pipeline holds a `Box<dyn Enricher>` and falls back to local parsing on
//! any error. `LocalEnricher` is the default and always declines.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

pub const DEFAULT_MODEL: &str = "llama3.2:3b";
const MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.1;
const TOP_P: f32 = 0.9;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum EnrichmentError {
  #[error("Remote enrichment is not configured")]
  Disabled,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),

  #[error("No answer within {0} seconds")]
  Timeout(u64),
}

impl Serialize for EnrichmentError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Enricher capability
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait Enricher: Send + Sync {
  fn name(&self) -> &'static str;

  /// Raw model answer for a workout description
  async fn enrich(&self, text: &str) -> Result<String, EnrichmentError>;
}

/// Default enricher: no remote backend, always declines
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEnricher;

#[async_trait]
impl Enricher for LocalEnricher {
  fn name(&self) -> &'static str {
    "local"
  }

  async fn enrich(&self, _text: &str) -> Result<String, EnrichmentError> {
    Err(EnrichmentError::Disabled)
  }
}

/// ---------------------------------------------------------------------------
/// Ollama API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
  model: &'a str,
  prompt: String,
  stream: bool,
  options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
  num_predict: u32,
  temperature: f32,
  top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
  response: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
  name: &'a str,
  stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
  error: String,
}

enum Attempt {
  Answer(String),
  ModelMissing,
}

/// ---------------------------------------------------------------------------
/// Ollama Client
/// ---------------------------------------------------------------------------

pub struct OllamaEnricher {
  client: Client,
  base_url: Url,
  model: String,
}

impl OllamaEnricher {
  pub fn new(base_url: Url, model: impl Into<String>, timeout: Duration) -> Self {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .unwrap_or_else(|_| Client::new());

    Self {
      client,
      base_url,
      model: model.into(),
    }
  }

  fn endpoint(&self, path: &str) -> Result<Url, EnrichmentError> {
    self
      .base_url
      .join(path)
      .map_err(|e| EnrichmentError::Request(e.to_string()))
  }

  async fn generate(&self, prompt: &str) -> Result<Attempt, EnrichmentError> {
    let request = GenerateRequest {
      model: &self.model,
      prompt: prompt.to_string(),
      stream: false,
      options: GenerateOptions {
        num_predict: MAX_TOKENS,
        temperature: TEMPERATURE,
        top_p: TOP_P,
      },
    };

    let response = self
      .client
      .post(self.endpoint("api/generate")?)
      .json(&request)
      .send()
      .await
      .map_err(|e| EnrichmentError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| EnrichmentError::Request(e.to_string()))?;

    if status == StatusCode::NOT_FOUND {
      return Ok(Attempt::ModelMissing);
    }

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<OllamaErrorResponse>(&body) {
        return Err(EnrichmentError::Api(error_resp.error));
      }
      return Err(EnrichmentError::Api(format!("HTTP {}: {}", status, body)));
    }

    let generated: GenerateResponse =
      serde_json::from_str(&body).map_err(|e| EnrichmentError::Parse(e.to_string()))?;

    Ok(Attempt::Answer(generated.response))
  }

  /// One-time provisioning of a model the server does not have yet
  async fn pull_model(&self) -> Result<(), EnrichmentError> {
    tracing::info!(model = %self.model, "model missing on server, pulling");

    let response = self
      .client
      .post(self.endpoint("api/pull")?)
      .json(&PullRequest {
        name: &self.model,
        stream: false,
      })
      .send()
      .await
      .map_err(|e| EnrichmentError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(EnrichmentError::Api(format!("Model pull failed: HTTP {}", status)));
    }
    Ok(())
  }
}

#[async_trait]
impl Enricher for OllamaEnricher {
  fn name(&self) -> &'static str {
    "ollama"
  }

  async fn enrich(&self, text: &str) -> Result<String, EnrichmentError> {
    let prompt = include_str!("prompts/block_decomposition.txt").replace("{query}", text);

    match self.generate(&prompt).await? {
      Attempt::Answer(answer) => Ok(answer),
      Attempt::ModelMissing => {
        self.pull_model().await?;
        match self.generate(&prompt).await? {
          Attempt::Answer(answer) => Ok(answer),
          Attempt::ModelMissing => Err(EnrichmentError::Api(format!(
            "Model {} still missing after pull",
            self.model
          ))),
        }
      }
    }
  }
}

/// Ollama when a server URL is configured, otherwise the local no-op
pub fn build_enricher(
  base_url: Option<&Url>,
  model: &str,
  timeout: Duration,
) -> Box<dyn Enricher> {
  match base_url {
    Some(url) => Box::new(OllamaEnricher::new(url.clone(), model, timeout)),
    None => Box::new(LocalEnricher),
  }
}

/// Extract JSON from a model answer (handles markdown code blocks)
pub(crate) fn extract_json(text: &str) -> Result<String, EnrichmentError> {
  if text.trim().starts_with('{') {
    return Ok(text.trim().to_string());
  }

  if let Some(start) = text.find("```json") {
    let start = start + 7;
    if let Some(end) = text[start..].find("```") {
      return Ok(text[start..start + end].trim().to_string());
    }
  }

  if let Some(start) = text.find("```") {
    let start = start + 3;
    let content_start = text[start..]
      .find('\n')
      .map(|i| start + i + 1)
      .unwrap_or(start);
    if let Some(end) = text[content_start..].find("```") {
      return Ok(text[content_start..content_start + end].trim().to_string());
    }
  }

  // First { to last }
  if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
    if start < end {
      return Ok(text[start..=end].to_string());
    }
  }

  Err(EnrichmentError::Parse("Could not extract JSON from response".to_string()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
