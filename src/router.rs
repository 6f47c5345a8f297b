//! Three-way branch between generation, corpus enrichment and rejection
//!
//! This is the single point where a request's generation path is chosen.
//! Stateless: the decision depends only on the score, the mode and the
//! configured thresholds.

use crate::models::Mode;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const AUTO_CONFIDENCE: f64 = 0.95;
pub const EXPERT_CONFIDENCE: f64 = 0.95;
pub const EXPERT_MINIMAL_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
  AutoGenerate,
  CorpusEnrich,
  Reject,
}

impl Route {
  pub fn as_str(&self) -> &'static str {
    match self {
      Route::AutoGenerate => "auto_generate",
      Route::CorpusEnrich => "corpus_enrich",
      Route::Reject => "reject",
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouterThresholds {
  /// Standard mode generates directly at or above this score
  pub auto: f64,
  /// Below this score standard mode rejects; expert mode falls to a minimal workout
  pub enrich: f64,
}

impl Default for RouterThresholds {
  fn default() -> Self {
    Self {
      auto: 0.9,
      enrich: 0.6,
    }
  }
}

/// Confidence the caller will see. Direct generation pins it; corpus
/// enrichment reports the score (or a blend, decided by the pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedConfidence {
  Pinned(f64),
  FromScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
  pub route: Route,
  pub confidence: ReportedConfidence,
  /// Expert mode below the enrich threshold: build from estimated parameters
  pub minimal: bool,
}

pub fn decide(score: f64, mode: Mode, thresholds: &RouterThresholds) -> Decision {
  let decision = match mode {
    Mode::Expert if score >= thresholds.enrich => Decision {
      route: Route::AutoGenerate,
      confidence: ReportedConfidence::Pinned(EXPERT_CONFIDENCE),
      minimal: false,
    },
    Mode::Expert => Decision {
      route: Route::AutoGenerate,
      confidence: ReportedConfidence::Pinned(EXPERT_MINIMAL_CONFIDENCE),
      minimal: true,
    },
    Mode::Standard => {
      let (route, confidence) = if score >= thresholds.auto {
        (Route::AutoGenerate, ReportedConfidence::Pinned(AUTO_CONFIDENCE))
      } else if score >= thresholds.enrich {
        (Route::CorpusEnrich, ReportedConfidence::FromScore)
      } else {
        (Route::Reject, ReportedConfidence::FromScore)
      };
      Decision {
        route,
        confidence,
        minimal: false,
      }
    }
  };

  tracing::info!(score, mode = %mode, route = %decision.route, "route decided");
  decision
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_standard_boundaries() {
    let t = RouterThresholds::default();
    assert_eq!(decide(1.0, Mode::Standard, &t).route, Route::AutoGenerate);
    assert_eq!(decide(0.9, Mode::Standard, &t).route, Route::AutoGenerate);
    assert_eq!(decide(0.89, Mode::Standard, &t).route, Route::CorpusEnrich);
    assert_eq!(decide(0.6, Mode::Standard, &t).route, Route::CorpusEnrich);
    assert_eq!(decide(0.59, Mode::Standard, &t).route, Route::Reject);
    assert_eq!(decide(0.0, Mode::Standard, &t).route, Route::Reject);
  }

  #[test]
  fn test_standard_auto_confidence_pinned() {
    let t = RouterThresholds::default();
    for score in [0.9, 1.0] {
      assert_eq!(
        decide(score, Mode::Standard, &t).confidence,
        ReportedConfidence::Pinned(AUTO_CONFIDENCE)
      );
    }
    assert_eq!(decide(0.7, Mode::Standard, &t).confidence, ReportedConfidence::FromScore);
  }

  #[test]
  fn test_expert_never_rejects() {
    let t = RouterThresholds::default();
    for score in [0.0, 0.3, 0.59, 0.6, 0.8, 1.0] {
      assert_eq!(decide(score, Mode::Expert, &t).route, Route::AutoGenerate);
    }

    let full = decide(0.8, Mode::Expert, &t);
    assert_eq!(full.confidence, ReportedConfidence::Pinned(0.95));
    assert!(!full.minimal);

    let minimal = decide(0.0, Mode::Expert, &t);
    assert_eq!(minimal.confidence, ReportedConfidence::Pinned(0.85));
    assert!(minimal.minimal);
  }

  #[test]
  fn test_custom_thresholds() {
    let t = RouterThresholds {
      auto: 0.8,
      enrich: 0.5,
    };
    assert_eq!(decide(0.8, Mode::Standard, &t).route, Route::AutoGenerate);
    assert_eq!(decide(0.5, Mode::Standard, &t).route, Route::CorpusEnrich);
    assert_eq!(decide(0.5, Mode::Expert, &t).confidence, ReportedConfidence::Pinned(0.95));
  }
}
