pub mod analysis;
pub mod calculator;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod extractor;
pub mod generator;
pub mod interpreter;
pub mod llm;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod router;
pub mod scorer;
pub mod zwo;

#[cfg(test)]
mod test_utils;

pub use config::CoachConfig;
pub use models::{Mode, ParametricWorkout, RawQuery};
pub use pipeline::{Pipeline, PipelineError, PipelineResult, ResultStatus};
