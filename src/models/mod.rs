pub mod corpus;
pub mod params;
pub mod query;
pub mod workout;

pub use corpus::{CorpusEntry, StructuralCompleteness};
pub use params::{
  Cues, DurationPrecision, DurationRole, Durations, ExtractedParameters, IntensityPrecision,
  Intensities, Repetitions, SequenceStep, StructureType, ZoneTag,
};
pub use query::{CorrectedQuery, Correction, CorrectionKind, Mode, RawQuery};
pub use workout::{
  ParametricWorkout, PeriodizationPhase, PowerCurve, SegmentType, TargetSystem, WorkoutSegment,
};
