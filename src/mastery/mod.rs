//! Competency mastery scoring.
//!
//! Pure functions over immutable value records:
//! - `progress`: share of points and lecture units completed (0-100)
//! - `confidence`: heuristic multiplier centred at 1.0 with a dominant reason
//! - `evaluator`: mastery = progress x confidence and threshold checks

pub mod confidence;
pub mod evaluator;
pub mod progress;
pub mod snapshot;
pub mod types;

pub use confidence::compute_confidence;
pub use evaluator::{can_be_mastered_without_exercises, is_mastered, mastery, mastery_progress};
pub use progress::compute_progress;
pub use types::{
    CompetencyMasteryConfig, CompetencyProgressState, ConfidenceBreakdown, ConfidenceReason,
    DifficultyLevel, ExerciseMasteryRecord, LearningObject, LectureUnitCompletionCount,
    ScoringParams,
};

/// Progress and confidence computed from one set of inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryComputation {
    pub progress: f64,
    pub breakdown: ConfidenceBreakdown,
}

impl MasteryComputation {
    pub fn mastery(&self) -> f64 {
        mastery(self.progress, self.breakdown.confidence)
    }

    /// Writes the result into `state`; the timestamp is left to the caller.
    pub fn apply_to(&self, state: &mut CompetencyProgressState) {
        state.progress = self.progress;
        state.confidence = self.breakdown.confidence;
        state.confidence_reason = self.breakdown.reason;
    }
}

pub fn compute_mastery(
    lecture_units: LectureUnitCompletionCount,
    records: &[ExerciseMasteryRecord],
    params: &ScoringParams,
) -> MasteryComputation {
    MasteryComputation {
        progress: compute_progress(lecture_units, records),
        breakdown: compute_confidence(records, params),
    }
}
