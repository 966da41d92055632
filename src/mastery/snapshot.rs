use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{
    CompetencyProgressState, ConfidenceReason, ExerciseMasteryRecord, LectureUnitCompletionCount,
    ScoringParams,
};
use super::{can_be_mastered_without_exercises, compute_mastery, is_mastered, mastery_progress};

/// Inputs of one learner in one competency, as read by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterySnapshot {
    #[serde(default)]
    pub competency_id: i64,
    #[serde(default)]
    pub course_id: i64,
    #[serde(default)]
    pub user_id: i64,
    pub mastery_threshold: f64,
    #[serde(default)]
    pub lecture_units: LectureUnitCompletionCount,
    #[serde(default)]
    pub exercises: Vec<ExerciseMasteryRecord>,
    #[serde(default)]
    pub params: Option<ScoringParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryReport {
    pub progress: f64,
    pub confidence: f64,
    pub confidence_reason: ConfidenceReason,
    pub recency: f64,
    pub difficulty: f64,
    pub quick_solve: f64,
    pub mastery: f64,
    pub mastery_progress: f64,
    pub mastered: bool,
    pub can_be_mastered_without_exercises: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

impl MasterySnapshot {
    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(raw)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !(0.0..=100.0).contains(&self.mastery_threshold) {
            return Err(SnapshotError::Invalid(format!(
                "mastery threshold {} outside 0-100",
                self.mastery_threshold
            )));
        }
        if self.lecture_units.completed > self.lecture_units.total {
            return Err(SnapshotError::Invalid(format!(
                "{} completed lecture units out of {}",
                self.lecture_units.completed, self.lecture_units.total
            )));
        }
        if let Some(params) = &self.params {
            validate_params(params)?;
        }
        for exercise in &self.exercises {
            if exercise.max_points < 0.0 {
                return Err(SnapshotError::Invalid(format!(
                    "exercise {} has negative max points",
                    exercise.exercise_id
                )));
            }
            let present = [
                exercise.last_score.is_some(),
                exercise.last_points.is_some(),
                exercise.last_modified.is_some(),
            ];
            if present.iter().any(|p| *p) && !present.iter().all(|p| *p) {
                return Err(SnapshotError::Invalid(format!(
                    "exercise {} needs score, points and timestamp together",
                    exercise.exercise_id
                )));
            }
        }
        Ok(())
    }

    pub fn evaluate(&self) -> MasteryReport {
        let params = self.params.clone().unwrap_or_default();
        let computation = compute_mastery(self.lecture_units, &self.exercises, &params);

        let mut state = CompetencyProgressState::new(self.competency_id, self.user_id);
        computation.apply_to(&mut state);

        MasteryReport {
            progress: computation.progress,
            confidence: computation.breakdown.confidence,
            confidence_reason: computation.breakdown.reason,
            recency: computation.breakdown.recency,
            difficulty: computation.breakdown.difficulty,
            quick_solve: computation.breakdown.quick_solve,
            mastery: computation.mastery(),
            mastery_progress: mastery_progress(&state, self.mastery_threshold),
            mastered: is_mastered(&state, self.mastery_threshold),
            can_be_mastered_without_exercises: can_be_mastered_without_exercises(
                self.lecture_units.total,
                self.exercises.len(),
                self.mastery_threshold,
            ),
        }
    }
}

fn validate_params(params: &ScoringParams) -> Result<(), SnapshotError> {
    let bounds = [
        ("default confidence", params.default_confidence),
        ("max heuristic", params.max_heuristic),
        ("reason deadzone", params.reason_deadzone),
        ("min score green", params.min_score_green),
    ];
    for (name, value) in bounds {
        if !value.is_finite() || value < 0.0 {
            return Err(SnapshotError::Invalid(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
    }
    Ok(())
}
