use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "EASY" => Self::Easy,
            "HARD" => Self::Hard,
            _ => Self::Medium,
        }
    }
}

/// Latest state of one exercise linked to a competency, for one learner.
///
/// `last_score`, `last_points` and `last_modified` come from the same
/// participant score and are either all present or all absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseMasteryRecord {
    pub exercise_id: i64,
    pub max_points: f64,
    #[serde(default)]
    pub last_points: Option<f64>,
    #[serde(default)]
    pub last_score: Option<f64>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub difficulty: DifficultyLevel,
    #[serde(default)]
    pub submission_count: u32,
    #[serde(default)]
    pub is_programming: bool,
}

impl ExerciseMasteryRecord {
    pub fn unattempted(exercise_id: i64, max_points: f64, difficulty: DifficultyLevel) -> Self {
        Self {
            exercise_id,
            max_points,
            last_points: None,
            last_score: None,
            last_modified: None,
            difficulty,
            submission_count: 0,
            is_programming: false,
        }
    }

    /// Score, points and timestamp of an attempted exercise.
    pub fn scored(&self) -> Option<ScoredAttempt> {
        match (self.last_score, self.last_points, self.last_modified) {
            (Some(score), Some(points), Some(modified)) => Some(ScoredAttempt {
                score,
                points,
                modified,
                max_points: self.max_points,
                difficulty: self.difficulty,
                submission_count: self.submission_count,
                is_programming: self.is_programming,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredAttempt {
    pub score: f64,
    pub points: f64,
    pub modified: DateTime<Utc>,
    pub max_points: f64,
    pub difficulty: DifficultyLevel,
    pub submission_count: u32,
    pub is_programming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureUnitCompletionCount {
    pub total: usize,
    pub completed: usize,
}

impl LectureUnitCompletionCount {
    pub fn new(total: usize, completed: usize) -> Self {
        Self {
            total,
            completed: completed.min(total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceReason {
    #[default]
    NoReason,
    RecentScoresLower,
    RecentScoresHigher,
    MoreEasyPoints,
    MoreHardPoints,
    QuicklySolvedExercises,
}

impl ConfidenceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReason => "NO_REASON",
            Self::RecentScoresLower => "RECENT_SCORES_LOWER",
            Self::RecentScoresHigher => "RECENT_SCORES_HIGHER",
            Self::MoreEasyPoints => "MORE_EASY_POINTS",
            Self::MoreHardPoints => "MORE_HARD_POINTS",
            Self::QuicklySolvedExercises => "QUICKLY_SOLVED_EXERCISES",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "RECENT_SCORES_LOWER" => Self::RecentScoresLower,
            "RECENT_SCORES_HIGHER" => Self::RecentScoresHigher,
            "MORE_EASY_POINTS" => Self::MoreEasyPoints,
            "MORE_HARD_POINTS" => Self::MoreHardPoints,
            "QUICKLY_SOLVED_EXERCISES" => Self::QuicklySolvedExercises,
            _ => Self::NoReason,
        }
    }
}

/// Stored progress of one learner in one competency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyProgressState {
    pub competency_id: i64,
    pub user_id: i64,
    pub progress: f64,
    pub confidence: f64,
    pub confidence_reason: ConfidenceReason,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CompetencyProgressState {
    pub fn new(competency_id: i64, user_id: i64) -> Self {
        Self {
            competency_id,
            user_id,
            progress: 0.0,
            confidence: 1.0,
            confidence_reason: ConfidenceReason::NoReason,
            last_modified: None,
        }
    }

    pub fn mastery(&self) -> f64 {
        super::evaluator::mastery(self.progress, self.confidence)
    }
}

/// Competency data the engine reads but never writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyMasteryConfig {
    pub competency_id: i64,
    pub course_id: i64,
    pub mastery_threshold: f64,
    /// Linked lecture units, exercise units excluded.
    #[serde(default)]
    pub lecture_unit_ids: Vec<i64>,
    #[serde(default)]
    pub exercise_ids: Vec<i64>,
}

/// Clamped heuristic values behind a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBreakdown {
    pub recency: f64,
    pub difficulty: f64,
    pub quick_solve: f64,
    pub confidence: f64,
    pub reason: ConfidenceReason,
}

/// Scoring tunables. Fields missing from JSON take their default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringParams {
    pub default_confidence: f64,
    pub max_heuristic: f64,
    pub reason_deadzone: f64,
    pub min_records_for_recency: usize,
    pub max_submissions_for_quick_solve: u32,
    pub min_score_green: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            default_confidence: 1.0,
            max_heuristic: 0.25,
            reason_deadzone: 0.05,
            min_records_for_recency: 3,
            max_submissions_for_quick_solve: 3,
            min_score_green: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum LearningObject {
    Exercise(i64),
    LectureUnit(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trips_through_str() {
        for reason in [
            ConfidenceReason::NoReason,
            ConfidenceReason::RecentScoresLower,
            ConfidenceReason::RecentScoresHigher,
            ConfidenceReason::MoreEasyPoints,
            ConfidenceReason::MoreHardPoints,
            ConfidenceReason::QuicklySolvedExercises,
        ] {
            assert_eq!(ConfidenceReason::from_str(reason.as_str()), reason);
        }
    }

    #[test]
    fn test_partial_params_use_defaults() {
        let params: ScoringParams = serde_json::from_str(r#"{"minScoreGreen": 90}"#).unwrap();
        assert_eq!(params.min_score_green, 90.0);
        assert_eq!(params.max_heuristic, 0.25);
        assert_eq!(params.reason_deadzone, 0.05);
        assert_eq!(params.min_records_for_recency, 3);
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let record: ExerciseMasteryRecord =
            serde_json::from_str(r#"{"exerciseId": 7, "maxPoints": 10.0}"#).unwrap();
        assert_eq!(record.difficulty, DifficultyLevel::Medium);
        assert!(record.scored().is_none());
        assert_eq!(record.submission_count, 0);
    }

    #[test]
    fn test_partial_attempt_is_not_scored() {
        let mut record = ExerciseMasteryRecord::unattempted(1, 10.0, DifficultyLevel::Hard);
        record.last_points = Some(5.0);
        record.last_score = Some(50.0);
        assert!(record.scored().is_none());
    }

    #[test]
    fn test_completion_count_caps_completed() {
        let count = LectureUnitCompletionCount::new(2, 5);
        assert_eq!(count.completed, 2);
    }
}
