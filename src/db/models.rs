use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mastery::DifficultyLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseInfo {
    pub id: i64,
    pub max_points: f64,
    pub difficulty: DifficultyLevel,
    pub is_programming: bool,
}

/// Latest result of a learner in an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantScore {
    pub last_points: f64,
    pub last_score: f64,
    pub last_modified: DateTime<Utc>,
    pub submission_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub competency_ids: Vec<i64>,
    pub progress: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCompetencyProgress {
    pub competency_id: i64,
    pub number_of_students: u64,
    pub number_of_mastered_students: u64,
    pub average_student_score: f64,
}
