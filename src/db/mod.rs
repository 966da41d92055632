//! Persistence boundary of the mastery engine.
//!
//! The scoring core never touches storage. The progress service reads its
//! inputs through `MasteryInputProvider`, stores results through
//! `ProgressRepository` and keeps learning paths current through
//! `LearningPathRepository`.

pub mod memory;
pub mod models;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;

use crate::mastery::{
    CompetencyMasteryConfig, CompetencyProgressState, ExerciseMasteryRecord, LearningObject,
};

pub use memory::MemoryStore;
pub use models::{CourseCompetencyProgress, ExerciseInfo, LearningPath, ParticipantScore};
pub use sqlite::SqliteProgressRepository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait MasteryInputProvider: Send + Sync {
    async fn find_competency(
        &self,
        competency_id: i64,
    ) -> Result<Option<CompetencyMasteryConfig>, StoreError>;

    async fn user_exists(&self, user_id: i64) -> Result<bool, StoreError>;

    /// One record per exercise linked to the competency.
    async fn exercise_records(
        &self,
        competency_id: i64,
        user_id: i64,
    ) -> Result<Vec<ExerciseMasteryRecord>, StoreError>;

    async fn count_completed_lecture_units(
        &self,
        lecture_unit_ids: &[i64],
        user_id: i64,
    ) -> Result<usize, StoreError>;

    async fn competency_ids_for(&self, object: LearningObject) -> Result<Vec<i64>, StoreError>;

    async fn users_in_course(&self, course_id: i64) -> Result<Vec<i64>, StoreError>;

    /// Users who participated in the exercise or completed the lecture unit.
    async fn users_active_on(&self, object: LearningObject) -> Result<Vec<i64>, StoreError>;

    /// Mean of the per-exercise average scores; `None` without any score.
    async fn average_exercise_score(&self, exercise_ids: &[i64])
        -> Result<Option<f64>, StoreError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn find(
        &self,
        competency_id: i64,
        user_id: i64,
    ) -> Result<Option<CompetencyProgressState>, StoreError>;

    async fn find_all_by_competency(
        &self,
        competency_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError>;

    async fn find_all_by_competencies_and_user(
        &self,
        competency_ids: &[i64],
        user_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError>;

    /// Creates the row for a new learner/competency pair.
    ///
    /// Returns `false` without writing when the pair already has a row.
    async fn insert_if_absent(&self, state: &CompetencyProgressState) -> Result<bool, StoreError>;

    async fn update(&self, state: &CompetencyProgressState) -> Result<(), StoreError>;

    async fn delete_all_by_competency(&self, competency_id: i64) -> Result<u64, StoreError>;

    async fn count_by_competency(&self, competency_id: i64) -> Result<u64, StoreError>;

    async fn count_mastered_by_competency(
        &self,
        competency_id: i64,
        mastery_threshold: f64,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait LearningPathRepository: Send + Sync {
    async fn find_by_course_and_user(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<Option<LearningPath>, StoreError>;

    async fn find_all_by_course(&self, course_id: i64) -> Result<Vec<LearningPath>, StoreError>;

    async fn save_progress(&self, learning_path_id: i64, progress: i32) -> Result<(), StoreError>;
}
