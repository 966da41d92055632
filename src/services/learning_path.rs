use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::ServiceError;
use crate::db::{LearningPath, LearningPathRepository, MasteryInputProvider, ProgressRepository};
use crate::mastery::is_mastered;

/// Keeps the progress of learner learning paths in line with competency mastery.
#[derive(Clone)]
pub struct LearningPathService {
    inputs: Arc<dyn MasteryInputProvider>,
    progress: Arc<dyn ProgressRepository>,
    paths: Arc<dyn LearningPathRepository>,
}

impl LearningPathService {
    pub fn new(
        inputs: Arc<dyn MasteryInputProvider>,
        progress: Arc<dyn ProgressRepository>,
        paths: Arc<dyn LearningPathRepository>,
    ) -> Self {
        Self {
            inputs,
            progress,
            paths,
        }
    }

    /// Recomputes the learner's learning path in the course, if there is one.
    pub async fn update_learning_path_progress(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<Option<i32>, ServiceError> {
        let Some(learning_path) = self.paths.find_by_course_and_user(course_id, user_id).await?
        else {
            return Ok(None);
        };

        let progress = self.compute_progress(&learning_path).await?;
        self.paths.save_progress(learning_path.id, progress).await?;
        debug!(
            learning_path_id = learning_path.id,
            user_id,
            progress,
            "updated learning path progress"
        );
        Ok(Some(progress))
    }

    /// Share of the path's competencies the learner has mastered, rounded to a percentage.
    pub async fn compute_progress(&self, learning_path: &LearningPath) -> Result<i32, ServiceError> {
        let competency_ids: Vec<i64> = learning_path
            .competency_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if competency_ids.is_empty() {
            return Ok(0);
        }

        let states = self
            .progress
            .find_all_by_competencies_and_user(&competency_ids, learning_path.user_id)
            .await?;

        let mut mastered = 0usize;
        for state in &states {
            let Some(competency) = self.inputs.find_competency(state.competency_id).await? else {
                continue;
            };
            if is_mastered(state, competency.mastery_threshold) {
                mastered += 1;
            }
        }

        Ok((mastered as f64 * 100.0 / competency_ids.len() as f64).round() as i32)
    }

    pub async fn average_progress_for_course(&self, course_id: i64) -> Result<f64, ServiceError> {
        let paths = self.paths.find_all_by_course(course_id).await?;
        if paths.is_empty() {
            return Ok(0.0);
        }
        let total: i64 = paths.iter().map(|lp| lp.progress as i64).sum();
        Ok(total as f64 / paths.len() as f64)
    }
}
