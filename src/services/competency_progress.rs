use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LearningPathService, ServiceError};
use crate::db::{
    CourseCompetencyProgress, LearningPathRepository, MasteryInputProvider, ProgressRepository,
};
use crate::mastery::{
    compute_mastery, CompetencyProgressState, LearningObject, LectureUnitCompletionCount,
    ScoringParams,
};

/// A learning object together with the competencies it is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningObjectLinks {
    pub object: LearningObject,
    pub competency_ids: Vec<i64>,
}

/// Recomputes and stores competency progress for learners.
#[derive(Clone)]
pub struct CompetencyProgressService {
    inputs: Arc<dyn MasteryInputProvider>,
    progress: Arc<dyn ProgressRepository>,
    learning_paths: LearningPathService,
    params: ScoringParams,
    debounce: Duration,
}

impl CompetencyProgressService {
    pub fn new(
        inputs: Arc<dyn MasteryInputProvider>,
        progress: Arc<dyn ProgressRepository>,
        paths: Arc<dyn LearningPathRepository>,
    ) -> Self {
        let learning_paths =
            LearningPathService::new(Arc::clone(&inputs), Arc::clone(&progress), paths);
        Self {
            inputs,
            progress,
            learning_paths,
            params: ScoringParams::default(),
            debounce: Duration::seconds(1),
        }
    }

    pub fn with_params(mut self, params: ScoringParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn learning_paths(&self) -> &LearningPathService {
        &self.learning_paths
    }

    /// Recomputes the progress of one learner in one competency.
    ///
    /// Returns `None` when the competency or the learner no longer exists. A
    /// state modified within the debounce window is returned as stored.
    pub async fn update_competency_progress(
        &self,
        competency_id: i64,
        user_id: i64,
    ) -> Result<Option<CompetencyProgressState>, ServiceError> {
        let Some(competency) = self.inputs.find_competency(competency_id).await? else {
            debug!(competency_id, user_id, "competency no longer exists, skipping");
            return Ok(None);
        };
        if !self.inputs.user_exists(user_id).await? {
            debug!(competency_id, user_id, "user no longer exists, skipping");
            return Ok(None);
        }

        let existing = self.progress.find(competency_id, user_id).await?;
        let now = Utc::now();
        if let Some(last_modified) = existing.as_ref().and_then(|s| s.last_modified) {
            // A window reaching past the earliest representable time covers every state.
            let within_window = now
                .checked_sub_signed(self.debounce)
                .map_or(true, |cutoff| last_modified > cutoff);
            if within_window {
                debug!(competency_id, user_id, "progress updated very recently, skipping");
                return Ok(existing);
            }
        }

        let records = self.inputs.exercise_records(competency_id, user_id).await?;
        let completed = self
            .inputs
            .count_completed_lecture_units(&competency.lecture_unit_ids, user_id)
            .await?;
        let lecture_units =
            LectureUnitCompletionCount::new(competency.lecture_unit_ids.len(), completed);

        let computation = compute_mastery(lecture_units, &records, &self.params);

        let is_new = existing.is_none();
        let mut state =
            existing.unwrap_or_else(|| CompetencyProgressState::new(competency_id, user_id));
        computation.apply_to(&mut state);
        state.last_modified = Some(now);

        if is_new {
            if !self.progress.insert_if_absent(&state).await? {
                // A parallel update created the row first with equivalent inputs.
                debug!(competency_id, user_id, "progress row created concurrently, discarding");
            }
        } else {
            self.progress.update(&state).await?;
        }

        debug!(
            competency_id,
            user_id,
            progress = state.progress,
            confidence = state.confidence,
            reason = state.confidence_reason.as_str(),
            "updated competency progress"
        );

        self.learning_paths
            .update_learning_path_progress(competency.course_id, user_id)
            .await?;

        Ok(Some(state))
    }

    /// Updates every competency linked to `object` for the given learners.
    pub async fn update_progress_by_learning_object(
        &self,
        object: LearningObject,
        user_ids: &[i64],
    ) -> Result<usize, ServiceError> {
        let competency_ids = self.inputs.competency_ids_for(object).await?;
        let mut updated = 0;
        for competency_id in competency_ids {
            debug!(competency_id, users = user_ids.len(), "updating competency progress");
            updated += self.update_users(competency_id, user_ids.iter().copied()).await;
        }
        Ok(updated)
    }

    /// Updates every competency linked to `object` for learners that already have progress there.
    pub async fn update_progress_by_learning_object_for_existing(
        &self,
        object: LearningObject,
    ) -> Result<usize, ServiceError> {
        let competency_ids = self.inputs.competency_ids_for(object).await?;
        let mut updated = 0;
        for competency_id in competency_ids {
            updated += self.update_progress_by_competency(competency_id).await?;
        }
        Ok(updated)
    }

    pub async fn update_progress_by_competency(
        &self,
        competency_id: i64,
    ) -> Result<usize, ServiceError> {
        let users = self.existing_users(competency_id).await?;
        debug!(competency_id, users = users.len(), "updating competency progress");
        Ok(self.update_users(competency_id, users).await)
    }

    /// Updates the competency for every learner of its course.
    pub async fn update_progress_by_competency_and_course_users(
        &self,
        competency_id: i64,
    ) -> Result<usize, ServiceError> {
        let Some(competency) = self.inputs.find_competency(competency_id).await? else {
            debug!(competency_id, "competency no longer exists, skipping");
            return Ok(0);
        };
        let users = self.inputs.users_in_course(competency.course_id).await?;
        debug!(competency_id, users = users.len(), "updating competency progress");
        Ok(self.update_users(competency_id, users).await)
    }

    /// Updates progress after the competency links of a learning object changed.
    ///
    /// `updated` is `None` when the learning object was deleted. Competencies
    /// that lost the object are refreshed for their existing learners; newly
    /// linked ones also for learners who already worked on the object.
    pub async fn update_progress_for_updated_learning_object(
        &self,
        original: &LearningObjectLinks,
        updated: Option<&LearningObjectLinks>,
    ) -> Result<usize, ServiceError> {
        let original_ids: BTreeSet<i64> = original.competency_ids.iter().copied().collect();
        let updated_ids: BTreeSet<i64> = updated
            .map(|links| links.competency_ids.iter().copied().collect())
            .unwrap_or_default();

        let mut count = 0;
        for competency_id in original_ids.difference(&updated_ids) {
            count += self.update_progress_by_competency(*competency_id).await?;
        }

        let added: Vec<i64> = updated_ids.difference(&original_ids).copied().collect();
        if added.is_empty() {
            return Ok(count);
        }

        let active_users = self.inputs.users_active_on(original.object).await?;
        for competency_id in added {
            let mut users: BTreeSet<i64> =
                self.existing_users(competency_id).await?.into_iter().collect();
            users.extend(active_users.iter().copied());
            debug!(competency_id, users = users.len(), "updating competency progress");
            count += self.update_users(competency_id, users).await;
        }
        Ok(count)
    }

    pub async fn delete_progress_for_competency(
        &self,
        competency_id: i64,
    ) -> Result<u64, ServiceError> {
        let deleted = self.progress.delete_all_by_competency(competency_id).await?;
        debug!(competency_id, deleted, "deleted competency progress");
        Ok(deleted)
    }

    /// Instructor view of a competency across the course.
    pub async fn competency_course_progress(
        &self,
        competency_id: i64,
    ) -> Result<CourseCompetencyProgress, ServiceError> {
        let competency = self
            .inputs
            .find_competency(competency_id)
            .await?
            .ok_or(ServiceError::CompetencyNotFound(competency_id))?;

        let number_of_students = self.progress.count_by_competency(competency_id).await?;
        let number_of_mastered_students = self
            .progress
            .count_mastered_by_competency(competency_id, competency.mastery_threshold)
            .await?;
        let average = self
            .inputs
            .average_exercise_score(&competency.exercise_ids)
            .await?
            .unwrap_or(0.0);

        Ok(CourseCompetencyProgress {
            competency_id,
            number_of_students,
            number_of_mastered_students,
            average_student_score: round_score(average),
        })
    }

    async fn existing_users(&self, competency_id: i64) -> Result<Vec<i64>, ServiceError> {
        let users: BTreeSet<i64> = self
            .progress
            .find_all_by_competency(competency_id)
            .await?
            .into_iter()
            .map(|s| s.user_id)
            .collect();
        Ok(users.into_iter().collect())
    }

    /// Failures of single learners are logged and do not stop the batch.
    async fn update_users(
        &self,
        competency_id: i64,
        user_ids: impl IntoIterator<Item = i64>,
    ) -> usize {
        let mut updated = 0;
        for user_id in user_ids {
            match self.update_competency_progress(competency_id, user_id).await {
                Ok(Some(_)) => updated += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(competency_id, user_id, error = %e, "failed to update competency progress");
                }
            }
        }
        updated
    }
}

fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}
