use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::models::{ExerciseInfo, LearningPath, ParticipantScore};
use super::{LearningPathRepository, MasteryInputProvider, ProgressRepository, StoreError};
use crate::mastery::snapshot::MasterySnapshot;
use crate::mastery::{
    is_mastered, CompetencyMasteryConfig, CompetencyProgressState, ExerciseMasteryRecord,
    LearningObject,
};

#[derive(Debug, Default)]
struct Inner {
    competencies: HashMap<i64, CompetencyMasteryConfig>,
    exercises: HashMap<i64, ExerciseInfo>,
    users: HashSet<i64>,
    course_users: HashMap<i64, BTreeSet<i64>>,
    scores: HashMap<(i64, i64), ParticipantScore>,
    completions: HashSet<(i64, i64)>,
    progress: HashMap<(i64, i64), CompetencyProgressState>,
    learning_paths: HashMap<i64, LearningPath>,
}

/// In-process store backing every persistence trait.
///
/// Score and progress keys are `(user_id, exercise_id)` and
/// `(competency_id, user_id)` respectively.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding exactly the learner, competency and results of a snapshot.
    ///
    /// Lecture units get the ids `1..=total`; the first `completed` of them
    /// count as completed.
    pub fn from_snapshot(snapshot: &MasterySnapshot) -> Self {
        let store = Self::new();
        store.add_user(snapshot.user_id, snapshot.course_id);

        let lecture_unit_ids: Vec<i64> = (1..=snapshot.lecture_units.total as i64).collect();
        for lecture_unit_id in lecture_unit_ids.iter().take(snapshot.lecture_units.completed) {
            store.complete_lecture_unit(snapshot.user_id, *lecture_unit_id);
        }

        for record in &snapshot.exercises {
            store.add_exercise(ExerciseInfo {
                id: record.exercise_id,
                max_points: record.max_points,
                difficulty: record.difficulty,
                is_programming: record.is_programming,
            });
            if let Some(attempt) = record.scored() {
                store.record_score(
                    snapshot.user_id,
                    record.exercise_id,
                    ParticipantScore {
                        last_points: attempt.points,
                        last_score: attempt.score,
                        last_modified: attempt.modified,
                        submission_count: attempt.submission_count,
                    },
                );
            }
        }

        store.add_competency(CompetencyMasteryConfig {
            competency_id: snapshot.competency_id,
            course_id: snapshot.course_id,
            mastery_threshold: snapshot.mastery_threshold,
            lecture_unit_ids,
            exercise_ids: snapshot.exercises.iter().map(|r| r.exercise_id).collect(),
        });
        store
    }

    pub fn add_user(&self, user_id: i64, course_id: i64) {
        let mut inner = self.inner.write();
        inner.users.insert(user_id);
        inner.course_users.entry(course_id).or_default().insert(user_id);
    }

    pub fn remove_user(&self, user_id: i64) {
        let mut inner = self.inner.write();
        inner.users.remove(&user_id);
        for members in inner.course_users.values_mut() {
            members.remove(&user_id);
        }
    }

    pub fn add_exercise(&self, exercise: ExerciseInfo) {
        self.inner.write().exercises.insert(exercise.id, exercise);
    }

    pub fn add_competency(&self, competency: CompetencyMasteryConfig) {
        self.inner
            .write()
            .competencies
            .insert(competency.competency_id, competency);
    }

    pub fn remove_competency(&self, competency_id: i64) {
        self.inner.write().competencies.remove(&competency_id);
    }

    pub fn link_exercise(&self, competency_id: i64, exercise_id: i64) {
        if let Some(competency) = self.inner.write().competencies.get_mut(&competency_id) {
            if !competency.exercise_ids.contains(&exercise_id) {
                competency.exercise_ids.push(exercise_id);
            }
        }
    }

    pub fn record_score(&self, user_id: i64, exercise_id: i64, score: ParticipantScore) {
        self.inner.write().scores.insert((user_id, exercise_id), score);
    }

    pub fn complete_lecture_unit(&self, user_id: i64, lecture_unit_id: i64) {
        self.inner.write().completions.insert((user_id, lecture_unit_id));
    }

    pub fn add_learning_path(&self, learning_path: LearningPath) {
        self.inner
            .write()
            .learning_paths
            .insert(learning_path.id, learning_path);
    }

    pub fn learning_path(&self, learning_path_id: i64) -> Option<LearningPath> {
        self.inner.read().learning_paths.get(&learning_path_id).cloned()
    }

    pub fn progress_count(&self) -> usize {
        self.inner.read().progress.len()
    }
}

#[async_trait]
impl MasteryInputProvider for MemoryStore {
    async fn find_competency(
        &self,
        competency_id: i64,
    ) -> Result<Option<CompetencyMasteryConfig>, StoreError> {
        Ok(self.inner.read().competencies.get(&competency_id).cloned())
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.read().users.contains(&user_id))
    }

    async fn exercise_records(
        &self,
        competency_id: i64,
        user_id: i64,
    ) -> Result<Vec<ExerciseMasteryRecord>, StoreError> {
        let inner = self.inner.read();
        let Some(competency) = inner.competencies.get(&competency_id) else {
            return Ok(Vec::new());
        };

        let records = competency
            .exercise_ids
            .iter()
            .filter_map(|id| inner.exercises.get(id))
            .map(|exercise| {
                let mut record = ExerciseMasteryRecord::unattempted(
                    exercise.id,
                    exercise.max_points,
                    exercise.difficulty,
                );
                record.is_programming = exercise.is_programming;
                if let Some(score) = inner.scores.get(&(user_id, exercise.id)) {
                    record.last_points = Some(score.last_points);
                    record.last_score = Some(score.last_score);
                    record.last_modified = Some(score.last_modified);
                    record.submission_count = score.submission_count;
                }
                record
            })
            .collect();

        Ok(records)
    }

    async fn count_completed_lecture_units(
        &self,
        lecture_unit_ids: &[i64],
        user_id: i64,
    ) -> Result<usize, StoreError> {
        let inner = self.inner.read();
        let unique: HashSet<i64> = lecture_unit_ids.iter().copied().collect();
        Ok(unique
            .into_iter()
            .filter(|id| inner.completions.contains(&(user_id, *id)))
            .count())
    }

    async fn competency_ids_for(&self, object: LearningObject) -> Result<Vec<i64>, StoreError> {
        let inner = self.inner.read();
        let ids: BTreeSet<i64> = inner
            .competencies
            .values()
            .filter(|c| match object {
                LearningObject::Exercise(id) => c.exercise_ids.contains(&id),
                LearningObject::LectureUnit(id) => c.lecture_unit_ids.contains(&id),
            })
            .map(|c| c.competency_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn users_in_course(&self, course_id: i64) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .inner
            .read()
            .course_users
            .get(&course_id)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn users_active_on(&self, object: LearningObject) -> Result<Vec<i64>, StoreError> {
        let inner = self.inner.read();
        let users: BTreeSet<i64> = match object {
            LearningObject::Exercise(exercise_id) => inner
                .scores
                .keys()
                .filter(|(_, id)| *id == exercise_id)
                .map(|(user_id, _)| *user_id)
                .collect(),
            LearningObject::LectureUnit(lecture_unit_id) => inner
                .completions
                .iter()
                .filter(|(_, id)| *id == lecture_unit_id)
                .map(|(user_id, _)| *user_id)
                .collect(),
        };
        Ok(users.into_iter().collect())
    }

    async fn average_exercise_score(
        &self,
        exercise_ids: &[i64],
    ) -> Result<Option<f64>, StoreError> {
        let inner = self.inner.read();
        let unique: BTreeSet<i64> = exercise_ids.iter().copied().collect();
        let averages: Vec<f64> = unique
            .into_iter()
            .filter_map(|exercise_id| {
                let scores: Vec<f64> = inner
                    .scores
                    .iter()
                    .filter(|((_, id), _)| *id == exercise_id)
                    .map(|(_, score)| score.last_score)
                    .collect();
                if scores.is_empty() {
                    None
                } else {
                    Some(scores.iter().sum::<f64>() / scores.len() as f64)
                }
            })
            .collect();

        if averages.is_empty() {
            return Ok(None);
        }
        Ok(Some(averages.iter().sum::<f64>() / averages.len() as f64))
    }
}

#[async_trait]
impl ProgressRepository for MemoryStore {
    async fn find(
        &self,
        competency_id: i64,
        user_id: i64,
    ) -> Result<Option<CompetencyProgressState>, StoreError> {
        Ok(self.inner.read().progress.get(&(competency_id, user_id)).cloned())
    }

    async fn find_all_by_competency(
        &self,
        competency_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError> {
        let mut states: Vec<CompetencyProgressState> = self
            .inner
            .read()
            .progress
            .values()
            .filter(|s| s.competency_id == competency_id)
            .cloned()
            .collect();
        states.sort_by_key(|s| s.user_id);
        Ok(states)
    }

    async fn find_all_by_competencies_and_user(
        &self,
        competency_ids: &[i64],
        user_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError> {
        let inner = self.inner.read();
        let unique: BTreeSet<i64> = competency_ids.iter().copied().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| inner.progress.get(&(id, user_id)).cloned())
            .collect())
    }

    async fn insert_if_absent(&self, state: &CompetencyProgressState) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let key = (state.competency_id, state.user_id);
        if inner.progress.contains_key(&key) {
            return Ok(false);
        }
        inner.progress.insert(key, state.clone());
        Ok(true)
    }

    async fn update(&self, state: &CompetencyProgressState) -> Result<(), StoreError> {
        self.inner
            .write()
            .progress
            .insert((state.competency_id, state.user_id), state.clone());
        Ok(())
    }

    async fn delete_all_by_competency(&self, competency_id: i64) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let before = inner.progress.len();
        inner.progress.retain(|(id, _), _| *id != competency_id);
        Ok((before - inner.progress.len()) as u64)
    }

    async fn count_by_competency(&self, competency_id: i64) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .read()
            .progress
            .keys()
            .filter(|(id, _)| *id == competency_id)
            .count() as u64)
    }

    async fn count_mastered_by_competency(
        &self,
        competency_id: i64,
        mastery_threshold: f64,
    ) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .read()
            .progress
            .values()
            .filter(|s| s.competency_id == competency_id && is_mastered(s, mastery_threshold))
            .count() as u64)
    }
}

#[async_trait]
impl LearningPathRepository for MemoryStore {
    async fn find_by_course_and_user(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<Option<LearningPath>, StoreError> {
        Ok(self
            .inner
            .read()
            .learning_paths
            .values()
            .find(|lp| lp.course_id == course_id && lp.user_id == user_id)
            .cloned())
    }

    async fn find_all_by_course(&self, course_id: i64) -> Result<Vec<LearningPath>, StoreError> {
        let mut paths: Vec<LearningPath> = self
            .inner
            .read()
            .learning_paths
            .values()
            .filter(|lp| lp.course_id == course_id)
            .cloned()
            .collect();
        paths.sort_by_key(|lp| lp.id);
        Ok(paths)
    }

    async fn save_progress(&self, learning_path_id: i64, progress: i32) -> Result<(), StoreError> {
        if let Some(lp) = self.inner.write().learning_paths.get_mut(&learning_path_id) {
            lp.progress = progress;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::DifficultyLevel;
    use chrono::{TimeZone, Utc};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_user(1, 10);
        store.add_exercise(ExerciseInfo {
            id: 100,
            max_points: 10.0,
            difficulty: DifficultyLevel::Hard,
            is_programming: true,
        });
        store.add_competency(CompetencyMasteryConfig {
            competency_id: 5,
            course_id: 10,
            mastery_threshold: 80.0,
            lecture_unit_ids: vec![200, 201],
            exercise_ids: vec![100],
        });
        store
    }

    #[tokio::test]
    async fn test_exercise_records_join_scores() {
        let store = store();
        let records = store.exercise_records(5, 1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].scored().is_none());
        assert!(records[0].is_programming);

        store.record_score(
            1,
            100,
            ParticipantScore {
                last_points: 7.0,
                last_score: 70.0,
                last_modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                submission_count: 2,
            },
        );
        let records = store.exercise_records(5, 1).await.unwrap();
        assert_eq!(records[0].last_points, Some(7.0));
        assert_eq!(records[0].submission_count, 2);
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_row() {
        let store = store();
        let mut first = CompetencyProgressState::new(5, 1);
        first.progress = 40.0;
        let mut second = first.clone();
        second.progress = 90.0;

        assert!(store.insert_if_absent(&first).await.unwrap());
        assert!(!store.insert_if_absent(&second).await.unwrap());
        let stored = store.find(5, 1).await.unwrap().unwrap();
        assert_eq!(stored.progress, 40.0);
    }

    #[tokio::test]
    async fn test_from_snapshot_reproduces_inputs() {
        let snapshot = MasterySnapshot::from_json(
            r#"{
                "competencyId": 3, "courseId": 9, "userId": 4, "masteryThreshold": 60,
                "lectureUnits": {"total": 3, "completed": 2},
                "exercises": [
                    {"exerciseId": 11, "maxPoints": 20, "lastPoints": 15, "lastScore": 75,
                     "lastModified": "2024-02-01T08:00:00Z", "submissionCount": 4,
                     "isProgramming": true},
                    {"exerciseId": 12, "maxPoints": 5}
                ]
            }"#,
        )
        .unwrap();
        let store = MemoryStore::from_snapshot(&snapshot);

        let competency = store.find_competency(3).await.unwrap().unwrap();
        assert_eq!(competency.lecture_unit_ids, vec![1, 2, 3]);
        assert_eq!(
            store.count_completed_lecture_units(&competency.lecture_unit_ids, 4).await.unwrap(),
            2
        );
        let mut records = store.exercise_records(3, 4).await.unwrap();
        records.sort_by_key(|r| r.exercise_id);
        assert_eq!(records, snapshot.exercises);
    }

    #[tokio::test]
    async fn test_competency_lookup_by_learning_object() {
        let store = store();
        assert_eq!(store.competency_ids_for(LearningObject::Exercise(100)).await.unwrap(), vec![5]);
        assert_eq!(store.competency_ids_for(LearningObject::LectureUnit(201)).await.unwrap(), vec![5]);
        assert!(store.competency_ids_for(LearningObject::LectureUnit(999)).await.unwrap().is_empty());
    }
}
