mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use common::*;
use competency_mastery::db::{
    MasteryInputProvider, MemoryStore, ProgressRepository, StoreError,
};
use competency_mastery::mastery::{
    compute_mastery, CompetencyMasteryConfig, CompetencyProgressState, ConfidenceReason,
    LearningObject, LectureUnitCompletionCount, ScoringParams,
};
use competency_mastery::services::{LearningObjectLinks, ServiceError};
use competency_mastery::CompetencyProgressService;

#[tokio::test]
async fn test_strong_learner_masters_competency() {
    let store = course_store();
    let state = service(&store)
        .update_competency_progress(COMPETENCY, STRONG_USER)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.progress, 75.0);
    assert_eq!(state.confidence, 1.25);
    assert_eq!(state.confidence_reason, ConfidenceReason::MoreHardPoints);
    assert_eq!(state.mastery(), 93.75);
    assert!(state.last_modified.is_some());

    let stored = store.find(COMPETENCY, STRONG_USER).await.unwrap().unwrap();
    assert_eq!(stored, state);
}

#[tokio::test]
async fn test_idle_and_reading_learners() {
    let store = course_store();
    let service = service(&store);

    let idle = service
        .update_competency_progress(COMPETENCY, IDLE_USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(idle.progress, 0.0);
    assert_eq!(idle.confidence, 1.0);
    assert_eq!(idle.confidence_reason, ConfidenceReason::NoReason);

    let reader = service
        .update_competency_progress(COMPETENCY, READER_USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reader.progress, 25.0);
    assert_eq!(reader.confidence, 1.0);
}

#[tokio::test]
async fn test_service_matches_pure_computation() {
    let store = course_store();
    let state = service(&store)
        .update_competency_progress(COMPETENCY, STRONG_USER)
        .await
        .unwrap()
        .unwrap();

    let records = store.exercise_records(COMPETENCY, STRONG_USER).await.unwrap();
    let expected = compute_mastery(
        LectureUnitCompletionCount::new(2, 2),
        &records,
        &ScoringParams::default(),
    );
    assert_eq!(state.progress, expected.progress);
    assert_eq!(state.confidence, expected.breakdown.confidence);
    assert_eq!(state.confidence_reason, expected.breakdown.reason);
}

#[tokio::test]
async fn test_missing_competency_or_user_is_noop() {
    let store = course_store();
    let service = service(&store);

    assert!(service
        .update_competency_progress(999, STRONG_USER)
        .await
        .unwrap()
        .is_none());
    assert!(service
        .update_competency_progress(COMPETENCY, 999)
        .await
        .unwrap()
        .is_none());

    store.remove_user(READER_USER);
    assert!(service
        .update_competency_progress(COMPETENCY, READER_USER)
        .await
        .unwrap()
        .is_none());

    store.remove_competency(COMPETENCY);
    assert!(service
        .update_competency_progress(COMPETENCY, STRONG_USER)
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.progress_count(), 0);
}

#[tokio::test]
async fn test_recent_state_is_returned_unchanged() {
    let store = course_store();
    let debounced = CompetencyProgressService::new(store.clone(), store.clone(), store.clone());

    let first = debounced
        .update_competency_progress(COMPETENCY, IDLE_USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.progress, 0.0);

    store.complete_lecture_unit(IDLE_USER, FIRST_UNIT);
    let second = debounced
        .update_competency_progress(COMPETENCY, IDLE_USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, first);

    let refreshed = service(&store)
        .update_competency_progress(COMPETENCY, IDLE_USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.progress, 25.0);
}

#[tokio::test]
async fn test_unbounded_debounce_keeps_stored_state() {
    let store = course_store();
    let service = CompetencyProgressService::new(store.clone(), store.clone(), store.clone())
        .with_debounce(Duration::milliseconds(i64::MAX));

    let first = service
        .update_competency_progress(COMPETENCY, IDLE_USER)
        .await
        .unwrap()
        .unwrap();

    store.complete_lecture_unit(IDLE_USER, FIRST_UNIT);
    let second = service
        .update_competency_progress(COMPETENCY, IDLE_USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_stale_state_is_recomputed() {
    let store = course_store();
    let stale = CompetencyProgressState {
        progress: 42.0,
        last_modified: Some(Utc::now() - Duration::hours(1)),
        ..CompetencyProgressState::new(COMPETENCY, STRONG_USER)
    };
    assert!(store.insert_if_absent(&stale).await.unwrap());

    let service = CompetencyProgressService::new(store.clone(), store.clone(), store.clone());
    let state = service
        .update_competency_progress(COMPETENCY, STRONG_USER)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.progress, 75.0);
    assert!(state.last_modified > stale.last_modified);
    assert_eq!(store.progress_count(), 1);
}

/// Repository that never sees existing rows, so every update looks like a
/// first insert racing a parallel one.
struct LateReader {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl ProgressRepository for LateReader {
    async fn find(&self, _: i64, _: i64) -> Result<Option<CompetencyProgressState>, StoreError> {
        Ok(None)
    }

    async fn find_all_by_competency(
        &self,
        competency_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError> {
        self.store.find_all_by_competency(competency_id).await
    }

    async fn find_all_by_competencies_and_user(
        &self,
        competency_ids: &[i64],
        user_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError> {
        self.store
            .find_all_by_competencies_and_user(competency_ids, user_id)
            .await
    }

    async fn insert_if_absent(&self, state: &CompetencyProgressState) -> Result<bool, StoreError> {
        self.store.insert_if_absent(state).await
    }

    async fn update(&self, state: &CompetencyProgressState) -> Result<(), StoreError> {
        self.store.update(state).await
    }

    async fn delete_all_by_competency(&self, competency_id: i64) -> Result<u64, StoreError> {
        self.store.delete_all_by_competency(competency_id).await
    }

    async fn count_by_competency(&self, competency_id: i64) -> Result<u64, StoreError> {
        self.store.count_by_competency(competency_id).await
    }

    async fn count_mastered_by_competency(
        &self,
        competency_id: i64,
        mastery_threshold: f64,
    ) -> Result<u64, StoreError> {
        self.store
            .count_mastered_by_competency(competency_id, mastery_threshold)
            .await
    }
}

#[tokio::test]
async fn test_lost_first_insert_race_is_ignored() {
    let store = course_store();
    let winner = CompetencyProgressState {
        progress: 42.0,
        last_modified: Some(Utc::now()),
        ..CompetencyProgressState::new(COMPETENCY, STRONG_USER)
    };
    assert!(store.insert_if_absent(&winner).await.unwrap());

    let racing = CompetencyProgressService::new(
        store.clone(),
        Arc::new(LateReader {
            store: store.clone(),
        }),
        store.clone(),
    );
    let state = racing
        .update_competency_progress(COMPETENCY, STRONG_USER)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.progress, 75.0);
    assert_eq!(store.progress_count(), 1);
    let stored = store.find(COMPETENCY, STRONG_USER).await.unwrap().unwrap();
    assert_eq!(stored, winner);
}

#[tokio::test]
async fn test_concurrent_first_updates_leave_one_row() {
    let store = course_store();
    let service = service(&store);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .update_competency_progress(COMPETENCY, STRONG_USER)
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_some());
    }

    assert_eq!(store.progress_count(), 1);
    let stored = store.find(COMPETENCY, STRONG_USER).await.unwrap().unwrap();
    assert_eq!(stored.progress, 75.0);
}

#[tokio::test]
async fn test_learning_path_follows_mastery() {
    let store = course_store();
    store.add_competency(CompetencyMasteryConfig {
        competency_id: 6,
        course_id: COURSE,
        mastery_threshold: 50.0,
        lecture_unit_ids: vec![301],
        exercise_ids: vec![],
    });
    store.add_learning_path(learning_path(1, STRONG_USER, vec![COMPETENCY, 6]));
    store.add_learning_path(learning_path(2, IDLE_USER, vec![COMPETENCY, 6]));

    let service = service(&store);
    service
        .update_competency_progress(COMPETENCY, STRONG_USER)
        .await
        .unwrap();
    assert_eq!(store.learning_path(1).unwrap().progress, 50);

    service
        .update_competency_progress(6, STRONG_USER)
        .await
        .unwrap();
    assert_eq!(store.learning_path(1).unwrap().progress, 50);

    store.complete_lecture_unit(STRONG_USER, 301);
    service
        .update_competency_progress(6, STRONG_USER)
        .await
        .unwrap();
    assert_eq!(store.learning_path(1).unwrap().progress, 100);

    service
        .update_competency_progress(COMPETENCY, IDLE_USER)
        .await
        .unwrap();
    assert_eq!(store.learning_path(2).unwrap().progress, 0);

    let average = service
        .learning_paths()
        .average_progress_for_course(COURSE)
        .await
        .unwrap();
    assert_eq!(average, 50.0);
}

#[tokio::test]
async fn test_learning_path_without_competencies() {
    let store = course_store();
    let service = service(&store);
    let progress = service
        .learning_paths()
        .compute_progress(&learning_path(3, STRONG_USER, vec![]))
        .await
        .unwrap();
    assert_eq!(progress, 0);
}

#[tokio::test]
async fn test_update_by_learning_object() {
    let store = course_store();
    let service = service(&store);

    let updated = service
        .update_progress_by_learning_object(
            LearningObject::LectureUnit(FIRST_UNIT),
            &[STRONG_USER, READER_USER],
        )
        .await
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(store.progress_count(), 2);

    let unlinked = service
        .update_progress_by_learning_object(LearningObject::Exercise(999), &[STRONG_USER])
        .await
        .unwrap();
    assert_eq!(unlinked, 0);

    let existing = service
        .update_progress_by_learning_object_for_existing(LearningObject::Exercise(HARD_EXERCISE))
        .await
        .unwrap();
    assert_eq!(existing, 2);
}

#[tokio::test]
async fn test_update_by_competency_and_course_users() {
    let store = course_store();
    let service = service(&store);

    assert_eq!(service.update_progress_by_competency(COMPETENCY).await.unwrap(), 0);
    assert_eq!(
        service
            .update_progress_by_competency_and_course_users(COMPETENCY)
            .await
            .unwrap(),
        3
    );
    assert_eq!(service.update_progress_by_competency(COMPETENCY).await.unwrap(), 3);
    assert_eq!(
        service
            .update_progress_by_competency_and_course_users(999)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_relinked_learning_object() {
    let store = course_store();
    store.add_competency(CompetencyMasteryConfig {
        competency_id: 7,
        course_id: COURSE,
        mastery_threshold: 50.0,
        lecture_unit_ids: vec![],
        exercise_ids: vec![],
    });
    store.link_exercise(7, HARD_EXERCISE);
    let service = service(&store);
    for user in [STRONG_USER, IDLE_USER] {
        service
            .update_competency_progress(COMPETENCY, user)
            .await
            .unwrap();
    }

    let original = LearningObjectLinks {
        object: LearningObject::Exercise(HARD_EXERCISE),
        competency_ids: vec![COMPETENCY],
    };
    let updated = LearningObjectLinks {
        object: LearningObject::Exercise(HARD_EXERCISE),
        competency_ids: vec![7],
    };
    let count = service
        .update_progress_for_updated_learning_object(&original, Some(&updated))
        .await
        .unwrap();

    // Two existing learners of the unlinked competency, one active learner of the new one.
    assert_eq!(count, 3);
    let state = store.find(7, STRONG_USER).await.unwrap().unwrap();
    assert_eq!(state.progress, 100.0);
    assert!(store.find(7, IDLE_USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleted_learning_object() {
    let store = course_store();
    let service = service(&store);
    service
        .update_competency_progress(COMPETENCY, STRONG_USER)
        .await
        .unwrap();

    let original = LearningObjectLinks {
        object: LearningObject::LectureUnit(FIRST_UNIT),
        competency_ids: vec![COMPETENCY],
    };
    let count = service
        .update_progress_for_updated_learning_object(&original, None)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_competency_course_progress() {
    let store = course_store();
    let service = service(&store);
    service
        .update_progress_by_competency_and_course_users(COMPETENCY)
        .await
        .unwrap();

    let overview = service.competency_course_progress(COMPETENCY).await.unwrap();
    assert_eq!(overview.competency_id, COMPETENCY);
    assert_eq!(overview.number_of_students, 3);
    assert_eq!(overview.number_of_mastered_students, 1);
    assert_eq!(overview.average_student_score, 100.0);

    let missing = service.competency_course_progress(999).await.unwrap_err();
    assert!(matches!(missing, ServiceError::CompetencyNotFound(999)));
}

#[tokio::test]
async fn test_delete_progress_for_competency() {
    let store = course_store();
    let service = service(&store);
    service
        .update_progress_by_competency_and_course_users(COMPETENCY)
        .await
        .unwrap();

    assert_eq!(service.delete_progress_for_competency(COMPETENCY).await.unwrap(), 3);
    assert_eq!(store.progress_count(), 0);
    assert_eq!(service.delete_progress_for_competency(COMPETENCY).await.unwrap(), 0);
}
