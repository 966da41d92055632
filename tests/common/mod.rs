#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use competency_mastery::db::{ExerciseInfo, LearningPath, MemoryStore, ParticipantScore};
use competency_mastery::mastery::{CompetencyMasteryConfig, DifficultyLevel};
use competency_mastery::CompetencyProgressService;

pub const COURSE: i64 = 10;
pub const COMPETENCY: i64 = 5;
pub const MEDIUM_EXERCISE: i64 = 101;
pub const HARD_EXERCISE: i64 = 102;
pub const FIRST_UNIT: i64 = 201;
pub const SECOND_UNIT: i64 = 202;

/// Learner with both lecture units and the hard exercise done.
pub const STRONG_USER: i64 = 1;
/// Learner without any activity.
pub const IDLE_USER: i64 = 2;
/// Learner with the first lecture unit done.
pub const READER_USER: i64 = 3;

/// Course 10 with competency 5: two lecture units, a medium and a hard
/// exercise of 10 points each, mastery threshold 50.
pub fn course_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for user in [STRONG_USER, IDLE_USER, READER_USER] {
        store.add_user(user, COURSE);
    }

    store.add_exercise(ExerciseInfo {
        id: MEDIUM_EXERCISE,
        max_points: 10.0,
        difficulty: DifficultyLevel::Medium,
        is_programming: false,
    });
    store.add_exercise(ExerciseInfo {
        id: HARD_EXERCISE,
        max_points: 10.0,
        difficulty: DifficultyLevel::Hard,
        is_programming: false,
    });
    store.add_competency(CompetencyMasteryConfig {
        competency_id: COMPETENCY,
        course_id: COURSE,
        mastery_threshold: 50.0,
        lecture_unit_ids: vec![FIRST_UNIT, SECOND_UNIT],
        exercise_ids: vec![MEDIUM_EXERCISE, HARD_EXERCISE],
    });

    store.complete_lecture_unit(STRONG_USER, FIRST_UNIT);
    store.complete_lecture_unit(STRONG_USER, SECOND_UNIT);
    store.record_score(
        STRONG_USER,
        HARD_EXERCISE,
        ParticipantScore {
            last_points: 10.0,
            last_score: 100.0,
            last_modified: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            submission_count: 2,
        },
    );
    store.complete_lecture_unit(READER_USER, FIRST_UNIT);

    Arc::new(store)
}

pub fn learning_path(id: i64, user_id: i64, competency_ids: Vec<i64>) -> LearningPath {
    LearningPath {
        id,
        course_id: COURSE,
        user_id,
        competency_ids,
        progress: 0,
    }
}

/// Service reading and writing the given store, without debounce.
pub fn service(store: &Arc<MemoryStore>) -> CompetencyProgressService {
    CompetencyProgressService::new(store.clone(), store.clone(), store.clone())
        .with_debounce(Duration::zero())
}
