//! Progress of a learner inside a competency.
//!
//! Exercise progress is the share of points achieved over all linked
//! exercises, lecture progress the share of completed lecture units. Both are
//! weighted by how many learning objects of each kind the competency links.

use super::types::{ExerciseMasteryRecord, LectureUnitCompletionCount};

/// Progress value when a competency links no learning objects at all.
pub const EMPTY_COMPETENCY_PROGRESS: f64 = 100.0;

pub fn compute_progress(
    lecture_units: LectureUnitCompletionCount,
    records: &[ExerciseMasteryRecord],
) -> f64 {
    let lecture_count = lecture_units.total as f64;
    let exercise_count = records.len() as f64;
    let learning_objects = lecture_count + exercise_count;
    if learning_objects == 0.0 {
        return EMPTY_COMPETENCY_PROGRESS;
    }

    let exercise_progress = exercise_progress(records);
    let lecture_progress = if lecture_units.total > 0 {
        100.0 * lecture_units.completed as f64 / lecture_count
    } else {
        0.0
    };

    let weighted_exercise = exercise_count / learning_objects * exercise_progress;
    let weighted_lecture = lecture_count / learning_objects * lecture_progress;

    // Bonus points can push the raw value above 100.
    (weighted_exercise + weighted_lecture).round().clamp(0.0, 100.0)
}

/// Achieved points over available points, in percent. Unclamped.
pub fn exercise_progress(records: &[ExerciseMasteryRecord]) -> f64 {
    let achieved: f64 = records.iter().map(|r| r.last_points.unwrap_or(0.0)).sum();
    let max_points: f64 = records.iter().map(|r| r.max_points).sum();
    if max_points > 0.0 {
        achieved / max_points * 100.0
    } else {
        0.0
    }
}
