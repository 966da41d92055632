use super::types::CompetencyProgressState;

/// Progress scaled by confidence, bounded to [0, 100].
pub fn mastery(progress: f64, confidence: f64) -> f64 {
    (progress * confidence).clamp(0.0, 100.0)
}

/// Share of the mastery threshold reached, in [0, 1].
///
/// A zero threshold is met by any mastery and yields 1.0.
pub fn mastery_progress(state: &CompetencyProgressState, mastery_threshold: f64) -> f64 {
    if mastery_threshold <= 0.0 {
        return 1.0;
    }
    (state.mastery() / mastery_threshold).clamp(0.0, 1.0)
}

pub fn is_mastered(state: &CompetencyProgressState, mastery_threshold: f64) -> bool {
    state.mastery() >= mastery_threshold
}

/// Whether completing only the lecture units reaches the threshold.
///
/// Without exercises the confidence stays at 1, so mastery equals the
/// lecture share of the progress.
pub fn can_be_mastered_without_exercises(
    lecture_unit_count: usize,
    exercise_count: usize,
    mastery_threshold: f64,
) -> bool {
    let learning_objects = lecture_unit_count + exercise_count;
    if learning_objects == 0 {
        return true;
    }
    let achievable = lecture_unit_count as f64 / learning_objects as f64 * 100.0;
    achievable >= mastery_threshold
}
