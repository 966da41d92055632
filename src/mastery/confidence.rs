//! Confidence multiplier for a learner's progress.
//!
//! The confidence starts at 1.0 and is shifted by three heuristics, each
//! bounded by `ScoringParams::max_heuristic`:
//! - recency: are the most recent scores better or worse than the average?
//! - difficulty: are points earned on hard exercises or mostly on easy ones?
//! - quick solve: were programming exercises solved well in few submissions?

use chrono::{DateTime, Utc};

use super::types::{
    ConfidenceBreakdown, ConfidenceReason, DifficultyLevel, ExerciseMasteryRecord, ScoredAttempt,
    ScoringParams,
};

pub fn compute_confidence(
    records: &[ExerciseMasteryRecord],
    params: &ScoringParams,
) -> ConfidenceBreakdown {
    let scored: Vec<ScoredAttempt> = records.iter().filter_map(|r| r.scored()).collect();

    let recency = recency_heuristic(&scored, params);
    let difficulty = difficulty_heuristic(&scored, records, params);
    let quick_solve = quick_solve_heuristic(&scored, params);

    let confidence = params.default_confidence + recency + difficulty + quick_solve;
    let reason = select_reason(confidence, recency, difficulty, quick_solve, params);

    ConfidenceBreakdown {
        recency,
        difficulty,
        quick_solve,
        confidence,
        reason,
    }
}

/// Position of `target` between `origin` (0.0) and `unit` (1.0).
///
/// Returns 0.0 when both ends coincide.
pub fn relative_time(origin: DateTime<Utc>, unit: DateTime<Utc>, target: DateTime<Utc>) -> f64 {
    let span = (unit - origin).num_milliseconds();
    if span == 0 {
        return 0.0;
    }
    (target - origin).num_milliseconds() as f64 / span as f64
}

pub fn recency_heuristic(scored: &[ScoredAttempt], params: &ScoringParams) -> f64 {
    if scored.len() < params.min_records_for_recency {
        return 0.0;
    }

    let (Some(earliest), Some(latest)) = (
        scored.iter().map(|s| s.modified).min(),
        scored.iter().map(|s| s.modified).max(),
    ) else {
        return 0.0;
    };

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for attempt in scored {
        let weight = relative_time(earliest, latest, attempt.modified);
        weighted_sum += attempt.score * weight;
        weight_sum += weight;
    }
    if weight_sum == 0.0 {
        return 0.0;
    }

    let weighted_average = weighted_sum / weight_sum;
    let average = scored.iter().map(|s| s.score).sum::<f64>() / scored.len() as f64;

    clamp_heuristic(weighted_average - average, params)
}

pub fn difficulty_heuristic(
    scored: &[ScoredAttempt],
    records: &[ExerciseMasteryRecord],
    params: &ScoringParams,
) -> f64 {
    if scored.is_empty() {
        return 0.0;
    }

    let achieved: f64 = scored.iter().map(|s| s.points).sum();
    let available: f64 = records.iter().map(|r| r.max_points).sum();
    if achieved == 0.0 || available == 0.0 {
        return 0.0;
    }

    let level_confidence = |level: DifficultyLevel| {
        let achieved_in_level: f64 = scored
            .iter()
            .filter(|s| s.difficulty == level)
            .map(|s| s.points)
            .sum();
        let available_in_level: f64 = records
            .iter()
            .filter(|r| r.difficulty == level)
            .map(|r| r.max_points)
            .sum();
        achieved_in_level / achieved - available_in_level / available
    };

    let easy = level_confidence(DifficultyLevel::Easy);
    let hard = level_confidence(DifficultyLevel::Hard);

    clamp_heuristic(hard - easy, params)
}

pub fn quick_solve_heuristic(scored: &[ScoredAttempt], params: &ScoringParams) -> f64 {
    let programming: Vec<&ScoredAttempt> = scored.iter().filter(|s| s.is_programming).collect();
    if programming.is_empty() {
        return 0.0;
    }

    let quickly_solved = programming
        .iter()
        .filter(|s| {
            s.score >= params.min_score_green
                && s.submission_count <= params.max_submissions_for_quick_solve
        })
        .count();

    clamp_heuristic(quickly_solved as f64 / programming.len() as f64, params)
}

/// Picks the heuristic that moved the confidence the most.
///
/// Exact ties resolve as recency, then difficulty, then quick solve.
pub fn select_reason(
    confidence: f64,
    recency: f64,
    difficulty: f64,
    quick_solve: f64,
    params: &ScoringParams,
) -> ConfidenceReason {
    if confidence < params.default_confidence - params.reason_deadzone {
        // quick solve is never negative
        if recency <= difficulty {
            ConfidenceReason::RecentScoresLower
        } else {
            ConfidenceReason::MoreEasyPoints
        }
    } else if confidence > params.default_confidence + params.reason_deadzone {
        let max = recency.max(difficulty).max(quick_solve);
        if recency == max {
            ConfidenceReason::RecentScoresHigher
        } else if difficulty == max {
            ConfidenceReason::MoreHardPoints
        } else {
            ConfidenceReason::QuicklySolvedExercises
        }
    } else {
        ConfidenceReason::NoReason
    }
}

fn clamp_heuristic(value: f64, params: &ScoringParams) -> f64 {
    value.clamp(-params.max_heuristic, params.max_heuristic)
}
