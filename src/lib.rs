pub mod config;
pub mod db;
pub mod logging;
pub mod mastery;
pub mod services;
pub mod workers;

pub use mastery::{
    compute_confidence, compute_mastery, compute_progress, CompetencyProgressState,
    ConfidenceReason, ExerciseMasteryRecord, ScoringParams,
};
pub use services::CompetencyProgressService;
