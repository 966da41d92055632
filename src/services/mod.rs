pub mod competency_progress;
pub mod learning_path;

use crate::db::StoreError;

pub use competency_progress::{CompetencyProgressService, LearningObjectLinks};
pub use learning_path::LearningPathService;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("competency {0} not found")]
    CompetencyNotFound(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}
