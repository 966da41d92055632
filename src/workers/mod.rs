//! Background execution of progress recomputations.
//!
//! Result changes, lecture completions and competency edits enqueue a
//! `ProgressTrigger`; a single task works through the queue in arrival order
//! so the request path never waits for recomputation.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::mastery::LearningObject;
use crate::services::{CompetencyProgressService, LearningObjectLinks, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProgressTrigger {
    /// A learner's result or completion changed.
    LearningObjectForUsers {
        object: LearningObject,
        user_ids: Vec<i64>,
    },
    /// A learning object changed for everybody with existing progress.
    LearningObject { object: LearningObject },
    Competency { competency_id: i64 },
    /// A competency was created or re-linked; refresh every learner of its course.
    CompetencyForCourse { competency_id: i64 },
    UpdatedLearningObject {
        original: LearningObjectLinks,
        updated: Option<LearningObjectLinks>,
    },
}

impl ProgressTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LearningObjectForUsers { .. } => "learning_object_for_users",
            Self::LearningObject { .. } => "learning_object",
            Self::Competency { .. } => "competency",
            Self::CompetencyForCourse { .. } => "competency_for_course",
            Self::UpdatedLearningObject { .. } => "updated_learning_object",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub triggers: u64,
    pub failed: u64,
    pub states_updated: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("progress worker stopped")]
    Stopped,
    #[error("progress queue full")]
    QueueFull,
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct ProgressUpdateWorker {
    tx: mpsc::Sender<ProgressTrigger>,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<WorkerStats>,
}

impl ProgressUpdateWorker {
    /// Spawns the worker task on the current tokio runtime.
    pub fn start(service: CompetencyProgressService, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run(service, rx, shutdown_rx));
        info!(capacity, "progress update worker started");
        Self {
            tx,
            shutdown_tx,
            handle,
        }
    }

    pub async fn submit(&self, trigger: ProgressTrigger) -> Result<(), WorkerError> {
        self.tx.send(trigger).await.map_err(|_| WorkerError::Stopped)
    }

    pub fn try_submit(&self, trigger: ProgressTrigger) -> Result<(), WorkerError> {
        self.tx.try_send(trigger).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => WorkerError::Stopped,
        })
    }

    /// Stops the worker once the triggers queued so far are processed.
    pub async fn shutdown(self) -> Result<WorkerStats, WorkerError> {
        let _ = self.shutdown_tx.send(());
        drop(self.tx);
        let stats = self.handle.await?;
        info!(
            triggers = stats.triggers,
            failed = stats.failed,
            states_updated = stats.states_updated,
            "progress update worker stopped"
        );
        Ok(stats)
    }
}

async fn run(
    service: CompetencyProgressService,
    mut rx: mpsc::Receiver<ProgressTrigger>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        tokio::select! {
            biased;
            trigger = rx.recv() => match trigger {
                Some(trigger) => process(&service, trigger, &mut stats).await,
                None => break,
            },
            _ = shutdown_rx.recv() => {
                while let Ok(trigger) = rx.try_recv() {
                    process(&service, trigger, &mut stats).await;
                }
                break;
            }
        }
    }
    stats
}

async fn process(service: &CompetencyProgressService, trigger: ProgressTrigger, stats: &mut WorkerStats) {
    let kind = trigger.as_str();
    stats.triggers += 1;
    match execute(service, trigger).await {
        Ok(updated) => {
            stats.states_updated += updated as u64;
            debug!(trigger = kind, updated, "progress trigger processed");
        }
        Err(e) => {
            stats.failed += 1;
            error!(trigger = kind, error = %e, "progress trigger failed");
        }
    }
}

pub async fn execute(
    service: &CompetencyProgressService,
    trigger: ProgressTrigger,
) -> Result<usize, ServiceError> {
    match trigger {
        ProgressTrigger::LearningObjectForUsers { object, user_ids } => {
            service
                .update_progress_by_learning_object(object, &user_ids)
                .await
        }
        ProgressTrigger::LearningObject { object } => {
            service
                .update_progress_by_learning_object_for_existing(object)
                .await
        }
        ProgressTrigger::Competency { competency_id } => {
            service.update_progress_by_competency(competency_id).await
        }
        ProgressTrigger::CompetencyForCourse { competency_id } => {
            service
                .update_progress_by_competency_and_course_users(competency_id)
                .await
        }
        ProgressTrigger::UpdatedLearningObject { original, updated } => {
            service
                .update_progress_for_updated_learning_object(&original, updated.as_ref())
                .await
        }
    }
}
