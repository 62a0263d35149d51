//! The pipeline run: identity, status, progress, and per-stage outcomes.

use super::stage::{StageOutcome, StageStatus};
use crate::errors::PhyloflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

/// Overall status of a pipeline run.
///
/// `Pending -> Running -> {Succeeded | Failed | Cancelled}`; terminal states
/// have no outgoing transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet started.
    Pending,
    /// The worker is advancing stage by stage.
    Running,
    /// Every stage ran to completion.
    Succeeded,
    /// A required stage failed.
    Failed,
    /// The run was cancelled by explicit request.
    Cancelled,
}

impl RunStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One pipeline run.
///
/// Owned exclusively by the orchestrator's worker while active; observers
/// receive clones ([`PipelineRun::snapshot`]), never references into the
/// live value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run identity.
    pub id: Uuid,
    /// The project this run belongs to.
    pub project: String,
    /// Creation instant (UTC).
    pub created_at: DateTime<Utc>,
    /// The run's isolated working directory.
    pub working_dir: PathBuf,
    /// Current overall status.
    pub status: RunStatus,
    /// Ordered per-stage outcomes recorded so far.
    pub outcomes: Vec<StageOutcome>,
    /// Monotonically non-decreasing progress fraction in `[0, 1]`.
    progress: f64,
}

impl PipelineRun {
    /// Creates a pending run.
    #[must_use]
    pub fn new(project: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project: project.into(),
            created_at: Utc::now(),
            working_dir: working_dir.into(),
            status: RunStatus::Pending,
            outcomes: Vec::new(),
            progress: 0.0,
        }
    }

    /// The current progress fraction in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Adds a completed stage's weight to the progress fraction.
    ///
    /// Progress never decreases and never exceeds 1.
    pub(crate) fn advance_progress(&mut self, weight: f64) {
        let next = (self.progress + weight).min(1.0);
        if next > self.progress {
            self.progress = next;
        }
    }

    /// Forces progress to exactly 1.0 (successful completion).
    pub(crate) fn complete_progress(&mut self) {
        self.progress = 1.0;
    }

    /// Transitions to a new status; terminal states are sinks.
    pub(crate) fn transition(&mut self, next: RunStatus) {
        if self.status.is_terminal() {
            warn!(
                run_id = %self.id,
                from = %self.status,
                to = %next,
                "ignoring transition out of terminal state"
            );
            return;
        }
        self.status = next;
    }

    /// Records a stage outcome.
    pub(crate) fn record(&mut self, outcome: StageOutcome) {
        self.outcomes.push(outcome);
    }

    /// An immutable copy for observers.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// The run's failure as an error value, when a required stage failed.
    ///
    /// Carries the failing stage's identity, its built command, and the
    /// bounded stderr tail, so the failure can be diagnosed without
    /// re-running.
    #[must_use]
    pub fn failure(&self) -> Option<PhyloflowError> {
        if self.status != RunStatus::Failed {
            return None;
        }
        self.outcomes
            .iter()
            .rev()
            .find(|outcome| outcome.status == StageStatus::Failed)
            .map(|outcome| {
                let command = outcome.command.clone().unwrap_or_default();
                PhyloflowError::StageFailed {
                    stage: outcome.stage.clone(),
                    command: command.clone(),
                    source: Box::new(PhyloflowError::ProcessExecution {
                        command,
                        exit_code: outcome.exit_code,
                        stderr_tail: outcome.stderr_tail.clone().unwrap_or_default(),
                    }),
                }
            })
    }
}
