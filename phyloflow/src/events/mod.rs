//! Run events delivered to observers.
//!
//! The worker emits events into an unbounded channel owned by the
//! [`crate::pipeline::RunHandle`]; delivery order is the order the
//! underlying events occurred. Observers only ever see these values -
//! never references into the live run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An observable event from a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// The run moved from pending to running.
    Started {
        /// The run's project name.
        project: String,
    },
    /// Progress and status-message update.
    Progress {
        /// Cumulative progress fraction in `[0, 1]`, non-decreasing.
        fraction: f64,
        /// Human-readable status line.
        message: String,
    },
    /// A stage began executing.
    StageStarted {
        /// Stage name.
        stage: String,
        /// Stage position in the pipeline.
        ordinal: usize,
        /// The stage's built command line.
        command: String,
    },
    /// A stage finished successfully.
    StageCompleted {
        /// Stage name.
        stage: String,
        /// Stage position in the pipeline.
        ordinal: usize,
        /// Wall-clock duration in milliseconds.
        duration_ms: u64,
    },
    /// A stage failed.
    StageFailed {
        /// Stage name.
        stage: String,
        /// Stage position in the pipeline.
        ordinal: usize,
        /// Whether the failure was tolerated because the stage is optional.
        optional: bool,
        /// Diagnostic text.
        error: String,
    },
    /// The run reached a terminal state; always the final event.
    Finished {
        /// The structured terminal outcome.
        outcome: RunOutcome,
    },
}

/// The structured terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every stage ran; the results archive was produced.
    Succeeded {
        /// Path of the packaged results archive, when one was configured.
        archive: Option<PathBuf>,
    },
    /// A required stage failed; earlier stage outputs remain on disk.
    Failed {
        /// The failing stage's name.
        stage: String,
        /// The failing stage's built command.
        command: String,
        /// Bounded tail of the captured stderr (or spawn diagnostic).
        stderr_tail: String,
    },
    /// The run was cancelled by explicit request.
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },
}

impl RunEvent {
    /// Creates a progress update event.
    #[must_use]
    pub fn progress(fraction: f64, message: impl Into<String>) -> Self {
        Self::Progress {
            fraction,
            message: message.into(),
        }
    }

    /// Returns the progress fraction carried by this event, if any.
    #[must_use]
    pub fn progress_fraction(&self) -> Option<f64> {
        match self {
            Self::Progress { fraction, .. } => Some(*fraction),
            _ => None,
        }
    }

    /// Whether this is the terminal event.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_progress_event() {
        let event = RunEvent::progress(0.4, "Running alignment");
        assert_eq!(event.progress_fraction(), Some(0.4));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_event() {
        let event = RunEvent::Finished {
            outcome: RunOutcome::Cancelled {
                reason: "user".to_string(),
            },
        };
        assert!(event.is_terminal());
        assert_eq!(event.progress_fraction(), None);
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::StageFailed {
            stage: "phylogeny".to_string(),
            ordinal: 2,
            optional: false,
            error: "iqtree exited with code 2".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"stage_failed""#));

        let back: RunEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = RunOutcome::Failed {
            stage: "alignment".to_string(),
            command: "muscle -in a -out b".to_string(),
            stderr_tail: "bad fasta".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains(r#""outcome":"failed""#));
    }
}
