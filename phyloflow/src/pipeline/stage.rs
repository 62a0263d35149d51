//! Stage specifications and per-stage outcomes.

use crate::adapters::StageAdapter;
use crate::errors::PhyloflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Tolerance when checking that stage weights sum to 1.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// The execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    Pending,
    /// Stage completed successfully.
    Ok,
    /// Stage failed.
    Failed,
    /// Stage was interrupted by cancellation.
    Cancelled,
}

impl StageStatus {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ok => write!(f, "ok"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Specification for one stage in a linear pipeline.
#[derive(Clone)]
pub struct StageSpec {
    /// Position in the pipeline, starting at 0.
    pub ordinal: usize,
    /// The stage's unique name.
    pub name: String,
    /// The adapter that builds the stage's command.
    pub adapter: Arc<dyn StageAdapter>,
    /// The stage's required input directory.
    pub input_dir: PathBuf,
    /// The stage's produced output directory.
    pub output_dir: PathBuf,
    /// Fraction of total run progress contributed on completion.
    pub weight: f64,
    /// Whether failure of this stage is tolerated.
    pub optional: bool,
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("ordinal", &self.ordinal)
            .field("name", &self.name)
            .field("tool", &self.adapter.tool())
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("weight", &self.weight)
            .field("optional", &self.optional)
            .finish()
    }
}

impl StageSpec {
    /// Creates a required stage specification.
    #[must_use]
    pub fn new(
        ordinal: usize,
        name: impl Into<String>,
        adapter: Arc<dyn StageAdapter>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        weight: f64,
    ) -> Self {
        Self {
            ordinal,
            name: name.into(),
            adapter,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            weight,
            optional: false,
        }
    }

    /// Marks the stage as optional: its failure is logged, not propagated.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Validates a stage list before execution.
///
/// # Errors
///
/// [`PhyloflowError::Validation`] when the list is empty, ordinals are not
/// sequential, weights are non-positive or do not sum to 1 (within
/// [`WEIGHT_TOLERANCE`]), or a stage's output directory is not the next
/// stage's input directory.
pub fn validate_stages(stages: &[StageSpec]) -> Result<(), PhyloflowError> {
    if stages.is_empty() {
        return Err(PhyloflowError::Validation(
            "pipeline has no stages".to_string(),
        ));
    }

    for (position, stage) in stages.iter().enumerate() {
        if stage.ordinal != position {
            return Err(PhyloflowError::Validation(format!(
                "stage '{}' has ordinal {} at position {position}",
                stage.name, stage.ordinal
            )));
        }
        if stage.weight <= 0.0 {
            return Err(PhyloflowError::Validation(format!(
                "stage '{}' has non-positive weight {}",
                stage.name, stage.weight
            )));
        }
    }

    let total: f64 = stages.iter().map(|stage| stage.weight).sum();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(PhyloflowError::Validation(format!(
            "stage weights sum to {total}, expected 1"
        )));
    }

    for pair in stages.windows(2) {
        if pair[0].output_dir != pair[1].input_dir {
            return Err(PhyloflowError::Validation(format!(
                "stage '{}' output {} is not stage '{}' input {}",
                pair[0].name,
                pair[0].output_dir.display(),
                pair[1].name,
                pair[1].input_dir.display()
            )));
        }
    }

    Ok(())
}

/// The recorded outcome of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Stage position in the pipeline.
    pub ordinal: usize,
    /// Stage name.
    pub stage: String,
    /// Terminal status of the stage.
    pub status: StageStatus,
    /// The built command, when one was built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Exit code, when the process ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Bounded stderr tail, when the stage failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl StageOutcome {
    /// Records a successful stage.
    #[must_use]
    pub fn succeeded(spec: &StageSpec, command: String, duration_ms: u64) -> Self {
        Self {
            ordinal: spec.ordinal,
            stage: spec.name.clone(),
            status: StageStatus::Ok,
            command: Some(command),
            exit_code: Some(0),
            stderr_tail: None,
            duration_ms,
        }
    }

    /// Records a failed stage.
    #[must_use]
    pub fn failed(
        spec: &StageSpec,
        command: Option<String>,
        exit_code: Option<i32>,
        stderr_tail: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            ordinal: spec.ordinal,
            stage: spec.name.clone(),
            status: StageStatus::Failed,
            command,
            exit_code,
            stderr_tail: Some(stderr_tail),
            duration_ms,
        }
    }

    /// Records a stage interrupted by cancellation.
    #[must_use]
    pub fn cancelled(spec: &StageSpec, command: Option<String>, duration_ms: u64) -> Self {
        Self {
            ordinal: spec.ordinal,
            stage: spec.name.clone(),
            status: StageStatus::Cancelled,
            command,
            exit_code: None,
            stderr_tail: None,
            duration_ms,
        }
    }
}
