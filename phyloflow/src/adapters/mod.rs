//! Stage adapters: collaborators that build one tool's concrete command
//! line and working-directory layout.
//!
//! The orchestrator never interprets tool-specific flags; it hands an
//! adapter the resolved directories, thread budget, and domain parameters,
//! and receives an opaque structured command back.

mod alignment;
mod archive;
mod assessment;
mod phylogeny;
mod visualize;

pub use alignment::AlignmentAdapter;
pub use archive::ArchiveAdapter;
pub use assessment::{AssessmentAdapter, AssessmentMode, AVAILABLE_LINEAGES};
pub use phylogeny::PhylogenyAdapter;
pub use visualize::VisualizationAdapter;

use crate::errors::PhyloflowError;
use crate::platform::PlatformAdapter;
use crate::process::CommandLine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Domain parameters threaded through to the stage adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Organism used to root the tree, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgroup: Option<String>,
    /// Completeness-assessment lineage dataset.
    pub lineage: String,
    /// Completeness-assessment input mode.
    pub mode: AssessmentMode,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            outgroup: None,
            lineage: "bacteria".to_string(),
            mode: AssessmentMode::Genome,
        }
    }
}

impl RunParams {
    /// Sets the outgroup organism.
    #[must_use]
    pub fn with_outgroup(mut self, outgroup: impl Into<String>) -> Self {
        self.outgroup = Some(outgroup.into());
        self
    }

    /// Sets the assessment lineage dataset.
    #[must_use]
    pub fn with_lineage(mut self, lineage: impl Into<String>) -> Self {
        self.lineage = lineage.into();
        self
    }

    /// Sets the assessment input mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: AssessmentMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Everything an adapter needs to build one stage invocation.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Resolved input directory (host grammar).
    pub input_dir: PathBuf,
    /// Resolved output directory (host grammar).
    pub output_dir: PathBuf,
    /// Thread/resource budget for the tool.
    pub threads: usize,
    /// Domain parameters.
    pub params: RunParams,
    /// The host the command will execute on.
    pub platform: PlatformAdapter,
}

impl StageContext {
    /// The input directory spelled for the execution environment.
    #[must_use]
    pub fn exec_input(&self) -> String {
        self.exec_path(&self.input_dir)
    }

    /// The output directory spelled for the execution environment.
    #[must_use]
    pub fn exec_output(&self) -> String {
        self.exec_path(&self.output_dir)
    }

    /// Spells any host path for the execution environment.
    #[must_use]
    pub fn exec_path(&self, path: &Path) -> String {
        self.platform.exec_path(&path.to_string_lossy())
    }
}

/// Builds the concrete command line for one pipeline stage.
///
/// Implementations are pure command-template builders: they never spawn
/// anything and never inspect tool output.
pub trait StageAdapter: Send + Sync + std::fmt::Debug {
    /// The external tool this adapter wraps, for diagnostics.
    fn tool(&self) -> &str;

    /// Builds the stage's command for one invocation.
    ///
    /// # Errors
    ///
    /// [`PhyloflowError::Validation`] when the context cannot produce a
    /// well-formed command (e.g. an output directory with no parent).
    fn build(&self, ctx: &StageContext) -> Result<CommandLine, PhyloflowError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::platform::HostKind;

    pub(crate) fn context(platform: PlatformAdapter) -> StageContext {
        StageContext {
            input_dir: PathBuf::from("/runs/demo/in"),
            output_dir: PathBuf::from("/runs/demo/out"),
            threads: 8,
            params: RunParams::default(),
            platform,
        }
    }

    pub(crate) fn unix_context() -> StageContext {
        context(PlatformAdapter::with_kind(HostKind::NativeUnix))
    }

    pub(crate) fn layer_context() -> StageContext {
        StageContext {
            input_dir: PathBuf::from("C:\\runs\\demo\\in"),
            output_dir: PathBuf::from("C:\\runs\\demo\\out"),
            threads: 8,
            params: RunParams::default(),
            platform: PlatformAdapter::with_kind(HostKind::WindowsWithLinuxLayer),
        }
    }
}
