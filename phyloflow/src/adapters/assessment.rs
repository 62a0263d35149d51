//! Genome-completeness assessment via BUSCO.

use super::{StageAdapter, StageContext};
use crate::errors::PhyloflowError;
use crate::process::CommandLine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lineage datasets the assessment tool ships.
pub const AVAILABLE_LINEAGES: &[&str] = &[
    "bacteria",
    "eukaryota",
    "archaea",
    "metazoa",
    "fungi",
    "embryophyta",
    "protists",
    "vertebrata",
    "arthropoda",
    "mollusca",
    "nematoda",
    "actinobacteria",
    "proteobacteria",
    "firmicutes",
    "cyanobacteria",
    "ascomycota",
    "basidiomycota",
    "eudicots",
    "monocots",
];

/// Input mode for the completeness assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMode {
    /// Assembled genome input.
    Genome,
    /// Protein set input.
    Proteins,
    /// Transcriptome input.
    Transcriptome,
}

impl Default for AssessmentMode {
    fn default() -> Self {
        Self::Genome
    }
}

impl fmt::Display for AssessmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genome => write!(f, "genome"),
            Self::Proteins => write!(f, "proteins"),
            Self::Transcriptome => write!(f, "transcriptome"),
        }
    }
}

/// Builds the `busco` invocation for the assessment stage.
#[derive(Debug, Clone, Default)]
pub struct AssessmentAdapter {
    /// Explicit tool location; `busco` from the PATH when unset.
    tool_path: Option<String>,
}

impl AssessmentAdapter {
    /// Creates an adapter using `busco` from the PATH.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an explicit tool location instead of the PATH.
    #[must_use]
    pub fn with_tool_path(mut self, path: impl Into<String>) -> Self {
        self.tool_path = Some(path.into());
        self
    }
}

impl StageAdapter for AssessmentAdapter {
    fn tool(&self) -> &str {
        "busco"
    }

    fn build(&self, ctx: &StageContext) -> Result<CommandLine, PhyloflowError> {
        let run_name = ctx
            .output_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PhyloflowError::Validation(format!(
                    "assessment output directory has no name: {}",
                    ctx.output_dir.display()
                ))
            })?;
        let out_parent = ctx.output_dir.parent().ok_or_else(|| {
            PhyloflowError::Validation(format!(
                "assessment output directory has no parent: {}",
                ctx.output_dir.display()
            ))
        })?;

        let executable = self.tool_path.clone().unwrap_or_else(|| "busco".to_string());
        Ok(CommandLine::new(executable)
            .arg("-i")
            .arg(ctx.exec_input())
            .arg("-o")
            .arg(run_name)
            .arg("-m")
            .arg(ctx.params.mode.to_string())
            .arg("-l")
            .arg(&ctx.params.lineage)
            .arg("--out-path")
            .arg(ctx.exec_path(out_parent))
            .arg("--cpu")
            .arg(ctx.threads.to_string()))
    }
}
