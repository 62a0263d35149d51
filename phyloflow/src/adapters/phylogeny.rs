//! Phylogenetic inference via the pipeline's Python driver script.

use super::{StageAdapter, StageContext};
use crate::errors::PhyloflowError;
use crate::process::CommandLine;
use std::path::PathBuf;

/// Default driver script location, relative to the process working
/// directory.
pub const DEFAULT_PHYLO_SCRIPT: &str = "scripts/script_phylo.py";

/// Builds the phylogeny stage's invocation of the reconstruction driver
/// (`script_phylo.py -t <threads> -d <in> -o <out> [-og <outgroup>]`).
#[derive(Debug, Clone)]
pub struct PhylogenyAdapter {
    script: PathBuf,
}

impl Default for PhylogenyAdapter {
    fn default() -> Self {
        Self {
            script: PathBuf::from(DEFAULT_PHYLO_SCRIPT),
        }
    }
}

impl PhylogenyAdapter {
    /// Creates an adapter using the default script location.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an explicit driver script location.
    #[must_use]
    pub fn with_script(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl StageAdapter for PhylogenyAdapter {
    fn tool(&self) -> &str {
        "script_phylo.py"
    }

    fn build(&self, ctx: &StageContext) -> Result<CommandLine, PhyloflowError> {
        let mut command = CommandLine::new(ctx.platform.python_interpreter())
            .arg(ctx.exec_path(&self.script))
            .arg("-t")
            .arg(ctx.threads.to_string())
            .arg("-d")
            .arg(ctx.exec_input())
            .arg("-o")
            .arg(ctx.exec_output());

        if let Some(outgroup) = &ctx.params.outgroup {
            command = command.arg("-og").arg(outgroup);
        }
        Ok(command)
    }
}
