//! Tree visualization via the pipeline's rendering script.

use super::{StageAdapter, StageContext};
use crate::errors::PhyloflowError;
use crate::process::CommandLine;
use std::path::PathBuf;

/// Default rendering script location, relative to the process working
/// directory.
pub const DEFAULT_TREE_SCRIPT: &str = "scripts/tree.py";

/// Consensus tree file produced by the phylogeny stage.
const CONSENSUS_TREE: &str = "SUPERMATRIX.trimmed.aln.contree";

/// Builds the visualization stage's invocation
/// (`tree.py --tree <contree> [--outgroup <name>]`), rendering into the
/// stage's output directory.
#[derive(Debug, Clone)]
pub struct VisualizationAdapter {
    script: PathBuf,
}

impl Default for VisualizationAdapter {
    fn default() -> Self {
        Self {
            script: PathBuf::from(DEFAULT_TREE_SCRIPT),
        }
    }
}

impl VisualizationAdapter {
    /// Creates an adapter using the default script location.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an explicit rendering script location.
    #[must_use]
    pub fn with_script(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl StageAdapter for VisualizationAdapter {
    fn tool(&self) -> &str {
        "tree.py"
    }

    fn build(&self, ctx: &StageContext) -> Result<CommandLine, PhyloflowError> {
        let tree_file = ctx.exec_path(&ctx.input_dir.join(CONSENSUS_TREE));

        let mut command = CommandLine::new(ctx.platform.python_interpreter())
            .arg(ctx.exec_path(&self.script))
            .arg("--tree")
            .arg(tree_file)
            // The script writes its renderings into the working directory.
            .current_dir(ctx.output_dir.clone());

        if let Some(outgroup) = &ctx.params.outgroup {
            command = command.arg("--outgroup").arg(outgroup);
        }
        Ok(command)
    }
}
