//! Sequence alignment and trimming via muscle and trimal.

use super::{StageAdapter, StageContext};
use crate::errors::PhyloflowError;
use crate::process::CommandLine;

// Concatenated marker-gene matrix file names; the phylogeny stage's
// consensus tree file keeps the trimmed-alignment stem.
const SUPERMATRIX_FASTA: &str = "SUPERMATRIX.fasta";
const SUPERMATRIX_ALN: &str = "SUPERMATRIX.aln";
const SUPERMATRIX_TRIMMED: &str = "SUPERMATRIX.trimmed.aln";

/// Builds the alignment stage's invocation: `muscle` produces the alignment
/// and `trimal -automated1` trims it, chained as one stage command.
#[derive(Debug, Clone, Default)]
pub struct AlignmentAdapter;

impl AlignmentAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StageAdapter for AlignmentAdapter {
    fn tool(&self) -> &str {
        "muscle"
    }

    fn build(&self, ctx: &StageContext) -> Result<CommandLine, PhyloflowError> {
        let input = ctx.exec_path(&ctx.input_dir.join(SUPERMATRIX_FASTA));
        let aligned = ctx.exec_path(&ctx.output_dir.join(SUPERMATRIX_ALN));
        let trimmed = ctx.exec_path(&ctx.output_dir.join(SUPERMATRIX_TRIMMED));

        let align = CommandLine::new("muscle")
            .arg("-in")
            .arg(input)
            .arg("-out")
            .arg(&aligned);
        let trim = CommandLine::new("trimal")
            .arg("-in")
            .arg(aligned)
            .arg("-out")
            .arg(trimmed)
            .arg("-automated1");

        Ok(align.and_then(&trim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{layer_context, unix_context};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_chains_align_and_trim() {
        let cmd = AlignmentAdapter::new().build(&unix_context()).unwrap();
        assert_eq!(
            cmd.rendered(),
            "muscle -in /runs/demo/in/SUPERMATRIX.fasta -out /runs/demo/out/SUPERMATRIX.aln \
             && trimal -in /runs/demo/out/SUPERMATRIX.aln -out /runs/demo/out/SUPERMATRIX.trimmed.aln -automated1"
        );
    }

    #[test]
    fn test_build_translates_paths_for_layer() {
        let cmd = AlignmentAdapter::new().build(&layer_context()).unwrap();
        let rendered = cmd.rendered();
        assert!(rendered.contains("/mnt/c/runs/demo/in/SUPERMATRIX.fasta"));
        assert!(!rendered.contains(":\\"));
    }
}
