//! Assembly of the standard five-stage pipeline.

use super::stage::StageSpec;
use crate::adapters::{
    AlignmentAdapter, ArchiveAdapter, AssessmentAdapter, PhylogenyAdapter, RunParams,
    VisualizationAdapter,
};
use crate::workspace::RunLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A validated request to run the standard pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Project name; becomes the run directory and archive stem.
    pub project: String,
    /// Directory containing the input genome assemblies.
    pub input_dir: PathBuf,
    /// Directory under which run working directories are created.
    pub base_dir: PathBuf,
    /// Directory holding the pipeline's driver scripts.
    pub scripts_dir: PathBuf,
    /// Domain parameters threaded to the stage adapters.
    pub params: RunParams,
}

impl RunRequest {
    /// Creates a request with default parameters and script location.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        input_dir: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project: project.into(),
            input_dir: input_dir.into(),
            base_dir: base_dir.into(),
            scripts_dir: PathBuf::from("scripts"),
            params: RunParams::default(),
        }
    }

    /// Sets the domain parameters.
    #[must_use]
    pub fn with_params(mut self, params: RunParams) -> Self {
        self.params = params;
        self
    }

    /// Sets the driver-script directory.
    #[must_use]
    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }
}

/// Builds the standard stage list over a run layout.
///
/// Fixed order: assessment, alignment, phylogeny, visualization, archive;
/// each stage's output directory is the next stage's input directory, and
/// the weights sum to 1. Visualization is optional: a run without a
/// rendered tree is still a complete analysis.
#[must_use]
pub fn standard_stages(
    input_dir: &Path,
    layout: &RunLayout,
    scripts_dir: &Path,
) -> Vec<StageSpec> {
    vec![
        StageSpec::new(
            0,
            "assessment",
            Arc::new(AssessmentAdapter::new()),
            input_dir,
            &layout.assessment_dir,
            0.3,
        ),
        StageSpec::new(
            1,
            "alignment",
            Arc::new(AlignmentAdapter::new()),
            &layout.assessment_dir,
            &layout.alignment_dir,
            0.15,
        ),
        StageSpec::new(
            2,
            "phylogeny",
            Arc::new(PhylogenyAdapter::with_script(
                scripts_dir.join("script_phylo.py"),
            )),
            &layout.alignment_dir,
            &layout.phylogeny_dir,
            0.25,
        ),
        StageSpec::new(
            3,
            "visualization",
            Arc::new(VisualizationAdapter::with_script(scripts_dir.join("tree.py"))),
            &layout.phylogeny_dir,
            &layout.visualization_dir,
            0.2,
        )
        .optional(),
        StageSpec::new(
            4,
            "archive",
            Arc::new(ArchiveAdapter::new(layout.archive_path.clone())),
            &layout.visualization_dir,
            &layout.root,
            0.1,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{validate_stages, WEIGHT_TOLERANCE};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn stages() -> Vec<StageSpec> {
        let layout = RunLayout::new(Path::new("/base"), "proj", Utc::now());
        standard_stages(Path::new("/data/genomes"), &layout, Path::new("/opt/scripts"))
    }

    #[test]
    fn test_standard_stages_validate() {
        validate_stages(&stages()).unwrap();
    }

    #[test]
    fn test_standard_order_is_fixed() {
        let names: Vec<String> = stages().into_iter().map(|stage| stage.name).collect();
        assert_eq!(
            names,
            vec![
                "assessment",
                "alignment",
                "phylogeny",
                "visualization",
                "archive"
            ]
        );
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = stages().iter().map(|stage| stage.weight).sum();
        assert!((total - 1.0).abs() < WEIGHT_TOLERANCE);
    }

    #[test]
    fn test_outputs_chain_into_inputs() {
        let stages = stages();
        for pair in stages.windows(2) {
            assert_eq!(pair[0].output_dir, pair[1].input_dir);
        }
    }

    #[test]
    fn test_only_visualization_is_optional() {
        let optional: Vec<String> = stages()
            .into_iter()
            .filter(|stage| stage.optional)
            .map(|stage| stage.name)
            .collect();
        assert_eq!(optional, vec!["visualization"]);
    }

    #[test]
    fn test_request_builder() {
        let request = RunRequest::new("proj", "/data", "/runs")
            .with_scripts_dir("/opt/phyloflow/scripts")
            .with_params(RunParams::default().with_outgroup("E_coli"));
        assert_eq!(request.scripts_dir, Path::new("/opt/phyloflow/scripts"));
        assert_eq!(request.params.outgroup.as_deref(), Some("E_coli"));
    }
}
