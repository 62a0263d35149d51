//! Run workspace layout and input validation.
//!
//! Each run works in an isolated directory named from the project and a
//! timestamp; stage outputs are subdirectories beneath it, and the results
//! archive is written as a sibling of the working directory with the
//! project name as its stem.

use crate::errors::PhyloflowError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Timestamp format used in run directory names.
const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

fn project_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // The pattern is a literal and always compiles.
        #[allow(clippy::unwrap_used)]
        let pattern = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap();
        pattern
    })
}

/// Validates run inputs before anything is spawned or created.
///
/// # Errors
///
/// [`PhyloflowError::Validation`] for an empty or malformed project name
/// (whitespace is not allowed) or a nonexistent input directory.
pub fn validate_run_inputs(project: &str, input_dir: &Path) -> Result<(), PhyloflowError> {
    if project.is_empty() {
        return Err(PhyloflowError::Validation(
            "project name must not be empty".to_string(),
        ));
    }
    if !project_name_pattern().is_match(project) {
        return Err(PhyloflowError::Validation(format!(
            "project name '{project}' may only contain letters, digits, '.', '_' and '-'"
        )));
    }
    if !input_dir.is_dir() {
        return Err(PhyloflowError::Validation(format!(
            "input directory does not exist: {}",
            input_dir.display()
        )));
    }
    Ok(())
}

/// The on-disk layout of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    /// The isolated working directory: `<base>/<project>_<stamp>`.
    pub root: PathBuf,
    /// Completeness-assessment output directory.
    pub assessment_dir: PathBuf,
    /// Alignment output directory.
    pub alignment_dir: PathBuf,
    /// Phylogeny output directory.
    pub phylogeny_dir: PathBuf,
    /// Visualization output directory.
    pub visualization_dir: PathBuf,
    /// The results archive, a sibling of the working directory.
    pub archive_path: PathBuf,
}

impl RunLayout {
    /// Computes the layout for a run created at the given instant.
    ///
    /// Pure: nothing is touched on disk until [`RunLayout::create`].
    #[must_use]
    pub fn new(base_dir: &Path, project: &str, created_at: DateTime<Utc>) -> Self {
        let stamp = created_at.format(RUN_STAMP_FORMAT);
        let root = base_dir.join(format!("{project}_{stamp}"));
        Self {
            assessment_dir: root.join("assessment"),
            alignment_dir: root.join("alignment"),
            phylogeny_dir: root.join("phylogeny"),
            visualization_dir: root.join("visualization"),
            archive_path: base_dir.join(format!("{project}.zip")),
            root,
        }
    }

    /// Stage output directories in pipeline order.
    #[must_use]
    pub fn stage_dirs(&self) -> [&PathBuf; 4] {
        [
            &self.assessment_dir,
            &self.alignment_dir,
            &self.phylogeny_dir,
            &self.visualization_dir,
        ]
    }

    /// Creates the working directory and every stage subdirectory.
    ///
    /// # Errors
    ///
    /// [`PhyloflowError::Io`] when any directory cannot be created.
    pub fn create(&self) -> Result<(), PhyloflowError> {
        std::fs::create_dir_all(&self.root)?;
        for dir in self.stage_dirs() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 14, 30, 5).unwrap()
    }

    #[test]
    fn test_layout_naming() {
        let layout = RunLayout::new(Path::new("/home/user/phyloflow"), "yeast9", at());
        assert_eq!(
            layout.root,
            Path::new("/home/user/phyloflow/yeast9_20260806_143005")
        );
        assert_eq!(layout.assessment_dir, layout.root.join("assessment"));
        assert_eq!(
            layout.archive_path,
            Path::new("/home/user/phyloflow/yeast9.zip")
        );
    }

    #[test]
    fn test_archive_is_sibling_of_root() {
        let layout = RunLayout::new(Path::new("/base"), "proj", at());
        assert_eq!(layout.archive_path.parent(), layout.root.parent());
    }

    #[test]
    fn test_create_builds_all_directories() {
        let base = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(base.path(), "proj", at());
        layout.create().unwrap();

        assert!(layout.root.is_dir());
        for dir in layout.stage_dirs() {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
    }

    #[test]
    fn test_validate_accepts_good_inputs() {
        let input = tempfile::tempdir().unwrap();
        validate_run_inputs("yeast_9.2", input.path()).unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_project() {
        let input = tempfile::tempdir().unwrap();
        let err = validate_run_inputs("", input.path()).unwrap_err();
        assert!(matches!(err, PhyloflowError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_spaces() {
        let input = tempfile::tempdir().unwrap();
        let err = validate_run_inputs("my project", input.path()).unwrap_err();
        assert!(matches!(err, PhyloflowError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_missing_input_dir() {
        let err =
            validate_run_inputs("proj", Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, PhyloflowError::Validation(_)));
    }
}
