//! # Phyloflow
//!
//! A cross-platform orchestration engine for phylogenomic analysis
//! pipelines: completeness assessment, alignment, phylogenetic inference,
//! tree visualization, and results archiving, each stage delegated to an
//! external command-line tool.
//!
//! The engine's job is the substrate underneath the science:
//!
//! - **Process execution**: structured commands spawned through the host's
//!   shell with concurrently drained output streams, timeouts, and
//!   cancellation ([`process`])
//! - **Platform adaptation**: host flavor detection and path-grammar
//!   translation for Windows hosts running a Linux compatibility layer
//!   ([`platform`])
//! - **Dependency resolution**: probing for external tools and driving an
//!   automated install flow through apt/pip backends ([`deps`])
//! - **Stage sequencing**: a single-worker state machine with weighted
//!   progress, optional-stage tolerance, and partial-failure recovery
//!   ([`pipeline`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phyloflow::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), PhyloflowError> {
//! let platform = PlatformAdapter::detect();
//! let runner = Arc::new(ProcessRunner::new(platform.clone()));
//!
//! // Make sure the external tools are there (installing what is missing).
//! let resolver = DependencyResolver::new(runner.clone(), platform.clone());
//! resolver.ensure_all(&standard_catalog(&platform)).await?;
//!
//! // Run the standard five-stage pipeline.
//! let orchestrator = PipelineOrchestrator::new(runner);
//! let request = RunRequest::new("yeast9", "/data/genomes", "/data/runs");
//! let mut handle = orchestrator.start_standard(&request, platform)?;
//!
//! while let Some(event) = handle.next_event().await {
//!     if let RunEvent::Progress { fraction, message } = &event {
//!         println!("[{:>3.0}%] {message}", fraction * 100.0);
//!     }
//! }
//! let run = handle.wait().await?;
//! println!("finished: {}", run.status);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod cancellation;
pub mod deps;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{
        AlignmentAdapter, ArchiveAdapter, AssessmentAdapter, AssessmentMode, PhylogenyAdapter,
        RunParams, StageAdapter, StageContext, VisualizationAdapter,
    };
    pub use crate::cancellation::CancelToken;
    pub use crate::deps::{
        standard_catalog, DependencyKind, DependencyResolver, DependencySpec, DependencyStatus,
        InstallerBackend,
    };
    pub use crate::errors::PhyloflowError;
    pub use crate::events::{RunEvent, RunOutcome};
    pub use crate::pipeline::{
        standard_stages, PipelineOrchestrator, PipelineRun, RunContext, RunHandle, RunRequest,
        RunStatus, StageOutcome, StageSpec, StageStatus,
    };
    pub use crate::platform::{HostKind, PathDirection, PlatformAdapter};
    pub use crate::process::{CommandLine, Executor, ProcessResult, ProcessRunner};
    pub use crate::workspace::{validate_run_inputs, RunLayout};
}
