//! The single-worker pipeline orchestrator.

use super::builder::{standard_stages, RunRequest};
use super::run::{PipelineRun, RunStatus};
use super::stage::{validate_stages, StageOutcome, StageSpec};
use crate::adapters::{RunParams, StageContext, AVAILABLE_LINEAGES};
use crate::cancellation::CancelToken;
use crate::errors::{stderr_tail, PhyloflowError};
use crate::events::{RunEvent, RunOutcome};
use crate::platform::PlatformAdapter;
use crate::process::Executor;
use crate::workspace::{validate_run_inputs, RunLayout};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Run-wide settings shared by every stage invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The host the run executes on.
    pub platform: PlatformAdapter,
    /// Domain parameters threaded to the stage adapters.
    pub params: RunParams,
    /// Thread/resource budget handed to each tool.
    pub threads: usize,
    /// The results archive location, reported in the terminal event.
    pub archive_path: Option<PathBuf>,
}

impl RunContext {
    /// Creates a context with default parameters and the host's full
    /// parallelism as the thread budget.
    #[must_use]
    pub fn new(platform: PlatformAdapter) -> Self {
        let threads = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            platform,
            params: RunParams::default(),
            threads,
            archive_path: None,
        }
    }

    /// Sets the domain parameters.
    #[must_use]
    pub fn with_params(mut self, params: RunParams) -> Self {
        self.params = params;
        self
    }

    /// Sets the thread budget.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the archive path reported on success.
    #[must_use]
    pub fn with_archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }
}

/// Handle to an in-flight pipeline run.
///
/// Events arrive in the order the underlying events occurred; the
/// [`RunEvent::Finished`] event is always last. Dropping the handle does not
/// cancel the run.
#[derive(Debug)]
pub struct RunHandle {
    id: Uuid,
    events: mpsc::UnboundedReceiver<RunEvent>,
    cancel: Arc<CancelToken>,
    task: JoinHandle<PipelineRun>,
}

impl RunHandle {
    /// The run's identity.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Requests cancellation: cooperative between stages, preemptive for
    /// the active process.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    /// Receives the next event; `None` once the worker has finished and all
    /// events were consumed.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Waits for the run to reach a terminal state and returns its final
    /// snapshot.
    ///
    /// # Errors
    ///
    /// [`PhyloflowError::Internal`] if the worker task itself died.
    pub async fn wait(self) -> Result<PipelineRun, PhyloflowError> {
        self.task
            .await
            .map_err(|err| PhyloflowError::Internal(format!("run worker task failed: {err}")))
    }
}

/// Sequences pipeline stages on a dedicated worker task.
///
/// At most one run is active at a time; starting a second run is rejected
/// with [`PhyloflowError::RunActive`] rather than queued silently.
pub struct PipelineOrchestrator {
    executor: Arc<dyn Executor>,
    active: Arc<AtomicBool>,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("active", &self.is_active())
            .finish()
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator executing through the given channel.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a run is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts a run over an explicit stage list.
    ///
    /// # Errors
    ///
    /// [`PhyloflowError::Validation`] for an invalid stage list and
    /// [`PhyloflowError::RunActive`] when a run is already executing.
    pub fn start(
        &self,
        stages: Vec<StageSpec>,
        context: RunContext,
        run: PipelineRun,
    ) -> Result<RunHandle, PhyloflowError> {
        validate_stages(&stages)?;
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PhyloflowError::RunActive);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(CancelToken::new());
        let id = run.id;
        let worker = Worker {
            executor: Arc::clone(&self.executor),
            stages,
            context,
            run,
            events: events_tx,
            cancel: Arc::clone(&cancel),
        };

        let active = Arc::clone(&self.active);
        let task = tokio::spawn(async move {
            let _guard = ActiveGuard(active);
            worker.execute().await
        });

        info!(run_id = %id, "pipeline run started");
        Ok(RunHandle {
            id,
            events: events_rx,
            cancel,
            task,
        })
    }

    /// Validates a request, creates its run workspace, and starts the
    /// standard five-stage pipeline over it.
    ///
    /// # Errors
    ///
    /// [`PhyloflowError::Validation`] for malformed inputs,
    /// [`PhyloflowError::Io`] when the workspace cannot be created, and
    /// [`PhyloflowError::RunActive`] when a run is already executing.
    pub fn start_standard(
        &self,
        request: &RunRequest,
        platform: PlatformAdapter,
    ) -> Result<RunHandle, PhyloflowError> {
        validate_run_inputs(&request.project, &request.input_dir)?;
        if !AVAILABLE_LINEAGES.contains(&request.params.lineage.as_str()) {
            return Err(PhyloflowError::Validation(format!(
                "unknown assessment lineage '{}'",
                request.params.lineage
            )));
        }

        let created_at = Utc::now();
        let layout = RunLayout::new(&request.base_dir, &request.project, created_at);
        layout.create()?;

        let mut run = PipelineRun::new(&request.project, layout.root.clone());
        run.created_at = created_at;

        let stages = standard_stages(&request.input_dir, &layout, &request.scripts_dir);
        let context = RunContext::new(platform)
            .with_params(request.params.clone())
            .with_archive_path(layout.archive_path.clone());

        self.start(stages, context, run)
    }
}

/// Clears the single-flight flag when the worker finishes or dies.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What the run loop does after one stage's outcome.
enum StageControl {
    Continue,
    FailRun { command: String, stderr_tail: String },
    CancelRun { reason: String },
}

/// The dedicated worker executing one run.
///
/// Owns the [`PipelineRun`] exclusively for its lifetime; everything
/// observers see is a copy emitted through the event channel.
struct Worker {
    executor: Arc<dyn Executor>,
    stages: Vec<StageSpec>,
    context: RunContext,
    run: PipelineRun,
    events: mpsc::UnboundedSender<RunEvent>,
    cancel: Arc<CancelToken>,
}

impl Worker {
    async fn execute(mut self) -> PipelineRun {
        self.run.transition(RunStatus::Running);
        self.emit(RunEvent::Started {
            project: self.run.project.clone(),
        });
        self.emit(RunEvent::progress(0.0, "Starting pipeline"));

        let stages = std::mem::take(&mut self.stages);
        let total = stages.len();
        for stage in &stages {
            // Cooperative check between stage boundaries.
            if self.cancel.is_cancelled() {
                let reason = self
                    .cancel
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                return self.finish_cancelled(reason);
            }

            match self.run_stage(stage, total).await {
                StageControl::Continue => {}
                StageControl::FailRun {
                    command,
                    stderr_tail,
                } => return self.finish_failed(stage, command, stderr_tail),
                StageControl::CancelRun { reason } => return self.finish_cancelled(reason),
            }
        }

        self.finish_succeeded()
    }

    async fn run_stage(&mut self, stage: &StageSpec, total: usize) -> StageControl {
        if let Err(err) = std::fs::create_dir_all(&stage.output_dir) {
            let text = PhyloflowError::Io(err).to_string();
            self.run
                .record(StageOutcome::failed(stage, None, None, text.clone(), 0));
            return self.note_failure(stage, None, text);
        }

        let ctx = StageContext {
            input_dir: stage.input_dir.clone(),
            output_dir: stage.output_dir.clone(),
            threads: self.context.threads,
            params: self.context.params.clone(),
            platform: self.context.platform.clone(),
        };
        let command = match stage.adapter.build(&ctx) {
            Ok(command) => command,
            Err(err) => {
                let text = err.to_string();
                self.run
                    .record(StageOutcome::failed(stage, None, None, text.clone(), 0));
                return self.note_failure(stage, None, text);
            }
        };

        let rendered = command.rendered();
        info!(stage = %stage.name, command = %rendered, "starting stage");
        self.emit(RunEvent::StageStarted {
            stage: stage.name.clone(),
            ordinal: stage.ordinal,
            command: rendered.clone(),
        });
        self.emit(RunEvent::progress(
            self.run.progress(),
            format!("Running {} ({}/{})", stage.name, stage.ordinal + 1, total),
        ));

        let started = Instant::now();
        match self.executor.execute(&command, &self.cancel).await {
            Ok(result) if result.success() => {
                let duration_ms = elapsed_ms(started);
                self.run.advance_progress(stage.weight);
                self.run
                    .record(StageOutcome::succeeded(stage, rendered, duration_ms));
                self.emit(RunEvent::StageCompleted {
                    stage: stage.name.clone(),
                    ordinal: stage.ordinal,
                    duration_ms,
                });
                self.emit(RunEvent::progress(
                    self.run.progress(),
                    format!("{} completed", stage.name),
                ));
                StageControl::Continue
            }
            Ok(result) => {
                let tail = stderr_tail(&result.stderr);
                self.run.record(StageOutcome::failed(
                    stage,
                    Some(rendered.clone()),
                    result.exit_code,
                    tail.clone(),
                    elapsed_ms(started),
                ));
                self.note_failure(stage, Some(rendered), tail)
            }
            Err(err) if err.is_cancelled() => {
                self.run.record(StageOutcome::cancelled(
                    stage,
                    Some(rendered),
                    elapsed_ms(started),
                ));
                let reason = match err {
                    PhyloflowError::Cancelled(reason) => reason,
                    _ => "cancelled".to_string(),
                };
                StageControl::CancelRun { reason }
            }
            Err(err) => {
                let text = err.to_string();
                self.run.record(StageOutcome::failed(
                    stage,
                    Some(rendered.clone()),
                    None,
                    text.clone(),
                    elapsed_ms(started),
                ));
                self.note_failure(stage, Some(rendered), text)
            }
        }
    }

    fn note_failure(
        &mut self,
        stage: &StageSpec,
        command: Option<String>,
        diagnostic: String,
    ) -> StageControl {
        self.emit(RunEvent::StageFailed {
            stage: stage.name.clone(),
            ordinal: stage.ordinal,
            optional: stage.optional,
            error: diagnostic.clone(),
        });

        if stage.optional {
            warn!(stage = %stage.name, error = %diagnostic, "optional stage failed, continuing");
            // A failed optional stage still contributes its weight so a
            // successful run ends at exactly 1.0.
            self.run.advance_progress(stage.weight);
            self.emit(RunEvent::progress(
                self.run.progress(),
                format!("{} failed (optional), continuing", stage.name),
            ));
            StageControl::Continue
        } else {
            StageControl::FailRun {
                command: command.unwrap_or_default(),
                stderr_tail: diagnostic,
            }
        }
    }

    fn finish_succeeded(mut self) -> PipelineRun {
        self.run.complete_progress();
        self.run.transition(RunStatus::Succeeded);
        info!(run_id = %self.run.id, "pipeline completed successfully");
        self.emit(RunEvent::progress(1.0, "Pipeline completed successfully"));
        self.emit(RunEvent::Finished {
            outcome: RunOutcome::Succeeded {
                archive: self.context.archive_path.clone(),
            },
        });
        self.run
    }

    fn finish_failed(
        mut self,
        stage: &StageSpec,
        command: String,
        stderr_tail: String,
    ) -> PipelineRun {
        // Outputs already on disk stay there for inspection or manual resume.
        self.run.transition(RunStatus::Failed);
        error!(
            run_id = %self.run.id,
            stage = %stage.name,
            command = %command,
            "pipeline failed"
        );
        self.emit(RunEvent::Finished {
            outcome: RunOutcome::Failed {
                stage: stage.name.clone(),
                command,
                stderr_tail,
            },
        });
        self.run
    }

    fn finish_cancelled(mut self, reason: String) -> PipelineRun {
        self.run.transition(RunStatus::Cancelled);
        info!(run_id = %self.run.id, reason = %reason, "pipeline cancelled");
        self.emit(RunEvent::Finished {
            outcome: RunOutcome::Cancelled { reason },
        });
        self.run
    }

    fn emit(&self, event: RunEvent) {
        // Observers may have gone away; the run itself does not care.
        let _ = self.events.send(event);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
