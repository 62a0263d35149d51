//! The process runner: spawn, drain, wait, terminate.

use crate::cancellation::CancelToken;
use crate::errors::{stderr_tail, PhyloflowError};
use crate::platform::PlatformAdapter;
use crate::process::CommandLine;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Which output stream a streamed line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Callback receiving output lines as the process produces them.
pub type OutputCallback = Arc<dyn Fn(OutputStream, &str) + Send + Sync>;

/// The captured outcome of one completed process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration of the execution.
    pub duration: Duration,
}

impl ProcessResult {
    /// Whether the process terminated normally (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The sole channel through which the engine executes anything.
///
/// Implemented by [`ProcessRunner`]; the trait seam exists so the
/// orchestrator and dependency resolver can be exercised without spawning
/// real processes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs a command to completion and returns the captured result
    /// regardless of exit code.
    ///
    /// # Errors
    ///
    /// Fails with [`PhyloflowError::Spawn`] when the process cannot be
    /// started and [`PhyloflowError::Cancelled`] on timeout or cancellation.
    async fn execute(
        &self,
        command: &CommandLine,
        cancel: &CancelToken,
    ) -> Result<ProcessResult, PhyloflowError>;
}

/// Spawns one external command through the host's shell, draining both
/// output streams concurrently from the instant the process starts.
#[derive(Clone)]
pub struct ProcessRunner {
    platform: PlatformAdapter,
    timeout: Option<Duration>,
    on_output: Option<OutputCallback>,
}

impl fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("platform", &self.platform)
            .field("timeout", &self.timeout)
            .field("on_output", &self.on_output.is_some())
            .finish()
    }
}

impl ProcessRunner {
    /// Creates a runner addressing the given host.
    #[must_use]
    pub const fn new(platform: PlatformAdapter) -> Self {
        Self {
            platform,
            timeout: None,
            on_output: None,
        }
    }

    /// Sets a wall-clock timeout applied to every execution.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Installs a streaming callback invoked once per output line.
    #[must_use]
    pub fn with_output_callback(mut self, callback: OutputCallback) -> Self {
        self.on_output = Some(callback);
        self
    }

    /// The platform this runner addresses.
    #[must_use]
    pub const fn platform(&self) -> &PlatformAdapter {
        &self.platform
    }

    /// Runs a command, requiring a zero exit code.
    ///
    /// # Errors
    ///
    /// [`PhyloflowError::ProcessExecution`] on non-zero exit (carrying the
    /// rendered command and a bounded stderr tail), [`PhyloflowError::Spawn`]
    /// when the process cannot start, [`PhyloflowError::Cancelled`] on
    /// timeout or cancellation.
    pub async fn run(
        &self,
        command: &CommandLine,
        cancel: &CancelToken,
    ) -> Result<ProcessResult, PhyloflowError> {
        let result = self.execute_inner(command, cancel).await?;
        if result.success() {
            Ok(result)
        } else {
            Err(PhyloflowError::ProcessExecution {
                command: command.rendered(),
                exit_code: result.exit_code,
                stderr_tail: stderr_tail(&result.stderr),
            })
        }
    }

    /// Runs a probe command, mapping "exited zero" to `true` and every
    /// failure mode (non-zero exit, spawn failure) to `false`.
    pub async fn probe(&self, command: &CommandLine) -> bool {
        let cancel = CancelToken::new();
        match self.execute_inner(command, &cancel).await {
            Ok(result) => result.success(),
            Err(err) => {
                debug!(command = %command, error = %err, "probe could not execute");
                false
            }
        }
    }

    async fn execute_inner(
        &self,
        command: &CommandLine,
        cancel: &CancelToken,
    ) -> Result<ProcessResult, PhyloflowError> {
        if cancel.is_cancelled() {
            return Err(PhyloflowError::Cancelled(
                cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
            ));
        }

        let rendered = command.rendered();
        let argv = self.platform.shell_invocation(&rendered);
        let start = Instant::now();

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = command.working_dir() {
            cmd.current_dir(dir);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        // Own process group so a shell's children die with it on termination.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| PhyloflowError::Spawn {
            program: argv[0].clone(),
            source,
        })?;
        debug!(command = %rendered, "spawned process");

        // Both streams are drained from the instant the process starts;
        // waiting first would deadlock once the OS pipe buffer fills.
        let out_task = spawn_reader(child.stdout.take(), OutputStream::Stdout, self.on_output.clone());
        let err_task = spawn_reader(child.stderr.take(), OutputStream::Stderr, self.on_output.clone());

        // The wait future borrows the child mutably, so the select only
        // classifies the wake-up; termination happens after it ends.
        enum Waited {
            Exited(std::io::Result<std::process::ExitStatus>),
            Cancelled,
            TimedOut,
        }

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            () = cancel.cancelled() => Waited::Cancelled,
            () = sleep_or_forever(self.timeout) => Waited::TimedOut,
        };

        let status = match waited {
            Waited::Exited(status) => status?,
            Waited::Cancelled => {
                terminate(&mut child).await;
                drain(out_task, err_task).await;
                let reason = cancel.reason().unwrap_or_else(|| "cancelled".to_string());
                warn!(command = %rendered, reason = %reason, "process cancelled");
                return Err(PhyloflowError::Cancelled(reason));
            }
            Waited::TimedOut => {
                terminate(&mut child).await;
                drain(out_task, err_task).await;
                let reason = format!(
                    "timed out after {:.1}s",
                    self.timeout.unwrap_or_default().as_secs_f64()
                );
                warn!(command = %rendered, reason = %reason, "process timed out");
                return Err(PhyloflowError::Cancelled(reason));
            }
        };

        let (stdout, stderr) = drain(out_task, err_task).await;
        let result = ProcessResult {
            exit_code: status.code(),
            stdout,
            stderr,
            duration: start.elapsed(),
        };
        debug!(
            command = %rendered,
            exit_code = ?result.exit_code,
            duration_ms = %result.duration.as_millis(),
            "process finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl Executor for ProcessRunner {
    async fn execute(
        &self,
        command: &CommandLine,
        cancel: &CancelToken,
    ) -> Result<ProcessResult, PhyloflowError> {
        self.execute_inner(command, cancel).await
    }
}

fn spawn_reader<R>(
    reader: Option<R>,
    stream: OutputStream,
    callback: Option<OutputCallback>,
) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(reader) = reader else {
            return String::new();
        };
        let mut lines = BufReader::new(reader).lines();
        let mut captured = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(callback) = &callback {
                callback(stream, &line);
            }
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    })
}

async fn drain(out_task: JoinHandle<String>, err_task: JoinHandle<String>) -> (String, String) {
    let (stdout, stderr) = tokio::join!(out_task, err_task);
    (stdout.unwrap_or_default(), stderr.unwrap_or_default())
}

/// Terminates the process and, on unix, its whole process group, so that
/// children spawned through the shell wrapper do not outlive the stage.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::platform::HostKind;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn runner() -> ProcessRunner {
        ProcessRunner::new(PlatformAdapter::with_kind(HostKind::NativeUnix))
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let result = runner()
            .run(&CommandLine::from_line("echo hello"), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "hello\n");
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_run_fails_on_nonzero_exit() {
        let cmd = CommandLine::from_line("echo oops >&2; exit 3");
        let err = runner().run(&cmd, &CancelToken::new()).await.unwrap_err();

        match err {
            PhyloflowError::ProcessExecution {
                exit_code,
                stderr_tail,
                command,
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr_tail, "oops\n");
                assert!(command.contains("exit 3"));
            }
            other => panic!("expected ProcessExecution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_returns_result_on_nonzero_exit() {
        let cmd = CommandLine::from_line("exit 7");
        let result = runner()
            .execute(&cmd, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(7));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_spawn_error_when_shell_is_missing() {
        // A Windows command interpreter does not exist on a unix test host.
        let runner = ProcessRunner::new(PlatformAdapter::with_kind(HostKind::NativeWindows));
        let err = runner
            .run(&CommandLine::from_line("echo hi"), &CancelToken::new())
            .await
            .unwrap_err();

        match err {
            PhyloflowError::Spawn { program, .. } => assert_eq!(program, "cmd.exe"),
            other => panic!("expected Spawn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_synthesizes_cancelled() {
        let runner = runner().with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        let err = runner
            .run(&CommandLine::from_line("sleep 30"), &CancelToken::new())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation_terminates_process() {
        let runner = runner();
        let cancel = Arc::new(CancelToken::new());

        let canceller = {
            let cancel = Arc::clone(&cancel);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel("user requested");
            })
        };

        let start = Instant::now();
        let err = runner
            .run(&CommandLine::from_line("sleep 30"), &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        match err {
            PhyloflowError::Cancelled(reason) => assert_eq!(reason, "user requested"),
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation_kills_shell_children() {
        // The sleep is a child of the wrapping shell; group kill must reach it.
        let runner = runner();
        let cancel = Arc::new(CancelToken::new());

        let canceller = {
            let cancel = Arc::clone(&cancel);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel("stop");
            })
        };

        let start = Instant::now();
        let err = runner
            .run(&CommandLine::from_line("sleep 30; echo done"), &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_streaming_callback_receives_lines() {
        let seen: Arc<Mutex<Vec<(OutputStream, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runner = runner().with_output_callback(Arc::new(move |stream, line| {
            sink.lock().push((stream, line.to_string()));
        }));

        runner
            .run(
                &CommandLine::from_line("echo one; echo two; echo warn >&2"),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        let seen = seen.lock();
        let stdout: Vec<&str> = seen
            .iter()
            .filter(|(s, _)| *s == OutputStream::Stdout)
            .map(|(_, l)| l.as_str())
            .collect();
        assert_eq!(stdout, vec!["one", "two"]);
        assert!(seen
            .iter()
            .any(|(s, l)| *s == OutputStream::Stderr && l == "warn"));
    }

    #[tokio::test]
    async fn test_probe_maps_exit_code_to_bool() {
        assert!(runner().probe(&CommandLine::from_line("true")).await);
        assert!(!runner().probe(&CommandLine::from_line("false")).await);
    }

    #[tokio::test]
    async fn test_working_dir_applies() {
        let dir = tempfile::tempdir().unwrap();
        let result = runner()
            .run(
                &CommandLine::from_line("pwd").current_dir(dir.path()),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        let reported = result.stdout.trim();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(reported).canonicalize().unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        // Well past a pipe buffer on both streams.
        let cmd = CommandLine::from_line(
            "head -c 1048576 /dev/zero | tr '\\0' 'a'; head -c 1048576 /dev/zero | tr '\\0' 'b' >&2",
        );
        let result = runner().execute(&cmd, &CancelToken::new()).await.unwrap();

        assert!(result.stdout.len() >= 1_048_576);
        assert!(result.stderr.len() >= 1_048_576);
    }
}
