//! Error types for the phyloflow engine.
//!
//! One taxonomy covers the whole engine: input validation, process spawning
//! and execution, dependency resolution, cancellation, and filesystem work.
//! Expected conditions (a tool that is simply not installed) are modelled as
//! values, never as errors; see [`crate::deps::DependencyStatus`].

use thiserror::Error;

/// Upper bound on stderr text retained inside error values.
///
/// Verbose tools can produce megabytes of diagnostics; only the tail is
/// useful for post-mortem and it must not grow error values unboundedly.
pub const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// The main error type for phyloflow operations.
#[derive(Debug, Error)]
pub enum PhyloflowError {
    /// Malformed or missing run inputs, detected before anything is spawned.
    #[error("invalid run input: {0}")]
    Validation(String),

    /// The execution environment could not start the requested process.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// The program (or shell) that could not be started.
        program: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A process started but exited with a non-success code.
    #[error("command `{command}` exited with {}{}", exit_label(.exit_code), stderr_suffix(.stderr_tail))]
    ProcessExecution {
        /// The rendered command line that was executed.
        command: String,
        /// Exit code, `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
        /// Bounded tail of the captured stderr.
        stderr_tail: String,
    },

    /// Required dependencies remain unresolved after remediation.
    #[error("unresolved dependencies: {}", .names.join(", "))]
    DependencyMissing {
        /// The dependency names that are still missing.
        names: Vec<String>,
    },

    /// The operation was cancelled (explicitly or by timeout).
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A stage failed, carrying enough context to diagnose without re-running.
    #[error("stage '{stage}' failed running `{command}`: {source}")]
    StageFailed {
        /// The failing stage's name.
        stage: String,
        /// The stage's built command line.
        command: String,
        /// The underlying failure.
        #[source]
        source: Box<PhyloflowError>,
    },

    /// A run is already active; the engine executes one pipeline at a time.
    #[error("a pipeline run is already active")]
    RunActive,

    /// Filesystem operation failed (directory creation, archiving paths).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-internal failure (worker task died unexpectedly).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PhyloflowError {
    /// Returns true when the error represents cancellation rather than failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The bounded stderr tail, when the error carries one.
    #[must_use]
    pub fn stderr_tail(&self) -> Option<&str> {
        match self {
            Self::ProcessExecution { stderr_tail, .. } => Some(stderr_tail),
            Self::StageFailed { source, .. } => source.stderr_tail(),
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}

fn stderr_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {}", tail.trim_end())
    }
}

/// Truncates stderr text to the last [`STDERR_TAIL_BYTES`] bytes on a char
/// boundary.
#[must_use]
pub fn stderr_tail(stderr: &str) -> String {
    if stderr.len() <= STDERR_TAIL_BYTES {
        return stderr.to_string();
    }
    let mut start = stderr.len() - STDERR_TAIL_BYTES;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    stderr[start..].to_string()
}
