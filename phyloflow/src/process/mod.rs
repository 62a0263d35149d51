//! Process execution: structured commands, the runner, and captured results.
//!
//! Every external invocation in the engine - pipeline stages, dependency
//! probes, install commands - flows through [`ProcessRunner`]. Commands stay
//! structured values until the runner converts them to a single shell string
//! at the spawn boundary.

mod command;
mod runner;

pub use command::CommandLine;
pub use runner::{Executor, OutputCallback, OutputStream, ProcessResult, ProcessRunner};

#[cfg(test)]
pub use runner::MockExecutor;
