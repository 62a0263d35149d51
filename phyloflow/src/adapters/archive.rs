//! Results archiving: package the terminal output directory into one
//! compressed bundle.

use super::{StageAdapter, StageContext};
use crate::errors::PhyloflowError;
use crate::platform::HostKind;
use crate::process::CommandLine;
use std::path::PathBuf;

/// Builds the archiving stage's invocation.
///
/// This adapter is the packaging collaborator: all knowledge of how a
/// directory becomes one bundle (`zip -r` on POSIX hosts and inside the
/// layer, PowerShell `Compress-Archive` on native Windows) lives here, not
/// in the state machine.
#[derive(Debug, Clone)]
pub struct ArchiveAdapter {
    destination: PathBuf,
}

impl ArchiveAdapter {
    /// Creates an adapter writing the bundle to the given destination.
    #[must_use]
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    /// The bundle's destination path (host grammar).
    #[must_use]
    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }
}

impl StageAdapter for ArchiveAdapter {
    fn tool(&self) -> &str {
        "zip"
    }

    fn build(&self, ctx: &StageContext) -> Result<CommandLine, PhyloflowError> {
        let command = match ctx.platform.kind() {
            HostKind::NativeWindows => CommandLine::new("powershell.exe")
                .arg("-Command")
                .arg("Compress-Archive")
                .arg("-Path")
                .arg(format!("{}\\*", ctx.input_dir.display()))
                .arg("-DestinationPath")
                .arg(self.destination.to_string_lossy().into_owned()),
            _ => CommandLine::new("zip")
                .arg("-r")
                .arg(ctx.exec_path(&self.destination))
                .arg(".")
                .current_dir(ctx.input_dir.clone()),
        };
        Ok(command)
    }
}
