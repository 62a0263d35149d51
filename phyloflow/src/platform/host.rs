//! Host OS flavor detection and shell selection.

use super::paths::{self, PathDirection};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// The host OS flavor as seen by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    /// Linux or macOS with a POSIX shell.
    NativeUnix,
    /// Windows without a Linux compatibility layer.
    NativeWindows,
    /// Windows executing commands inside a Linux compatibility layer (WSL).
    WindowsWithLinuxLayer,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NativeUnix => write!(f, "native-unix"),
            Self::NativeWindows => write!(f, "native-windows"),
            Self::WindowsWithLinuxLayer => write!(f, "windows-with-linux-layer"),
        }
    }
}

/// Describes the host once and answers every platform-dependent question:
/// which shell runs commands, how paths must be spelled inside the execution
/// environment, and how executables are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAdapter {
    kind: HostKind,
}

impl PlatformAdapter {
    /// Detects the host flavor, probing for the Linux compatibility layer on
    /// Windows.
    ///
    /// The layer probe checks whether the layer's launcher exists on the
    /// host; absence is a normal, reportable state and never an error.
    #[must_use]
    pub fn detect() -> Self {
        let kind = if cfg!(target_os = "windows") {
            if Self::linux_layer_present() {
                HostKind::WindowsWithLinuxLayer
            } else {
                HostKind::NativeWindows
            }
        } else {
            HostKind::NativeUnix
        };
        debug!(host = %kind, "detected host platform");
        Self { kind }
    }

    /// Creates an adapter for an explicit host flavor.
    ///
    /// Used by tests and by callers that already know the host they target.
    #[must_use]
    pub const fn with_kind(kind: HostKind) -> Self {
        Self { kind }
    }

    /// The detected host flavor.
    #[must_use]
    pub const fn kind(&self) -> HostKind {
        self.kind
    }

    /// Whether commands execute inside the Linux compatibility layer.
    #[must_use]
    pub const fn uses_linux_layer(&self) -> bool {
        matches!(self.kind, HostKind::WindowsWithLinuxLayer)
    }

    /// Probes for the compatibility layer's launcher on the host.
    ///
    /// Never panics or errors: any probe failure reads as "absent".
    #[must_use]
    pub fn linux_layer_present() -> bool {
        if !cfg!(target_os = "windows") {
            return false;
        }
        std::process::Command::new("where")
            .arg("wsl.exe")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Builds the argv that hands a single shell command line to the host's
    /// command interpreter.
    #[must_use]
    pub fn shell_invocation(&self, command: &str) -> Vec<String> {
        match self.kind {
            HostKind::NativeUnix => {
                vec!["bash".to_string(), "-c".to_string(), command.to_string()]
            }
            HostKind::NativeWindows => vec![
                "cmd.exe".to_string(),
                "/c".to_string(),
                command.to_string(),
            ],
            HostKind::WindowsWithLinuxLayer => vec![
                "wsl.exe".to_string(),
                "-e".to_string(),
                "bash".to_string(),
                "-c".to_string(),
                command.to_string(),
            ],
        }
    }

    /// Translates a path between the host grammar and the execution
    /// environment's grammar.
    ///
    /// Identity unless commands actually execute inside the compatibility
    /// layer; always idempotent.
    #[must_use]
    pub fn translate_path(&self, path: &str, direction: PathDirection) -> String {
        if !self.uses_linux_layer() {
            return path.to_string();
        }
        match direction {
            PathDirection::HostToLayer => paths::host_to_layer(path),
            PathDirection::LayerToHost => paths::layer_to_host(path),
        }
    }

    /// Spells a path the way the execution environment expects it.
    ///
    /// Shorthand for the host-to-layer direction, the one stage adapters use
    /// when embedding host paths into tool command lines.
    #[must_use]
    pub fn exec_path(&self, path: &str) -> String {
        self.translate_path(path, PathDirection::HostToLayer)
    }

    /// The platform-specific executable file name for a base name.
    #[must_use]
    pub fn executable_name(&self, base: &str) -> String {
        match self.kind {
            HostKind::NativeWindows => format!("{base}.exe"),
            _ => base.to_string(),
        }
    }

    /// The Python interpreter name inside the execution environment.
    #[must_use]
    pub const fn python_interpreter(&self) -> &'static str {
        match self.kind {
            HostKind::NativeWindows => "python",
            _ => "python3",
        }
    }

    /// The command that answers "is this tool on the PATH" inside the
    /// execution environment.
    #[must_use]
    pub fn probe_command(&self, tool: &str) -> String {
        match self.kind {
            HostKind::NativeWindows => format!("where {tool}"),
            _ => format!("which {tool}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shell_invocation_native_unix() {
        let platform = PlatformAdapter::with_kind(HostKind::NativeUnix);
        assert_eq!(
            platform.shell_invocation("echo hi"),
            vec!["bash", "-c", "echo hi"]
        );
    }

    #[test]
    fn test_shell_invocation_native_windows() {
        let platform = PlatformAdapter::with_kind(HostKind::NativeWindows);
        assert_eq!(
            platform.shell_invocation("dir"),
            vec!["cmd.exe", "/c", "dir"]
        );
    }

    #[test]
    fn test_shell_invocation_linux_layer() {
        let platform = PlatformAdapter::with_kind(HostKind::WindowsWithLinuxLayer);
        assert_eq!(
            platform.shell_invocation("which busco"),
            vec!["wsl.exe", "-e", "bash", "-c", "which busco"]
        );
    }

    #[test]
    fn test_translate_path_identity_without_layer() {
        let platform = PlatformAdapter::with_kind(HostKind::NativeUnix);
        assert_eq!(
            platform.translate_path("C:\\data", PathDirection::HostToLayer),
            "C:\\data"
        );

        let platform = PlatformAdapter::with_kind(HostKind::NativeWindows);
        assert_eq!(
            platform.translate_path("C:\\data", PathDirection::HostToLayer),
            "C:\\data"
        );
    }

    #[test]
    fn test_translate_path_with_layer() {
        let platform = PlatformAdapter::with_kind(HostKind::WindowsWithLinuxLayer);
        assert_eq!(
            platform.translate_path("C:\\data\\run", PathDirection::HostToLayer),
            "/mnt/c/data/run"
        );
        assert_eq!(
            platform.translate_path("/mnt/c/data/run", PathDirection::LayerToHost),
            "C:\\data\\run"
        );
    }

    #[test]
    fn test_translate_path_idempotent() {
        let platform = PlatformAdapter::with_kind(HostKind::WindowsWithLinuxLayer);
        let once = platform.translate_path("E:\\runs\\p1", PathDirection::HostToLayer);
        let twice = platform.translate_path(&once, PathDirection::HostToLayer);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_executable_name() {
        let windows = PlatformAdapter::with_kind(HostKind::NativeWindows);
        assert_eq!(windows.executable_name("muscle"), "muscle.exe");

        let unix = PlatformAdapter::with_kind(HostKind::NativeUnix);
        assert_eq!(unix.executable_name("muscle"), "muscle");

        // Inside the layer the tool is a Linux binary.
        let layer = PlatformAdapter::with_kind(HostKind::WindowsWithLinuxLayer);
        assert_eq!(layer.executable_name("muscle"), "muscle");
    }

    #[test]
    fn test_python_interpreter() {
        assert_eq!(
            PlatformAdapter::with_kind(HostKind::NativeWindows).python_interpreter(),
            "python"
        );
        assert_eq!(
            PlatformAdapter::with_kind(HostKind::NativeUnix).python_interpreter(),
            "python3"
        );
        assert_eq!(
            PlatformAdapter::with_kind(HostKind::WindowsWithLinuxLayer).python_interpreter(),
            "python3"
        );
    }

    #[test]
    fn test_probe_command() {
        assert_eq!(
            PlatformAdapter::with_kind(HostKind::NativeWindows).probe_command("iqtree"),
            "where iqtree"
        );
        assert_eq!(
            PlatformAdapter::with_kind(HostKind::WindowsWithLinuxLayer).probe_command("iqtree"),
            "which iqtree"
        );
    }

    #[test]
    fn test_detect_never_panics() {
        let platform = PlatformAdapter::detect();
        if cfg!(target_os = "windows") {
            assert_ne!(platform.kind(), HostKind::NativeUnix);
        } else {
            assert_eq!(platform.kind(), HostKind::NativeUnix);
        }
    }

    #[test]
    fn test_host_kind_serialization() {
        let json = serde_json::to_string(&HostKind::WindowsWithLinuxLayer).unwrap();
        assert_eq!(json, r#""windows_with_linux_layer""#);
    }
}
