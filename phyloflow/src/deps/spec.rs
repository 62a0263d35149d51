//! Dependency declarations and installer backends.

use crate::platform::{HostKind, PlatformAdapter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What kind of thing a dependency is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// A standalone executable on the PATH.
    NativeTool,
    /// A package importable by the interpreter.
    InterpreterPackage,
}

/// A package-management mechanism used to remediate a missing dependency.
///
/// The enum ordering is load-bearing: system-level backends sort before
/// interpreter-level ones, and remediation installs groups in that order
/// because interpreter packages may need system libraries already present.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InstallerBackend {
    /// The system package manager (apt, used natively and inside the layer).
    Apt,
    /// The interpreter package manager.
    Pip,
}

impl fmt::Display for InstallerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apt => write!(f, "apt"),
            Self::Pip => write!(f, "pip"),
        }
    }
}

impl InstallerBackend {
    /// Whether this backend installs system-level packages.
    #[must_use]
    pub const fn is_system_level(&self) -> bool {
        matches!(self, Self::Apt)
    }

    /// Whether the backend has a defined procedure on the given host.
    #[must_use]
    pub const fn available_on(&self, host: HostKind) -> bool {
        match self {
            Self::Apt => matches!(
                host,
                HostKind::NativeUnix | HostKind::WindowsWithLinuxLayer
            ),
            Self::Pip => true,
        }
    }

    /// The single install invocation for a homogeneous package group.
    ///
    /// Backends are never mixed in one invocation: package managers expect
    /// homogeneous argument lists and fail atomically on partial matches.
    #[must_use]
    pub fn install_command(&self, packages: &[String]) -> String {
        let list = packages.join(" ");
        match self {
            Self::Apt => format!("sudo apt-get update && sudo apt-get install -y {list}"),
            Self::Pip => format!("pip install {list}"),
        }
    }
}

/// Declares one required external dependency: how to probe for it and which
/// backends can install it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    /// The dependency's name, unique across a catalog.
    pub name: String,
    /// What kind of dependency this is.
    pub kind: DependencyKind,
    /// Shell command whose zero exit means "installed".
    pub probe: String,
    /// Package identifier per backend able to provide this dependency.
    /// Empty when no automated procedure exists.
    #[serde(default)]
    pub install: BTreeMap<InstallerBackend, String>,
    /// Guidance for dependencies that need manual installation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_hint: Option<String>,
}

impl DependencySpec {
    /// Declares a native tool probed through the platform's PATH lookup.
    #[must_use]
    pub fn native_tool(name: impl Into<String>, platform: &PlatformAdapter) -> Self {
        let name = name.into();
        let probe = platform.probe_command(&name);
        Self {
            name,
            kind: DependencyKind::NativeTool,
            probe,
            install: BTreeMap::new(),
            manual_hint: None,
        }
    }

    /// Declares an interpreter package probed by importing its module.
    ///
    /// Distribution and import names differ for some packages (`biopython`
    /// ships module `Bio`), hence the separate `module` argument.
    #[must_use]
    pub fn interpreter_package(
        name: impl Into<String>,
        module: &str,
        platform: &PlatformAdapter,
    ) -> Self {
        let python = platform.python_interpreter();
        Self {
            name: name.into(),
            kind: DependencyKind::InterpreterPackage,
            probe: format!("{python} -c \"import {module}\""),
            install: BTreeMap::new(),
            manual_hint: None,
        }
    }

    /// Registers an installer backend and its package identifier.
    #[must_use]
    pub fn installable_via(
        mut self,
        backend: InstallerBackend,
        package: impl Into<String>,
    ) -> Self {
        self.install.insert(backend, package.into());
        self
    }

    /// Attaches guidance for manual installation.
    #[must_use]
    pub fn with_manual_hint(mut self, hint: impl Into<String>) -> Self {
        self.manual_hint = Some(hint.into());
        self
    }

    /// Picks the preferred backend with a defined procedure on this host:
    /// system-level first, then interpreter-level.
    #[must_use]
    pub fn backend_for(&self, host: HostKind) -> Option<InstallerBackend> {
        self.install
            .keys()
            .find(|backend| backend.available_on(host))
            .copied()
    }
}

/// The measured presence of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
    /// Whether the most recent probe succeeded.
    pub installed: bool,
}

impl DependencyStatus {
    /// A status measured as present.
    #[must_use]
    pub const fn installed() -> Self {
        Self { installed: true }
    }

    /// A status measured as absent.
    #[must_use]
    pub const fn missing() -> Self {
        Self { installed: false }
    }
}

/// Name of the interpreter dependency that gates interpreter-package probes.
pub(crate) const PYTHON: &str = "python3";

/// The dependency catalog for the standard phylogenomics pipeline.
#[must_use]
pub fn standard_catalog(platform: &PlatformAdapter) -> Vec<DependencySpec> {
    // The interpreter itself probes under its platform-specific name.
    let python = DependencySpec {
        probe: platform.probe_command(platform.python_interpreter()),
        ..DependencySpec::native_tool(PYTHON, platform)
    }
    .installable_via(InstallerBackend::Apt, "python3");

    vec![
        python,
        DependencySpec::native_tool("pip", platform)
            .installable_via(InstallerBackend::Apt, "python3-pip"),
        DependencySpec::native_tool("muscle", platform)
            .installable_via(InstallerBackend::Apt, "muscle"),
        DependencySpec::native_tool("trimal", platform)
            .installable_via(InstallerBackend::Apt, "trimal"),
        DependencySpec::native_tool("iqtree", platform)
            .installable_via(InstallerBackend::Apt, "iqtree"),
        DependencySpec::native_tool("raxmlHPC-PTHREADS", platform).with_manual_hint(
            "RAxML: download from https://github.com/stamatak/standard-RAxML",
        ),
        DependencySpec::interpreter_package("biopython", "Bio", platform)
            .installable_via(InstallerBackend::Pip, "biopython"),
        DependencySpec::interpreter_package("ete3", "ete3", platform)
            .installable_via(InstallerBackend::Pip, "ete3"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unix() -> PlatformAdapter {
        PlatformAdapter::with_kind(HostKind::NativeUnix)
    }

    #[test]
    fn test_backend_ordering_system_first() {
        assert!(InstallerBackend::Apt < InstallerBackend::Pip);
        assert!(InstallerBackend::Apt.is_system_level());
        assert!(!InstallerBackend::Pip.is_system_level());
    }

    #[test]
    fn test_backend_availability() {
        assert!(InstallerBackend::Apt.available_on(HostKind::NativeUnix));
        assert!(InstallerBackend::Apt.available_on(HostKind::WindowsWithLinuxLayer));
        assert!(!InstallerBackend::Apt.available_on(HostKind::NativeWindows));
        assert!(InstallerBackend::Pip.available_on(HostKind::NativeWindows));
    }

    #[test]
    fn test_install_command_is_homogeneous() {
        let cmd = InstallerBackend::Apt.install_command(&[
            "muscle".to_string(),
            "trimal".to_string(),
            "iqtree".to_string(),
        ]);
        assert_eq!(
            cmd,
            "sudo apt-get update && sudo apt-get install -y muscle trimal iqtree"
        );

        let cmd = InstallerBackend::Pip
            .install_command(&["biopython".to_string(), "ete3".to_string()]);
        assert_eq!(cmd, "pip install biopython ete3");
    }

    #[test]
    fn test_native_tool_probe() {
        let spec = DependencySpec::native_tool("muscle", &unix());
        assert_eq!(spec.probe, "which muscle");
        assert_eq!(spec.kind, DependencyKind::NativeTool);

        let windows = PlatformAdapter::with_kind(HostKind::NativeWindows);
        let spec = DependencySpec::native_tool("muscle", &windows);
        assert_eq!(spec.probe, "where muscle");
    }

    #[test]
    fn test_interpreter_package_probe_uses_import_name() {
        let spec = DependencySpec::interpreter_package("biopython", "Bio", &unix());
        assert_eq!(spec.probe, "python3 -c \"import Bio\"");

        let windows = PlatformAdapter::with_kind(HostKind::NativeWindows);
        let spec = DependencySpec::interpreter_package("biopython", "Bio", &windows);
        assert_eq!(spec.probe, "python -c \"import Bio\"");
    }

    #[test]
    fn test_backend_for_prefers_system_level() {
        let spec = DependencySpec::native_tool("demo", &unix())
            .installable_via(InstallerBackend::Pip, "demo")
            .installable_via(InstallerBackend::Apt, "demo");
        assert_eq!(spec.backend_for(HostKind::NativeUnix), Some(InstallerBackend::Apt));
        // apt has no procedure on native Windows; pip remains.
        assert_eq!(
            spec.backend_for(HostKind::NativeWindows),
            Some(InstallerBackend::Pip)
        );
    }

    #[test]
    fn test_standard_catalog_contents() {
        let catalog = standard_catalog(&unix());
        let names: Vec<&str> = catalog.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "python3",
                "pip",
                "muscle",
                "trimal",
                "iqtree",
                "raxmlHPC-PTHREADS",
                "biopython",
                "ete3"
            ]
        );

        let raxml = &catalog[5];
        assert!(raxml.install.is_empty());
        assert!(raxml.manual_hint.is_some());

        let ete3 = &catalog[7];
        assert_eq!(ete3.kind, DependencyKind::InterpreterPackage);
        assert_eq!(ete3.backend_for(HostKind::NativeUnix), Some(InstallerBackend::Pip));
    }

    #[test]
    fn test_python_probe_name_on_windows() {
        let windows = PlatformAdapter::with_kind(HostKind::NativeWindows);
        let catalog = standard_catalog(&windows);
        assert_eq!(catalog[0].name, "python3");
        assert_eq!(catalog[0].probe, "where python");
    }
}
