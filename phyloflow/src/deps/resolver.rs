//! Probing and remediation of external dependencies.

use super::spec::{DependencySpec, DependencyStatus, InstallerBackend, PYTHON};
use crate::cancellation::CancelToken;
use crate::deps::DependencyKind;
use crate::errors::PhyloflowError;
use crate::platform::{HostKind, PlatformAdapter};
use crate::process::{CommandLine, Executor};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Probes declared dependencies and drives the automated remediation flow
/// through platform-appropriate installer backends.
///
/// All probing and installing goes through the engine's [`Executor`]; the
/// resolver never spawns anything itself.
pub struct DependencyResolver {
    executor: Arc<dyn Executor>,
    platform: PlatformAdapter,
}

impl DependencyResolver {
    /// Creates a resolver executing through the given channel.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, platform: PlatformAdapter) -> Self {
        Self { executor, platform }
    }

    /// Probes every declared dependency and returns exactly one measured
    /// status per name.
    ///
    /// When the interpreter itself is declared and missing, interpreter
    /// packages are reported missing without probing - their import probes
    /// could only fail.
    pub async fn check_all(
        &self,
        specs: &[DependencySpec],
    ) -> BTreeMap<String, DependencyStatus> {
        let mut statuses = BTreeMap::new();

        for spec in specs
            .iter()
            .filter(|spec| spec.kind == DependencyKind::NativeTool)
        {
            let status = self.probe(spec).await;
            statuses.insert(spec.name.clone(), status);
        }

        let python_declared_missing = specs.iter().any(|spec| spec.name == PYTHON)
            && !statuses
                .get(PYTHON)
                .map_or(false, |status| status.installed);

        for spec in specs
            .iter()
            .filter(|spec| spec.kind == DependencyKind::InterpreterPackage)
        {
            let status = if python_declared_missing {
                debug!(
                    dependency = %spec.name,
                    "interpreter missing, reporting package as missing without probing"
                );
                DependencyStatus::missing()
            } else {
                self.probe(spec).await
            };
            statuses.insert(spec.name.clone(), status);
        }

        statuses
    }

    /// Attempts to install the named missing dependencies and returns their
    /// re-probed, measured statuses.
    ///
    /// Missing names are grouped by installer backend - never mixed in one
    /// invocation - and system-level groups install before interpreter-level
    /// ones. A dependency with no defined procedure on this host is reported
    /// unresolved; that is a data answer, not a resolver failure.
    pub async fn remediate(
        &self,
        specs: &[DependencySpec],
        missing: &[String],
    ) -> BTreeMap<String, DependencyStatus> {
        let by_name: HashMap<&str, &DependencySpec> = specs
            .iter()
            .map(|spec| (spec.name.as_str(), spec))
            .collect();

        let mut statuses = BTreeMap::new();
        // BTreeMap keeps backends in enum order: system-level first.
        let mut groups: BTreeMap<InstallerBackend, Vec<&DependencySpec>> = BTreeMap::new();
        let mut without_procedure: Vec<&DependencySpec> = Vec::new();

        for name in missing {
            let Some(spec) = by_name.get(name.as_str()).copied() else {
                warn!(dependency = %name, "cannot remediate undeclared dependency");
                statuses.insert(name.clone(), DependencyStatus::missing());
                continue;
            };
            match spec.backend_for(self.platform.kind()) {
                Some(backend) => groups.entry(backend).or_default().push(spec),
                None => without_procedure.push(spec),
            }
        }

        for (backend, group) in &groups {
            let packages: Vec<String> = group
                .iter()
                .filter_map(|spec| spec.install.get(backend).cloned())
                .collect();
            let command = backend.install_command(&packages);
            info!(backend = %backend, command = %command, "installing dependency group");

            let cancel = CancelToken::new();
            match self
                .executor
                .execute(&CommandLine::from_line(&command), &cancel)
                .await
            {
                Ok(result) if result.success() => {}
                Ok(result) => warn!(
                    backend = %backend,
                    exit_code = ?result.exit_code,
                    "group install exited non-zero"
                ),
                Err(err) => warn!(backend = %backend, error = %err, "group install could not run"),
            }

            // The installer's exit code is not proof of success; only a
            // fresh probe of the affected subset is.
            for spec in group {
                let status = self.probe(spec).await;
                statuses.insert(spec.name.clone(), status);
            }
        }

        for spec in without_procedure {
            info!(
                dependency = %spec.name,
                host = %self.platform.kind(),
                "no install procedure on this host"
            );
            let status = self.probe(spec).await;
            statuses.insert(spec.name.clone(), status);
        }

        statuses
    }

    /// Checks every dependency, remediates the missing set, and fails with
    /// the still-unresolved names if any remain.
    ///
    /// # Errors
    ///
    /// [`PhyloflowError::DependencyMissing`] naming every dependency that is
    /// still absent after remediation.
    pub async fn ensure_all(
        &self,
        specs: &[DependencySpec],
    ) -> Result<BTreeMap<String, DependencyStatus>, PhyloflowError> {
        let mut statuses = self.check_all(specs).await;
        let missing: Vec<String> = missing_names(&statuses);

        if !missing.is_empty() {
            let remediated = self.remediate(specs, &missing).await;
            statuses.extend(remediated);
        }

        let unresolved = missing_names(&statuses);
        if unresolved.is_empty() {
            Ok(statuses)
        } else {
            Err(PhyloflowError::DependencyMissing { names: unresolved })
        }
    }

    /// Renders human-readable installation instructions for the missing
    /// dependencies in a status report.
    #[must_use]
    pub fn remediation_plan(
        &self,
        specs: &[DependencySpec],
        statuses: &BTreeMap<String, DependencyStatus>,
    ) -> String {
        let missing: Vec<&DependencySpec> = specs
            .iter()
            .filter(|spec| {
                statuses
                    .get(&spec.name)
                    .map_or(true, |status| !status.installed)
            })
            .collect();

        let needs_layer = self.platform.kind() == HostKind::NativeWindows;
        if missing.is_empty() && !needs_layer {
            return "All dependencies are installed correctly!".to_string();
        }

        let mut plan = String::from("Installation instructions for missing dependencies:\n\n");

        if needs_layer {
            plan.push_str(
                "Windows Subsystem for Linux (WSL) is not installed. Please install it with these steps:\n\
                 1. Open PowerShell as Administrator and run:\n   wsl --install\n\
                 2. Restart your computer\n\
                 3. Complete the Ubuntu setup when prompted\n\n",
            );
        }

        // Instructions assume the layer will be present on Windows hosts.
        let plan_host = if needs_layer {
            HostKind::WindowsWithLinuxLayer
        } else {
            self.platform.kind()
        };

        let mut by_backend: BTreeMap<InstallerBackend, Vec<String>> = BTreeMap::new();
        let mut manual: Vec<&DependencySpec> = Vec::new();
        for spec in missing {
            match spec.backend_for(plan_host) {
                Some(backend) => by_backend
                    .entry(backend)
                    .or_default()
                    .extend(spec.install.get(&backend).cloned()),
                None => manual.push(spec),
            }
        }

        if let Some(packages) = by_backend.get(&InstallerBackend::Apt) {
            let _ = writeln!(
                plan,
                "For Linux/WSL (Ubuntu/Debian), install with apt:\n{}\n",
                InstallerBackend::Apt.install_command(packages)
            );
        }
        if let Some(packages) = by_backend.get(&InstallerBackend::Pip) {
            let _ = writeln!(
                plan,
                "For Python packages, install with pip:\n{}\n",
                InstallerBackend::Pip.install_command(packages)
            );
        }
        if !manual.is_empty() {
            plan.push_str("Other dependencies that need manual installation:\n");
            for spec in manual {
                match &spec.manual_hint {
                    Some(hint) => {
                        let _ = writeln!(plan, "- {hint}");
                    }
                    None => {
                        let _ = writeln!(plan, "- {}", spec.name);
                    }
                }
            }
        }

        plan
    }

    async fn probe(&self, spec: &DependencySpec) -> DependencyStatus {
        let cancel = CancelToken::new();
        let installed = match self
            .executor
            .execute(&CommandLine::from_line(&spec.probe), &cancel)
            .await
        {
            Ok(result) => result.success(),
            Err(err) => {
                debug!(dependency = %spec.name, error = %err, "probe could not execute");
                false
            }
        };
        debug!(dependency = %spec.name, installed, "probed dependency");
        if installed {
            DependencyStatus::installed()
        } else {
            DependencyStatus::missing()
        }
    }
}

fn missing_names(statuses: &BTreeMap<String, DependencyStatus>) -> Vec<String> {
    statuses
        .iter()
        .filter(|(_, status)| !status.installed)
        .map(|(name, _)| name.clone())
        .collect()
}
