//! Structured command values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A command as a structured value: executable, ordered arguments, working
/// directory, and environment overrides.
///
/// The command is only rendered to a single shell string inside
/// [`crate::process::ProcessRunner`], keeping quoting concerns in one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    /// The program to execute.
    pub program: String,
    /// Arguments as discrete elements.
    #[serde(default)]
    pub args: Vec<String>,
    /// Optional working directory (host grammar).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Environment overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl CommandLine {
    /// Creates a new command for the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    /// Wraps a command already expressed as a single shell line.
    ///
    /// Probe and install commands are declared as plain strings (spec'd per
    /// dependency and installer backend); they render verbatim.
    #[must_use]
    pub fn from_line(line: impl Into<String>) -> Self {
        Self::new(line)
    }

    /// Adds a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Adds an environment override.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The working directory, if one was set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Renders the command as a single shell line.
    ///
    /// Arguments that contain whitespace or shell metacharacters are
    /// single-quoted; the program (which may itself be a pre-rendered line,
    /// see [`CommandLine::from_line`]) is emitted verbatim.
    #[must_use]
    pub fn rendered(&self) -> String {
        if self.args.is_empty() {
            return self.program.clone();
        }
        let mut line = String::with_capacity(self.program.len() + 16 * self.args.len());
        line.push_str(&self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }

    /// Chains another command after this one (`a && b`), preserving this
    /// command's working directory and environment.
    #[must_use]
    pub fn and_then(self, next: &Self) -> Self {
        let line = format!("{} && {}", self.rendered(), next.rendered());
        Self {
            program: line,
            args: Vec::new(),
            cwd: self.cwd,
            env: self.env,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rendered())
    }
}

/// Quotes a single argument for the POSIX-style shells the engine wraps
/// commands in.
///
/// Backslashes and `*` pass through unquoted: they only occur in native
/// Windows arguments (which `cmd.exe` must see verbatim), never in POSIX
/// arguments, where paths are translated to the layer grammar first.
fn shell_quote(arg: &str) -> String {
    const SAFE: &str =
        "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-/=:,+@%\\*";
    if !arg.is_empty() && arg.chars().all(|c| SAFE.contains(c)) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder() {
        let cmd = CommandLine::new("busco")
            .arg("-i")
            .arg("/data/genomes")
            .args(["-m", "genome"])
            .current_dir("/work")
            .env("NUMEXPR_MAX_THREADS", "8");

        assert_eq!(cmd.program, "busco");
        assert_eq!(cmd.args.len(), 4);
        assert_eq!(cmd.working_dir(), Some(Path::new("/work")));
        assert_eq!(cmd.env.get("NUMEXPR_MAX_THREADS").map(String::as_str), Some("8"));
    }

    #[test]
    fn test_rendered_plain() {
        let cmd = CommandLine::new("muscle")
            .args(["-in", "seqs.fasta", "-out", "seqs.aln"]);
        assert_eq!(cmd.rendered(), "muscle -in seqs.fasta -out seqs.aln");
    }

    #[test]
    fn test_rendered_quotes_whitespace() {
        let cmd = CommandLine::new("python3").arg("-c").arg("import Bio; print(1)");
        assert_eq!(cmd.rendered(), "python3 -c 'import Bio; print(1)'");
    }

    #[test]
    fn test_rendered_quotes_embedded_single_quote() {
        let cmd = CommandLine::new("echo").arg("it's");
        assert_eq!(cmd.rendered(), r"echo 'it'\''s'");
    }

    #[test]
    fn test_from_line_renders_verbatim() {
        let cmd = CommandLine::from_line("sudo apt-get install -y muscle trimal");
        assert_eq!(cmd.rendered(), "sudo apt-get install -y muscle trimal");
    }

    #[test]
    fn test_and_then_chains() {
        let a = CommandLine::new("muscle").args(["-in", "x", "-out", "y"]);
        let b = CommandLine::new("trimal").args(["-in", "y", "-out", "z"]);
        let chained = a.current_dir("/work").and_then(&b);

        assert_eq!(
            chained.rendered(),
            "muscle -in x -out y && trimal -in y -out z"
        );
        assert_eq!(chained.working_dir(), Some(Path::new("/work")));
    }

    #[test]
    fn test_display_matches_rendered() {
        let cmd = CommandLine::new("iqtree").arg("-s").arg("aln file");
        assert_eq!(cmd.to_string(), cmd.rendered());
    }

    #[test]
    fn test_serialization_round_trip() {
        let cmd = CommandLine::new("zip").args(["-r", "out.zip", "."]).current_dir("/results");
        let json = serde_json::to_string(&cmd).unwrap();
        let back: CommandLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
