//! Argv-style subprocess execution for the JVM tools.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::traits::{CompilationError, StageError, Tool};

/// A program plus discrete arguments. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout lines followed by stderr lines, trailing blank lines dropped.
    pub fn diagnostic_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = String::from_utf8_lossy(&self.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&self.stderr).lines())
            .map(str::to_string)
            .collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        lines
    }

    /// Diagnostics on success, [`CompilationError`] otherwise.
    pub fn into_diagnostics(self, tool: Tool) -> Result<Vec<String>, StageError> {
        let lines = self.diagnostic_lines();
        if self.success() {
            Ok(lines)
        } else {
            Err(CompilationError::new(tool, self.exit_code, lines).into())
        }
    }
}

/// Runs `cmd` to completion, capturing its output.
pub fn run(cmd: &CommandSpec) -> Result<ProcessOutput, StageError> {
    debug!(program = %cmd.program.display(), args = cmd.args.len(), "Spawning tool");
    let output = cmd.to_command().output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StageError::ToolNotFound(cmd.program.display().to_string())
        } else {
            StageError::io(format!("running {}", cmd.program.display()), e)
        }
    })?;

    Ok(ProcessOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.status.code(),
    })
}

/// Joins paths with the platform classpath separator.
pub fn join_classpath<P: AsRef<Path>>(entries: &[P]) -> Result<OsString, StageError> {
    std::env::join_paths(entries.iter().map(|p| p.as_ref())).map_err(|e| {
        StageError::io(
            "building classpath",
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_lines_order_and_trim() {
        let output = ProcessOutput {
            stdout: b"info: compiled\n".to_vec(),
            stderr: b"warning: w1\nwarning: w2\n\n".to_vec(),
            exit_code: Some(0),
        };
        assert_eq!(
            output.diagnostic_lines(),
            vec!["info: compiled", "warning: w1", "warning: w2"]
        );
    }

    #[test]
    fn test_non_zero_exit_becomes_compilation_error() {
        let output = ProcessOutput {
            stdout: vec![],
            stderr: b"error: nope\n".to_vec(),
            exit_code: Some(1),
        };
        match output.into_diagnostics(Tool::Javac) {
            Err(StageError::Compilation(err)) => {
                assert_eq!(err.tool, Tool::Javac);
                assert_eq!(err.exit_code, Some(1));
                assert_eq!(err.lines, vec!["error: nope"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_program_is_tool_not_found() {
        let cmd = CommandSpec::new("/definitely/not/a/kotlinc").arg("-version");
        assert!(matches!(run(&cmd), Err(StageError::ToolNotFound(_))));
    }

    #[test]
    fn test_builder_collects_args() {
        let cmd = CommandSpec::new("javac").arg("-d").arg("out").args(["A.java", "B.java"]);
        assert_eq!(cmd.args, vec!["-d", "out", "A.java", "B.java"]);
    }
}
