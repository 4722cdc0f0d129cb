//! External process execution.
use anyhow::{Context as _, Result};
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl ExecResult {
    /// Standard output followed by standard error.
    ///
    /// Package managers split their diagnostics across both streams, so
    /// failure messages show the two together.
    #[must_use]
    pub fn combined_output(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Runs external programs.
///
/// Resources take an `&dyn Executor` so tests can substitute a mock and never
/// spawn `sudo`.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Run `program` with `args` and return its output, whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned.
    fn run_unchecked(&self, program: &str, args: &[String]) -> Result<ExecResult>;
}

/// [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_unchecked(&self, program: &str, args: &[String]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }
}
