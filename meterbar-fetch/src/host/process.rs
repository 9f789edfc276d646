//! Subprocess execution for CLI tools.
//!
//! Children are spawned with `kill_on_drop`, so aborting the task that
//! awaits one (e.g. on a provider timeout) terminates the process too.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

/// Default command timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Process Output
// ============================================================================

/// Output from a process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output content.
    pub stdout: String,
    /// Standard error content.
    pub stderr: String,
    /// Exit code (0 = success).
    pub exit_code: i32,
    /// How long the command took to execute.
    pub duration: Duration,
}

impl ProcessOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the stdout if successful, otherwise an error.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::NonZeroExit` for a failed command.
    pub fn stdout_if_success(&self) -> Result<&str, ProcessError> {
        if self.success() {
            Ok(&self.stdout)
        } else {
            Err(ProcessError::NonZeroExit {
                code: self.exit_code,
                stderr: self.stderr.clone(),
            })
        }
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// API for running subprocesses (CLI tools).
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    default_timeout: Duration,
}

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the timeout used by [`ProcessRunner::run`].
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run a command with the default timeout and capture output.
    ///
    /// # Errors
    ///
    /// See [`ProcessRunner::run_with_options`].
    pub async fn run(&self, cmd: &str, args: &[&str]) -> Result<ProcessOutput, ProcessError> {
        self.run_with_options(cmd, args, &[], self.default_timeout).await
    }

    /// Run a command with extra environment variables and a timeout.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::NotFound` if the command is not on `PATH`,
    /// `ProcessError::Timeout` if it outlives `timeout` (the child is killed),
    /// or `ProcessError::Io` if it cannot be spawned.
    #[instrument(skip(self, env), fields(cmd = %cmd, timeout = ?timeout))]
    pub async fn run_with_options(
        &self,
        cmd: &str,
        args: &[&str],
        env: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        debug!(args = ?args, "Running command");

        let cmd_path = self.which(cmd).ok_or_else(|| {
            warn!(cmd = %cmd, "Command not found");
            ProcessError::NotFound(cmd.to_string())
        })?;

        let start = Instant::now();

        let mut command = Command::new(&cmd_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            command.env(key, value);
        }

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(cmd = %cmd, timeout = ?timeout, "Command timed out");
                return Err(ProcessError::Timeout(timeout));
            }
        };

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);

        let result = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
            duration,
        };

        debug!(
            exit_code = exit_code,
            duration = ?duration,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command completed"
        );

        Ok(result)
    }

    /// Check if a command exists on PATH.
    pub fn command_exists(&self, cmd: &str) -> bool {
        self.which(cmd).is_some()
    }

    /// Find the path to a command.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        which::which(cmd).ok()
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
