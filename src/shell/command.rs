//! Shell command execution.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

use super::platform::{detect_shell, ShellInfo};

/// Exit code POSIX shells use for "command not found".
pub const EXIT_NOT_FOUND: i32 = 127;

/// Output of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,
}

impl CommandOutput {
    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether the shell reported the program as missing.
    pub fn not_found(&self) -> bool {
        self.exit_code == Some(EXIT_NOT_FOUND)
    }
}

/// Failure to obtain any output from a command.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// The process could not be started.
    #[error("Failed to start '{command}': {message}")]
    Spawn {
        command: String,
        kind: ErrorKind,
        message: String,
    },

    /// The process did not finish in time and was killed.
    #[error("'{command}' timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

impl RunError {
    /// Whether the program itself could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RunError::Spawn { kind, .. } if *kind == ErrorKind::NotFound)
    }
}

/// Options for a single command invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Kill the process if it runs longer than this.
    pub timeout: Duration,

    /// Run through the user's login shell instead of spawning directly.
    pub use_shell: bool,
}

impl RunOptions {
    /// Run through the login shell.
    pub fn shell(timeout: Duration) -> Self {
        Self {
            timeout,
            use_shell: true,
        }
    }

    /// Spawn the program directly, splitting arguments on whitespace.
    pub fn direct(timeout: Duration) -> Self {
        Self {
            timeout,
            use_shell: false,
        }
    }
}

/// Executes commands on behalf of the checker and installer.
///
/// Implementations must allow concurrent invocations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion or timeout.
    async fn run(
        &self,
        command: &str,
        options: &RunOptions,
    ) -> std::result::Result<CommandOutput, RunError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: ShellInfo,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl ShellRunner {
    /// Create a runner using the detected user shell.
    pub fn new() -> Self {
        Self {
            shell: detect_shell(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    /// Run commands from this directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable to every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn build(&self, command: &str, options: &RunOptions) -> Option<Command> {
        let mut cmd = if options.use_shell {
            let mut cmd = Command::new(&self.shell.executable);
            cmd.arg(self.shell.name.command_flag()).arg(command);
            cmd
        } else {
            let mut parts = command.split_whitespace();
            let mut cmd = Command::new(parts.next()?);
            cmd.args(parts);
            cmd
        };

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Some(cmd)
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        options: &RunOptions,
    ) -> std::result::Result<CommandOutput, RunError> {
        let start = Instant::now();
        let mut cmd = self.build(command, options).ok_or_else(|| RunError::Spawn {
            command: command.to_string(),
            kind: ErrorKind::InvalidInput,
            message: "empty command".to_string(),
        })?;

        tracing::debug!("Running: {}", command);

        let child = cmd.spawn().map_err(|e| RunError::Spawn {
            command: command.to_string(),
            kind: e.kind(),
            message: e.to_string(),
        })?;

        // Dropping the child on timeout kills it (kill_on_drop).
        match tokio::time::timeout(options.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                duration: start.elapsed(),
            }),
            Ok(Err(e)) => Err(RunError::Spawn {
                command: command.to_string(),
                kind: e.kind(),
                message: e.to_string(),
            }),
            Err(_) => {
                tracing::debug!("'{}' timed out after {:?}", command, options.timeout);
                Err(RunError::Timeout {
                    command: command.to_string(),
                    timeout: options.timeout,
                })
            }
        }
    }
}

/// Keep the last `max_lines` lines of `text`, capped at `max_bytes`.
pub fn tail(text: &str, max_lines: usize, max_bytes: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    let joined = lines[start..].join("\n");

    if joined.len() <= max_bytes {
        return joined;
    }

    let mut cut = joined.len() - max_bytes;
    while !joined.is_char_boundary(cut) {
        cut += 1;
    }
    joined[cut..].to_string()
}
