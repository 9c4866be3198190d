//! Centralized external tool execution with consistent error handling.
//!
//! Every prebuilt tool (archiver, compressor, mkfs.erofs, depmod, mkbootimg,
//! sign-file, avbtool, mkdtimg) is invoked through [`Cmd`] and a
//! [`ToolRunner`]. Calls are blocking with captured output and no timeout.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string (empty when redirected to a file).
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Get stdout, trimmed of whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    stdout_file: Option<PathBuf>,
    /// Custom error message prefix.
    error_prefix: Option<String>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            stdout_file: None,
            error_prefix: None,
        }
    }

    /// Create a command for a tool binary located by path.
    pub fn tool(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Write the child's stdout into `path` instead of capturing it.
    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout_file = Some(path.to_path_buf());
        self
    }

    /// Set a custom error message prefix.
    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// Program file name without its directory (`/prebuilts/bin/avbtool` -> `avbtool`).
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn stdout_path(&self) -> Option<&Path> {
        self.stdout_file.as_deref()
    }

    /// Human-readable command line for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        if let Some(out) = &self.stdout_file {
            line.push_str(&format!(" > {}", out.display()));
        }
        line
    }

    /// Turn a non-zero exit into an error carrying the captured stderr.
    pub fn check(&self, result: CommandResult) -> Result<CommandResult> {
        if !result.success() {
            let prefix = self
                .error_prefix
                .clone()
                .unwrap_or_else(|| format!("'{}' failed", self.program_name()));

            let stderr = result.stderr_trimmed();
            if stderr.is_empty() {
                bail!("{} (exit code {})", prefix, result.code());
            } else {
                bail!("{} (exit code {}):\n{}", prefix, result.code(), stderr);
            }
        }
        Ok(result)
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        tracing::info!("Running: {}", self.display());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());

        if let Some(ref out) = self.stdout_file {
            let file = File::create(out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            cmd.stdout(Stdio::from(file));
        }

        let output = cmd.output().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            tracing::debug!("Command succeeded: {}", self.program_name());
        } else {
            tracing::error!(
                "Command failed (exit {}): {}",
                result.code(),
                self.display()
            );
            if !result.stdout_trimmed().is_empty() {
                tracing::error!("stdout:\n{}", result.stdout_trimmed());
            }
            if !result.stderr_trimmed().is_empty() {
                tracing::error!("stderr:\n{}", result.stderr_trimmed());
            }
        }

        self.check(result)
    }
}

/// Executes tool invocations. Pipeline stages only ever see this trait.
pub trait ToolRunner {
    fn run(&self, cmd: Cmd) -> Result<CommandResult>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, cmd: Cmd) -> Result<CommandResult> {
        cmd.run()
    }
}

/// Check if a program exists in PATH.
///
/// Returns the full path if found, None otherwise.
pub fn which(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
